// Copyright (C) 2017 Jesse Jones
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 3, or (at your option)
// any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program; if not, write to the Free Software Foundation,
// Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA.
//! Pacing for simulations that should run in step with the wall clock, e.g.
//! when driving an animation or hardware in the loop.
use config::*;
use error::*;
use sim_time::*;
use std::sync::{Arc, Mutex};
use time::precise_time_ns;

/// Source of wall clock time in seconds. Only differences are used so the
/// origin doesn't matter.
pub trait WallClock: Send
{
	fn now_secs(&self) -> f64;
}

pub struct SystemWallClock;

impl WallClock for SystemWallClock
{
	fn now_secs(&self) -> f64
	{
		(precise_time_ns() as f64)/1.0e9
	}
}

/// A wall clock that only moves when told to.
#[derive(Clone)]
pub struct ManualWallClock
{
	secs: Arc<Mutex<f64>>,
}

impl ManualWallClock
{
	pub fn new() -> ManualWallClock
	{
		ManualWallClock{secs: Arc::new(Mutex::new(0.0))}
	}

	pub fn advance_secs(&self, secs: f64)
	{
		let mut now = self.secs.lock().unwrap_or_else(|e| e.into_inner());
		*now += secs;
	}
}

impl WallClock for ManualWallClock
{
	fn now_secs(&self) -> f64
	{
		*self.secs.lock().unwrap_or_else(|e| e.into_inner())
	}
}

/// Hook for distributed simulations: the run loop calls this (without holding
/// the simulator lock) before advancing the clock to a new time and blocks until
/// it returns.
pub trait AdvanceGate: Send
{
	fn request_advance(&mut self, to: Time);
}

/// What the run loop should do next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pace
{
	/// The next event is due, execute it.
	Due,

	/// Move the simulator clock forward (never past the next event) and sleep
	/// before checking again.
	Sleep{advance_to: Option<Time>, millis: u64},
}

/// Keeps elapsed wall time times the speed factor in step with elapsed
/// simulation time, measured from the last rebaseline.
#[derive(Clone, Debug)]
pub struct RealTimeClock
{
	speed_factor: f64,
	update_interval_ms: u64,
	catchup: bool,
	wall_origin: f64,
	sim_origin: Time,
}

impl RealTimeClock
{
	pub fn new(settings: &RealTimeSettings) -> Result<RealTimeClock, SimError>
	{
		check_speed_factor(settings.speed_factor)?;
		Ok(RealTimeClock {
			speed_factor: settings.speed_factor,
			update_interval_ms: settings.update_interval_ms.max(1),
			catchup: settings.catchup,
			wall_origin: 0.0,
			sim_origin: Time(0),
		})
	}

	pub fn speed_factor(&self) -> f64
	{
		self.speed_factor
	}

	pub fn catchup(&self) -> bool
	{
		self.catchup
	}

	pub fn rebaseline(&mut self, wall_now: f64, sim_now: Time)
	{
		self.wall_origin = wall_now;
		self.sim_origin = sim_now;
	}

	/// Rebaselines so that the clock doesn't jump.
	pub fn set_speed_factor(&mut self, speed_factor: f64, wall_now: f64, sim_now: Time) -> Result<(), SimError>
	{
		check_speed_factor(speed_factor)?;
		self.rebaseline(wall_now, sim_now);
		self.speed_factor = speed_factor;
		Ok(())
	}

	/// The simulation time the wall clock says we should be at.
	pub fn implied_time(&self, wall_now: f64, time_units: f64) -> Time
	{
		let elapsed = (wall_now - self.wall_origin).max(0.0);
		let ticks = (elapsed*self.speed_factor*time_units).floor();
		if ticks >= i64::max_value() as f64 {
			MAX_TIME
		} else {
			self.sim_origin + TimeDelta(ticks as i64)
		}
	}

	/// Decides whether the event at next_due can run now. If the simulation has
	/// fallen behind and catchup is off the origins are rebaselined so that
	/// the lag is accepted instead of running overdue events back to back.
	pub fn pace(&mut self, wall_now: f64, sim_now: Time, next_due: Time, time_units: f64) -> Pace
	{
		let implied = self.implied_time(wall_now, time_units);
		if next_due <= implied {
			if !self.catchup && next_due < implied {
				self.rebaseline(wall_now, next_due);
			}
			return Pace::Due;
		}

		let advance_to = if implied > sim_now {Some(implied)} else {None};
		let remaining = ((next_due - implied).0 as f64)/time_units/self.speed_factor;
		let millis = (remaining*1000.0).ceil();
		let millis = if millis < self.update_interval_ms as f64 {
			millis.max(1.0) as u64
		} else {
			self.update_interval_ms
		};
		Pace::Sleep{advance_to, millis}
	}
}

fn check_speed_factor(speed_factor: f64) -> Result<(), SimError>
{
	if speed_factor > 0.0 && speed_factor.is_finite() {
		Ok(())
	} else {
		Err(SimError::Runtime(format!("speed factor ({}) should be positive and finite", speed_factor)))
	}
}
