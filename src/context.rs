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
use config::*;
use error::*;
use event::*;
use logging::*;
use rand::XorShiftRng;
use replication::*;
use sim_state::*;
use sim_time::*;
use stats::*;

/// Handed to an event's action while it executes. This is how actions
/// schedule new events, record statistics, log, etc. Actions run with the
/// simulator's lock held so they must use the context instead of calling
/// back into the `Simulator` handle.
pub struct Context<'a>
{
	state: &'a mut SimState,
	topic: &'a str,
	replication: Replication,
}

impl<'a> Context<'a>
{
	pub(crate) fn new(state: &'a mut SimState, topic: &'a str) -> Context<'a>
	{
		let replication = match state.replication {
			Some(ref replication) => replication.clone(),
			None => Replication{id: 0, start: state.time, warmup: state.time, end: MAX_TIME},	// events can't be scheduled without a replication
		};
		Context{state, topic, replication}
	}

	/// The current simulation time.
	pub fn time(&self) -> Time
	{
		self.state.time
	}

	pub fn replication(&self) -> &Replication
	{
		&self.replication
	}

	pub fn config(&self) -> &Config
	{
		&self.state.config
	}

	/// Schedule an event at an absolute time. Times before now are an error.
	pub fn schedule<F>(&mut self, time: Time, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		self.state.schedule(time, priority, name, action)
	}

	pub fn schedule_after<F>(&mut self, delay: TimeDelta, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		let time = self.state.time + delay;
		self.state.schedule(time, priority, name, action)
	}

	pub fn schedule_after_secs<F>(&mut self, secs: f64, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		let delay = self.state.config.secs_to_delta(secs);
		self.schedule_after(delay, priority, name, action)
	}

	/// Runs after the events already scheduled for the current time and priority.
	pub fn schedule_now<F>(&mut self, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		let time = self.state.time;
		self.state.schedule(time, priority, name, action)
	}

	/// Returns false if the event already ran or was already cancelled.
	pub fn cancel(&mut self, id: EventId) -> bool
	{
		self.state.cancel(id)
	}

	/// Pauses the run once this action finishes. Does nothing when stepping.
	pub fn stop(&mut self)
	{
		self.state.pause();
	}

	/// This should be the only source of randomness used by models. Each
	/// replication gets its own stream.
	pub fn rng(&mut self) -> &mut XorShiftRng
	{
		&mut self.state.rng
	}

	/// Records an observation, e.g. the time a customer waited.
	pub fn tally(&mut self, name: &str, value: f64)
	{
		self.state.stats.tally(name, value);
	}

	pub fn count(&mut self, name: &str, delta: i64)
	{
		self.state.stats.count(name, delta);
	}

	pub fn statistics(&self) -> &Statistics
	{
		&self.state.stats
	}

	/// Normally you'll use one of the log macros, e.g. log_info!. The topic
	/// is the name of the executing event.
	pub fn log(&mut self, level: LogLevel, message: &str)
	{
		self.state.log(level, self.topic, message);
	}
}
