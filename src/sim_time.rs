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
use std::fmt;
use std::i64;
use std::ops::{Add, AddAssign, Sub};

/// To better support deterministic execution time is stored
/// using 64-bit integers. The number of ticks per second is
/// set by `Config::time_units`, by default the units are micro-
/// seconds.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Time(pub i64);	// unsigned would give us more range, but makes it awkward to use times in the past

/// A relative amount of simulation time, e.g. the difference between two `Time`s.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimeDelta(pub i64);

/// Used for replications that should run until their event lists drain.
pub const MAX_TIME: Time = Time(i64::MAX);

impl Time
{
	pub fn zero() -> Time
	{
		Time(0)
	}

	/// Like `+` but returns None instead of saturating.
	pub fn checked_add(self, delta: TimeDelta) -> Option<Time>
	{
		self.0.checked_add(delta.0).map(Time)
	}
}

impl TimeDelta
{
	pub fn zero() -> TimeDelta
	{
		TimeDelta(0)
	}

	pub fn is_negative(self) -> bool
	{
		self.0 < 0
	}
}

impl Add<TimeDelta> for Time
{
	type Output = Time;

	fn add(self, rhs: TimeDelta) -> Time
	{
		Time(self.0.saturating_add(rhs.0))
	}
}

impl AddAssign<TimeDelta> for Time
{
	fn add_assign(&mut self, rhs: TimeDelta)
	{
		*self = *self + rhs;
	}
}

impl Sub<TimeDelta> for Time
{
	type Output = Time;

	fn sub(self, rhs: TimeDelta) -> Time
	{
		Time(self.0.saturating_sub(rhs.0))
	}
}

impl Sub<Time> for Time
{
	type Output = TimeDelta;

	fn sub(self, rhs: Time) -> TimeDelta
	{
		TimeDelta(self.0.saturating_sub(rhs.0))
	}
}

impl Add for TimeDelta
{
	type Output = TimeDelta;

	fn add(self, rhs: TimeDelta) -> TimeDelta
	{
		TimeDelta(self.0.saturating_add(rhs.0))
	}
}

impl fmt::Display for Time
{
	fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
	{
		if *self == MAX_TIME {
			write!(formatter, "forever")
		} else {
			write!(formatter, "{}", self.0)
		}
	}
}

impl fmt::Display for TimeDelta
{
	fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
	{
		write!(formatter, "{}", self.0)
	}
}
