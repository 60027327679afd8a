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
use context::*;
use sim_time::*;
use std::error::Error;
use std::fmt;

/// Returned by event actions. Errors are caught by the `Simulator`'s run loop
/// which logs them and, depending upon `Config::pause_on_error`, pauses the run.
pub type EventResult = Result<(), Box<dyn Error + Send + Sync>>;

/// The code executed when an event fires. Actions are given a `Context` which
/// they can use to schedule new events, record statistics, log, etc.
pub type Action = Box<dyn FnOnce(&mut Context) -> EventResult + Send>;

pub const MIN_PRIORITY: i32 = 1;
pub const NORMAL_PRIORITY: i32 = 5;
pub const MAX_PRIORITY: i32 = 10;

/// Identifies a scheduled event. These are assigned in the order in which
/// events are scheduled and are used to break ties between events with the
/// same time and priority. They also serve as the handle used to cancel events.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EventId(pub u64);

/// Events are scheduled to execute their action at a particular `Time`.
/// When multiple events are scheduled for the same time those with a higher
/// priority run first and events with the same priority run in the order
/// they were scheduled.
pub struct SimEvent
{
	/// When the event will execute.
	pub time: Time,

	/// Larger values execute earlier.
	pub priority: i32,

	/// Assigned by the `EventList` when the event is scheduled.
	pub id: EventId,

	/// Used when logging, e.g. when the action fails.
	pub name: String,

	action: Action,
}

impl SimEvent
{
	pub fn new<F>(time: Time, priority: i32, name: &str, action: F) -> SimEvent
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		assert!(!name.is_empty(), "name should not be empty");
		SimEvent{time, priority, id: EventId(0), name: name.to_string(), action: Box::new(action)}
	}

	/// Consumes the event returning the action to execute.
	pub fn into_action(self) -> Action
	{
		self.action
	}
}

impl fmt::Debug for SimEvent
{
	fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
	{
		write!(formatter, "{} ({}) at {} priority {}", self.name, self.id, self.time, self.priority)
	}
}

impl fmt::Display for EventId
{
	fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
	{
		write!(formatter, "#{}", self.0)
	}
}
