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
use event::*;
use sim_time::*;
use thiserror::Error;

/// Errors returned by the `Simulator`, the `EventList`, and the `Experiment`.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SimError
{
	/// Scheduling into the past or before a replication has been loaded.
	/// These are always bugs in the model and are never retried.
	#[error("schedule error: {0}")]
	Schedule(String),

	/// A lifecycle method was called in the wrong state, e.g. `start` on
	/// a finished run. The simulator state is left unchanged.
	#[error("runtime error: {0}")]
	Runtime(String),

	/// An event action failed. The run loop catches these so they normally
	/// only show up in logs and notifications.
	#[error("{0}")]
	EventExecution(EventError),

	/// `EventList::remove_first` was called on an empty list.
	#[error("the event list is empty")]
	EmptyList,
}

/// What went wrong while executing an event's action.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("event {name} ({id}) failed at {time}: {message}")]
pub struct EventError
{
	pub time: Time,
	pub id: EventId,
	pub name: String,
	pub message: String,
}
