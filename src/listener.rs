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
use error::*;
use replication::*;
use sim_time::*;
use simulator::*;

/// Sent to `SimListener`s as the `Simulator` runs. Statistics collectors,
/// animation, experiment controllers, etc. use these to follow along.
#[derive(Clone, Debug, PartialEq)]
pub enum SimNotification
{
	/// The simulator was initialized with a new replication.
	StartReplication{replication: Replication, time: Time},

	/// The simulator's clock moved forward.
	TimeChanged(Time),

	/// The clock reached the replication's warmup time. Statistics recorded
	/// before this are dropped.
	WarmupReached(Time),

	/// The replication finished: its end time was reached or it ran out of
	/// events. Fired exactly once per replication.
	EndReplication(ReplicationResults),

	Started(Time),
	Stopped(Time),
	Stepped(Time),

	/// An event's action returned an error or panicked.
	EventFailed(EventError),

	/// Every replication of an `Experiment` has finished.
	EndExperiment{replications: usize, time: Time},
}

impl SimNotification
{
	/// The simulator time at which the notification was fired.
	pub fn time(&self) -> Time
	{
		match *self {
			SimNotification::StartReplication{time, ..} => time,
			SimNotification::TimeChanged(time) => time,
			SimNotification::WarmupReached(time) => time,
			SimNotification::EndReplication(ref results) => results.end_time,
			SimNotification::Started(time) => time,
			SimNotification::Stopped(time) => time,
			SimNotification::Stepped(time) => time,
			SimNotification::EventFailed(ref err) => err.time,
			SimNotification::EndExperiment{time, ..} => time,
		}
	}
}

/// Listeners are called synchronously, one notification at a time, after the
/// `Simulator` has released its lock. They may call back into the simulator,
/// e.g. to initialize the next replication. Notifications fired by those calls
/// are delivered after the current one. Listeners must not call `Simulator::wait`.
pub trait SimListener: Send
{
	fn notify(&mut self, notification: &SimNotification, simulator: &Simulator);
}

impl<F> SimListener for F where F: FnMut(&SimNotification, &Simulator) + Send
{
	fn notify(&mut self, notification: &SimNotification, simulator: &Simulator)
	{
		(*self)(notification, simulator)
	}
}

/// Returned by `Simulator::add_listener` so that the listener can later be removed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListenerId(pub u64);
