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
use event::*;
use sim_time::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Pending events ordered by time, then by priority (higher first), and
/// then by the order in which they were scheduled. The last part makes runs
/// deterministic: two replications that schedule the same events in the same
/// order execute them in the same order.
pub struct EventList
{
	events: BTreeMap<EventKey, SimEvent>,
	keys: HashMap<EventId, EventKey>,
	next_id: u64,
}

impl EventList
{
	pub fn new() -> EventList
	{
		EventList{events: BTreeMap::new(), keys: HashMap::new(), next_id: 0}
	}

	/// Assigns the event an id and inserts it. Fails if the event's time is
	/// before now.
	pub fn schedule(&mut self, mut event: SimEvent, now: Time) -> Result<EventId, SimError>
	{
		if event.time < now {
			return Err(SimError::Schedule(format!("can't schedule {} at {} because the current time is {}", event.name, event.time, now)));
		}

		self.next_id += 1;
		event.id = EventId(self.next_id);

		let key = EventKey::new(&event);
		self.keys.insert(event.id, key);
		self.events.insert(key, event);
		Ok(key.id)
	}

	/// Removes and returns the event that should execute next.
	pub fn remove_first(&mut self) -> Result<SimEvent, SimError>
	{
		let key = match self.events.keys().next() {
			Some(key) => *key,
			None => return Err(SimError::EmptyList),
		};
		self.keys.remove(&key.id);
		self.events.remove(&key).ok_or(SimError::EmptyList)
	}

	pub fn peek_first(&self) -> Option<&SimEvent>
	{
		self.events.values().next()
	}

	pub fn peek_time(&self) -> Option<Time>
	{
		self.events.keys().next().map(|key| key.time)
	}

	/// Returns false if the event has already executed or been cancelled.
	pub fn cancel(&mut self, id: EventId) -> bool
	{
		match self.keys.remove(&id) {
			Some(key) => self.events.remove(&key).is_some(),
			None => false,
		}
	}

	pub fn contains(&self, id: EventId) -> bool
	{
		self.keys.contains_key(&id)
	}

	pub fn is_empty(&self) -> bool
	{
		self.events.is_empty()
	}

	pub fn len(&self) -> usize
	{
		self.events.len()
	}

	/// Drops all pending events. Ids are not reused.
	pub fn clear(&mut self)
	{
		self.events.clear();
		self.keys.clear();
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct EventKey
{
	time: Time,
	priority: i32,
	id: EventId,
}

impl EventKey
{
	fn new(event: &SimEvent) -> EventKey
	{
		EventKey{time: event.time, priority: event.priority, id: event.id}
	}
}

impl PartialOrd for EventKey
{
	fn partial_cmp(&self, other: &EventKey) -> Option<Ordering>
	{
		Some(self.cmp(other))
	}
}

impl Ord for EventKey
{
	fn cmp(&self, other: &EventKey) -> Ordering
	{
		self.time.cmp(&other.time)
			.then(other.priority.cmp(&self.priority))	// reversed so that higher priorities come first
			.then(self.id.cmp(&other.id))
	}
}
