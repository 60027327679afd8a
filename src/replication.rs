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
use rustc_serialize::json::{Json, ToJson};
use sim_time::*;
use stats::*;
use std::collections::BTreeMap;

/// One bounded run of a model. Statistics are only collected after the
/// warmup time and the run ends at the end time (events scheduled at
/// exactly the end time still execute).
#[derive(Clone, Debug, PartialEq)]
pub struct Replication
{
	/// Also used to offset the random number seed so that each replication
	/// gets its own stream.
	pub id: u32,
	pub start: Time,
	pub warmup: Time,
	pub end: Time,
}

/// What was harvested from a replication once it ended.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicationResults
{
	pub replication: Replication,

	/// The simulator's time when the replication ended.
	pub end_time: Time,

	/// Includes events whose actions failed.
	pub events_executed: u64,

	pub failures: u64,
	pub tallies: BTreeMap<String, TallySummary>,
	pub counters: BTreeMap<String, i64>,
}

impl Replication
{
	pub fn new(id: u32, start: Time, warmup: Time, end: Time) -> Result<Replication, SimError>
	{
		if start > warmup {
			return Err(SimError::Runtime(format!("replication {} warmup {} is before the start {}", id, warmup, start)));
		}
		if warmup >= end {
			return Err(SimError::Runtime(format!("replication {} warmup {} isn't before the end {}", id, warmup, end)));
		}
		Ok(Replication{id, start, warmup, end})
	}

	/// A replication that starts at zero with no warmup.
	pub fn with_end(id: u32, end: Time) -> Result<Replication, SimError>
	{
		Replication::new(id, Time(0), Time(0), end)
	}
}

impl ToJson for ReplicationResults
{
	fn to_json(&self) -> Json
	{
		let mut object = BTreeMap::new();
		object.insert("replication".to_string(), Json::U64(self.replication.id as u64));
		object.insert("start".to_string(), Json::I64(self.replication.start.0));
		object.insert("warmup".to_string(), Json::I64(self.replication.warmup.0));
		object.insert("end".to_string(), Json::I64(self.end_time.0));
		object.insert("events_executed".to_string(), Json::U64(self.events_executed));
		object.insert("failures".to_string(), Json::U64(self.failures));
		object.insert("tallies".to_string(), self.tallies.to_json());
		object.insert("counters".to_string(), self.counters.to_json());
		Json::Object(object)
	}
}
