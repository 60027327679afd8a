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
use rustc_serialize::json::{Json, ToJson};
use std::collections::{BTreeMap, HashMap};
use std::f64::{INFINITY, NEG_INFINITY};

/// Running summary of a series of observations, e.g. the time customers spent
/// waiting in a queue.
#[derive(Clone, Debug)]
pub struct Tally
{
	count: u64,
	mean: f64,
	m2: f64,	// sum of squared differences from the mean (Welford)
	min: f64,
	max: f64,
}

/// Snapshot of a `Tally` taken at the end of a replication.
#[derive(Clone, Debug, PartialEq)]
pub struct TallySummary
{
	pub count: u64,
	pub mean: f64,
	pub std_dev: f64,
	pub min: f64,
	pub max: f64,
}

/// The statistics scope for a single replication. Models record into this
/// using `Context::tally` and `Context::count`. The scope is reset when the
/// warmup time is reached so that the start up transient is ignored.
///
/// Like the rest of the simulator state it is only touched while the run
/// lock is held so there is no synchronization here.
pub struct Statistics
{
	tallies: HashMap<String, Tally>,
	counters: HashMap<String, i64>,
}

impl Tally
{
	pub fn new() -> Tally
	{
		Tally{count: 0, mean: 0.0, m2: 0.0, min: INFINITY, max: NEG_INFINITY}
	}

	pub fn observe(&mut self, value: f64)
	{
		self.count += 1;
		let delta = value - self.mean;
		self.mean += delta/(self.count as f64);
		self.m2 += delta*(value - self.mean);

		self.min = self.min.min(value);
		self.max = self.max.max(value);
	}

	pub fn count(&self) -> u64
	{
		self.count
	}

	pub fn mean(&self) -> Option<f64>
	{
		if self.count > 0 {Some(self.mean)} else {None}
	}

	/// Sample variance.
	pub fn variance(&self) -> Option<f64>
	{
		if self.count > 1 {Some(self.m2/((self.count - 1) as f64))} else {None}
	}

	pub fn std_dev(&self) -> Option<f64>
	{
		self.variance().map(|v| v.sqrt())
	}

	pub fn min(&self) -> Option<f64>
	{
		if self.count > 0 {Some(self.min)} else {None}
	}

	pub fn max(&self) -> Option<f64>
	{
		if self.count > 0 {Some(self.max)} else {None}
	}

	pub fn summary(&self) -> TallySummary
	{
		TallySummary {
			count: self.count,
			mean: self.mean().unwrap_or(0.0),
			std_dev: self.std_dev().unwrap_or(0.0),
			min: self.min().unwrap_or(0.0),
			max: self.max().unwrap_or(0.0),
		}
	}
}

impl Statistics
{
	pub fn new() -> Statistics
	{
		Statistics{tallies: HashMap::new(), counters: HashMap::new()}
	}

	pub fn tally(&mut self, name: &str, value: f64)
	{
		assert!(!name.is_empty(), "name should not be empty");
		self.tallies.entry(name.to_string()).or_insert_with(Tally::new).observe(value);
	}

	pub fn count(&mut self, name: &str, delta: i64)
	{
		assert!(!name.is_empty(), "name should not be empty");
		*self.counters.entry(name.to_string()).or_insert(0) += delta;
	}

	/// Note that it is a programmer error if the tally is missing.
	pub fn get_tally(&self, name: &str) -> &Tally
	{
		match self.tallies.get(name) {
			Some(tally) => tally,
			None => panic!("tally '{}' is missing", name)
		}
	}

	/// Use this if the tally may not have been recorded yet.
	pub fn find_tally(&self, name: &str) -> Option<&Tally>
	{
		self.tallies.get(name)
	}

	/// Counters that have never been bumped are zero.
	pub fn get_count(&self, name: &str) -> i64
	{
		self.counters.get(name).cloned().unwrap_or(0)
	}

	/// Drops every observation, used when the warmup period ends.
	pub fn reset(&mut self)
	{
		self.tallies.clear();
		self.counters.clear();
	}

	pub fn tally_summaries(&self) -> BTreeMap<String, TallySummary>
	{
		self.tallies.iter().map(|(name, tally)| (name.clone(), tally.summary())).collect()
	}

	pub fn counter_values(&self) -> BTreeMap<String, i64>
	{
		self.counters.iter().map(|(name, value)| (name.clone(), *value)).collect()
	}
}

impl ToJson for TallySummary
{
	fn to_json(&self) -> Json
	{
		let mut object = BTreeMap::new();
		object.insert("count".to_string(), Json::U64(self.count));
		object.insert("mean".to_string(), Json::F64(self.mean));
		object.insert("std_dev".to_string(), Json::F64(self.std_dev));
		object.insert("min".to_string(), Json::F64(self.min));
		object.insert("max".to_string(), Json::F64(self.max));
		Json::Object(object)
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn close(a: f64, b: f64) -> bool
	{
		(a - b).abs() < 1.0e-9
	}

	#[test]
	fn tally()
	{
		let mut tally = Tally::new();
		assert_eq!(tally.mean(), None);
		assert_eq!(tally.variance(), None);

		for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter() {
			tally.observe(*value);
		}
		assert_eq!(tally.count(), 8);
		assert!(close(tally.mean().unwrap(), 5.0));
		assert!(close(tally.variance().unwrap(), 32.0/7.0));
		assert_eq!(tally.min(), Some(2.0));
		assert_eq!(tally.max(), Some(9.0));
	}

	#[test]
	fn statistics()
	{
		let mut stats = Statistics::new();
		stats.tally("wait", 1.0);
		stats.tally("wait", 3.0);
		stats.count("served", 1);
		stats.count("served", 2);

		assert!(close(stats.get_tally("wait").mean().unwrap(), 2.0));
		assert_eq!(stats.get_count("served"), 3);
		assert_eq!(stats.get_count("balked"), 0);
		assert_eq!(stats.tally_summaries().len(), 1);

		stats.reset();
		assert!(stats.find_tally("wait").is_none());
		assert_eq!(stats.get_count("served"), 0);
	}

	#[test]
	#[should_panic(expected = "tally 'foo' is missing")]
	fn missing_tally()
	{
		let stats = Statistics::new();
		stats.get_tally("foo");
	}

	#[test]
	fn summary_json()
	{
		let mut tally = Tally::new();
		tally.observe(1.5);
		let json = tally.summary().to_json();
		assert_eq!(json.find("count"), Some(&Json::U64(1)));
		assert_eq!(json.find("mean"), Some(&Json::F64(1.5)));
	}
}
