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
use glob::Pattern;
use logging::*;
use sim_time::*;
use std::f64::INFINITY;

/// Used to configure the `Simulator`.
#[derive(Clone)]
pub struct Config
{
	/// Use 1_000.0 for ms, 1.0 for seconds, 0.1667 for minutes, etc.
	/// Defaults to micro-second resolution.
	pub time_units: f64,

	/// Maximum time to run each replication for.
	/// Defaults to INFINITY.
	pub max_secs: f64,

	/// Random number generator seed. Each replication gets its own stream
	/// derived from this and the replication id.
	/// Defaults to 0 which means seed with entropy. Note that if you want
	/// deterministic results you should use a fixed seed.
	pub seed: u32,

	/// If an event's action fails the run is paused. When false the failure
	/// is logged and the run continues with the next event.
	/// Defaults to true.
	pub pause_on_error: bool,

	/// When set the run loop is paced against the wall clock.
	/// Defaults to None, i.e. run as fast as possible.
	pub real_time: Option<RealTimeSettings>,

	/// Log messages at this level and above are written out.
	/// Defaults to Info.
	pub log_level: LogLevel,

	/// Overrides log_level for topics matching a glob, e.g. event names.
	/// The first match wins.
	pub log_levels: Vec<(Pattern, LogLevel)>,

	/// Use escape sequences to color code stdout.
	/// Defaults to true.
	pub colorize: bool,

	/// Used when logging to stdout when colorize is on.
	/// Defaults to bright red. See See https://en.wikipedia.org/wiki/ANSI_escape_code#Colors
	/// and https://aweirdimagination.net/2015/02/21/256-color-terminals for information on
	/// color escape codes.
	pub error_escape_code: String,

	/// Used when logging to stdout when colorize is on.
	/// Defaults to red.
	pub warning_escape_code: String,

	/// Used when logging to stdout when colorize is on.
	/// Defaults to bold black.
	pub info_escape_code: String,

	/// Used when logging to stdout when colorize is on.
	/// Defaults to black.
	pub debug_escape_code: String,

	/// Used when logging to stdout when colorize is on.
	/// Defaults to light gray.
	pub excessive_escape_code: String,
}

/// Settings for pacing a run against the wall clock.
#[derive(Clone, Debug, PartialEq)]
pub struct RealTimeSettings
{
	/// Simulated seconds per wall clock second. 2.0 runs twice as fast as real time.
	pub speed_factor: f64,

	/// The longest the run loop sleeps before re-checking the clocks.
	pub update_interval_ms: u64,

	/// If the simulation falls behind the wall clock it executes overdue events
	/// without waiting until it catches up. Otherwise the lag is accepted.
	pub catchup: bool,
}

impl RealTimeSettings
{
	pub fn new(speed_factor: f64) -> RealTimeSettings
	{
		RealTimeSettings {
			speed_factor,
			update_interval_ms: 10,
			catchup: true,
		}
	}
}

impl Config
{
	pub fn new() -> Config
	{
		Config {
			time_units: 1_000_000.0,
			max_secs: INFINITY,
			seed: 0,
			pause_on_error: true,
			real_time: None,
			log_level: LogLevel::Info,
			log_levels: Vec::new(),
			colorize: true,
			error_escape_code: "\x1b[31;1m".to_string(),
			warning_escape_code: "\x1b[31m".to_string(),
			info_escape_code: "\x1b[30;1m".to_string(),
			debug_escape_code: "".to_string(),
			excessive_escape_code: "\x1b[1;38;5;244m".to_string(),
		}
	}

	pub fn parse_log_level(&mut self, level: &str) -> Option<String>
	{
		match parse_level(level) {
			Some(level) => {self.log_level = level; None},
			None => Some(format!("--log-level should be {}", log_levels())),
		}
	}

	/// Each value should look like "LEVEL:GLOB", e.g. "debug:arrival*".
	pub fn parse_log_levels(&mut self, values: Vec<&str>) -> Option<String>
	{
		for value in values {
			let parts: Vec<&str> = value.splitn(2, ':').collect();
			if parts.len() != 2 {
				return Some("--log should be formatted as LEVEL:GLOB".to_string());
			}

			let level = match parse_level(parts[0]) {
				Some(level) => level,
				None => return Some(format!("--log level should be {}", log_levels())),
			};

			match Pattern::new(parts[1]) {
				Ok(pattern) => self.log_levels.push((pattern, level)),
				Err(err) => return Some(format!("--log has a malformed glob: {}", err)),
			}
		}
		None
	}

	/// Accepts a number with an optional time suffix, see `time_suffixes`.
	pub fn parse_max_secs(&mut self, value: &str) -> Option<String>
	{
		match parse_secs(value) {
			Some(secs) if secs > 0.0 => {self.max_secs = secs; None},
			Some(_) => Some("--max-time should be greater than zero".to_string()),
			None => Some(format!("--max-time should be a number with an optional {} suffix", time_suffixes())),
		}
	}

	pub fn secs_to_delta(&self, secs: f64) -> TimeDelta
	{
		assert!(self.time_units > 0.0, "time units ({}) are not positive", self.time_units);
		let ticks = secs*self.time_units;
		if ticks >= i64::max_value() as f64 {
			TimeDelta(i64::max_value())
		} else {
			TimeDelta(ticks.round() as i64)
		}
	}

	pub fn secs_to_time(&self, secs: f64) -> Time
	{
		Time(0) + self.secs_to_delta(secs)
	}

	pub fn time_to_secs(&self, time: Time) -> f64
	{
		(time.0 as f64)/self.time_units
	}

	pub fn delta_to_secs(&self, delta: TimeDelta) -> f64
	{
		(delta.0 as f64)/self.time_units
	}

	/// The end time for replications, derived from max_secs.
	pub fn max_time(&self) -> Time
	{
		if self.max_secs.is_infinite() {MAX_TIME} else {self.secs_to_time(self.max_secs)}
	}

	/// Number of decimal places to include when logging times.
	pub fn precision(&self) -> usize
	{
		self.time_units.log10().max(0.0) as usize
	}
}

/// For use in --help messages.
pub fn time_suffixes() -> &'static str
{
	"ms, s, m, or h"
}

fn parse_level(level: &str) -> Option<LogLevel>
{
	match level {
		"error" => Some(LogLevel::Error),
		"warning" => Some(LogLevel::Warning),
		"info" => Some(LogLevel::Info),
		"debug" => Some(LogLevel::Debug),
		"excessive" => Some(LogLevel::Excessive),
		_ => None,
	}
}

fn parse_secs(value: &str) -> Option<f64>
{
	let value = value.trim();
	let (number, scale) = if value.ends_with("ms") {
		(&value[..value.len() - 2], 0.001)
	} else if value.ends_with('s') {
		(&value[..value.len() - 1], 1.0)
	} else if value.ends_with('m') {
		(&value[..value.len() - 1], 60.0)
	} else if value.ends_with('h') {
		(&value[..value.len() - 1], 3600.0)
	} else {
		(value, 1.0)
	};
	number.parse::<f64>().ok().map(|n| n*scale)
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn log_level()
	{
		let mut config = Config::new();
		assert_eq!(config.parse_log_level("debug"), None);
		assert_eq!(config.log_level, LogLevel::Debug);
		assert!(config.parse_log_level("loud").is_some());
		assert_eq!(config.log_level, LogLevel::Debug);
	}

	#[test]
	fn log_level_overrides()
	{
		let mut config = Config::new();
		assert_eq!(config.parse_log_levels(vec!["excessive:arrival*", "error:*"]), None);
		assert_eq!(config.log_levels.len(), 2);
		assert!(config.log_levels[0].0.matches("arrival 3"));
		assert_eq!(config.log_levels[1].1, LogLevel::Error);

		assert!(config.parse_log_levels(vec!["debug"]).is_some());
		assert!(config.parse_log_levels(vec!["chatty:*"]).is_some());
		assert!(config.parse_log_levels(vec!["debug:[*"]).is_some());
	}

	#[test]
	fn max_secs()
	{
		let mut config = Config::new();
		assert_eq!(config.max_time(), MAX_TIME);

		assert_eq!(config.parse_max_secs("250ms"), None);
		assert_eq!(config.max_secs, 0.25);
		assert_eq!(config.parse_max_secs("2m"), None);
		assert_eq!(config.max_secs, 120.0);
		assert_eq!(config.parse_max_secs("3"), None);
		assert_eq!(config.max_secs, 3.0);
		assert_eq!(config.max_time(), Time(3_000_000));

		assert!(config.parse_max_secs("0s").is_some());
		assert!(config.parse_max_secs("soon").is_some());
	}

	#[test]
	fn conversions()
	{
		let mut config = Config::new();
		config.time_units = 1_000.0;
		assert_eq!(config.secs_to_delta(1.5), TimeDelta(1500));
		assert_eq!(config.time_to_secs(Time(250)), 0.25);
		assert_eq!(config.precision(), 3);
		assert_eq!(config.secs_to_delta(INFINITY), TimeDelta(i64::max_value()));
	}
}
