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
#![macro_use]
use config::*;
use glob::Pattern;
use sim_time::*;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum LogLevel
{
	Error,	// update log_levels if this changes
	Warning,
	Info,
	Debug,
	Excessive
}

/// For use in --help messages.
pub fn log_levels() -> &'static str
{
	"error, warning, info, debug, or excessive"
}

/// Generic macro that calls a log method, e.g. on `Context` or `Simulator`.
/// More often you'll use one of the other macros like log_info!.
#[macro_export]
macro_rules! log_at
{
	($target:expr, $level:expr) => ($target.log($level, ""));
	($target:expr, $level:expr, $msg:expr) => ($target.log($level, $msg));
	($target:expr, $level:expr, $fmt:expr, $($arg:tt)*) => ($target.log($level, &format!($fmt, $($arg)*)));
}

#[macro_export]
macro_rules! log_error
{
	($target:expr) => ($target.log($crate::LogLevel::Error, ""));
	($target:expr, $msg:expr) => ($target.log($crate::LogLevel::Error, $msg));
	($target:expr, $fmt:expr, $($arg:tt)*) => ($target.log($crate::LogLevel::Error, &format!($fmt, $($arg)*)));
}

#[macro_export]
macro_rules! log_warning
{
	($target:expr) => ($target.log($crate::LogLevel::Warning, ""));
	($target:expr, $msg:expr) => ($target.log($crate::LogLevel::Warning, $msg));
	($target:expr, $fmt:expr, $($arg:tt)*) => ($target.log($crate::LogLevel::Warning, &format!($fmt, $($arg)*)));
}

/// # Examples
///
/// ```rust,ignore
/// log_info!(context);						// logs an empty line
/// log_info!(context, "hello");			// logs a string
/// log_info!(context, "x = {:?}", x);	// logs using a format string
/// ```
#[macro_export]
macro_rules! log_info
{
	($target:expr) => ($target.log($crate::LogLevel::Info, ""));
	($target:expr, $msg:expr) => ($target.log($crate::LogLevel::Info, $msg));
	($target:expr, $fmt:expr, $($arg:tt)*) => ($target.log($crate::LogLevel::Info, &format!($fmt, $($arg)*)));
}

#[macro_export]
macro_rules! log_debug
{
	($target:expr) => ($target.log($crate::LogLevel::Debug, ""));
	($target:expr, $msg:expr) => ($target.log($crate::LogLevel::Debug, $msg));
	($target:expr, $fmt:expr, $($arg:tt)*) => ($target.log($crate::LogLevel::Debug, &format!($fmt, $($arg)*)));
}

#[macro_export]
macro_rules! log_excessive
{
	($target:expr) => ($target.log($crate::LogLevel::Excessive, ""));
	($target:expr, $msg:expr) => ($target.log($crate::LogLevel::Excessive, $msg));
	($target:expr, $fmt:expr, $($arg:tt)*) => ($target.log($crate::LogLevel::Excessive, &format!($fmt, $($arg)*)));
}

/// Writes time stamped log lines for a topic, typically "simulator", "experiment",
/// or the name of the event being executed.
pub struct Logger
{
	level: LogLevel,
	overrides: Vec<(Pattern, LogLevel)>,
	colorize: bool,
	escapes: [String; 5],	// indexed by LogLevel
	precision: usize,
	time_units: f64,
	out: Box<dyn Write + Send>,
}

impl Logger
{
	/// Logs to stdout.
	pub fn new(config: &Config) -> Logger
	{
		Logger::with_writer(config, Box::new(io::stdout()))
	}

	pub fn with_writer(config: &Config, out: Box<dyn Write + Send>) -> Logger
	{
		Logger {
			level: config.log_level,
			overrides: config.log_levels.clone(),
			colorize: config.colorize,
			escapes: [
				config.error_escape_code.clone(),
				config.warning_escape_code.clone(),
				config.info_escape_code.clone(),
				config.debug_escape_code.clone(),
				config.excessive_escape_code.clone(),
			],
			precision: config.precision(),
			time_units: config.time_units,
			out,
		}
	}

	pub fn should_log(&self, level: LogLevel, topic: &str) -> bool
	{
		for &(ref pattern, clevel) in self.overrides.iter() {
			if pattern.matches(topic) {
				return level <= clevel;
			}
		}

		level <= self.level
	}

	pub fn log(&mut self, time: Time, level: LogLevel, topic: &str, message: &str)
	{
		if self.should_log(level, topic) {
			let t = (time.0 as f64)/self.time_units;
			let result = if self.colorize {
				let begin_escape = &self.escapes[level as usize];
				write!(self.out, "{0}{1:.2$}   {3} {4}{5}\n", begin_escape, t, self.precision, topic, message, end_escape())
			} else {
				let prefix = match level {
					LogLevel::Error		=> "Error",
					LogLevel::Warning	=> "Warn ",
					LogLevel::Info		=> "Info ",
					LogLevel::Debug		=> "Debug",
					LogLevel::Excessive	=> "Exces",
				};
				write!(self.out, "{0:.1$}  {2} {3}  {4}\n", t, self.precision, prefix, topic, message)
			};
			let _ = result.and_then(|_| self.out.flush());	// nowhere to report a failed log
		}
	}
}

/// A Write sink that keeps everything in memory. Handy for tests and for
/// GUIs that want to display the log.
#[derive(Clone)]
pub struct LogBuffer
{
	bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer
{
	pub fn new() -> LogBuffer
	{
		LogBuffer{bytes: Arc::new(Mutex::new(Vec::new()))}
	}

	pub fn contents(&self) -> String
	{
		let bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
		String::from_utf8_lossy(&bytes).into_owned()
	}
}

impl Write for LogBuffer
{
	fn write(&mut self, buf: &[u8]) -> io::Result<usize>
	{
		let mut bytes = self.bytes.lock().unwrap_or_else(|e| e.into_inner());
		bytes.extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()>
	{
		Ok(())
	}
}

fn end_escape() -> &'static str
{
	"\x1b[0m"
}
