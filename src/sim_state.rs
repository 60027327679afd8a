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
use context::*;
use error::*;
use event::*;
use event_list::*;
use listener::*;
use logging::*;
use rand::{SeedableRng, XorShiftRng};
use realtime::*;
use replication::*;
use sim_time::*;
use stats::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use time::get_time;

/// Lifecycle of the `Simulator`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState
{
	NotInitialized,
	Initialized,
	Running,
	Stopped,
	Ended,
}

/// What the run loop should do after a planning step.
pub enum Plan
{
	Continue,
	Wait(u64),
	Grant(Time),
	Execute(SimEvent, u64),
}

/// Everything the run lock protects. All of the event list and clock
/// mutation happens here, the `Simulator` handle only adds locking,
/// notification delivery, and the worker thread.
pub struct SimState
{
	pub config: Config,
	pub run_state: RunState,
	pub time: Time,
	pub replication: Option<Replication>,
	pub events: EventList,
	pub stats: Statistics,
	pub rng: XorShiftRng,
	pub logger: Logger,
	pub pending: Vec<SimNotification>,
	pub clock: Option<RealTimeClock>,
	pub wall_clock: Box<dyn WallClock>,
	pub gate: Option<Box<dyn AdvanceGate>>,
	pub granted: Time,

	pub warmup_reached: bool,
	pub executed: u64,
	pub failures: u64,
	pub stop_at: Option<Time>,

	/// Bumped by initialize so that an event popped for one replication is
	/// never executed in the next.
	pub generation: u64,

	/// Set while an event has been removed from the list but hasn't finished
	/// executing. Nothing else may start, step, or pop an event until it clears.
	pub in_flight: bool,

	pub worker_active: bool,
	pub dispatching: bool,

	/// Set when something happens that a sleeping real time loop should notice.
	pub wake: bool,
}

impl SimState
{
	pub fn new(config: Config, logger: Logger) -> Result<SimState, SimError>
	{
		if !(config.time_units > 0.0 && config.time_units.is_finite()) {
			return Err(SimError::Runtime(format!("time units ({}) should be positive and finite", config.time_units)));
		}

		let clock = match config.real_time {
			Some(ref settings) => Some(RealTimeClock::new(settings)?),
			None => None,
		};
		let rng = new_rng(config.seed, 0);
		Ok(SimState {
			config,
			run_state: RunState::NotInitialized,
			time: Time(0),
			replication: None,
			events: EventList::new(),
			stats: Statistics::new(),
			rng,
			logger,
			pending: Vec::new(),
			clock,
			wall_clock: Box::new(SystemWallClock),
			gate: None,
			granted: Time(0),
			warmup_reached: false,
			executed: 0,
			failures: 0,
			stop_at: None,
			generation: 0,
			in_flight: false,
			worker_active: false,
			dispatching: false,
			wake: false,
		})
	}

	pub fn log(&mut self, level: LogLevel, topic: &str, message: &str)
	{
		self.logger.log(self.time, level, topic, message);
	}

	pub fn end_time(&self) -> Option<Time>
	{
		self.replication.as_ref().map(|r| r.end)
	}

	pub fn initialize(&mut self, replication: Replication) -> Result<(), SimError>
	{
		if self.run_state == RunState::Running {
			return Err(SimError::Runtime(format!("can't initialize replication {} while running", replication.id)));
		}

		self.time = replication.start;
		self.events.clear();
		self.stats.reset();
		self.rng = new_rng(self.config.seed, replication.id);
		self.warmup_reached = false;
		self.executed = 0;
		self.failures = 0;
		self.stop_at = None;
		self.granted = replication.start;
		self.generation += 1;
		self.run_state = RunState::Initialized;
		self.rebaseline();

		let message = format!("initialized replication {} (warmup {}, end {})", replication.id, replication.warmup, replication.end);
		self.log(LogLevel::Info, "simulator", &message);
		self.pending.push(SimNotification::StartReplication{replication: replication.clone(), time: self.time});
		self.replication = Some(replication);
		self.check_warmup();
		Ok(())
	}

	pub fn check_startable(&self, what: &str) -> Result<Time, SimError>
	{
		if self.in_flight {
			return Err(SimError::Runtime(format!("can't {} while an event is executing", what)));
		}
		let end = match self.run_state {
			RunState::NotInitialized => return Err(SimError::Runtime(format!("can't {} before a replication has been loaded", what))),
			RunState::Running => return Err(SimError::Runtime(format!("can't {} while running", what))),
			_ => match self.end_time() {
				Some(end) => end,
				None => return Err(SimError::Runtime(format!("can't {} without a replication", what))),
			}
		};
		if self.time >= end {
			return Err(SimError::Runtime(format!("can't {} a finished run (time {} end {})", what, self.time, end)));
		}
		Ok(end)
	}

	pub fn start(&mut self) -> Result<(), SimError>
	{
		self.check_startable("start")?;
		self.run_state = RunState::Running;
		self.rebaseline();	// time spent paused shouldn't count as lag
		self.wake = true;
		self.log(LogLevel::Info, "simulator", "started");
		self.pending.push(SimNotification::Started(self.time));
		Ok(())
	}

	/// Running -> Stopped.
	pub fn pause(&mut self)
	{
		if self.run_state == RunState::Running {
			self.run_state = RunState::Stopped;
			self.wake = true;
			self.log(LogLevel::Info, "simulator", "stopped");
			self.pending.push(SimNotification::Stopped(self.time));

			if let Some(end) = self.end_time() {
				if self.time >= end {
					self.end_replication();
				}
			}
		}
	}

	pub fn schedule<F>(&mut self, time: Time, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		if self.replication.is_none() {
			return Err(SimError::Schedule(format!("can't schedule {} before a replication has been loaded", name)));
		}
		if name.is_empty() {
			return Err(SimError::Schedule("events need a name".to_string()));
		}

		let id = self.events.schedule(SimEvent::new(time, priority, name, action), self.time)?;
		self.wake = true;
		if self.logger.should_log(LogLevel::Excessive, name) {
			let message = format!("scheduled {} at {} priority {}", id, time, priority);
			self.log(LogLevel::Excessive, name, &message);
		}
		Ok(id)
	}

	pub fn cancel(&mut self, id: EventId) -> bool
	{
		let cancelled = self.events.cancel(id);
		if cancelled {
			self.wake = true;
			let message = format!("cancelled {}", id);
			self.log(LogLevel::Debug, "simulator", &message);
		}
		cancelled
	}

	pub fn results(&self) -> Option<ReplicationResults>
	{
		self.replication.as_ref().map(|replication| ReplicationResults {
			replication: replication.clone(),
			end_time: self.time,
			events_executed: self.executed,
			failures: self.failures,
			tallies: self.stats.tally_summaries(),
			counters: self.stats.counter_values(),
		})
	}

	/// Decides what the run loop does next. Events are only popped here, the
	/// caller executes them after listeners have seen the time change.
	pub fn plan(&mut self) -> Plan
	{
		let end = match self.end_time() {
			Some(end) => end,
			None => {
				self.pause();
				return Plan::Continue;
			}
		};

		let next = self.events.peek_time().and_then(|t| if t <= end {Some(t)} else {None});
		let mut target = next.unwrap_or(end);
		let mut pausing = false;
		if let Some(stop_at) = self.stop_at {
			if stop_at < target {
				target = stop_at;
				pausing = true;
			}
		}

		if self.clock.is_some() {
			let wall_now = self.wall_clock.now_secs();
			let (time, units) = (self.time, self.config.time_units);
			let pace = match self.clock {
				Some(ref mut clock) => clock.pace(wall_now, time, target, units),
				None => Pace::Due,
			};
			if let Pace::Sleep{advance_to, millis} = pace {
				if let Some(to) = advance_to {
					self.advance(to);
				}
				return Plan::Wait(millis);
			}
		}

		if self.in_flight {
			return Plan::Wait(1);
		}

		if target > self.granted && self.gate.is_some() {
			return Plan::Grant(target);
		}

		if pausing {
			self.advance(target);
			self.stop_at = None;
			self.pause();
			Plan::Continue

		} else if next.is_some() {
			match self.events.remove_first() {
				Ok(event) => {
					self.in_flight = true;
					self.advance(event.time);
					Plan::Execute(event, self.generation)
				},
				Err(err) => {
					// peek_time said there was an event so this is a bug in the loop
					self.log(LogLevel::Error, "simulator", &err.to_string());
					self.pause();
					Plan::Continue
				}
			}

		} else {
			self.advance(end);
			self.end_replication();
			Plan::Continue
		}
	}

	/// Moves the clock forward, never backwards.
	pub fn advance(&mut self, to: Time)
	{
		if to > self.time {
			self.time = to;
			self.pending.push(SimNotification::TimeChanged(to));
		}
		self.check_warmup();
	}

	fn check_warmup(&mut self)
	{
		let warmup = match self.replication {
			Some(ref replication) => replication.warmup,
			None => return,
		};
		if !self.warmup_reached && self.time >= warmup {
			self.warmup_reached = true;
			self.stats.reset();
			self.log(LogLevel::Debug, "simulator", "warmup reached");
			self.pending.push(SimNotification::WarmupReached(self.time));
		}
	}

	pub fn end_replication(&mut self)
	{
		self.run_state = RunState::Ended;
		self.stop_at = None;
		self.wake = true;
		if let Some(results) = self.results() {
			let message = format!("replication {} ended after {} events", results.replication.id, results.events_executed);
			self.log(LogLevel::Info, "simulator", &message);
			self.pending.push(SimNotification::EndReplication(results));
		}
	}

	/// Finishes an event popped by plan or step. Events popped before the
	/// last initialize are dropped. Returns true if the action ran.
	pub fn run_popped(&mut self, event: SimEvent, generation: u64) -> bool
	{
		self.in_flight = false;
		self.wake = true;
		if self.generation == generation {
			self.execute(event);
			true
		} else {
			false
		}
	}

	/// Runs the event's action. Errors and panics are logged, reported to listeners,
	/// and, if configured, pause the run. They never escape.
	pub fn execute(&mut self, event: SimEvent)
	{
		let (id, time, name) = (event.id, event.time, event.name.clone());
		self.executed += 1;
		if self.logger.should_log(LogLevel::Excessive, &name) {
			let message = format!("executing {}", id);
			self.log(LogLevel::Excessive, &name, &message);
		}

		let action = event.into_action();
		let result = {
			let mut context = Context::new(self, &name);
			panic::catch_unwind(AssertUnwindSafe(|| action(&mut context)))
		};
		let failure = match result {
			Ok(Ok(())) => None,
			Ok(Err(err)) => Some(err.to_string()),
			Err(payload) => Some(panic_message(payload)),
		};

		if let Some(message) = failure {
			self.failures += 1;
			let err = EventError{time, id, name: name.clone(), message};
			self.log(LogLevel::Error, &name, &err.to_string());
			self.pending.push(SimNotification::EventFailed(err));
			if self.config.pause_on_error {
				self.pause();
			}
		}
	}

	fn rebaseline(&mut self)
	{
		let time = self.time;
		if let Some(ref mut clock) = self.clock {
			clock.rebaseline(self.wall_clock.now_secs(), time);
		}
	}
}

pub fn panic_message(payload: Box<dyn Any + Send>) -> String
{
	if let Some(message) = payload.downcast_ref::<&str>() {
		format!("panicked: {}", message)
	} else if let Some(message) = payload.downcast_ref::<String>() {
		format!("panicked: {}", message)
	} else {
		"panicked".to_string()
	}
}

// We care about speed much more than we care about a cryptographic RNG so
// XorShiftRng should be plenty good enough.
pub fn new_rng(seed: u32, offset: u32) -> XorShiftRng
{
	let seed = if seed != 0 {seed} else {get_time().nsec as u32};
	let seed = seed.wrapping_add(offset);	// offset is used to give each replication its own random stream
	let seed = if seed != 0 {seed} else {1};	// XorShift can't be all zeros
	XorShiftRng::from_seed([seed; 4])
}
