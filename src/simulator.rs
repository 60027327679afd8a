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
use listener::*;
use logging::*;
use realtime::*;
use replication::*;
use sim_state::*;
use sim_time::*;
use std::io::Write;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// This is the top-level handle. Clones refer to the same simulator so it
/// can be shared with other threads (e.g. a GUI or a network connection)
/// which may schedule events, start, stop, and step the simulation.
///
/// Runs happen on a worker thread which is spawned by `start`. All of the
/// event list and clock mutation happens while holding a single lock.
/// Listeners are notified after that lock has been released.
#[derive(Clone)]
pub struct Simulator
{
	shared: Arc<Shared>,
}

struct Shared
{
	state: Mutex<SimState>,
	wake: Condvar,	// signalled when a sleeping real time loop should re-plan
	idle: Condvar,	// signalled when the worker exits or notifications have drained
	listeners: Mutex<Listeners>,
}

struct Listeners
{
	entries: Vec<(ListenerId, Box<dyn SimListener>)>,
	next_id: u64,
	taken: Vec<ListenerId>,		// ids of the entries currently being notified
	removed: Vec<ListenerId>,	// removed while they were being notified
}

impl Simulator
{
	/// Logs to stdout.
	pub fn new(config: Config) -> Result<Simulator, SimError>
	{
		let logger = Logger::new(&config);
		Simulator::with_logger(config, logger)
	}

	pub fn with_log_writer(config: Config, out: Box<dyn Write + Send>) -> Result<Simulator, SimError>
	{
		let logger = Logger::with_writer(&config, out);
		Simulator::with_logger(config, logger)
	}

	pub fn with_logger(config: Config, logger: Logger) -> Result<Simulator, SimError>
	{
		let state = SimState::new(config, logger)?;
		Ok(Simulator {
			shared: Arc::new(Shared {
				state: Mutex::new(state),
				wake: Condvar::new(),
				idle: Condvar::new(),
				listeners: Mutex::new(Listeners{entries: Vec::new(), next_id: 0, taken: Vec::new(), removed: Vec::new()}),
			}),
		})
	}

	/// Loads a replication: the clock is set to its start time, pending events
	/// are dropped, and statistics and the random stream are reset. Fails if
	/// the simulator is running.
	pub fn initialize(&self, replication: Replication) -> Result<(), SimError>
	{
		let result = self.lock().initialize(replication);
		self.flush();
		result
	}

	/// Begins running on the worker thread. Fails if no replication has been
	/// loaded, if already running, or if the replication has finished.
	pub fn start(&self) -> Result<(), SimError>
	{
		let spawn = {
			let mut state = self.lock();
			state.start()?;
			let spawn = !state.worker_active;
			state.worker_active = true;
			spawn
		};
		self.shared.wake.notify_all();

		if spawn {
			let simulator = self.clone();
			let spawned = thread::Builder::new()
				.name("simulator".to_string())
				.spawn(move || simulator.run_loop());
			if let Err(err) = spawned {
				let mut state = self.lock();
				state.worker_active = false;
				state.pause();
				drop(state);
				self.flush();
				return Err(SimError::Runtime(format!("couldn't spawn the simulator thread: {}", err)));
			}
		}

		self.flush();
		Ok(())
	}

	/// Like start but pauses once the clock would move past time. Events
	/// scheduled at exactly time are executed.
	pub fn run_up_to(&self, time: Time) -> Result<(), SimError>
	{
		{
			let mut state = self.lock();
			if time < state.time {
				return Err(SimError::Runtime(format!("can't run up to {} because the current time is {}", time, state.time)));
			}
			state.check_startable("run")?;
			state.stop_at = Some(time);
		}
		let result = self.start();
		if result.is_err() {
			self.lock().stop_at = None;
		}
		result
	}

	/// Pauses the run. This is cooperative: an executing event finishes first.
	pub fn stop(&self) -> Result<(), SimError>
	{
		{
			let mut state = self.lock();
			if state.run_state != RunState::Running {
				return Err(SimError::Runtime("can't stop a simulator that isn't running".to_string()));
			}
			state.pause();
		}
		self.shared.wake.notify_all();
		self.flush();
		Ok(())
	}

	/// Executes exactly one event on the calling thread.
	pub fn step(&self) -> Result<(), SimError>
	{
		let popped = {
			let mut state = self.lock();
			let end = state.check_startable("step")?;
			match state.events.peek_time() {
				None => return Err(SimError::Runtime("there is no event to step to".to_string())),
				Some(t) if t > end => {
					state.advance(end);
					state.end_replication();
					None
				},
				Some(_) => {
					let event = state.events.remove_first()?;
					state.in_flight = true;
					state.advance(event.time);
					Some((event, state.generation))
				},
			}
		};
		self.flush();	// listeners see the new time before the event executes

		if let Some((event, generation)) = popped {
			{
				let mut state = self.lock();
				if state.run_popped(event, generation) {
					let time = state.time;
					state.pending.push(SimNotification::Stepped(time));
					if state.end_time().map_or(false, |end| time >= end) && state.run_state != RunState::Ended {
						state.end_replication();
					}
				}
			}
			self.flush();
		}
		Ok(())
	}

	/// Blocks until the worker thread has exited and all notifications have
	/// been delivered. Must not be called from a listener or an event.
	pub fn wait(&self)
	{
		let mut state = self.lock();
		while state.worker_active || state.dispatching {
			state = match self.shared.idle.wait(state) {
				Ok(guard) => guard,
				Err(poisoned) => poisoned.into_inner(),
			};
		}
	}

	/// start followed by wait.
	pub fn run(&self) -> Result<(), SimError>
	{
		self.start()?;
		self.wait();
		Ok(())
	}

	pub fn schedule<F>(&self, time: Time, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		let id = self.lock().schedule(time, priority, name, action)?;
		self.shared.wake.notify_all();
		Ok(id)
	}

	pub fn schedule_after<F>(&self, delay: TimeDelta, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		let id = {
			let mut state = self.lock();
			let time = state.time + delay;
			state.schedule(time, priority, name, action)?
		};
		self.shared.wake.notify_all();
		Ok(id)
	}

	pub fn schedule_after_secs<F>(&self, secs: f64, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		let delay = self.lock().config.secs_to_delta(secs);
		self.schedule_after(delay, priority, name, action)
	}

	pub fn schedule_now<F>(&self, priority: i32, name: &str, action: F) -> Result<EventId, SimError>
		where F: FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		self.schedule_after(TimeDelta(0), priority, name, action)
	}

	/// Returns false if the event already ran or was already cancelled.
	pub fn cancel(&self, id: EventId) -> bool
	{
		let cancelled = self.lock().cancel(id);
		self.shared.wake.notify_all();
		cancelled
	}

	/// The current simulation time.
	pub fn time(&self) -> Time
	{
		self.lock().time
	}

	pub fn run_state(&self) -> RunState
	{
		self.lock().run_state
	}

	pub fn is_running(&self) -> bool
	{
		self.run_state() == RunState::Running
	}

	pub fn replication(&self) -> Option<Replication>
	{
		self.lock().replication.clone()
	}

	/// What the current replication has collected so far.
	pub fn results(&self) -> Option<ReplicationResults>
	{
		self.lock().results()
	}

	pub fn event_count(&self) -> usize
	{
		self.lock().events.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.lock().events.is_empty()
	}

	pub fn peek_time(&self) -> Option<Time>
	{
		self.lock().events.peek_time()
	}

	pub fn time_units(&self) -> f64
	{
		self.lock().config.time_units
	}

	pub fn speed_factor(&self) -> Option<f64>
	{
		self.lock().clock.as_ref().map(|clock| clock.speed_factor())
	}

	/// Only valid for real time simulators. Both clock origins are rebaselined
	/// so the simulation time doesn't jump.
	pub fn set_speed_factor(&self, speed_factor: f64) -> Result<(), SimError>
	{
		{
			let mut state = self.lock();
			let wall_now = state.wall_clock.now_secs();
			let time = state.time;
			match state.clock {
				Some(ref mut clock) => clock.set_speed_factor(speed_factor, wall_now, time)?,
				None => return Err(SimError::Runtime("the speed factor can only be set for real time simulators".to_string())),
			}
			state.wake = true;
			let message = format!("speed factor is now {}", speed_factor);
			state.log(LogLevel::Info, "simulator", &message);
		}
		self.shared.wake.notify_all();
		Ok(())
	}

	/// Replaces the wall clock used by real time runs.
	pub fn set_wall_clock(&self, clock: Box<dyn WallClock>)
	{
		let mut state = self.lock();
		state.wall_clock = clock;
		let time = state.time;
		let wall_now = state.wall_clock.now_secs();
		if let Some(ref mut rt) = state.clock {
			rt.rebaseline(wall_now, time);
		}
	}

	/// Installs (or removes) the hook consulted before the run loop advances
	/// the clock. Stepping does not consult the gate.
	pub fn set_advance_gate(&self, gate: Option<Box<dyn AdvanceGate>>)
	{
		let mut state = self.lock();
		let time = state.time;
		state.granted = time;
		state.gate = gate;
	}

	/// Logs with a "simulator" topic.
	pub fn log(&self, level: LogLevel, message: &str)
	{
		self.lock().log(level, "simulator", message);
	}

	pub fn add_listener<L>(&self, listener: L) -> ListenerId
		where L: SimListener + 'static
	{
		let mut listeners = self.lock_listeners();
		listeners.next_id += 1;
		let id = ListenerId(listeners.next_id);
		listeners.entries.push((id, Box::new(listener)));
		id
	}

	/// Returns false if the listener wasn't found.
	pub fn remove_listener(&self, id: ListenerId) -> bool
	{
		let mut listeners = self.lock_listeners();
		let count = listeners.entries.len();
		listeners.entries.retain(|entry| entry.0 != id);
		if listeners.entries.len() < count {
			true
		} else if listeners.taken.contains(&id) && !listeners.removed.contains(&id) {
			listeners.removed.push(id);
			true
		} else {
			false
		}
	}

	pub fn listener_count(&self) -> usize
	{
		let listeners = self.lock_listeners();
		listeners.entries.len() + listeners.taken.len() - listeners.removed.len()
	}

	/// Queues a notification for delivery to the listeners.
	pub(crate) fn post(&self, notification: SimNotification)
	{
		self.lock().pending.push(notification);
		self.flush();
	}

	fn lock(&self) -> MutexGuard<SimState>
	{
		self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn lock_listeners(&self) -> MutexGuard<Listeners>
	{
		self.shared.listeners.lock().unwrap_or_else(|e| e.into_inner())
	}

	// Only one thread delivers notifications at a time. If a delivery is already
	// in progress (on this thread or another) the new notifications are picked
	// up by that delivery. Lock order is listeners before state.
	fn flush(&self)
	{
		let mut batch = {
			let mut state = self.lock();
			if state.dispatching || state.pending.is_empty() {
				return;
			}
			state.dispatching = true;
			mem::replace(&mut state.pending, Vec::new())
		};

		loop {
			let mut entries = {
				let mut listeners = self.lock_listeners();
				let entries = mem::replace(&mut listeners.entries, Vec::new());
				listeners.taken = entries.iter().map(|entry| entry.0).collect();
				entries
			};

			for notification in batch.iter() {
				for entry in entries.iter_mut() {
					let listener = &mut entry.1;
					let result = panic::catch_unwind(AssertUnwindSafe(|| listener.notify(notification, self)));
					if let Err(payload) = result {
						let message = format!("listener {} {}", (entry.0).0, panic_message(payload));
						self.lock().log(LogLevel::Error, "simulator", &message);
					}
				}
			}

			let mut listeners = self.lock_listeners();
			let removed = mem::replace(&mut listeners.removed, Vec::new());
			entries.retain(|entry| !removed.contains(&entry.0));
			let added = mem::replace(&mut listeners.entries, Vec::new());
			entries.extend(added);
			listeners.entries = entries;
			listeners.taken.clear();

			let mut state = self.lock();
			if state.pending.is_empty() {
				state.dispatching = false;
				self.shared.idle.notify_all();
				return;
			}
			batch = mem::replace(&mut state.pending, Vec::new());
		}
	}

	fn run_loop(&self)
	{
		let mut guard = WorkerGuard{simulator: self, armed: true};
		loop {
			let plan = {
				let mut state = self.lock();
				if state.run_state != RunState::Running {
					state.worker_active = false;
					guard.armed = false;
					self.shared.idle.notify_all();
					break;
				}
				state.plan()
			};
			self.flush();

			match plan {
				Plan::Continue => (),
				Plan::Wait(millis) => {
					let mut state = self.lock();
					if state.run_state == RunState::Running && !state.wake {
						state = match self.shared.wake.wait_timeout(state, Duration::from_millis(millis)) {
							Ok((woken, _)) => woken,
							Err(poisoned) => poisoned.into_inner().0,
						};
					}
					state.wake = false;
				},
				Plan::Grant(target) => {
					let gate = self.lock().gate.take();
					if let Some(mut gate) = gate {
						gate.request_advance(target);

						let mut state = self.lock();
						if state.granted < target {
							state.granted = target;
						}
						if state.gate.is_none() {
							state.gate = Some(gate);
						}
					}
				},
				Plan::Execute(event, generation) => {
					self.lock().run_popped(event, generation);
					self.shared.wake.notify_all();
					self.flush();
				},
			}
		}
	}
}

// Makes sure that wait doesn't hang if a listener panics on the worker thread.
struct WorkerGuard<'a>
{
	simulator: &'a Simulator,
	armed: bool,
}

impl<'a> Drop for WorkerGuard<'a>
{
	fn drop(&mut self)
	{
		if self.armed {
			let mut state = self.simulator.lock();
			state.worker_active = false;
			state.dispatching = false;
			state.in_flight = false;
			if state.run_state == RunState::Running {
				state.run_state = RunState::Stopped;
			}
			self.simulator.shared.idle.notify_all();
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	type Names = Arc<Mutex<Vec<(String, Time)>>>;
	type Notifications = Arc<Mutex<Vec<SimNotification>>>;

	fn simulator(config: Config) -> (Simulator, LogBuffer)
	{
		let buffer = LogBuffer::new();
		let sim = Simulator::with_log_writer(config, Box::new(buffer.clone())).unwrap();
		(sim, buffer)
	}

	fn initialized(end: i64) -> Simulator
	{
		let mut config = Config::new();
		config.seed = 7;
		let (sim, _) = simulator(config);
		sim.initialize(Replication::with_end(0, Time(end)).unwrap()).unwrap();
		sim
	}

	fn record_notifications(sim: &Simulator) -> Notifications
	{
		let notifications = Arc::new(Mutex::new(Vec::new()));
		let copy = notifications.clone();
		sim.add_listener(move |notification: &SimNotification, _: &Simulator| {
			copy.lock().unwrap().push(notification.clone());
		});
		notifications
	}

	fn record(names: &Names, name: &'static str) -> impl FnOnce(&mut Context) -> EventResult + Send + 'static
	{
		let names = names.clone();
		move |ctx| {
			names.lock().unwrap().push((name.to_string(), ctx.time()));
			Ok(())
		}
	}

	fn executed(names: &Names) -> Vec<String>
	{
		names.lock().unwrap().iter().map(|entry| entry.0.clone()).collect()
	}

	fn count<F>(notifications: &Notifications, predicate: F) -> usize
		where F: Fn(&SimNotification) -> bool
	{
		notifications.lock().unwrap().iter().filter(|n| predicate(n)).count()
	}

	struct RecordingGate
	{
		requests: Arc<Mutex<Vec<Time>>>,
	}

	impl AdvanceGate for RecordingGate
	{
		fn request_advance(&mut self, to: Time)
		{
			self.requests.lock().unwrap().push(to);
		}
	}

	#[test]
	fn executes_in_time_order()
	{
		let sim = initialized(10);
		let notifications = record_notifications(&sim);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(3), NORMAL_PRIORITY, "c", record(&names, "c")).unwrap();
		sim.schedule(Time(1), NORMAL_PRIORITY, "a", record(&names, "a")).unwrap();
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();
		sim.run().unwrap();

		let names = names.lock().unwrap().clone();
		assert_eq!(names, vec![("a".to_string(), Time(1)), ("b".to_string(), Time(2)), ("c".to_string(), Time(3))]);
		assert_eq!(sim.time(), Time(10));
		assert_eq!(sim.run_state(), RunState::Ended);

		let ends: Vec<Time> = notifications.lock().unwrap().iter().filter_map(|n| match *n {
			SimNotification::EndReplication(ref results) => Some(results.end_time),
			_ => None,
		}).collect();
		assert_eq!(ends, vec![Time(10)]);
	}

	#[test]
	fn ties_are_fifo()
	{
		let sim = initialized(10);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(5), NORMAL_PRIORITY, "A", record(&names, "A")).unwrap();
		sim.schedule(Time(5), NORMAL_PRIORITY, "B", record(&names, "B")).unwrap();
		sim.schedule(Time(5), MAX_PRIORITY, "urgent", record(&names, "urgent")).unwrap();
		sim.run().unwrap();

		assert_eq!(executed(&names), vec!["urgent", "A", "B"]);
	}

	#[test]
	fn cancelled_events_never_run()
	{
		let sim = initialized(10);
		let names = Arc::new(Mutex::new(Vec::new()));
		let a = sim.schedule(Time(5), NORMAL_PRIORITY, "A", record(&names, "A")).unwrap();
		sim.schedule(Time(5), NORMAL_PRIORITY, "B", record(&names, "B")).unwrap();
		assert!(sim.cancel(a));
		assert!(!sim.cancel(a));
		assert_eq!(sim.event_count(), 1);
		sim.run().unwrap();

		assert_eq!(executed(&names), vec!["B"]);
	}

	#[test]
	fn stepping()
	{
		let sim = initialized(10);
		let notifications = record_notifications(&sim);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(1), NORMAL_PRIORITY, "a", record(&names, "a")).unwrap();
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();

		sim.step().unwrap();
		assert_eq!(sim.time(), Time(1));
		assert_eq!(executed(&names), vec!["a"]);

		sim.step().unwrap();
		assert_eq!(sim.time(), Time(2));
		assert_eq!(executed(&names), vec!["a", "b"]);
		assert_eq!(sim.run_state(), RunState::Initialized);

		assert!(sim.step().is_err());	// nothing left to step to
		assert_eq!(count(&notifications, |n| if let SimNotification::Stepped(_) = *n {true} else {false}), 2);
	}

	#[test]
	fn stepping_past_the_end()
	{
		let sim = initialized(10);
		let notifications = record_notifications(&sim);
		sim.schedule(Time(20), NORMAL_PRIORITY, "late", |_| Ok(())).unwrap();

		sim.step().unwrap();
		assert_eq!(sim.time(), Time(10));
		assert_eq!(sim.run_state(), RunState::Ended);
		assert_eq!(count(&notifications, |n| if let SimNotification::EndReplication(_) = *n {true} else {false}), 1);
		assert!(sim.step().is_err());
	}

	#[test]
	fn finished_runs_cant_restart()
	{
		let sim = initialized(10);
		sim.schedule(Time(20), NORMAL_PRIORITY, "late", |_| Ok(())).unwrap();
		sim.run().unwrap();

		assert!(sim.start().is_err());
		assert!(sim.stop().is_err());
		assert_eq!(sim.time(), Time(10));
		assert_eq!(sim.event_count(), 1);
		assert_eq!(sim.run_state(), RunState::Ended);
	}

	#[test]
	fn needs_a_replication()
	{
		let (sim, _) = simulator(Config::new());
		assert_eq!(sim.run_state(), RunState::NotInitialized);
		assert!(sim.start().is_err());
		assert!(sim.step().is_err());
		match sim.schedule(Time(1), NORMAL_PRIORITY, "early", |_| Ok(())) {
			Err(SimError::Schedule(_)) => (),
			result => panic!("expected a schedule error but found {:?}", result),
		}
	}

	#[test]
	fn scheduling_in_the_past()
	{
		let sim = initialized(10);
		sim.schedule(Time(5), NORMAL_PRIORITY, "five", |_| Ok(())).unwrap();
		sim.step().unwrap();

		match sim.schedule(Time(4), NORMAL_PRIORITY, "past", |_| Ok(())) {
			Err(SimError::Schedule(_)) => (),
			result => panic!("expected a schedule error but found {:?}", result),
		}
		assert!(sim.schedule(Time(5), NORMAL_PRIORITY, "now", |_| Ok(())).is_ok());
		assert!(sim.schedule_now(NORMAL_PRIORITY, "also now", |_| Ok(())).is_ok());
		assert_eq!(sim.event_count(), 2);
	}

	#[test]
	fn events_can_schedule_events()
	{
		let sim = initialized(100);
		let names = Arc::new(Mutex::new(Vec::new()));
		let copy = names.clone();
		sim.schedule(Time(1), NORMAL_PRIORITY, "parent", move |ctx| {
			ctx.schedule_after(TimeDelta(4), NORMAL_PRIORITY, "child", record(&copy, "child"))?;
			ctx.schedule_now(NORMAL_PRIORITY, "sibling", record(&copy, "sibling"))?;
			Ok(())
		}).unwrap();
		sim.run().unwrap();

		let names = names.lock().unwrap().clone();
		assert_eq!(names, vec![("sibling".to_string(), Time(1)), ("child".to_string(), Time(5))]);
	}

	#[test]
	fn time_never_goes_backwards()
	{
		let sim = initialized(1000);
		let notifications = record_notifications(&sim);
		for t in vec![50, 10, 900, 10, 300, 999, 1] {
			sim.schedule(Time(t), NORMAL_PRIORITY, "tick", |_| Ok(())).unwrap();
		}
		sim.run().unwrap();

		let times: Vec<Time> = notifications.lock().unwrap().iter().filter_map(|n| match *n {
			SimNotification::TimeChanged(time) => Some(time),
			_ => None,
		}).collect();
		assert_eq!(times, vec![Time(1), Time(10), Time(50), Time(300), Time(900), Time(999), Time(1000)]);
	}

	#[test]
	fn failures_pause()
	{
		let (sim, buffer) = simulator(Config::new());
		sim.initialize(Replication::with_end(0, Time(10)).unwrap()).unwrap();
		let notifications = record_notifications(&sim);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(1), NORMAL_PRIORITY, "broken", |_| Err(From::from("out of widgets"))).unwrap();
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();
		sim.run().unwrap();

		assert_eq!(sim.run_state(), RunState::Stopped);
		assert_eq!(sim.time(), Time(1));
		assert!(executed(&names).is_empty());
		assert_eq!(sim.results().unwrap().failures, 1);
		assert_eq!(count(&notifications, |n| if let SimNotification::EventFailed(_) = *n {true} else {false}), 1);
		assert!(buffer.contents().contains("out of widgets"));

		sim.run().unwrap();	// can resume after a failure
		assert_eq!(executed(&names), vec!["b"]);
		assert_eq!(sim.run_state(), RunState::Ended);
	}

	#[test]
	fn failures_can_be_ignored()
	{
		let mut config = Config::new();
		config.pause_on_error = false;
		let (sim, buffer) = simulator(config);
		sim.initialize(Replication::with_end(0, Time(10)).unwrap()).unwrap();
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(1), NORMAL_PRIORITY, "panicky", |_| panic!("boom")).unwrap();
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();
		sim.run().unwrap();

		assert_eq!(sim.run_state(), RunState::Ended);
		assert_eq!(executed(&names), vec!["b"]);

		let results = sim.results().unwrap();
		assert_eq!(results.failures, 1);
		assert_eq!(results.events_executed, 2);
		assert!(buffer.contents().contains("panicked: boom"));
	}

	#[test]
	fn events_can_stop_the_run()
	{
		let sim = initialized(10);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(2), NORMAL_PRIORITY, "halt", |ctx| {ctx.stop(); Ok(())}).unwrap();
		sim.schedule(Time(4), NORMAL_PRIORITY, "d", record(&names, "d")).unwrap();
		sim.run().unwrap();

		assert_eq!(sim.run_state(), RunState::Stopped);
		assert_eq!(sim.time(), Time(2));
		assert!(executed(&names).is_empty());
	}

	#[test]
	fn running_up_to()
	{
		let sim = initialized(10);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();
		sim.schedule(Time(4), NORMAL_PRIORITY, "d", record(&names, "d")).unwrap();
		sim.schedule(Time(6), NORMAL_PRIORITY, "f", record(&names, "f")).unwrap();

		sim.run_up_to(Time(4)).unwrap();
		sim.wait();
		assert_eq!(executed(&names), vec!["b", "d"]);
		assert_eq!(sim.time(), Time(4));
		assert_eq!(sim.run_state(), RunState::Stopped);
		assert!(sim.run_up_to(Time(3)).is_err());

		sim.run().unwrap();
		assert_eq!(executed(&names), vec!["b", "d", "f"]);
		assert_eq!(sim.time(), Time(10));
	}

	#[test]
	fn warmup_resets_statistics()
	{
		let sim = initialized(10);
		sim.initialize(Replication::new(1, Time(0), Time(5), Time(10)).unwrap()).unwrap();
		let notifications = record_notifications(&sim);
		sim.schedule(Time(2), NORMAL_PRIORITY, "early", |ctx| {ctx.count("arrivals", 1); ctx.tally("wait", 10.0); Ok(())}).unwrap();
		sim.schedule(Time(7), NORMAL_PRIORITY, "late", |ctx| {ctx.count("arrivals", 1); ctx.tally("wait", 2.0); Ok(())}).unwrap();
		sim.run().unwrap();

		let results = sim.results().unwrap();
		assert_eq!(results.counters.get("arrivals"), Some(&1));
		assert_eq!(results.tallies.get("wait").map(|t| t.count), Some(1));
		assert_eq!(count(&notifications, |n| if let SimNotification::WarmupReached(_) = *n {true} else {false}), 1);
	}

	#[test]
	fn initialize_resets()
	{
		let sim = initialized(10);
		sim.schedule(Time(3), NORMAL_PRIORITY, "three", |_| Ok(())).unwrap();
		sim.step().unwrap();
		sim.schedule(Time(8), NORMAL_PRIORITY, "eight", |_| Ok(())).unwrap();

		sim.initialize(Replication::with_end(1, Time(20)).unwrap()).unwrap();
		assert_eq!(sim.time(), Time(0));
		assert!(sim.is_empty());
		assert_eq!(sim.run_state(), RunState::Initialized);
		assert_eq!(sim.replication().map(|r| r.id), Some(1));
		assert_eq!(sim.results().unwrap().events_executed, 0);
	}

	#[test]
	fn advance_gate_sees_every_time()
	{
		let sim = initialized(6);
		let requests = Arc::new(Mutex::new(Vec::new()));
		sim.set_advance_gate(Some(Box::new(RecordingGate{requests: requests.clone()})));
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", |_| Ok(())).unwrap();
		sim.schedule(Time(4), NORMAL_PRIORITY, "d", |_| Ok(())).unwrap();
		sim.run().unwrap();

		assert_eq!(*requests.lock().unwrap(), vec![Time(2), Time(4), Time(6)]);
	}

	#[test]
	fn listeners_can_be_removed()
	{
		let sim = initialized(10);
		let notifications = record_notifications(&sim);
		let id = sim.add_listener(|_: &SimNotification, _: &Simulator| ());
		assert_eq!(sim.listener_count(), 2);
		assert!(sim.remove_listener(id));
		assert!(!sim.remove_listener(id));
		assert_eq!(sim.listener_count(), 1);

		sim.run().unwrap();
		assert_eq!(count(&notifications, |n| if let SimNotification::Started(_) = *n {true} else {false}), 1);
	}

	#[test]
	fn speed_factor_needs_real_time()
	{
		let sim = initialized(10);
		assert_eq!(sim.speed_factor(), None);
		assert!(sim.set_speed_factor(2.0).is_err());

		let mut config = Config::new();
		config.real_time = Some(RealTimeSettings::new(1.0));
		let (sim, _) = simulator(config);
		assert!(sim.set_speed_factor(2.0).is_ok());
		assert_eq!(sim.speed_factor(), Some(2.0));
		assert!(sim.set_speed_factor(0.0).is_err());
		assert!(sim.set_speed_factor(-1.0).is_err());
		assert_eq!(sim.speed_factor(), Some(2.0));
	}

	#[test]
	fn fast_real_time()
	{
		let mut config = Config::new();
		config.real_time = Some(RealTimeSettings::new(1000.0));
		let (sim, _) = simulator(config);
		sim.initialize(Replication::with_end(0, Time(500_000)).unwrap()).unwrap();	// half a second
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(100_000), NORMAL_PRIORITY, "a", record(&names, "a")).unwrap();
		sim.schedule(Time(200_000), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();
		sim.run().unwrap();

		let names = names.lock().unwrap().clone();
		assert_eq!(names, vec![("a".to_string(), Time(100_000)), ("b".to_string(), Time(200_000))]);
		assert_eq!(sim.time(), Time(500_000));
		assert_eq!(sim.run_state(), RunState::Ended);
	}

	#[test]
	fn manual_real_time()
	{
		let mut config = Config::new();
		config.real_time = Some(RealTimeSettings::new(1.0));
		let (sim, _) = simulator(config);
		let clock = ManualWallClock::new();
		sim.set_wall_clock(Box::new(clock.clone()));
		sim.initialize(Replication::with_end(0, Time(3_000_000)).unwrap()).unwrap();
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(1_000_000), NORMAL_PRIORITY, "a", record(&names, "a")).unwrap();

		sim.start().unwrap();
		assert!(executed(&names).is_empty());
		clock.advance_secs(5.0);
		sim.wait();

		assert_eq!(executed(&names), vec!["a"]);
		assert_eq!(sim.time(), Time(3_000_000));
		assert_eq!(sim.run_state(), RunState::Ended);
	}

	#[test]
	fn stopping_from_another_thread()
	{
		let mut config = Config::new();
		config.real_time = Some(RealTimeSettings::new(1.0));
		let (sim, _) = simulator(config);
		sim.set_wall_clock(Box::new(ManualWallClock::new()));
		sim.initialize(Replication::with_end(0, Time(100_000_000)).unwrap()).unwrap();
		sim.schedule(Time(50_000_000), NORMAL_PRIORITY, "later", |_| Ok(())).unwrap();

		sim.start().unwrap();
		assert!(sim.start().is_err());
		sim.stop().unwrap();
		sim.wait();

		assert_eq!(sim.run_state(), RunState::Stopped);
		assert_eq!(sim.time(), Time(0));
		assert_eq!(sim.event_count(), 1);
	}

	#[test]
	fn bad_time_units()
	{
		let mut config = Config::new();
		config.time_units = 0.0;
		assert!(Simulator::with_log_writer(config, Box::new(LogBuffer::new())).is_err());
	}

	#[test]
	fn nothing_runs_ahead_of_an_executing_event()
	{
		let sim = initialized(10);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(5), NORMAL_PRIORITY, "e5", record(&names, "e5")).unwrap();
		sim.schedule(Time(6), NORMAL_PRIORITY, "e6", record(&names, "e6")).unwrap();

		// Stop and step while e5 has been popped but hasn't run yet.
		let results = Arc::new(Mutex::new(Vec::new()));
		let copy = results.clone();
		sim.add_listener(move |notification: &SimNotification, simulator: &Simulator| {
			if *notification == SimNotification::TimeChanged(Time(5)) {
				let mut results = copy.lock().unwrap();
				results.push(simulator.stop());
				results.push(simulator.step());
			}
		});
		sim.run().unwrap();

		{
			let results = results.lock().unwrap();
			assert_eq!(results.len(), 2);
			assert!(results[0].is_ok());
			match results[1] {
				Err(SimError::Runtime(_)) => (),
				ref result => panic!("expected a runtime error but found {:?}", result),
			}
		}
		assert_eq!(*names.lock().unwrap(), vec![("e5".to_string(), Time(5))]);
		assert_eq!(sim.time(), Time(5));
		assert_eq!(sim.run_state(), RunState::Stopped);

		sim.run().unwrap();
		assert_eq!(*names.lock().unwrap(), vec![("e5".to_string(), Time(5)), ("e6".to_string(), Time(6))]);
	}

	#[test]
	fn steps_cant_be_raced()
	{
		let sim = initialized(10);
		let names = Arc::new(Mutex::new(Vec::new()));
		sim.schedule(Time(1), NORMAL_PRIORITY, "a", record(&names, "a")).unwrap();
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();

		let starts = Arc::new(Mutex::new(Vec::new()));
		let copy = starts.clone();
		sim.add_listener(move |notification: &SimNotification, simulator: &Simulator| {
			if *notification == SimNotification::TimeChanged(Time(1)) {
				copy.lock().unwrap().push(simulator.start());
			}
		});
		sim.step().unwrap();

		assert_eq!(starts.lock().unwrap().len(), 1);
		assert!(starts.lock().unwrap()[0].is_err());
		assert_eq!(executed(&names), vec!["a"]);
		assert_eq!(sim.time(), Time(1));
		assert_eq!(sim.run_state(), RunState::Initialized);
	}

	#[test]
	fn listeners_can_schedule()
	{
		let sim = initialized(10);
		let names = Arc::new(Mutex::new(Vec::new()));
		let copy = names.clone();
		sim.add_listener(move |notification: &SimNotification, simulator: &Simulator| {
			if *notification == SimNotification::TimeChanged(Time(2)) {
				let result = simulator.schedule(Time(3), NORMAL_PRIORITY, "follow up", record(&copy, "follow up"));
				assert!(result.is_ok());
			}
		});
		sim.schedule(Time(2), NORMAL_PRIORITY, "b", record(&names, "b")).unwrap();
		sim.run().unwrap();

		let names = names.lock().unwrap().clone();
		assert_eq!(names, vec![("b".to_string(), Time(2)), ("follow up".to_string(), Time(3))]);
	}

	#[test]
	fn panicking_listeners_are_contained()
	{
		let (sim, buffer) = simulator(Config::new());
		let notifications = record_notifications(&sim);
		sim.add_listener(|notification: &SimNotification, _: &Simulator| {
			if let SimNotification::StartReplication{..} = *notification {
				panic!("listener bug");
			}
		});
		sim.initialize(Replication::with_end(0, Time(10)).unwrap()).unwrap();
		sim.schedule(Time(1), NORMAL_PRIORITY, "a", |_| Ok(())).unwrap();
		sim.run().unwrap();

		assert_eq!(sim.listener_count(), 2);
		assert_eq!(sim.run_state(), RunState::Ended);
		assert_eq!(count(&notifications, |n| if let SimNotification::StartReplication{..} = *n {true} else {false}), 1);
		assert_eq!(count(&notifications, |n| if let SimNotification::EndReplication(_) = *n {true} else {false}), 1);
		assert!(buffer.contents().contains("panicked: listener bug"));
	}
}
