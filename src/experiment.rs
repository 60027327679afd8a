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
use listener::*;
use replication::*;
use rustc_serialize::json::{Json, ToJson};
use simulator::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Implemented by models so that an `Experiment` can set them up for each
/// replication. This is called after the simulator has been initialized,
/// typically the model schedules its first events here. It must not start,
/// stop, or initialize the simulator.
pub trait Model: Send
{
	fn construct_model(&mut self, simulator: &Simulator, replication: &Replication) -> Result<(), SimError>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExperimentState
{
	Ready,

	/// Index of the current replication.
	Running(usize),

	Done,
}

/// Runs a sequence of replications, one after the other, on a single
/// `Simulator`. When a replication ends its results are harvested and the
/// next replication is initialized and started. After the last one an
/// `EndExperiment` notification is fired.
pub struct Experiment
{
	simulator: Simulator,
	shared: Arc<Shared>,
}

struct Shared
{
	inner: Mutex<Inner>,
	model: Mutex<Box<dyn Model>>,
}

struct Inner
{
	replications: Vec<Replication>,
	state: ExperimentState,
	results: Vec<ReplicationResults>,
	listener: Option<ListenerId>,
}

/// Listens for EndReplication notifications. Only one of these is ever
/// added to a simulator per experiment.
struct Controller
{
	shared: Arc<Shared>,
}

impl Experiment
{
	pub fn new<M>(simulator: Simulator, replications: Vec<Replication>, model: M) -> Result<Experiment, SimError>
		where M: Model + 'static
	{
		if replications.is_empty() {
			return Err(SimError::Runtime("experiments need at least one replication".to_string()));
		}

		let mut ids = HashSet::new();
		for replication in replications.iter() {
			if !ids.insert(replication.id) {
				return Err(SimError::Runtime(format!("replication id {} is used more than once", replication.id)));
			}
		}

		Ok(Experiment {
			simulator,
			shared: Arc::new(Shared {
				inner: Mutex::new(Inner{replications, state: ExperimentState::Ready, results: Vec::new(), listener: None}),
				model: Mutex::new(Box::new(model)),
			}),
		})
	}

	pub fn simulator(&self) -> &Simulator
	{
		&self.simulator
	}

	/// Adds the controller to the simulator's listeners. Calling this more
	/// than once returns the first id.
	pub fn subscribe(&self) -> ListenerId
	{
		let mut inner = self.shared.lock();
		if let Some(id) = inner.listener {
			return id;
		}

		let id = self.simulator.add_listener(Controller{shared: self.shared.clone()});
		inner.listener = Some(id);
		id
	}

	/// Runs the first replication, the rest are chained from the simulator's
	/// worker thread.
	pub fn start(&self) -> Result<(), SimError>
	{
		self.subscribe();
		let replication = {
			let mut inner = self.shared.lock();
			if inner.state != ExperimentState::Ready {
				return Err(SimError::Runtime("experiments can only be started once".to_string()));
			}
			inner.state = ExperimentState::Running(0);
			inner.replications[0].clone()
		};

		let result = self.shared.run_replication(&self.simulator, replication);
		if result.is_err() {
			self.shared.lock().state = ExperimentState::Done;
		}
		result
	}

	/// Blocks until the simulator goes idle, i.e. the experiment finished or
	/// a replication was paused.
	pub fn wait(&self) -> Vec<ReplicationResults>
	{
		self.simulator.wait();
		self.results()
	}

	/// start followed by wait.
	pub fn run(&self) -> Result<Vec<ReplicationResults>, SimError>
	{
		self.start()?;
		Ok(self.wait())
	}

	pub fn state(&self) -> ExperimentState
	{
		self.shared.lock().state
	}

	pub fn replications(&self) -> Vec<Replication>
	{
		self.shared.lock().replications.clone()
	}

	/// Results for the replications that have finished.
	pub fn results(&self) -> Vec<ReplicationResults>
	{
		self.shared.lock().results.clone()
	}

	pub fn report_json(&self) -> String
	{
		let inner = self.shared.lock();
		let mut object = BTreeMap::new();
		object.insert("replications".to_string(), Json::U64(inner.replications.len() as u64));
		object.insert("done".to_string(), Json::Boolean(inner.state == ExperimentState::Done));
		object.insert("results".to_string(), inner.results.to_json());
		format!("{}", Json::Object(object).pretty())
	}
}

impl Shared
{
	fn lock(&self) -> MutexGuard<Inner>
	{
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn run_replication(&self, simulator: &Simulator, replication: Replication) -> Result<(), SimError>
	{
		simulator.initialize(replication.clone())?;
		{
			let mut model = self.model.lock().unwrap_or_else(|e| e.into_inner());
			model.construct_model(simulator, &replication)?;
		}
		simulator.start()
	}

	fn end_of_replication(&self, simulator: &Simulator, results: &ReplicationResults)
	{
		let next = {
			let mut inner = self.lock();
			let index = match inner.state {
				ExperimentState::Running(index) => index,
				_ => return,
			};
			if inner.replications[index].id != results.replication.id || inner.results.len() > index {
				return;	// duplicate or stale notification
			}

			inner.results.push(results.clone());
			if index + 1 < inner.replications.len() {
				inner.state = ExperimentState::Running(index + 1);
				Some(inner.replications[index + 1].clone())
			} else {
				inner.state = ExperimentState::Done;
				None
			}
		};

		match next {
			Some(replication) => {
				let id = replication.id;
				if let Err(err) = self.run_replication(simulator, replication) {
					log_error!(simulator, "experiment couldn't run replication {}: {}", id, err);
					self.lock().state = ExperimentState::Done;
					self.finished(simulator);
				}
			},
			None => self.finished(simulator),
		}
	}

	fn finished(&self, simulator: &Simulator)
	{
		let replications = self.lock().results.len();
		log_info!(simulator, "experiment finished after {} replications", replications);
		simulator.post(SimNotification::EndExperiment{replications, time: simulator.time()});
	}
}

impl SimListener for Controller
{
	fn notify(&mut self, notification: &SimNotification, simulator: &Simulator)
	{
		if let SimNotification::EndReplication(ref results) = *notification {
			self.shared.end_of_replication(simulator, results);
		}
	}
}
