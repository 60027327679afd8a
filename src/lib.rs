extern crate glob;
extern crate rand;
extern crate rustc_serialize;
extern crate thiserror;
extern crate time;

pub mod logging;	// needs to be first so the other modules can use its macros

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod event_list;
pub mod experiment;
pub mod listener;
pub mod realtime;
pub mod replication;
pub mod sim_time;
pub mod simulator;
pub mod stats;
mod sim_state;

pub use config::*;
pub use context::*;
pub use error::*;
pub use event::*;
pub use event_list::*;
pub use experiment::*;
pub use listener::*;
pub use logging::*;
pub use realtime::*;
pub use replication::*;
pub use sim_state::RunState;
pub use sim_time::*;
pub use simulator::*;
pub use stats::*;
