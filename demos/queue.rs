//! This example is a classic single server queue (M/M/1): customers arrive at
//! exponentially distributed intervals, wait in line if the server is busy, and
//! are served for an exponentially distributed time. Each replication reports
//! the time customers spent waiting along with how many were served.
#[macro_use]
extern crate clap;
extern crate descore;
extern crate rand;

use clap::{App, ArgMatches};
use descore::*;
use rand::Rng;
use std::collections::VecDeque;
use std::fmt::Display;
use std::io::{Write, stderr};
use std::process;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy)]
struct LocalConfig
{
	replications: u32,
	mean_arrival: f64,	// secs
	mean_service: f64,
}

impl LocalConfig
{
	fn new() -> LocalConfig
	{
		// These are the defaults: all of them can be overriden using command line options.
		LocalConfig {
			replications: 3,
			mean_arrival: 60.0,
			mean_service: 45.0,
		}
	}
}

fn fatal_err(message: &str) -> !
{
	let _ = writeln!(&mut stderr(), "{}", message);
	process::exit(1);
}

// Min and max are inclusive.
fn match_num<T>(matches: &ArgMatches, name: &str, min: T, max: T) -> T
		where T: Copy + Display + FromStr + PartialOrd
{
	match value_t!(matches.value_of(name), T) {
		Ok(value) if value < min => fatal_err(&format!("--{} should be greater than {}", name, min)),
		Ok(value) if value > max => fatal_err(&format!("--{} should be less than {}", name, max)),
		Ok(value) => value,
		_ => fatal_err(&format!("--{} should be a number", name)),
	}
}

fn exponential(ctx: &mut Context, mean: f64) -> f64
{
	let x: f64 = ctx.rng().gen();
	-mean*(1.0 - x).ln()
}

#[derive(Default)]
struct Line
{
	waiting: VecDeque<Time>,	// arrival times
	busy: bool,
}

struct Queue
{
	local: LocalConfig,
}

impl Model for Queue
{
	fn construct_model(&mut self, simulator: &Simulator, replication: &Replication) -> Result<(), SimError>
	{
		log_info!(simulator, "constructing queue for replication {}", replication.id);
		let line = Arc::new(Mutex::new(Line::default()));
		let local = self.local;
		simulator.schedule_now(NORMAL_PRIORITY, "arrival", move |ctx| arrival(ctx, line, local))?;
		Ok(())
	}
}

fn arrival(ctx: &mut Context, line: Arc<Mutex<Line>>, local: LocalConfig) -> EventResult
{
	ctx.count("arrivals", 1);
	let start_service = {
		let mut line = line.lock().map_err(|_| "line lock was poisoned")?;
		if line.busy {
			line.waiting.push_back(ctx.time());
			log_debug!(ctx, "{} customers waiting", line.waiting.len());
			false
		} else {
			line.busy = true;
			true
		}
	};

	if start_service {
		ctx.tally("wait", 0.0);
		let service = exponential(ctx, local.mean_service);
		let copy = line.clone();
		ctx.schedule_after_secs(service, NORMAL_PRIORITY, "departure", move |ctx| departure(ctx, copy, local))?;
	}

	let delay = exponential(ctx, local.mean_arrival);
	ctx.schedule_after_secs(delay, NORMAL_PRIORITY, "arrival", move |ctx| arrival(ctx, line, local))?;
	Ok(())
}

fn departure(ctx: &mut Context, line: Arc<Mutex<Line>>, local: LocalConfig) -> EventResult
{
	ctx.count("served", 1);
	let next = {
		let mut line = line.lock().map_err(|_| "line lock was poisoned")?;
		let next = line.waiting.pop_front();
		line.busy = next.is_some();
		next
	};

	if let Some(arrived) = next {
		let waited = ctx.config().delta_to_secs(ctx.time() - arrived);
		ctx.tally("wait", waited);

		let service = exponential(ctx, local.mean_service);
		ctx.schedule_after_secs(service, NORMAL_PRIORITY, "departure", move |ctx| departure(ctx, line, local))?;
	}
	Ok(())
}

fn parse_options() -> (LocalConfig, Config)
{
	let mut local = LocalConfig::new();
	let mut config = Config::new();

	// see https://docs.rs/clap/2.24.2/clap/struct.Arg.html#method.from_usage for syntax
	let usage = format!(
		"--arrival=[SECS] 'Mean time between arrivals [{default_arrival}]'
		--log=[LEVEL:GLOB]... 'Overrides --log-level, glob is used to match event names'
		--log-level=[LEVEL] 'Default log level: {log_levels} [{default_level}]'
		--max-time=[TIME] 'Length of each replication, use {time_suffixes} suffixes [8h]'
		--no-colors 'Don't color code console output'
		--real-time=[SPEED] 'Pace the simulation against the wall clock, 2.0 is twice as fast as real time'
		--replications=[N] 'Number of replications to run [{default_replications}]'
		--seed=[N] 'Random number generator seed [random]'
		--service=[SECS] 'Mean service time [{default_service}]'",
		default_arrival = local.mean_arrival,
		default_replications = local.replications,
		default_service = local.mean_service,
		default_level = format!("{:?}", config.log_level).to_lowercase(),
		log_levels = log_levels(),
		time_suffixes = time_suffixes());

	let matches = App::new("queue")
		.version("1.0")
		.author("Jesse Jones <jesse9jones@gmail.com>")
		.about("Simulates a single server queue.")
		.args_from_usage(&usage)
	.get_matches();

	if matches.is_present("arrival") {
		local.mean_arrival = match_num(&matches, "arrival", 0.001, 1_000_000.0);
	}

	if matches.is_present("service") {
		local.mean_service = match_num(&matches, "service", 0.001, 1_000_000.0);
	}

	if matches.is_present("replications") {
		local.replications = match_num(&matches, "replications", 1, 1000);
	}

	if matches.is_present("seed") {
		config.seed = match_num(&matches, "seed", 1, u32::max_value());
	}

	if matches.is_present("real-time") {
		let speed = match_num(&matches, "real-time", 0.001, 1_000_000.0);
		config.real_time = Some(RealTimeSettings::new(speed));
	}

	if let Some(level) = matches.value_of("log-level") {
		if let Some(e) = config.parse_log_level(level) {
			fatal_err(&e);
		}
	}

	if let Some(values) = matches.values_of("log") {
		if let Some(e) = config.parse_log_levels(values.collect()) {
			fatal_err(&e);
		}
	}

	let max_secs = matches.value_of("max-time").unwrap_or("8h");
	if let Some(e) = config.parse_max_secs(max_secs) {
		fatal_err(&e);
	}

	config.colorize = !matches.is_present("no-colors");

	(local, config)
}

fn main()
{
	let (local, config) = parse_options();

	let end = config.max_time();
	let warmup = config.secs_to_time(config.max_secs/10.0);
	let replications: Vec<Replication> = (0..local.replications)
		.map(|id| Replication::new(id, Time(0), warmup, end))
		.collect::<Result<_, _>>()
		.unwrap_or_else(|e| fatal_err(&e.to_string()));

	let simulator = Simulator::new(config).unwrap_or_else(|e| fatal_err(&e.to_string()));
	simulator.add_listener(|notification: &SimNotification, simulator: &Simulator| {
		if let SimNotification::EventFailed(ref err) = *notification {
			log_warning!(simulator, "{}", err);
		}
	});

	let experiment = Experiment::new(simulator, replications, Queue{local}).unwrap_or_else(|e| fatal_err(&e.to_string()));
	if let Err(e) = experiment.run() {
		fatal_err(&e.to_string());
	}
	println!("{}", experiment.report_json());
}
