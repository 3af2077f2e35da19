// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::io::{stdin, stdout};
use std::path::PathBuf;

use clap::{Args, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use log::info;
use swsbridge::command::CommandProcessor;
use swsbridge::config::BridgeConfig;
use swsbridge::host::StreamLink;
use swsbridge::sws::sim::SimulatedTarget;
use swsbridge::sws::{ConnectStrategy, TaggedCodec, Target};

use crate::cli_commands::parse_number;

#[derive(Args)]
pub struct BridgeArguments
{
	#[command(subcommand)]
	subcommand: BridgeCommands,
}

#[derive(Subcommand)]
#[command(arg_required_else_help(true))]
enum BridgeCommands
{
	/// Serve the command console on stdin/stdout against a simulated target
	Simulate(SimulateArguments),
}

#[derive(Args)]
struct SimulateArguments
{
	#[arg(long = "config")]
	/// JSON bridge configuration to load
	config: Option<PathBuf>,
	#[arg(long = "soc-id", value_parser = parse_number::<u16>)]
	/// SOC identity the simulated target reports
	soc_id: Option<u16>,
	#[arg(long = "sweep", default_value_t = false)]
	/// Search for a working clock divider instead of using a fixed one
	sweep: bool,
}

impl BridgeArguments
{
	pub fn subcommand(&self) -> Result<()>
	{
		match &self.subcommand {
			BridgeCommands::Simulate(simulate_args) => simulate(simulate_args),
		}
	}
}

fn simulate(simulate_args: &SimulateArguments) -> Result<()>
{
	let mut config = match &simulate_args.config {
		Some(path) => BridgeConfig::from_file(path)
			.wrap_err_with(|| format!("Failed to load bridge configuration from {}", path.display()))?,
		None => BridgeConfig::default(),
	};
	if simulate_args.sweep {
		config.connect = ConnectStrategy::sweep();
	}

	let simulated = SimulatedTarget::new().with_soc_id(simulate_args.soc_id.unwrap_or(config.soc_id));
	let codec = TaggedCodec::new(simulated.transport(), &config);
	let target = Target::new(codec, simulated.reset_line(), &config);
	let mut processor = CommandProcessor::new(target, config.connect);
	info!("Simulated bridge ready, connect strategy {:?}", config.connect);

	let mut link = StreamLink::new(stdin().lock(), stdout().lock());
	while processor.poll(&mut link) {}
	info!("Host detached after {} target resets", simulated.reset_count());
	Ok(())
}
