// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fs::File;

use clap::Subcommand;
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use swsbridge::serial::{SwsClient, open_port};

use crate::cli_commands::bridge::BridgeArguments;
use crate::cli_commands::target::TargetArguments;
use crate::{CliArguments, CompletionArguments};

pub mod bridge;
pub mod target;

#[derive(Subcommand)]
pub enum ToplevelCommands
{
	/// Actions to be performed against a target attached to a bridge
	Target(TargetArguments),
	/// Run the bridge firmware's command processor on this machine
	Bridge(BridgeArguments),
	/// Generate completions data for the shell
	Complete(CompletionArguments),
}

/// Parse an integer given in decimal, or in hex with a `0x` prefix
pub fn parse_number<T: TryFrom<u64>>(value: &str) -> Result<T, String>
{
	let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Some(digits) => u64::from_str_radix(digits, 16),
		None => value.parse::<u64>(),
	}
	.map_err(|error| format!("{:?} is not a number: {}", value, error))?;
	T::try_from(parsed).map_err(|_| format!("{} is out of range", value))
}

fn open_client(cli_args: &CliArguments) -> Result<SwsClient<File>>
{
	let path = cli_args
		.port
		.as_deref()
		.ok_or_eyre("No bridge given, use --port to name its serial device")?;
	let port = open_port(path).wrap_err_with(|| format!("Failed to open bridge on {}", path.display()))?;
	Ok(SwsClient::new(port))
}

#[cfg(test)]
mod tests
{
	use super::parse_number;

	#[test]
	fn numbers_take_decimal_or_hex()
	{
		assert_eq!(parse_number::<u16>("0x7e"), Ok(0x7e));
		assert_eq!(parse_number::<u32>("0X7D000"), Ok(0x7d000));
		assert_eq!(parse_number::<u16>("1024"), Ok(1024));
		assert!(parse_number::<u16>("0x10000").is_err());
		assert!(parse_number::<u16>("ten").is_err());
	}
}
