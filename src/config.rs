// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::error::Result;
use crate::sws::target::{ConnectStrategy, EXPECTED_SOC_ID};

/// Runtime configuration for the bridge engine. Every field has a default, so a config file
/// only needs to name the values it changes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgeConfig
{
	/// GPIO carrying the SWS signal
	pub sws_pin: u8,
	/// GPIO driving the target's reset line
	pub reset_pin: u8,
	/// GPIO mirroring receiver sampling, for a logic analyser
	pub debug_pin: u8,
	/// Bit clock the transmitter is programmed with
	pub tx_clock_hz: f64,
	/// Bound on every wait for the wire to signal readiness
	pub transfer_timeout_ms: u64,
	/// How long each phase of a reset is held for
	pub reset_hold_ms: u64,
	/// The identity the SOC ID register must read back as for a connect to succeed
	pub soc_id: u16,
	/// How `i` goes about finding a working clock divider
	pub connect: ConnectStrategy,
}

impl Default for BridgeConfig
{
	fn default() -> Self
	{
		Self {
			sws_pin: 2,
			reset_pin: 3,
			debug_pin: 4,
			tx_clock_hz: 10.0e6,
			transfer_timeout_ms: 50,
			reset_hold_ms: 20,
			soc_id: EXPECTED_SOC_ID,
			connect: ConnectStrategy::default(),
		}
	}
}

impl BridgeConfig
{
	pub fn from_file(path: &Path) -> Result<Self>
	{
		debug!("Loading bridge configuration from {}", path.display());
		let file = File::open(path)?;
		Self::from_reader(file)
	}

	pub fn from_reader<R: Read>(reader: R) -> Result<Self>
	{
		Ok(serde_json::from_reader(reader)?)
	}

	pub fn transfer_timeout(&self) -> Duration
	{
		Duration::from_millis(self.transfer_timeout_ms)
	}

	pub fn reset_hold(&self) -> Duration
	{
		Duration::from_millis(self.reset_hold_ms)
	}
}
