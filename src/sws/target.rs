// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;
use std::thread::sleep;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::config::BridgeConfig;
use crate::error::{Result, SwsError};
use crate::log_and_return;
use crate::sws::codec::FrameCodec;
use crate::sws::protocol::SwsPort;
use crate::sws::register::{DebugRegister, HALT};
use crate::sws::transport::ResetLine;

/// SOC ID of the chip family this bridge talks to
pub const EXPECTED_SOC_ID: u16 = 0x5316;
pub const DEFAULT_CLOCK_DIVISOR: u8 = 10;
pub const DEFAULT_SWEEP: RangeInclusive<u8> = 3..=127;
/// Phase length of the short reset pulse used to let the target run
const PULSE_HOLD: Duration = Duration::from_micros(100);

/// How a connect settles on the SWS clock divider.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConnectStrategy
{
	/// A single attempt at a known-good divider
	FixedSpeed
	{
		divisor: u8,
	},
	/// One attempt per divider in `first..=last`, stopping at the first that identifies
	SpeedSweep
	{
		first: u8,
		last: u8,
	},
}

impl Default for ConnectStrategy
{
	fn default() -> Self
	{
		ConnectStrategy::FixedSpeed {
			divisor: DEFAULT_CLOCK_DIVISOR,
		}
	}
}

impl ConnectStrategy
{
	pub fn sweep() -> Self
	{
		ConnectStrategy::SpeedSweep {
			first: *DEFAULT_SWEEP.start(),
			last: *DEFAULT_SWEEP.end(),
		}
	}

	pub fn divisors(&self) -> RangeInclusive<u8>
	{
		match *self {
			ConnectStrategy::FixedSpeed {
				divisor,
			} => divisor..=divisor,
			ConnectStrategy::SpeedSweep {
				first,
				last,
			} => first..=last,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState
{
	Disconnected,
	/// Reset line being cycled
	Resetting,
	/// Out of reset, identity not yet established
	Probing,
	Connected,
}

impl Display for TargetState
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
	{
		let name = match self {
			TargetState::Disconnected => "disconnected",
			TargetState::Resetting => "resetting",
			TargetState::Probing => "probing",
			TargetState::Connected => "connected",
		};
		f.write_str(name)
	}
}

/// The attached target chip: owns the SWS port and the reset line, and tracks whether debug
/// control of the chip has been established.
pub struct Target<C: FrameCodec, R: ResetLine>
{
	port: SwsPort<C>,
	reset_line: R,
	state: TargetState,
	reset_hold: Duration,
	expected_id: u16,
	clock_divisor: Option<u8>,
}

impl<C: FrameCodec, R: ResetLine> Target<C, R>
{
	/// Take charge of the target, holding it in reset until told otherwise
	pub fn new(codec: C, mut reset_line: R, config: &BridgeConfig) -> Self
	{
		reset_line.set_level(false);
		Self {
			port: SwsPort::new(codec),
			reset_line,
			state: TargetState::Disconnected,
			reset_hold: config.reset_hold(),
			expected_id: config.soc_id,
			clock_divisor: None,
		}
	}

	pub fn state(&self) -> TargetState
	{
		self.state
	}

	pub fn is_connected(&self) -> bool
	{
		self.state == TargetState::Connected
	}

	/// The divider the last successful connect settled on
	pub fn clock_divisor(&self) -> Option<u8>
	{
		self.clock_divisor
	}

	pub fn port(&self) -> &SwsPort<C>
	{
		&self.port
	}

	pub fn port_mut(&mut self) -> &mut SwsPort<C>
	{
		&mut self.port
	}

	pub fn reset_line(&self) -> &R
	{
		&self.reset_line
	}

	fn hold(duration: Duration)
	{
		if !duration.is_zero() {
			sleep(duration);
		}
	}

	/// Drive the reset line at the host's request; holding the target in reset drops any
	/// established connection
	pub fn set_reset_line(&mut self, high: bool)
	{
		debug!("Reset line <- {}", u8::from(high));
		self.reset_line.set_level(high);
		if !high {
			self.state = TargetState::Disconnected;
		}
	}

	/// Cycle the reset line, leaving the target running and ready to be probed
	pub fn reset(&mut self)
	{
		self.state = TargetState::Resetting;
		self.reset_line.set_level(false);
		Self::hold(self.reset_hold);
		self.reset_line.set_level(true);
		Self::hold(self.reset_hold);
		self.state = TargetState::Probing;
	}

	/// Briefly pulse reset to let the target boot its firmware
	pub fn pulse_reset(&mut self)
	{
		self.reset_line.set_level(false);
		Self::hold(PULSE_HOLD);
		self.reset_line.set_level(true);
		Self::hold(PULSE_HOLD);
		self.state = TargetState::Disconnected;
	}

	/// Stop the target CPU. Best-effort: nothing is known about the target at this point
	pub fn halt(&mut self) -> Result<()>
	{
		self.port.write_register(DebugRegister::RunState, u32::from(HALT))
	}

	pub fn set_clock_speed(&mut self, divisor: u8) -> Result<()>
	{
		self.port.write_register(DebugRegister::SwireClockDivider, u32::from(divisor))
	}

	pub fn read_soc_id(&mut self) -> Result<u16>
	{
		self.port.read_single_word(DebugRegister::SocId.address())
	}

	pub fn disable_watchdog(&mut self) -> Result<()>
	{
		self.port.write_single_quad(DebugRegister::TimerControl.address(), 0)
	}

	fn attempt(&mut self, divisor: u8) -> Result<u16>
	{
		self.reset();
		if let Err(error) = self.halt() {
			warn!("Failed to halt target: {}", error);
		}
		self.set_clock_speed(divisor)?;
		self.read_soc_id()
	}

	/// Bring the target under debug control: reset, halt, pick the SWS clock, verify the chip
	/// identity and switch the watchdog off
	pub fn connect(&mut self, strategy: ConnectStrategy) -> Result<()>
	{
		info!("Connecting to target ({:?})", strategy);
		let mut failure = None;
		for divisor in strategy.divisors() {
			match self.attempt(divisor) {
				Ok(id) if id == self.expected_id => {
					if let Err(error) = self.disable_watchdog() {
						self.state = TargetState::Disconnected;
						log_and_return!(error);
					}
					self.state = TargetState::Connected;
					self.clock_divisor = Some(divisor);
					info!("Target {:#06x} connected with clock divider {}", id, divisor);
					return Ok(());
				},
				Ok(id) => {
					debug!("Clock divider {} identified target as {:#06x}", divisor, id);
					failure = Some(SwsError::IdentityMismatch {
						expected: self.expected_id,
						found: id,
					});
				},
				Err(error) => {
					debug!("Clock divider {} failed: {}", divisor, error);
					failure = Some(error);
				},
			}
		}

		self.state = TargetState::Disconnected;
		let error = failure.unwrap_or_else(|| SwsError::Protocol(format!("no clock dividers to try in {:?}", strategy)));
		log_and_return!(error);
	}
}
