// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

//! The host-facing command processor.
//!
//! The host sends a single command character followed immediately by its fixed-format hex
//! payload. Every response ends in a line reading `S` (success) or `E` (failure), optionally
//! preceded by `#` comment lines; `?` marks an unrecognised command.

use log::{debug, info};

use crate::error::{Result, SwsError};
use crate::host::HostLink;
use crate::sws::codec::FrameCodec;
use crate::sws::register::DebugRegister;
use crate::sws::target::{ConnectStrategy, Target};
use crate::sws::transport::ResetLine;

pub const BANNER: &str = "\
# SWS debug bridge
# Commands:
# i            connect to and verify the target
# rX           X=[0, 1] set the level of the reset line
# g            pulse reset to let the target run
# s            read the target's SOC ID
# RXXXXYYYY    read YYYY bytes from XXXX (values in hex)
# WXXXXYYYY... write YYYY bytes to XXXX, followed by hex pairs
# ?            show this help
# Responses are S for success, E for error, and # is a comment.
";

const SUCCESS: &str = "S\n";
const UNKNOWN_COMMAND: &str = "?\n# unknown command\n";

pub struct CommandProcessor<C: FrameCodec, R: ResetLine>
{
	target: Target<C, R>,
	strategy: ConnectStrategy,
	link_was_up: bool,
}

impl<C: FrameCodec, R: ResetLine> CommandProcessor<C, R>
{
	pub fn new(target: Target<C, R>, strategy: ConnectStrategy) -> Self
	{
		Self {
			target,
			strategy,
			link_was_up: false,
		}
	}

	pub fn target(&self) -> &Target<C, R>
	{
		&self.target
	}

	pub fn target_mut(&mut self) -> &mut Target<C, R>
	{
		&mut self.target
	}

	/// One pass of the control loop: greet a newly attached host, then run at most one command.
	/// Returns whether the host is still attached.
	pub fn poll<L: HostLink>(&mut self, link: &mut L) -> bool
	{
		let connected = link.connected();
		if connected && !self.link_was_up {
			info!("Host attached");
			link.put_str(BANNER);
		}
		self.link_was_up = connected;
		if !connected {
			return false;
		}

		if let Some(command) = link.try_get_char() {
			self.execute(command, link);
		}
		self.link_was_up = link.connected();
		self.link_was_up
	}

	/// Run a single command whose command character has already been read from `link`
	pub fn execute<L: HostLink>(&mut self, command: u8, link: &mut L)
	{
		debug!("Host command {:?}", char::from(command));
		let result = match command {
			b'i' => self.connect(link),
			b'r' => self.drive_reset(link),
			b'g' => {
				self.target.pulse_reset();
				link.put_str(SUCCESS);
				Ok(())
			},
			b's' => self.soc_id(link),
			b'R' => self.read(link),
			b'W' => self.write(link),
			b'?' => {
				link.put_str(BANNER);
				Ok(())
			},
			_ => {
				link.put_str(UNKNOWN_COMMAND);
				Ok(())
			},
		};

		match result {
			Ok(()) => (),
			Err(SwsError::HostLinkClosed) => debug!("Host went away mid-command"),
			Err(SwsError::MalformedPayload(found)) => {
				debug!("Rejecting command with malformed payload character {:?}", found);
				link.put_str("E\n# malformed payload\n");
			},
			Err(error) if error.is_timeout() => link.put_str("E\n# target not responding\n"),
			Err(error) => link.put_str(&format!("E\n# {}\n", error)),
		}
	}

	fn connect<L: HostLink>(&mut self, link: &mut L) -> Result<()>
	{
		match self.target.connect(self.strategy) {
			Ok(()) => link.put_str(SUCCESS),
			Err(_) => link.put_str("E\n# init failed\n"),
		}
		Ok(())
	}

	fn drive_reset<L: HostLink>(&mut self, link: &mut L) -> Result<()>
	{
		let [level] = read_payload(link)?;
		let level = match level {
			b'0' => false,
			b'1' => true,
			other => return Err(SwsError::MalformedPayload(char::from(other))),
		};
		self.target.set_reset_line(level);
		link.put_str(SUCCESS);
		Ok(())
	}

	fn soc_id<L: HostLink>(&mut self, link: &mut L) -> Result<()>
	{
		let id = self.target.port_mut().read_single_word(DebugRegister::SocId.address())?;
		link.put_str(&format!("# socid = {:04x}\n{}", id, SUCCESS));
		Ok(())
	}

	fn read<L: HostLink>(&mut self, link: &mut L) -> Result<()>
	{
		let (address, count) = read_header(link)?;
		if count > 0 {
			let mut failure = None;
			for value in self.target.port_mut().read_multi(address, usize::from(count)) {
				match value {
					Ok(value) => link.put_str(&format!("{:02x}", value)),
					Err(error) => {
						failure = Some(error);
						break;
					},
				}
			}
			link.put_str("\n");
			if let Some(error) = failure {
				return Err(error);
			}
		}
		link.put_str(SUCCESS);
		Ok(())
	}

	fn write<L: HostLink>(&mut self, link: &mut L) -> Result<()>
	{
		let (address, count) = read_header(link)?;
		// Take the whole payload before touching the wire so a bad byte can't half-write
		let data = (0..count)
			.map(|_| read_payload(link))
			.collect::<Result<Vec<_>>>()?
			.into_iter()
			.map(parse_hex_u8)
			.collect::<Result<Vec<_>>>()?;
		self.target.port_mut().write_multi(address, &data)?;
		link.put_str(SUCCESS);
		Ok(())
	}
}

/// Take exactly `N` characters of payload from the host
fn read_payload<L: HostLink, const N: usize>(link: &mut L) -> Result<[u8; N]>
{
	let mut characters = [0u8; N];
	for character in &mut characters {
		*character = link.get_char().ok_or(SwsError::HostLinkClosed)?;
	}
	Ok(characters)
}

/// Read the address and count fields shared by `R` and `W`
fn read_header<L: HostLink>(link: &mut L) -> Result<(u16, u16)>
{
	let address = read_payload(link)?;
	let count = read_payload(link)?;
	Ok((parse_hex_u16(address)?, parse_hex_u16(count)?))
}

fn hex_digit(character: u8) -> Result<u8>
{
	char::from(character)
		.to_digit(16)
		.map(|digit| digit as u8)
		.ok_or(SwsError::MalformedPayload(char::from(character)))
}

/// Parse two hex characters, most significant nibble first
fn parse_hex_u8([high, low]: [u8; 2]) -> Result<u8>
{
	Ok((hex_digit(high)? << 4) | hex_digit(low)?)
}

/// Parse four hex characters, most significant byte first
fn parse_hex_u16([a, b, c, d]: [u8; 4]) -> Result<u16>
{
	Ok(u16::from_be_bytes([parse_hex_u8([a, b])?, parse_hex_u8([c, d])?]))
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::config::BridgeConfig;
	use crate::host::StreamLink;
	use crate::sws::codec::TaggedCodec;
	use crate::sws::sim::SimulatedTarget;

	#[test]
	fn hex_parsing()
	{
		assert_eq!(parse_hex_u8(*b"a5").unwrap(), 0xa5);
		assert_eq!(parse_hex_u8(*b"0F").unwrap(), 0x0f);
		assert_eq!(parse_hex_u16(*b"007e").unwrap(), 0x007e);
		assert_eq!(parse_hex_u16(*b"Beef").unwrap(), 0xbeef);
	}

	#[test]
	fn bad_hex_is_rejected()
	{
		match parse_hex_u16(*b"00g0") {
			Err(SwsError::MalformedPayload(found)) => assert_eq!(found, 'g'),
			other => panic!("expected a payload error, got {other:?}"),
		}
		assert!(parse_hex_u8(*b" 1").is_err());
	}

	#[test]
	fn short_payload_reports_closed_link()
	{
		let mut link = StreamLink::new("00".as_bytes(), Vec::new());
		assert!(matches!(read_header(&mut link), Err(SwsError::HostLinkClosed)));
	}

	#[test]
	fn host_dropping_mid_poll_is_greeted_again()
	{
		let simulated = SimulatedTarget::new();
		let config = BridgeConfig {
			transfer_timeout_ms: 5,
			reset_hold_ms: 0,
			..BridgeConfig::default()
		};
		let target = Target::new(TaggedCodec::new(simulated.transport(), &config), simulated.reset_line(), &config);
		let mut processor = CommandProcessor::new(target, ConnectStrategy::default());

		let mut link = StreamLink::new("?".as_bytes(), Vec::new());
		assert!(processor.poll(&mut link));
		// End-of-file is only seen inside this poll
		assert!(!processor.poll(&mut link));

		let mut link = StreamLink::new("".as_bytes(), Vec::new());
		assert!(!processor.poll(&mut link));
		let (_, output) = link.into_parts();
		assert_eq!(output, BANNER.as_bytes());
	}
}
