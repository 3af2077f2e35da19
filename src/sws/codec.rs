// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::time::Duration;

use log::trace;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::sws::transport::{WireTransport, wait_until};

/// Types implementing this trait map logical SWS frames (a byte tagged as command or data)
/// onto some physical wire encoding. Everything above the codec is independent of which
/// encoding is in use.
pub trait FrameCodec
{
	/// Discard any staged frame state ahead of composing a new transaction
	fn reset(&mut self);

	fn encode_command(&mut self, byte: u8) -> Result<()>;
	fn encode_data(&mut self, byte: u8) -> Result<()>;

	/// Encode a 16-bit value as two data frames, high byte first
	fn encode_data_word(&mut self, word: u16) -> Result<()>
	{
		let [high, low] = word.to_be_bytes();
		self.encode_data(high)?;
		self.encode_data(low)
	}

	/// Receive one byte driven by the target
	fn decode_byte(&mut self) -> Result<u8>;

	/// Push anything staged out onto the wire
	fn flush(&mut self) -> Result<()>
	{
		Ok(())
	}
}

/// Bit 8 of a tagged word, set for command frames
pub const COMMAND_TAG: u32 = 0x100;
/// Transport interrupt raised once a word has fully left the transmitter
pub const TX_DONE_IRQ: u8 = 0;

/// The tagged encoding: every frame is a 9-bit word handed to the transport, which does all the
/// bit timing itself (and holds off its completion flag until the line has settled).
pub struct TaggedCodec<T: WireTransport>
{
	transport: T,
	timeout: Duration,
}

impl<T: WireTransport> TaggedCodec<T>
{
	pub fn new(mut transport: T, config: &BridgeConfig) -> Self
	{
		transport.init(config.sws_pin, config.tx_clock_hz);
		transport.enable(true);
		Self {
			transport,
			timeout: config.transfer_timeout(),
		}
	}

	pub fn transport(&self) -> &T
	{
		&self.transport
	}

	pub fn transport_mut(&mut self) -> &mut T
	{
		&mut self.transport
	}

	pub fn into_transport(self) -> T
	{
		self.transport
	}

	fn write_word(&mut self, word: u32) -> Result<()>
	{
		let timeout = self.timeout;
		let transport = &mut self.transport;

		transport.begin_transmit();
		transport.clear_interrupt(TX_DONE_IRQ);
		wait_until(timeout, "transmit FIFO space", || transport.is_tx_ready())?;
		trace!("SWS tx {:#05x}", word);
		transport.put_blocking(word);
		wait_until(timeout, "transmit completion", || transport.interrupt_flag(TX_DONE_IRQ))?;
		transport.clear_interrupt(TX_DONE_IRQ);
		Ok(())
	}
}

impl<T: WireTransport> FrameCodec for TaggedCodec<T>
{
	fn reset(&mut self)
	{
		// Nothing is ever staged, every frame goes straight to the transport
	}

	fn encode_command(&mut self, byte: u8) -> Result<()>
	{
		self.write_word(COMMAND_TAG | u32::from(byte))
	}

	fn encode_data(&mut self, byte: u8) -> Result<()>
	{
		self.write_word(u32::from(byte))
	}

	fn decode_byte(&mut self) -> Result<u8>
	{
		let timeout = self.timeout;
		let transport = &mut self.transport;

		transport.begin_receive();
		wait_until(timeout, "target response", || transport.is_rx_ready())?;
		let word = transport.get_blocking();
		trace!("SWS rx {:#04x}", word & 0xff);
		Ok((word & 0xff) as u8)
	}
}

#[cfg(test)]
mod tests
{
	use std::collections::VecDeque;

	use super::*;
	use crate::error::SwsError;

	/// A transport that completes every transmission at once and echoes data words back, and
	/// command words too when `loop_commands` is set
	#[derive(Default)]
	struct EchoTransport
	{
		sent: Vec<u32>,
		pending: VecDeque<u32>,
		done: bool,
		receives: usize,
		stuck: bool,
		loop_commands: bool,
	}

	impl WireTransport for EchoTransport
	{
		fn init(&mut self, _pin: u8, _clock_rate: f64) {}

		fn enable(&mut self, _enabled: bool) {}

		fn put_blocking(&mut self, word: u32)
		{
			self.sent.push(word);
			if word & COMMAND_TAG == 0 || self.loop_commands {
				self.pending.push_back(word);
			}
			self.done = !self.stuck;
		}

		fn get_blocking(&mut self) -> u32
		{
			self.pending.pop_front().unwrap()
		}

		fn is_tx_ready(&self) -> bool
		{
			true
		}

		fn is_rx_ready(&self) -> bool
		{
			!self.pending.is_empty()
		}

		fn interrupt_flag(&self, _n: u8) -> bool
		{
			self.done
		}

		fn clear_interrupt(&mut self, _n: u8)
		{
			self.done = false;
		}

		fn begin_receive(&mut self)
		{
			self.receives += 1;
		}
	}

	fn codec(transport: EchoTransport) -> TaggedCodec<EchoTransport>
	{
		let config = BridgeConfig {
			transfer_timeout_ms: 2,
			..BridgeConfig::default()
		};
		TaggedCodec::new(transport, &config)
	}

	#[test]
	fn command_and_data_tagging()
	{
		let mut codec = codec(EchoTransport::default());
		codec.encode_command(0x5a).unwrap();
		codec.encode_data_word(0x1234).unwrap();
		assert_eq!(codec.transport().sent, vec![0x15a, 0x12, 0x34]);
	}

	#[test]
	fn data_round_trip()
	{
		let mut codec = codec(EchoTransport::default());
		for byte in [0x00, 0x7f, 0x80, 0xff] {
			codec.encode_data(byte).unwrap();
			assert_eq!(codec.decode_byte().unwrap(), byte);
		}
		assert_eq!(codec.transport().receives, 4);
	}

	#[test]
	fn command_round_trip_drops_tag()
	{
		let mut codec = codec(EchoTransport {
			loop_commands: true,
			..EchoTransport::default()
		});
		for byte in [0x00, 0x5a, 0x80, 0xff] {
			codec.encode_command(byte).unwrap();
			assert_eq!(codec.decode_byte().unwrap(), byte);
		}
		assert_eq!(codec.transport().sent, vec![0x100, 0x15a, 0x180, 0x1ff]);
	}

	#[test]
	fn silent_target_times_out()
	{
		let mut codec = codec(EchoTransport::default());
		assert!(codec.decode_byte().unwrap_err().is_timeout());
	}

	#[test]
	fn stuck_transmitter_times_out()
	{
		let mut codec = codec(EchoTransport {
			stuck: true,
			..EchoTransport::default()
		});
		match codec.encode_command(0xff) {
			Err(SwsError::Timeout {
				operation, ..
			}) => assert_eq!(operation, "transmit completion"),
			other => panic!("expected a timeout, got {other:?}"),
		}
	}
}
