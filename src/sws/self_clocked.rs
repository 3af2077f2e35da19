// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

//! The sub-slot encoding of SWS, where the transport is a plain bit shifter and all frame
//! timing is composed here.
//!
//! Every logical bit occupies five sub-slots: a one is `0000 1`, a zero is `0 1111`. A frame is
//! a tag bit (one for commands), the eight data bits MSB first, and a trailing zero marker.

use std::time::Duration;

use log::{debug, trace};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::sws::bit_buffer::BitBuffer;
use crate::sws::codec::FrameCodec;
use crate::sws::transport::{WireTransport, wait_until};

pub const SUBSLOTS_PER_BIT: usize = 5;
/// Tag, eight data bits and the marker
pub const BITS_PER_FRAME: usize = 10;
pub const FRAME_SUBSLOTS: usize = SUBSLOTS_PER_BIT * BITS_PER_FRAME;
/// Low sub-slots sent to hand the line over to the target before it answers
const TURNAROUND_SUBSLOTS: usize = 4;
/// Raised by the shifter once the whole outbound bit count has been clocked out
pub const TX_DRAINED_IRQ: u8 = 1;
/// Raised by the shifter once the requested inbound bit count has been sampled
pub const RX_DONE_IRQ: u8 = 2;

pub struct SelfClockedCodec<T: WireTransport>
{
	transport: T,
	timeout: Duration,
	output: BitBuffer,
	input: BitBuffer,
}

impl<T: WireTransport> SelfClockedCodec<T>
{
	pub fn new(mut transport: T, config: &BridgeConfig) -> Self
	{
		transport.init(config.sws_pin, config.tx_clock_hz);
		transport.enable(true);
		Self {
			transport,
			timeout: config.transfer_timeout(),
			output: BitBuffer::default(),
			input: BitBuffer::default(),
		}
	}

	pub fn transport(&self) -> &T
	{
		&self.transport
	}

	/// Bits lost to a full buffer, outbound and inbound
	pub fn dropped_bits(&self) -> usize
	{
		self.output.dropped_bits() + self.input.dropped_bits()
	}

	fn output_space(&self) -> usize
	{
		self.output.capacity() - self.output.len()
	}

	fn encode_bit(&mut self, bit: bool)
	{
		if bit {
			self.output.push_run(false, 4);
			self.output.push_bit(true);
		} else {
			self.output.push_bit(false);
			self.output.push_run(true, 4);
		}
	}

	/// Stage one frame, first clocking out what is already staged if the frame would not fit
	fn encode_frame(&mut self, command: bool, byte: u8) -> Result<()>
	{
		if self.output_space() < FRAME_SUBSLOTS {
			self.exchange(0)?;
		}
		self.encode_bit(command);
		for shift in (0..8).rev() {
			self.encode_bit((byte >> shift) & 1 != 0);
		}
		self.encode_bit(false);
		Ok(())
	}

	/// Decode the next frame from the inbound buffer, returning its tag and value.
	///
	/// A bit is a one when its low run outlasts its high run. Should the buffer run dry part
	/// way through, the bits recovered so far are returned.
	pub fn decode_frame(&mut self) -> (bool, u8)
	{
		// Skip the idle-high line ahead of the frame
		self.input.read_run(true);

		let mut bits = 0u16;
		let mut decoded = 0;
		while decoded < BITS_PER_FRAME - 1 {
			let low = self.input.read_run(false);
			let high = self.input.read_run(true);
			if low == 0 && high == 0 {
				debug!("SWS input exhausted after {} bits", decoded);
				return (false, bits as u8);
			}
			bits = (bits << 1) | u16::from(low > high);
			decoded += 1;
		}
		// Trailing marker
		self.input.read_run(false);
		self.input.read_run(true);

		(bits & 0x100 != 0, bits as u8)
	}

	/// Clock the staged outbound bits onto the wire, then sample `receive_bits` sub-slots of
	/// the target's answer into the inbound buffer
	fn exchange(&mut self, receive_bits: usize) -> Result<()>
	{
		let timeout = self.timeout;
		let transport = &mut self.transport;
		let output = &mut self.output;
		let input = &mut self.input;

		trace!("SWS exchange: {} bits out, {} bits in", output.len(), receive_bits);
		transport.begin_transmit();
		transport.clear_interrupt(TX_DRAINED_IRQ);
		transport.clear_interrupt(RX_DONE_IRQ);
		for count in [output.len(), receive_bits] {
			wait_until(timeout, "transmit FIFO space", || transport.is_tx_ready())?;
			transport.put_blocking(count as u32);
		}

		let mut words = output.words().iter();
		wait_until(timeout, "transmit drain", || {
			if transport.interrupt_flag(TX_DRAINED_IRQ) {
				return true;
			}
			if transport.is_tx_ready() {
				if let Some(&word) = words.next() {
					transport.put_blocking(word);
				}
			}
			false
		})?;
		transport.clear_interrupt(TX_DRAINED_IRQ);
		output.reset();

		input.reset();
		transport.begin_receive();
		wait_until(timeout, "receive completion", || {
			if transport.is_rx_ready() {
				let word = transport.get_blocking();
				let wanted = receive_bits.saturating_sub(input.len()).min(32);
				input.push_word(word, wanted);
				return false;
			}
			transport.interrupt_flag(RX_DONE_IRQ)
		})?;
		transport.clear_interrupt(RX_DONE_IRQ);
		Ok(())
	}

	#[cfg(test)]
	fn loop_back(&mut self)
	{
		self.input.reset();
		for (index, &word) in self.output.words().iter().enumerate() {
			let wanted = (self.output.len() - index * 32).min(32);
			self.input.push_word(word, wanted);
		}
		self.output.reset();
	}
}

impl<T: WireTransport> FrameCodec for SelfClockedCodec<T>
{
	fn reset(&mut self)
	{
		self.output.reset();
		self.input.reset();
	}

	fn encode_command(&mut self, byte: u8) -> Result<()>
	{
		self.encode_frame(true, byte)
	}

	fn encode_data(&mut self, byte: u8) -> Result<()>
	{
		self.encode_frame(false, byte)
	}

	fn decode_byte(&mut self) -> Result<u8>
	{
		if self.output_space() < TURNAROUND_SUBSLOTS {
			self.exchange(0)?;
		}
		self.output.push_run(false, TURNAROUND_SUBSLOTS);
		self.exchange(FRAME_SUBSLOTS)?;
		Ok(self.decode_frame().1)
	}

	fn flush(&mut self) -> Result<()>
	{
		if self.output.is_empty() {
			return Ok(());
		}
		self.exchange(0)
	}
}
