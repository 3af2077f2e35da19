// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

//! A software model of a Telink target on the far end of the wire, speaking the tagged SWS
//! framing. It backs the test suite and the CLI's simulated bridge.

use std::cell::{Ref, RefCell, RefMut};
use std::ops::RangeInclusive;
use std::rc::Rc;

use log::trace;

use crate::sws::codec::{COMMAND_TAG, TX_DONE_IRQ};
use crate::sws::protocol::{FRAME_END, FRAME_START, MODE_READ};
use crate::sws::register::{DebugRegister, HALT, WATCHDOG_ENABLE};
use crate::sws::target::EXPECTED_SOC_ID;
use crate::sws::transport::{ResetLine, WireTransport};

const MEMORY_SIZE: usize = 0x1_0000;
/// What a target sampling at the wrong bit rate makes of every byte
const GARBLED: u8 = 0xff;

/// A frame as seen by the target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame
{
	Command(u8),
	Data(u8),
}

/// A completed write transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimWrite
{
	pub address: u16,
	pub data: Vec<u8>,
}

#[derive(Debug)]
enum Decoder
{
	Idle,
	AddressHigh,
	AddressLow(u8),
	Mode(u16),
	Writing
	{
		start: u16,
		address: u16,
		data: Vec<u8>,
	},
	Reading(u16),
}

struct SimState
{
	memory: Vec<u8>,
	decoder: Decoder,
	released: bool,
	responsive: bool,
	divisor: u8,
	working_divisors: RangeInclusive<u8>,
	halted: bool,
	tx_done: bool,
	frames: Vec<Frame>,
	writes: Vec<SimWrite>,
	resets: usize,
	pin: Option<u8>,
	enabled: bool,
}

impl SimState
{
	fn power_on(&mut self)
	{
		self.decoder = Decoder::Idle;
		self.halted = false;
		self.divisor = 0;
		let timer = DebugRegister::TimerControl.address() as usize;
		self.memory[timer..timer + 4].copy_from_slice(&WATCHDOG_ENABLE.to_le_bytes());
	}

	fn in_sync(&self) -> bool
	{
		self.working_divisors.contains(&self.divisor)
	}

	fn store(&mut self, address: u16, value: u8)
	{
		self.memory[usize::from(address)] = value;
		if address == DebugRegister::SwireClockDivider.address() {
			self.divisor = value;
		} else if address == DebugRegister::RunState.address() {
			self.halted = value == HALT;
		}
	}

	fn receive(&mut self, frame: Frame)
	{
		self.frames.push(frame);
		let decoder = std::mem::replace(&mut self.decoder, Decoder::Idle);
		self.decoder = match (frame, decoder) {
			(Frame::Command(FRAME_START), Decoder::Writing {
				start,
				data,
				..
			}) => {
				// A new transaction implicitly ends an unterminated write
				self.writes.push(SimWrite {
					address: start,
					data,
				});
				Decoder::AddressHigh
			},
			(Frame::Command(FRAME_START), _) => Decoder::AddressHigh,
			(Frame::Command(FRAME_END), Decoder::Writing {
				start,
				data,
				..
			}) => {
				self.writes.push(SimWrite {
					address: start,
					data,
				});
				Decoder::Idle
			},
			(Frame::Command(_), _) => Decoder::Idle,
			(Frame::Data(high), Decoder::AddressHigh) => Decoder::AddressLow(high),
			(Frame::Data(low), Decoder::AddressLow(high)) => Decoder::Mode(u16::from_be_bytes([high, low])),
			(Frame::Data(mode), Decoder::Mode(address)) if mode & MODE_READ != 0 => Decoder::Reading(address),
			(Frame::Data(_), Decoder::Mode(address)) => Decoder::Writing {
				start: address,
				address,
				data: Vec::new(),
			},
			(Frame::Data(value), Decoder::Writing {
				start,
				address,
				mut data,
			}) => {
				self.store(address, value);
				data.push(value);
				Decoder::Writing {
					start,
					address: address.wrapping_add(1),
					data,
				}
			},
			(Frame::Data(_), decoder) => decoder,
		};
	}
}

/// Handle on a simulated target. Clones share the same target.
#[derive(Clone)]
pub struct SimulatedTarget
{
	state: Rc<RefCell<SimState>>,
}

impl Default for SimulatedTarget
{
	fn default() -> Self
	{
		Self::new()
	}
}

impl SimulatedTarget
{
	/// A responsive target of the expected family, held in reset, that follows any clock divider
	pub fn new() -> Self
	{
		let mut state = SimState {
			memory: vec![0; MEMORY_SIZE],
			decoder: Decoder::Idle,
			released: false,
			responsive: true,
			divisor: 0,
			working_divisors: 0..=u8::MAX,
			halted: false,
			tx_done: false,
			frames: Vec::new(),
			writes: Vec::new(),
			resets: 0,
			pin: None,
			enabled: false,
		};
		state.power_on();
		let target = Self {
			state: Rc::new(RefCell::new(state)),
		};
		target.set_soc_id(EXPECTED_SOC_ID);
		target
	}

	pub fn with_soc_id(self, id: u16) -> Self
	{
		self.set_soc_id(id);
		self
	}

	/// Only answer sensibly while the clock divider is within `divisors`
	pub fn with_working_divisors(self, divisors: RangeInclusive<u8>) -> Self
	{
		self.state_mut().working_divisors = divisors;
		self
	}

	/// Never drive the wire in response to reads
	pub fn unresponsive(self) -> Self
	{
		self.state_mut().responsive = false;
		self
	}

	fn state(&self) -> Ref<'_, SimState>
	{
		self.state.borrow()
	}

	fn state_mut(&self) -> RefMut<'_, SimState>
	{
		self.state.borrow_mut()
	}

	pub fn transport(&self) -> SimTransport
	{
		SimTransport {
			state: self.state.clone(),
		}
	}

	pub fn reset_line(&self) -> SimResetLine
	{
		SimResetLine {
			state: self.state.clone(),
		}
	}

	pub fn set_soc_id(&self, id: u16)
	{
		self.load(DebugRegister::SocId.address(), &id.to_le_bytes());
	}

	/// Place `data` into target memory at `address`, bypassing the wire
	pub fn load(&self, address: u16, data: &[u8])
	{
		let start = usize::from(address);
		self.state_mut().memory[start..start + data.len()].copy_from_slice(data);
	}

	pub fn memory(&self, address: u16, length: usize) -> Vec<u8>
	{
		let start = usize::from(address);
		self.state().memory[start..start + length].to_vec()
	}

	pub fn frames(&self) -> Vec<Frame>
	{
		self.state().frames.clone()
	}

	pub fn clear_frames(&self)
	{
		self.state_mut().frames.clear();
	}

	/// Number of transactions opened
	pub fn open_count(&self) -> usize
	{
		self.state()
			.frames
			.iter()
			.filter(|frame| **frame == Frame::Command(FRAME_START))
			.count()
	}

	pub fn writes(&self) -> Vec<SimWrite>
	{
		self.state().writes.clone()
	}

	pub fn divisor(&self) -> u8
	{
		self.state().divisor
	}

	pub fn is_halted(&self) -> bool
	{
		self.state().halted
	}

	/// Whether the reset line is currently released
	pub fn is_released(&self) -> bool
	{
		self.state().released
	}

	/// Number of times the target has been put into reset
	pub fn reset_count(&self) -> usize
	{
		self.state().resets
	}

	pub fn pin(&self) -> Option<u8>
	{
		self.state().pin
	}
}

/// The wire end of a [`SimulatedTarget`]
pub struct SimTransport
{
	state: Rc<RefCell<SimState>>,
}

impl WireTransport for SimTransport
{
	fn init(&mut self, pin: u8, _clock_rate: f64)
	{
		self.state.borrow_mut().pin = Some(pin);
	}

	fn enable(&mut self, enabled: bool)
	{
		self.state.borrow_mut().enabled = enabled;
	}

	fn put_blocking(&mut self, word: u32)
	{
		let mut state = self.state.borrow_mut();
		let value = (word & 0xff) as u8;
		let frame = if word & COMMAND_TAG != 0 { Frame::Command(value) } else { Frame::Data(value) };
		trace!("Simulated target got {:?}", frame);
		if state.enabled && state.released {
			state.receive(frame);
		}
		// The transmitter completes whether or not anything is listening
		state.tx_done = true;
	}

	fn get_blocking(&mut self) -> u32
	{
		let mut state = self.state.borrow_mut();
		let Decoder::Reading(address) = state.decoder else {
			return u32::from(GARBLED);
		};
		let value = if state.in_sync() { state.memory[usize::from(address)] } else { GARBLED };
		state.decoder = Decoder::Reading(address.wrapping_add(1));
		u32::from(value)
	}

	fn is_tx_ready(&self) -> bool
	{
		self.state.borrow().enabled
	}

	fn is_rx_ready(&self) -> bool
	{
		let state = self.state.borrow();
		state.responsive && state.released && matches!(state.decoder, Decoder::Reading(_))
	}

	fn interrupt_flag(&self, n: u8) -> bool
	{
		n == TX_DONE_IRQ && self.state.borrow().tx_done
	}

	fn clear_interrupt(&mut self, n: u8)
	{
		if n == TX_DONE_IRQ {
			self.state.borrow_mut().tx_done = false;
		}
	}
}

/// The reset pin of a [`SimulatedTarget`]
pub struct SimResetLine
{
	state: Rc<RefCell<SimState>>,
}

impl ResetLine for SimResetLine
{
	fn set_level(&mut self, high: bool)
	{
		let mut state = self.state.borrow_mut();
		if !high && state.released {
			state.resets += 1;
		}
		if !high {
			state.power_on();
		}
		state.released = high;
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn running_target() -> (SimulatedTarget, SimTransport)
	{
		let target = SimulatedTarget::new();
		target.reset_line().set_level(true);
		let mut transport = target.transport();
		transport.enable(true);
		(target, transport)
	}

	fn send(transport: &mut SimTransport, frames: &[Frame])
	{
		for frame in frames {
			match *frame {
				Frame::Command(value) => transport.put_blocking(COMMAND_TAG | u32::from(value)),
				Frame::Data(value) => transport.put_blocking(u32::from(value)),
			}
		}
	}

	#[test]
	fn write_transaction_updates_memory()
	{
		let (target, mut transport) = running_target();
		send(&mut transport, &[
			Frame::Command(0x5a),
			Frame::Data(0x40),
			Frame::Data(0x00),
			Frame::Data(0x00),
			Frame::Data(0x11),
			Frame::Data(0x22),
			Frame::Command(0xff),
		]);
		assert_eq!(target.memory(0x4000, 2), vec![0x11, 0x22]);
		assert_eq!(target.writes(), vec![SimWrite {
			address: 0x4000,
			data: vec![0x11, 0x22],
		}]);
	}

	#[test]
	fn read_transaction_streams_memory()
	{
		let (target, mut transport) = running_target();
		target.load(0x0100, &[1, 2]);
		assert!(!transport.is_rx_ready());
		send(&mut transport, &[Frame::Command(0x5a), Frame::Data(0x01), Frame::Data(0x00), Frame::Data(0x80)]);
		assert!(transport.is_rx_ready());
		assert_eq!(transport.get_blocking(), 1);
		assert_eq!(transport.get_blocking(), 2);
		send(&mut transport, &[Frame::Command(0xff)]);
		assert!(!transport.is_rx_ready());
	}

	#[test]
	fn default_target_answers_at_power_on_clock()
	{
		let (target, mut transport) = running_target();
		target.reset_line().set_level(false);
		target.reset_line().set_level(true);
		assert_eq!(target.divisor(), 0);
		send(&mut transport, &[Frame::Command(0x5a), Frame::Data(0x00), Frame::Data(0x7e), Frame::Data(0x80)]);
		assert_eq!(transport.get_blocking(), 0x16);
		assert_eq!(transport.get_blocking(), 0x53);
	}

	#[test]
	fn wrong_clock_garbles_reads()
	{
		let (target, mut transport) = running_target();
		let target = target.with_working_divisors(8..=12);
		send(&mut transport, &[Frame::Command(0x5a), Frame::Data(0x00), Frame::Data(0x7e), Frame::Data(0x80)]);
		assert_eq!(transport.get_blocking(), 0xff);
		send(&mut transport, &[
			Frame::Command(0x5a),
			Frame::Data(0x00),
			Frame::Data(0xb2),
			Frame::Data(0x00),
			Frame::Data(10),
			Frame::Command(0xff),
		]);
		assert_eq!(target.divisor(), 10);
		send(&mut transport, &[Frame::Command(0x5a), Frame::Data(0x00), Frame::Data(0x7e), Frame::Data(0x80)]);
		assert_eq!(transport.get_blocking(), 0x16);
	}

	#[test]
	fn reset_restores_watchdog_and_ignores_wire()
	{
		let (target, mut transport) = running_target();
		target.load(0x0620, &[0, 0, 0, 0]);
		target.reset_line().set_level(false);
		assert_eq!(target.memory(0x0620, 4), WATCHDOG_ENABLE.to_le_bytes().to_vec());
		assert_eq!(target.reset_count(), 1);
		send(&mut transport, &[Frame::Command(0x5a)]);
		assert!(target.frames().is_empty());
		assert!(transport.interrupt_flag(TX_DONE_IRQ));
	}
}
