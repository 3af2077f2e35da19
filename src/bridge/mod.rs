// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

//! The USB side of the bridge.
//!
//! The device exposes two CDC-ACM interfaces. The control interface carries the SWS command
//! console, which is handed to the SWS engine through a pair of bounded byte queues. The data
//! interface is a plain passthrough to a hardware UART whose settings track the line coding the
//! host requests. Both directions of every interface go through a staging buffer so that a slow
//! consumer never makes the other side drop bytes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

mod line_coding;
mod queue;
mod staging;

pub use line_coding::{DEFAULT_BIT_RATE, LineCoding, Parity, UartFormat};
pub use queue::{ConsoleQueues, QUEUE_CAPACITY, QueueLink, console_queues};
pub use staging::{STAGING_CAPACITY, StagingBuffer};

/// How long the service thread idles when no interface is attached
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// One CDC-ACM interface as presented by the USB stack
pub trait CdcPort
{
	/// Whether the host has the interface open (DTR asserted)
	fn connected(&self) -> bool;
	/// The most recent line coding the host set
	fn line_coding(&self) -> LineCoding;
	/// Bytes received from the host and not yet read
	fn available(&self) -> usize;
	fn read(&mut self, buffer: &mut [u8]) -> usize;
	/// Queue bytes for the host, returning how many were accepted
	fn write(&mut self, data: &[u8]) -> usize;
	fn flush(&mut self);
}

/// The hardware UART behind the data interface
pub trait Uart
{
	fn set_baud_rate(&mut self, bit_rate: u32);
	fn set_format(&mut self, format: UartFormat);
	fn is_readable(&self) -> bool;
	fn read_byte(&mut self) -> u8;
	fn is_writable(&self) -> bool;
	fn write_byte(&mut self, byte: u8);
}

/// Per-interface state: what the host asked for, what was last applied, and the two staging
/// buffers
struct Channel
{
	requested: LineCoding,
	applied: LineCoding,
	/// Bytes heading to the host
	to_usb: StagingBuffer,
	/// Bytes that arrived from the host
	from_usb: StagingBuffer,
}

impl Channel
{
	fn new() -> Self
	{
		Self {
			requested: LineCoding::default(),
			applied: LineCoding::default(),
			to_usb: StagingBuffer::default(),
			from_usb: StagingBuffer::default(),
		}
	}
}

pub struct UsbUartBridge<P: CdcPort, U: Uart>
{
	control_port: P,
	data_port: P,
	uart: U,
	control: Channel,
	data: Channel,
	console: ConsoleQueues,
	link: QueueLink,
	attached: Arc<AtomicBool>,
}

impl<P: CdcPort, U: Uart> UsbUartBridge<P, U>
{
	/// Build a bridge around the two interfaces and the UART, applying the default line coding
	/// to the UART up front
	pub fn new(control_port: P, data_port: P, mut uart: U) -> Self
	{
		let coding = LineCoding::default();
		uart.set_baud_rate(coding.bit_rate);
		uart.set_format(coding.uart_format());
		let attached = Arc::new(AtomicBool::new(false));
		let (console, link) = console_queues(QUEUE_CAPACITY, attached.clone());
		Self {
			control_port,
			data_port,
			uart,
			control: Channel::new(),
			data: Channel::new(),
			console,
			link,
			attached,
		}
	}

	/// The SWS engine's end of the console queues
	pub fn console_link(&self) -> QueueLink
	{
		self.link.clone()
	}

	pub fn control_port(&self) -> &P
	{
		&self.control_port
	}

	pub fn control_port_mut(&mut self) -> &mut P
	{
		&mut self.control_port
	}

	pub fn data_port(&self) -> &P
	{
		&self.data_port
	}

	pub fn data_port_mut(&mut self) -> &mut P
	{
		&mut self.data_port
	}

	pub fn uart(&self) -> &U
	{
		&self.uart
	}

	pub fn uart_mut(&mut self) -> &mut U
	{
		&mut self.uart
	}

	/// One pass of the passthrough loop. Returns whether either interface is attached.
	pub fn service(&mut self) -> bool
	{
		let mut any_connected = false;
		for (port, channel) in [
			(&mut self.control_port, &mut self.control),
			(&mut self.data_port, &mut self.data),
		] {
			if port.connected() {
				any_connected = true;
				channel.requested = port.line_coding();
				usb_read(port, channel);
				usb_write(port, channel);
			}
		}

		let attached = self.control_port.connected();
		if self.attached.swap(attached, Ordering::AcqRel) != attached {
			debug!("Console interface {}", if attached { "attached" } else { "detached" });
		}

		self.update_uart_config();
		self.uart_read();
		self.uart_write();
		self.console_read();
		self.console_write();
		any_connected
	}

	/// Reconfigure the UART, touching only the settings that actually changed
	fn update_uart_config(&mut self)
	{
		let requested = self.data.requested;
		let applied = self.data.applied;
		if requested.bit_rate != applied.bit_rate {
			info!("UART bit rate {} -> {}", applied.bit_rate, requested.bit_rate);
			self.uart.set_baud_rate(requested.bit_rate);
		}
		let format = requested.uart_format();
		if format != applied.uart_format() {
			info!("UART format {} -> {}", applied.uart_format(), format);
			self.uart.set_format(format);
		}
		self.data.applied = requested;
	}

	fn uart_read(&mut self)
	{
		while self.uart.is_readable() && !self.data.to_usb.is_full() {
			let byte = self.uart.read_byte();
			self.data.to_usb.push(byte);
		}
	}

	fn uart_write(&mut self)
	{
		let uart = &mut self.uart;
		self.data.from_usb.drain_while(|byte| {
			if !uart.is_writable() {
				return false;
			}
			uart.write_byte(byte);
			true
		});
	}

	/// Collect the SWS engine's output for the control interface
	fn console_read(&mut self)
	{
		while !self.control.to_usb.is_full() {
			match self.console.to_host.try_recv() {
				Ok(byte) => {
					self.control.to_usb.push(byte);
				},
				Err(_) => break,
			}
		}
	}

	/// Hand the host's console input to the SWS engine
	fn console_write(&mut self)
	{
		let from_host = &self.console.from_host;
		self.control.from_usb.drain_while(|byte| from_host.try_send(byte).is_ok());
	}
}

fn usb_read<P: CdcPort>(port: &mut P, channel: &mut Channel)
{
	let available = port.available();
	if available > 0 && !channel.from_usb.is_full() {
		channel.from_usb.fill_with(available, |buffer| port.read(buffer));
	}
}

fn usb_write<P: CdcPort>(port: &mut P, channel: &mut Channel)
{
	if channel.to_usb.is_empty() {
		return;
	}
	if channel.to_usb.drain_with(|data| port.write(data)) > 0 {
		port.flush();
	}
}

impl<P, U> UsbUartBridge<P, U>
where
	P: CdcPort + Send + 'static,
	U: Uart + Send + 'static,
{
	/// Run the passthrough loop on its own thread until [`BridgeThread::stop`] is called
	pub fn spawn(mut self) -> BridgeThread<P, U>
	{
		let stop = Arc::new(AtomicBool::new(false));
		let handle = {
			let stop = stop.clone();
			thread::spawn(move || {
				while !stop.load(Ordering::Acquire) {
					if !self.service() {
						thread::sleep(IDLE_SLEEP);
					} else {
						thread::yield_now();
					}
				}
				self
			})
		};
		BridgeThread {
			stop,
			handle,
		}
	}
}

pub struct BridgeThread<P: CdcPort, U: Uart>
{
	stop: Arc<AtomicBool>,
	handle: JoinHandle<UsbUartBridge<P, U>>,
}

impl<P: CdcPort, U: Uart> BridgeThread<P, U>
{
	/// Stop the loop and hand the bridge back; `None` if the service thread panicked
	pub fn stop(self) -> Option<UsbUartBridge<P, U>>
	{
		self.stop.store(true, Ordering::Release);
		match self.handle.join() {
			Ok(bridge) => Some(bridge),
			Err(_) => {
				warn!("Bridge service thread panicked");
				None
			},
		}
	}
}

#[cfg(test)]
mod tests
{
	use std::collections::VecDeque;

	use super::*;
	use crate::host::HostLink;

	#[derive(Default)]
	struct MockPort
	{
		connected: bool,
		coding: LineCoding,
		incoming: VecDeque<u8>,
		outgoing: Vec<u8>,
		write_limit: Option<usize>,
		flushes: usize,
	}

	impl CdcPort for MockPort
	{
		fn connected(&self) -> bool
		{
			self.connected
		}

		fn line_coding(&self) -> LineCoding
		{
			self.coding
		}

		fn available(&self) -> usize
		{
			self.incoming.len()
		}

		fn read(&mut self, buffer: &mut [u8]) -> usize
		{
			let count = buffer.len().min(self.incoming.len());
			for (slot, byte) in buffer.iter_mut().zip(self.incoming.drain(..count)) {
				*slot = byte;
			}
			count
		}

		fn write(&mut self, data: &[u8]) -> usize
		{
			let count = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
			self.outgoing.extend_from_slice(&data[..count]);
			count
		}

		fn flush(&mut self)
		{
			self.flushes += 1;
		}
	}

	#[derive(Default)]
	struct MockUart
	{
		received: VecDeque<u8>,
		sent: Vec<u8>,
		tx_space: usize,
		bit_rates: Vec<u32>,
		formats: Vec<UartFormat>,
	}

	impl Uart for MockUart
	{
		fn set_baud_rate(&mut self, bit_rate: u32)
		{
			self.bit_rates.push(bit_rate);
		}

		fn set_format(&mut self, format: UartFormat)
		{
			self.formats.push(format);
		}

		fn is_readable(&self) -> bool
		{
			!self.received.is_empty()
		}

		fn read_byte(&mut self) -> u8
		{
			self.received.pop_front().unwrap_or(0)
		}

		fn is_writable(&self) -> bool
		{
			self.tx_space > 0
		}

		fn write_byte(&mut self, byte: u8)
		{
			self.tx_space -= 1;
			self.sent.push(byte);
		}
	}

	fn bridge() -> UsbUartBridge<MockPort, MockUart>
	{
		UsbUartBridge::new(MockPort::default(), MockPort::default(), MockUart::default())
	}

	#[test]
	fn line_coding_changes_apply_once()
	{
		let mut bridge = bridge();
		assert_eq!(bridge.uart().bit_rates, [DEFAULT_BIT_RATE]);
		assert_eq!(bridge.uart().formats.len(), 1);

		bridge.data_port_mut().connected = true;
		bridge.data_port_mut().coding = LineCoding::default();
		assert!(bridge.service());
		assert_eq!(bridge.uart().bit_rates.len(), 1);
		assert_eq!(bridge.uart().formats.len(), 1);

		bridge.data_port_mut().coding.bit_rate = 9600;
		bridge.service();
		bridge.service();
		assert_eq!(bridge.uart().bit_rates, [DEFAULT_BIT_RATE, 9600]);
		assert_eq!(bridge.uart().formats.len(), 1);

		bridge.data_port_mut().coding.parity = 2;
		bridge.service();
		assert_eq!(bridge.uart().bit_rates.len(), 2);
		assert_eq!(bridge.uart().formats.last().map(ToString::to_string).as_deref(), Some("8E1"));
	}

	#[test]
	fn data_passes_through_both_ways()
	{
		let mut bridge = bridge();
		bridge.data_port_mut().connected = true;
		bridge.data_port_mut().incoming.extend(b"hello");
		bridge.uart_mut().tx_space = 3;
		bridge.uart_mut().received.extend(b"world");

		bridge.service();
		assert_eq!(bridge.uart().sent, b"hel");
		bridge.uart_mut().tx_space = 10;
		bridge.service();
		assert_eq!(bridge.uart().sent, b"hello");
		assert_eq!(bridge.data_port().outgoing, b"world");
		assert!(bridge.data_port().flushes > 0);
	}

	#[test]
	fn staging_holds_back_when_host_is_away()
	{
		let mut bridge = bridge();
		bridge.uart_mut().received.extend(std::iter::repeat_n(0x55, STAGING_CAPACITY + 100));

		assert!(!bridge.service());
		assert_eq!(bridge.uart().received.len(), 100);

		bridge.data_port_mut().connected = true;
		bridge.data_port_mut().write_limit = Some(1000);
		bridge.service();
		assert_eq!(bridge.data_port().outgoing.len(), 1000);
		assert_eq!(bridge.uart().received.len(), 0);
	}

	#[test]
	fn console_round_trip()
	{
		let mut bridge = bridge();
		let mut link = bridge.console_link();
		assert!(!link.connected());

		bridge.control_port_mut().connected = true;
		bridge.control_port_mut().incoming.extend(b"s");
		bridge.service();
		assert!(link.connected());
		assert_eq!(link.try_get_char(), Some(b's'));

		link.put_str("S\n");
		// First pass stages the output, second pass hands it to the interface
		bridge.service();
		bridge.service();
		assert_eq!(bridge.control_port().outgoing, b"S\n");

		bridge.control_port_mut().connected = false;
		bridge.service();
		assert!(!link.connected());
	}

	#[test]
	fn console_input_waits_for_queue_space()
	{
		let mut bridge = bridge();
		let mut link = bridge.console_link();
		bridge.control_port_mut().connected = true;
		bridge.control_port_mut().incoming.extend(std::iter::repeat_n(b'x', QUEUE_CAPACITY + 10));

		bridge.service();
		let mut drained = 0;
		while link.try_get_char().is_some() {
			drained += 1;
		}
		assert_eq!(drained, QUEUE_CAPACITY);

		bridge.service();
		while link.try_get_char().is_some() {
			drained += 1;
		}
		assert_eq!(drained, QUEUE_CAPACITY + 10);
	}
}
