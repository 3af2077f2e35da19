// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::time::{Duration, Instant};

use log::warn;

use crate::error::{Result, SwsError};

/// The programmable-I/O capability that turns a stream of words into SWS waveforms and back.
///
/// Implementations own the electrical side of the wire entirely. The engine only ever calls
/// [`WireTransport::put_blocking`] once [`WireTransport::is_tx_ready`] has been observed, and
/// [`WireTransport::get_blocking`] once [`WireTransport::is_rx_ready`] has, so neither should
/// actually block when used through this crate.
pub trait WireTransport
{
	/// Load the wire programs and attach them to `pin`, clocking the transmitter at `clock_rate` Hz
	fn init(&mut self, pin: u8, clock_rate: f64);
	fn enable(&mut self, enabled: bool);

	fn put_blocking(&mut self, word: u32);
	fn get_blocking(&mut self) -> u32;

	/// Whether the transmit FIFO can accept a word
	fn is_tx_ready(&self) -> bool;
	/// Whether the receive FIFO holds a word
	fn is_rx_ready(&self) -> bool;

	fn interrupt_flag(&self, n: u8) -> bool;
	fn clear_interrupt(&mut self, n: u8);

	/// Hand the pin to the transmitter
	fn begin_transmit(&mut self) {}

	/// Hand the pin to the receiver, discard anything stale in the receive FIFO and restart
	/// the receive program so it waits for the target's next response
	fn begin_receive(&mut self) {}
}

/// Drives the target's active-low reset line
pub trait ResetLine
{
	fn set_level(&mut self, high: bool);
}

/// Spin on `ready` until it reports true or `timeout` passes.
///
/// `ready` is always evaluated at least once, so a zero timeout still succeeds on a flag
/// that is already asserted.
pub fn wait_until<F>(timeout: Duration, operation: &'static str, mut ready: F) -> Result<()>
where
	F: FnMut() -> bool,
{
	let deadline = Instant::now() + timeout;
	loop {
		if ready() {
			return Ok(());
		}
		if Instant::now() >= deadline {
			warn!("Timed out after {:?} waiting for {}", timeout, operation);
			return Err(SwsError::Timeout {
				operation,
				timeout_ms: timeout.as_millis(),
			});
		}
		std::hint::spin_loop();
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn ready_flag_returns_immediately()
	{
		let mut polls = 0;
		wait_until(Duration::ZERO, "nothing", || {
			polls += 1;
			true
		})
		.unwrap();
		assert_eq!(polls, 1);
	}

	#[test]
	fn stuck_flag_times_out()
	{
		let start = Instant::now();
		let result = wait_until(Duration::from_millis(5), "a flag that never sets", || false);
		assert!(start.elapsed() >= Duration::from_millis(5));
		match result {
			Err(SwsError::Timeout {
				operation, ..
			}) => assert_eq!(operation, "a flag that never sets"),
			other => panic!("expected a timeout, got {other:?}"),
		}
	}
}
