// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};

use crate::host::HostLink;

/// Depth of each of the console queues between the USB side and the SWS engine
pub const QUEUE_CAPACITY: usize = 256;
/// How often a blocked console read or write re-checks whether the host is still attached
const ATTACH_POLL: Duration = Duration::from_millis(10);

/// The USB side's ends of the console queues
pub struct ConsoleQueues
{
	/// Host input heading for the SWS engine
	pub from_host: Sender<u8>,
	/// SWS engine output heading for the host
	pub to_host: Receiver<u8>,
}

/// Build both console queues, returning the USB side's ends and the engine's link
pub fn console_queues(capacity: usize, attached: Arc<AtomicBool>) -> (ConsoleQueues, QueueLink)
{
	let (from_host_tx, from_host_rx) = bounded(capacity);
	let (to_host_tx, to_host_rx) = bounded(capacity);
	let queues = ConsoleQueues {
		from_host: from_host_tx,
		to_host: to_host_rx,
	};
	let link = QueueLink {
		from_host: from_host_rx,
		to_host: to_host_tx,
		attached,
	};
	(queues, link)
}

/// The SWS engine's end of the console queues
#[derive(Clone)]
pub struct QueueLink
{
	from_host: Receiver<u8>,
	to_host: Sender<u8>,
	attached: Arc<AtomicBool>,
}

impl HostLink for QueueLink
{
	fn connected(&self) -> bool
	{
		self.attached.load(Ordering::Acquire)
	}

	fn get_char(&mut self) -> Option<u8>
	{
		loop {
			match self.from_host.recv_timeout(ATTACH_POLL) {
				Ok(byte) => return Some(byte),
				Err(RecvTimeoutError::Timeout) if self.connected() => continue,
				Err(_) => return None,
			}
		}
	}

	fn try_get_char(&mut self) -> Option<u8>
	{
		self.from_host.try_recv().ok()
	}

	fn put_str(&mut self, text: &str)
	{
		for &byte in text.as_bytes() {
			// Output to a host that has gone away is dropped rather than left to block forever
			loop {
				match self.to_host.send_timeout(byte, ATTACH_POLL) {
					Ok(()) => break,
					Err(SendTimeoutError::Timeout(_)) if self.connected() => continue,
					Err(_) => return,
				}
			}
		}
	}
}
