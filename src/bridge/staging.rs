// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

/// Size of each direction's staging buffer per interface
pub const STAGING_CAPACITY: usize = 2560;

/// A fixed-size holding area between a producer and a consumer that each move bytes when
/// they can. Filling stops once full; draining removes however many bytes the consumer took
/// and shuffles the rest down.
#[derive(Debug)]
pub struct StagingBuffer
{
	data: Vec<u8>,
	capacity: usize,
}

impl Default for StagingBuffer
{
	fn default() -> Self
	{
		Self::new(STAGING_CAPACITY)
	}
}

impl StagingBuffer
{
	pub fn new(capacity: usize) -> Self
	{
		Self {
			data: Vec::with_capacity(capacity),
			capacity,
		}
	}

	pub fn len(&self) -> usize
	{
		self.data.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.data.is_empty()
	}

	pub fn is_full(&self) -> bool
	{
		self.data.len() >= self.capacity
	}

	/// Free space remaining
	pub fn space(&self) -> usize
	{
		self.capacity - self.data.len()
	}

	pub fn contents(&self) -> &[u8]
	{
		&self.data
	}

	pub fn push(&mut self, byte: u8) -> bool
	{
		if self.is_full() {
			return false;
		}
		self.data.push(byte);
		true
	}

	/// Let `read` fill up to `limit` bytes (capped at the free space) and keep what it reports
	/// having written
	pub fn fill_with<F>(&mut self, limit: usize, read: F) -> usize
	where
		F: FnOnce(&mut [u8]) -> usize,
	{
		let start = self.data.len();
		let length = limit.min(self.space());
		self.data.resize(start + length, 0);
		let count = read(&mut self.data[start..]).min(length);
		self.data.truncate(start + count);
		count
	}

	/// Offer the buffered bytes to `write` and discard as many as it took
	pub fn drain_with<F>(&mut self, write: F) -> usize
	where
		F: FnOnce(&[u8]) -> usize,
	{
		let count = write(&self.data).min(self.data.len());
		self.data.drain(..count);
		count
	}

	/// Hand bytes one at a time to `accept` until it refuses one
	pub fn drain_while<F>(&mut self, mut accept: F) -> usize
	where
		F: FnMut(u8) -> bool,
	{
		let count = self.data.iter().take_while(|&&byte| accept(byte)).count();
		self.data.drain(..count);
		count
	}
}
