// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

/// Default size of a transaction's worth of sub-slot samples.
pub const DEFAULT_CAPACITY_BITS: usize = 4096;

/// A fixed-capacity sequence of bits, stored MSB-first in 32-bit words so that it can be
/// streamed straight into (and out of) a shift-register style wire transport.
///
/// Writes past the capacity are dropped rather than failing: the wire timing paths that fill
/// this buffer must never abort mid-frame. Every dropped bit is counted, see
/// [`BitBuffer::dropped_bits`]. Reads past the written region yield `None`.
#[derive(Clone, Debug)]
pub struct BitBuffer
{
	words: Vec<u32>,
	capacity: usize,
	write_pos: usize,
	read_pos: usize,
	dropped: usize,
}

impl Default for BitBuffer
{
	fn default() -> Self
	{
		Self::with_capacity(DEFAULT_CAPACITY_BITS)
	}
}

impl BitBuffer
{
	pub fn with_capacity(capacity: usize) -> Self
	{
		Self {
			words: vec![0; capacity.div_ceil(32)],
			capacity,
			write_pos: 0,
			read_pos: 0,
			dropped: 0,
		}
	}

	pub fn capacity(&self) -> usize
	{
		self.capacity
	}

	/// Number of bits written since the last write-cursor reset
	pub fn len(&self) -> usize
	{
		self.write_pos
	}

	pub fn is_empty(&self) -> bool
	{
		self.write_pos == 0
	}

	/// Number of written bits not yet consumed by the read cursor
	pub fn remaining(&self) -> usize
	{
		self.write_pos - self.read_pos
	}

	/// Total bits discarded because the buffer was full, over the buffer's lifetime
	pub fn dropped_bits(&self) -> usize
	{
		self.dropped
	}

	pub fn reset(&mut self)
	{
		self.reset_write();
	}

	/// Rewind the write cursor. This also rewinds the read cursor, which may never run ahead
	/// of the written region.
	pub fn reset_write(&mut self)
	{
		self.write_pos = 0;
		self.read_pos = 0;
	}

	pub fn reset_read(&mut self)
	{
		self.read_pos = 0;
	}

	fn locate(pos: usize) -> (usize, u32)
	{
		(pos / 32, 0x8000_0000 >> (pos & 31))
	}

	pub fn push_bit(&mut self, bit: bool)
	{
		if self.write_pos >= self.capacity {
			self.dropped += 1;
			return;
		}
		let (index, mask) = Self::locate(self.write_pos);
		if bit {
			self.words[index] |= mask;
		} else {
			self.words[index] &= !mask;
		}
		self.write_pos += 1;
	}

	pub fn push_run(&mut self, bit: bool, count: usize)
	{
		for _ in 0..count {
			self.push_bit(bit);
		}
	}

	/// Append the top `bits` bits of `word`, most significant first
	pub fn push_word(&mut self, word: u32, bits: usize)
	{
		for shift in 0..bits.min(32) {
			self.push_bit(word & (0x8000_0000 >> shift) != 0);
		}
	}

	pub fn peek_bit(&self) -> Option<bool>
	{
		if self.read_pos >= self.write_pos {
			return None;
		}
		let (index, mask) = Self::locate(self.read_pos);
		Some(self.words[index] & mask != 0)
	}

	pub fn read_bit(&mut self) -> Option<bool>
	{
		let bit = self.peek_bit()?;
		self.read_pos += 1;
		Some(bit)
	}

	/// Count and consume consecutive bits equal to `level`, stopping before the first that differs
	pub fn read_run(&mut self, level: bool) -> usize
	{
		let mut count = 0;
		while self.peek_bit() == Some(level) {
			self.read_pos += 1;
			count += 1;
		}
		count
	}

	/// The written region as whole words; bits past the write cursor in the final word are
	/// whatever was there before and must be ignored by the consumer.
	pub fn words(&self) -> &[u32]
	{
		&self.words[..self.write_pos.div_ceil(32)]
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn bits_read_back_in_order()
	{
		let mut buffer = BitBuffer::with_capacity(16);
		for bit in [true, false, false, true, true] {
			buffer.push_bit(bit);
		}
		assert_eq!(buffer.len(), 5);
		let bits: Vec<_> = std::iter::from_fn(|| buffer.read_bit()).collect();
		assert_eq!(bits, vec![true, false, false, true, true]);
		assert_eq!(buffer.read_bit(), None);
	}

	#[test]
	fn overflow_is_counted_not_stored()
	{
		let mut buffer = BitBuffer::with_capacity(8);
		buffer.push_run(true, 11);
		assert_eq!(buffer.len(), 8);
		assert_eq!(buffer.dropped_bits(), 3);
		buffer.reset();
		assert!(buffer.is_empty());
		// The diagnostic survives a rewind
		assert_eq!(buffer.dropped_bits(), 3);
	}

	#[test]
	fn words_are_msb_first()
	{
		let mut buffer = BitBuffer::default();
		buffer.push_run(false, 4);
		buffer.push_bit(true);
		buffer.push_run(true, 35);
		assert_eq!(buffer.words(), &[0x0fff_ffff, 0xff00_0000]);
	}

	#[test]
	fn runs_stop_at_level_change()
	{
		let mut buffer = BitBuffer::default();
		buffer.push_word(0xf0f0_0000, 12);
		assert_eq!(buffer.read_run(false), 0);
		assert_eq!(buffer.read_run(true), 4);
		assert_eq!(buffer.read_run(false), 4);
		assert_eq!(buffer.read_run(true), 4);
		assert_eq!(buffer.read_run(true), 0);
		assert_eq!(buffer.remaining(), 0);
	}

	#[test]
	fn read_cursor_rewinds_independently()
	{
		let mut buffer = BitBuffer::default();
		buffer.push_run(true, 3);
		assert_eq!(buffer.read_run(true), 3);
		buffer.reset_read();
		assert_eq!(buffer.remaining(), 3);
	}
}
