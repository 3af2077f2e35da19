// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use log::{debug, warn};

use crate::error::{Result, SwsError};
use crate::sws::codec::FrameCodec;
use crate::sws::register::DebugRegister;

/// Command frame opening every transaction
pub const FRAME_START: u8 = 0x5a;
/// Command frame closing every transaction
pub const FRAME_END: u8 = 0xff;
pub const MODE_WRITE: u8 = 0x00;
pub const MODE_READ: u8 = 0x80;

/// Register-level access to the target's 16-bit debug address space.
///
/// A transaction is opened with the address and direction, continued with any number of data
/// bytes (the target auto-increments the address after each), and closed with [`FRAME_END`].
/// Should any step of a transaction fail, the close frame is still sent where the wire allows
/// it and the codec is reset so the next transaction starts from a clean slate.
pub struct SwsPort<C: FrameCodec>
{
	codec: C,
}

impl<C: FrameCodec> SwsPort<C>
{
	pub fn new(codec: C) -> Self
	{
		Self {
			codec,
		}
	}

	pub fn codec(&self) -> &C
	{
		&self.codec
	}

	pub fn codec_mut(&mut self) -> &mut C
	{
		&mut self.codec
	}

	fn open(&mut self, address: u16, mode: u8) -> Result<()>
	{
		self.codec.reset();
		self.codec.encode_command(FRAME_START)?;
		self.codec.encode_data_word(address)?;
		self.codec.encode_data(mode)
	}

	/// Open a read transaction at `address`; the target starts driving data after this
	pub fn open_read(&mut self, address: u16) -> Result<()>
	{
		debug!("SWS read transaction at {:#06x}", address);
		self.open(address, MODE_READ)
	}

	pub fn read_next(&mut self) -> Result<u8>
	{
		self.codec.decode_byte()
	}

	/// Open a write transaction at `address` carrying its first byte
	pub fn open_write(&mut self, address: u16, value: u8) -> Result<()>
	{
		debug!("SWS write transaction at {:#06x}", address);
		self.open(address, MODE_WRITE)?;
		self.codec.encode_data(value)
	}

	pub fn write_next(&mut self, value: u8) -> Result<()>
	{
		self.codec.encode_data(value)
	}

	pub fn close(&mut self) -> Result<()>
	{
		self.codec.encode_command(FRAME_END)?;
		self.codec.flush()
	}

	/// Abandon whatever transaction is in flight, closing it on a best-effort basis
	pub fn abort(&mut self)
	{
		self.codec.reset();
		if let Err(error) = self.close() {
			debug!("Could not close abandoned transaction: {}", error);
			self.codec.reset();
		}
	}

	fn transaction<T, F>(&mut self, body: F) -> Result<T>
	where
		F: FnOnce(&mut Self) -> Result<T>,
	{
		let result = body(self);
		if result.is_err() {
			self.abort();
		}
		result
	}

	pub fn read_single(&mut self, address: u16) -> Result<u8>
	{
		self.transaction(|port| {
			port.open_read(address)?;
			let value = port.read_next()?;
			port.close()?;
			Ok(value)
		})
	}

	/// Read a 16-bit value; the target sends the low byte first
	pub fn read_single_word(&mut self, address: u16) -> Result<u16>
	{
		self.transaction(|port| {
			port.open_read(address)?;
			let low = port.read_next()?;
			let high = port.read_next()?;
			port.close()?;
			Ok(u16::from_le_bytes([low, high]))
		})
	}

	/// Stream `count` bytes starting at `address` in a single transaction.
	///
	/// The transaction is opened on the first call to `next()` and closed by the call that
	/// finds the count exhausted (or when the iterator is dropped part way). A count of zero
	/// touches the wire not at all.
	pub fn read_multi(&mut self, address: u16, count: usize) -> ReadMulti<'_, C>
	{
		ReadMulti {
			port: self,
			address,
			remaining: count,
			phase: if count == 0 { ReadPhase::Done } else { ReadPhase::Unopened },
		}
	}

	pub fn write_single(&mut self, address: u16, value: u8) -> Result<()>
	{
		self.write_multi(address, &[value])
	}

	pub fn write_single_word(&mut self, address: u16, value: u16) -> Result<()>
	{
		self.write_multi(address, &value.to_le_bytes())
	}

	pub fn write_single_quad(&mut self, address: u16, value: u32) -> Result<()>
	{
		self.write_multi(address, &value.to_le_bytes())
	}

	/// Write `data` from `address` onwards in a single transaction; empty data is a no-op
	pub fn write_multi(&mut self, address: u16, data: &[u8]) -> Result<()>
	{
		let Some((&first, rest)) = data.split_first() else {
			return Ok(());
		};
		self.transaction(|port| {
			port.open_write(address, first)?;
			for &value in rest {
				port.write_next(value)?;
			}
			port.close()
		})
	}

	pub fn read_register(&mut self, register: DebugRegister) -> Result<u32>
	{
		let address = register.address();
		match register.width() {
			8 => self.read_single(address).map(u32::from),
			16 => self.read_single_word(address).map(u32::from),
			_ => {
				let bytes = self.read_multi(address, 4).collect::<Result<Vec<_>>>()?;
				Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
			},
		}
	}

	pub fn write_register(&mut self, register: DebugRegister, value: u32) -> Result<()>
	{
		if value & !register.mask() != 0 {
			return Err(SwsError::ValueTooWide {
				register,
				width: register.width(),
				value,
			});
		}
		let bytes = value.to_le_bytes();
		let length = usize::from(register.width() / 8);
		self.write_multi(register.address(), &bytes[..length])
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadPhase
{
	Unopened,
	Streaming,
	Done,
}

/// A streaming read in progress, see [`SwsPort::read_multi`]
pub struct ReadMulti<'p, C: FrameCodec>
{
	port: &'p mut SwsPort<C>,
	address: u16,
	remaining: usize,
	phase: ReadPhase,
}

impl<C: FrameCodec> ReadMulti<'_, C>
{
	fn fail(&mut self, error: SwsError) -> Option<Result<u8>>
	{
		self.port.abort();
		self.phase = ReadPhase::Done;
		Some(Err(error))
	}
}

impl<C: FrameCodec> Iterator for ReadMulti<'_, C>
{
	type Item = Result<u8>;

	fn next(&mut self) -> Option<Self::Item>
	{
		match self.phase {
			ReadPhase::Done => return None,
			ReadPhase::Unopened => {
				if let Err(error) = self.port.open_read(self.address) {
					return self.fail(error);
				}
				self.phase = ReadPhase::Streaming;
			},
			ReadPhase::Streaming => (),
		}

		if self.remaining == 0 {
			self.phase = ReadPhase::Done;
			return match self.port.close() {
				Ok(()) => None,
				Err(error) => self.fail(error),
			};
		}

		match self.port.read_next() {
			Ok(value) => {
				self.remaining -= 1;
				Some(Ok(value))
			},
			Err(error) => self.fail(error),
		}
	}

	fn size_hint(&self) -> (usize, Option<usize>)
	{
		match self.phase {
			ReadPhase::Done => (0, Some(0)),
			_ => (0, Some(self.remaining + 1)),
		}
	}
}

impl<C: FrameCodec> Drop for ReadMulti<'_, C>
{
	fn drop(&mut self)
	{
		if self.phase == ReadPhase::Streaming {
			if let Err(error) = self.port.close() {
				warn!("Failed to close abandoned read transaction: {}", error);
				self.port.codec.reset();
			}
		}
	}
}
