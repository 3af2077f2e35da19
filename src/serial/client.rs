// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fmt::Write as _;
use std::io::{ErrorKind, Read, Write};

use log::{debug, trace};

use crate::error::{Result, SwsError};
use crate::serial::port::READ_TIMEOUT;
use crate::sws::register::{DebugRegister, SWIRE_FIFO_MODE};

/// Flash command to start a sequential read
const FLASH_READ: u8 = 0x03;
/// Dummy byte clocked out to shift the next byte in from the flash
const FLASH_CLOCK: u8 = 0xff;
const CHIP_SELECT_ASSERT: u8 = 0x00;
const CHIP_SELECT_RELEASE: u8 = 0x01;

/// Host side of the bridge's ASCII command protocol
pub struct SwsClient<P: Read + Write>
{
	port: P,
}

impl<P: Read + Write> SwsClient<P>
{
	pub fn new(port: P) -> Self
	{
		Self {
			port,
		}
	}

	pub fn port(&self) -> &P
	{
		&self.port
	}

	pub fn into_inner(self) -> P
	{
		self.port
	}

	fn send(&mut self, command: &str) -> Result<()>
	{
		trace!("-> {}", command);
		self.port.write_all(command.as_bytes())?;
		Ok(self.port.flush()?)
	}

	fn read_byte_raw(&mut self) -> Result<u8>
	{
		let mut byte = [0u8];
		loop {
			match self.port.read(&mut byte) {
				Ok(0) => {
					return Err(SwsError::Timeout {
						operation: "bridge response",
						timeout_ms: READ_TIMEOUT.as_millis(),
					});
				},
				Ok(_) => return Ok(byte[0]),
				Err(error) if error.kind() == ErrorKind::Interrupted => continue,
				Err(error) => return Err(error.into()),
			}
		}
	}

	/// Next meaningful response character, skipping `#` comment lines and whitespace
	fn read_char(&mut self) -> Result<u8>
	{
		loop {
			let mut character = self.read_byte_raw()?;
			if character == b'#' {
				let mut comment = Vec::new();
				while character != b'\n' {
					character = self.read_byte_raw()?;
					comment.push(character);
				}
				debug!("Bridge:{}", String::from_utf8_lossy(&comment).trim_end());
			}
			if !matches!(character, b'\n' | b'\r' | b' ') {
				return Ok(character);
			}
		}
	}

	/// Collect hex output up to the closing `S` and decode it
	fn read_hex(&mut self) -> Result<Vec<u8>>
	{
		let mut digits = Vec::new();
		loop {
			match self.read_char()? {
				b'S' => break,
				b'E' => return Err(SwsError::Protocol("command failed".into())),
				b'?' => return Err(SwsError::Protocol("command not recognised".into())),
				character => digits.push(character),
			}
		}
		if digits.len() % 2 != 0 {
			return Err(SwsError::Protocol(format!("odd-length hex response ({} digits)", digits.len())));
		}
		digits
			.chunks(2)
			.map(|pair| {
				std::str::from_utf8(pair)
					.ok()
					.and_then(|pair| u8::from_str_radix(pair, 16).ok())
					.ok_or_else(|| {
						SwsError::Protocol(format!("invalid hex in response: {:?}", String::from_utf8_lossy(pair)))
					})
			})
			.collect()
	}

	/// Attach to and verify the target
	pub fn connect(&mut self) -> Result<()>
	{
		self.send("i")?;
		match self.read_char()? {
			b'S' => Ok(()),
			_ => Err(SwsError::Protocol("connection failed".into())),
		}
	}

	pub fn soc_id(&mut self) -> Result<u16>
	{
		self.read_word(DebugRegister::SocId.address())
	}

	/// Drive the target's reset line; `false` holds it in reset
	pub fn reset(&mut self, level: bool) -> Result<()>
	{
		self.send(if level { "r1" } else { "r0" })?;
		self.read_hex().map(|_| ())
	}

	/// Pulse reset so the target boots and runs its firmware
	pub fn run(&mut self) -> Result<()>
	{
		self.send("g")?;
		self.read_hex().map(|_| ())
	}

	pub fn read_bytes(&mut self, address: u16, length: u16) -> Result<Vec<u8>>
	{
		self.send(&format!("R{:04x}{:04x}", address, length))?;
		let data = self.read_hex()?;
		if data.len() != usize::from(length) {
			return Err(SwsError::Protocol(format!(
				"asked for {} bytes from {:#06x}, got {}",
				length,
				address,
				data.len()
			)));
		}
		Ok(data)
	}

	pub fn read_byte(&mut self, address: u16) -> Result<u8>
	{
		Ok(self.read_bytes(address, 1)?[0])
	}

	pub fn read_word(&mut self, address: u16) -> Result<u16>
	{
		let data = self.read_bytes(address, 2)?;
		Ok(u16::from_le_bytes([data[0], data[1]]))
	}

	pub fn read_quad(&mut self, address: u16) -> Result<u32>
	{
		let data = self.read_bytes(address, 4)?;
		Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
	}

	pub fn write_bytes(&mut self, address: u16, data: &[u8]) -> Result<()>
	{
		let length = u16::try_from(data.len())
			.map_err(|_| SwsError::Protocol(format!("{} bytes is too long for one write", data.len())))?;
		let mut command = format!("W{:04x}{:04x}", address, length);
		for byte in data {
			let _ = write!(command, "{:02x}", byte);
		}
		self.send(&command)?;
		self.read_hex().map(|_| ())
	}

	pub fn write_byte(&mut self, address: u16, value: u8) -> Result<()>
	{
		self.write_bytes(address, &[value])
	}

	pub fn write_word(&mut self, address: u16, value: u16) -> Result<()>
	{
		self.write_bytes(address, &value.to_le_bytes())
	}

	pub fn write_quad(&mut self, address: u16, value: u32) -> Result<()>
	{
		self.write_bytes(address, &value.to_le_bytes())
	}

	fn flash_data(&mut self, value: u8) -> Result<()>
	{
		self.write_byte(DebugRegister::FlashData.address(), value)
	}

	fn flash_select(&mut self, level: u8) -> Result<()>
	{
		self.write_byte(DebugRegister::FlashChipSelect.address(), level)
	}

	/// Read the attached SPI flash's status byte through the target's flash controller
	pub fn flash_status(&mut self) -> Result<u8>
	{
		self.flash_select(CHIP_SELECT_ASSERT)?;
		self.flash_data(FLASH_READ)?;
		self.flash_data(FLASH_CLOCK)?;
		let status = self.read_byte(DebugRegister::FlashData.address())?;
		self.flash_select(CHIP_SELECT_RELEASE)?;
		Ok(status)
	}

	/// Read `length` bytes of SPI flash starting at the 24-bit `address`
	pub fn read_flash_block(&mut self, address: u32, length: usize) -> Result<Vec<u8>>
	{
		self.flash_select(CHIP_SELECT_ASSERT)?;
		self.flash_data(FLASH_READ)?;
		for byte in &address.to_be_bytes()[1..] {
			self.flash_data(*byte)?;
		}

		self.write_byte(DebugRegister::SwireId.address(), SWIRE_FIFO_MODE)?;
		let mut data = Vec::with_capacity(length);
		for _ in 0..length {
			self.flash_data(FLASH_CLOCK)?;
			data.push(self.read_byte(DebugRegister::FlashData.address())?);
		}
		self.write_byte(DebugRegister::SwireId.address(), 0x00)?;
		self.flash_select(CHIP_SELECT_RELEASE)?;
		Ok(data)
	}
}

/// Format `bytes` as 16-byte rows of hex plus printable ASCII, labelled from `address`
pub fn hexdump(bytes: &[u8], address: u32) -> String
{
	let start = u64::from(address);
	let end = start + bytes.len() as u64;
	let mut output = String::new();
	let mut ascii = String::new();
	let mut row = start & !15;
	loop {
		let _ = write!(output, "{:08x} : ", row);
		ascii.clear();
		for offset in row..row + 16 {
			if (start..end).contains(&offset) {
				let byte = bytes[(offset - start) as usize];
				let _ = write!(output, "{:02x} ", byte);
				ascii.push(if (32..=126).contains(&byte) { char::from(byte) } else { '.' });
			} else {
				output.push_str("   ");
				ascii.push(' ');
			}
		}
		let _ = writeln!(output, ": |{}|", ascii);
		row += 16;
		if row >= end {
			return output;
		}
	}
}
