// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fmt::{self, Display, Formatter};

pub const DEFAULT_BIT_RATE: u32 = 115200;

/// Serial settings as the host requests them through the CDC SET_LINE_CODING control request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineCoding
{
	pub bit_rate: u32,
	/// 0 is one stop bit, 1 is one and a half, 2 is two
	pub stop_bits: u8,
	/// 0 none, 1 odd, 2 even, 3 mark, 4 space
	pub parity: u8,
	pub data_bits: u8,
}

impl Default for LineCoding
{
	fn default() -> Self
	{
		Self {
			bit_rate: DEFAULT_BIT_RATE,
			stop_bits: 1,
			parity: 0,
			data_bits: 8,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity
{
	None,
	Odd,
	Even,
}

/// Frame format as a UART can actually apply it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UartFormat
{
	pub data_bits: u8,
	pub stop_bits: u8,
	pub parity: Parity,
}

impl LineCoding
{
	/// Map the requested coding onto something the UART supports. Unsupported data widths
	/// fall back to 8, anything other than 2 stop bits is 1, and mark/space parity become none.
	pub fn uart_format(&self) -> UartFormat
	{
		UartFormat {
			data_bits: match self.data_bits {
				5..=8 => self.data_bits,
				_ => 8,
			},
			stop_bits: if self.stop_bits == 2 { 2 } else { 1 },
			parity: match self.parity {
				1 => Parity::Odd,
				2 => Parity::Even,
				_ => Parity::None,
			},
		}
	}
}

impl Display for UartFormat
{
	fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result
	{
		let parity = match self.parity {
			Parity::None => 'N',
			Parity::Odd => 'O',
			Parity::Even => 'E',
		};
		write!(fmt, "{}{}{}", self.data_bits, parity, self.stop_bits)
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn format_for(data_bits: u8, parity: u8, stop_bits: u8) -> UartFormat
	{
		LineCoding {
			bit_rate: DEFAULT_BIT_RATE,
			stop_bits,
			parity,
			data_bits,
		}
		.uart_format()
	}

	#[test]
	fn default_is_8n1()
	{
		assert_eq!(LineCoding::default().uart_format().to_string(), "8N1");
	}

	#[test]
	fn unsupported_settings_fall_back()
	{
		assert_eq!(format_for(16, 3, 1).to_string(), "8N1");
		assert_eq!(format_for(4, 4, 0).to_string(), "8N1");
		assert_eq!(format_for(7, 2, 2).to_string(), "7E2");
		assert_eq!(format_for(5, 1, 1).to_string(), "5O1");
	}
}
