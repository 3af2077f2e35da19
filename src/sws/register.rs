// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fmt::{self, Display, Formatter};

/// Debug registers of the Telink SoC that the bridge itself knows about.
///
/// Each register carries its width so that a register can only be accessed with a
/// transaction of the matching size.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DebugRegister
{
	/// Chip identity, checked on connect
	SocId,
	/// Data register of the SPI flash controller
	FlashData,
	/// Chip select of the SPI flash controller, 0 selects
	FlashChipSelect,
	SwireData,
	SwireControl,
	/// Divider deriving the SWS bit clock from the system clock
	SwireClockDivider,
	/// SWS slave ID; bit 7 switches reads of [`DebugRegister::FlashData`] to FIFO mode
	SwireId,
	/// Debug run state, writing [`HALT`] stops the CPU
	RunState,
	/// Timer control, including the watchdog enable bit [`WATCHDOG_ENABLE`]
	TimerControl,
}

/// Run state value that halts the target CPU
pub const HALT: u8 = 0x05;
pub const WATCHDOG_ENABLE: u32 = 1 << 23;
/// Value of [`DebugRegister::SwireId`] that streams flash bytes through the data register
pub const SWIRE_FIFO_MODE: u8 = 0x80;

impl DebugRegister
{
	pub const fn address(self) -> u16
	{
		match self {
			DebugRegister::SocId => 0x007e,
			DebugRegister::FlashData => 0x000c,
			DebugRegister::FlashChipSelect => 0x000d,
			DebugRegister::SwireData => 0x00b0,
			DebugRegister::SwireControl => 0x00b1,
			DebugRegister::SwireClockDivider => 0x00b2,
			DebugRegister::SwireId => 0x00b3,
			DebugRegister::RunState => 0x0602,
			DebugRegister::TimerControl => 0x0620,
		}
	}

	/// Register width in bits
	pub const fn width(self) -> u8
	{
		match self {
			DebugRegister::SocId => 16,
			DebugRegister::TimerControl => 32,
			_ => 8,
		}
	}

	pub const fn mask(self) -> u32
	{
		match self.width() {
			32 => u32::MAX,
			width => (1 << width) - 1,
		}
	}
}

impl Display for DebugRegister
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
	{
		write!(f, "{:?}@{:#06x}", self, self.address())
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn widths_and_masks()
	{
		assert_eq!(DebugRegister::SocId.mask(), 0xffff);
		assert_eq!(DebugRegister::RunState.mask(), 0xff);
		assert_eq!(DebugRegister::TimerControl.mask(), u32::MAX);
		assert_eq!(DebugRegister::SwireClockDivider.address(), 0xb2);
	}

	#[test]
	fn display_names_the_address()
	{
		assert_eq!(DebugRegister::RunState.to_string(), "RunState@0x0602");
	}
}
