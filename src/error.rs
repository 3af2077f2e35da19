// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors
//! Module for error handling code.

use thiserror::Error;

use crate::sws::register::DebugRegister;

#[derive(Debug, Error)]
pub enum SwsError
{
	#[error("Target not responding (timed out after {timeout_ms}ms waiting for {operation})")]
	Timeout
	{
		/// The wire operation that was being waited on (e.g. `"transmit completion"`).
		operation: &'static str,

		/// The bound that expired.
		timeout_ms: u128,
	},

	#[error("Target identified as {found:#06x}, expected {expected:#06x}")]
	IdentityMismatch
	{
		expected: u16,
		found: u16,
	},

	#[error("Malformed host payload: {0:?} is not a valid hex digit")]
	MalformedPayload(char),

	#[error("Host link closed mid-command")]
	HostLinkClosed,

	#[error("Value {value:#x} does not fit in the {width}-bit register {register:?}")]
	ValueTooWide
	{
		register: DebugRegister,
		width: u8,
		value: u32,
	},

	#[error("Bridge reported an error: {0}")]
	Protocol(String),

	#[error("I/O error talking to the bridge")]
	Io(#[from] std::io::Error),

	#[error("Invalid bridge configuration")]
	Config(#[from] serde_json::Error),
}

impl SwsError
{
	/// Whether this error means the target stopped answering on the wire.
	pub fn is_timeout(&self) -> bool
	{
		matches!(self, SwsError::Timeout { .. })
	}
}

pub type Result<T> = std::result::Result<T, SwsError>;

#[macro_export]
macro_rules! log_and_return
{
	($err:expr) => {
		let err = $err;
		log::error!("{}", err);
		return Err(err);
	}
}
