// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::io::{ErrorKind, Read, Write};

use log::{debug, warn};

/// The console-style byte channel the host drives the bridge over
pub trait HostLink
{
	/// Whether a host is currently attached
	fn connected(&self) -> bool;

	/// Wait for the next character from the host; `None` once the host has gone away
	fn get_char(&mut self) -> Option<u8>;

	/// The next character if one is already waiting
	fn try_get_char(&mut self) -> Option<u8>
	{
		self.get_char()
	}

	fn put_str(&mut self, text: &str);
}

/// A [`HostLink`] over a pair of byte streams, considered connected until the input reaches
/// end-of-file or either side fails.
pub struct StreamLink<R: Read, W: Write>
{
	reader: R,
	writer: W,
	open: bool,
}

impl<R: Read, W: Write> StreamLink<R, W>
{
	pub fn new(reader: R, writer: W) -> Self
	{
		Self {
			reader,
			writer,
			open: true,
		}
	}

	pub fn writer(&self) -> &W
	{
		&self.writer
	}

	pub fn into_parts(self) -> (R, W)
	{
		(self.reader, self.writer)
	}
}

impl<R: Read, W: Write> HostLink for StreamLink<R, W>
{
	fn connected(&self) -> bool
	{
		self.open
	}

	fn get_char(&mut self) -> Option<u8>
	{
		if !self.open {
			return None;
		}
		let mut byte = [0u8];
		loop {
			match self.reader.read(&mut byte) {
				Ok(0) => {
					debug!("Host closed the link");
					self.open = false;
					return None;
				},
				Ok(_) => return Some(byte[0]),
				Err(error) if error.kind() == ErrorKind::Interrupted => continue,
				Err(error) => {
					warn!("Failed to read from host: {}", error);
					self.open = false;
					return None;
				},
			}
		}
	}

	fn put_str(&mut self, text: &str)
	{
		if !self.open {
			return;
		}
		if let Err(error) = self.writer.write_all(text.as_bytes()).and_then(|()| self.writer.flush()) {
			warn!("Failed to write to host: {}", error);
			self.open = false;
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn stream_link_disconnects_at_eof()
	{
		let mut link = StreamLink::new("ab".as_bytes(), Vec::new());
		assert!(link.connected());
		assert_eq!(link.get_char(), Some(b'a'));
		assert_eq!(link.try_get_char(), Some(b'b'));
		assert_eq!(link.get_char(), None);
		assert!(!link.connected());
		link.put_str("ignored");
		assert!(link.writer().is_empty());
	}

	#[test]
	fn stream_link_writes_through()
	{
		let mut link = StreamLink::new(std::io::empty(), Vec::new());
		link.put_str("S\n");
		let (_, output) = link.into_parts();
		assert_eq!(output, b"S\n");
	}
}
