// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::error::Result;

/// How long a read waits for the bridge before giving up and returning no data
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Open the bridge's control interface and ready it for the ASCII command protocol
pub fn open_port(path: &Path) -> Result<File>
{
	let handle = File::options().read(true).write(true).open(path)?;
	init_handle(&handle)?;
	debug!("Opened bridge console on {}", path.display());
	Ok(handle)
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
fn init_handle(handle: &File) -> Result<()>
{
	use std::os::fd::AsRawFd;

	#[cfg(any(target_os = "linux", target_os = "android"))]
	use termios::os::linux::{B115200, CRTSCTS};
	#[cfg(target_os = "macos")]
	use termios::os::macos::{B115200, CRTSCTS};
	use termios::*;

	let fd = handle.as_raw_fd();
	let mut attrs = Termios::from_fd(fd)?;

	// 8N1 with the receiver on, no modem control and no hardware flow control
	attrs.c_cflag &= !(CSIZE | CSTOPB | PARENB | CRTSCTS);
	attrs.c_cflag |= CS8 | CLOCAL | CREAD;
	// No break handling, CR/NL translation or software flow control
	attrs.c_iflag &= !(IGNBRK | BRKINT | ICRNL | INLCR | ISTRIP | IXON | IXOFF | IXANY);
	attrs.c_lflag = 0;
	attrs.c_oflag = 0;
	// Reads return whatever is there, waiting at most 0.5s for the first byte
	attrs.c_cc[VMIN] = 0;
	attrs.c_cc[VTIME] = (READ_TIMEOUT.as_millis() / 100) as u8;
	cfsetspeed(&mut attrs, B115200)?;

	tcsetattr(fd, TCSANOW, &attrs)?;
	Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
fn init_handle(_handle: &File) -> Result<()>
{
	Ok(())
}
