// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

//! Host-side access to a bridge over its serial console.

pub mod client;
pub mod port;

pub use client::{SwsClient, hexdump};
pub use port::open_port;
