// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod serial;
pub mod sws;

pub use error::{Result, SwsError};
