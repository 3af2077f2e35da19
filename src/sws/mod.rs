// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 swsbridge contributors

//! The single-wire serial (SWS) protocol engine, from the wire transport up to the target's
//! connection lifecycle.

pub mod bit_buffer;
pub mod codec;
pub mod protocol;
pub mod register;
pub mod self_clocked;
pub mod sim;
pub mod target;
pub mod transport;

pub use codec::{FrameCodec, TaggedCodec};
pub use protocol::SwsPort;
pub use register::DebugRegister;
pub use target::{ConnectStrategy, Target, TargetState};
pub use transport::{ResetLine, WireTransport};
