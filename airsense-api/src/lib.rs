#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod message;
pub mod protocol;

pub use message::*;
pub use protocol::{Error, Result, decode_telemetry, encode_command};
