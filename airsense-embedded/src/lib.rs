#![no_std]

extern crate alloc;

pub mod calibration;
pub mod clock;
pub mod error;
pub mod node;
pub mod protocol;
pub mod sensor;
pub mod storage;

pub use calibration::*;
pub use clock::*;
pub use error::*;
pub use node::*;
pub use protocol::*;
pub use sensor::*;
pub use storage::*;
