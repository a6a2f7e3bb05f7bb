mod buffer;
mod codec;
mod writer;

pub use buffer::*;
pub use codec::*;
pub use writer::*;
