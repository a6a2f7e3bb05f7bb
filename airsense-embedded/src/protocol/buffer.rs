use heapless::Vec;

use airsense_api::LINE_TERMINATOR;

/// Outcome of feeding one byte to a [`LineBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// More bytes are needed
    Pending,
    /// A non-empty line is ready to be taken
    Complete,
    /// The current line outgrew the buffer and will be dropped up to the next terminator
    Overflow,
}

/// Accumulates bytes into newline-terminated lines of at most `N` bytes.
pub struct LineBuffer<const N: usize> {
    buffer: Vec<u8, N>,
    discarding: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feed one byte
    pub fn push(&mut self, byte: u8) -> LineStatus {
        match byte {
            b'\r' => LineStatus::Pending,
            LINE_TERMINATOR => {
                if self.discarding {
                    self.discarding = false;
                    LineStatus::Pending
                } else if self.buffer.is_empty() {
                    LineStatus::Pending
                } else {
                    LineStatus::Complete
                }
            }
            _ if self.discarding => LineStatus::Pending,
            _ => {
                if self.buffer.push(byte).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    LineStatus::Overflow
                } else {
                    LineStatus::Pending
                }
            }
        }
    }

    /// Take the accumulated line, leaving the buffer empty
    pub fn take(&mut self) -> Vec<u8, N> {
        core::mem::take(&mut self.buffer)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<const N: usize>(buffer: &mut LineBuffer<N>, bytes: &[u8]) -> LineStatus {
        let mut status = LineStatus::Pending;
        for &byte in bytes {
            status = buffer.push(byte);
        }
        status
    }

    #[test]
    fn test_line_buffer() {
        let mut buffer = LineBuffer::<40>::new();

        assert_eq!(feed(&mut buffer, b"hello"), LineStatus::Pending);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.capacity(), 40);

        assert_eq!(buffer.push(b'\n'), LineStatus::Complete);
        assert_eq!(buffer.take().as_slice(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_ignores_carriage_return_and_empty_lines() {
        let mut buffer = LineBuffer::<40>::new();

        assert_eq!(feed(&mut buffer, b"\r\n\n"), LineStatus::Pending);
        assert_eq!(feed(&mut buffer, b"ok\r\n"), LineStatus::Complete);
        assert_eq!(buffer.as_slice(), b"ok");
    }

    #[test]
    fn test_exact_fill_is_accepted() {
        let mut buffer = LineBuffer::<4>::new();

        assert_eq!(feed(&mut buffer, b"abcd"), LineStatus::Pending);
        assert_eq!(buffer.push(b'\n'), LineStatus::Complete);
        assert_eq!(buffer.take().as_slice(), b"abcd");
    }

    #[test]
    fn test_overflow_resyncs_at_terminator() {
        let mut buffer = LineBuffer::<4>::new();

        assert_eq!(feed(&mut buffer, b"abcd"), LineStatus::Pending);
        assert_eq!(buffer.push(b'e'), LineStatus::Overflow);
        assert!(buffer.is_empty());

        // The rest of the oversized line is dropped without further reports
        assert_eq!(feed(&mut buffer, b"fghijk"), LineStatus::Pending);
        assert_eq!(buffer.push(b'\n'), LineStatus::Pending);

        assert_eq!(feed(&mut buffer, b"ok\n"), LineStatus::Complete);
        assert_eq!(buffer.take().as_slice(), b"ok");
    }

    #[test]
    fn test_clear_resets_discarding() {
        let mut buffer = LineBuffer::<2>::new();

        assert_eq!(feed(&mut buffer, b"abc"), LineStatus::Overflow);
        buffer.clear();

        assert_eq!(feed(&mut buffer, b"ab\n"), LineStatus::Complete);
    }
}
