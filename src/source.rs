//! Caller-supplied pull sources.

use std::ffi::c_void;
use std::io::{self, Read};

/// Pull callback: fill up to `size` bytes at `buffer`, return the number
/// produced, 0 at end of stream, or a negative value on failure.
pub type ReadFn = extern "C" fn(buffer: *mut u8, size: usize, userdata: *mut c_void) -> isize;

/// C-layout byte source: a pull function plus the opaque context handed
/// back to it on every call. The parser never frees `userdata`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ByteSource {
    pub read: Option<ReadFn>,
    pub userdata: *mut c_void,
}

impl ByteSource {
    /// Both the callback and its context must be present.
    pub fn is_valid(&self) -> bool {
        self.read.is_some() && !self.userdata.is_null()
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(read) = self.read else {
            return Err(io::Error::other("byte source has no read callback"));
        };
        let rv = read(buf.as_mut_ptr(), buf.len(), self.userdata);
        produced(rv, buf.len())
    }
}

/// Rust-side pull source with the same contract as [`ByteSource`].
pub struct PullSource<F> {
    pull: F,
}

impl<F> PullSource<F>
where
    F: FnMut(&mut [u8]) -> isize,
{
    pub fn new(pull: F) -> Self {
        PullSource { pull }
    }
}

impl<F> Read for PullSource<F>
where
    F: FnMut(&mut [u8]) -> isize,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rv = (self.pull)(buf);
        produced(rv, buf.len())
    }
}

fn produced(rv: isize, requested: usize) -> io::Result<usize> {
    if rv < 0 {
        return Err(io::Error::other("byte source reported a read failure"));
    }
    let n = rv as usize;
    if n > requested {
        return Err(io::Error::other("byte source produced more than requested"));
    }
    Ok(n)
}
