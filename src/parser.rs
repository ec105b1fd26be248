use crate::boxes::{BoxHeader, FourCC};
use crate::known_boxes::KnownBox;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use log::debug;
use std::collections::TryReserveError;
use std::io::{self, Read, Take};

/// Upper bound on entry counts of sample tables and edit lists:
/// one week of 30 fps content.
pub const TABLE_SIZE_LIMIT: u32 = 30 * 60 * 60 * 24 * 7;

/// Upper bound on payloads copied into memory (codec descriptors).
pub const BUF_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Deepest box nesting accepted before the stream is declared invalid.
pub const MAX_BOX_DEPTH: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("unexpected end of stream")]
    UnexpectedEof,
    #[error("io: {0}")]
    Io(io::Error),
    #[error("no moov box found")]
    NoMoov,
    #[error("out of memory")]
    OutOfMemory,
    #[error("table with {0} entries exceeds the size limit")]
    TableTooLarge(u32),
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => ParseError::UnexpectedEof,
            _ => ParseError::Io(err),
        }
    }
}

impl From<TryReserveError> for ParseError {
    fn from(_: TryReserveError) -> Self {
        ParseError::OutOfMemory
    }
}

impl From<bitreader::BitReaderError> for ParseError {
    fn from(_: bitreader::BitReaderError) -> Self {
        ParseError::InvalidData("truncated bit field")
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// A readable span of the stream.
///
/// Box payloads are bounded regions; the top-level stream is open-ended.
pub trait Region: Read {
    /// Bytes left before the region ends, `None` when only the end of the
    /// underlying stream bounds it.
    fn bytes_left(&self) -> Option<u64>;
}

/// Top-level region wrapping the caller's reader.
pub struct Stream<R> {
    inner: R,
}

impl<R: Read> Stream<R> {
    pub fn new(inner: R) -> Self {
        Stream { inner }
    }
}

impl<R: Read> Read for Stream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> Region for Stream<R> {
    fn bytes_left(&self) -> Option<u64> {
        None
    }
}

/// Read as many bytes as the source yields, up to `buf.len()`.
fn fill<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match src.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

/// Discard exactly `n` bytes.
pub fn skip<R: Read + ?Sized>(src: &mut R, n: u64) -> Result<()> {
    let copied = io::copy(&mut (&mut *src).take(n), &mut io::sink())?;
    if copied < n {
        return Err(ParseError::UnexpectedEof);
    }
    Ok(())
}

fn header_fits(left: Option<u64>, len: u64) -> Result<()> {
    match left {
        Some(left) if left < len => Err(ParseError::InvalidData("box header exceeds enclosing region")),
        _ => Ok(()),
    }
}

/// Decode the next box header from `src`.
///
/// Returns `Ok(None)` when the region is exhausted. Fewer than eight bytes
/// left in a bounded region are padding and get consumed here.
pub fn read_box_header(src: &mut dyn Region) -> Result<Option<BoxHeader>> {
    let left = src.bytes_left();
    if let Some(left) = left
        && left < 8
    {
        if left > 0 {
            debug!("skipping {} trailing bytes", left);
            skip(src, left)?;
        }
        return Ok(None);
    }

    let mut buf = [0u8; 8];
    let got = fill(src, &mut buf)?;
    if got == 0 && left.is_none() {
        return Ok(None);
    }
    if got < buf.len() {
        return Err(ParseError::UnexpectedEof);
    }

    let size32 = BigEndian::read_u32(&buf[0..4]);
    let typ = FourCC([buf[4], buf[5], buf[6], buf[7]]);
    let mut header_size = 8u64;

    let size = match size32 {
        0 => None,
        1 => {
            header_fits(left, 16)?;
            let size64 = src.read_u64::<BigEndian>()?;
            header_size += 8;
            if size64 < header_size {
                return Err(ParseError::InvalidData("extended box size smaller than header"));
            }
            Some(size64)
        }
        2..=7 => return Err(ParseError::InvalidData("box size smaller than header")),
        _ => Some(u64::from(size32)),
    };

    let mut uuid = None;
    if &typ.0 == b"uuid" {
        header_fits(left, header_size + 16)?;
        let mut u = [0u8; 16];
        src.read_exact(&mut u)?;
        header_size += 16;
        uuid = Some(u);
    }

    if let Some(size) = size
        && size < header_size
    {
        return Err(ParseError::InvalidData("box size smaller than header"));
    }

    Ok(Some(BoxHeader { typ, size, header_size, uuid }))
}

/// Iterates the boxes of one region, handing out one bounded child at a time.
pub struct BoxIter<'a> {
    src: &'a mut dyn Region,
    depth: usize,
}

impl<'a> BoxIter<'a> {
    pub fn new(src: &'a mut dyn Region, depth: usize) -> Self {
        BoxIter { src, depth }
    }

    pub fn next_box(&mut self) -> Result<Option<BmffBox<'_>>> {
        let Some(head) = read_box_header(self.src)? else {
            return Ok(None);
        };
        let depth = self.depth + 1;
        if depth > MAX_BOX_DEPTH {
            return Err(ParseError::InvalidData("boxes nested too deeply"));
        }

        let (limit, bounded) = match (head.content_size(), self.src.bytes_left()) {
            (Some(n), Some(left)) if n > left => {
                return Err(ParseError::InvalidData("box exceeds enclosing region"));
            }
            (Some(n), _) => (n, true),
            (None, Some(left)) => (left, true),
            (None, None) => (u64::MAX, false),
        };

        debug!(
            "{:indent$}{} ({}) size={:?}",
            "",
            head.typ,
            KnownBox::from(head.typ).full_name(),
            head.size,
            indent = (depth - 1) * 2
        );

        let src: &mut dyn Region = &mut *self.src;
        Ok(Some(BmffBox {
            head,
            content: Read::take(src, limit),
            bounded,
            depth,
        }))
    }
}

/// One box whose payload can be read up to its end and no further.
pub struct BmffBox<'a> {
    pub head: BoxHeader,
    content: Take<&'a mut dyn Region>,
    bounded: bool,
    depth: usize,
}

impl Read for BmffBox<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.content.read(buf)
    }
}

impl Region for BmffBox<'_> {
    fn bytes_left(&self) -> Option<u64> {
        self.bounded.then(|| self.content.limit())
    }
}

impl BmffBox<'_> {
    pub fn kind(&self) -> KnownBox {
        KnownBox::from(self.head.typ)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Iterate child boxes of this box's (remaining) payload.
    pub fn box_iter(&mut self) -> BoxIter<'_> {
        let depth = self.depth;
        BoxIter::new(self, depth)
    }

    fn ensure(&self, n: u64) -> Result<()> {
        match self.bytes_left() {
            Some(left) if left < n => Err(ParseError::InvalidData("read past end of box")),
            _ => Ok(()),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.content.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.content.read_u16::<BigEndian>()?)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.content.read_i16::<BigEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.content.read_u32::<BigEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.content.read_i32::<BigEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.content.read_u64::<BigEndian>()?)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.content.read_i64::<BigEndian>()?)
    }

    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        Ok(FourCC::from(self.read_u32()?))
    }

    /// FullBox version and 24-bit flags.
    pub fn read_fullbox_extra(&mut self) -> Result<(u8, u32)> {
        self.ensure(4)?;
        let version = self.content.read_u8()?;
        let flags = self.content.read_u24::<BigEndian>()?;
        Ok((version, flags))
    }

    /// Entry count of a table whose entries are `entry_size` bytes each.
    ///
    /// Counts above [`TABLE_SIZE_LIMIT`] fail before any entry is read, and
    /// the box must be large enough to hold every entry.
    pub fn read_table_count(&mut self, entry_size: u64) -> Result<u32> {
        let count = self.read_u32()?;
        check_table_limit(count)?;
        self.ensure(u64::from(count) * entry_size)?;
        Ok(count)
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.ensure(n)?;
        skip(&mut self.content, n)
    }

    /// Consume whatever is left of the payload.
    pub fn skip_remain(&mut self) -> Result<()> {
        if self.bounded {
            let left = self.content.limit();
            skip(&mut self.content, left)
        } else {
            io::copy(&mut self.content, &mut io::sink())?;
            Ok(())
        }
    }

    /// Copy `n` payload bytes into a fresh buffer.
    pub fn read_buf(&mut self, n: u64) -> Result<Vec<u8>> {
        if n > BUF_SIZE_LIMIT {
            return Err(ParseError::InvalidData("box payload too large to buffer"));
        }
        self.ensure(n)?;
        let len = n as usize;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)?;
        buf.resize(len, 0);
        self.content.read_exact(&mut buf)?;
        Ok(buf)
    }
}

pub fn check_table_limit(count: u32) -> Result<()> {
    if count > TABLE_SIZE_LIMIT {
        return Err(ParseError::TableTooLarge(count));
    }
    Ok(())
}

/// Push with a fallible reservation so hostile counts surface as
/// [`ParseError::OutOfMemory`] instead of aborting.
pub fn vec_push<T>(vec: &mut Vec<T>, val: T) -> Result<()> {
    vec.try_reserve(1)?;
    vec.push(val);
    Ok(())
}

/// Skip a box, walking the children of recognized containers so their
/// headers are still validated.
pub fn skip_box(b: &mut BmffBox<'_>) -> Result<()> {
    if b.kind().is_container() {
        let mut iter = b.box_iter();
        while let Some(mut child) = iter.next_box()? {
            skip_box(&mut child)?;
        }
    }
    b.skip_remain()
}
