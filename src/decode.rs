//! Decoders for the fixed-layout header boxes the track builder needs.
//!
//! Every decoder consumes its box completely, so callers can move on to the
//! next sibling.

use crate::boxes::FourCC;
use crate::parser::{BmffBox, ParseError, Region, Result, check_table_limit, vec_push};
use log::{debug, warn};
use serde::Serialize;

/// ftyp: major + minor + compatible brands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieHeaderBox {
    pub timescale: u32,
    /// `None` when the header marks the duration as unknown.
    pub duration: Option<u64>,
}

/// Track header transformation matrix, 16.16 fixed point except for the
/// 2.30 `u`, `v` and `w` columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Matrix {
    pub a: i32,
    pub b: i32,
    pub u: i32,
    pub c: i32,
    pub d: i32,
    pub v: i32,
    pub x: i32,
    pub y: i32,
    pub w: i32,
}

impl Matrix {
    /// Clockwise rotation in degrees, or 0 when the matrix is not a pure
    /// quarter-turn rotation.
    pub fn rotation(&self) -> u16 {
        match (self.a >> 16, self.b >> 16, self.c >> 16, self.d >> 16) {
            (0, 1, -1, 0) => 90,
            (-1, 0, 0, -1) => 180,
            (0, -1, 1, 0) => 270,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackHeaderBox {
    pub track_id: u32,
    pub disabled: bool,
    /// Display width, integer part of the 16.16 value.
    pub width: u32,
    pub height: u32,
    pub matrix: Matrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub segment_duration: u64,
    pub media_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditListBox {
    pub edits: Vec<Edit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHeaderBox {
    pub timescale: u32,
    /// `None` when the header marks the duration as unknown.
    pub duration: Option<u64>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBox {
    pub handler_type: FourCC,
}

fn lang_from_u16(code: u16) -> String {
    let code = code & 0x7FFF;
    if code == 0 {
        return "und".to_string();
    }
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

pub fn read_ftyp(b: &mut BmffBox<'_>) -> Result<FileTypeBox> {
    let major_brand = b.read_fourcc()?;
    let minor_version = b.read_u32()?;
    let left = b
        .bytes_left()
        .ok_or(ParseError::InvalidData("ftyp must declare its size"))?;
    let mut compatible_brands = Vec::new();
    for _ in 0..left / 4 {
        vec_push(&mut compatible_brands, b.read_fourcc()?)?;
    }
    b.skip_remain()?;
    debug!("ftyp major={} minor={} compatible={:?}", major_brand, minor_version, compatible_brands);
    Ok(FileTypeBox { major_brand, minor_version, compatible_brands })
}

pub fn read_mvhd(b: &mut BmffBox<'_>) -> Result<MovieHeaderBox> {
    let (version, _) = b.read_fullbox_extra()?;
    match version {
        1 => b.skip(16)?, // creation + modification
        0 => b.skip(8)?,
        _ => return Err(ParseError::Unsupported("unhandled mvhd version")),
    }
    let timescale = b.read_u32()?;
    let duration = match version {
        1 => Some(b.read_u64()?).filter(|&d| d != u64::MAX),
        _ => Some(b.read_u32()?).filter(|&d| d != u32::MAX).map(u64::from),
    };
    // rate, volume, matrix, next_track_ID
    b.skip_remain()?;
    debug!("mvhd timescale={} duration={:?}", timescale, duration);
    Ok(MovieHeaderBox { timescale, duration })
}

pub fn read_tkhd(b: &mut BmffBox<'_>) -> Result<TrackHeaderBox> {
    let (version, flags) = b.read_fullbox_extra()?;
    let disabled = flags & 0x1 == 0;
    match version {
        1 => b.skip(16)?,
        0 => b.skip(8)?,
        _ => return Err(ParseError::Unsupported("unhandled tkhd version")),
    }
    let track_id = b.read_u32()?;
    // reserved, duration
    match version {
        1 => b.skip(12)?,
        _ => b.skip(8)?,
    }
    // reserved, layer, alternate_group, volume
    b.skip(16)?;
    let matrix = Matrix {
        a: b.read_i32()?,
        b: b.read_i32()?,
        u: b.read_i32()?,
        c: b.read_i32()?,
        d: b.read_i32()?,
        v: b.read_i32()?,
        x: b.read_i32()?,
        y: b.read_i32()?,
        w: b.read_i32()?,
    };
    let width = b.read_u32()? >> 16;
    let height = b.read_u32()? >> 16;
    b.skip_remain()?;
    debug!("tkhd track_id={} {}x{} disabled={}", track_id, width, height, disabled);
    Ok(TrackHeaderBox { track_id, disabled, width, height, matrix })
}

pub fn read_elst(b: &mut BmffBox<'_>) -> Result<EditListBox> {
    let (version, _) = b.read_fullbox_extra()?;
    let entry_size = match version {
        1 => 20,
        0 => 12,
        _ => return Err(ParseError::Unsupported("unhandled elst version")),
    };
    let count = b.read_table_count(entry_size)?;
    let mut edits = Vec::new();
    for _ in 0..count {
        let (segment_duration, media_time) = match version {
            1 => (b.read_u64()?, b.read_i64()?),
            _ => (u64::from(b.read_u32()?), i64::from(b.read_i32()?)),
        };
        b.skip(4)?; // media_rate_integer, media_rate_fraction
        vec_push(&mut edits, Edit { segment_duration, media_time })?;
    }
    b.skip_remain()?;
    Ok(EditListBox { edits })
}

pub fn read_mdhd(b: &mut BmffBox<'_>) -> Result<MediaHeaderBox> {
    let (version, _) = b.read_fullbox_extra()?;
    let (timescale, duration) = match version {
        1 => {
            b.skip(16)?;
            let timescale = b.read_u32()?;
            (timescale, Some(b.read_u64()?).filter(|&d| d != u64::MAX))
        }
        0 => {
            b.skip(8)?;
            let timescale = b.read_u32()?;
            let duration = Some(b.read_u32()?).filter(|&d| d != u32::MAX).map(u64::from);
            (timescale, duration)
        }
        _ => return Err(ParseError::Unsupported("unhandled mdhd version")),
    };
    if timescale == 0 {
        return Err(ParseError::InvalidData("zero timescale in mdhd"));
    }
    let language = lang_from_u16(b.read_u16()?);
    b.skip_remain()?;
    debug!("mdhd timescale={} duration={:?} language={}", timescale, duration, language);
    Ok(MediaHeaderBox { timescale, duration, language })
}

pub fn read_hdlr(b: &mut BmffBox<'_>) -> Result<HandlerBox> {
    let (_version, _flags) = b.read_fullbox_extra()?;
    b.skip(4)?; // pre_defined
    let handler_type = b.read_fourcc()?;
    b.skip(12)?; // reserved
    // name
    b.skip_remain()?;
    debug!("hdlr handler_type={}", handler_type);
    Ok(HandlerBox { handler_type })
}

/// mehd: overall duration of a fragmented movie, in movie timescale units.
pub fn read_mehd(b: &mut BmffBox<'_>) -> Result<u64> {
    let (version, _) = b.read_fullbox_extra()?;
    let fragment_duration = match version {
        1 => b.read_u64()?,
        0 => u64::from(b.read_u32()?),
        _ => return Err(ParseError::Unsupported("unhandled mehd version")),
    };
    b.skip_remain()?;
    Ok(fragment_duration)
}

/// Counts of the sample tables seen in one `stbl`.
///
/// Tables are validated entry by entry but not retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SampleTableSummary {
    pub time_to_sample: Option<u32>,
    pub sample_to_chunk: Option<u32>,
    pub chunk_offsets: Option<u32>,
    pub sample_sizes: Option<u32>,
    pub sync_samples: Option<u32>,
    pub composition_offsets: Option<u32>,
}

impl SampleTableSummary {
    /// True when the sample tables exist but describe no samples, which is
    /// how fragmented files leave their initial movie box.
    pub fn is_empty_index(&self) -> bool {
        self.time_to_sample == Some(0)
            && self.sample_to_chunk == Some(0)
            && self.chunk_offsets == Some(0)
    }
}

/// stts: per-entry sample counts are capped like the entry count.
pub fn read_stts(b: &mut BmffBox<'_>) -> Result<u32> {
    b.read_fullbox_extra()?;
    let count = b.read_table_count(8)?;
    for _ in 0..count {
        check_table_limit(b.read_u32()?)?; // sample_count
        b.skip(4)?; // sample_delta
    }
    b.skip_remain()?;
    Ok(count)
}

pub fn read_ctts(b: &mut BmffBox<'_>) -> Result<u32> {
    let (version, _) = b.read_fullbox_extra()?;
    if version > 1 {
        return Err(ParseError::Unsupported("unhandled ctts version"));
    }
    let count = b.read_table_count(8)?;
    for _ in 0..count {
        check_table_limit(b.read_u32()?)?;
        b.skip(4)?; // sample_offset
    }
    b.skip_remain()?;
    Ok(count)
}

pub fn read_stsc(b: &mut BmffBox<'_>) -> Result<u32> {
    b.read_fullbox_extra()?;
    let count = b.read_table_count(12)?;
    for _ in 0..count {
        b.skip(4)?; // first_chunk
        check_table_limit(b.read_u32()?)?; // samples_per_chunk
        b.skip(4)?; // sample_description_index
    }
    b.skip_remain()?;
    Ok(count)
}

/// stco (`entry_size` 4) and co64 (`entry_size` 8).
pub fn read_chunk_offsets(b: &mut BmffBox<'_>, entry_size: u64) -> Result<u32> {
    b.read_fullbox_extra()?;
    let count = b.read_table_count(entry_size)?;
    b.skip(u64::from(count) * entry_size)?;
    b.skip_remain()?;
    Ok(count)
}

pub fn read_stss(b: &mut BmffBox<'_>) -> Result<u32> {
    b.read_fullbox_extra()?;
    let count = b.read_table_count(4)?;
    b.skip(u64::from(count) * 4)?;
    b.skip_remain()?;
    Ok(count)
}

/// stsz: returns the sample count; the size table is present only when
/// samples differ in size.
pub fn read_stsz(b: &mut BmffBox<'_>) -> Result<u32> {
    b.read_fullbox_extra()?;
    let sample_size = b.read_u32()?;
    let entry_size = if sample_size == 0 { 4 } else { 0 };
    let count = b.read_table_count(entry_size)?;
    b.skip(u64::from(count) * entry_size)?;
    if sample_size != 0 && b.bytes_left().is_some_and(|left| left > 0) {
        warn!("stsz with a fixed sample size carries trailing data");
    }
    b.skip_remain()?;
    Ok(count)
}
