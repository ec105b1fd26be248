//! Codec configuration boxes nested in sample entries (`avcC`, `dOps`,
//! `dfLa`, `alac`). Each decoder returns the bytes a decoder needs to be
//! initialized with.

use crate::parser::{BmffBox, ParseError, Region, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

const FLAC_STREAMINFO: u8 = 0;
const FLAC_STREAMINFO_SIZE: usize = 34;

/// Whole payload of an opaque configuration record such as `avcC`.
pub fn read_config_payload(b: &mut BmffBox<'_>) -> Result<Vec<u8>> {
    let left = b
        .bytes_left()
        .ok_or(ParseError::InvalidData("codec configuration must declare its size"))?;
    let data = b.read_buf(left)?;
    debug!("{} configuration, {} bytes", b.head.typ, data.len());
    Ok(data)
}

/// `dOps`, re-serialized as the little-endian `OpusHead` packet that Ogg
/// and WebM carry.
pub fn read_dops(b: &mut BmffBox<'_>) -> Result<Vec<u8>> {
    let version = b.read_u8()?;
    if version != 0 {
        return Err(ParseError::Unsupported("unknown dOps version"));
    }
    let output_channel_count = b.read_u8()?;
    let pre_skip = b.read_u16()?;
    let input_sample_rate = b.read_u32()?;
    let output_gain = b.read_i16()?;
    let channel_mapping_family = b.read_u8()?;

    let mut head = Vec::new();
    head.extend_from_slice(b"OpusHead");
    // OpusHead is version 1 even though dOps says 0.
    head.write_u8(1)?;
    head.write_u8(output_channel_count)?;
    head.write_u16::<LittleEndian>(pre_skip)?;
    head.write_u32::<LittleEndian>(input_sample_rate)?;
    head.write_i16::<LittleEndian>(output_gain)?;
    head.write_u8(channel_mapping_family)?;
    if channel_mapping_family != 0 {
        head.write_u8(b.read_u8()?)?; // stream count
        head.write_u8(b.read_u8()?)?; // coupled count
        let mapping = b.read_buf(u64::from(output_channel_count))?;
        head.extend_from_slice(&mapping);
    }
    b.skip_remain()?;
    debug!("dOps channels={} rate={} family={}", output_channel_count, input_sample_rate, channel_mapping_family);
    Ok(head)
}

/// `dfLa`: the STREAMINFO metadata block, which must come first.
pub fn read_dfla(b: &mut BmffBox<'_>) -> Result<Vec<u8>> {
    let (version, flags) = b.read_fullbox_extra()?;
    if version != 0 {
        return Err(ParseError::Unsupported("unknown dfLa version"));
    }
    if flags != 0 {
        return Err(ParseError::InvalidData("non-zero dfLa flags"));
    }

    let mut streaminfo = None;
    while b.bytes_left().is_some_and(|left| left > 0) {
        let block_type = b.read_u8()? & 0x7F;
        let length = (u64::from(b.read_u8()?) << 16) | u64::from(b.read_u16()?);
        if b.bytes_left().is_some_and(|left| length > left) {
            return Err(ParseError::InvalidData("FLAC metadata block larger than dfLa"));
        }
        if streaminfo.is_some() {
            b.skip(length)?;
            continue;
        }
        if block_type != FLAC_STREAMINFO {
            return Err(ParseError::InvalidData("dfLa must start with STREAMINFO"));
        }
        let data = b.read_buf(length)?;
        if data.len() != FLAC_STREAMINFO_SIZE {
            return Err(ParseError::InvalidData("FLAC STREAMINFO is the wrong size"));
        }
        streaminfo = Some(data);
    }
    b.skip_remain()?;
    streaminfo.ok_or(ParseError::InvalidData("dfLa carries no metadata"))
}

/// `alac` configuration inside an `alac` sample entry: the 24 or 48 byte
/// magic cookie.
pub fn read_alac(b: &mut BmffBox<'_>) -> Result<Vec<u8>> {
    let (version, flags) = b.read_fullbox_extra()?;
    if version != 0 {
        return Err(ParseError::Unsupported("unknown alac version"));
    }
    if flags != 0 {
        return Err(ParseError::InvalidData("non-zero alac flags"));
    }
    match b.bytes_left() {
        Some(len @ (24 | 48)) => b.read_buf(len),
        _ => Err(ParseError::InvalidData("alac magic cookie is the wrong size")),
    }
}
