//! MPEG-4 elementary stream descriptors (`esds`) and the AAC
//! AudioSpecificConfig they carry.

use crate::parser::{BmffBox, ParseError, Region, Result};
use crate::track::Codec;
use bitreader::BitReader;
use byteorder::ReadBytesExt;
use log::{debug, warn};
use std::io::Cursor;

const ES_DESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_DESCRIPTOR_TAG: u8 = 0x05;

/// ES -> DecoderConfig -> DecoderSpecific is three levels; leave some slack.
const MAX_DESCRIPTOR_DEPTH: usize = 4;

const SAMPLE_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// What is kept of an `esds` box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EsDescriptor {
    pub codec: Option<Codec>,
    pub audio_object_type: Option<u16>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
    /// DecoderSpecificInfo payload, the AudioSpecificConfig for AAC.
    pub decoder_specific: Vec<u8>,
    /// The whole descriptor payload after the FullBox header.
    pub raw: Vec<u8>,
}

/// Decode an `esds` box.
///
/// A descriptor that does not decode leaves the codec classification in
/// place but drops the audio overrides, so the sample entry's own values
/// stay authoritative.
pub fn read_esds(b: &mut BmffBox<'_>) -> Result<EsDescriptor> {
    let (_version, _flags) = b.read_fullbox_extra()?;
    let left = b
        .bytes_left()
        .ok_or(ParseError::InvalidData("esds must declare its size"))?;
    let data = b.read_buf(left)?;

    let mut es = EsDescriptor::default();
    if let Err(e) = find_descriptor(&data, &mut es, 0) {
        warn!("ignoring undecodable esds descriptor: {}", e);
        es.audio_object_type = None;
        es.sample_rate = None;
        es.channel_count = None;
    }
    debug!(
        "esds codec={:?} aot={:?} rate={:?} channels={:?} config={} bytes",
        es.codec,
        es.audio_object_type,
        es.sample_rate,
        es.channel_count,
        es.decoder_specific.len()
    );
    es.raw = data;
    Ok(es)
}

fn read_descriptor_length(cur: &mut Cursor<&[u8]>) -> Result<usize> {
    let mut len = 0usize;
    for _ in 0..4 {
        let byte = cur.read_u8()?;
        len = (len << 7) | usize::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(len)
}

fn find_descriptor(data: &[u8], es: &mut EsDescriptor, depth: usize) -> Result<()> {
    if depth > MAX_DESCRIPTOR_DEPTH {
        return Err(ParseError::InvalidData("descriptors nested too deeply"));
    }
    let mut cur = Cursor::new(data);
    while (cur.position() as usize) < data.len() {
        let tag = cur.read_u8()?;
        let len = read_descriptor_length(&mut cur)?;
        let start = cur.position() as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or(ParseError::InvalidData("descriptor exceeds esds payload"))?;
        let body = &data[start..end];
        match tag {
            ES_DESCRIPTOR_TAG => read_es_descriptor(body, es, depth)?,
            DECODER_CONFIG_DESCRIPTOR_TAG => read_dc_descriptor(body, es, depth)?,
            DECODER_SPECIFIC_DESCRIPTOR_TAG => {
                es.decoder_specific = body.to_vec();
                read_ds_descriptor(body, es)?
            }
            _ => debug!("skipping descriptor tag {:#04x}", tag),
        }
        cur.set_position(end as u64);
    }
    Ok(())
}

fn read_es_descriptor(data: &[u8], es: &mut EsDescriptor, depth: usize) -> Result<()> {
    let mut cur = Cursor::new(data);
    cur.set_position(2); // ES_ID
    let flags = cur.read_u8()?;
    let mut pos = cur.position();
    if flags & 0x80 != 0 {
        pos += 2; // dependsOn_ES_ID
    }
    if flags & 0x40 != 0 {
        cur.set_position(pos);
        pos += 1 + u64::from(cur.read_u8()?); // URL
    }
    if flags & 0x20 != 0 {
        pos += 2; // OCR_ES_Id
    }
    let rest = data
        .get(pos as usize..)
        .ok_or(ParseError::InvalidData("truncated ES descriptor"))?;
    find_descriptor(rest, es, depth + 1)
}

fn read_dc_descriptor(data: &[u8], es: &mut EsDescriptor, depth: usize) -> Result<()> {
    let object_type = *data
        .first()
        .ok_or(ParseError::InvalidData("empty decoder config descriptor"))?;
    es.codec = Some(match object_type {
        0x40 | 0x41 => Codec::Aac,
        0x69 | 0x6B => Codec::Mp3,
        0x20 => Codec::Mp4v,
        _ => Codec::Unknown,
    });
    // streamType, bufferSizeDB, maxBitrate, avgBitrate
    let rest = data
        .get(13..)
        .ok_or(ParseError::InvalidData("truncated decoder config descriptor"))?;
    find_descriptor(rest, es, depth + 1)
}

fn read_audio_object_type(bits: &mut BitReader<'_>) -> Result<u16> {
    let object_type = bits.read_u16(5)?;
    if object_type == 31 {
        return Ok(32 + bits.read_u16(6)?);
    }
    Ok(object_type)
}

fn read_sample_frequency(bits: &mut BitReader<'_>) -> Result<Option<u32>> {
    let index = bits.read_u8(4)?;
    if index == 0x0F {
        return Ok(Some(bits.read_u32(24)?));
    }
    Ok(SAMPLE_FREQUENCIES.get(usize::from(index)).copied())
}

/// AudioSpecificConfig, only meaningful for AAC.
fn read_ds_descriptor(data: &[u8], es: &mut EsDescriptor) -> Result<()> {
    if es.codec != Some(Codec::Aac) {
        return Ok(());
    }
    let mut bits = BitReader::new(data);

    let mut object_type = read_audio_object_type(&mut bits)?;
    let mut sample_rate = read_sample_frequency(&mut bits)?;
    let channel_config = bits.read_u8(4)?;

    // Explicit SBR/PS signalling: the extension rate is the output rate.
    if object_type == 5 || object_type == 29 {
        if let Some(rate) = read_sample_frequency(&mut bits)? {
            sample_rate = Some(rate);
        }
        object_type = read_audio_object_type(&mut bits)?;
    }

    match object_type {
        1..=4 | 6 | 7 | 17 | 19..=23 => {}
        _ => return Err(ParseError::Unsupported("unknown aac audio object type")),
    }
    let sample_rate = sample_rate.ok_or(ParseError::Unsupported("unknown aac sample frequency"))?;

    // GASpecificConfig
    bits.skip(1)?; // frameLengthFlag
    if bits.read_bool()? {
        bits.skip(14)?; // coreCoderDelay
    }
    bits.skip(1)?; // extensionFlag

    let channel_count = match channel_config {
        0 => read_program_config_channels(&mut bits)?,
        1..=6 => u16::from(channel_config),
        7 => 8,
        11 => 7,
        12 | 14 => 8,
        _ => return Err(ParseError::Unsupported("invalid aac channel configuration")),
    };

    es.audio_object_type = Some(object_type);
    es.sample_rate = Some(sample_rate);
    es.channel_count = Some(channel_count);
    Ok(())
}

/// Channel count of an inline program_config_element.
fn read_program_config_channels(bits: &mut BitReader<'_>) -> Result<u16> {
    bits.skip(4)?; // element_instance_tag
    bits.skip(2)?; // object_type
    bits.skip(4)?; // sampling_frequency_index
    let front = bits.read_u8(4)?;
    let side = bits.read_u8(4)?;
    let back = bits.read_u8(4)?;
    let lfe = bits.read_u8(2)?;
    bits.skip(3)?; // num_assoc_data
    bits.skip(4)?; // num_valid_cc
    if bits.read_bool()? {
        bits.skip(4)?; // mono_mixdown_element_number
    }
    if bits.read_bool()? {
        bits.skip(4)?; // stereo_mixdown_element_number
    }
    if bits.read_bool()? {
        bits.skip(3)?; // matrix_mixdown_idx, pseudo_surround_enable
    }

    let mut count = 0;
    for elements in [front, side, back] {
        for _ in 0..elements {
            let is_cpe = bits.read_bool()?;
            bits.skip(4)?;
            count += if is_cpe { 2 } else { 1 };
        }
    }
    for _ in 0..lfe {
        bits.skip(4)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Result<EsDescriptor> {
        let mut es = EsDescriptor::default();
        find_descriptor(data, &mut es, 0)?;
        Ok(es)
    }

    fn aac_descriptor(asc: &[u8]) -> Vec<u8> {
        let mut dc = vec![0x40, 0x15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        dc.push(DECODER_SPECIFIC_DESCRIPTOR_TAG);
        dc.push(asc.len() as u8);
        dc.extend_from_slice(asc);

        let mut es = vec![0, 1, 0];
        es.push(DECODER_CONFIG_DESCRIPTOR_TAG);
        es.push(dc.len() as u8);
        es.extend_from_slice(&dc);

        let mut out = vec![ES_DESCRIPTOR_TAG, es.len() as u8];
        out.extend_from_slice(&es);
        out
    }

    #[test]
    fn aac_lc_mono_48k() {
        // AOT 2, frequency index 3, channel configuration 1
        let es = parse(&aac_descriptor(&[0x11, 0x88])).expect("valid esds");
        assert_eq!(es.codec, Some(Codec::Aac));
        assert_eq!(es.audio_object_type, Some(2));
        assert_eq!(es.sample_rate, Some(48000));
        assert_eq!(es.channel_count, Some(1));
        assert_eq!(es.decoder_specific, vec![0x11, 0x88]);
    }

    #[test]
    fn aac_lc_stereo_44k() {
        // AOT 2, frequency index 4, channel configuration 2
        let es = parse(&aac_descriptor(&[0x12, 0x10])).expect("valid esds");
        assert_eq!(es.sample_rate, Some(44100));
        assert_eq!(es.channel_count, Some(2));
    }

    #[test]
    fn multi_byte_lengths() {
        let mut cur = Cursor::new(&[0x80u8, 0x80, 0x80, 0x05][..]);
        assert_eq!(read_descriptor_length(&mut cur).expect("length"), 5);
    }

    #[test]
    fn mp3_object_type() {
        let mut es = vec![0, 1, 0, DECODER_CONFIG_DESCRIPTOR_TAG, 13, 0x6B];
        es.extend_from_slice(&[0; 12]);
        let mut data = vec![ES_DESCRIPTOR_TAG, es.len() as u8];
        data.extend_from_slice(&es);
        let es = parse(&data).expect("valid esds");
        assert_eq!(es.codec, Some(Codec::Mp3));
        assert_eq!(es.channel_count, None);
        assert!(es.decoder_specific.is_empty());
    }

    #[test]
    fn overlong_descriptor_is_rejected() {
        let data = [ES_DESCRIPTOR_TAG, 0x40, 0, 0];
        assert!(matches!(parse(&data), Err(ParseError::InvalidData(_))));
    }

    #[test]
    fn truncated_audio_config_is_an_error() {
        assert!(parse(&aac_descriptor(&[0x11])).is_err());
    }
}
