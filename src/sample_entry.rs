//! Sample descriptions (`stsd`) and the visual/audio sample entries inside.

use crate::boxes::FourCC;
use crate::codec_config::{read_alac, read_config_payload, read_dfla, read_dops};
use crate::esds::{EsDescriptor, read_esds};
use crate::known_boxes::KnownBox;
use crate::parser::{BmffBox, ParseError, Result, skip_box, vec_push};
use crate::protection::{ProtectionSchemeInfo, read_sinf};
use crate::track::{Codec, TrackType};
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSampleEntry {
    pub codec: Codec,
    pub width: u16,
    pub height: u16,
    /// avcC or hvcC payload, or the raw esds of mp4v.
    pub extra_data: Vec<u8>,
    pub protection: Option<ProtectionSchemeInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSampleEntry {
    pub codec: Codec,
    pub channel_count: u32,
    pub sample_size: u16,
    pub sample_rate: u32,
    /// AAC audio object type, when an AudioSpecificConfig was decoded.
    pub profile: Option<u16>,
    /// Decoder initialization data: AudioSpecificConfig, OpusHead, FLAC
    /// STREAMINFO or the ALAC magic cookie.
    pub codec_specific: Vec<u8>,
    /// The raw esds payload, when there was one.
    pub extra_data: Vec<u8>,
    pub protection: Option<ProtectionSchemeInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleEntry {
    Video(VideoSampleEntry),
    Audio(AudioSampleEntry),
    Unknown(FourCC),
}

/// Read every entry of an `stsd` box, interpreting them per `track_type`.
///
/// `None` means the handler has not been seen yet; each entry is then
/// classified by its own type. Entries of tracks with an unknown media type
/// are skipped unread.
pub fn read_stsd(b: &mut BmffBox<'_>, track_type: Option<TrackType>) -> Result<Vec<SampleEntry>> {
    let (_version, _flags) = b.read_fullbox_extra()?;
    let entry_count = b.read_u32()?;
    debug!("stsd entry_count={} for {:?} track", entry_count, track_type);

    let mut descriptions = Vec::new();
    let mut iter = b.box_iter();
    while let Some(mut entry) = iter.next_box()? {
        let entry_type = track_type.unwrap_or_else(|| match entry.kind() {
            kind if kind.is_video_entry() => TrackType::Video,
            kind if kind.is_audio_entry() => TrackType::Audio,
            _ => TrackType::Unknown,
        });
        let description = match entry_type {
            TrackType::Video => read_video_sample_entry(&mut entry)?,
            TrackType::Audio => read_audio_sample_entry(&mut entry)?,
            TrackType::Unknown => {
                let name = entry.head.typ;
                skip_box(&mut entry)?;
                SampleEntry::Unknown(name)
            }
        };
        vec_push(&mut descriptions, description)?;
    }
    b.skip_remain()?;
    Ok(descriptions)
}

/// Encrypted entries name their real format in `sinf/frma`.
fn unwrap_format(format: KnownBox, sinf: &ProtectionSchemeInfo) -> KnownBox {
    match sinf.original_format {
        Some(original) => KnownBox::from(original),
        None => format,
    }
}

fn read_video_sample_entry(b: &mut BmffBox<'_>) -> Result<SampleEntry> {
    let mut format = b.kind();
    if !format.is_video_entry() {
        warn!("unrecognized video sample entry {}", b.head.typ);
    }

    b.skip(8)?; // reserved, data_reference_index
    b.skip(16)?; // pre_defined, reserved
    let width = b.read_u16()?;
    let height = b.read_u16()?;
    // resolutions, data size, frame count, compressor name, depth
    b.skip(50)?;

    let mut es = EsDescriptor::default();
    let mut extra_data = Vec::new();
    let mut protection = None;
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Sinf => {
                let sinf = read_sinf(&mut child)?;
                format = unwrap_format(format, &sinf);
                protection = Some(sinf);
            }
            KnownBox::Esds => {
                es = read_esds(&mut child)?;
                extra_data = std::mem::take(&mut es.raw);
            }
            KnownBox::Avcc | KnownBox::Hvcc => extra_data = read_config_payload(&mut child)?,
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()?;

    let codec = match format {
        KnownBox::Mp4v => es.codec.unwrap_or(Codec::Mp4v),
        other => Codec::from(other),
    };
    debug!("video sample entry {:?} {}x{} config={} bytes", codec, width, height, extra_data.len());
    Ok(SampleEntry::Video(VideoSampleEntry { codec, width, height, extra_data, protection }))
}

/// QuickTime `wave` wraps the esds of older sound descriptions.
fn read_qt_wave(b: &mut BmffBox<'_>) -> Result<Option<EsDescriptor>> {
    let mut es = None;
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Esds => es = Some(read_esds(&mut child)?),
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()?;
    Ok(es)
}

fn read_audio_sample_entry(b: &mut BmffBox<'_>) -> Result<SampleEntry> {
    let mut format = b.kind();
    if !format.is_audio_entry() {
        warn!("unrecognized audio sample entry {}", b.head.typ);
    }

    b.skip(8)?; // reserved, data_reference_index
    // QuickTime sound sample description version; zero for plain ISO entries.
    let version = b.read_u16()?;
    b.skip(6)?; // revision, vendor
    let mut channel_count = u32::from(b.read_u16()?);
    let sample_size = b.read_u16()?;
    b.skip(4)?; // compression id, packet size
    let mut sample_rate = b.read_u32()? >> 16;

    match version {
        0 => {}
        1 => b.skip(16)?, // samples per packet, bytes per packet/frame/sample
        2 => {
            b.skip(4)?; // sizeOfStructOnly
            sample_rate = f64::from_bits(b.read_u64()?) as u32;
            channel_count = b.read_u32()?;
            b.skip(20)?; // always 0x7F000000, bits per channel, flags, bytes/frames per packet
        }
        _ => return Err(ParseError::Unsupported("unsupported audio sample entry version")),
    }

    let mut es = None;
    let mut codec_specific = Vec::new();
    let mut protection = None;
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Esds => es = Some(read_esds(&mut child)?),
            KnownBox::Wave => {
                if let Some(wrapped) = read_qt_wave(&mut child)? {
                    es = Some(wrapped);
                }
            }
            KnownBox::Sinf => {
                let sinf = read_sinf(&mut child)?;
                format = unwrap_format(format, &sinf);
                protection = Some(sinf);
            }
            KnownBox::Dops => codec_specific = read_dops(&mut child)?,
            KnownBox::Dfla => codec_specific = read_dfla(&mut child)?,
            KnownBox::Alac => codec_specific = read_alac(&mut child)?,
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()?;

    let mut profile = None;
    let mut extra_data = Vec::new();
    if let Some(es) = &mut es {
        if let Some(channels) = es.channel_count
            && channels > 0
        {
            channel_count = u32::from(channels);
        }
        if let Some(rate) = es.sample_rate {
            sample_rate = rate;
        }
        profile = es.audio_object_type;
        codec_specific = std::mem::take(&mut es.decoder_specific);
        extra_data = std::mem::take(&mut es.raw);
    }

    let codec = match format {
        KnownBox::Mp4a => es.and_then(|es| es.codec).unwrap_or(Codec::Unknown),
        other => Codec::from(other),
    };
    debug!(
        "audio sample entry {:?} channels={} bits={} rate={} config={} bytes",
        codec,
        channel_count,
        sample_size,
        sample_rate,
        codec_specific.len()
    );
    Ok(SampleEntry::Audio(AudioSampleEntry {
        codec,
        channel_count,
        sample_size,
        sample_rate,
        profile,
        codec_specific,
        extra_data,
        protection,
    }))
}
