//! Per-track accumulation: everything found under one `trak` box is
//! collected by a [`TrackBuilder`] and turned into a [`Track`] once the box
//! has been read to its end.

use crate::decode::{
    EditListBox, MediaHeaderBox, SampleTableSummary, TrackHeaderBox, read_chunk_offsets,
    read_ctts, read_elst, read_hdlr, read_mdhd, read_stsc, read_stss, read_stsz, read_stts,
    read_tkhd,
};
use crate::known_boxes::KnownBox;
use crate::parser::{BmffBox, Result, skip_box};
use crate::protection::TrackEncryptionBox;
use crate::sample_entry::{SampleEntry, read_stsd};
use log::{debug, warn};
use serde::Serialize;

/// Media type of a track, from its handler reference.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackType {
    Video = 0,
    Audio = 1,
    Unknown = 2,
}

/// Codec classification from the sample entry and its configuration boxes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Codec {
    #[default]
    Unknown = 0,
    Aac,
    Flac,
    Opus,
    Avc,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    Mp3,
    Mp4v,
    Alac,
    Ac3,
    Ec3,
    Lpcm,
}

impl From<KnownBox> for Codec {
    fn from(kind: KnownBox) -> Self {
        match kind {
            KnownBox::Avc1 | KnownBox::Avc3 => Codec::Avc,
            KnownBox::Hev1 | KnownBox::Hvc1 => Codec::Hevc,
            KnownBox::Vp08 => Codec::Vp8,
            KnownBox::Vp09 => Codec::Vp9,
            KnownBox::Av01 => Codec::Av1,
            KnownBox::Mp4v => Codec::Mp4v,
            KnownBox::Opus => Codec::Opus,
            KnownBox::Flac => Codec::Flac,
            KnownBox::Alac => Codec::Alac,
            KnownBox::Mp3 => Codec::Mp3,
            KnownBox::Ac3 => Codec::Ac3,
            KnownBox::Ec3 => Codec::Ec3,
            KnownBox::Lpcm | KnownBox::Sowt | KnownBox::Twos => Codec::Lpcm,
            _ => Codec::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoDetail {
    pub display_width: u32,
    pub display_height: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub rotation: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioDetail {
    pub channels: u32,
    pub bit_depth: u16,
    pub sample_rate: u32,
    pub profile: Option<u16>,
}

/// Type-specific detail; always matches the track's media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackDetail {
    Video(VideoDetail),
    Audio(AudioDetail),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    /// Position in the track list (first-encountered order).
    pub index: usize,
    pub track_type: TrackType,
    pub codec: Codec,
    pub track_id: Option<u32>,
    pub disabled: bool,
    /// Media timescale from mdhd.
    pub timescale: Option<u32>,
    /// Media duration in timescale units, `None` when absent or unknown.
    pub duration: Option<u64>,
    /// Start of presentation in media timescale units, from the edit list.
    pub media_time: u64,
    /// Leading empty edit in movie timescale units.
    pub empty_duration: u64,
    pub language: Option<String>,
    pub detail: Option<TrackDetail>,
    /// Decoder initialization data of the first sample description.
    pub codec_specific: Vec<u8>,
    /// Raw configuration record (esds or avcC) of the first description.
    pub extra_data: Vec<u8>,
    /// Default encryption parameters when the description is protected.
    pub encryption: Option<TrackEncryptionBox>,
    pub sample_table: SampleTableSummary,
}

#[derive(Debug, Default)]
pub struct TrackBuilder {
    index: usize,
    tkhd: Option<TrackHeaderBox>,
    mdhd: Option<MediaHeaderBox>,
    track_type: Option<TrackType>,
    edits: Option<EditListBox>,
    descriptions: Vec<SampleEntry>,
    sample_table: SampleTableSummary,
}

impl TrackBuilder {
    pub fn new(index: usize) -> Self {
        TrackBuilder { index, ..Default::default() }
    }

    fn track_type(&self) -> TrackType {
        self.track_type.unwrap_or(TrackType::Unknown)
    }

    /// Media start from the edit list: an optional leading empty edit
    /// followed by the edit that starts presentation.
    fn edit_timing(&self) -> (u64, u64) {
        let Some(list) = &self.edits else {
            return (0, 0);
        };
        let mut empty_duration = 0;
        let mut idx = 0;
        if list.edits.len() > 1 && list.edits[0].media_time == -1 {
            empty_duration = list.edits[0].segment_duration;
            idx = 1;
        }
        match list.edits.get(idx) {
            Some(edit) if edit.media_time >= -1 => {
                if list.edits.len() > idx + 1 {
                    warn!("ignoring {} trailing edits", list.edits.len() - idx - 1);
                }
                (empty_duration, edit.media_time.max(0) as u64)
            }
            _ => {
                warn!("ignoring unusable edit list");
                (0, 0)
            }
        }
    }

    fn detail(&self) -> Option<TrackDetail> {
        match (self.track_type(), self.descriptions.first()) {
            (TrackType::Video, Some(SampleEntry::Video(v))) => {
                let (display_width, display_height, rotation) = match &self.tkhd {
                    Some(tkhd) => (tkhd.width, tkhd.height, tkhd.matrix.rotation()),
                    None => (0, 0, 0),
                };
                Some(TrackDetail::Video(VideoDetail {
                    display_width,
                    display_height,
                    image_width: u32::from(v.width),
                    image_height: u32::from(v.height),
                    rotation,
                }))
            }
            (TrackType::Audio, Some(SampleEntry::Audio(a))) => Some(TrackDetail::Audio(AudioDetail {
                channels: a.channel_count,
                bit_depth: a.sample_size,
                sample_rate: a.sample_rate,
                profile: a.profile,
            })),
            _ => None,
        }
    }

    fn codec(&self) -> Codec {
        match self.descriptions.first() {
            Some(SampleEntry::Video(v)) => v.codec,
            Some(SampleEntry::Audio(a)) => a.codec,
            _ => Codec::Unknown,
        }
    }

    /// Codec-specific data, extra data and encryption defaults of the
    /// first description.
    fn take_config(&mut self) -> (Vec<u8>, Vec<u8>, Option<TrackEncryptionBox>) {
        match self.descriptions.first_mut() {
            Some(SampleEntry::Video(v)) => (
                Vec::new(),
                std::mem::take(&mut v.extra_data),
                v.protection.as_ref().and_then(|p| p.tenc),
            ),
            Some(SampleEntry::Audio(a)) => (
                std::mem::take(&mut a.codec_specific),
                std::mem::take(&mut a.extra_data),
                a.protection.as_ref().and_then(|p| p.tenc),
            ),
            _ => (Vec::new(), Vec::new(), None),
        }
    }

    pub fn build(mut self) -> Track {
        let (empty_duration, media_time) = self.edit_timing();
        let detail = self.detail();
        let codec = self.codec();
        let (codec_specific, extra_data, encryption) = self.take_config();
        Track {
            index: self.index,
            track_type: self.track_type(),
            codec,
            track_id: self.tkhd.map(|t| t.track_id),
            disabled: self.tkhd.is_some_and(|t| t.disabled),
            timescale: self.mdhd.as_ref().map(|m| m.timescale),
            duration: self.mdhd.as_ref().and_then(|m| m.duration),
            media_time,
            empty_duration,
            language: self.mdhd.map(|m| m.language),
            detail,
            codec_specific,
            extra_data,
            encryption,
            sample_table: self.sample_table,
        }
    }
}

/// Read one `trak` box. The track exists only if the whole box decodes.
pub fn read_trak(b: &mut BmffBox<'_>, index: usize) -> Result<Track> {
    let mut builder = TrackBuilder::new(index);
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Tkhd => builder.tkhd = Some(read_tkhd(&mut child)?),
            KnownBox::Edts => read_edts(&mut child, &mut builder)?,
            KnownBox::Mdia => read_mdia(&mut child, &mut builder)?,
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()?;
    let track = builder.build();
    debug!("track {} {:?} {:?} id={:?}", track.index, track.track_type, track.codec, track.track_id);
    Ok(track)
}

fn read_edts(b: &mut BmffBox<'_>, builder: &mut TrackBuilder) -> Result<()> {
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Elst => builder.edits = Some(read_elst(&mut child)?),
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()
}

fn read_mdia(b: &mut BmffBox<'_>, builder: &mut TrackBuilder) -> Result<()> {
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Mdhd => builder.mdhd = Some(read_mdhd(&mut child)?),
            KnownBox::Hdlr => {
                let hdlr = read_hdlr(&mut child)?;
                builder.track_type = Some(match &hdlr.handler_type.0 {
                    b"vide" => TrackType::Video,
                    b"soun" => TrackType::Audio,
                    _ => TrackType::Unknown,
                });
            }
            KnownBox::Minf => read_minf(&mut child, builder)?,
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()
}

fn read_minf(b: &mut BmffBox<'_>, builder: &mut TrackBuilder) -> Result<()> {
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Stbl => read_stbl(&mut child, builder)?,
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()
}

fn read_stbl(b: &mut BmffBox<'_>, builder: &mut TrackBuilder) -> Result<()> {
    // None while hdlr is still ahead of us in mdia.
    let track_type = builder.track_type;
    let table = &mut builder.sample_table;
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Stsd => {
                let descriptions = read_stsd(&mut child, track_type)?;
                if builder.descriptions.is_empty() {
                    builder.descriptions = descriptions;
                }
            }
            KnownBox::Stts => table.time_to_sample = Some(read_stts(&mut child)?),
            KnownBox::Ctts => table.composition_offsets = Some(read_ctts(&mut child)?),
            KnownBox::Stsc => table.sample_to_chunk = Some(read_stsc(&mut child)?),
            KnownBox::Stsz => table.sample_sizes = Some(read_stsz(&mut child)?),
            KnownBox::Stco => table.chunk_offsets = Some(read_chunk_offsets(&mut child, 4)?),
            KnownBox::Co64 => table.chunk_offsets = Some(read_chunk_offsets(&mut child, 8)?),
            KnownBox::Stss => table.sync_samples = Some(read_stss(&mut child)?),
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()
}

/// Convert `numerator` from units of `1/denominator` to units of
/// `1/scale`, without intermediate overflow where possible.
///
/// `None` when `denominator` is zero or the result does not fit.
pub fn rational_scale(numerator: u64, denominator: u64, scale: u64) -> Option<u64> {
    if denominator == 0 {
        return None;
    }
    let integer = (numerator / denominator).checked_mul(scale)?;
    let remainder = (numerator % denominator).checked_mul(scale)?;
    integer.checked_add(remainder / denominator)
}
