use crate::context::{MediaContext, read_mp4};
use crate::parser::ParseError;
use crate::protection::{PsshBox, serialize_pssh};
use crate::track::{Codec, Track, TrackDetail, TrackType, rational_scale};
use log::{debug, warn};
use serde::Serialize;
use std::io::Read;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Outcome of every public operation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    /// Success.
    Ok = 0,
    /// Absent handle or output, out-of-range index, wrong track type, or
    /// a parser that has not completed a successful read.
    BadArg = 1,
    /// Structurally malformed input, or required metadata missing.
    Invalid = 2,
    /// Recognized structure with an unsupported version or feature.
    Unsupported = 3,
    /// The stream ended before a box could be fully read.
    Eof = 4,
    /// The byte source reported a failure.
    Io = 5,
    /// An allocation failed.
    Oom = 6,
    /// A sample table or edit list declared more entries than allowed.
    TableTooLarge = 7,
}

impl From<&ParseError> for Status {
    fn from(err: &ParseError) -> Self {
        match err {
            ParseError::InvalidData(_) | ParseError::NoMoov => Status::Invalid,
            ParseError::Unsupported(_) => Status::Unsupported,
            ParseError::UnexpectedEof => Status::Eof,
            ParseError::Io(_) => Status::Io,
            ParseError::OutOfMemory => Status::Oom,
            ParseError::TableTooLarge(_) => Status::TableTooLarge,
        }
    }
}

/// Basic track information. Times are in microseconds.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub track_type: TrackType,
    pub codec: Codec,
    pub track_id: u32,
    pub duration: i64,
    /// Presentation start; negative when the track begins with an empty edit.
    pub media_time: i64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackVideoInfo {
    pub display_width: u32,
    pub display_height: u32,
    pub image_width: u32,
    pub image_height: u32,
    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    pub rotation: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackAudioInfo {
    pub channels: u32,
    pub bit_depth: u16,
    pub sample_rate: u32,
    /// AAC audio object type, 0 when not applicable.
    pub profile: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FragmentInfo {
    /// Overall duration of a fragmented movie in microseconds.
    pub fragment_duration: u64,
}

/// Decoder configuration of a track's first sample description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackCodecData<'a> {
    /// AudioSpecificConfig, OpusHead, FLAC STREAMINFO or ALAC magic cookie.
    pub codec_specific_config: &'a [u8],
    /// Raw esds payload, or the avcC/hvcC record of a video track.
    pub extra_data: &'a [u8],
}

/// Default encryption parameters from `sinf/schi/tenc`; all zero for
/// clear tracks.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackProtectionInfo {
    pub is_encrypted: u32,
    pub iv_size: u8,
    pub kid: [u8; 16],
}

/// Lifecycle of a [`Parser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Created,
    Reading,
    Parsed,
    /// The read pass stopped with this status.
    Failed(Status),
}

/// Streaming MP4 metadata parser over any [`Read`] source.
///
/// One call to [`Parser::read`] consumes the stream; afterwards the
/// accessors answer from what was collected.
///
/// # Example
/// ```no_run
/// use mp4probe::{Parser, Status};
/// use std::fs::File;
///
/// let file = File::open("video.mp4")?;
/// let mut parser = Parser::new(file);
/// if parser.read() == Status::Ok {
///     for index in 0..parser.track_count().unwrap_or(0) {
///         println!("{:?}", parser.track_info(index));
///     }
/// }
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Parser<R> {
    source: R,
    context: MediaContext,
    state: ParserState,
    /// Every `pssh`, serialized once the pass succeeds.
    pssh_data: Vec<u8>,
}

impl<R: Read> Parser<R> {
    pub fn new(source: R) -> Self {
        Parser {
            source,
            context: MediaContext::new(),
            state: ParserState::Created,
            pssh_data: Vec::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Run the read pass. Calling it again returns the first outcome
    /// without touching the source.
    pub fn read(&mut self) -> Status {
        match self.state {
            ParserState::Parsed => return Status::Ok,
            ParserState::Failed(status) => return status,
            ParserState::Created | ParserState::Reading => {}
        }
        self.state = ParserState::Reading;
        let result = read_mp4(&mut self.source, &mut self.context)
            .and_then(|()| serialize_pssh(&self.context.psshs));
        let status = match result {
            Ok(pssh_data) => {
                self.pssh_data = pssh_data;
                self.state = ParserState::Parsed;
                Status::Ok
            }
            Err(e) => {
                let status = Status::from(&e);
                warn!("read failed: {} ({:?})", e, status);
                self.state = ParserState::Failed(status);
                status
            }
        };
        debug!("read pass finished with {:?}", status);
        status
    }

    /// Record a failure that happened outside the read pass itself.
    pub(crate) fn fail(&mut self, status: Status) {
        self.state = ParserState::Failed(status);
    }

    fn parsed(&self) -> Result<&MediaContext, Status> {
        match self.state {
            ParserState::Parsed => Ok(&self.context),
            _ => Err(Status::BadArg),
        }
    }

    fn track(&self, index: u32) -> Result<&Track, Status> {
        let context = self.parsed()?;
        usize::try_from(index)
            .ok()
            .and_then(|i| context.tracks.get(i))
            .ok_or(Status::BadArg)
    }

    /// Tracks of a successful pass, in file order.
    pub fn tracks(&self) -> Result<&[Track], Status> {
        Ok(&self.parsed()?.tracks)
    }

    pub fn context(&self) -> Result<&MediaContext, Status> {
        self.parsed()
    }

    pub fn track_count(&self) -> Result<u32, Status> {
        u32::try_from(self.parsed()?.tracks.len()).map_err(|_| Status::Invalid)
    }

    pub fn track_info(&self, index: u32) -> Result<TrackInfo, Status> {
        let track = self.track(index)?;
        let movie_timescale = self.parsed()?.timescale().ok_or(Status::Invalid)?;
        let timescale = track.timescale.ok_or(Status::Invalid)?;
        let track_id = track.track_id.ok_or(Status::Invalid)?;

        let duration = match track.duration {
            Some(d) => rational_scale(d, u64::from(timescale), MICROS_PER_SECOND)
                .and_then(|t| i64::try_from(t).ok())
                .ok_or(Status::Invalid)?,
            None => 0,
        };
        let media_time = rational_scale(track.media_time, u64::from(timescale), MICROS_PER_SECOND)
            .and_then(|t| i64::try_from(t).ok())
            .ok_or(Status::Invalid)?;
        let empty_duration =
            rational_scale(track.empty_duration, u64::from(movie_timescale), MICROS_PER_SECOND)
                .and_then(|t| i64::try_from(t).ok())
                .ok_or(Status::Invalid)?;

        Ok(TrackInfo {
            track_type: track.track_type,
            codec: track.codec,
            track_id,
            duration,
            media_time: media_time - empty_duration,
        })
    }

    pub fn track_video_info(&self, index: u32) -> Result<TrackVideoInfo, Status> {
        let track = self.track(index)?;
        if track.track_type != TrackType::Video {
            return Err(Status::BadArg);
        }
        match track.detail {
            Some(TrackDetail::Video(v)) => Ok(TrackVideoInfo {
                display_width: v.display_width,
                display_height: v.display_height,
                image_width: v.image_width,
                image_height: v.image_height,
                rotation: v.rotation,
            }),
            _ => Err(Status::Invalid),
        }
    }

    pub fn track_audio_info(&self, index: u32) -> Result<TrackAudioInfo, Status> {
        let track = self.track(index)?;
        if track.track_type != TrackType::Audio {
            return Err(Status::BadArg);
        }
        match track.detail {
            Some(TrackDetail::Audio(a)) => Ok(TrackAudioInfo {
                channels: a.channels,
                bit_depth: a.bit_depth,
                sample_rate: a.sample_rate,
                profile: a.profile.unwrap_or(0),
            }),
            _ => Err(Status::Invalid),
        }
    }

    /// Codec configuration bytes of a video or audio track. Either slice is
    /// empty when the sample description carried no such record.
    pub fn track_codec_data(&self, index: u32) -> Result<TrackCodecData<'_>, Status> {
        let track = self.track(index)?;
        if track.track_type == TrackType::Unknown {
            return Err(Status::BadArg);
        }
        Ok(TrackCodecData {
            codec_specific_config: &track.codec_specific,
            extra_data: &track.extra_data,
        })
    }

    pub fn track_protection_info(&self, index: u32) -> Result<TrackProtectionInfo, Status> {
        let track = self.track(index)?;
        if track.track_type == TrackType::Unknown {
            return Err(Status::BadArg);
        }
        Ok(match track.encryption {
            Some(tenc) => TrackProtectionInfo {
                is_encrypted: u32::from(tenc.is_encrypted),
                iv_size: tenc.iv_size,
                kid: tenc.kid,
            },
            None => TrackProtectionInfo::default(),
        })
    }

    /// `pssh` boxes of the movie, in file order.
    pub fn psshs(&self) -> Result<&[PsshBox], Status> {
        Ok(&self.parsed()?.psshs)
    }

    /// All `pssh` boxes as one buffer: for each, the 16-byte system id, the
    /// box length as a native-endian u32 and the box itself. Empty when the
    /// movie has none.
    pub fn pssh_data(&self) -> Result<&[u8], Status> {
        self.parsed()?;
        Ok(&self.pssh_data)
    }

    /// Fragment information; `Invalid` for files without `mvex`.
    pub fn fragment_info(&self) -> Result<FragmentInfo, Status> {
        let context = self.parsed()?;
        let mvex = context.mvex.ok_or(Status::Invalid)?;
        let fragment_duration = match mvex.fragment_duration {
            Some(d) => {
                let timescale = context.timescale().ok_or(Status::Invalid)?;
                rational_scale(d, u64::from(timescale), MICROS_PER_SECOND).ok_or(Status::Invalid)?
            }
            None => 0,
        };
        Ok(FragmentInfo { fragment_duration })
    }

    /// Whether the track with `track_id` keeps its samples in movie
    /// fragments: the file has `mvex` and the track's own sample tables
    /// are present but empty.
    pub fn is_fragmented(&self, track_id: u32) -> Result<bool, Status> {
        let context = self.parsed()?;
        let track = context
            .tracks
            .iter()
            .find(|t| t.track_id == Some(track_id))
            .ok_or(Status::BadArg)?;
        Ok(context.mvex.is_some() && track.sample_table.is_empty_index())
    }
}
