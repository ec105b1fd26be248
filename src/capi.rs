//! C ABI over [`Parser`].
//!
//! Handles are created by [`mp4probe_new`] and released exactly once by
//! [`mp4probe_free`]. Every getter zero-fills its output record before
//! validating arguments, so callers never observe stale data on failure.

use crate::api::{
    FragmentInfo, Parser, ParserState, Status, TrackAudioInfo, TrackCodecData, TrackInfo,
    TrackProtectionInfo, TrackVideoInfo,
};
use crate::source::ByteSource;
use log::error;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Borrowed bytes owned by the parser handle; valid until it is freed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteData {
    pub length: u32,
    pub data: *const u8,
}

impl Default for ByteData {
    fn default() -> Self {
        ByteData { length: 0, data: ptr::null() }
    }
}

impl ByteData {
    fn new(bytes: &[u8]) -> Result<Self, Status> {
        if bytes.is_empty() {
            return Ok(ByteData::default());
        }
        let length = u32::try_from(bytes.len()).map_err(|_| Status::Invalid)?;
        Ok(ByteData { length, data: bytes.as_ptr() })
    }

    /// View the bytes again.
    ///
    /// # Safety
    /// The handle the data came from must still be alive.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        if self.data.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.data, self.length as usize) }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackCodecConfig {
    pub codec_specific_config: ByteData,
    pub extra_data: ByteData,
}

impl TryFrom<TrackCodecData<'_>> for TrackCodecConfig {
    type Error = Status;

    fn try_from(data: TrackCodecData<'_>) -> Result<Self, Status> {
        Ok(TrackCodecConfig {
            codec_specific_config: ByteData::new(data.codec_specific_config)?,
            extra_data: ByteData::new(data.extra_data)?,
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PsshInfo {
    pub data: ByteData,
}

/// Opaque parser handle.
pub struct Mp4probeParser {
    parser: Parser<ByteSource>,
}

/// Create a parser reading from `source`.
///
/// Returns null when `source` is null, has no read callback, or has a null
/// `userdata`.
///
/// # Safety
/// `source` must be null or point to a valid [`ByteSource`]. Its callback
/// must honor the pull contract for as long as the handle lives.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_new(source: *const ByteSource) -> *mut Mp4probeParser {
    let Some(source) = (unsafe { source.as_ref() }) else {
        return ptr::null_mut();
    };
    if !source.is_valid() {
        return ptr::null_mut();
    }
    Box::into_raw(Box::new(Mp4probeParser { parser: Parser::new(*source) }))
}

/// Release a handle. Null is ignored.
///
/// # Safety
/// `parser` must be null or a handle from [`mp4probe_new`] not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_free(parser: *mut Mp4probeParser) {
    if parser.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(parser) });
}

/// Run the read pass; later calls return the cached outcome.
///
/// # Safety
/// `parser` must be null or a live handle from [`mp4probe_new`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_read(parser: *mut Mp4probeParser) -> Status {
    let Some(handle) = (unsafe { parser.as_mut() }) else {
        return Status::BadArg;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| handle.parser.read())) {
        Ok(status) => status,
        Err(_) => {
            error!("read pass panicked");
            handle.parser.fail(Status::Invalid);
            Status::Invalid
        }
    }
}

/// Shared getter plumbing: zero `out`, check the handle, its state and
/// `out`, then store the accessor's result.
unsafe fn fill<T, F>(parser: *const Mp4probeParser, out: *mut T, get: F) -> Status
where
    F: FnOnce(&Parser<ByteSource>) -> Result<T, Status>,
{
    if !out.is_null() {
        unsafe { ptr::write_bytes(out, 0, 1) };
    }
    let Some(handle) = (unsafe { parser.as_ref() }) else {
        return Status::BadArg;
    };
    if handle.parser.state() != ParserState::Parsed || out.is_null() {
        return Status::BadArg;
    }
    match get(&handle.parser) {
        Ok(value) => {
            unsafe { out.write(value) };
            Status::Ok
        }
        Err(status) => status,
    }
}

/// # Safety
/// `parser` must be null or a live handle; `count` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_track_count(
    parser: *const Mp4probeParser,
    count: *mut u32,
) -> Status {
    unsafe { fill(parser, count, |p| p.track_count()) }
}

/// # Safety
/// `parser` must be null or a live handle; `info` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_track_info(
    parser: *const Mp4probeParser,
    index: u32,
    info: *mut TrackInfo,
) -> Status {
    unsafe { fill(parser, info, |p| p.track_info(index)) }
}

/// # Safety
/// `parser` must be null or a live handle; `info` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_track_video_info(
    parser: *const Mp4probeParser,
    index: u32,
    info: *mut TrackVideoInfo,
) -> Status {
    unsafe { fill(parser, info, |p| p.track_video_info(index)) }
}

/// # Safety
/// `parser` must be null or a live handle; `info` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_track_audio_info(
    parser: *const Mp4probeParser,
    index: u32,
    info: *mut TrackAudioInfo,
) -> Status {
    unsafe { fill(parser, info, |p| p.track_audio_info(index)) }
}

/// # Safety
/// `parser` must be null or a live handle; `info` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_fragment_info(
    parser: *const Mp4probeParser,
    info: *mut FragmentInfo,
) -> Status {
    unsafe { fill(parser, info, |p| p.fragment_info()) }
}

/// Writes 1 to `fragmented` when the track's samples live in fragments.
///
/// # Safety
/// `parser` must be null or a live handle; `fragmented` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_is_fragmented(
    parser: *const Mp4probeParser,
    track_id: u32,
    fragmented: *mut u8,
) -> Status {
    unsafe { fill(parser, fragmented, |p| p.is_fragmented(track_id).map(u8::from)) }
}

/// Codec configuration bytes of a video or audio track.
///
/// # Safety
/// `parser` must be null or a live handle; `config` null or writable. The
/// returned pointers stay valid until the handle is freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_track_codec_config(
    parser: *const Mp4probeParser,
    index: u32,
    config: *mut TrackCodecConfig,
) -> Status {
    unsafe { fill(parser, config, |p| p.track_codec_data(index).and_then(TrackCodecConfig::try_from)) }
}

/// Default encryption parameters of a video or audio track; all zero when
/// the track is not protected.
///
/// # Safety
/// `parser` must be null or a live handle; `info` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_track_protection_info(
    parser: *const Mp4probeParser,
    index: u32,
    info: *mut TrackProtectionInfo,
) -> Status {
    unsafe { fill(parser, info, |p| p.track_protection_info(index)) }
}

/// Every `pssh` box for EME: per box, the 16-byte system id, the box
/// length as a native-endian u32, then the box with its header.
///
/// # Safety
/// `parser` must be null or a live handle; `info` null or writable. The
/// returned pointer stays valid until the handle is freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mp4probe_get_pssh_info(
    parser: *const Mp4probeParser,
    info: *mut PsshInfo,
) -> Status {
    unsafe { fill(parser, info, |p| Ok(PsshInfo { data: ByteData::new(p.pssh_data()?)? })) }
}
