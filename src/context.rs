use crate::decode::{FileTypeBox, MovieHeaderBox, read_ftyp, read_mehd, read_mvhd};
use crate::known_boxes::KnownBox;
use crate::parser::{BmffBox, BoxIter, ParseError, Result, Stream, skip_box, vec_push};
use crate::protection::{PsshBox, read_pssh};
use crate::track::{Track, read_trak};
use log::debug;
use std::io::Read;

/// Movie fragment defaults from `mvex`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovieExtendsBox {
    /// Overall duration from `mehd`, in movie timescale units.
    pub fragment_duration: Option<u64>,
}

/// Everything one read pass learns about a file.
#[derive(Debug, Default)]
pub struct MediaContext {
    pub file_type: Option<FileTypeBox>,
    pub movie_header: Option<MovieHeaderBox>,
    pub mvex: Option<MovieExtendsBox>,
    pub tracks: Vec<Track>,
    /// `pssh` boxes directly under `moov`, in file order.
    pub psshs: Vec<PsshBox>,
}

impl MediaContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timescale(&self) -> Option<u32> {
        self.movie_header.map(|m| m.timescale)
    }
}

/// Read an ISO-BMFF stream from start to end into `context`.
///
/// Tracks are appended in the order their `trak` boxes appear, each only
/// after its box decoded completely. A stream without `moov` is an error.
pub fn read_mp4<R: Read>(src: R, context: &mut MediaContext) -> Result<()> {
    let mut stream = Stream::new(src);
    let mut iter = BoxIter::new(&mut stream, 0);
    let mut found_moov = false;
    while let Some(mut b) = iter.next_box()? {
        match b.kind() {
            KnownBox::Ftyp => context.file_type = Some(read_ftyp(&mut b)?),
            KnownBox::Moov => {
                read_moov(&mut b, context)?;
                found_moov = true;
            }
            _ => skip_box(&mut b)?,
        }
    }
    if !found_moov {
        return Err(ParseError::NoMoov);
    }
    debug!("read {} tracks", context.tracks.len());
    Ok(())
}

fn read_moov(b: &mut BmffBox<'_>, context: &mut MediaContext) -> Result<()> {
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Mvhd => context.movie_header = Some(read_mvhd(&mut child)?),
            KnownBox::Trak => {
                let track = read_trak(&mut child, context.tracks.len())?;
                vec_push(&mut context.tracks, track)?;
            }
            KnownBox::Mvex => context.mvex = Some(read_mvex(&mut child)?),
            KnownBox::Pssh => {
                let pssh = read_pssh(&mut child)?;
                vec_push(&mut context.psshs, pssh)?;
            }
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()
}

fn read_mvex(b: &mut BmffBox<'_>) -> Result<MovieExtendsBox> {
    let mut mvex = MovieExtendsBox::default();
    let mut iter = b.box_iter();
    while let Some(mut child) = iter.next_box()? {
        match child.kind() {
            KnownBox::Mehd => mvex.fragment_duration = Some(read_mehd(&mut child)?),
            _ => skip_box(&mut child)?,
        }
    }
    b.skip_remain()?;
    Ok(mvex)
}
