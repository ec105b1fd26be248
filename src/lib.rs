pub mod api;
pub mod boxes;
pub mod capi;
pub mod codec_config;
pub mod context;
pub mod decode;
pub mod esds;
pub mod known_boxes;
pub mod parser;
pub mod protection;
pub mod sample_entry;
pub mod source;
pub mod track;

pub use api::{
    FragmentInfo, Parser, ParserState, Status, TrackAudioInfo, TrackCodecData, TrackInfo,
    TrackProtectionInfo, TrackVideoInfo,
};
pub use boxes::{BoxHeader, FourCC};
pub use context::{MediaContext, read_mp4};
pub use parser::{ParseError, read_box_header};
pub use protection::PsshBox;
pub use source::{ByteSource, PullSource};
pub use track::{Codec, Track, TrackType};
