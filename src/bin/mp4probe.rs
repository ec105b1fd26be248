use anyhow::Context;
use clap::Parser as ClapParser;
use log::LevelFilter;
use mp4probe::{Parser, Status, Track, TrackAudioInfo, TrackInfo, TrackProtectionInfo, TrackVideoInfo};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

#[derive(ClapParser, Debug)]
#[command(version, about = "Print track metadata of MP4/ISOBMFF files")]
struct Args {
    /// MP4/ISOBMFF file paths
    #[arg(required = true)]
    paths: Vec<String>,

    /// Output as JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Log every box as it is read
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct TrackReport {
    index: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<TrackInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<TrackVideoInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<TrackAudioInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,

    /// Sizes of the codec-specific config and extra data records.
    #[serde(skip_serializing_if = "Option::is_none")]
    codec_config_bytes: Option<(usize, usize)>,

    #[serde(skip_serializing_if = "Option::is_none")]
    protection: Option<TrackProtectionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Status>,
}

#[derive(Debug, Serialize)]
struct MediaInfo {
    file: String,
    status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    major_brand: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    fragment_duration: Option<u64>,

    /// Hex system ids of the movie's pssh boxes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pssh_systems: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    tracks: Vec<TrackReport>,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default());
    if args.verbose {
        logger.filter(None, LevelFilter::Debug);
    }
    logger.init();

    let mut all_ok = true;
    for path in &args.paths {
        let info = probe(path)?;
        all_ok &= info.status == Status::Ok;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print_human(&info);
        }
    }

    Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn probe(path: &str) -> anyhow::Result<MediaInfo> {
    let file = File::open(path).with_context(|| format!("opening {}", path))?;
    let mut parser = Parser::new(BufReader::new(file));
    let status = parser.read();

    let mut info = MediaInfo {
        file: path.to_string(),
        status,
        major_brand: None,
        fragment_duration: None,
        pssh_systems: Vec::new(),
        tracks: Vec::new(),
    };
    if status != Status::Ok {
        return Ok(info);
    }

    if let Ok(context) = parser.context()
        && let Some(ftyp) = &context.file_type
    {
        info.major_brand = Some(ftyp.major_brand.to_string());
    }
    info.fragment_duration = parser.fragment_info().ok().map(|f| f.fragment_duration);
    info.pssh_systems = parser
        .psshs()
        .unwrap_or_default()
        .iter()
        .map(|p| p.system_id.iter().map(|b| format!("{:02x}", b)).collect())
        .collect();

    let tracks = parser.tracks().unwrap_or_default();
    for index in 0..parser.track_count().unwrap_or(0) {
        info.tracks.push(report_track(&parser, index, tracks.get(index as usize)));
    }
    Ok(info)
}

fn report_track<R: std::io::Read>(parser: &Parser<R>, index: u32, track: Option<&Track>) -> TrackReport {
    let (info, error) = match parser.track_info(index) {
        Ok(info) => (Some(info), None),
        Err(status) => (None, Some(status)),
    };
    TrackReport {
        index,
        info,
        video: parser.track_video_info(index).ok(),
        audio: parser.track_audio_info(index).ok(),
        language: track.and_then(|t| t.language.clone()),
        codec_config_bytes: parser
            .track_codec_data(index)
            .ok()
            .map(|d| (d.codec_specific_config.len(), d.extra_data.len())),
        protection: parser.track_protection_info(index).ok().filter(|p| p.is_encrypted != 0),
        error,
    }
}

fn format_micros(us: i64) -> String {
    let sign = if us < 0 { "-" } else { "" };
    let us = us.unsigned_abs();
    format!("{}{}.{:06} s", sign, us / 1_000_000, us % 1_000_000)
}

fn print_human(info: &MediaInfo) {
    println!("File: {}", info.file);
    if info.status != Status::Ok {
        println!("  error: {:?}", info.status);
        return;
    }
    if let Some(brand) = &info.major_brand {
        println!("  major brand: {}", brand);
    }
    if let Some(d) = info.fragment_duration {
        println!("  fragmented, duration: {}", format_micros(d as i64));
    }
    for system in &info.pssh_systems {
        println!("  pssh system: {}", system);
    }

    if info.tracks.is_empty() {
        println!("Tracks: (none)");
        return;
    }

    println!("Tracks:");
    for t in &info.tracks {
        println!("  Track {}:", t.index);

        if let Some(i) = &t.info {
            println!("    id: {}", i.track_id);
            println!("    type: {:?}", i.track_type);
            println!("    codec: {:?}", i.codec);
            println!("    duration: {}", format_micros(i.duration));
            println!("    media time: {}", format_micros(i.media_time));
        }
        if let Some(err) = &t.error {
            println!("    error: {:?}", err);
        }
        if let Some(v) = &t.video {
            println!("    display: {}x{}", v.display_width, v.display_height);
            println!("    image: {}x{}", v.image_width, v.image_height);
            if v.rotation != 0 {
                println!("    rotation: {}", v.rotation);
            }
        }
        if let Some(a) = &t.audio {
            println!("    channels: {}", a.channels);
            println!("    bit depth: {}", a.bit_depth);
            println!("    sample rate: {}", a.sample_rate);
        }
        if let Some(lang) = &t.language {
            println!("    language: {}", lang);
        }
        if let Some((config, extra)) = t.codec_config_bytes
            && (config > 0 || extra > 0)
        {
            println!("    codec config: {} bytes, extra data: {} bytes", config, extra);
        }
        if let Some(p) = &t.protection {
            println!("    encrypted, iv size {}", p.iv_size);
        }
    }
}
