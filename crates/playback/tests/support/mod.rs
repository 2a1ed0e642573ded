//! Helpers for building small playable projects in a temp directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelforge_audio::AudioMapping;
use reelforge_state::content::{AudioPart, Content, Source, TextKind, TextPart, VideoPart};
use reelforge_state::film::Film;
use reelforge_state::playlist::Playlist;
use reelforge_state::time::ContentTime;
use reelforge_state::Size;

pub fn film() -> Film {
    let mut film = Film::new("test");
    film.container = Size::new(64, 36);
    film
}

/// A still image shown for `seconds` at 24 fps.
pub fn still_video_content(dir: &Path, name: &str, seconds: f64) -> Content {
    let path = dir.join(format!("{name}.png"));
    let img = image::RgbaImage::from_pixel(32, 18, image::Rgba([200, 40, 40, 255]));
    img.save(&path).unwrap();

    let frames = (seconds * 24.0).round() as i64;
    let mut c = Content::new(Source::ImageSequence, vec![path]);
    c.video = Some(VideoPart::new(24.0, frames, Size::new(32, 18)));
    c.length = ContentTime::from_seconds(seconds);
    c
}

/// Mono 48 kHz PCM wav holding `value` at every sample.
pub fn constant_wav_content(
    dir: &Path,
    name: &str,
    seconds: f64,
    value: f32,
    mapping: AudioMapping,
) -> Content {
    let path = dir.join(format!("{name}.wav"));
    let n = (seconds * 48_000.0) as usize;
    let sample = (value * 32768.0) as i16;
    write_wav(&path, &vec![sample; n], 48_000, 1);

    let mut c = Content::new(Source::Sound, vec![path]);
    let mut audio = AudioPart::new(48_000, n as i64, 1);
    audio.mapping = mapping;
    c.audio = Some(audio);
    c.length = ContentTime::from_seconds(seconds);
    c
}

pub fn write_wav(path: &PathBuf, samples: &[i16], rate: u32, channels: u16) {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = rate * u32::from(channels) * 2;
    let block_align = channels * 2;

    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

/// A SubRip file with one cue per entry of (from, to, text).
pub fn subrip_content(dir: &Path, name: &str, cues: &[(f64, f64, &str)], kind: TextKind) -> Content {
    let path = dir.join(format!("{name}.srt"));
    let mut srt = String::new();
    for (i, (from, to, text)) in cues.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(*from),
            srt_timestamp(*to),
            text
        ));
    }
    std::fs::write(&path, srt).unwrap();

    let end = cues.iter().map(|(_, to, _)| *to).fold(0.0, f64::max);
    let mut c = Content::new(Source::SubRip, vec![path]);
    let mut part = TextPart::new(kind);
    part.kind = kind;
    part.use_ = true;
    part.burn = kind == TextKind::OpenSubtitle;
    c.texts.push(part);
    c.length = ContentTime::from_seconds(end);
    c
}

fn srt_timestamp(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        millis / 3_600_000,
        (millis / 60_000) % 60,
        (millis / 1000) % 60,
        millis % 1000
    )
}

pub fn playlist_of(content: Vec<Content>) -> Arc<Playlist> {
    let playlist = Arc::new(Playlist::new());
    for c in content {
        playlist.add(c);
    }
    playlist
}
