//! Decoder for existing DCPs.
//!
//! The reel assets are MXF files which ffmpeg can demux and decode, so video
//! and audio go through [`FfmpegDecoder`].  Subtitle assets are Interop-style
//! XML, parsed here.  Encrypted DCPs without a usable KDM are refused at
//! open time.

use std::path::{Path, PathBuf};

use ffmpeg::media::Type;
use ffmpeg_the_third as ffmpeg;
use reelforge_state::content::{Content, Source};
use reelforge_state::time::{ContentTime, ContentTimePeriod};
use reelforge_state::xml::parse_document;
use tracing::debug;

use crate::decoder::{AudioBuffer, Decoder, TextBuffer, VideoBuffer};
use crate::error::{MediaError, MediaResult};
use crate::ffmpeg::{init_once, FfmpegDecoder};
use crate::types::{StringSubtitle, SubtitleLine, VReference};

pub struct DcpDecoder {
    video: Option<FfmpegDecoder>,
    audio: Option<FfmpegDecoder>,
    cues: Vec<StringSubtitle>,
    text: TextBuffer,
}

impl DcpDecoder {
    pub fn open(content: &Content, dcp_audio_rate: i32) -> MediaResult<Self> {
        let Source::Dcp {
            encrypted,
            kdm_valid,
            ..
        } = &content.source
        else {
            return Err(MediaError::unsupported("not DCP content"));
        };
        if *encrypted && !*kdm_valid {
            return Err(MediaError::dcp_read(
                "DCP is encrypted and no valid KDM is available",
            ));
        }

        let dir = content
            .paths
            .first()
            .ok_or_else(|| MediaError::unsupported("DCP content with no path"))?;

        let assets = scan_assets(dir)?;
        debug!(
            video = ?assets.video,
            audio = ?assets.audio,
            subtitles = assets.subtitles.len(),
            "opened DCP"
        );

        let video = match &assets.video {
            Some(path) if content.video.is_some() => {
                Some(FfmpegDecoder::open_path(path, content, dcp_audio_rate, 1.0, false)?)
            }
            _ => None,
        };
        let audio = match &assets.audio {
            Some(path) if content.audio.is_some() => {
                Some(FfmpegDecoder::open_path(path, content, dcp_audio_rate, 1.0, true)?)
            }
            _ => None,
        };

        let mut cues = Vec::new();
        for path in &assets.subtitles {
            cues.extend(parse_subtitle_asset(path)?);
        }
        cues.sort_by_key(|c| c.period.from);

        let mut text = TextBuffer::new();
        for cue in &cues {
            text.emit_string(cue.clone());
        }

        Ok(Self {
            video,
            audio,
            cues,
            text,
        })
    }
}

impl Decoder for DcpDecoder {
    fn pass(&mut self) -> MediaResult<bool> {
        let video_eof = match &mut self.video {
            Some(d) => d.pass()?,
            None => true,
        };
        let audio_eof = match &mut self.audio {
            Some(d) => d.pass()?,
            None => true,
        };
        Ok(video_eof && audio_eof)
    }

    fn seek(&mut self, time: ContentTime, accurate: bool) -> MediaResult<()> {
        if let Some(d) = &mut self.video {
            d.seek(time, accurate)?;
        }
        if let Some(d) = &mut self.audio {
            d.seek(time, accurate)?;
        }
        // Cues are all in memory; repopulate so earlier ones pruned during
        // the last run come back.
        self.text.clear();
        for cue in &self.cues {
            self.text.emit_string(cue.clone());
        }
        Ok(())
    }

    fn video(&mut self) -> Option<&mut VideoBuffer> {
        self.video.as_mut().and_then(|d| d.video())
    }

    fn audio(&mut self) -> Option<&mut AudioBuffer> {
        self.audio.as_mut().and_then(|d| d.audio())
    }

    fn text(&mut self) -> Option<&mut TextBuffer> {
        if self.cues.is_empty() {
            None
        } else {
            Some(&mut self.text)
        }
    }
}

struct Assets {
    video: Option<PathBuf>,
    audio: Option<PathBuf>,
    subtitles: Vec<PathBuf>,
}

fn scan_assets(dir: &Path) -> MediaResult<Assets> {
    init_once();

    let mut assets = Assets {
        video: None,
        audio: None,
        subtitles: Vec::new(),
    };

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        match ext.to_ascii_lowercase().as_str() {
            "mxf" => {
                let Ok(input) = ffmpeg::format::input(&path) else {
                    continue;
                };
                if input.streams().best(Type::Video).is_some() && assets.video.is_none() {
                    assets.video = Some(path);
                } else if input.streams().best(Type::Audio).is_some() && assets.audio.is_none() {
                    assets.audio = Some(path);
                }
            }
            "xml" => {
                if is_subtitle_asset(&path) {
                    assets.subtitles.push(path);
                }
            }
            _ => {}
        }
    }

    if assets.video.is_none() && assets.audio.is_none() && assets.subtitles.is_empty() {
        return Err(MediaError::dcp_read(format!(
            "no playable assets found in {}",
            dir.display()
        )));
    }

    Ok(assets)
}

fn is_subtitle_asset(path: &Path) -> bool {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return false;
    };
    matches!(
        parse_document(&raw).map(|root| root.name),
        Ok(name) if name == "DCSubtitle" || name == "SubtitleReel"
    )
}

fn parse_subtitle_asset(path: &Path) -> MediaResult<Vec<StringSubtitle>> {
    let raw = std::fs::read_to_string(path)?;
    let root = parse_document(&raw).map_err(|e| MediaError::dcp_read(e.to_string()))?;

    let mut cues = Vec::new();
    collect_subtitles(&root, &mut cues);
    Ok(cues)
}

fn collect_subtitles(el: &reelforge_state::xml::Element, out: &mut Vec<StringSubtitle>) {
    if el.name == "Subtitle" {
        if let Some(cue) = parse_subtitle(el) {
            out.push(cue);
        }
        return;
    }
    for child in &el.children {
        collect_subtitles(child, out);
    }
}

fn parse_subtitle(el: &reelforge_state::xml::Element) -> Option<StringSubtitle> {
    let from = parse_timecode(el.attr("TimeIn")?)?;
    let to = parse_timecode(el.attr("TimeOut")?)?;

    let mut lines = Vec::new();
    for text in el.children.iter().filter(|c| c.name == "Text") {
        let v_position_percent: f64 = text
            .attr("VPosition")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10.0);
        let v_position = match text.attr("VAlign").unwrap_or("bottom") {
            "top" => v_position_percent / 100.0,
            "center" => 0.5 + v_position_percent / 100.0,
            _ => 1.0 - v_position_percent / 100.0,
        };
        lines.push(SubtitleLine {
            text: gather_text(text),
            italic: text.attr("Italic") == Some("yes"),
            colour: None,
            size_points: text.attr("Size").and_then(|v| v.parse().ok()),
            v_position,
            v_reference: VReference::Proportional,
            font_id: None,
        });
    }

    if lines.is_empty() {
        return None;
    }
    Some(StringSubtitle {
        lines,
        period: ContentTimePeriod::new(from, to),
    })
}

fn gather_text(el: &reelforge_state::xml::Element) -> String {
    let mut s = el.text.clone();
    for child in &el.children {
        s.push_str(&gather_text(child));
    }
    s
}

/// Interop `HH:MM:SS:TTT` where the final field is ticks of 4 ms.
fn parse_timecode(s: &str) -> Option<ContentTime> {
    let mut fields = s.split(':');
    let hours: i64 = fields.next()?.parse().ok()?;
    let minutes: i64 = fields.next()?.parse().ok()?;
    let seconds: i64 = fields.next()?.parse().ok()?;
    let ticks: i64 = fields.next()?.parse().ok()?;
    let total = (hours * 3600 + minutes * 60 + seconds) as f64 + ticks as f64 / 250.0;
    Some(ContentTime::from_seconds(total))
}
