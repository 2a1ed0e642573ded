use reelforge_state::content::Content;
use reelforge_state::time::{ContentTime, ContentTimePeriod};

use crate::decoder::{Decoder, TextBuffer};
use crate::error::{MediaError, MediaResult};
use crate::types::{StringSubtitle, SubtitleLine};

/// Decoder for SubRip (`.srt`) files.  The whole file is parsed up front;
/// `pass` then feeds cues out in order.
pub struct SubRipDecoder {
    cues: Vec<StringSubtitle>,
    next: usize,
    text: TextBuffer,
}

impl SubRipDecoder {
    pub fn open(content: &Content) -> MediaResult<Self> {
        let path = content
            .paths
            .first()
            .ok_or_else(|| MediaError::unsupported("subrip content with no path"))?;
        let raw = std::fs::read_to_string(path)?;
        Ok(Self {
            cues: parse_subrip(&raw),
            next: 0,
            text: TextBuffer::new(),
        })
    }
}

impl Decoder for SubRipDecoder {
    fn pass(&mut self) -> MediaResult<bool> {
        let Some(cue) = self.cues.get(self.next) else {
            return Ok(true);
        };
        self.text.emit_string(cue.clone());
        self.next += 1;
        Ok(false)
    }

    fn seek(&mut self, time: ContentTime, _accurate: bool) -> MediaResult<()> {
        self.next = self
            .cues
            .iter()
            .position(|c| c.period.to > time)
            .unwrap_or(self.cues.len());
        self.text.clear();
        Ok(())
    }

    fn text(&mut self) -> Option<&mut TextBuffer> {
        Some(&mut self.text)
    }
}

/// Parse SubRip text into cues.  Unparseable blocks are skipped.
pub fn parse_subrip(raw: &str) -> Vec<StringSubtitle> {
    let mut cues = Vec::new();

    for block in raw.replace('\r', "").split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());

        // First line is a numeric counter, which we do not need.
        let Some(first) = lines.next() else {
            continue;
        };
        let timing = if first.contains("-->") {
            first
        } else {
            match lines.next() {
                Some(l) if l.contains("-->") => l,
                _ => continue,
            }
        };

        let Some((from, to)) = parse_timing(timing) else {
            continue;
        };

        let period = ContentTimePeriod::new(from, to);
        let text_lines: Vec<SubtitleLine> = lines
            .enumerate()
            .map(|(i, l)| parse_line(l, i))
            .collect();
        if !text_lines.is_empty() {
            cues.push(StringSubtitle {
                lines: text_lines,
                period,
            });
        }
    }

    cues
}

fn parse_timing(line: &str) -> Option<(ContentTime, ContentTime)> {
    let mut parts = line.split("-->");
    let from = parse_timestamp(parts.next()?.trim())?;
    let to = parse_timestamp(parts.next()?.trim().split_whitespace().next()?)?;
    Some((from, to))
}

/// `HH:MM:SS,mmm` with `.` also accepted before the milliseconds.
fn parse_timestamp(s: &str) -> Option<ContentTime> {
    let normalized = s.replace('.', ",");
    let (hms, millis) = normalized.split_once(',')?;
    let mut fields = hms.split(':');
    let hours: i64 = fields.next()?.parse().ok()?;
    let minutes: i64 = fields.next()?.parse().ok()?;
    let seconds: i64 = fields.next()?.parse().ok()?;
    let millis: i64 = millis.parse().ok()?;
    let total = (hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0;
    Some(ContentTime::from_seconds(total))
}

fn parse_line(raw: &str, line: usize) -> SubtitleLine {
    let trimmed = raw.trim();
    let italic = trimmed.starts_with("<i>") && trimmed.ends_with("</i>");
    let text = trimmed
        .replace("<i>", "")
        .replace("</i>", "")
        .replace("<b>", "")
        .replace("</b>", "");
    let mut l = SubtitleLine::plain(text, line);
    l.italic = italic;
    l
}
