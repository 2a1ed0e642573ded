//! The uniform pull interface over format decoders.
//!
//! A format decoder advances one unit of work per [`Decoder::pass`] and
//! deposits whatever it produced into its sub-part buffers.  The getters here
//! drive `pass` until a request can be satisfied, so callers never care how
//! much work one pass happens to do.

use std::collections::VecDeque;

use reelforge_audio::AudioBuffers;
use reelforge_state::content::Content;
use reelforge_state::time::{ContentTime, ContentTimePeriod};

use crate::error::MediaResult;
use crate::image_proxy::ImageProxy;
use crate::types::{BitmapSubtitle, ContentAudio, ContentVideo, Eyes, StringSubtitle};

pub trait Decoder: Send {
    /// Advance one unit of work.  Returns true at end of stream.
    fn pass(&mut self) -> MediaResult<bool>;

    /// Reposition the internal cursor.  With `accurate` the caller needs
    /// frame-exact output from `time` onwards, so the decoder must decode
    /// from the preceding key frame and discard up to the target.
    fn seek(&mut self, time: ContentTime, accurate: bool) -> MediaResult<()>;

    fn video(&mut self) -> Option<&mut VideoBuffer> {
        None
    }

    fn audio(&mut self) -> Option<&mut AudioBuffer> {
        None
    }

    fn text(&mut self) -> Option<&mut TextBuffer> {
        None
    }

    /// True when this decoder instance can stand in for a freshly-created one
    /// for `content` (used to preserve decoder caches across piece rebuilds).
    fn reusable_for(&self, _content: &Content) -> bool {
        false
    }
}

// --- video ---------------------------------------------------------------

/// Decoded video frames awaiting collection, in content-frame order.
#[derive(Debug, Default)]
pub struct VideoBuffer {
    decoded: VecDeque<ContentVideo>,
}

impl VideoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, image: ImageProxy, eyes: Eyes, frame: i64) {
        self.decoded.push_back(ContentVideo { image, eyes, frame });
    }

    pub fn clear(&mut self) {
        self.decoded.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }

    fn prune_before(&mut self, frame: i64) {
        // Keep the newest frame even when it is old, as the fallback for
        // requests at or past the end of the stream.
        while self.decoded.len() > 1 && self.decoded.front().is_some_and(|v| v.frame < frame) {
            self.decoded.pop_front();
        }
    }

    fn best(&self, frame: i64, accurate: bool) -> Option<ContentVideo> {
        if !accurate {
            return self.decoded.front().cloned();
        }
        if let Some(exact) = self.decoded.iter().find(|v| v.frame == frame) {
            return Some(exact.clone());
        }
        // The decoder overshot the request (e.g. an imprecise container
        // seek); the first later frame is the best we will ever do.
        self.decoded.iter().find(|v| v.frame > frame).cloned()
    }
}

/// Fetch the video frame at `frame`, passing the decoder as needed.
pub fn get_video(
    dec: &mut dyn Decoder,
    frame: i64,
    accurate: bool,
) -> MediaResult<Option<ContentVideo>> {
    loop {
        let found = match dec.video() {
            Some(buf) => {
                buf.prune_before(frame);
                buf.best(frame, accurate)
            }
            None => return Ok(None),
        };
        if let Some(v) = found {
            return Ok(Some(v));
        }
        if dec.pass()? {
            // End of stream: whatever the flush produced, or the nearest
            // earlier frame for requests past the end.
            return Ok(dec.video().and_then(|buf| {
                buf.prune_before(frame);
                buf.best(frame, accurate)
                    .or_else(|| buf.decoded.back().cloned())
            }));
        }
    }
}

// --- audio ---------------------------------------------------------------

/// Decoded audio resampled to the output rate, with its position tracked in
/// output-rate frames.
#[derive(Debug)]
pub struct AudioBuffer {
    target_rate: i32,
    /// Content seconds per output second; from the piece's frame rate
    /// change.  Speed-changed content is stretched here so that its audio
    /// stays aligned with the retimed video.
    speed_up: f64,
    channels: usize,
    data: AudioBuffers,
    /// Output-rate frame index of the start of `data`; unset until something
    /// arrives.
    first_frame: Option<i64>,
}

impl AudioBuffer {
    pub fn new(channels: usize, target_rate: i32, speed_up: f64) -> Self {
        Self {
            target_rate,
            speed_up: if speed_up > 0.0 { speed_up } else { 1.0 },
            channels,
            data: AudioBuffers::new(channels, 0),
            first_frame: None,
        }
    }

    pub fn target_rate(&self) -> i32 {
        self.target_rate
    }

    pub fn clear(&mut self) {
        self.data = AudioBuffers::new(self.channels, 0);
        self.first_frame = None;
    }

    /// Deposit decoded planar audio starting at `seconds` of content time.
    /// Resamples from `source_rate` (stretched by any speed change) to the
    /// buffer's target rate.
    pub fn emit(&mut self, audio: AudioBuffers, seconds: f64, source_rate: i32) {
        let effective_rate = f64::from(source_rate) * self.speed_up;
        let resampled = if (effective_rate - f64::from(self.target_rate)).abs() < 1e-9 {
            audio
        } else {
            resample_linear(&audio, effective_rate, f64::from(self.target_rate))
        };
        match self.first_frame {
            None => {
                self.first_frame = Some(
                    (seconds / self.speed_up * f64::from(self.target_rate)).round() as i64,
                );
                self.data = resampled;
            }
            Some(_) => {
                // Emissions are contiguous within a run; append and ignore
                // the nominal position to avoid drift from pts rounding.
                self.data.append(&resampled);
            }
        }
    }

    fn prune_before(&mut self, frame: i64) {
        let Some(first) = self.first_frame else {
            return;
        };
        if frame > first {
            let drop = ((frame - first) as usize).min(self.data.frames());
            self.data.trim_start(drop);
            self.first_frame = Some(first + drop as i64);
        }
    }

    fn available_up_to(&self, frame: i64, length: usize) -> bool {
        match self.first_frame {
            Some(first) => first + self.data.frames() as i64 >= frame + length as i64,
            None => false,
        }
    }

    fn collect(&self, length: usize) -> Option<ContentAudio> {
        let first = self.first_frame?;
        let n = length.min(self.data.frames());
        let mut audio = AudioBuffers::new(self.data.channels(), n);
        audio.copy_from(&self.data, n, 0, 0);
        Some(ContentAudio { audio, frame: first })
    }
}

/// Fetch `length` output-rate frames of audio from `frame` onwards.  The
/// returned run may start later than requested (the caller offsets it) and
/// may be shorter at end of stream.
pub fn get_audio(
    dec: &mut dyn Decoder,
    frame: i64,
    length: usize,
) -> MediaResult<Option<ContentAudio>> {
    loop {
        let ready = match dec.audio() {
            Some(buf) => {
                buf.prune_before(frame);
                buf.available_up_to(frame, length)
            }
            None => return Ok(None),
        };
        let eos = if ready { false } else { dec.pass()? };
        if ready || eos {
            let buf = match dec.audio() {
                Some(buf) => buf,
                None => return Ok(None),
            };
            let want = match buf.first_frame {
                Some(first) => length.saturating_sub((first - frame).max(0) as usize),
                None => length,
            };
            return Ok(buf.collect(want));
        }
    }
}

fn resample_linear(input: &AudioBuffers, src_rate: f64, dst_rate: f64) -> AudioBuffers {
    if input.frames() == 0 || src_rate <= 0.0 || dst_rate <= 0.0 {
        return AudioBuffers::new(input.channels(), 0);
    }
    let ratio = src_rate / dst_rate;
    let out_len = (input.frames() as f64 / ratio) as usize;
    let mut out = AudioBuffers::new(input.channels(), out_len);
    for c in 0..input.channels() {
        let src = input.channel(c);
        let dst = out.channel_mut(c);
        for (i, d) in dst.iter_mut().enumerate() {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = src[idx.min(src.len() - 1)];
            let b = src[(idx + 1).min(src.len() - 1)];
            *d = a + (b - a) * frac;
        }
    }
    out
}

// --- text ----------------------------------------------------------------

/// Subtitle cues awaiting collection.
#[derive(Debug, Default)]
pub struct TextBuffer {
    bitmaps: Vec<BitmapSubtitle>,
    strings: Vec<StringSubtitle>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_bitmap(&mut self, sub: BitmapSubtitle) {
        self.bitmaps.push(sub);
    }

    pub fn emit_string(&mut self, sub: StringSubtitle) {
        self.strings.push(sub);
    }

    pub fn clear(&mut self) {
        self.bitmaps.clear();
        self.strings.clear();
    }

    fn prune_before(&mut self, t: ContentTime) {
        self.bitmaps.retain(|s| s.period.to > t);
        self.strings.retain(|s| s.period.to > t);
    }

    fn latest_end(&self) -> Option<ContentTime> {
        self.bitmaps
            .iter()
            .map(|s| s.period.to)
            .chain(self.strings.iter().map(|s| s.period.to))
            .max()
    }
}

/// Bitmap subtitles overlapping `period`.
pub fn get_bitmap_subtitles(
    dec: &mut dyn Decoder,
    period: ContentTimePeriod,
) -> MediaResult<Vec<BitmapSubtitle>> {
    fill_text_to(dec, period)?;
    Ok(match dec.text() {
        Some(buf) => buf
            .bitmaps
            .iter()
            .filter(|s| s.period.overlap(period).is_some())
            .cloned()
            .collect(),
        None => Vec::new(),
    })
}

/// Styled-text subtitles overlapping `period`.
pub fn get_string_subtitles(
    dec: &mut dyn Decoder,
    period: ContentTimePeriod,
) -> MediaResult<Vec<StringSubtitle>> {
    fill_text_to(dec, period)?;
    Ok(match dec.text() {
        Some(buf) => buf
            .strings
            .iter()
            .filter(|s| s.period.overlap(period).is_some())
            .cloned()
            .collect(),
        None => Vec::new(),
    })
}

fn fill_text_to(dec: &mut dyn Decoder, period: ContentTimePeriod) -> MediaResult<()> {
    loop {
        let done = match dec.text() {
            Some(buf) => {
                buf.prune_before(period.from);
                buf.latest_end().is_some_and(|end| end >= period.to)
            }
            None => return Ok(()),
        };
        if done || dec.pass()? {
            return Ok(());
        }
    }
}
