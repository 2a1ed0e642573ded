use reelforge_state::content::Content;
use reelforge_state::time::ContentTime;

use crate::decoder::{AudioBuffer, Decoder};
use crate::error::MediaResult;
use crate::ffmpeg::FfmpegDecoder;

/// Decoder for plain audio files (wav, flac, aiff and friends).  Demuxing
/// and decoding go through the ffmpeg path with video ignored.
pub struct SoundDecoder {
    inner: FfmpegDecoder,
}

impl SoundDecoder {
    pub fn open(content: &Content, dcp_audio_rate: i32, speed_up: f64) -> MediaResult<Self> {
        Ok(Self {
            inner: FfmpegDecoder::open_audio_only(content, dcp_audio_rate, speed_up)?,
        })
    }
}

impl Decoder for SoundDecoder {
    fn pass(&mut self) -> MediaResult<bool> {
        self.inner.pass()
    }

    fn seek(&mut self, time: ContentTime, accurate: bool) -> MediaResult<()> {
        self.inner.seek(time, accurate)
    }

    fn audio(&mut self) -> Option<&mut AudioBuffer> {
        self.inner.audio()
    }
}
