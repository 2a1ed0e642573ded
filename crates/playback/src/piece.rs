use reelforge_media::Decoder;
use reelforge_state::content::Content;
use reelforge_state::film::Film;
use reelforge_state::frame_rate::FrameRateChange;
use reelforge_state::time::{ContentTime, DcpTime, DcpTimePeriod};

/// One playlist item bound to its decoder and frame-rate mapping.
pub struct Piece {
    pub content: Content,
    pub decoder: Box<dyn Decoder>,
    pub frc: FrameRateChange,
    /// Last timeline point this piece was asked about; used to spot
    /// non-sequential requests that need a decoder seek.
    pub last_request: Option<DcpTime>,
}

impl Piece {
    pub fn new(content: Content, decoder: Box<dyn Decoder>, frc: FrameRateChange) -> Self {
        Self {
            content,
            decoder,
            frc,
            last_request: None,
        }
    }

    pub fn period(&self, film: &Film) -> DcpTimePeriod {
        DcpTimePeriod::new(self.content.position, self.content.end(film))
    }

    /// Offset of `t` into this piece, clamped to the trimmed extent.
    fn clamped_offset(&self, film: &Film, t: DcpTime) -> DcpTime {
        (t - self.content.position)
            .clamp_non_negative()
            .min(self.content.length_after_trim(film))
    }

    /// Content video frame shown at timeline point `t`.
    pub fn dcp_to_content_video(&self, film: &Film, t: DcpTime) -> i64 {
        let s = self.clamped_offset(film, t);
        let content = ContentTime::from_dcp(s, &self.frc) + self.content.trim_start;
        content.frames_floor(self.frc.source)
    }

    /// Timeline point at which content video frame `f` is shown.
    pub fn content_video_to_dcp(&self, f: i64) -> DcpTime {
        let content = ContentTime::from_frames(f, self.frc.source) - self.content.trim_start;
        self.content.position + DcpTime::from_content(content, &self.frc)
    }

    /// Position in the piece's resampled audio (at the film audio rate)
    /// corresponding to timeline point `t`.
    pub fn dcp_to_resampled_audio(&self, film: &Film, t: DcpTime) -> i64 {
        let s = self.clamped_offset(film, t);
        let trim = DcpTime::from_content(self.content.trim_start, &self.frc);
        (s + trim).frames_floor(f64::from(film.audio_frame_rate))
    }

    /// Content time at timeline point `t` (for subtitles and seeks).
    pub fn dcp_to_content_time(&self, film: &Film, t: DcpTime) -> ContentTime {
        ContentTime::from_dcp(self.clamped_offset(film, t), &self.frc) + self.content.trim_start
    }

    /// Timeline point of content time `t`.
    pub fn content_time_to_dcp(&self, t: ContentTime) -> DcpTime {
        self.content.position + DcpTime::from_content(t - self.content.trim_start, &self.frc)
    }
}
