use std::path::PathBuf;

use reelforge_audio::AudioMapping;
use uuid::Uuid;

use crate::film::Film;
use crate::frame_rate::FrameRateChange;
use crate::geometry::{Crop, Size};
use crate::time::{ContentTime, DcpTime};

/// Property identifiers carried on change events.  Consumers treat these as
/// opaque except for the composition-affecting set.
pub mod property {
    pub const PATH: u32 = 100;
    pub const POSITION: u32 = 101;
    pub const LENGTH: u32 = 102;
    pub const TRIM_START: u32 = 103;
    pub const TRIM_END: u32 = 104;
    pub const VIDEO_FRAME_RATE: u32 = 105;

    pub const VIDEO_SIZE: u32 = 201;
    pub const VIDEO_FRAME_TYPE: u32 = 202;
    pub const VIDEO_CROP: u32 = 203;
    pub const VIDEO_SCALE: u32 = 204;
    pub const VIDEO_COLOUR_CONVERSION: u32 = 205;
    pub const VIDEO_FADE_IN: u32 = 206;
    pub const VIDEO_FADE_OUT: u32 = 207;

    pub const AUDIO_GAIN: u32 = 301;
    pub const AUDIO_DELAY: u32 = 302;
    pub const AUDIO_MAPPING: u32 = 303;

    pub const TEXT_X_OFFSET: u32 = 500;
    pub const TEXT_Y_OFFSET: u32 = 501;
    pub const TEXT_X_SCALE: u32 = 502;
    pub const TEXT_Y_SCALE: u32 = 503;
    pub const TEXT_USE: u32 = 504;
    pub const TEXT_BURN: u32 = 505;
    pub const TEXT_LANGUAGE: u32 = 506;
    pub const TEXT_FONTS: u32 = 507;
    pub const TEXT_COLOUR: u32 = 508;
    pub const TEXT_EFFECT: u32 = 509;
    pub const TEXT_EFFECT_COLOUR: u32 = 510;
    pub const TEXT_LINE_SPACING: u32 = 511;
    pub const TEXT_FADE_IN: u32 = 512;
    pub const TEXT_FADE_OUT: u32 = 513;
    pub const TEXT_OUTLINE_WIDTH: u32 = 514;
    pub const TEXT_TYPE: u32 = 515;
    pub const TEXT_DCP_TRACK: u32 = 516;

    /// Properties whose change requires the Player to rebuild its pieces.
    pub fn affects_composition(p: u32) -> bool {
        matches!(
            p,
            PATH | POSITION | LENGTH | TRIM_START | TRIM_END | VIDEO_FRAME_TYPE
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(Uuid);

impl ContentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VideoFrameType {
    #[default]
    TwoD,
    ThreeDLeftRight,
    ThreeDTopBottom,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum VideoScale {
    /// Scale to fit the container, preserving aspect.
    #[default]
    Fit,
    /// Stretch to fill the container exactly.
    Stretch,
    /// Force a particular displayed aspect ratio.
    Ratio(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoPart {
    pub frame_rate: f64,
    /// Length in video frames at `frame_rate`.
    pub length: i64,
    pub size: Size,
    pub frame_type: VideoFrameType,
    pub crop: Crop,
    pub scale: VideoScale,
    /// Identifier of a colour conversion preset, if any.
    pub colour_conversion: Option<String>,
    pub fade_in: ContentTime,
    pub fade_out: ContentTime,
}

impl VideoPart {
    pub fn new(frame_rate: f64, length: i64, size: Size) -> Self {
        Self {
            frame_rate,
            length,
            size,
            frame_type: VideoFrameType::default(),
            crop: Crop::default(),
            scale: VideoScale::default(),
            colour_conversion: None,
            fade_in: ContentTime::ZERO,
            fade_out: ContentTime::ZERO,
        }
    }

    pub fn size_after_crop(&self) -> Size {
        self.crop.apply_to(self.size)
    }

    /// Displayed image size inside `container`, before any approximation.
    pub fn scaled_size(&self, container: Size) -> Size {
        let cropped = self.size_after_crop();
        match self.scale {
            VideoScale::Fit => cropped.fit_within(container),
            VideoScale::Stretch => container,
            VideoScale::Ratio(r) => {
                let shaped = Size::new((f64::from(cropped.height) * r).round() as u32, cropped.height);
                shaped.fit_within(container)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioPart {
    pub frame_rate: i32,
    /// Length in audio frames at `frame_rate`.
    pub length: i64,
    pub channels: usize,
    pub gain_db: f64,
    /// Carried through project files but currently applied as zero.
    pub delay_ms: i32,
    pub mapping: AudioMapping,
}

impl AudioPart {
    pub fn new(frame_rate: i32, length: i64, channels: usize) -> Self {
        Self {
            frame_rate,
            length,
            channels,
            gain_db: 0.0,
            delay_ms: 0,
            mapping: AudioMapping::identity(channels),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextKind {
    #[default]
    OpenSubtitle,
    ClosedCaption,
}

impl TextKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TextKind::OpenSubtitle => "open",
            TextKind::ClosedCaption => "closed-caption",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TextKind::OpenSubtitle),
            "closed-caption" => Some(TextKind::ClosedCaption),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextEffect {
    #[default]
    None,
    Outline,
    Shadow,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Font {
    pub id: String,
    pub file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextPart {
    pub kind: TextKind,
    pub original_kind: TextKind,
    pub use_: bool,
    pub burn: bool,
    pub x_offset: f64,
    pub y_offset: f64,
    pub x_scale: f64,
    pub y_scale: f64,
    pub line_spacing: f64,
    pub outline_width: i32,
    pub fade_in: Option<ContentTime>,
    pub fade_out: Option<ContentTime>,
    pub language: String,
    pub colour: Option<Colour>,
    pub effect: TextEffect,
    pub effect_colour: Option<Colour>,
    pub dcp_track: Option<String>,
    pub fonts: Vec<Font>,
}

impl TextPart {
    pub fn new(kind: TextKind) -> Self {
        Self {
            kind,
            original_kind: kind,
            use_: false,
            burn: false,
            x_offset: 0.0,
            y_offset: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
            line_spacing: 1.0,
            outline_width: 4,
            fade_in: None,
            fade_out: None,
            language: String::new(),
            colour: None,
            effect: TextEffect::None,
            effect_colour: None,
            dcp_track: None,
            fonts: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FfmpegColour {
    pub range: Option<String>,
    pub primaries: Option<String>,
    pub transfer: Option<String>,
    pub matrix: Option<String>,
    pub bits_per_pixel: Option<u32>,
}

/// Where a content item's essence comes from; the Player instantiates the
/// matching decoder.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    Ffmpeg {
        audio_stream: Option<usize>,
        subtitle_stream: Option<usize>,
        filters: Vec<String>,
        /// PTS of the first video frame, when the container does not start at
        /// zero.
        first_video: Option<ContentTime>,
        colour: FfmpegColour,
    },
    ImageSequence,
    Sound,
    SubRip,
    Dcp {
        name: String,
        encrypted: bool,
        /// Encoded KDM, if one has been supplied.
        kdm: Option<String>,
        kdm_valid: bool,
        has_subtitles: bool,
        reference_video: bool,
        reference_audio: bool,
        reference_text: bool,
    },
}

impl Source {
    pub fn ffmpeg() -> Self {
        Source::Ffmpeg {
            audio_stream: None,
            subtitle_stream: None,
            filters: Vec::new(),
            first_video: None,
            colour: FfmpegColour::default(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Source::Ffmpeg { .. } => "FFmpeg",
            Source::ImageSequence => "Image",
            Source::Sound => "Sound",
            Source::SubRip => "SubRip",
            Source::Dcp { .. } => "DCP",
        }
    }
}

/// One item on the timeline: paths to essence, placement and trims, and
/// whichever sub-parts (video / audio / texts) the essence provides.
#[derive(Clone, Debug, PartialEq)]
pub struct Content {
    pub id: ContentId,
    pub paths: Vec<PathBuf>,
    pub position: DcpTime,
    pub trim_start: ContentTime,
    pub trim_end: ContentTime,
    /// Total essence length in its own timeline, as examined.
    pub length: ContentTime,
    /// Explicit frame-rate override from the project file.
    pub video_frame_rate: Option<f64>,
    pub video: Option<VideoPart>,
    pub audio: Option<AudioPart>,
    pub texts: Vec<TextPart>,
    pub source: Source,
}

impl Content {
    pub fn new(source: Source, paths: Vec<PathBuf>) -> Self {
        Self {
            id: ContentId::new(),
            paths,
            position: DcpTime::ZERO,
            trim_start: ContentTime::ZERO,
            trim_end: ContentTime::ZERO,
            length: ContentTime::ZERO,
            video_frame_rate: None,
            video: None,
            audio: None,
            texts: Vec::new(),
            source,
        }
    }

    pub fn paths_valid(&self) -> bool {
        !self.paths.is_empty() && self.paths.iter().all(|p| p.exists())
    }

    /// Native video rate to use for frame-rate-change calculations, falling
    /// back to the film rate for items with no video of their own.
    pub fn active_video_frame_rate(&self, film: &Film) -> f64 {
        self.video_frame_rate
            .or(self.video.as_ref().map(|v| v.frame_rate))
            .unwrap_or(f64::from(film.video_frame_rate))
    }

    pub fn frame_rate_change(&self, film: &Film) -> FrameRateChange {
        FrameRateChange::new(self.active_video_frame_rate(film), film.video_frame_rate)
    }

    /// Timeline span of the whole (untrimmed) essence.
    pub fn full_length(&self, film: &Film) -> DcpTime {
        DcpTime::from_content(self.length, &self.frame_rate_change(film))
    }

    pub fn length_after_trim(&self, film: &Film) -> DcpTime {
        let trimmed = (self.length - self.trim_start - self.trim_end).clamp_non_negative();
        DcpTime::from_content(trimmed, &self.frame_rate_change(film))
    }

    pub fn end(&self, film: &Film) -> DcpTime {
        self.position + self.length_after_trim(film)
    }

    /// False for an encrypted DCP with no usable KDM.
    pub fn can_be_played(&self) -> bool {
        match &self.source {
            Source::Dcp {
                encrypted,
                kdm_valid,
                ..
            } => !encrypted || *kdm_valid,
            _ => true,
        }
    }

    /// Texts of the given kind which are enabled.
    pub fn active_texts(&self, kind: TextKind) -> impl Iterator<Item = &TextPart> {
        self.texts
            .iter()
            .filter(move |t| t.use_ && t.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn film() -> Film {
        Film::new("test")
    }

    #[test]
    fn length_after_trim_subtracts_both_ends() {
        let mut c = Content::new(Source::ffmpeg(), vec![]);
        c.video = Some(VideoPart::new(24.0, 240, Size::new(1920, 1080)));
        c.length = ContentTime::from_seconds(10.0);
        c.trim_start = ContentTime::from_seconds(1.0);
        c.trim_end = ContentTime::from_seconds(2.0);
        assert_eq!(c.length_after_trim(&film()), DcpTime::from_seconds(7.0));
        assert_eq!(c.end(&film()), DcpTime::from_seconds(7.0));
        c.position = DcpTime::from_seconds(3.0);
        assert_eq!(c.end(&film()), DcpTime::from_seconds(10.0));
    }

    #[test]
    fn speed_change_stretches_timeline_length() {
        // 25 fps content in a 24 fps film plays slightly slower, so the same
        // essence covers more of the timeline.
        let mut c = Content::new(Source::ffmpeg(), vec![]);
        c.video = Some(VideoPart::new(25.0, 250, Size::new(1920, 1080)));
        c.length = ContentTime::from_seconds(10.0);
        let len = c.full_length(&film());
        assert!((len.seconds() - 10.0 * 25.0 / 24.0).abs() < 1e-6);
    }

    #[test]
    fn encrypted_dcp_without_kdm_cannot_play() {
        let mut c = Content::new(
            Source::Dcp {
                name: "TestDCP".to_string(),
                encrypted: true,
                kdm: None,
                kdm_valid: false,
                has_subtitles: false,
                reference_video: false,
                reference_audio: false,
                reference_text: false,
            },
            vec![],
        );
        assert!(!c.can_be_played());
        if let Source::Dcp { kdm_valid, .. } = &mut c.source {
            *kdm_valid = true;
        }
        assert!(c.can_be_played());
    }

    #[test]
    fn scaled_size_respects_crop_and_mode() {
        let mut v = VideoPart::new(24.0, 1, Size::new(1920, 1080));
        let container = Size::new(1998, 1080);
        assert_eq!(v.scaled_size(container), Size::new(1920, 1080));
        v.scale = VideoScale::Stretch;
        assert_eq!(v.scaled_size(container), container);
        v.scale = VideoScale::Fit;
        v.crop = Crop {
            left: 240,
            right: 240,
            top: 0,
            bottom: 0,
        };
        // 1440x1080 cropped shape fits at 1440x1080.
        assert_eq!(v.scaled_size(container), Size::new(1440, 1080));
    }

    #[test]
    fn composition_affecting_properties() {
        assert!(property::affects_composition(property::POSITION));
        assert!(property::affects_composition(property::VIDEO_FRAME_TYPE));
        assert!(!property::affects_composition(property::TEXT_X_OFFSET));
        assert!(!property::affects_composition(property::VIDEO_CROP));
    }
}
