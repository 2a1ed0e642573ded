use std::sync::Arc;

use image::RgbaImage;
use reelforge_audio::AudioBuffers;
use reelforge_state::content::Colour;
use reelforge_state::time::ContentTimePeriod;
use reelforge_state::Rect;

use crate::image_proxy::ImageProxy;

/// Which eye (or both) a decoded frame is for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Eyes {
    #[default]
    Both,
    Left,
    Right,
}

/// One decoded video frame in content terms.
#[derive(Clone, Debug)]
pub struct ContentVideo {
    pub image: ImageProxy,
    pub eyes: Eyes,
    /// Frame index in the content's own video timeline.
    pub frame: i64,
}

/// A run of decoded audio in content terms.
#[derive(Clone, Debug)]
pub struct ContentAudio {
    pub audio: AudioBuffers,
    /// Position of the first frame, at the resampled (DCP) audio rate.
    pub frame: i64,
}

/// A subtitle that arrives as a pre-rendered image (e.g. from a DCP).
#[derive(Clone, Debug)]
pub struct BitmapSubtitle {
    pub image: Arc<RgbaImage>,
    /// Position and size as fractions of the whole screen.
    pub rectangle: Rect,
    pub period: ContentTimePeriod,
}

/// Vertical anchoring for a styled text line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VReference {
    /// Position counts lines down from the top of the whole cue; the cue is
    /// "placed" near the bottom of the screen by the renderer.
    #[default]
    TopOfSubtitle,
    /// Position is a 0..1 proportion of screen height.
    Proportional,
}

#[derive(Clone, Debug)]
pub struct SubtitleLine {
    pub text: String,
    pub italic: bool,
    pub colour: Option<Colour>,
    /// Point size; the renderer uses 48 when unset.
    pub size_points: Option<f64>,
    pub v_position: f64,
    pub v_reference: VReference,
    pub font_id: Option<String>,
}

impl SubtitleLine {
    pub fn plain(text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            italic: false,
            colour: None,
            size_points: None,
            v_position: line as f64,
            v_reference: VReference::TopOfSubtitle,
            font_id: None,
        }
    }
}

/// A subtitle cue delivered as styled text to be rendered by the player.
#[derive(Clone, Debug)]
pub struct StringSubtitle {
    pub lines: Vec<SubtitleLine>,
    pub period: ContentTimePeriod,
}
