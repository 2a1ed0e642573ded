use crate::time::{ContentTime, DcpTime};

fn about_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-4
}

/// Mapping between a content item's native video rate and the output rate.
///
/// When the rates are near-integer multiples the decoder can drop or repeat
/// frames instead of changing speed; otherwise the content is played slightly
/// fast or slow and its audio is resampled to match.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRateChange {
    pub source: f64,
    pub dcp: i32,
    /// Skip every other source frame (source is roughly twice the DCP rate).
    pub skip: bool,
    /// Emit each source frame this many times (1 = no repeat).
    pub repeat: i32,
    /// True when the mapping still implies a speed change after any skip or
    /// repeat has been accounted for.
    pub change_speed: bool,
}

impl FrameRateChange {
    pub fn new(source: f64, dcp: i32) -> Self {
        let mut skip = false;
        let mut repeat = 1;

        let dcp_f = f64::from(dcp);
        if (source / 2.0 - dcp_f).abs() < (source - dcp_f).abs() {
            skip = true;
        } else if (source * 2.0 - dcp_f).abs() < (source - dcp_f).abs() {
            repeat = 2;
        }

        let effective = source * if skip { 0.5 } else { f64::from(repeat) };
        let change_speed = !about_equal(effective, dcp_f);

        Self {
            source,
            dcp,
            skip,
            repeat,
            change_speed,
        }
    }

    /// Identity mapping at the given rate.
    pub fn none(rate: i32) -> Self {
        Self::new(f64::from(rate), rate)
    }

    /// Content video frames consumed per DCP video frame: 2 when skipping,
    /// 1/repeat when repeating, otherwise 1.
    pub fn factor(&self) -> f64 {
        if self.skip {
            2.0
        } else {
            1.0 / f64::from(self.repeat)
        }
    }

    /// Content seconds that pass per DCP second.  1 except for speed-changed
    /// content (e.g. 24/25 when 25 fps material is slowed into a 24 fps DCP).
    pub fn speed_up(&self) -> f64 {
        f64::from(self.dcp) * self.factor() / self.source
    }

    pub fn description(&self) -> String {
        let mut d = format!("Content at {:.2} fps", self.source);
        if self.skip {
            d.push_str(", skipping every other frame");
        } else if self.repeat > 1 {
            d.push_str(&format!(", repeating each frame {} times", self.repeat));
        }
        if self.change_speed {
            d.push_str(&format!(", running at {:.2}% speed", 100.0 * self.speed_up()));
        }
        d
    }
}

impl ContentTime {
    /// Map a span of DCP time into this content's own timeline.
    pub fn from_dcp(d: DcpTime, frc: &FrameRateChange) -> ContentTime {
        ContentTime::new((d.get() as f64 * frc.speed_up()).round() as i64)
    }
}

impl DcpTime {
    /// Map a span of content time onto the DCP timeline.
    pub fn from_content(c: ContentTime, frc: &FrameRateChange) -> DcpTime {
        DcpTime::new((c.get() as f64 / frc.speed_up()).round() as i64)
    }
}
