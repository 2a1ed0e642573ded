use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Timebase for both timeline kinds.  96 kHz divides evenly by 24, 25, 30, 48
/// and 60 fps and by 48 kHz audio, so frame and sample positions at those
/// rates are exact integers.
pub const HZ: i64 = 96_000;

macro_rules! time_type {
    ($name:ident, $period:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i64);

        impl $name {
            pub const ZERO: $name = $name(0);

            pub fn new(ticks: i64) -> Self {
                Self(ticks)
            }

            /// Raw tick count at [`HZ`].
            pub fn get(self) -> i64 {
                self.0
            }

            pub fn from_seconds(seconds: f64) -> Self {
                Self((seconds * HZ as f64).round() as i64)
            }

            pub fn from_frames(frames: i64, rate: f64) -> Self {
                debug_assert!(rate > 0.0);
                Self((frames as f64 * HZ as f64 / rate).round() as i64)
            }

            pub fn seconds(self) -> f64 {
                self.0 as f64 / HZ as f64
            }

            pub fn frames_round(self, rate: f64) -> i64 {
                (self.0 as f64 * rate / HZ as f64).round() as i64
            }

            pub fn frames_floor(self, rate: f64) -> i64 {
                (self.0 as f64 * rate / HZ as f64).floor() as i64
            }

            pub fn frames_ceil(self, rate: f64) -> i64 {
                (self.0 as f64 * rate / HZ as f64).ceil() as i64
            }

            /// Round up to the start of the next frame boundary, or stay put
            /// when already on one.
            pub fn ceil_to_frame(self, rate: f64) -> Self {
                Self::from_frames(self.frames_ceil(rate), rate)
            }

            pub fn floor_to_frame(self, rate: f64) -> Self {
                Self::from_frames(self.frames_floor(rate), rate)
            }

            pub fn clamp_non_negative(self) -> Self {
                Self(self.0.max(0))
            }
        }

        impl Add for $name {
            type Output = $name;
            fn add(self, rhs: $name) -> $name {
                $name(self.0 + rhs.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: $name) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $name {
            type Output = $name;
            fn sub(self, rhs: $name) -> $name {
                $name(self.0 - rhs.0)
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: $name) {
                self.0 -= rhs.0;
            }
        }

        impl Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} ({:.3}s)", self.0, self.seconds())
            }
        }

        /// Half-open period `[from, to)`.
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $period {
            pub from: $name,
            pub to: $name,
        }

        impl $period {
            pub fn new(from: $name, to: $name) -> Self {
                Self { from, to }
            }

            pub fn duration(self) -> $name {
                self.to - self.from
            }

            pub fn contains(self, t: $name) -> bool {
                self.from <= t && t < self.to
            }

            pub fn overlap(self, other: $period) -> Option<$period> {
                let from = self.from.max(other.from);
                let to = self.to.min(other.to);
                if from < to {
                    Some($period { from, to })
                } else {
                    None
                }
            }
        }
    };
}

time_type!(
    DcpTime,
    DcpTimePeriod,
    "A position or duration on the output (DCP) timeline."
);
time_type!(
    ContentTime,
    ContentTimePeriod,
    "A position or duration in a single content item's own timeline."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_positions_are_exact_at_common_rates() {
        for rate in [24.0, 25.0, 30.0, 48.0, 60.0] {
            for frame in [0, 1, 2, 100, 2879] {
                let t = DcpTime::from_frames(frame, rate);
                assert_eq!(t.frames_round(rate), frame);
                assert_eq!(t.frames_floor(rate), frame);
                assert_eq!(t.frames_ceil(rate), frame);
            }
        }
        let t = DcpTime::from_frames(48_000, 48_000.0);
        assert_eq!(t, DcpTime::from_seconds(1.0));
    }

    #[test]
    fn arithmetic() {
        let a = DcpTime::from_seconds(3.0);
        let b = DcpTime::from_seconds(1.5);
        assert_eq!((a - b).seconds(), 1.5);
        assert_eq!((a + b).get(), (HZ as f64 * 4.5) as i64);
        assert!(b < a);
        assert_eq!((b - a).clamp_non_negative(), DcpTime::ZERO);
    }

    #[test]
    fn ceil_to_frame_rounds_up_partial_frames() {
        // One 48 kHz sample past a frame boundary should round up to the
        // next whole 24 fps frame.
        let awkward = DcpTime::from_frames(24, 24.0) + DcpTime::from_frames(1, 48_000.0);
        assert_eq!(awkward.ceil_to_frame(24.0), DcpTime::from_frames(25, 24.0));
        let exact = DcpTime::from_frames(24, 24.0);
        assert_eq!(exact.ceil_to_frame(24.0), exact);
    }

    #[test]
    fn period_overlap() {
        let a = DcpTimePeriod::new(DcpTime::from_seconds(0.0), DcpTime::from_seconds(2.0));
        let b = DcpTimePeriod::new(DcpTime::from_seconds(1.0), DcpTime::from_seconds(3.0));
        let o = a.overlap(b).unwrap();
        assert_eq!(o.from, DcpTime::from_seconds(1.0));
        assert_eq!(o.to, DcpTime::from_seconds(2.0));

        let c = DcpTimePeriod::new(DcpTime::from_seconds(2.0), DcpTime::from_seconds(3.0));
        assert!(a.overlap(c).is_none());
        assert!(a.contains(DcpTime::from_seconds(1.999)));
        assert!(!a.contains(DcpTime::from_seconds(2.0)));
    }
}
