//! Bounded-by-policy FIFOs between the Butler's driver and its consumers.
//!
//! None of these lock internally; the Butler serializes access under its
//! buffers lock.

use std::collections::VecDeque;
use std::sync::Arc;

use reelforge_audio::AudioBuffers;
use reelforge_state::time::{DcpTime, DcpTimePeriod};

use crate::player::PlayerText;
use crate::player_video::PlayerVideo;

#[derive(Default)]
pub struct VideoRingBuffer {
    queue: VecDeque<(Arc<PlayerVideo>, DcpTime)>,
}

impl VideoRingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, video: Arc<PlayerVideo>, time: DcpTime) {
        self.queue.push_back((video, time));
    }

    pub fn get(&mut self) -> Option<(Arc<PlayerVideo>, DcpTime)> {
        self.queue.pop_front()
    }

    /// Timestamp of the next frame without removing it.
    pub fn peek(&self) -> Option<DcpTime> {
        self.queue.front().map(|(_, t)| *t)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn memory_used(&self) -> usize {
        self.queue.iter().map(|(v, _)| v.memory_used()).sum()
    }
}

pub struct AudioRingBuffer {
    queue: VecDeque<(AudioBuffers, DcpTime, i32)>,
    /// Frames already consumed from the queue head.
    head_offset: usize,
}

impl AudioRingBuffer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            head_offset: 0,
        }
    }

    pub fn put(&mut self, audio: AudioBuffers, time: DcpTime, frame_rate: i32) {
        self.queue.push_back((audio, time, frame_rate));
    }

    /// Copy up to `frames` frames into `out`, silencing any shortfall.
    /// Returns the time of the first populated frame, or None on a complete
    /// underrun.
    pub fn get(&mut self, out: &mut AudioBuffers, frames: usize) -> Option<DcpTime> {
        out.set_frames(frames);
        out.make_silent();

        let mut written = 0;
        let mut first_time = None;

        while written < frames {
            let Some((head, time, rate)) = self.queue.front() else {
                break;
            };
            if first_time.is_none() {
                first_time =
                    Some(*time + DcpTime::from_frames(self.head_offset as i64, f64::from(*rate)));
            }

            let available = head.frames() - self.head_offset;
            let n = available.min(frames - written);
            out.copy_from(head, n, self.head_offset, written);
            written += n;

            if n == available {
                self.queue.pop_front();
                self.head_offset = 0;
            } else {
                self.head_offset += n;
            }
        }

        first_time
    }

    /// Timestamp at the head of the queue.
    pub fn peek(&self) -> Option<DcpTime> {
        self.queue.front().map(|(_, t, rate)| {
            *t + DcpTime::from_frames(self.head_offset as i64, f64::from(*rate))
        })
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.head_offset = 0;
    }

    /// Total buffered frames.
    pub fn size(&self) -> usize {
        self.queue
            .iter()
            .map(|(b, _, _)| b.frames())
            .sum::<usize>()
            .saturating_sub(self.head_offset)
    }

    pub fn memory_used(&self) -> usize {
        self.queue.iter().map(|(b, _, _)| b.memory_used()).sum()
    }
}

impl Default for AudioRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One closed-caption cue awaiting a consumer.
#[derive(Clone, Debug)]
pub struct Caption {
    pub text: PlayerText,
    pub track: Option<String>,
    pub period: DcpTimePeriod,
}

#[derive(Default)]
pub struct TextRingBuffer {
    queue: VecDeque<Caption>,
}

impl TextRingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, caption: Caption) {
        self.queue.push_back(caption);
    }

    pub fn get(&mut self) -> Option<Caption> {
        self.queue.pop_front()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }
}
