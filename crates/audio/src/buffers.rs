/// Planar float PCM: one `Vec<f32>` per channel, all the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBuffers {
    data: Vec<Vec<f32>>,
}

impl AudioBuffers {
    /// Allocate `channels` x `frames` of silence.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![vec![0.0; frames]; channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.data.len()
    }

    pub fn frames(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn channel(&self, c: usize) -> &[f32] {
        &self.data[c]
    }

    pub fn channel_mut(&mut self, c: usize) -> &mut [f32] {
        &mut self.data[c]
    }

    pub fn make_silent(&mut self) {
        for c in &mut self.data {
            c.fill(0.0);
        }
    }

    /// Apply a gain in decibels to every sample.
    pub fn apply_gain(&mut self, db: f64) {
        if db == 0.0 {
            return;
        }
        let linear = 10f32.powf(db as f32 / 20.0);
        for c in &mut self.data {
            for s in c {
                *s *= linear;
            }
        }
    }

    /// Sum `frames` frames of `other` (from `read_offset`) into ourselves at
    /// `write_offset`.  Channel counts must match; the copy is clipped to
    /// what both buffers actually hold.
    pub fn accumulate_frames(
        &mut self,
        other: &AudioBuffers,
        read_offset: usize,
        write_offset: usize,
        frames: usize,
    ) {
        assert_eq!(self.channels(), other.channels());
        let n = frames
            .min(other.frames().saturating_sub(read_offset))
            .min(self.frames().saturating_sub(write_offset));
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            for i in 0..n {
                dst[write_offset + i] += src[read_offset + i];
            }
        }
    }

    /// Sum one channel of `other` into one of our channels with a linear gain.
    pub fn accumulate_channel(&mut self, other: &AudioBuffers, from: usize, to: usize, gain: f32) {
        let n = self.frames().min(other.frames());
        let src = &other.data[from];
        let dst = &mut self.data[to];
        for i in 0..n {
            dst[i] += src[i] * gain;
        }
    }

    /// Overwrite `frames` frames at `write_offset` with data from `other`.
    pub fn copy_from(
        &mut self,
        other: &AudioBuffers,
        frames: usize,
        read_offset: usize,
        write_offset: usize,
    ) {
        assert_eq!(self.channels(), other.channels());
        let n = frames
            .min(other.frames().saturating_sub(read_offset))
            .min(self.frames().saturating_sub(write_offset));
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            dst[write_offset..write_offset + n].copy_from_slice(&src[read_offset..read_offset + n]);
        }
    }

    pub fn append(&mut self, other: &AudioBuffers) {
        assert_eq!(self.channels(), other.channels());
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            dst.extend_from_slice(src);
        }
    }

    pub fn trim_start(&mut self, frames: usize) {
        for c in &mut self.data {
            let n = frames.min(c.len());
            c.drain(..n);
        }
    }

    /// Grow (with silence) or shrink to exactly `frames` frames.
    pub fn set_frames(&mut self, frames: usize) {
        for c in &mut self.data {
            c.resize(frames, 0.0);
        }
    }

    pub fn memory_used(&self) -> usize {
        self.channels() * self.frames() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(channels: usize, frames: usize) -> AudioBuffers {
        let mut b = AudioBuffers::new(channels, frames);
        for c in 0..channels {
            for i in 0..frames {
                b.channel_mut(c)[i] = (c * frames + i) as f32;
            }
        }
        b
    }

    #[test]
    fn new_is_silent() {
        let b = AudioBuffers::new(6, 480);
        assert_eq!(b.channels(), 6);
        assert_eq!(b.frames(), 480);
        assert!(b.channel(3).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn gain_is_decibels() {
        let mut b = AudioBuffers::new(1, 4);
        b.channel_mut(0).fill(0.5);
        b.apply_gain(6.0);
        // +6 dB is very close to a factor of 2.
        assert!((b.channel(0)[0] - 0.5 * 1.9953).abs() < 1e-3);
    }

    #[test]
    fn accumulate_frames_sums_with_offsets() {
        let mut dst = AudioBuffers::new(1, 8);
        let src = ramp(1, 4); // 0 1 2 3
        dst.accumulate_frames(&src, 1, 2, 4);
        assert_eq!(dst.channel(0), &[0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        // Clipped at the end of dst.
        dst.accumulate_frames(&src, 0, 6, 4);
        assert_eq!(dst.channel(0)[6..], [0.0, 1.0]);
    }

    #[test]
    fn accumulate_channel_applies_gain() {
        let mut dst = AudioBuffers::new(2, 4);
        let src = ramp(1, 4);
        dst.accumulate_channel(&src, 0, 1, 0.5);
        assert_eq!(dst.channel(0), &[0.0; 4]);
        assert_eq!(dst.channel(1), &[0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn append_and_trim() {
        let mut a = ramp(1, 3);
        let b = ramp(1, 2);
        a.append(&b);
        assert_eq!(a.frames(), 5);
        a.trim_start(2);
        assert_eq!(a.channel(0), &[2.0, 0.0, 1.0]);
    }
}
