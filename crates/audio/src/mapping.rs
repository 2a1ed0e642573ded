use crate::buffers::AudioBuffers;

/// Gain matrix routing content channels to output (DCP) channels.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioMapping {
    gains: Vec<Vec<f32>>,
    input_channels: usize,
    output_channels: usize,
}

impl AudioMapping {
    /// All-zero mapping.
    pub fn new(input_channels: usize, output_channels: usize) -> Self {
        Self {
            gains: vec![vec![0.0; output_channels]; input_channels],
            input_channels,
            output_channels,
        }
    }

    /// Unity mapping of each input channel to the same-numbered output.
    pub fn identity(channels: usize) -> Self {
        let mut m = Self::new(channels, channels);
        for c in 0..channels {
            m.set(c, c, 1.0);
        }
        m
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn get(&self, input: usize, output: usize) -> f32 {
        self.gains[input][output]
    }

    pub fn set(&mut self, input: usize, output: usize, gain: f32) {
        self.gains[input][output] = gain;
    }
}

/// Route `input` into a buffer of `output_channels` channels, summing where
/// several inputs feed one output.  Input channels beyond the mapping's size
/// are dropped.
pub fn remap(input: &AudioBuffers, output_channels: usize, map: &AudioMapping) -> AudioBuffers {
    let mut out = AudioBuffers::new(output_channels, input.frames());

    for i in 0..input.channels().min(map.input_channels()) {
        for o in 0..output_channels.min(map.output_channels()) {
            let gain = map.get(i, o);
            if gain != 0.0 {
                let src = input.channel(i);
                let dst = out.channel_mut(o);
                for (d, s) in dst.iter_mut().zip(src) {
                    *d += s * gain;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_routes_and_sums() {
        // Two mono-ish inputs both sent to output channel 2.
        let mut input = AudioBuffers::new(2, 3);
        input.channel_mut(0).copy_from_slice(&[0.1, 0.2, 0.3]);
        input.channel_mut(1).copy_from_slice(&[0.3, 0.2, 0.1]);

        let mut map = AudioMapping::new(2, 6);
        map.set(0, 2, 1.0);
        map.set(1, 2, 1.0);

        let out = remap(&input, 6, &map);
        assert_eq!(out.channels(), 6);
        for c in [0, 1, 3, 4, 5] {
            assert!(out.channel(c).iter().all(|&s| s == 0.0));
        }
        for i in 0..3 {
            assert!((out.channel(2)[i] - 0.4).abs() < 1e-6);
        }
    }

    #[test]
    fn identity_passes_through() {
        let mut input = AudioBuffers::new(2, 2);
        input.channel_mut(1).copy_from_slice(&[0.5, 0.25]);
        let out = remap(&input, 2, &AudioMapping::identity(2));
        assert_eq!(out, input);
    }
}
