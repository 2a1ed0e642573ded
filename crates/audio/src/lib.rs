pub mod buffers;
pub mod mapping;

pub use buffers::AudioBuffers;
pub use mapping::{remap, AudioMapping};
