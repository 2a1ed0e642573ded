use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use reelforge_state::Size;

use crate::error::{MediaError, MediaResult};

/// Pixels that may not have been decoded yet.
///
/// Decoding an `Encoded` or `File` proxy is the expensive step which the
/// Butler's prepare pool runs ahead of the consumer.
#[derive(Clone, Debug)]
pub enum ImageProxy {
    /// Already-decoded RGBA pixels.
    Memory(Arc<RgbaImage>),
    /// A compressed image held in memory (e.g. a PNG pulled out of a
    /// container) which still needs decoding.
    Encoded(Arc<Vec<u8>>),
    /// An image file on disk which still needs loading and decoding.
    File(PathBuf),
}

impl ImageProxy {
    pub fn decode(&self) -> MediaResult<Arc<RgbaImage>> {
        match self {
            ImageProxy::Memory(img) => Ok(img.clone()),
            ImageProxy::Encoded(bytes) => {
                let img = image::load_from_memory(bytes)?;
                Ok(Arc::new(img.into_rgba8()))
            }
            ImageProxy::File(path) => {
                let img = image::open(path)?;
                Ok(Arc::new(img.into_rgba8()))
            }
        }
    }

    /// Pixel size, if it is knowable without decoding.
    pub fn size(&self) -> Option<Size> {
        match self {
            ImageProxy::Memory(img) => Some(Size::new(img.width(), img.height())),
            _ => None,
        }
    }

    /// Approximate bytes held in memory right now.
    pub fn memory_used(&self) -> usize {
        match self {
            ImageProxy::Memory(img) => img.as_raw().len(),
            ImageProxy::Encoded(bytes) => bytes.len(),
            ImageProxy::File(_) => 0,
        }
    }
}
