use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use reelforge_state::content::{Content, ContentId, Source};
use reelforge_state::time::ContentTime;

use crate::decoder::{Decoder, VideoBuffer};
use crate::error::{MediaError, MediaResult};
use crate::image_proxy::ImageProxy;
use crate::types::Eyes;

/// Decoder for a directory of numbered frames or a single still image shown
/// for the length of the content.
///
/// A decoded still is cached here, which is why the Player re-uses these
/// decoder instances across piece rebuilds instead of recreating them.
pub struct ImageSequenceDecoder {
    content_id: ContentId,
    paths: Vec<PathBuf>,
    frame_rate: f64,
    length: i64,
    next: i64,
    still: Option<Arc<RgbaImage>>,
    video: VideoBuffer,
}

impl ImageSequenceDecoder {
    pub fn open(content: &Content) -> MediaResult<Self> {
        let video = content
            .video
            .as_ref()
            .ok_or_else(|| MediaError::unsupported("image content with no video part"))?;
        if content.paths.is_empty() {
            return Err(MediaError::unsupported("image content with no paths"));
        }
        Ok(Self {
            content_id: content.id,
            paths: content.paths.clone(),
            frame_rate: video.frame_rate,
            length: video.length,
            next: 0,
            still: None,
            video: VideoBuffer::new(),
        })
    }

    fn is_still(&self) -> bool {
        self.paths.len() == 1
    }

    fn still_image(&mut self) -> MediaResult<Arc<RgbaImage>> {
        if let Some(img) = &self.still {
            return Ok(img.clone());
        }
        let img = Arc::new(image::open(&self.paths[0])?.into_rgba8());
        self.still = Some(img.clone());
        Ok(img)
    }
}

impl Decoder for ImageSequenceDecoder {
    fn pass(&mut self) -> MediaResult<bool> {
        if self.next >= self.length {
            return Ok(true);
        }

        let frame = self.next;
        if self.is_still() {
            let img = self.still_image()?;
            self.video.emit(ImageProxy::Memory(img), Eyes::Both, frame);
        } else {
            // One file per frame; decoding is deferred so the prepare pool
            // can do it off the decode path.
            let index = (frame as usize).min(self.paths.len() - 1);
            self.video
                .emit(ImageProxy::File(self.paths[index].clone()), Eyes::Both, frame);
        }
        self.next += 1;
        Ok(false)
    }

    fn seek(&mut self, time: ContentTime, _accurate: bool) -> MediaResult<()> {
        self.next = time.frames_floor(self.frame_rate).max(0);
        self.video.clear();
        Ok(())
    }

    fn video(&mut self) -> Option<&mut VideoBuffer> {
        Some(&mut self.video)
    }

    fn reusable_for(&self, content: &Content) -> bool {
        matches!(content.source, Source::ImageSequence)
            && content.id == self.content_id
            && content.paths == self.paths
    }
}
