use std::sync::{Arc, Mutex};

use image::RgbaImage;
use reelforge_media::{Eyes, ImageProxy};
use reelforge_state::{Crop, DcpTime, Position, Size};

use crate::error::PlaybackResult;
use crate::image_ops;

/// How consumers want final pixels produced.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    /// Pad row starts for alignment-sensitive consumers.
    pub aligned: bool,
    /// Trade scaling quality for speed.
    pub fast: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            aligned: false,
            fast: false,
        }
    }
}

/// A pre-rendered overlay (a subtitle) in container coordinates.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub image: Arc<RgbaImage>,
    pub position: Position,
}

/// A decoded frame plus everything needed to produce its final pixels.
///
/// Producing those pixels (decode, crop, scale, composite) is deferred:
/// `prepare` does the work ahead of time on the Butler's pool so that a later
/// `image` is a cheap clone.
#[derive(Debug)]
pub struct PlayerVideo {
    proxy: ImageProxy,
    time: DcpTime,
    eyes: Eyes,
    crop: Crop,
    /// Size of the content image inside the container.
    inter_size: Size,
    /// Container (output) size.
    out_size: Size,
    colour_conversion: Option<String>,
    overlays: Vec<Overlay>,
    prepared: Mutex<Option<Arc<RgbaImage>>>,
}

impl PlayerVideo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proxy: ImageProxy,
        time: DcpTime,
        eyes: Eyes,
        crop: Crop,
        inter_size: Size,
        out_size: Size,
        colour_conversion: Option<String>,
        overlays: Vec<Overlay>,
    ) -> Self {
        Self {
            proxy,
            time,
            eyes,
            crop,
            inter_size,
            out_size,
            colour_conversion,
            overlays,
            prepared: Mutex::new(None),
        }
    }

    pub fn time(&self) -> DcpTime {
        self.time
    }

    pub fn eyes(&self) -> Eyes {
        self.eyes
    }

    pub fn inter_size(&self) -> Size {
        self.inter_size
    }

    pub fn out_size(&self) -> Size {
        self.out_size
    }

    pub fn colour_conversion(&self) -> Option<&str> {
        self.colour_conversion.as_deref()
    }

    /// Do the expensive work now so `image` is cheap later.  Safe to call
    /// from several threads; the first one wins.
    pub fn prepare(&self, projection: Projection) -> PlaybackResult<()> {
        self.image(projection).map(|_| ())
    }

    /// Final composited pixels at container size.
    pub fn image(&self, projection: Projection) -> PlaybackResult<Arc<RgbaImage>> {
        if let Some(img) = self.prepared.lock().unwrap().clone() {
            return Ok(img);
        }

        let decoded = self.proxy.decode()?;
        let scaled = image_ops::crop_scale(&decoded, self.crop, self.inter_size, projection.fast);

        let mut canvas = image_ops::black(self.out_size);
        image_ops::composite_centre(&mut canvas, &scaled);
        for overlay in &self.overlays {
            image_ops::composite_at(&mut canvas, &overlay.image, overlay.position);
        }

        let img = Arc::new(canvas);
        let mut prepared = self.prepared.lock().unwrap();
        if prepared.is_none() {
            *prepared = Some(img.clone());
        }
        Ok(prepared.clone().unwrap_or(img))
    }

    /// Bytes currently held for this frame.
    pub fn memory_used(&self) -> usize {
        let prepared = self
            .prepared
            .lock()
            .unwrap()
            .as_ref()
            .map(|i| i.as_raw().len())
            .unwrap_or(0);
        self.proxy.memory_used()
            + prepared
            + self
                .overlays
                .iter()
                .map(|o| o.image.as_raw().len())
                .sum::<usize>()
    }
}
