use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use reelforge_state::{Crop, Position, Size};

pub fn black(size: Size) -> RgbaImage {
    RgbaImage::from_pixel(size.width.max(1), size.height.max(1), Rgba([0, 0, 0, 255]))
}

/// Crop then scale to `target`.  `fast` trades filter quality for speed.
pub fn crop_scale(image: &RgbaImage, crop: Crop, target: Size, fast: bool) -> RgbaImage {
    let cropped_size = crop.apply_to(Size::new(image.width(), image.height()));
    let source: RgbaImage = if crop.is_zero() {
        image.clone()
    } else {
        imageops::crop_imm(
            image,
            crop.left,
            crop.top,
            cropped_size.width.max(1),
            cropped_size.height.max(1),
        )
        .to_image()
    };

    if cropped_size == target {
        return source;
    }
    let filter = if fast {
        FilterType::Nearest
    } else {
        FilterType::CatmullRom
    };
    imageops::resize(&source, target.width.max(1), target.height.max(1), filter)
}

/// Draw `image` centred on `canvas`.
pub fn composite_centre(canvas: &mut RgbaImage, image: &RgbaImage) {
    let x = (i64::from(canvas.width()) - i64::from(image.width())) / 2;
    let y = (i64::from(canvas.height()) - i64::from(image.height())) / 2;
    imageops::overlay(canvas, image, x, y);
}

/// Draw `image` on `canvas` at `position`, clipped to the canvas.
pub fn composite_at(canvas: &mut RgbaImage, image: &RgbaImage, position: Position) {
    imageops::overlay(canvas, image, i64::from(position.x), i64::from(position.y));
}
