use image::{codecs::png::PngEncoder, ColorType, ImageBuffer, ImageEncoder, ImageError, Rgba};

/// Edge length of project thumbnails in pixels.
/// 專案縮圖邊長（像素）。
pub const THUMBNAIL_SIZE: u32 = 256;

const BLANK_COLOR: Rgba<u8> = Rgba([56, 56, 56, 255]);

/// Solid-colour PNG written when a project is created.
/// 建立專案時使用的單色縮圖。
pub fn blank_thumbnail_png() -> Result<Vec<u8>, ImageError> {
    let image = ImageBuffer::from_pixel(THUMBNAIL_SIZE, THUMBNAIL_SIZE, BLANK_COLOR);
    let mut data = Vec::new();
    PngEncoder::new(&mut data).write_image(
        image.as_raw(),
        THUMBNAIL_SIZE,
        THUMBNAIL_SIZE,
        ColorType::Rgba8,
    )?;
    Ok(data)
}
