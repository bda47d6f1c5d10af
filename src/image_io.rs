use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// An image normalized for embedding in the PDF: baseline JPEG plus its
/// pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode any supported raster format and re-encode it as RGB JPEG.
///
/// # Errors
///
/// Returns Err if the bytes are not a decodable image or encoding fails.
pub fn to_embedded_jpeg(bytes: &[u8]) -> std::io::Result<EmbeddedImage> {
    let img = image::load_from_memory(bytes).map_err(err_other)?;
    let (width, height) = img.dimensions();

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(err_other)?;

    Ok(EmbeddedImage {
        jpeg,
        width,
        height,
    })
}

fn err_other<E: std::fmt::Display>(e: E) -> std::io::Error {
    std::io::Error::other(e.to_string())
}
