use std::{io::Cursor, path::Path};

use glidecheck_types::{vision::Frame, Result};
use image::{ImageBuffer, ImageFormat, RgbaImage};

use crate::media_error;

/// Decodes an encoded image (PNG or JPEG) into an RGBA frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    let img = image::load_from_memory(bytes)
        .map_err(|err| media_error(format!("image decode failed: {err}")))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Frame::from_rgba(width, height, rgba.into_raw()))
}

pub fn load_frame(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .map_err(|err| media_error(format!("failed to open {}: {err}", path.display())))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Frame::from_rgba(width, height, rgba.into_raw()))
}

pub(crate) fn to_image(frame: &Frame) -> Result<RgbaImage> {
    ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
        media_error(format!(
            "pixel buffer of {} bytes does not fit {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        ))
    })
}

pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    to_image(frame)?
        .save_with_format(path, ImageFormat::Png)
        .map_err(|err| media_error(format!("failed to write {}: {err}", path.display())))
}

pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    to_image(frame)?
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| media_error(format!("png encode failed: {err}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_bytes_decode_back_to_same_pixels() {
        let data: Vec<u8> = (0..2 * 3 * 4).map(|v| v as u8).collect();
        let frame = Frame::from_rgba(2, 3, data);
        let bytes = encode_png(&frame).expect("encode");
        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = decode_frame(&bytes).expect("decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn malformed_buffer_is_rejected() {
        let frame = Frame::from_rgba(4, 4, vec![0; 3]);
        assert!(encode_png(&frame).is_err());
        assert!(decode_frame(b"not an image").is_err());
    }
}
