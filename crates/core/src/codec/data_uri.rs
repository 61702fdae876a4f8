//! Conversion between transport payloads and frames.
//!
//! Clients send raster images as data-URI strings
//! (`data:image/...;base64,<payload>`); only the payload after the last
//! comma is decoded. Annotated frames go back out the same way, as JPEG.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid image payload: {0}")]
    Image(#[from] image::ImageError),
    #[error("frame buffer does not match its dimensions")]
    MalformedFrame,
}

/// Decode a data-URI (or bare base64) image payload into an RGB frame.
pub fn decode_data_uri(payload: &str) -> Result<Frame, CodecError> {
    let encoded = payload.rsplit(',').next().unwrap_or(payload);
    let bytes = STANDARD.decode(encoded.trim())?;
    let img = image::load_from_memory(&bytes)?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::new(rgb.into_raw(), width, height, 3))
}

/// Encode an image as a JPEG data-URI at the given quality (1-100).
pub fn encode_jpeg_data_uri(img: &RgbImage, quality: u8) -> Result<String, CodecError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buf)))
}

/// View a frame as an owned `RgbImage` for drawing or encoding.
pub fn frame_to_image(frame: &Frame) -> Result<RgbImage, CodecError> {
    RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or(CodecError::MalformedFrame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_data_uri(width: u32, height: u32) -> String {
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(buf.get_ref()))
    }

    #[test]
    fn test_decode_data_uri_roundtrip() {
        let uri = png_data_uri(20, 10);
        let frame = decode_data_uri(&uri).unwrap();
        assert_eq!(frame.width(), 20);
        assert_eq!(frame.height(), 10);
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_decode_bare_base64_payload() {
        // Clients may omit the data-URI prefix entirely
        let uri = png_data_uri(4, 4);
        let bare = uri.rsplit(',').next().unwrap().to_string();
        let frame = decode_data_uri(&bare).unwrap();
        assert_eq!(frame.width(), 4);
    }

    #[test]
    fn test_decode_empty_payload_is_error() {
        assert!(decode_data_uri("data:image/jpeg;base64,").is_err());
    }

    #[test]
    fn test_decode_non_base64_is_error() {
        assert!(decode_data_uri("data:image/jpeg;base64,!!!not-base64!!!").is_err());
    }

    #[test]
    fn test_decode_base64_non_image_is_error() {
        let payload = STANDARD.encode(b"definitely not an image");
        assert!(decode_data_uri(&payload).is_err());
    }

    #[test]
    fn test_encode_produces_jpeg_data_uri() {
        let img = RgbImage::new(16, 16);
        let uri = encode_jpeg_data_uri(&img, 60).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        // The payload itself must decode back into an image
        let frame = decode_data_uri(&uri).unwrap();
        assert_eq!(frame.width(), 16);
        assert_eq!(frame.height(), 16);
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let mut img = RgbImage::new(64, 64);
        // Noise compresses poorly, making the quality difference visible
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x * 37 % 256) as u8, (y * 91 % 256) as u8, ((x + y) % 256) as u8]);
        }
        let high = encode_jpeg_data_uri(&img, 90).unwrap();
        let low = encode_jpeg_data_uri(&img, 20).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_frame_to_image_roundtrip() {
        let frame = Frame::new(vec![7u8; 2 * 3 * 3], 2, 3, 3);
        let img = frame_to_image(&frame).unwrap();
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(0, 0).0, [7, 7, 7]);
    }
}
