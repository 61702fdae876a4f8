use image::imageops::FilterType;

use crate::codec::data_uri::{frame_to_image, CodecError};
use crate::shared::frame::Frame;

/// Downscale a frame so its width does not exceed `max_width`, preserving
/// aspect ratio. Height is truncated to an integer. Frames at or below the
/// limit are returned unchanged; processing cost is bounded, never the
/// other way (no upscaling).
pub fn downscale_to_width(frame: &Frame, max_width: u32) -> Result<Frame, CodecError> {
    if frame.width() <= max_width {
        return Ok(frame.clone());
    }
    let scale = max_width as f64 / frame.width() as f64;
    let new_height = ((frame.height() as f64 * scale) as u32).max(1);

    let img = frame_to_image(frame)?;
    let resized = image::imageops::resize(&img, max_width, new_height, FilterType::Triangle);
    Ok(Frame::new(resized.into_raw(), max_width, new_height, 3))
}
