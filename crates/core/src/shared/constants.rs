pub const YUNET_MODEL_NAME: &str = "face_detection_yunet_2023mar.onnx";
pub const YUNET_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/face_detection_yunet/face_detection_yunet_2023mar.onnx";

/// Frames wider than this are downscaled before detection.
pub const MAX_PROCESS_WIDTH: u32 = 640;

/// JPEG quality for frames carrying an accepted detection.
pub const ANNOTATED_JPEG_QUALITY: u8 = 60;

/// Reduced JPEG quality for frames with no accepted detection.
pub const FALLBACK_JPEG_QUALITY: u8 = 40;
