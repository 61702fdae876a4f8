use image::RgbImage;

use crate::annotate::glyphs;
use crate::codec::data_uri::{encode_jpeg_data_uri, frame_to_image, CodecError};
use crate::detection::domain::detection::Detection;
use crate::measure::distance_model::{estimate_distance, reference_box};
use crate::measure::MeasureConfig;
use crate::shared::frame::Frame;

const DETECTION_COLOR: [u8; 3] = [0, 255, 0];
const REFERENCE_COLOR: [u8; 3] = [255, 0, 0];
const DISTANCE_COLOR: [u8; 3] = [0, 0, 255];

const LINE_THICKNESS: i32 = 2;
const LABEL_SCALE: i32 = 2;
/// Vertical offset of a label above (or below) its box.
const LABEL_MARGIN: i32 = 12;

/// Renders detection boxes, confidence labels, distance labels and the
/// measurement reference box onto frames, producing transport-ready
/// data-URI JPEG strings.
///
/// Always operates on a copy; the caller's frame is never mutated.
pub struct FrameAnnotator {
    config: MeasureConfig,
}

impl FrameAnnotator {
    pub fn new(config: MeasureConfig) -> Self {
        Self { config }
    }

    /// Draw all detections (and, while measuring with a calibrated focal
    /// length, the reference box and per-face distance labels) and encode
    /// the result as a JPEG data-URI at `quality`.
    pub fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
        focal_length: Option<f64>,
        measuring: bool,
        quality: u8,
    ) -> Result<String, CodecError> {
        let img = self.render(frame, detections, focal_length, measuring)?;
        encode_jpeg_data_uri(&img, quality)
    }

    fn render(
        &self,
        frame: &Frame,
        detections: &[Detection],
        focal_length: Option<f64>,
        measuring: bool,
    ) -> Result<RgbImage, CodecError> {
        let mut img = frame_to_image(frame)?;
        let show_distance = measuring && focal_length.is_some();

        if show_distance {
            if let Some(rb) = reference_box(focal_length, &self.config) {
                let x = img.width() as i32 / 2 - rb.width / 2;
                let y = img.height() as i32 / 2 - rb.height / 2;
                draw_rect(&mut img, x, y, rb.width, rb.height, REFERENCE_COLOR);
                glyphs::draw_text(
                    &mut img,
                    x,
                    y - LABEL_MARGIN,
                    &format_meters(self.config.target_distance),
                    LABEL_SCALE,
                    REFERENCE_COLOR,
                );
            }
        }

        for det in detections {
            draw_rect(&mut img, det.x, det.y, det.width, det.height, DETECTION_COLOR);
            glyphs::draw_text(
                &mut img,
                det.x,
                det.y - LABEL_MARGIN,
                &format!("{:.2}", det.confidence),
                LABEL_SCALE,
                DETECTION_COLOR,
            );

            if show_distance {
                if let Some(distance) =
                    estimate_distance(det.width as f64, focal_length, self.config.known_face_width)
                {
                    glyphs::draw_text(
                        &mut img,
                        det.x,
                        det.y + det.height + LABEL_MARGIN / 2,
                        &format_meters(distance),
                        LABEL_SCALE,
                        DISTANCE_COLOR,
                    );
                }
            }
        }

        Ok(img)
    }
}

/// Hollow rectangle with a fixed line thickness, clipped at image edges.
fn draw_rect(img: &mut RgbImage, x: i32, y: i32, width: i32, height: i32, color: [u8; 3]) {
    for inset in 0..LINE_THICKNESS {
        draw_outline(
            img,
            x + inset,
            y + inset,
            width - 2 * inset,
            height - 2 * inset,
            color,
        );
    }
}

fn draw_outline(img: &mut RgbImage, x: i32, y: i32, width: i32, height: i32, color: [u8; 3]) {
    if width <= 0 || height <= 0 {
        return;
    }
    let x2 = x + width - 1;
    let y2 = y + height - 1;

    for px in x..=x2 {
        put_pixel(img, px, y, color);
        put_pixel(img, px, y2, color);
    }
    for py in y..=y2 {
        put_pixel(img, x, py, color);
        put_pixel(img, x2, py, color);
    }
}

fn put_pixel(img: &mut RgbImage, x: i32, y: i32, color: [u8; 3]) {
    if x >= 0 && y >= 0 && x < img.width() as i32 && y < img.height() as i32 {
        img.put_pixel(x as u32, y as u32, image::Rgb(color));
    }
}

/// "4m" for whole meters, "2.8m" otherwise.
fn format_meters(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}m")
    } else {
        format!("{value}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::distance_model::calibrate;

    fn make_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![128u8; (width * height * 3) as usize], width, height, 3)
    }

    fn detection(x: i32, y: i32, width: i32, height: i32, confidence: f64) -> Detection {
        Detection {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    fn count_colored(img: &RgbImage, color: [u8; 3]) -> usize {
        img.pixels().filter(|p| p.0 == color).count()
    }

    fn annotator() -> FrameAnnotator {
        FrameAnnotator::new(MeasureConfig::default())
    }

    fn calibrated_focal() -> Option<f64> {
        Some(calibrate(200.0, 0.7, 0.15).unwrap())
    }

    #[test]
    fn test_annotate_returns_jpeg_data_uri() {
        let frame = make_frame(64, 48);
        let uri = annotator()
            .annotate(&frame, &[], None, false, 60)
            .unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_annotate_never_mutates_input() {
        let frame = make_frame(64, 48);
        let before = frame.data().to_vec();
        annotator()
            .annotate(
                &frame,
                &[detection(10, 10, 20, 20, 0.9)],
                calibrated_focal(),
                true,
                60,
            )
            .unwrap();
        assert_eq!(frame.data(), &before[..]);
    }

    #[test]
    fn test_detection_box_drawn() {
        let frame = make_frame(64, 48);
        let img = annotator()
            .render(&frame, &[detection(10, 10, 20, 20, 0.9)], None, false)
            .unwrap();
        assert_eq!(img.get_pixel(10, 10).0, DETECTION_COLOR);
        assert_eq!(img.get_pixel(29, 29).0, DETECTION_COLOR);
        // Interior stays untouched
        assert_eq!(img.get_pixel(20, 20).0, [128, 128, 128]);
    }

    #[test]
    fn test_reference_box_only_while_measuring_with_focal() {
        let frame = make_frame(160, 120);
        let a = annotator();

        let idle = a.render(&frame, &[], calibrated_focal(), false).unwrap();
        assert_eq!(count_colored(&idle, REFERENCE_COLOR), 0);

        let uncalibrated = a.render(&frame, &[], None, true).unwrap();
        assert_eq!(count_colored(&uncalibrated, REFERENCE_COLOR), 0);

        let measuring = a.render(&frame, &[], calibrated_focal(), true).unwrap();
        assert!(count_colored(&measuring, REFERENCE_COLOR) > 0);
    }

    #[test]
    fn test_reference_box_centered() {
        let frame = make_frame(160, 120);
        let img = annotator()
            .render(&frame, &[], calibrated_focal(), true)
            .unwrap();
        // focal 933.33 -> width 35, height 52; centered box corner at
        // (80 - 17, 60 - 26) = (63, 34)
        assert_eq!(img.get_pixel(63, 34).0, REFERENCE_COLOR);
    }

    #[test]
    fn test_distance_label_only_while_measuring() {
        let frame = make_frame(160, 120);
        let dets = [detection(40, 30, 50, 50, 0.9)];
        let a = annotator();

        let idle = a.render(&frame, &dets, calibrated_focal(), false).unwrap();
        assert_eq!(count_colored(&idle, DISTANCE_COLOR), 0);

        let measuring = a.render(&frame, &dets, calibrated_focal(), true).unwrap();
        assert!(count_colored(&measuring, DISTANCE_COLOR) > 0);
    }

    #[test]
    fn test_out_of_frame_detection_does_not_panic() {
        let frame = make_frame(64, 48);
        annotator()
            .render(
                &frame,
                &[detection(60, 40, 500, 500, 0.9)],
                calibrated_focal(),
                true,
            )
            .unwrap();
    }

    #[test]
    fn test_format_meters() {
        assert_eq!(format_meters(4.0), "4m");
        assert_eq!(format_meters(2.8), "2.8m");
        assert_eq!(format_meters(0.25), "0.25m");
    }
}
