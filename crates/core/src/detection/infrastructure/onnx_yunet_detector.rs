/// YuNet face detector using ONNX Runtime via `ort`.
///
/// An anchor-free detector producing bounding boxes with confidence scores.
/// Landmarks emitted by the model are ignored; distance measurement only
/// needs the box geometry.
use std::path::Path;

use ndarray::{Array2, Axis, Ix2};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

/// YuNet model input resolution (both axes).
const INPUT_SIZE: u32 = 640;

/// Default per-prior score threshold.
///
/// Deliberately lower than the pipeline's acceptance threshold so that
/// low-confidence faces still reach the session and get a structured
/// "confidence too low" response instead of vanishing.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.1;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Feature-map strides of the three output levels.
const STRIDES: [u32; 3] = [8, 16, 32];

/// Number of model outputs: cls / obj / bbox / kps, one per stride level.
const NUM_OUTPUTS: usize = 12;

/// YuNet face detector backed by an ONNX Runtime session.
pub struct OnnxYunetDetector {
    session: ort::session::Session,
    score_threshold: f64,
}

impl OnnxYunetDetector {
    /// Load a YuNet ONNX model.
    pub fn new(model_path: &Path, score_threshold: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        Ok(Self {
            session,
            score_threshold,
        })
    }
}

impl FaceDetector for OnnxYunetDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let fw = frame.width();
        let fh = frame.height();

        // 1. Preprocess: resample to 640x640, raw BGR floats, NCHW.
        //    YuNet was trained on BGR input without normalization.
        let input_tensor = preprocess(frame, INPUT_SIZE);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // YuNet emits four tensors per stride level, grouped by kind:
        // cls_8/16/32, obj_8/16/32, bbox_8/16/32, kps_8/16/32.
        if outputs.len() < NUM_OUTPUTS {
            return Err(format!(
                "YuNet model expected {NUM_OUTPUTS} outputs, got {}",
                outputs.len()
            )
            .into());
        }

        // 3. Decode priors per level + filter by score
        let mut raw_dets = Vec::new();
        for (level, &stride) in STRIDES.iter().enumerate() {
            let cls = extract_2d(&outputs[level])?;
            let obj = extract_2d(&outputs[3 + level])?;
            let boxes = extract_2d(&outputs[6 + level])?;

            if cls.ncols() < 1 || obj.ncols() < 1 || boxes.ncols() < 4 {
                return Err(format!(
                    "YuNet stride-{stride} output malformed: cls cols={}, obj cols={}, bbox cols={}",
                    cls.ncols(),
                    obj.ncols(),
                    boxes.ncols()
                )
                .into());
            }

            let feat_w = (INPUT_SIZE / stride) as usize;
            let expected = feat_w * feat_w;
            let count = cls.nrows().min(obj.nrows()).min(boxes.nrows());
            if count != expected {
                return Err(format!(
                    "YuNet stride-{stride} output malformed: expected {expected} priors, got {count}"
                )
                .into());
            }

            for i in 0..count {
                let score = (cls[[i, 0]] * obj[[i, 0]]) as f64;
                if score < self.score_threshold {
                    continue;
                }

                let (cx, cy) = prior_center(i, feat_w, stride);
                let s = stride as f32;

                // Box deltas are relative to the prior center; sizes are
                // log-encoded
                let bx = boxes[[i, 0]] * s + cx;
                let by = boxes[[i, 1]] * s + cy;
                let bw = boxes[[i, 2]].exp() * s;
                let bh = boxes[[i, 3]].exp() * s;

                raw_dets.push(RawDet {
                    x1: (bx - bw / 2.0) as f64,
                    y1: (by - bh / 2.0) as f64,
                    x2: (bx + bw / 2.0) as f64,
                    y2: (by + bh / 2.0) as f64,
                    score,
                });
            }
        }

        // 4. NMS
        let filtered = nms(&mut raw_dets, NMS_IOU_THRESH);

        // 5. Scale back to frame coordinates and clamp
        let scale_x = fw as f64 / INPUT_SIZE as f64;
        let scale_y = fh as f64 / INPUT_SIZE as f64;
        let detections = filtered
            .iter()
            .map(|d| {
                let x = ((d.x1 * scale_x).max(0.0)) as i32;
                let y = ((d.y1 * scale_y).max(0.0)) as i32;
                let w = (((d.x2 - d.x1) * scale_x) as i32).min(fw as i32 - x).max(0);
                let h = (((d.y2 - d.y1) * scale_y) as i32).min(fh as i32 - y).max(0);
                Detection {
                    x,
                    y,
                    width: w,
                    height: h,
                    confidence: d.score.clamp(0.0, 1.0),
                }
            })
            .collect();

        Ok(detections)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resample the frame to `size × size` raw BGR float32 NCHW.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            // RGB frame -> BGR channel order
            tensor[[0, 0, y, x]] = src[[src_y, src_x, 2]] as f32;
            tensor[[0, 1, y, x]] = src[[src_y, src_x, 1]] as f32;
            tensor[[0, 2, y, x]] = src[[src_y, src_x, 0]] as f32;
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

/// Prior center in input-image pixels for flat prior index `i`.
fn prior_center(i: usize, feat_w: usize, stride: u32) -> (f32, f32) {
    let cx = (i % feat_w) as f32 * stride as f32;
    let cy = (i / feat_w) as f32 * stride as f32;
    (cx, cy)
}

/// View a model output as `[priors, cols]`, tolerating a leading batch axis.
fn extract_2d(value: &ort::value::Value) -> Result<Array2<f32>, Box<dyn std::error::Error>> {
    let arr = value.try_extract_array::<f32>()?;
    match arr.ndim() {
        2 => Ok(arr.into_dimensionality::<Ix2>()?.to_owned()),
        3 if arr.shape()[0] == 1 => Ok(arr
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()?
            .to_owned()),
        _ => Err(format!("expected 2D output, got shape {:?}", arr.shape()).into()),
    }
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDet {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
}

fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            if bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
