use crate::types::FaceBox;
use anyhow::{Context, Result};
use image::{imageops::FilterType, ImageBuffer, Rgb};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::debug;

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;
const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;
const NMS_IOU: f32 = 0.3;

/// UltraFace (RFB-320) face detector.
pub struct FaceDetector {
    session: Session,
    anchors: Vec<(f32, f32, f32, f32)>, // cx, cy, w, h
    score_threshold: f32,
}

impl FaceDetector {
    pub fn new(model_path: &str, score_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .with_execution_providers([
                ort::execution_providers::CoreMLExecutionProvider::default().build(),
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load face detector {}", model_path))?;

        let anchors = generate_anchors(INPUT_WIDTH as usize, INPUT_HEIGHT as usize);
        Ok(Self {
            session,
            anchors,
            score_threshold,
        })
    }

    /// Every face above the score threshold, in frame pixels, after suppression.
    pub fn detect(&mut self, frame: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> Result<Vec<FaceBox>> {
        let resized = image::imageops::resize(frame, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

        // NCHW [1, 3, 240, 320], normalized (pixel - 127) / 128
        let plane = (INPUT_WIDTH * INPUT_HEIGHT) as usize;
        let mut input_data = vec![0.0f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                input_data[c * plane + i] = (pixel[c] as f32 - 127.0) / 128.0;
            }
        }

        let input_tensor = Tensor::from_array((vec![1, 3, 240, 320], input_data))?;
        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let (_scores_shape, scores_data) = outputs["scores"].try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes_data) = outputs["boxes"].try_extract_tensor::<f32>()?;

        let candidates = post_process(&self.anchors, scores_data, boxes_data, self.score_threshold);
        let kept = non_max_suppression(candidates, NMS_IOU);
        debug!("Detector kept {} face(s)", kept.len());

        let sx = frame.width() as f32 / INPUT_WIDTH as f32;
        let sy = frame.height() as f32 / INPUT_HEIGHT as f32;
        Ok(kept
            .into_iter()
            .map(|b| FaceBox::new(b.x * sx, b.y * sy, b.width * sx, b.height * sy, b.score))
            .collect())
    }
}

/// Decode every anchor whose face score passes `threshold`, in input pixels.
fn post_process(
    anchors: &[(f32, f32, f32, f32)],
    scores_raw: &[f32],
    boxes_raw: &[f32],
    threshold: f32,
) -> Vec<FaceBox> {
    let usable = anchors
        .len()
        .min(scores_raw.len() / 2)
        .min(boxes_raw.len() / 4);

    (0..usable)
        .filter_map(|i| {
            let score = scores_raw[i * 2 + 1];
            if score <= threshold {
                return None;
            }
            let (ax, ay, aw, ah) = anchors[i];
            let cx = boxes_raw[i * 4] * CENTER_VARIANCE * aw + ax;
            let cy = boxes_raw[i * 4 + 1] * CENTER_VARIANCE * ah + ay;
            let w = (boxes_raw[i * 4 + 2] * SIZE_VARIANCE).exp() * aw;
            let h = (boxes_raw[i * 4 + 3] * SIZE_VARIANCE).exp() * ah;

            Some(FaceBox::new(
                (cx - w / 2.0) * INPUT_WIDTH as f32,
                (cy - h / 2.0) * INPUT_HEIGHT as f32,
                w * INPUT_WIDTH as f32,
                h * INPUT_HEIGHT as f32,
                score,
            ))
        })
        .collect()
}

/// Greedy NMS: highest score first, dropping boxes that overlap a kept one.
pub fn non_max_suppression(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    // UltraFace configs
    let shrinkage_list = [8, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];
    let mut anchors = Vec::new();

    let w = width as f32;
    let h = height as f32;

    for (i, &shrinkage) in shrinkage_list.iter().enumerate() {
        let s = shrinkage as f32;
        let feature_h = (h / s).ceil() as usize;
        let feature_w = (w / s).ceil() as usize;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * s + s / 2.0) / w;
                let cy = (v as f32 * s + s / 2.0) / h;
                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count_matches_ultraface_320() {
        assert_eq!(generate_anchors(320, 240).len(), 4420);
    }

    #[test]
    fn nms_keeps_separate_faces() {
        let boxes = vec![
            FaceBox::new(10.0, 10.0, 50.0, 50.0, 0.80),
            FaceBox::new(12.0, 11.0, 50.0, 50.0, 0.95),
            FaceBox::new(200.0, 20.0, 50.0, 50.0, 0.90),
        ];
        let kept = non_max_suppression(boxes, NMS_IOU);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.95);
        assert_eq!(kept[1].score, 0.90);
    }

    #[test]
    fn post_process_filters_by_score() {
        let anchors = vec![(0.5, 0.5, 0.1, 0.1), (0.25, 0.25, 0.1, 0.1)];
        let scores = vec![0.1, 0.9, 0.8, 0.2];
        let boxes = vec![0.0; 8];
        let faces = post_process(&anchors, &scores, &boxes, 0.7);
        assert_eq!(faces.len(), 1);
        let f = faces[0];
        assert!((f.x - 144.0).abs() < 1e-3);
        assert!((f.width - 32.0).abs() < 1e-3);
    }
}
