use anyhow::{Context, Result};
use image::{imageops::FilterType, ImageBuffer, Rgb};
use ort::session::{builder::GraphOptimizationLevel, Session};

use crate::types::{FaceBox, Point};

pub const MESH_POINTS: usize = 468;
const MESH_INPUT: u32 = 192;

/// 468-point face mesh run on a padded crop around each detected face.
pub struct FaceMesh {
    session: Session,
}

/// Face box grown by a quarter and clipped to the frame, as `(x, y, w, h)`.
pub fn padded_crop(face: &FaceBox, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
    let pad_w = face.width * 0.25;
    let pad_h = face.height * 0.25;
    let x = (face.x - pad_w / 2.0).max(0.0);
    let y = (face.y - pad_h / 2.0).max(0.0);
    let w = (face.width + pad_w).min(frame_width as f32 - x).max(1.0);
    let h = (face.height + pad_h).min(frame_height as f32 - y).max(1.0);
    (x as u32, y as u32, w as u32, h as u32)
}

impl FaceMesh {
    pub fn new(model_path: &str) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .with_execution_providers([
                ort::execution_providers::CoreMLExecutionProvider::default().build(),
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load face mesh {}", model_path))?;
        Ok(Self { session })
    }

    /// Mesh points for one face, in frame pixels.
    pub fn landmarks(&mut self, frame: &ImageBuffer<Rgb<u8>, Vec<u8>>, face: &FaceBox) -> Result<Vec<Point>> {
        let (x, y, w, h) = padded_crop(face, frame.width(), frame.height());
        let crop = image::imageops::crop_imm(frame, x, y, w, h).to_image();
        let resized = image::imageops::resize(&crop, MESH_INPUT, MESH_INPUT, FilterType::Triangle);

        // NHWC, scaled to [-1, 1]
        let mut input_data = Vec::with_capacity((MESH_INPUT * MESH_INPUT * 3) as usize);
        for pixel in resized.pixels() {
            for c in 0..3 {
                input_data.push((pixel[c] as f32 / 127.5) - 1.0);
            }
        }

        let input = ort::value::Tensor::from_array((vec![1, 192, 192, 3], input_data))?;
        let outputs = self.session.run(ort::inputs![input])?;
        let (_shape, raw) = outputs[0].try_extract_tensor::<f32>()?;

        if raw.len() < MESH_POINTS * 3 {
            anyhow::bail!("Face mesh returned {} values, expected {}", raw.len(), MESH_POINTS * 3);
        }

        let scale_x = w as f32 / MESH_INPUT as f32;
        let scale_y = h as f32 / MESH_INPUT as f32;
        Ok(raw
            .chunks_exact(3)
            .take(MESH_POINTS)
            .map(|p| {
                Point::new(
                    (x as f32 + p[0] * scale_x).round() as i32,
                    (y as f32 + p[1] * scale_y).round() as i32,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_is_padded_and_clipped() {
        let face = FaceBox::new(100.0, 100.0, 80.0, 80.0, 0.9);
        assert_eq!(padded_crop(&face, 640, 480), (90, 90, 100, 100));

        let edge = FaceBox::new(600.0, 5.0, 80.0, 80.0, 0.9);
        let (x, y, w, _) = padded_crop(&edge, 640, 480);
        assert_eq!((x, y), (590, 0));
        assert_eq!(x + w, 640);
    }
}
