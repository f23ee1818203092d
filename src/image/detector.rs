//! Face detection via the pretrained SeetaFace frontal cascade

use std::path::{Path, PathBuf};

use image::GrayImage;
use rustface::ImageData;
use tracing::debug;

use super::ImageError;

/// Tuning knobs for the sliding-window detector
#[derive(Debug, Clone)]
pub struct DetectionParams {
    /// Smallest face window considered, in pixels
    pub min_face_size: u32,
    /// Detections scoring below this are discarded
    pub score_thresh: f64,
    /// Shrink factor between pyramid levels
    pub pyramid_scale_factor: f32,
    /// Window step in both directions
    pub slide_window_step: u32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            min_face_size: 30,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: 4,
        }
    }
}

/// Face detector backed by a model file on disk
pub struct FaceDetector {
    model_path: PathBuf,
    params: DetectionParams,
}

impl FaceDetector {
    pub fn new<P: AsRef<Path>>(model_path: P, params: DetectionParams) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            params,
        }
    }

    /// Whether at least one face is present in the (preprocessed) image.
    ///
    /// The model is loaded from disk on every call; detection itself
    /// dominates the cost.
    pub fn has_face(&self, img: &GrayImage) -> Result<bool, ImageError> {
        let path = self
            .model_path
            .to_str()
            .ok_or_else(|| ImageError::Model("non-utf8 model path".into()))?;
        let mut detector =
            rustface::create_detector(path).map_err(|e| ImageError::Model(e.to_string()))?;

        detector.set_min_face_size(self.params.min_face_size);
        detector.set_score_thresh(self.params.score_thresh);
        detector.set_pyramid_scale_factor(self.params.pyramid_scale_factor);
        detector.set_slide_window_step(self.params.slide_window_step, self.params.slide_window_step);

        let mut image = ImageData::new(img.as_raw(), img.width(), img.height());
        let faces = detector.detect(&mut image);
        debug!("Detector found {} candidate face(s)", faces.len());
        Ok(!faces.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::preprocess;
    use image::Luma;

    /// Default model location; detection tests are skipped when the model
    /// has not been downloaded.
    fn model_path() -> Option<PathBuf> {
        let path = PathBuf::from("models/seeta_fd_frontal_v1.0.bin");
        path.exists().then_some(path)
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let detector = FaceDetector::new("models/does_not_exist.bin", DetectionParams::default());
        let img = GrayImage::new(64, 64);
        assert!(matches!(detector.has_face(&img), Err(ImageError::Model(_))));
    }

    #[test]
    fn test_blank_image_has_no_face() {
        let Some(path) = model_path() else { return };
        let detector = FaceDetector::new(path, DetectionParams::default());
        let img = GrayImage::new(200, 200);
        assert!(!detector.has_face(&img).unwrap());
    }

    #[test]
    fn test_noise_image_has_no_face() {
        let Some(path) = model_path() else { return };
        let detector = FaceDetector::new(path, DetectionParams::default());

        // Cheap deterministic noise
        let mut seed: u32 = 0x12345678;
        let img = GrayImage::from_fn(200, 200, |_, _| {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            Luma([(seed >> 24) as u8])
        });
        assert!(!detector.has_face(&img).unwrap());
    }

    #[test]
    fn test_sample_face_is_detected() {
        // Needs both the model and a real face photo dropped into testdata/
        let Some(path) = model_path() else { return };
        let Ok(bytes) = std::fs::read("testdata/face.jpg") else {
            return;
        };
        let detector = FaceDetector::new(path, DetectionParams::default());
        let prepared = preprocess::prepare(&bytes).unwrap();
        assert!(detector.has_face(&prepared).unwrap());
    }
}
