//! Image module for photo preprocessing, face detection and storage

pub mod detector;
pub mod preprocess;
pub mod store;

pub use detector::{DetectionParams, FaceDetector};
pub use store::ImageStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Face model error: {0}")]
    Model(String),
    #[error("Lock error")]
    LockError,
}
