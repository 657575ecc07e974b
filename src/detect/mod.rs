//! Object detector boundary.
//!
//! The scanner treats detection as a black box: `ObjectDetector::predict`
//! takes a frame, a confidence threshold and a class allowlist and returns
//! pixel-space boxes. Backends:
//! - `stub`: detects nothing
//! - `blocks`: saturated-region detector for synthetic sources
//! - `tract`: YOLOv8-style ONNX model (feature: backend-tract)

mod backend;
mod backends;
pub mod classes;
mod registry;
mod result;

pub use backend::ObjectDetector;
pub use backends::{ColorBlockDetector, StubDetector};
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use registry::{available_backends, create_detector, DetectorSettings};
pub use result::{BoundingBox, RawDetection};
