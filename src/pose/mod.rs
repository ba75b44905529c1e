pub mod decoder;
#[cfg(feature = "desktop")]
pub mod detector;
pub mod gate;
pub mod keypoint;
pub mod synthetic;

pub use decoder::{output_stride, FrameScale, KeypointDecoder};
#[cfg(feature = "desktop")]
pub use detector::{NetworkOutput, PoseNetSession};
pub use gate::{ActivationGate, Joint};
pub use keypoint::{Keypoint, KeypointIndex, Pose};
