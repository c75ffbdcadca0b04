//! Camera input and frame handling.
//!
//! Cameras are driven by a [`DeviceHandle`] that owns a capture worker
//! thread. Frames come out unsequenced as [`Capture`]s; the supervisor
//! stamps them into [`Frame`]s so numbering survives device reopen.

mod camera;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod depth;
mod frame;
mod handle;
#[cfg(feature = "camera")]
mod native;

pub use camera::{check_node, Camera, CameraSource, DeviceError, SyntheticCamera, SyntheticSource};
pub use frame::{Capture, ColorImage, DepthImage, Frame, FrameSequencer};
pub use handle::DeviceHandle;
#[cfg(feature = "camera")]
pub use native::{NativeCamera, NativeSource};
