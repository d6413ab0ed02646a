//! Depth camera input: frames and pinhole intrinsics.

mod depth_frame;

pub use depth_frame::{CameraIntrinsics, DepthFrame};
