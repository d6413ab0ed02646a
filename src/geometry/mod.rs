//! Geometry utilities: SE3 poses and SO(3) helpers.

pub mod se3;
pub mod so3;

pub use se3::SE3;
pub use so3::{rotate_by, weighted_mean_rotation};
