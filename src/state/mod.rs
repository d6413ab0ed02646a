//! State representation for a system of free-floating rigid bodies.
//!
//! Each object contributes six pose degrees of freedom
//! `[tx, ty, tz, rx, ry, rz]` (translation + rotation vector). Joint DOF
//! index of object `i`, component `k` is `i * DOF_PER_OBJECT + k`. Linear and
//! angular velocities are carried alongside but are not addressable DOFs.

mod joint_state;
mod object_state;

pub use joint_state::JointState;
pub use object_state::ObjectState;

/// Pose degrees of freedom per rigid body.
pub const DOF_PER_OBJECT: usize = 6;

/// Joint DOF indices owned by `object_index`.
pub fn object_dofs(object_index: usize) -> std::ops::Range<usize> {
    let start = object_index * DOF_PER_OBJECT;
    start..start + DOF_PER_OBJECT
}
