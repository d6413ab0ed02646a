//! SO(3) utilities used when perturbing and averaging object orientations.
//!
//! Orientations are propagated by left-multiplying the exponential of a
//! rotation vector and averaged with a weighted, hemisphere-aligned quaternion mean.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Rotate `q` by the body-independent increment `delta` (rotation vector in
/// the parent frame): `exp(delta) * q`.
pub fn rotate_by(q: &UnitQuaternion<f64>, delta: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(*delta) * q
}

/// Weighted mean of unit quaternions.
///
/// Quaternions are flipped into the hemisphere of the first one before the
/// weighted sum is normalized. Returns identity for an empty input or when
/// the weights cancel out.
pub fn weighted_mean_rotation(
    rotations: &[UnitQuaternion<f64>],
    weights: &[f64],
) -> UnitQuaternion<f64> {
    let Some(reference) = rotations.first() else {
        return UnitQuaternion::identity();
    };

    let mut acc = Quaternion::new(0.0, 0.0, 0.0, 0.0);
    for (q, &w) in rotations.iter().zip(weights.iter()) {
        let q = q.quaternion();
        // q and -q are the same rotation
        let sign = if q.dot(reference.quaternion()) < 0.0 { -1.0 } else { 1.0 };
        acc += *q * (sign * w);
    }

    if acc.norm() < f64::EPSILON {
        return *reference;
    }
    UnitQuaternion::from_quaternion(acc)
}
