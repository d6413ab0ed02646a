//! Depth images as consumed by observation models.

use nalgebra::{DMatrix, Matrix3};

use crate::error::{Result, TrackerError};

/// Pinhole camera intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Build from a 3x3 K-matrix.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Intrinsics of an image downsampled by `factor` (top two rows of K
    /// divided by the factor).
    pub fn downsampled(&self, factor: usize) -> Self {
        let f = factor.max(1) as f64;
        Self {
            fx: self.fx / f,
            fy: self.fy / f,
            cx: self.cx / f,
            cy: self.cy / f,
        }
    }
}

/// One depth image with its acquisition time.
///
/// Depths are in metres; non-finite values mark missing measurements.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Acquisition time in seconds.
    pub timestamp_s: f64,
    pub intrinsics: CameraIntrinsics,
    /// Row-major depth image (rows = height, cols = width).
    pub depth: DMatrix<f32>,
}

impl DepthFrame {
    pub fn new(timestamp_s: f64, intrinsics: CameraIntrinsics, depth: DMatrix<f32>) -> Self {
        Self {
            timestamp_s,
            intrinsics,
            depth,
        }
    }

    /// Build from a row-major buffer of `width * height` depths.
    pub fn from_row_slice(
        timestamp_s: f64,
        intrinsics: CameraIntrinsics,
        width: usize,
        height: usize,
        depths: &[f32],
    ) -> Result<Self> {
        if depths.len() != width * height {
            return Err(TrackerError::DimensionMismatch {
                what: "depth buffer",
                expected: width * height,
                got: depths.len(),
            });
        }
        Ok(Self::new(
            timestamp_s,
            intrinsics,
            DMatrix::from_row_slice(height, width, depths),
        ))
    }

    pub fn width(&self) -> usize {
        self.depth.ncols()
    }

    pub fn height(&self) -> usize {
        self.depth.nrows()
    }

    /// Keep every `factor`-th pixel in both directions and scale the
    /// intrinsics accordingly. A factor of 0 or 1 returns a copy.
    pub fn downsample(&self, factor: usize) -> Self {
        if factor <= 1 {
            return self.clone();
        }
        let rows = self.height() / factor;
        let cols = self.width() / factor;
        let depth = DMatrix::from_fn(rows, cols, |r, c| self.depth[(r * factor, c * factor)]);

        Self {
            timestamp_s: self.timestamp_s,
            intrinsics: self.intrinsics.downsampled(factor),
            depth,
        }
    }
}
