//! Sampling blocks: which joint DOFs are perturbed and resampled together.
//!
//! A filter step visits the active blocks in order. For each block only that
//! block's DOFs receive fresh process noise before the particles are scored
//! and resampled (coordinate-wise sampling). One block spanning every DOF is
//! the plain "dense" particle filter used while bootstrapping.

use std::collections::HashSet;

use crate::error::{Result, TrackerError};
use crate::state::{object_dofs, DOF_PER_OBJECT};

/// A validated partition (not necessarily covering) of the joint DOFs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingBlocks {
    blocks: Vec<Vec<usize>>,
    dimension: usize,
}

impl SamplingBlocks {
    /// Validate `blocks` against a joint state of `dimension` DOFs.
    ///
    /// Blocks must be non-empty, pairwise disjoint and in range, and there
    /// must be at least one block.
    pub fn new(blocks: Vec<Vec<usize>>, dimension: usize) -> Result<Self> {
        if blocks.is_empty() {
            return Err(TrackerError::DimensionMismatch {
                what: "sampling block count",
                expected: 1,
                got: 0,
            });
        }

        let mut seen = HashSet::new();
        for block in &blocks {
            if block.is_empty() {
                return Err(TrackerError::DimensionMismatch {
                    what: "sampling block size",
                    expected: 1,
                    got: 0,
                });
            }
            for &dof in block {
                if dof >= dimension {
                    return Err(TrackerError::DimensionMismatch {
                        what: "sampling block index",
                        expected: dimension,
                        got: dof,
                    });
                }
                if !seen.insert(dof) {
                    return Err(TrackerError::DimensionMismatch {
                        what: "overlapping sampling blocks at index",
                        expected: dimension,
                        got: dof,
                    });
                }
            }
        }

        Ok(Self { blocks, dimension })
    }

    /// One block containing every DOF.
    pub fn dense(dimension: usize) -> Self {
        Self {
            blocks: vec![(0..dimension).collect()],
            dimension,
        }
    }

    /// One block per object.
    pub fn per_object(num_objects: usize) -> Self {
        Self {
            blocks: (0..num_objects).map(|i| object_dofs(i).collect()).collect(),
            dimension: num_objects * DOF_PER_OBJECT,
        }
    }

    /// A single block holding only `object_index`'s DOFs.
    pub fn single_object(num_objects: usize, object_index: usize) -> Result<Self> {
        Self::new(
            vec![object_dofs(object_index).collect()],
            num_objects * DOF_PER_OBJECT,
        )
    }

    pub fn blocks(&self) -> &[Vec<usize>] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// True when a single block spans the whole joint state.
    pub fn is_dense(&self) -> bool {
        self.blocks.len() == 1 && self.blocks[0].len() == self.dimension
    }
}

/// Holds the active block configuration consulted by the filter step.
#[derive(Debug, Clone)]
pub struct BlockController {
    active: SamplingBlocks,
}

impl BlockController {
    /// Start in dense mode.
    pub fn new(dimension: usize) -> Self {
        Self {
            active: SamplingBlocks::dense(dimension),
        }
    }

    /// Replace the active configuration. Its dimension must match.
    pub fn set_blocks(&mut self, blocks: SamplingBlocks) -> Result<()> {
        if blocks.dimension() != self.active.dimension() {
            return Err(TrackerError::DimensionMismatch {
                what: "sampling block dimension",
                expected: self.active.dimension(),
                got: blocks.dimension(),
            });
        }
        self.active = blocks;
        Ok(())
    }

    pub fn active_blocks(&self) -> &SamplingBlocks {
        &self.active
    }
}
