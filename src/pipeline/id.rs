//! Stage identity.
//!
//! Stages are numbered by their position in the chain: the source is `0` and
//! transform `i` (1-based) sits at index `i`. The id doubles as an index into
//! [`Pipeline::stages`](crate::pipeline::Pipeline::stages) when the source is
//! owned by the pipeline.

use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fmt;

/// Position of a stage in a pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct StageId(pub u32);

impl StageId {
    pub const SOURCE: StageId = StageId(0);

    /// Id of the transform at zero-based `offset` in the function list.
    ///
    /// Fails when `offset + 1` does not fit in a `u32`.
    pub fn transform(offset: usize) -> Result<Self> {
        offset
            .checked_add(1)
            .and_then(|index| u32::try_from(index).ok())
            .map(StageId)
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "transform offset {} exceeds the stage id range",
                    offset
                ))
            })
    }

    #[inline]
    pub fn is_source(self) -> bool {
        self == Self::SOURCE
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_source() {
            write!(f, "StageId(source)")
        } else {
            write!(f, "StageId({})", self.0)
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
