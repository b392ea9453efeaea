//! Registration seam.
//!
//! Estimating the translation between two captures is the job of an external
//! registration collaborator. The stack only asks an [`Aligner`] for the
//! offset of each layer relative to its brighter neighbour and chains the
//! answers into canvas offsets.

use crate::exposure::{Exposure, Offset};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reasons a pair could not be registered
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignError {
    #[error("Exposures do not overlap")]
    NoOverlap,

    #[error("Exposure has no source to identify it")]
    Unidentified,

    #[error("No offset known for {}", .0.display())]
    Unknown(PathBuf),

    #[error("Registration rejected: {0}")]
    Rejected(String),
}

/// Estimates the offset that lines `moving` up with `reference`.
///
/// The returned offset is relative: with `reference` at the canvas origin,
/// placing `moving` at the returned offset makes the two depict the same
/// scene point at the same canvas pixel. Implementations work from pixel data
/// and must ignore the layers' current offsets.
pub trait Aligner {
    fn estimate_offset(&self, reference: &Exposure, moving: &Exposure)
        -> Result<Offset, AlignError>;
}

/// Leaves every layer where it is
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAligner;

impl Aligner for IdentityAligner {
    fn estimate_offset(&self, _reference: &Exposure, _moving: &Exposure) -> Result<Offset, AlignError> {
        Ok(Offset::ZERO)
    }
}

/// Offsets measured beforehand, keyed by the moving layer's source path
#[derive(Debug, Clone, Default)]
pub struct FixedAligner {
    offsets: HashMap<PathBuf, Offset>,
}

impl FixedAligner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, source: impl Into<PathBuf>, offset: Offset) -> Self {
        self.offsets.insert(source.into(), offset);
        self
    }

    pub fn offset_for(&self, source: &Path) -> Option<Offset> {
        self.offsets.get(source).copied()
    }
}

impl Aligner for FixedAligner {
    fn estimate_offset(&self, _reference: &Exposure, moving: &Exposure) -> Result<Offset, AlignError> {
        let source = moving.source().ok_or(AlignError::Unidentified)?;
        self.offset_for(source)
            .ok_or_else(|| AlignError::Unknown(source.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ExposureInfo;
    use ndarray::Array2;

    fn layer(source: Option<&str>) -> Exposure {
        let exposure =
            Exposure::new(Array2::zeros((2, 2)), 12, ExposureInfo::default()).unwrap();
        match source {
            Some(path) => exposure.with_source(path),
            None => exposure,
        }
    }

    #[test]
    fn test_fixed_aligner_lookup() {
        let aligner = FixedAligner::new().with_offset("b.raw", Offset::new(3, -1));
        let reference = layer(Some("a.raw"));

        assert_eq!(
            aligner.estimate_offset(&reference, &layer(Some("b.raw"))),
            Ok(Offset::new(3, -1))
        );
        assert_eq!(
            aligner.estimate_offset(&reference, &layer(Some("c.raw"))),
            Err(AlignError::Unknown(PathBuf::from("c.raw")))
        );
        assert_eq!(
            aligner.estimate_offset(&reference, &layer(None)),
            Err(AlignError::Unidentified)
        );
    }

    #[test]
    fn test_identity_aligner() {
        let a = layer(None);
        assert_eq!(IdentityAligner.estimate_offset(&a, &a), Ok(Offset::ZERO));
    }
}
