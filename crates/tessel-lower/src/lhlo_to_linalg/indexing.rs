//! Indexing maps from loop coordinates to operand storage coordinates.

use smallvec::SmallVec;

use tessel_ir::{AffineExpr, AffineMap};

use crate::errors::MatchFailure;

/// `(d0, .., dN-1) -> (d0, .., dN-1)`.
pub fn identity_map(num_loops: usize) -> AffineMap {
    AffineMap::identity(num_loops as u32)
}

/// Map for the source of a broadcast.
///
/// Source dimension `i` reads loop coordinate `broadcast_dims[i]`, except
/// that an extent-1 dimension always reads position 0.
pub fn broadcast_map(
    source_shape: &[u64],
    broadcast_dims: Option<&[u64]>,
    num_loops: usize,
) -> Result<AffineMap, MatchFailure> {
    let dims = broadcast_dims.ok_or(MatchFailure::MissingBroadcastDimensions)?;
    if dims.len() != source_shape.len() {
        return Err(MatchFailure::BroadcastDimensionsLength {
            expected: source_shape.len(),
            actual: dims.len(),
        });
    }
    if source_shape.len() > num_loops {
        return Err(MatchFailure::SourceRankExceedsLoopRank {
            source_rank: source_shape.len(),
            num_loops,
        });
    }

    let mut exprs: SmallVec<[AffineExpr; 4]> = SmallVec::with_capacity(source_shape.len());
    for (&extent, &dim) in source_shape.iter().zip(dims) {
        if dim >= num_loops as u64 {
            return Err(MatchFailure::BroadcastDimensionOutOfRange { dim, num_loops });
        }
        exprs.push(if extent == 1 {
            AffineExpr::Constant(0)
        } else {
            AffineExpr::Dim(dim as u32)
        });
    }
    Ok(AffineMap::new(num_loops as u32, exprs))
}
