//! Affine indexing maps.
//!
//! A map takes `num_dims` loop coordinates `(d0, .., dN-1)` to one storage
//! coordinate per result expression. Only the two expression forms needed
//! by structured loops are represented: a loop coordinate and an integer
//! constant.

use std::fmt;

use smallvec::SmallVec;

/// A single result expression of an [`AffineMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AffineExpr {
    /// The loop coordinate at the given position.
    Dim(u32),
    /// An integer constant.
    Constant(i64),
}

impl AffineExpr {
    /// Evaluate against concrete loop coordinates.
    ///
    /// Returns `None` if the expression names a coordinate that is not in `dims`.
    pub fn eval(self, dims: &[i64]) -> Option<i64> {
        match self {
            AffineExpr::Dim(d) => dims.get(d as usize).copied(),
            AffineExpr::Constant(c) => Some(c),
        }
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffineExpr::Dim(d) => write!(f, "d{d}"),
            AffineExpr::Constant(c) => write!(f, "{c}"),
        }
    }
}

/// A map from `num_dims` loop coordinates to `results.len()` storage coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AffineMap {
    num_dims: u32,
    results: SmallVec<[AffineExpr; 4]>,
}

impl AffineMap {
    pub fn new(num_dims: u32, results: impl IntoIterator<Item = AffineExpr>) -> Self {
        Self {
            num_dims,
            results: results.into_iter().collect(),
        }
    }

    /// `(d0, .., dN-1) -> (d0, .., dN-1)`.
    pub fn identity(num_dims: u32) -> Self {
        Self::new(num_dims, (0..num_dims).map(AffineExpr::Dim))
    }

    pub fn num_dims(&self) -> u32 {
        self.num_dims
    }

    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    pub fn results(&self) -> &[AffineExpr] {
        &self.results
    }

    pub fn is_identity(&self) -> bool {
        self.results.len() == self.num_dims as usize
            && self
                .results
                .iter()
                .enumerate()
                .all(|(i, e)| *e == AffineExpr::Dim(i as u32))
    }

    /// Check that every `Dim` expression is within `[0, num_dims)`.
    pub fn dims_in_range(&self) -> bool {
        self.results.iter().all(|e| match e {
            AffineExpr::Dim(d) => *d < self.num_dims,
            AffineExpr::Constant(_) => true,
        })
    }

    /// Apply the map to concrete loop coordinates.
    pub fn eval(&self, dims: &[i64]) -> Option<SmallVec<[i64; 4]>> {
        if dims.len() != self.num_dims as usize {
            return None;
        }
        self.results.iter().map(|e| e.eval(dims)).collect()
    }
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("affine_map<(")?;
        for d in 0..self.num_dims {
            if d > 0 {
                f.write_str(", ")?;
            }
            write!(f, "d{d}")?;
        }
        f.write_str(") -> (")?;
        for (i, e) in self.results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{e}")?;
        }
        f.write_str(")>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_map_shape() {
        let map = AffineMap::identity(3);
        assert_eq!(map.num_dims(), 3);
        assert_eq!(map.num_results(), 3);
        assert!(map.is_identity());
        assert_eq!(map.to_string(), "affine_map<(d0, d1, d2) -> (d0, d1, d2)>");
    }

    #[test]
    fn constant_and_permuted_results() {
        let map = AffineMap::new(3, [AffineExpr::Constant(0), AffineExpr::Dim(2)]);
        assert!(!map.is_identity());
        assert!(map.dims_in_range());
        assert_eq!(map.eval(&[4, 5, 6]).unwrap().as_slice(), &[0, 6]);
        assert_eq!(map.to_string(), "affine_map<(d0, d1, d2) -> (0, d2)>");
    }

    #[test]
    fn out_of_range_dim_is_detected() {
        let map = AffineMap::new(2, [AffineExpr::Dim(2)]);
        assert!(!map.dims_in_range());
        assert_eq!(map.eval(&[0, 1]), None);
    }

    #[test]
    fn eval_rejects_wrong_arity() {
        assert_eq!(AffineMap::identity(2).eval(&[1]), None);
    }

    #[test]
    fn zero_dim_identity_prints_empty() {
        assert_eq!(AffineMap::identity(0).to_string(), "affine_map<() -> ()>");
    }
}
