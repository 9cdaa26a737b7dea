//! Lowerings out of the `lhlo` buffer dialect.

pub mod errors;
pub mod lhlo_to_linalg;

pub use errors::{LoweringError, MatchFailure, ScalarLoweringError};
pub use lhlo_to_linalg::{LegalizeToLinalg, LoweringReport, ScalarOpDelegate, StandardScalarOps};
