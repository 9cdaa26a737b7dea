//! Error types for the lhlo to linalg lowering.

use derive_more::{Display, From};

use tessel_ir::dialect::lhlo::PointwiseKind;
use tessel_ir::dialect::linalg::StructuredOpError;
use tessel_ir::rewrite::IllegalOp;
use tessel_ir::{ConversionError, Diagnostic};

/// Why a pattern declined an operation.
#[derive(Clone, Debug, PartialEq, Eq, Display, From)]
pub enum MatchFailure {
    #[display("expected {expected} operands, found {actual}")]
    OperandCount { expected: usize, actual: usize },

    #[display("operand {_0} is not a buffer")]
    NotBuffer(usize),

    /// Unranked or dynamically shaped buffer. Reported as a diagnostic.
    #[display("operand {_0} is not statically shaped")]
    NotStaticallyShaped(usize),

    #[display("operand {_0} has a non-numeric element type")]
    NonNumericElement(usize),

    #[display("operand {operand} has rank {actual}, expected {expected}")]
    RankMismatch {
        operand: usize,
        expected: usize,
        actual: usize,
    },

    #[display("element-wise operands must have rank > 0")]
    ZeroRank,

    #[display("missing broadcast_dimensions")]
    MissingBroadcastDimensions,

    #[display("{actual} broadcast_dimensions for a source of rank {expected}")]
    BroadcastDimensionsLength { expected: usize, actual: usize },

    #[display("broadcast dimension {dim} is outside the {num_loops} loops")]
    BroadcastDimensionOutOfRange { dim: u64, num_loops: usize },

    #[display("source rank {source_rank} exceeds result rank {num_loops}")]
    SourceRankExceedsLoopRank { source_rank: usize, num_loops: usize },

    #[display("iota_dimension {dim} is outside rank {rank}")]
    IotaDimensionOutOfRange { dim: u64, rank: usize },

    #[display("{_0}")]
    #[from]
    Attribute(ConversionError),

    #[display("{_0}")]
    #[from]
    Delegate(ScalarLoweringError),

    #[display("built op is malformed: {_0}")]
    #[from]
    Verification(StructuredOpError),
}

impl MatchFailure {
    /// Whether this failure is surfaced to the user, not only logged.
    pub fn is_reported(&self) -> bool {
        matches!(self, MatchFailure::NotStaticallyShaped(_))
    }
}

impl std::error::Error for MatchFailure {}

/// A scalar op kind the delegate cannot express for the given types.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum ScalarLoweringError {
    #[display("{kind:?} takes {expected} scalar inputs, got {actual}")]
    Arity {
        kind: PointwiseKind,
        expected: usize,
        actual: usize,
    },

    #[display("{kind:?} produces one result, {actual} result types given")]
    ResultCount { kind: PointwiseKind, actual: usize },

    #[display("{kind:?} is not defined for element type {element}")]
    UnsupportedElement {
        kind: PointwiseKind,
        element: String,
    },
}

impl std::error::Error for ScalarLoweringError {}

/// Pass-level failure.
#[derive(Debug, Display, From)]
pub enum LoweringError {
    #[display("{} illegal operation(s) remain after lowering", remaining.len())]
    IllegalOperations {
        remaining: Vec<IllegalOp>,
        diagnostics: Vec<Diagnostic>,
    },

    #[display("malformed input: {_0}")]
    #[from]
    Malformed(ConversionError),
}

impl std::error::Error for LoweringError {}
