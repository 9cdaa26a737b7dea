//! Typed operation wrappers.
//!
//! Provides the `DialectOp` trait and the `dialect_ops!` macro for declaring
//! thin, copyable views over an `OpRef` of a known `dialect.name`.

use derive_more::Display;

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::symbol::Symbol;

/// Error when wrapping or inspecting an operation as a specific dialect op.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum ConversionError {
    /// Operation name doesn't match expected dialect.operation.
    #[display("expected `{expected}`, found `{actual}`")]
    WrongOperation { expected: &'static str, actual: String },
    /// Missing required attribute.
    #[display("missing attribute `{_0}`")]
    MissingAttribute(&'static str),
    /// Attribute has wrong type.
    #[display("attribute `{_0}` has the wrong kind")]
    WrongAttributeType(&'static str),
    /// Missing region.
    #[display("missing region")]
    MissingRegion,
    /// Wrong number of operands.
    #[display("expected {expected} operands, found {actual}")]
    WrongOperandCount { expected: usize, actual: usize },
}

impl std::error::Error for ConversionError {}

/// Trait for dialect operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError>;
    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        let data = ctx.op(op);
        data.dialect == Symbol::new(Self::DIALECT_NAME) && data.name == Symbol::new(Self::OP_NAME)
    }
}

/// Declare wrapper structs implementing [`DialectOp`].
///
/// ```
/// use tessel_ir::{dialect_ops, DialectOp};
///
/// dialect_ops! {
///     /// `demo.noop`
///     Noop => ("demo", "noop"),
/// }
///
/// assert_eq!(Noop::OP_NAME, "noop");
/// ```
#[macro_export]
macro_rules! dialect_ops {
    ($($(#[$meta:meta])* $name:ident => ($dialect:literal, $op:literal)),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name($crate::OpRef);

            impl $crate::DialectOp for $name {
                const DIALECT_NAME: &'static str = $dialect;
                const OP_NAME: &'static str = $op;

                fn from_op(
                    ctx: &$crate::IrContext,
                    op: $crate::OpRef,
                ) -> Result<Self, $crate::ConversionError> {
                    if !<Self as $crate::DialectOp>::matches(ctx, op) {
                        return Err($crate::ConversionError::WrongOperation {
                            expected: concat!($dialect, ".", $op),
                            actual: ctx.op(op).full_name(),
                        });
                    }
                    Ok(Self(op))
                }

                fn op_ref(&self) -> $crate::OpRef {
                    self.0
                }
            }
        )*
    };
}

/// Fetch the single region of `op` or fail.
pub fn single_region(ctx: &IrContext, op: OpRef) -> Result<crate::refs::RegionRef, ConversionError> {
    ctx.op(op)
        .regions
        .first()
        .copied()
        .ok_or(ConversionError::MissingRegion)
}
