//! Arena-based mutable IR for buffer-level tensor programs.
//!
//! All entities live in an [`IrContext`] and are referred to by small
//! copyable refs. Use-chains are maintained on every mutation, so values can
//! be replaced in place with [`IrContext::replace_all_uses`].

pub mod affine;
pub mod context;
pub mod diagnostic;
pub mod dialect;
pub mod location;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod rewrite;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

pub use affine::{AffineExpr, AffineMap};
pub use context::{BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use};
pub use diagnostic::{Diagnostic, DiagnosticSeverity};
pub use location::{Location, Span};
pub use ops::{ConversionError, DialectOp};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use symbol::Symbol;
pub use types::{Attribute, TypeData, TypeDataBuilder};
