//! Dialect definitions.
//!
//! - `core`: module container and the builtin scalar and buffer types
//! - `func`: functions and returns
//! - `lhlo`: element-wise, broadcast and iota ops over buffers
//! - `arith`: scalar arithmetic used inside loop bodies
//! - `linalg`: generic parallel-loop ops and their terminator

pub mod arith;
pub mod core;
pub mod func;
pub mod lhlo;
pub mod linalg;
