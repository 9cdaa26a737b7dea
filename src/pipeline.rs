//! Pass registry.
//!
//! Every pass runs over a whole `core.module`:
//!
//! ```text
//! core.module (func.func bodies with lhlo.* ops)
//!     │
//!     ▼
//! lhlo-legalize-to-linalg ─► core.module (linalg.generic / indexed_generic + arith)
//! ```

use derive_more::{Display, From};

use tessel_ir::IrContext;
use tessel_ir::dialect::core::Module;
use tessel_lower::lhlo_to_linalg::{self, LegalizeToLinalg};
use tessel_lower::{LoweringError, LoweringReport};

/// Name and one-line description of a registered pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassInfo {
    pub name: &'static str,
    pub description: &'static str,
}

const PASSES: &[PassInfo] = &[PassInfo {
    name: lhlo_to_linalg::PASS_NAME,
    description: lhlo_to_linalg::PASS_DESCRIPTION,
}];

pub fn registered_passes() -> &'static [PassInfo] {
    PASSES
}

#[derive(Debug, Display, From)]
pub enum PipelineError {
    #[display("unknown pass `{_0}`")]
    UnknownPass(String),

    #[display("{_0}")]
    #[from]
    Lowering(LoweringError),
}

impl std::error::Error for PipelineError {}

/// Run the pass registered as `name` over `module`.
pub fn run_pass(
    name: &str,
    ctx: &mut IrContext,
    module: Module,
) -> Result<LoweringReport, PipelineError> {
    let _span = tracing::info_span!("pass", name).entered();
    match name {
        lhlo_to_linalg::PASS_NAME => Ok(LegalizeToLinalg::new().run_on_module(ctx, module)?),
        _ => Err(PipelineError::UnknownPass(name.to_owned())),
    }
}

/// Run passes in order, stopping at the first failure.
///
/// Reports of the passes are merged. Every name is checked before any pass
/// runs, so an unknown name leaves the module untouched.
pub fn run_pipeline(
    names: &[&str],
    ctx: &mut IrContext,
    module: Module,
) -> Result<LoweringReport, PipelineError> {
    if let Some(unknown) = names
        .iter()
        .find(|name| !PASSES.iter().any(|pass| pass.name == **name))
    {
        return Err(PipelineError::UnknownPass((*unknown).to_owned()));
    }

    let mut merged = LoweringReport::default();
    for name in names {
        let report = run_pass(name, ctx, module)?;
        merged.converted += report.converted;
        merged.diagnostics.extend(report.diagnostics);
    }
    Ok(merged)
}
