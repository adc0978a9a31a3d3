//! Compilation driver: DSL evaluation, finalize passes, bundle.
//!
//! This is a thin orchestrator that calls each pass module in order.

use tracing::{debug, info};
use trellis_interchange::Bundle;

use crate::config::CompileConfig;
use crate::error::{CompileError, EvalError};
use crate::pass1_execute;
use crate::pass2_prepare;
use crate::pass3_inherit;
use crate::pass4_validate;
use crate::pass5_views;
use crate::pass6_transform;
use crate::pass7_serialize;
use crate::session::Session;

impl Session {
    /// Execute every deferred declaration, then finalize the design.
    ///
    /// Evaluation errors stop before finalize. All errors found by a stage
    /// are returned together.
    pub fn run_dsl(&mut self) -> Result<(), CompileError> {
        // Pass 1: deferred declarations to a fixed point
        pass1_execute::execute_roots(self);
        if !self.errors.is_empty() {
            return Err(CompileError::Dsl(self.errors.clone()));
        }
        self.finalize()
    }

    /// Run the finalize passes. Finalizing an already finalized design
    /// changes nothing.
    pub fn finalize(&mut self) -> Result<(), CompileError> {
        let mut errors: Vec<EvalError> = Vec::new();

        // Pass 2: collections, method defaults, security inheritance
        errors.extend(pass2_prepare::prepare(&mut self.design));

        // Pass 3: references and bases
        errors.extend(pass3_inherit::inherit(&mut self.design));

        // Pass 4: validation
        errors.extend(pass4_validate::validate(&self.design, &self.config));

        // Pass 5: default views and projections
        errors.extend(pass5_views::project_views(
            &mut self.design,
            &self.config.eval.view_meta,
        ));

        // Pass 6: structural transformation
        errors.extend(pass6_transform::transform(
            &mut self.design,
            &self.config.transform,
        ));

        debug!(errors = errors.len(), "design finalized");
        if errors.is_empty() {
            return Ok(());
        }
        self.record(errors.clone());
        Err(CompileError::Dsl(errors))
    }

    /// Pass 7: the interchange bundle of the finalized design.
    pub fn bundle(&self) -> Bundle {
        pass7_serialize::serialize(&self.design)
    }
}

/// Compile a design: run the host `dsl` at the top level, evaluate and
/// finalize, and return the bundle.
pub fn compile(
    config: CompileConfig,
    dsl: impl FnOnce(&mut Session),
) -> Result<Bundle, CompileError> {
    let mut session = Session::new(config);
    dsl(&mut session);
    session.run_dsl()?;
    let bundle = session.bundle();
    info!(
        types = bundle.types.len(),
        services = bundle.services.len(),
        conversions = bundle.conversions.len(),
        "design compiled"
    );
    Ok(bundle)
}
