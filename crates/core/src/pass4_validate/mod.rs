//! Pass 4: Design validation -- structural checks on attributes, methods,
//! views and security requirements.
//!
//! Every check reports and moves on; the pass returns all errors found.

mod attributes;
mod methods;
mod security;
mod views;

use tracing::debug;

use crate::config::CompileConfig;
use crate::error::EvalError;
use crate::expr::{Expr, TypeKind};
use crate::session::Design;

use attributes::Checker;

pub fn validate(design: &Design, config: &CompileConfig) -> Vec<EvalError> {
    let mut checker = Checker::new(design, &config.eval.view_meta);

    for id in design.type_ids() {
        let t = design.user_type(id);
        // Built-ins are valid by construction; projections and external
        // types are computed from validated types.
        if !matches!(t.kind, TypeKind::Declared | TypeKind::Generated) {
            continue;
        }
        let ctx = design.eval_name(Expr::UserType(id));
        checker.defer_unknown_views = t.is_result();
        checker.walk_root(t.attr, &ctx, Some(&t.name));
        checker.defer_unknown_views = false;
        views::validate_views(&mut checker, id, &ctx);
    }

    methods::validate_methods(&mut checker);
    security::validate_security(&mut checker);

    let errors = checker.finish();
    debug!(errors = errors.len(), "design validated");
    errors
}
