//! Pass 1: Run deferred declarations to a fixed point.
//!
//! Each round takes every declaration queued so far and executes it in
//! registration order. Executing a declaration may queue more (methods of a
//! service, generated collections); those run in the next round.

use tracing::{debug, warn};

use crate::session::Session;

pub fn execute_roots(session: &mut Session) {
    let max = session.config.eval.max_generations;
    let mut round = 0;
    loop {
        let pending = session.take_pending();
        if pending.is_empty() {
            return;
        }
        if round >= max {
            warn!(rounds = round, "deferred declarations did not settle");
            session.report_error("too many generated declarations, infinite loop?");
            return;
        }
        round += 1;
        debug!(round, declarations = pending.len(), "executing deferred declarations");
        for (expr, dsl) in pending {
            if let Some(dsl) = dsl {
                debug!(context = %session.design.eval_name(expr), "executing declaration");
                session.execute(expr, dsl);
            }
        }
    }
}
