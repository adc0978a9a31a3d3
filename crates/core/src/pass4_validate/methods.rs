//! Method validation: payloads, results and errors.

use super::attributes::Checker;
use crate::expr::{ErrorExpr, Expr};

pub(super) fn validate_methods(checker: &mut Checker<'_>) {
    let design = checker.design;

    let api_ctx = design.eval_name(Expr::Api);
    validate_errors(checker, &design.api().errors, &api_ctx);

    for sid in design.service_ids() {
        let service = design.service(sid);
        let service_ctx = design.eval_name(Expr::Service(sid));
        validate_errors(checker, &service.errors, &service_ctx);

        for &mid in &service.methods {
            let method = design.method(mid);
            let ctx = design.eval_name(Expr::Method(mid));
            if let Some(payload) = method.payload {
                checker.walk_root(payload, &format!("payload of {}", ctx), None);
            }
            if let Some(streaming) = method.streaming_payload {
                checker.walk_root(streaming, &format!("streaming payload of {}", ctx), None);
            }
            if let Some(result) = method.result {
                checker.walk_root(result, &format!("result of {}", ctx), None);
            }
            validate_errors(checker, &method.errors, &ctx);
        }
    }
}

fn validate_errors(checker: &mut Checker<'_>, errors: &[ErrorExpr], ctx: &str) {
    for error in errors {
        let error_ctx = format!("error \"{}\" of {}", error.name, ctx);
        checker.walk_root(error.attr, &error_ctx, None);
    }
}

#[cfg(test)]
mod tests {
    use crate::pass1_execute::execute_roots;
    use crate::pass2_prepare::prepare;
    use crate::pass3_inherit::inherit;
    use crate::pass4_validate::validate;
    use crate::session::Session;
    use crate::types::Primitive;

    #[test]
    fn payload_errors_name_the_method() {
        let mut session = Session::default();
        session.service("calc", |s| {
            s.method("add", |s| {
                s.payload_dsl(|s| {
                    s.attribute("a", Primitive::Int);
                    s.required(&["a", "b"]);
                });
            });
        });
        execute_roots(&mut session);
        prepare(&mut session.design);
        inherit(&mut session.design);
        let errors = validate(session.design(), session.config());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "required field \"b\" does not exist in type object in payload of service \"calc\" method \"add\""
        );
    }
}
