//! Security validation: requirements must name declared schemes and scopes,
//! and secured methods must carry the credentials their schemes need.

use super::attributes::Checker;
use crate::attribute::META_SECURITY;
use crate::expr::{Expr, Requirement};
use crate::types::{AttrId, MethodId};

pub(super) fn validate_security(checker: &mut Checker<'_>) {
    let design = checker.design;

    let api_ctx = design.eval_name(Expr::Api);
    validate_requirements(checker, &design.api().requirements, &api_ctx);
    for sid in design.service_ids() {
        let ctx = design.eval_name(Expr::Service(sid));
        validate_requirements(checker, &design.service(sid).requirements, &ctx);
    }
    for mid in design.method_ids() {
        let ctx = design.eval_name(Expr::Method(mid));
        validate_requirements(checker, &design.method(mid).requirements, &ctx);
        validate_credentials(checker, mid, &ctx);
    }
}

fn validate_requirements(checker: &mut Checker<'_>, requirements: &[Requirement], ctx: &str) {
    let design = checker.design;
    for req in requirements {
        if design.find_scheme(&req.scheme).is_none() {
            checker.report(format!("unknown security scheme \"{}\"", req.scheme), ctx);
            continue;
        }
        for scope in &req.scopes {
            let found = design
                .schemes()
                .iter()
                .any(|s| s.scopes.iter().any(|sc| &sc.name == scope));
            if !found {
                checker.report(
                    format!(
                        "security scope \"{}\" not found in any of the security schemes.",
                        scope
                    ),
                    ctx,
                );
            }
        }
    }
}

/// Payload attributes tagged with credentials, as (tag, scheme) pairs.
fn credentials(checker: &Checker<'_>, payload: AttrId) -> Vec<(String, Option<String>)> {
    let design = checker.design;
    let Some(obj) = design.object(payload) else {
        return Vec::new();
    };
    obj.iter()
        .filter_map(|f| {
            let values = design.attr(f.attr).meta.get(META_SECURITY)?;
            let tag = values.first()?.clone();
            Some((tag, values.get(1).cloned()))
        })
        .collect()
}

fn constructor(tag: &str) -> &'static str {
    match tag {
        "username" => "Username",
        "password" => "Password",
        "apikey" => "APIKey",
        "accesstoken" => "AccessToken",
        _ => "Token",
    }
}

fn validate_credentials(checker: &mut Checker<'_>, mid: MethodId, ctx: &str) {
    let design = checker.design;
    let method = design.method(mid);
    let Some(payload) = method.payload else {
        return;
    };
    let present = credentials(checker, payload);
    for req in &method.requirements {
        let Some(sid) = design.find_scheme(&req.scheme) else {
            continue;
        };
        for tag in design.scheme(sid).kind.payload_tags() {
            let found = present.iter().any(|(t, scheme)| {
                t == tag && (*tag != "apikey" || scheme.as_deref().map_or(true, |s| s == req.scheme))
            });
            if !found {
                checker.report(
                    format!(
                        "payload of method \"{}\" of service \"{}\" does not define a {} attribute, use {} to define one",
                        method.name,
                        design.service(method.service).name,
                        tag,
                        constructor(tag)
                    ),
                    ctx,
                );
            }
        }
    }
}
