//! Pass 2: Prepare the evaluated design for resolution.
//!
//! Fills in what the DSL leaves implicit: generated collection identifiers
//! and views, empty payloads and results, stream kinds, and inherited
//! security requirements. Every step only fills unset values, so running
//! the pass twice changes nothing.

use crate::attribute::AttributeExpr;
use crate::error::EvalError;
use crate::expr::{StreamKind, TypeKind, ViewExpr};
use crate::session::Design;
use crate::types::{DataType, Object};

pub fn prepare(design: &mut Design) -> Vec<EvalError> {
    let mut errors = Vec::new();
    prepare_collections(design, &mut errors);
    prepare_methods(design);
    inherit_security(design);
    errors
}

// ──────────────────────────────────────────────────────────────────────────────
// Collections
// ──────────────────────────────────────────────────────────────────────────────

fn prepare_collections(design: &mut Design, errors: &mut Vec<EvalError>) {
    let ids: Vec<_> = design.type_ids().collect();
    for id in ids {
        let (name, elem) = {
            let t = design.user_type(id);
            match (t.kind, t.result.as_ref().and_then(|r| r.collection_of)) {
                (TypeKind::Generated, Some(elem)) => (t.name.clone(), elem),
                _ => continue,
            }
        };
        let (elem_name, elem_info) = {
            let e = design.user_type(elem);
            (e.name.clone(), e.result.clone())
        };
        let Some(elem_info) = elem_info else {
            errors.push(EvalError::detached(format!(
                "collection element \"{}\" is not a result type in result type \"{}\"",
                elem_name, name
            )));
            continue;
        };

        let needs_views = design
            .user_type(id)
            .result
            .as_ref()
            .is_some_and(|r| r.views.is_empty());
        let inherited: Vec<ViewExpr> = if needs_views {
            elem_info
                .views
                .iter()
                .map(|v| ViewExpr {
                    name: v.name.clone(),
                    attr: design.dup_attr(v.attr),
                })
                .collect()
        } else {
            Vec::new()
        };

        if let Some(info) = design.user_type_mut(id).result.as_mut() {
            if info.identifier.is_empty() {
                info.identifier = format!("{}; type=collection", elem_info.identifier);
            }
            if needs_views {
                info.views = inherited;
            }
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Methods
// ──────────────────────────────────────────────────────────────────────────────

fn prepare_methods(design: &mut Design) {
    let ids: Vec<_> = design.method_ids().collect();
    for id in ids {
        if design.method(id).payload.is_none() {
            let empty = design.new_attr(AttributeExpr::typed(DataType::Object(Object::new())));
            design.method_mut(id).payload = Some(empty);
        }
        if design.method(id).result.is_none() {
            let empty = design.new_attr(AttributeExpr::typed(DataType::Object(Object::new())));
            design.method_mut(id).result = Some(empty);
        }
        let m = design.method_mut(id);
        m.stream = match (m.streaming_payload.is_some(), m.streaming_result) {
            (true, true) => StreamKind::Bidirectional,
            (true, false) => StreamKind::Client,
            (false, true) => StreamKind::Server,
            (false, false) => StreamKind::None,
        };
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Security
// ──────────────────────────────────────────────────────────────────────────────

/// Methods inherit their service's requirements, services the API's.
/// `no_security` stops inheritance.
fn inherit_security(design: &mut Design) {
    let api = design.api.requirements.clone();
    let services: Vec<_> = design.service_ids().collect();
    for sid in services {
        let s = design.service_mut(sid);
        if !s.no_security && s.requirements.is_empty() {
            s.requirements = api.clone();
        }
        let inherited = if s.no_security {
            Vec::new()
        } else {
            s.requirements.clone()
        };
        let methods = s.methods.clone();
        for mid in methods {
            let m = design.method_mut(mid);
            if !m.no_security && m.requirements.is_empty() {
                m.requirements = inherited.clone();
            }
        }
    }
}
