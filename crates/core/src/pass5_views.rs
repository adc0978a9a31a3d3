//! Pass 5: View completion and projection.
//!
//! Every result type gets a `default` view listing all of its fields, then
//! each view is projected into a result type of its own. A projected type
//! keeps only the view's fields; nested result-typed fields are projected
//! with the view pinned on them (or `default`). Projections are memoized on
//! the design, so finalizing twice reuses them.

use std::collections::HashSet;

use tracing::debug;

use crate::attribute::AttributeExpr;
use crate::error::EvalError;
use crate::expr::{ResultInfo, TypeKind, ViewExpr, DEFAULT_VIEW};
use crate::names::title_case;
use crate::session::Design;
use crate::types::{AttrId, DataType, Object, TypeId};

pub fn project_views(design: &mut Design, view_meta: &str) -> Vec<EvalError> {
    let results: Vec<TypeId> = design
        .type_ids()
        .filter(|id| {
            let t = design.user_type(*id);
            t.is_result()
                && matches!(t.kind, TypeKind::Declared | TypeKind::Builtin | TypeKind::Generated)
        })
        .collect();

    for &id in &results {
        ensure_default_view(design, id);
    }

    let mut projector = Projector {
        view_meta,
        errors: Vec::new(),
        reported: HashSet::new(),
    };
    for &id in &results {
        let views: Vec<String> = design
            .user_type(id)
            .result
            .as_ref()
            .map(|r| r.views.iter().map(|v| v.name.clone()).collect())
            .unwrap_or_default();
        for view in views {
            projector.project(design, id, &view);
        }
    }
    debug!(projections = design.projections.len(), "views projected");
    projector.errors
}

/// The attribute whose fields a result type's views select from.
fn view_source(design: &Design, id: TypeId) -> AttrId {
    let t = design.user_type(id);
    match t.result.as_ref().and_then(|r| r.collection_of) {
        Some(elem) => design.user_type(elem).attr,
        None => t.attr,
    }
}

fn ensure_default_view(design: &mut Design, id: TypeId) {
    if design.user_type(id).view(DEFAULT_VIEW).is_some() {
        return;
    }
    let source = view_source(design, id);
    let fields: Vec<(String, AttrId)> = design
        .object(source)
        .map(|obj| obj.iter().map(|f| (f.name.clone(), f.attr)).collect())
        .unwrap_or_default();
    let mut obj = Object::new();
    for (name, field) in fields {
        let copy = design.dup_attr(field);
        obj.set(name, copy);
    }
    let attr = design.new_attr(AttributeExpr::typed(DataType::Object(obj)));
    if let Some(info) = design.user_type_mut(id).result.as_mut() {
        info.views.insert(
            0,
            ViewExpr {
                name: DEFAULT_VIEW.to_string(),
                attr,
            },
        );
    }
}

struct Projector<'m> {
    view_meta: &'m str,
    errors: Vec<EvalError>,
    reported: HashSet<(TypeId, String, String)>,
}

impl Projector<'_> {
    /// The projection of `id` through `view`, or `None` when the view does
    /// not exist.
    fn project(&mut self, design: &mut Design, id: TypeId, view: &str) -> Option<TypeId> {
        let id = design.resolve_id(id);
        if let Some(&done) = design.projections.get(&(id, view.to_string())) {
            return Some(done);
        }
        let t = design.user_type(id).clone();
        let info = t.result.clone()?;

        if let Some(elem) = info.collection_of {
            let projected_elem = self.project(design, elem, view)?;
            let name = format!("{}Collection", design.user_type(projected_elem).name);
            let item = design.new_attr(AttributeExpr::typed(DataType::User(projected_elem)));
            let mut attr = design.attr(t.attr).clone();
            attr.type_ = Some(DataType::Array(item));
            let attr = design.new_attr(attr);
            let projected = ResultInfo {
                identifier: view_identifier(&info.identifier, view),
                content_type: info.content_type.clone(),
                views: Vec::new(),
                collection_of: Some(projected_elem),
            };
            let pid = design.add_unindexed_type(&name, attr, TypeKind::Projected, Some(projected));
            design.projections.insert((id, view.to_string()), pid);
            return Some(pid);
        }

        let view_attr = t.view(view)?.attr;
        let name = if view == DEFAULT_VIEW {
            t.name.clone()
        } else {
            format!("{}{}", t.name, title_case(view))
        };

        // Claim the projection before filling it so recursive types end.
        let base = design.attr(t.attr).clone();
        let attr = design.new_attr(AttributeExpr {
            description: base
                .description
                .as_ref()
                .map(|d| format!("{} ({} view)", d, view)),
            meta: base.meta.clone(),
            examples: base.examples.clone(),
            ..AttributeExpr::default()
        });
        let projected = ResultInfo {
            identifier: view_identifier(&info.identifier, view),
            content_type: info.content_type.clone(),
            views: Vec::new(),
            collection_of: None,
        };
        let pid = design.add_unindexed_type(&name, attr, TypeKind::Projected, Some(projected));
        design.projections.insert((id, view.to_string()), pid);

        let fields: Vec<(String, AttrId)> = design
            .object(view_attr)
            .map(|obj| obj.iter().map(|f| (f.name.clone(), f.attr)).collect())
            .unwrap_or_default();
        let mut obj = Object::new();
        for (field, view_field) in fields {
            let copy = design.dup_attr(view_field);
            self.project_field(design, copy, &t.name, &field);
            obj.set(field, copy);
        }
        let validation = base
            .validation
            .as_ref()
            .map(|v| v.restrict_required(|name| obj.contains(name)))
            .filter(|v| !v.is_empty());
        let projected_attr = design.attr_mut(attr);
        projected_attr.type_ = Some(DataType::Object(obj));
        projected_attr.validation = validation;
        Some(pid)
    }

    /// Point a result-typed field (or a sequence of them) at the projection
    /// of its pinned view.
    fn project_field(&mut self, design: &mut Design, field: AttrId, owner: &str, name: &str) {
        let view = design
            .attr(field)
            .meta_value(self.view_meta)
            .unwrap_or(DEFAULT_VIEW)
            .to_string();
        let (slot, target) = match &design.attr(field).type_ {
            Some(DataType::User(t)) => (field, *t),
            Some(DataType::Array(elem)) => match &design.attr(*elem).type_ {
                Some(DataType::User(t)) => (*elem, *t),
                _ => return,
            },
            _ => return,
        };
        if !design.user_type(target).is_result() {
            return;
        }
        match self.project(design, target, &view) {
            Some(projected) => design.attr_mut(slot).type_ = Some(DataType::User(projected)),
            None => {
                let key = (design.resolve_id(target), name.to_string(), view.clone());
                if self.reported.insert(key) {
                    self.errors.push(EvalError::detached(format!(
                        "view \"{}\" on field \"{}\" cannot be computed: unknown view \"{}\" in result type \"{}\"",
                        view, name, view, owner
                    )));
                }
            }
        }
    }
}

fn view_identifier(identifier: &str, view: &str) -> String {
    format!("{}; view={}", identifier, view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1_execute::execute_roots;
    use crate::pass2_prepare::prepare;
    use crate::pass3_inherit::inherit;
    use crate::session::Session;
    use crate::types::Primitive;

    fn projected(session: &mut Session) -> Vec<EvalError> {
        execute_roots(session);
        prepare(&mut session.design);
        inherit(&mut session.design);
        let meta = session.config.eval.view_meta.clone();
        project_views(&mut session.design, &meta)
    }

    fn bottle(session: &mut Session) {
        session.result_type("application/vnd.bottle", |s| {
            s.attributes(|s| {
                s.attribute("id", Primitive::Int);
                s.attribute("name", Primitive::String);
                s.attribute("vintage", Primitive::Int);
                s.required(&["id", "name"]);
            });
            s.view("tiny", |s| s.attribute_dsl("id", |_| {}));
        });
    }

    #[test]
    fn default_view_lists_every_field() {
        let mut session = Session::default();
        bottle(&mut session);
        assert!(projected(&mut session).is_empty());
        let design = session.design();
        let t = design.user_type(design.find_type("Bottle").unwrap());
        let default = t.view(DEFAULT_VIEW).unwrap();
        let names: Vec<_> = design.object(default.attr).unwrap().names().collect();
        assert_eq!(names, vec!["id", "name", "vintage"]);
    }

    #[test]
    fn projection_restricts_fields_and_required() {
        let mut session = Session::default();
        bottle(&mut session);
        assert!(projected(&mut session).is_empty());
        let design = session.design();
        let bottle = design.find_type("Bottle").unwrap();
        let tiny = design.user_type(design.projection(bottle, "tiny").unwrap());
        assert_eq!(tiny.name, "BottleTiny");
        assert_eq!(
            tiny.result.as_ref().unwrap().identifier,
            "application/vnd.bottle; view=tiny"
        );
        assert_eq!(design.object(tiny.attr).unwrap().len(), 1);
        assert_eq!(design.attr(tiny.attr).required(), vec!["id"]);
    }

    #[test]
    fn nested_results_follow_pinned_view() {
        let mut session = Session::default();
        bottle(&mut session);
        session.result_type("application/vnd.cellar", |s| {
            s.attributes(|s| {
                s.attribute_with("best", "Bottle", |s| s.use_view("tiny"));
                s.attribute("all", crate::dsl::collection_of("Bottle"));
            });
        });
        assert!(projected(&mut session).is_empty());
        let design = session.design();
        let cellar = design.find_type("Cellar").unwrap();
        let projection = design.user_type(design.projection(cellar, DEFAULT_VIEW).unwrap());
        let best = design.field(projection.attr, "best").unwrap();
        assert_eq!(design.attr_type_name(best), "BottleTiny");
        let all = design.field(projection.attr, "all").unwrap();
        assert_eq!(design.attr_type_name(all), "BottleCollection");
        assert_eq!(
            design.user_type(design.projection(cellar, DEFAULT_VIEW).unwrap()).kind,
            TypeKind::Projected
        );
    }

    #[test]
    fn unknown_pinned_view_is_reported() {
        let mut session = Session::default();
        bottle(&mut session);
        session.result_type("application/vnd.cellar", |s| {
            s.attributes(|s| s.attribute_with("best", "Bottle", |s| s.use_view("huge")));
        });
        let errors = projected(&mut session);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "view \"huge\" on field \"best\" cannot be computed: unknown view \"huge\" in result type \"Cellar\""
        );
    }

    #[test]
    fn projections_are_memoized() {
        let mut session = Session::default();
        bottle(&mut session);
        projected(&mut session);
        let before = session.design().projections.len();
        let meta = session.config.eval.view_meta.clone();
        project_views(&mut session.design, &meta);
        assert_eq!(session.design().projections.len(), before);
    }
}
