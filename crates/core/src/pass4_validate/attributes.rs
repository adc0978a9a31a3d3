//! Attribute validation: types, bounds, defaults, enums and required names.

use std::collections::HashSet;

use crate::error::EvalError;
use crate::expr::TypeKind;
use crate::session::Design;
use crate::types::{AttrId, DataType, TypeId};

/// Walks attribute trees and accumulates validation errors.
pub(super) struct Checker<'a> {
    pub(super) design: &'a Design,
    pub(super) view_meta: &'a str,
    /// Unknown pinned views inside result types are reported by projection.
    pub(super) defer_unknown_views: bool,
    errors: Vec<EvalError>,
    visited: HashSet<AttrId>,
    unknown: HashSet<TypeId>,
}

impl<'a> Checker<'a> {
    pub(super) fn new(design: &'a Design, view_meta: &'a str) -> Self {
        Checker {
            design,
            view_meta,
            defer_unknown_views: false,
            errors: Vec::new(),
            visited: HashSet::new(),
            unknown: HashSet::new(),
        }
    }

    pub(super) fn report(&mut self, message: String, ctx: &str) {
        self.errors.push(EvalError::detached(format!("{} in {}", message, ctx)));
    }

    pub(super) fn finish(self) -> Vec<EvalError> {
        self.errors
    }

    /// Validate `attr` and everything nested in it. `type_name` names the
    /// declared type `attr` belongs to, if any.
    pub(super) fn walk_root(&mut self, attr: AttrId, ctx: &str, type_name: Option<&str>) {
        self.walk(attr, ctx, &mut Vec::new(), type_name);
    }

    fn walk(&mut self, attr: AttrId, root: &str, path: &mut Vec<String>, type_name: Option<&str>) {
        if !self.visited.insert(attr) {
            return;
        }
        let ctx = if path.is_empty() {
            root.to_string()
        } else {
            format!("attribute \"{}\" of {}", path.join("."), root)
        };
        self.check_attr(attr, &ctx, type_name);

        let design = self.design;
        let nested: Vec<(String, AttrId)> = match &design.attr(attr).type_ {
            Some(DataType::Array(elem)) => vec![("[0]".to_string(), *elem)],
            Some(DataType::Map { key, elem }) => {
                vec![("key".to_string(), *key), ("value".to_string(), *elem)]
            }
            Some(DataType::Object(obj)) | Some(DataType::Union(obj)) => obj
                .iter()
                .map(|f| (f.name.clone(), f.attr))
                .collect(),
            _ => Vec::new(),
        };
        for (segment, child) in nested {
            path.push(segment);
            self.walk(child, root, path, None);
            path.pop();
        }
    }

    fn check_attr(&mut self, attr: AttrId, ctx: &str, type_name: Option<&str>) {
        let design = self.design;
        let a = design.attr(attr);

        let mut referenced: Vec<TypeId> = Vec::new();
        if let Some(DataType::User(t)) = &a.type_ {
            referenced.push(*t);
        }
        referenced.extend(a.bases.iter().copied());
        referenced.extend(a.references.iter().copied());
        for t in referenced {
            self.check_declared(t, ctx);
        }

        if let Some(v) = &a.validation {
            for conflict in v.bound_conflicts() {
                self.report(conflict.to_string(), ctx);
            }
        }

        let type_display = design.attr_type_name(attr);
        if let Some(default) = &a.default {
            let values = a.validation.as_ref().map(|v| v.values.as_slice()).unwrap_or(&[]);
            let primitive = matches!(a.type_, Some(DataType::Primitive(_)));
            if primitive && !values.is_empty() && !values.contains(default) {
                self.report(
                    format!(
                        "default value {} is not one of the accepted values: {}",
                        default,
                        serde_json::Value::Array(values.to_vec())
                    ),
                    ctx,
                );
            }
            if !design.is_compatible(attr, default) {
                self.report(
                    format!(
                        "default value {} is incompatible with attribute of type {}",
                        default, type_display
                    ),
                    ctx,
                );
            }
        }
        if let Some(v) = &a.validation {
            for value in &v.values {
                if !design.is_compatible(attr, value) {
                    self.report(
                        format!(
                            "value {} in enum is incompatible with attribute of type {}",
                            value, type_display
                        ),
                        ctx,
                    );
                }
            }
        }

        let required = a.required();
        if !required.is_empty() {
            let owner = type_name.map(str::to_string).unwrap_or(type_display);
            match design.object(attr) {
                Some(obj) => {
                    for name in required {
                        if !obj.contains(name) {
                            self.report(
                                format!("required field \"{}\" does not exist in type {}", name, owner),
                                ctx,
                            );
                        }
                    }
                }
                None => self.report(
                    format!("required fields set on non-object type {}", owner),
                    ctx,
                ),
            }
        }

        self.check_view_meta(attr, ctx);
    }

    /// Report a reference to a type that was never declared, once per type.
    fn check_declared(&mut self, t: TypeId, ctx: &str) {
        let t = self.design.resolve_id(t);
        let ut = self.design.user_type(t);
        if ut.kind == TypeKind::Placeholder && self.unknown.insert(t) {
            let message = format!("unknown type \"{}\"", ut.name);
            self.report(message, ctx);
        }
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
    use serde_json::json;

    fn errors_of(session: &mut Session) -> Vec<String> {
        execute_roots(session);
        prepare(&mut session.design);
        inherit(&mut session.design);
        validate(session.design(), session.config())
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn unknown_type_reported_once() {
        let mut session = Session::default();
        session.type_("A", |s| {
            s.attribute("x", "Missing");
            s.attribute("y", "Missing");
        });
        let errors = errors_of(&mut session);
        assert_eq!(errors, vec!["unknown type \"Missing\" in attribute \"x\" of type \"A\""]);
    }

    #[test]
    fn default_must_fit_type() {
        let mut session = Session::default();
        session.type_("A", |s| {
            s.attribute_with("n", Primitive::UInt, |s| s.default_value(-1));
        });
        let errors = errors_of(&mut session);
        assert_eq!(
            errors,
            vec!["default value -1 is incompatible with attribute of type uint in attribute \"n\" of type \"A\""]
        );
    }

    #[test]
    fn enum_default_must_be_listed() {
        let mut session = Session::default();
        session.type_("A", |s| {
            s.attribute_with("c", Primitive::String, |s| {
                s.enum_values(&[json!("red"), json!("blue")]);
                s.default_value("green");
            });
        });
        let errors = errors_of(&mut session);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("default value \"green\" is not one of the accepted values"));
    }

    #[test]
    fn required_names_must_exist() {
        let mut session = Session::default();
        session.type_("A", |s| {
            s.attribute("a", Primitive::Int);
            s.required(&["a", "b"]);
        });
        let errors = errors_of(&mut session);
        assert_eq!(errors, vec!["required field \"b\" does not exist in type A in type \"A\""]);
    }

    #[test]
    fn conflicting_bounds() {
        let mut session = Session::default();
        session.type_("A", |s| {
            s.attribute_with("n", Primitive::Int, |s| {
                s.minimum(5.0);
                s.maximum(1.0);
            });
        });
        let errors = errors_of(&mut session);
        assert_eq!(
            errors,
            vec!["minimum is greater than maximum in attribute \"n\" of type \"A\""]
        );
    }
}
