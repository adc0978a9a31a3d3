//! Pass 3: Reference and base inheritance.
//!
//! References fill in properties of same-named fields that the local
//! declaration left unset. Bases contribute whole fields: every base field
//! missing locally is appended. Attributes still untyped afterwards become
//! `string`.

use std::collections::HashSet;

use tracing::debug;

use crate::attribute::Validation;
use crate::error::EvalError;
use crate::expr::TypeKind;
use crate::session::Design;
use crate::types::{AttrId, DataType, Object, Primitive, TypeId};

pub fn inherit(design: &mut Design) -> Vec<EvalError> {
    let mut resolver = Resolver::default();
    for idx in 0..design.attr_count() {
        resolver.resolve(design, AttrId(idx));
    }
    default_types(design);
    debug!(attributes = design.attr_count(), "inheritance resolved");
    resolver.errors
}

/// Resolves attributes depth first: a referenced or base type is complete
/// before anything inherits from it.
#[derive(Default)]
struct Resolver {
    done: HashSet<AttrId>,
    reported: HashSet<(TypeId, &'static str)>,
    errors: Vec<EvalError>,
}

impl Resolver {
    fn resolve(&mut self, design: &mut Design, attr: AttrId) {
        if !self.done.insert(attr) {
            return;
        }
        let references = design.attr(attr).references.clone();
        for r in references {
            if let Some(ref_attr) = self.inheritable(design, r, "Reference") {
                inherit_reference(design, attr, ref_attr);
            }
        }
        let bases = design.attr(attr).bases.clone();
        for b in bases {
            if let Some(base_attr) = self.inheritable(design, b, "Extend") {
                merge_base(design, attr, base_attr);
            }
        }
        for child in inline_children(design, attr) {
            self.resolve(design, child);
        }
    }

    /// The resolved attribute of `t` when it can be inherited from.
    /// Undeclared types are skipped here and reported by validation.
    fn inheritable(
        &mut self,
        design: &mut Design,
        t: TypeId,
        construct: &'static str,
    ) -> Option<AttrId> {
        let (kind, attr) = {
            let ut = design.user_type(t);
            (ut.kind, ut.attr)
        };
        if kind == TypeKind::Placeholder {
            return None;
        }
        self.resolve(design, attr);
        if design.object(attr).is_some() {
            return Some(attr);
        }
        if self.reported.insert((design.resolve_id(t), construct)) {
            self.errors.push(EvalError::detached(format!(
                "argument of {} must be an object, \"{}\" is not",
                construct,
                design.user_type(t).name
            )));
        }
        None
    }
}

/// Attributes nested in the inline type of `attr`. Named user types are
/// resolved on their own.
fn inline_children(design: &Design, attr: AttrId) -> Vec<AttrId> {
    match &design.attr(attr).type_ {
        Some(DataType::Object(obj)) | Some(DataType::Union(obj)) => {
            obj.iter().map(|f| f.attr).collect()
        }
        Some(DataType::Array(elem)) => vec![*elem],
        Some(DataType::Map { key, elem }) => vec![*key, *elem],
        _ => Vec::new(),
    }
}

fn local_object(design: &Design, attr: AttrId) -> Option<Vec<(String, AttrId)>> {
    let obj = design.attr(attr).type_.as_ref()?.as_object()?;
    Some(obj.iter().map(|f| (f.name.clone(), f.attr)).collect())
}

// ── References ──

fn inherit_reference(design: &mut Design, attr: AttrId, parent: AttrId) {
    let Some(fields) = local_object(design, attr) else {
        return;
    };
    let required: Vec<String> = design
        .all_required(parent)
        .into_iter()
        .filter(|name| fields.iter().any(|(f, _)| f == name))
        .collect();
    if !required.is_empty() {
        design.attr_mut(attr).validation_mut().add_required(&required);
    }
    inherit_recursive(design, attr, parent, &mut HashSet::new());
}

fn inherit_recursive(
    design: &mut Design,
    attr: AttrId,
    parent: AttrId,
    seen: &mut HashSet<(AttrId, AttrId)>,
) {
    if !seen.insert((attr, parent)) {
        return;
    }
    let Some(fields) = local_object(design, attr) else {
        return;
    };
    for (name, field) in fields {
        let Some(pfield) = design.field(parent, &name) else {
            continue;
        };
        let from = design.attr(pfield).clone();
        if design.attr(field).type_.is_none() {
            let copy = design.dup_attr(pfield);
            let dt = design.attr_mut(copy).type_.take();
            design.attr_mut(field).type_ = dt;
        }
        let local = design.attr_mut(field);
        if local.description.is_none() {
            local.description = from.description;
        }
        if local.default.is_none() {
            local.default = from.default;
        }
        if let Some(theirs) = from.validation {
            if let Some(ours) = local.validation.as_mut() {
                ours.add_required(&theirs.required);
            } else {
                local.validation = Some(theirs);
            }
        }
        if design.object(pfield).is_some() {
            inherit_recursive(design, field, pfield, seen);
        }
    }
}

// ── Bases ──

fn merge_base(design: &mut Design, attr: AttrId, base: AttrId) {
    if design.attr(attr).type_.is_none() {
        design.attr_mut(attr).type_ = Some(DataType::Object(Object::new()));
    }
    if local_object(design, attr).is_none() {
        return;
    }
    let base_fields: Vec<(String, AttrId)> = design
        .object(base)
        .map(|obj| obj.iter().map(|f| (f.name.clone(), f.attr)).collect())
        .unwrap_or_default();
    for (name, field) in base_fields {
        let exists = local_object(design, attr)
            .is_some_and(|fields| fields.iter().any(|(f, _)| *f == name));
        if exists {
            continue;
        }
        let copy = design.dup_attr(field);
        if let Some(obj) = design.attr_mut(attr).type_.as_mut().and_then(DataType::as_object_mut) {
            obj.set(name, copy);
        }
    }
    let mut base_validation: Validation = design.attr(base).validation.clone().unwrap_or_default();
    if base_validation.required.is_empty() {
        base_validation.required = design.all_required(base);
    }
    if !base_validation.is_empty() {
        design.attr_mut(attr).validation_mut().merge(&base_validation);
    }
}

fn default_types(design: &mut Design) {
    for idx in 0..design.attr_count() {
        let attr = design.attr_mut(AttrId(idx));
        if attr.type_.is_none() {
            attr.type_ = Some(DataType::Primitive(Primitive::String));
        }
    }
}
