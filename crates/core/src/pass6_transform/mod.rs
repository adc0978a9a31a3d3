//! Pass 6: Structural transformation -- pair design types with external
//! record shapes.
//!
//! For every `convert_to` / `create_from` declaration this pass:
//!
//! 1. checks the design type and the external shape are structurally
//!    compatible ([`compatible`]),
//! 2. synthesizes an external user type mirroring the shape (see
//!    `synthesize`),
//! 3. plans the conversion: one [`FieldConversion`] per matched field plus
//!    uniquely named helpers for nested objects, sequences and keyed
//!    collections (see `convert`).
//!
//! Mismatches are reported with a path rooted at `<value>`, such as
//! `<value>.lines[0].key`.

mod compatible;
mod convert;
mod synthesize;

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::config::TransformSettings;
use crate::error::{EvalError, TransformError};
use crate::expr::{Direction, Expr, TypeMap};
use crate::names::{lower_first, snake_case, Uniquifier};
use crate::session::Design;
use crate::shape::{Record, Shape, ShapeField, ShapeKind};
use crate::types::{AttrId, Primitive, TypeId};

pub use compatible::compatible;

/// Root of every path reported by the transformation engine.
pub const ROOT_PATH: &str = "<value>";

// ── Plans ────────────────────────────────────────────────────────────

/// How a design type is converted to (or created from) an external record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    pub user: TypeId,
    /// Synthesized type mirroring the external record.
    pub external: TypeId,
    pub direction: Direction,
    pub external_name: String,
    /// Entry function name, e.g. `ConvertToUserModel`.
    pub function: String,
    pub fields: Vec<FieldConversion>,
    /// Every helper the entry function reaches, in first-use order.
    pub helpers: Vec<Helper>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConversion {
    pub source: String,
    pub target: String,
    pub conversion: Conversion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Plain assignment.
    Direct,
    /// Optional source, required target.
    Dereference,
    /// Required source, optional target.
    AddressOf,
    /// Nested value converted by a helper.
    Recurse { helper: String },
}

impl Conversion {
    pub fn helper(&self) -> Option<&str> {
        match self {
            Conversion::Recurse { helper } => Some(helper),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Helper {
    pub name: String,
    pub source: String,
    pub target: String,
    pub body: HelperBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HelperBody {
    Object(Vec<FieldConversion>),
    Array { elem: Conversion },
    Map { key: Conversion, elem: Conversion },
}

impl HelperBody {
    fn conversions(&self) -> Vec<&Conversion> {
        match self {
            HelperBody::Object(fields) => fields.iter().map(|f| &f.conversion).collect(),
            HelperBody::Array { elem } => vec![elem],
            HelperBody::Map { key, elem } => vec![key, elem],
        }
    }
}

// ── Shared shape helpers ─────────────────────────────────────────────

type Records<'s> = HashMap<&'s str, &'s Record>;

/// A shape with nullability stripped and record references resolved.
enum Node<'s> {
    Prim(ShapeKind),
    Seq(&'s Shape),
    Keyed(&'s Shape, &'s Shape),
    Record(&'s Record),
}

fn resolve<'s>(shape: &'s Shape, records: &Records<'s>) -> Result<(Node<'s>, bool), TransformError> {
    let (inner, nullable) = shape.unwrap_nullable();
    let node = match inner {
        Shape::Primitive(kind) => Node::Prim(*kind),
        Shape::Sequence(elem) => Node::Seq(elem),
        Shape::Keyed(key, value) => Node::Keyed(key, value),
        Shape::Record(record) => Node::Record(record),
        Shape::RecordRef(name) => Node::Record(
            records
                .get(name.as_str())
                .copied()
                .ok_or_else(|| TransformError::UnknownRecord(name.clone()))?,
        ),
        Shape::Nullable(_) => return resolve(inner, records).map(|(node, _)| (node, true)),
    };
    Ok((node, nullable))
}

fn is_byte(shape: &Shape) -> bool {
    matches!(shape.unwrap_nullable().0, Shape::Primitive(ShapeKind::Byte))
}

/// Design primitive for a leaf kind. A lone byte has none.
fn primitive_for(kind: ShapeKind) -> Option<Primitive> {
    Some(match kind {
        ShapeKind::Bool => Primitive::Boolean,
        ShapeKind::Int => Primitive::Int,
        ShapeKind::Int32 => Primitive::Int32,
        ShapeKind::Int64 => Primitive::Int64,
        ShapeKind::UInt => Primitive::UInt,
        ShapeKind::UInt32 => Primitive::UInt32,
        ShapeKind::UInt64 => Primitive::UInt64,
        ShapeKind::Float32 => Primitive::Float32,
        ShapeKind::Float64 => Primitive::Float64,
        ShapeKind::String => Primitive::String,
        ShapeKind::Any => Primitive::Any,
        ShapeKind::Byte => return None,
    })
}

enum FieldMatch<'s> {
    /// The attribute opted out with external metadata `-`.
    Skip,
    Found(&'s ShapeField),
    Missing,
}

/// The external field a design attribute maps to: the field named by its
/// external metadata, else the first field matching by exact name, then
/// with a lower-cased first letter, then in snake case.
fn match_field<'s>(
    design: &Design,
    attr: AttrId,
    name: &str,
    record: &'s Record,
    meta_key: &str,
) -> FieldMatch<'s> {
    if let Some(external) = design.attr(attr).meta_value(meta_key) {
        if external == "-" {
            return FieldMatch::Skip;
        }
        return record.field(external).map_or(FieldMatch::Missing, FieldMatch::Found);
    }
    find_by_name(record, name).map_or(FieldMatch::Missing, FieldMatch::Found)
}

fn find_by_name<'s>(record: &'s Record, name: &str) -> Option<&'s ShapeField> {
    record
        .field(name)
        .or_else(|| record.fields.iter().find(|f| lower_first(&f.name) == name))
        .or_else(|| {
            let snake = snake_case(name);
            record.fields.iter().find(|f| snake_case(&f.name) == snake)
        })
}

// ── Entry ────────────────────────────────────────────────────────────

pub fn transform(design: &mut Design, settings: &TransformSettings) -> Vec<EvalError> {
    design.plans.clear();
    let mut errors = Vec::new();
    let mut names = Uniquifier::new();
    let mut helpers = BTreeMap::new();

    let maps = design.type_maps.clone();
    for map in &maps {
        let ctx = design.eval_name(Expr::UserType(map.user));
        match plan_map(design, settings, map, &mut names, &mut helpers) {
            Ok(plan) => {
                debug!(
                    function = %plan.function,
                    helpers = plan.helpers.len(),
                    "conversion planned"
                );
                design.plans.push(plan);
            }
            Err(err) => errors.push(EvalError::detached(format!("{} in {}", err, ctx))),
        }
    }
    errors
}

fn plan_map(
    design: &mut Design,
    settings: &TransformSettings,
    map: &TypeMap,
    names: &mut Uniquifier,
    helpers: &mut BTreeMap<String, Helper>,
) -> Result<ConversionPlan, TransformError> {
    let records = map.shape.records();
    let Node::Record(record) = resolve(&map.shape, &records)?.0 else {
        return Err(TransformError::Unsupported {
            path: ROOT_PATH.to_string(),
            message: format!(
                "external type must be a record, got {}",
                map.shape.display_name()
            ),
        });
    };
    let user = design.resolve_id(map.user);
    let attr = design.user_type(user).attr;
    compatible::check(design, &records, &settings.external_field_meta, attr, &map.shape)?;
    let external = synthesize::external_type(
        design,
        &records,
        &settings.external_field_meta,
        attr,
        record,
    )?;

    let mut planner = convert::Planner {
        design: &*design,
        records: &records,
        meta_key: &settings.external_field_meta,
        prefix: &settings.helper_prefix,
        direction: map.direction,
        names,
        helpers,
    };
    Ok(planner.plan(user, external, record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_model() -> Record {
        Record {
            name: "UserModel".to_string(),
            fields: vec![
                ShapeField {
                    name: "ID".to_string(),
                    shape: Shape::prim(ShapeKind::String),
                },
                ShapeField {
                    name: "FirstName".to_string(),
                    shape: Shape::prim(ShapeKind::String),
                },
                ShapeField {
                    name: "user_name".to_string(),
                    shape: Shape::prim(ShapeKind::String),
                },
            ],
        }
    }

    #[test]
    fn fields_match_by_name_rules() {
        let record = user_model();
        assert_eq!(find_by_name(&record, "ID").unwrap().name, "ID");
        assert_eq!(find_by_name(&record, "firstName").unwrap().name, "FirstName");
        assert_eq!(find_by_name(&record, "userName").unwrap().name, "user_name");
        assert!(find_by_name(&record, "email").is_none());
    }

    #[test]
    fn record_references_resolve() {
        let shape = Shape::record("Node", [("Next", Shape::nullable(Shape::record_ref("Node")))]);
        let records = shape.records();
        let Shape::Record(node) = &shape else { unreachable!() };
        let (next, nullable) = resolve(&node.fields[0].shape, &records).unwrap();
        assert!(nullable);
        assert!(matches!(next, Node::Record(r) if r.name == "Node"));
        let dangling = Shape::record_ref("Missing");
        assert!(matches!(
            resolve(&dangling, &records),
            Err(TransformError::UnknownRecord(name)) if name == "Missing"
        ));
    }

    #[test]
    fn byte_has_no_primitive() {
        assert_eq!(primitive_for(ShapeKind::Byte), None);
        assert_eq!(primitive_for(ShapeKind::Bool), Some(Primitive::Boolean));
    }
}
