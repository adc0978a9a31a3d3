//! External type synthesis: mirror an external record as a user type.
//!
//! Nullable record fields become optional attributes, every other field is
//! required. Records are synthesized once per design and reused by name.

use std::collections::{HashMap, HashSet};

use super::{find_by_name, match_field, primitive_for, resolve, FieldMatch, Node, Records};
use crate::attribute::AttributeExpr;
use crate::error::TransformError;
use crate::expr::TypeKind;
use crate::session::Design;
use crate::shape::{Record, Shape, ShapeField};
use crate::types::{AttrId, DataType, Object, Primitive, TypeId};

pub(super) fn external_type<'s>(
    design: &mut Design,
    records: &Records<'s>,
    meta_key: &str,
    designed: AttrId,
    record: &'s Record,
) -> Result<TypeId, TransformError> {
    let externals = design
        .type_ids()
        .filter(|id| design.user_type(*id).kind == TypeKind::External)
        .map(|id| (design.user_type(id).name.clone(), id))
        .collect();
    let mut synth = Synthesizer {
        records,
        meta_key,
        externals,
    };
    synth.record(design, Some(designed), record, super::ROOT_PATH)
}

struct Synthesizer<'r, 's> {
    records: &'r Records<'s>,
    meta_key: &'r str,
    externals: HashMap<String, TypeId>,
}

impl<'s> Synthesizer<'_, 's> {
    fn record(
        &mut self,
        design: &mut Design,
        designed: Option<AttrId>,
        record: &'s Record,
        path: &str,
    ) -> Result<TypeId, TransformError> {
        if let Some(&id) = self.externals.get(&record.name) {
            return Ok(id);
        }
        let attr = design.new_attr(AttributeExpr::default());
        let id = design.add_unindexed_type(&record.name, attr, TypeKind::External, None);
        self.externals.insert(record.name.clone(), id);

        let skipped = designed
            .map(|d| skipped_fields(design, d, record, self.meta_key))
            .unwrap_or_default();
        let mut obj = Object::new();
        let mut required = Vec::new();
        for field in &record.fields {
            if skipped.contains(field.name.as_str()) {
                continue;
            }
            let field_path = format!("{}.{}", path, field.name);
            let (inner, nullable) = field.shape.unwrap_nullable();
            if nullable {
                let unsupported = match inner {
                    Shape::Sequence(_) => Some(("optional-sequence", "sequence")),
                    Shape::Keyed(_, _) => Some(("optional-keyed-collection", "keyed collection")),
                    _ => None,
                };
                if let Some((kind, instead)) = unsupported {
                    return Err(TransformError::Unsupported {
                        path: field_path,
                        message: format!(
                            "field of type {} is not supported, use {} instead",
                            kind, instead
                        ),
                    });
                }
            }
            let counterpart = designed.and_then(|d| counterpart(design, d, field, record, self.meta_key));
            let dt = self.data_type(design, counterpart, inner, &field_path)?;
            let field_attr = design.new_attr(AttributeExpr::typed(dt));
            obj.set(field.name.clone(), field_attr);
            if !nullable {
                required.push(field.name.clone());
            }
        }

        let synthesized = design.attr_mut(attr);
        synthesized.type_ = Some(DataType::Object(obj));
        if !required.is_empty() {
            synthesized.validation_mut().add_required(&required);
        }
        Ok(id)
    }

    fn data_type(
        &mut self,
        design: &mut Design,
        designed: Option<AttrId>,
        shape: &'s Shape,
        path: &str,
    ) -> Result<DataType, TransformError> {
        if let Shape::Nullable(_) = shape {
            let mut inner = shape;
            while let Shape::Nullable(next) = inner {
                inner = next;
            }
            if !matches!(inner, Shape::Record(_) | Shape::RecordRef(_)) {
                return Err(TransformError::Unsupported {
                    path: path.to_string(),
                    message: format!(
                        "optional {} is not supported, only optional records can be converted",
                        inner.display_name()
                    ),
                });
            }
        }
        let (node, _) = resolve(shape, self.records)?;
        match node {
            Node::Prim(kind) => primitive_for(kind).map(DataType::Primitive).ok_or_else(|| {
                TransformError::Unsupported {
                    path: path.to_string(),
                    message: "field of type byte is not supported, use a sequence of bytes instead"
                        .to_string(),
                }
            }),
            Node::Seq(elem) if super::is_byte(elem) => Ok(DataType::Primitive(Primitive::Bytes)),
            Node::Seq(elem) => {
                let designed_elem = designed.and_then(|d| match design.resolved_type(d) {
                    Some(DataType::Array(e)) => Some(*e),
                    _ => None,
                });
                let dt = self.data_type(design, designed_elem, elem, &format!("{}[0]", path))?;
                Ok(DataType::Array(design.new_attr(AttributeExpr::typed(dt))))
            }
            Node::Keyed(key, value) => {
                let (designed_key, designed_elem) = match designed.and_then(|d| design.resolved_type(d)) {
                    Some(DataType::Map { key, elem }) => (Some(*key), Some(*elem)),
                    _ => (None, None),
                };
                let key_dt = self.data_type(design, designed_key, key, &format!("{}.key", path))?;
                let elem_dt =
                    self.data_type(design, designed_elem, value, &format!("{}.value", path))?;
                Ok(DataType::Map {
                    key: design.new_attr(AttributeExpr::typed(key_dt)),
                    elem: design.new_attr(AttributeExpr::typed(elem_dt)),
                })
            }
            Node::Record(record) => Ok(DataType::User(self.record(design, designed, record, path)?)),
        }
    }
}

/// External fields whose design counterpart opted out with `-`.
fn skipped_fields(design: &Design, designed: AttrId, record: &Record, meta_key: &str) -> HashSet<String> {
    let Some(obj) = design.object(designed) else {
        return HashSet::new();
    };
    obj.iter()
        .filter(|f| design.attr(f.attr).meta_value(meta_key) == Some("-"))
        .filter_map(|f| find_by_name(record, &f.name))
        .map(|f| f.name.clone())
        .collect()
}

/// The design field mapped to `field`, if any.
fn counterpart(
    design: &Design,
    designed: AttrId,
    field: &ShapeField,
    record: &Record,
    meta_key: &str,
) -> Option<AttrId> {
    design.object(designed)?.iter().find_map(|f| {
        match match_field(design, f.attr, &f.name, record, meta_key) {
            FieldMatch::Found(external) if external.name == field.name => Some(f.attr),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1_execute::execute_roots;
    use crate::session::Session;
    use crate::shape::ShapeKind;

    fn designed(session: &mut Session) -> AttrId {
        session.type_("User", |s| {
            s.attribute("id", Primitive::String);
            s.attribute("nick", Primitive::String);
            s.attribute_with("cache", Primitive::String, |s| {
                s.meta("struct.field.external", &["-"])
            });
        });
        execute_roots(session);
        let design = session.design();
        design.user_type(design.find_type("User").unwrap()).attr
    }

    fn synthesize(session: &mut Session, attr: AttrId, shape: &Shape) -> Result<TypeId, TransformError> {
        let records = shape.records();
        let Shape::Record(record) = shape else { unreachable!() };
        external_type(&mut session.design, &records, "struct.field.external", attr, record)
    }

    #[test]
    fn nullable_fields_are_optional() {
        let mut session = Session::default();
        let attr = designed(&mut session);
        let shape = Shape::record(
            "UserModel",
            [
                ("ID", Shape::prim(ShapeKind::String)),
                ("Nick", Shape::nullable(Shape::prim(ShapeKind::String))),
                ("Cache", Shape::prim(ShapeKind::String)),
                ("Avatar", Shape::seq(Shape::prim(ShapeKind::Byte))),
            ],
        );
        let id = synthesize(&mut session, attr, &shape).unwrap();
        let design = session.design();
        let t = design.user_type(id);
        assert_eq!(t.kind, TypeKind::External);
        assert_eq!(t.name, "UserModel");
        assert!(design.find_type("UserModel").is_none());
        let names: Vec<_> = design.object(t.attr).unwrap().names().collect();
        assert_eq!(names, vec!["ID", "Nick", "Avatar"]);
        assert_eq!(design.attr(t.attr).required(), vec!["ID", "Avatar"]);
        let avatar = design.field(t.attr, "Avatar").unwrap();
        assert_eq!(design.attr_type_name(avatar), "bytes");
    }

    #[test]
    fn optional_sequence_is_rejected() {
        let mut session = Session::default();
        let attr = designed(&mut session);
        let shape = Shape::record(
            "UserModel",
            [
                ("ID", Shape::prim(ShapeKind::String)),
                ("Tags", Shape::nullable(Shape::seq(Shape::prim(ShapeKind::String)))),
            ],
        );
        let err = synthesize(&mut session, attr, &shape).unwrap_err();
        assert_eq!(
            err.to_string(),
            "<value>.Tags: field of type optional-sequence is not supported, use sequence instead"
        );
    }

    #[test]
    fn nested_optional_containers_are_rejected() {
        let cases = [
            (
                Shape::seq(Shape::nullable(Shape::seq(Shape::prim(ShapeKind::Int)))),
                "<value>.Extra[0]: optional sequence is not supported, only optional records can be converted",
            ),
            (
                Shape::keyed(
                    Shape::prim(ShapeKind::String),
                    Shape::nullable(Shape::keyed(
                        Shape::prim(ShapeKind::String),
                        Shape::prim(ShapeKind::Int),
                    )),
                ),
                "<value>.Extra.value: optional keyed collection is not supported, only optional records can be converted",
            ),
            (
                Shape::nullable(Shape::nullable(Shape::seq(Shape::prim(ShapeKind::String)))),
                "<value>.Extra: optional sequence is not supported, only optional records can be converted",
            ),
        ];
        for (extra, expected) in cases {
            let mut session = Session::default();
            let attr = designed(&mut session);
            let shape = Shape::record(
                "UserModel",
                [("ID", Shape::prim(ShapeKind::String)), ("Extra", extra)],
            );
            let err = synthesize(&mut session, attr, &shape).unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn optional_nested_record_is_accepted() {
        let mut session = Session::default();
        let attr = designed(&mut session);
        let shape = Shape::record(
            "UserModel",
            [(
                "Friends",
                Shape::seq(Shape::nullable(Shape::record(
                    "Friend",
                    [("ID", Shape::prim(ShapeKind::String))],
                ))),
            )],
        );
        assert!(synthesize(&mut session, attr, &shape).is_ok());
    }

    #[test]
    fn records_are_reused_by_name() {
        let mut session = Session::default();
        let attr = designed(&mut session);
        let shape = Shape::record(
            "UserModel",
            [
                ("ID", Shape::prim(ShapeKind::String)),
                ("Friends", Shape::seq(Shape::record_ref("UserModel"))),
            ],
        );
        let first = synthesize(&mut session, attr, &shape).unwrap();
        let second = synthesize(&mut session, attr, &shape).unwrap();
        assert_eq!(first, second);
        let design = session.design();
        let friends = design.field(design.user_type(first).attr, "Friends").unwrap();
        let Some(DataType::Array(elem)) = &design.attr(friends).type_ else {
            panic!("expected an array");
        };
        assert_eq!(design.attr(*elem).type_, Some(DataType::User(first)));
    }
}
