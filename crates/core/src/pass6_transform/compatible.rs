//! Structural compatibility between a design attribute and an external
//! shape.

use std::collections::HashSet;

use super::{match_field, resolve, FieldMatch, Node, Records, ROOT_PATH};
use crate::config::TransformSettings;
use crate::error::TransformError;
use crate::session::Design;
use crate::shape::{Record, Shape, ShapeKind};
use crate::types::{AttrId, DataType, Object, Primitive};

/// Check that `attr` can be converted to and from `shape`. The first
/// mismatch is returned with its path.
pub fn compatible(
    design: &Design,
    attr: AttrId,
    shape: &Shape,
    settings: &TransformSettings,
) -> Result<(), TransformError> {
    let records = shape.records();
    check(design, &records, &settings.external_field_meta, attr, shape)
}

pub(super) fn check<'s>(
    design: &Design,
    records: &Records<'s>,
    meta_key: &str,
    attr: AttrId,
    shape: &'s Shape,
) -> Result<(), TransformError> {
    let mut matcher = Matcher {
        design,
        records,
        meta_key,
        seen: HashSet::new(),
    };
    matcher.attr(attr, shape, ROOT_PATH)
}

struct Matcher<'d, 'r, 's> {
    design: &'d Design,
    records: &'r Records<'s>,
    meta_key: &'r str,
    /// (attribute, record) pairs already checked; recursive types stop here.
    seen: HashSet<(AttrId, String)>,
}

impl<'d, 's> Matcher<'d, '_, 's> {
    fn attr(&mut self, attr: AttrId, shape: &'s Shape, path: &str) -> Result<(), TransformError> {
        let design = self.design;
        let Some(dt) = design.resolved_type(attr) else {
            return Ok(());
        };
        let (node, _) = resolve(shape, self.records)?;
        match (dt, node) {
            (DataType::Primitive(Primitive::Any), _) => Ok(()),
            (DataType::Union(_), _) => Err(TransformError::Unsupported {
                path: path.to_string(),
                message: "union types are not supported".to_string(),
            }),
            (DataType::Primitive(Primitive::Bytes), Node::Seq(elem)) if super::is_byte(elem) => {
                Ok(())
            }
            (DataType::Primitive(p), Node::Prim(kind))
                if kind == ShapeKind::Any || super::primitive_for(kind) == Some(*p) =>
            {
                Ok(())
            }
            (DataType::Primitive(p), _) => Err(TransformError::Mismatch(format!(
                "type of {} is {} but type of corresponding attribute is {}",
                path,
                shape.display_name(),
                p.name()
            ))),
            (DataType::Array(elem), Node::Seq(e)) => self.attr(*elem, e, &format!("{}[0]", path)),
            (DataType::Array(_), _) => {
                Err(TransformError::Mismatch(format!("{} must be a sequence", path)))
            }
            (DataType::Map { key, elem }, Node::Keyed(k, v)) => {
                self.attr(*key, k, &format!("{}.key", path))?;
                self.attr(*elem, v, &format!("{}.value", path))
            }
            (DataType::Map { .. }, _) => Err(TransformError::Mismatch(format!(
                "{} is not a keyed collection",
                path
            ))),
            (DataType::Object(obj), Node::Record(record)) => self.object(attr, obj, record, path),
            (DataType::Object(_), _) => Err(TransformError::Mismatch(format!(
                "{} is a {}, expected a record",
                path,
                shape.display_name()
            ))),
            (DataType::User(_), _) => Ok(()),
        }
    }

    fn object(
        &mut self,
        attr: AttrId,
        obj: &'d Object,
        record: &'s Record,
        path: &str,
    ) -> Result<(), TransformError> {
        if !self.seen.insert((attr, record.name.clone())) {
            return Ok(());
        }
        for field in obj.iter() {
            match match_field(self.design, field.attr, &field.name, record, self.meta_key) {
                FieldMatch::Skip => {}
                FieldMatch::Missing => {
                    return Err(TransformError::Mismatch(format!(
                        "could not find field matching attribute \"{}\" at {} of external type \"{}\"",
                        field.name, path, record.name
                    )))
                }
                FieldMatch::Found(external) => {
                    self.attr(field.attr, &external.shape, &format!("{}.{}", path, field.name))?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1_execute::execute_roots;
    use crate::session::Session;

    fn settings() -> TransformSettings {
        TransformSettings::default()
    }

    fn user(session: &mut Session) {
        session.type_("User", |s| {
            s.attribute("id", Primitive::String);
            s.attribute("age", Primitive::Int);
            s.attribute("tags", crate::dsl::array_of(Primitive::String));
        });
        execute_roots(session);
    }

    fn attr_of(session: &Session, name: &str) -> AttrId {
        let design = session.design();
        design.user_type(design.find_type(name).unwrap()).attr
    }

    #[test]
    fn matching_record_is_compatible() {
        let mut session = Session::default();
        user(&mut session);
        let shape = Shape::record(
            "UserModel",
            [
                ("ID", Shape::prim(ShapeKind::String)),
                ("Age", Shape::nullable(Shape::prim(ShapeKind::Int))),
                ("Tags", Shape::seq(Shape::prim(ShapeKind::String))),
                ("Extra", Shape::prim(ShapeKind::Bool)),
            ],
        );
        let attr = attr_of(&session, "User");
        assert_eq!(compatible(session.design(), attr, &shape, &settings()), Ok(()));
    }

    #[test]
    fn missing_field_is_reported_with_path() {
        let mut session = Session::default();
        user(&mut session);
        let shape = Shape::record("UserModel", [("ID", Shape::prim(ShapeKind::String))]);
        let attr = attr_of(&session, "User");
        let err = compatible(session.design(), attr, &shape, &settings()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "types don't match: could not find field matching attribute \"age\" at <value> of external type \"UserModel\""
        );
    }

    #[test]
    fn nested_kind_mismatch_names_both_kinds() {
        let mut session = Session::default();
        user(&mut session);
        let shape = Shape::record(
            "UserModel",
            [
                ("ID", Shape::prim(ShapeKind::String)),
                ("Age", Shape::prim(ShapeKind::Int)),
                ("Tags", Shape::seq(Shape::prim(ShapeKind::Int))),
            ],
        );
        let attr = attr_of(&session, "User");
        let err = compatible(session.design(), attr, &shape, &settings()).unwrap_err();
        assert_eq!(
            err,
            TransformError::Mismatch(
                "type of <value>.tags[0] is int but type of corresponding attribute is string"
                    .to_string()
            )
        );
    }

    #[test]
    fn container_kinds_must_agree() {
        let mut session = Session::default();
        session.type_("Bag", |s| {
            s.attribute("items", crate::dsl::map_of(Primitive::String, Primitive::Int));
        });
        execute_roots(&mut session);
        let attr = attr_of(&session, "Bag");
        let shape = Shape::record("BagModel", [("Items", Shape::seq(Shape::prim(ShapeKind::Int)))]);
        let err = compatible(session.design(), attr, &shape, &settings()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "types don't match: <value>.items is not a keyed collection"
        );
    }

    #[test]
    fn external_metadata_renames_and_skips() {
        let mut session = Session::default();
        session.type_("User", |s| {
            s.attribute_with("id", Primitive::String, |s| {
                s.meta("struct.field.external", &["Key"])
            });
            s.attribute_with("cache", Primitive::String, |s| {
                s.meta("struct.field.external", &["-"])
            });
        });
        execute_roots(&mut session);
        let attr = attr_of(&session, "User");
        let shape = Shape::record("UserModel", [("Key", Shape::prim(ShapeKind::String))]);
        assert_eq!(compatible(session.design(), attr, &shape, &settings()), Ok(()));
    }

    #[test]
    fn recursive_types_terminate() {
        let mut session = Session::default();
        session.type_("Tree", |s| {
            s.attribute("value", Primitive::Int);
            s.attribute("children", crate::dsl::array_of("Tree"));
        });
        execute_roots(&mut session);
        let attr = attr_of(&session, "Tree");
        let shape = Shape::record(
            "TreeModel",
            [
                ("Value", Shape::prim(ShapeKind::Int)),
                ("Children", Shape::seq(Shape::record_ref("TreeModel"))),
            ],
        );
        assert_eq!(compatible(session.design(), attr, &shape, &settings()), Ok(()));
    }
}
