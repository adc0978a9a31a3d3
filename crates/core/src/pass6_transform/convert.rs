//! Conversion planning.
//!
//! Each matched field is assigned directly, dereferenced, has its address
//! taken, or is handed to a helper when it holds a nested object, sequence
//! or keyed collection. Helper names are claimed before their bodies are
//! planned so recursive types reuse the helper being built.

use std::collections::{BTreeMap, HashSet, VecDeque};

use super::{
    is_byte, match_field, resolve, Conversion, ConversionPlan, FieldConversion, FieldMatch,
    Helper, HelperBody, Node, Records,
};
use crate::expr::Direction;
use crate::names::{upper_first, Uniquifier};
use crate::session::Design;
use crate::shape::{Record, Shape};
use crate::types::{AttrId, DataType, TypeId};

pub(super) struct Planner<'a, 's> {
    pub(super) design: &'a Design,
    pub(super) records: &'a Records<'s>,
    pub(super) meta_key: &'a str,
    pub(super) prefix: &'a str,
    pub(super) direction: Direction,
    /// Shared by every plan of one run.
    pub(super) names: &'a mut Uniquifier,
    pub(super) helpers: &'a mut BTreeMap<String, Helper>,
}

enum Pending<'s> {
    Object(&'s Record),
    Array(AttrId, &'s Shape),
    Map(AttrId, AttrId, &'s Shape, &'s Shape),
}

impl<'s> Planner<'_, 's> {
    pub(super) fn plan(&mut self, user: TypeId, external: TypeId, record: &'s Record) -> ConversionPlan {
        let design = self.design;
        let t = design.user_type(user);
        let entry = match self.direction {
            Direction::ConvertTo => "ConvertTo",
            Direction::CreateFrom => "CreateFrom",
        };
        let function = self.names.name_for(
            &format!("entry|{}|{}|{}", entry, t.name, record.name),
            &format!("{}{}", entry, record.name),
        );
        let fields = self.fields(t.attr, record);
        let helpers = self.reachable(&fields);
        ConversionPlan {
            user,
            external,
            direction: self.direction,
            external_name: record.name.clone(),
            function,
            fields,
            helpers,
        }
    }

    /// (source, target) for a (design, external) pair.
    fn oriented<T>(&self, designed: T, external: T) -> (T, T) {
        match self.direction {
            Direction::ConvertTo => (designed, external),
            Direction::CreateFrom => (external, designed),
        }
    }

    fn fields(&mut self, attr: AttrId, record: &'s Record) -> Vec<FieldConversion> {
        let design = self.design;
        let Some(obj) = design.object(attr) else {
            return Vec::new();
        };
        let required = design.all_required(attr);
        let mut out = Vec::new();
        for field in obj.iter() {
            let FieldMatch::Found(external) =
                match_field(design, field.attr, &field.name, record, self.meta_key)
            else {
                continue;
            };
            let designed_optional =
                !required.contains(&field.name) && design.attr(field.attr).default.is_none();
            let external_optional = external.shape.unwrap_nullable().1;
            let conversion = self.conversion(
                field.attr,
                &external.shape,
                designed_optional,
                external_optional,
                &field.name,
            );
            let (source, target) = self.oriented(field.name.clone(), external.name.clone());
            out.push(FieldConversion {
                source,
                target,
                conversion,
            });
        }
        out
    }

    fn conversion(
        &mut self,
        attr: AttrId,
        shape: &'s Shape,
        designed_optional: bool,
        external_optional: bool,
        hint: &str,
    ) -> Conversion {
        if let Some(helper) = self.helper(attr, shape, hint) {
            return Conversion::Recurse { helper };
        }
        match self.oriented(designed_optional, external_optional) {
            (true, false) => Conversion::Dereference,
            (false, true) => Conversion::AddressOf,
            _ => Conversion::Direct,
        }
    }

    /// The helper converting a nested object, sequence or keyed collection,
    /// planned on first use. `None` for leaves.
    fn helper(&mut self, attr: AttrId, shape: &'s Shape, hint: &str) -> Option<String> {
        let design = self.design;
        let dt = design.resolved_type(attr)?;
        let (node, _) = resolve(shape, self.records).ok()?;
        let (designed_name, designed_key) = match &design.attr(attr).type_ {
            Some(DataType::User(t)) => (
                design.user_type(*t).name.clone(),
                format!("type{}", design.resolve_id(*t).index()),
            ),
            _ => (upper_first(hint), format!("attr{}", attr.index())),
        };
        let pending = match (dt, node) {
            (DataType::Object(_), Node::Record(record)) => Pending::Object(record),
            (DataType::Array(elem), Node::Seq(e)) if !is_byte(e) => Pending::Array(*elem, e),
            (DataType::Map { key, elem }, Node::Keyed(k, v)) => Pending::Map(*key, *elem, k, v),
            _ => return None,
        };
        let (key, base, external_name) = match &pending {
            Pending::Object(record) => {
                let (src, dst) = self.oriented(designed_name.as_str(), record.name.as_str());
                (
                    format!("object|{:?}|{}|{}", self.direction, designed_key, record.name),
                    format!("{}{}To{}", self.prefix, src, dst),
                    record.name.clone(),
                )
            }
            Pending::Array(..) => (
                format!("array|{:?}|{}|{:?}", self.direction, designed_key, shape),
                format!("{}{}Array", self.prefix, designed_name),
                shape.display_name(),
            ),
            Pending::Map(..) => (
                format!("map|{:?}|{}|{:?}", self.direction, designed_key, shape),
                format!("{}{}Map", self.prefix, designed_name),
                shape.display_name(),
            ),
        };
        if let Some(name) = self.names.lookup(&key) {
            return Some(name.to_string());
        }
        let name = self.names.name_for(&key, &base);

        let body = match pending {
            Pending::Object(record) => HelperBody::Object(self.fields(attr, record)),
            Pending::Array(elem, e) => HelperBody::Array {
                elem: self.conversion(elem, e, false, e.unwrap_nullable().1, hint),
            },
            Pending::Map(key, elem, k, v) => HelperBody::Map {
                key: self.conversion(key, k, false, k.unwrap_nullable().1, &format!("{}Key", hint)),
                elem: self.conversion(elem, v, false, v.unwrap_nullable().1, hint),
            },
        };
        let (source, target) = self.oriented(designed_name, external_name);
        self.helpers.insert(
            name.clone(),
            Helper {
                name: name.clone(),
                source,
                target,
                body,
            },
        );
        Some(name)
    }

    /// Every helper reachable from `fields`, in first-use order.
    fn reachable(&self, fields: &[FieldConversion]) -> Vec<Helper> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = fields.iter().filter_map(|f| f.conversion.helper()).collect();
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name) {
                continue;
            }
            let Some(helper) = self.helpers.get(name) else {
                continue;
            };
            queue.extend(helper.body.conversions().into_iter().filter_map(Conversion::helper));
            out.push(helper.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::transform;
    use super::*;
    use crate::config::TransformSettings;
    use crate::dsl::array_of;
    use crate::pass1_execute::execute_roots;
    use crate::session::Session;
    use crate::shape::ShapeKind;
    use crate::types::Primitive;

    fn plans(session: &mut Session) -> Vec<ConversionPlan> {
        execute_roots(session);
        assert!(session.errors().is_empty(), "{:?}", session.errors());
        let errors = transform(&mut session.design, &TransformSettings::default());
        assert!(errors.is_empty(), "{:?}", errors);
        session.design().plans().to_vec()
    }

    fn user_model() -> Shape {
        Shape::record(
            "UserModel",
            [
                ("ID", Shape::prim(ShapeKind::String)),
                ("Nick", Shape::prim(ShapeKind::String)),
                ("Email", Shape::nullable(Shape::prim(ShapeKind::String))),
            ],
        )
    }

    fn user(session: &mut Session, create: bool) {
        session.type_("User", move |s| {
            s.attribute("id", Primitive::String);
            s.attribute("nick", Primitive::String);
            s.attribute("email", Primitive::String);
            s.required(&["id", "email"]);
            if create {
                s.create_from(user_model());
            } else {
                s.convert_to(user_model());
            }
        });
    }

    #[test]
    fn optionality_picks_the_conversion() {
        let mut session = Session::default();
        user(&mut session, false);
        let plans = plans(&mut session);
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];
        assert_eq!(plan.function, "ConvertToUserModel");
        let ops: Vec<_> = plan
            .fields
            .iter()
            .map(|f| (f.source.as_str(), f.target.as_str(), f.conversion.clone()))
            .collect();
        assert_eq!(
            ops,
            vec![
                ("id", "ID", Conversion::Direct),
                ("nick", "Nick", Conversion::Dereference),
                ("email", "Email", Conversion::AddressOf),
            ]
        );
        assert!(plan.helpers.is_empty());
    }

    #[test]
    fn create_from_swaps_source_and_target() {
        let mut session = Session::default();
        user(&mut session, true);
        let plan = plans(&mut session).remove(0);
        assert_eq!(plan.function, "CreateFromUserModel");
        assert_eq!(plan.fields[1].source, "Nick");
        assert_eq!(plan.fields[1].target, "nick");
        assert_eq!(plan.fields[1].conversion, Conversion::AddressOf);
        assert_eq!(plan.fields[2].conversion, Conversion::Dereference);
    }

    #[test]
    fn nested_values_get_helpers() {
        let mut session = Session::default();
        session.type_("Line", |s| {
            s.attribute("qty", Primitive::Int);
            s.required(&["qty"]);
        });
        session.type_("Order", |s| {
            s.attribute("lines", array_of("Line"));
            s.required(&["lines"]);
            s.convert_to(Shape::record(
                "OrderModel",
                [(
                    "Lines",
                    Shape::seq(Shape::record("LineModel", [("Qty", Shape::prim(ShapeKind::Int))])),
                )],
            ));
        });
        let plan = plans(&mut session).remove(0);
        assert_eq!(
            plan.fields[0].conversion,
            Conversion::Recurse {
                helper: "transformLinesArray".to_string()
            }
        );
        let names: Vec<_> = plan.helpers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["transformLinesArray", "transformLineToLineModel"]);
        assert_eq!(
            plan.helpers[1].body,
            HelperBody::Object(vec![FieldConversion {
                source: "qty".to_string(),
                target: "Qty".to_string(),
                conversion: Conversion::Direct,
            }])
        );
    }

    #[test]
    fn helper_names_are_unique_across_plans() {
        let mut session = Session::default();
        for (name, model) in [("Cart", "CartModel"), ("Wishlist", "WishlistModel")] {
            session.type_(name, move |s| {
                s.attribute("items", array_of(Primitive::String));
                s.required(&["items"]);
                s.convert_to(Shape::record(
                    model,
                    [("Items", Shape::seq(Shape::prim(ShapeKind::String)))],
                ));
            });
        }
        let plans = plans(&mut session);
        assert_eq!(plans[0].helpers[0].name, "transformItemsArray");
        assert_eq!(plans[1].helpers[0].name, "transformItemsArray2");
    }

    #[test]
    fn recursive_types_reuse_their_helper() {
        let mut session = Session::default();
        session.type_("Tree", |s| {
            s.attribute("value", Primitive::Int);
            s.attribute("children", array_of("Tree"));
            s.required(&["value", "children"]);
            s.convert_to(Shape::record(
                "TreeModel",
                [
                    ("Value", Shape::prim(ShapeKind::Int)),
                    ("Children", Shape::seq(Shape::record_ref("TreeModel"))),
                ],
            ));
        });
        let plan = plans(&mut session).remove(0);
        let names: Vec<_> = plan.helpers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["transformChildrenArray", "transformTreeToTreeModel"]);
        let HelperBody::Object(fields) = &plan.helpers[1].body else {
            panic!("expected an object helper");
        };
        assert_eq!(fields[1].conversion.helper(), Some("transformChildrenArray"));
    }
}
