use crate::attribute::AttributeExpr;
use crate::dsl::TypeSpec;
use crate::expr::{Direction, Expr, ResultInfo, TypeKind, TypeMap, ViewExpr};
use crate::names::title_case;
use crate::session::{DslFn, Session};
use crate::shape::Shape;
use crate::types::{DataType, Object, TypeId};

/// Canonical form of a result type identifier: the base without any
/// `+suffix`, keeping only the `type` parameter.
pub(crate) fn canonical_identifier(identifier: &str) -> String {
    let mut parts = identifier.split(';');
    let base = parts.next().unwrap_or("").trim();
    let base = base.split('+').next().unwrap_or(base);
    let kind = parts.find_map(|p| {
        let (key, value) = p.split_once('=')?;
        (key.trim() == "type").then(|| value.trim().to_string())
    });
    match kind {
        Some(kind) => format!("{}; type={}", base, kind),
        None => base.to_string(),
    }
}

/// `application/vnd.goa.bottle+json` -> `GoaBottle`.
fn type_name_from_identifier(identifier: &str) -> String {
    let base = identifier.split(';').next().unwrap_or("").trim();
    let last = base.rsplit('/').next().unwrap_or(base);
    let last = last.split('+').next().unwrap_or(last);
    let last = last.strip_prefix("vnd.").unwrap_or(last);
    title_case(last)
}

impl Session {
    /// Declare a user type. Its attributes are declared by `dsl`, which runs
    /// after the current declarations.
    #[track_caller]
    pub fn type_(&mut self, name: &str, dsl: impl FnOnce(&mut Session) + 'static) -> Option<TypeId> {
        self.declare_type(name, None, Box::new(dsl))
    }

    /// Declare a user type aliasing `spec`.
    #[track_caller]
    pub fn type_with(
        &mut self,
        name: &str,
        spec: impl Into<TypeSpec>,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<TypeId> {
        self.declare_type(name, Some(spec.into()), Box::new(dsl))
    }

    #[track_caller]
    fn declare_type(&mut self, name: &str, spec: Option<TypeSpec>, dsl: DslFn) -> Option<TypeId> {
        if self.current() != Expr::Top {
            self.incompatible_dsl("Type");
            return None;
        }
        let id = match self.claim_name(name) {
            Ok(id) => id,
            Err(existing) => return Some(existing),
        };
        let dt = match spec {
            Some(spec) => self.resolve_spec(spec),
            None => DataType::Object(Object::new()),
        };
        let attr = self.design.user_type(id).attr;
        self.design.attr_mut(attr).type_ = Some(dt);
        self.design.user_type_mut(id).kind = TypeKind::Declared;
        self.register(Expr::UserType(id), Some(dsl));
        Some(id)
    }

    /// The placeholder for `name`, created if needed. Fails with the
    /// existing type when `name` is already declared.
    #[track_caller]
    fn claim_name(&mut self, name: &str) -> Result<TypeId, TypeId> {
        if let Some(existing) = self.design.find_type(name) {
            let existing = self.design.resolve_id(existing);
            if self.design.user_type(existing).kind != TypeKind::Placeholder {
                self.report_error(format!("type \"{}\" is defined twice", name));
                return Err(existing);
            }
            return Ok(existing);
        }
        Ok(self.type_ref(name))
    }

    /// Declare a result type. The type name derives from the identifier.
    #[track_caller]
    pub fn result_type(
        &mut self,
        identifier: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<TypeId> {
        self.declare_result(identifier, None, Box::new(dsl))
    }

    /// Declare a result type with an explicit type name.
    #[track_caller]
    pub fn result_type_named(
        &mut self,
        identifier: &str,
        name: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<TypeId> {
        self.declare_result(identifier, Some(name), Box::new(dsl))
    }

    #[track_caller]
    fn declare_result(&mut self, identifier: &str, name: Option<&str>, dsl: DslFn) -> Option<TypeId> {
        if self.current() != Expr::Top {
            self.incompatible_dsl("ResultType");
            return None;
        }
        let base = identifier.split(';').next().unwrap_or("").trim();
        if base.is_empty() || !base.contains('/') {
            self.report_error(format!("invalid result type identifier \"{}\"", identifier));
            return None;
        }
        let canonical = canonical_identifier(identifier);
        if let Some(&existing) = self.design.canonical_ids.get(&canonical) {
            self.report_error(format!(
                "result type \"{}\" with canonical identifier \"{}\" is defined twice",
                identifier, canonical
            ));
            return Some(existing);
        }
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let derived = type_name_from_identifier(identifier);
                if derived.is_empty() {
                    let count = self
                        .design
                        .type_ids()
                        .filter(|t| {
                            let t = self.design.user_type(*t);
                            t.kind == TypeKind::Declared && t.is_result()
                        })
                        .count();
                    format!("ResultType{}", count + 1)
                } else {
                    derived
                }
            }
        };
        let id = match self.claim_name(&name) {
            Ok(id) => id,
            Err(existing) => return Some(existing),
        };
        let attr = self.design.user_type(id).attr;
        self.design.attr_mut(attr).type_ = Some(DataType::Object(Object::new()));
        let t = self.design.user_type_mut(id);
        t.kind = TypeKind::Declared;
        t.result = Some(ResultInfo {
            identifier: identifier.to_string(),
            ..ResultInfo::default()
        });
        self.design.canonical_ids.insert(canonical, id);
        self.register(Expr::UserType(id), Some(dsl));
        Some(id)
    }

    /// Rename the current type. References made through a placeholder of
    /// the new name resolve to it.
    #[track_caller]
    pub fn type_name(&mut self, name: &str) {
        let Expr::UserType(id) = self.current() else {
            self.incompatible_dsl("TypeName");
            return;
        };
        if self.design.rename_type(id, name).is_err() {
            self.report_error(format!("type name \"{}\" is already taken", name));
        }
    }

    #[track_caller]
    pub fn content_type(&mut self, content_type: &str) {
        match self.current() {
            Expr::UserType(id) => match self.design.user_type_mut(id).result.as_mut() {
                Some(info) => info.content_type = Some(content_type.to_string()),
                None => self.incompatible_dsl("ContentType"),
            },
            _ => self.incompatible_dsl("ContentType"),
        }
    }

    /// Declare the attributes of the current type.
    #[track_caller]
    pub fn attributes(&mut self, dsl: impl FnOnce(&mut Session)) {
        let Expr::UserType(id) = self.current() else {
            self.incompatible_dsl("Attributes");
            return;
        };
        let attr = self.design.user_type(id).attr;
        self.execute(Expr::Attribute(attr), dsl);
    }

    /// Declare a view of the current result type. `dsl` lists the exposed
    /// fields by declaring attributes with their names.
    #[track_caller]
    pub fn view(&mut self, name: &str, dsl: impl FnOnce(&mut Session)) {
        let Expr::UserType(id) = self.current() else {
            self.incompatible_dsl("View");
            return;
        };
        let (type_name, is_result, exists, elem) = {
            let t = self.design.user_type(id);
            (
                t.name.clone(),
                t.is_result(),
                t.view(name).is_some(),
                t.result.as_ref().and_then(|r| r.collection_of),
            )
        };
        if !is_result {
            self.incompatible_dsl("View");
            return;
        }
        if exists {
            self.report_error(format!(
                "multiple expressions for view \"{}\" in result type \"{}\"",
                name, type_name
            ));
            return;
        }

        let collector = self
            .design
            .new_attr(AttributeExpr::typed(DataType::Object(Object::new())));
        if !self.execute(Expr::Attribute(collector), dsl) {
            return;
        }
        let source = match elem {
            Some(elem) => self.design.user_type(elem).attr,
            None => self.design.user_type(id).attr,
        };
        let requested: Vec<_> = self
            .design
            .object(collector)
            .map(|obj| obj.iter().map(|f| (f.name.clone(), f.attr)).collect())
            .unwrap_or_default();
        let view_meta = self.config.eval.view_meta.clone();
        let mut fields = Object::new();
        let mut ok = true;
        for (field, pinned) in requested {
            let Some(found) = self.design.field(source, &field) else {
                self.report_error(format!("unknown attribute \"{}\"", field));
                ok = false;
                continue;
            };
            let copy = self.design.dup_attr(found);
            if let Some(values) = self.design.attr(pinned).meta.get(&view_meta).cloned() {
                self.design.attr_mut(copy).meta.insert(view_meta.clone(), values);
            }
            fields.set(field, copy);
        }
        if !ok {
            return;
        }
        let attr = self.design.new_attr(AttributeExpr::typed(DataType::Object(fields)));
        if let Some(info) = self.design.user_type_mut(id).result.as_mut() {
            info.views.push(ViewExpr {
                name: name.to_string(),
                attr,
            });
        }
    }

    /// Pin the view used to render the current result-typed attribute.
    #[track_caller]
    pub fn use_view(&mut self, view: &str) {
        match self.current() {
            Expr::Attribute(attr) => {
                let key = self.config.eval.view_meta.clone();
                self.design
                    .attr_mut(attr)
                    .meta
                    .insert(key, vec![view.to_string()]);
            }
            _ => self.incompatible_dsl("View"),
        }
    }

    /// The collection result type of `elem`, generated on first use.
    #[track_caller]
    pub(crate) fn generated_collection(&mut self, elem: TypeId, dsl: Option<DslFn>) -> TypeId {
        let elem = self.design.resolve_id(elem);
        if let Some(&existing) = self.design.collections.get(&elem) {
            if dsl.is_some() {
                self.register(Expr::UserType(existing), dsl);
            }
            return existing;
        }
        let name = format!("{}Collection", self.design.user_type(elem).name);
        let item = self
            .design
            .new_attr(AttributeExpr::typed(DataType::User(elem)));
        let attr = self
            .design
            .new_attr(AttributeExpr::typed(DataType::Array(item)));
        let info = ResultInfo {
            collection_of: Some(elem),
            ..ResultInfo::default()
        };
        let id = self
            .design
            .add_unindexed_type(&name, attr, TypeKind::Generated, Some(info));
        if self.design.rename_type(id, &name).is_err() {
            self.report_error(format!("type \"{}\" is defined twice", name));
        }
        self.design.collections.insert(elem, id);
        self.register(Expr::UserType(id), dsl);
        id
    }

    /// The collection of `elem`, customized by `dsl` (views, description).
    #[track_caller]
    pub fn collection_of_with(
        &mut self,
        elem: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> TypeSpec {
        let elem_id = self.type_ref(elem);
        self.generated_collection(elem_id, Some(Box::new(dsl)));
        TypeSpec::CollectionOf(elem.to_string())
    }

    /// Map the current type to an external record, converting design values
    /// into it.
    #[track_caller]
    pub fn convert_to(&mut self, shape: Shape) {
        self.add_type_map("ConvertTo", Direction::ConvertTo, shape);
    }

    /// Map the current type to an external record, creating design values
    /// from it.
    #[track_caller]
    pub fn create_from(&mut self, shape: Shape) {
        self.add_type_map("CreateFrom", Direction::CreateFrom, shape);
    }

    #[track_caller]
    fn add_type_map(&mut self, construct: &str, direction: Direction, shape: Shape) {
        match self.current() {
            Expr::UserType(user) => self.design.type_maps.push(TypeMap {
                user,
                direction,
                shape,
            }),
            _ => self.incompatible_dsl(construct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1_execute::execute_roots;
    use crate::types::Primitive;

    #[test]
    fn canonical_identifier_drops_suffix() {
        assert_eq!(
            canonical_identifier("application/vnd.goa.bottle+json"),
            "application/vnd.goa.bottle"
        );
        assert_eq!(
            canonical_identifier("application/vnd.bottle; type=collection; view=tiny"),
            "application/vnd.bottle; type=collection"
        );
    }

    #[test]
    fn name_derives_from_identifier() {
        assert_eq!(type_name_from_identifier("application/vnd.goa.bottle"), "GoaBottle");
        assert_eq!(type_name_from_identifier("application/vnd.bottle+json"), "Bottle");
        assert_eq!(type_name_from_identifier("application/vnd."), "");
    }

    #[test]
    fn forward_reference_is_adopted() {
        let mut session = Session::default();
        session.type_("Order", |s| s.attribute("customer", "Customer"));
        session.type_("Customer", |s| s.attribute("name", Primitive::String));
        execute_roots(&mut session);
        let design = session.design();
        let order = design.find_type("Order").unwrap();
        let customer = design.field(design.user_type(order).attr, "customer").unwrap();
        assert_eq!(design.attr_type_name(customer), "Customer");
        assert!(design.field(customer, "name").is_some());
        assert!(session.errors().is_empty());
    }

    #[test]
    fn redeclared_type_keeps_first() {
        let mut session = Session::default();
        session.type_("T", |s| s.attribute("a", Primitive::Int));
        session.type_("T", |s| s.attribute("b", Primitive::Int));
        execute_roots(&mut session);
        let design = session.design();
        let t = design.find_type("T").unwrap();
        assert!(design.field(design.user_type(t).attr, "a").is_some());
        assert!(design.field(design.user_type(t).attr, "b").is_none());
        assert_eq!(session.errors().len(), 1);
        assert_eq!(session.errors()[0].message, "type \"T\" is defined twice (top level)");
    }

    #[test]
    fn duplicate_canonical_identifier_is_rejected() {
        let mut session = Session::default();
        session.result_type("application/vnd.bottle", |_| {});
        session.result_type_named("application/vnd.bottle+json", "Other", |_| {});
        assert_eq!(session.errors().len(), 1);
        assert!(session.errors()[0]
            .message
            .contains("canonical identifier \"application/vnd.bottle\""));
    }

    #[test]
    fn view_with_unknown_field_reports_once() {
        let mut session = Session::default();
        session.result_type("application/vnd.bottle", |s| {
            s.attributes(|s| s.attribute("id", Primitive::Int));
            s.view("tiny", |s| {
                s.attribute_dsl("id", |_| {});
                s.attribute_dsl("nope", |_| {});
            });
        });
        execute_roots(&mut session);
        assert_eq!(session.errors().len(), 1);
        assert_eq!(
            session.errors()[0].message,
            "unknown attribute \"nope\" in result type \"Bottle\""
        );
    }

    #[test]
    fn duplicate_view_is_rejected() {
        let mut session = Session::default();
        session.result_type("application/vnd.bottle", |s| {
            s.attributes(|s| s.attribute("id", Primitive::Int));
            s.view("tiny", |s| s.attribute_dsl("id", |_| {}));
            s.view("tiny", |s| s.attribute_dsl("id", |_| {}));
        });
        execute_roots(&mut session);
        assert_eq!(session.errors().len(), 1);
        assert!(session.errors()[0]
            .message
            .starts_with("multiple expressions for view \"tiny\""));
    }

    #[test]
    fn collection_is_generated_once() {
        let mut session = Session::default();
        session.result_type("application/vnd.bottle", |s| {
            s.attributes(|s| s.attribute("id", Primitive::Int));
        });
        session.type_("Shelf", |s| {
            s.attribute("a", crate::dsl::collection_of("Bottle"));
            s.attribute("b", crate::dsl::collection_of("Bottle"));
        });
        execute_roots(&mut session);
        let design = session.design();
        let bottle = design.find_type("Bottle").unwrap();
        let collection = design.collection(bottle).unwrap();
        assert_eq!(design.user_type(collection).name, "BottleCollection");
        assert_eq!(design.find_type("BottleCollection"), Some(collection));
        let shelf = design.find_type("Shelf").unwrap();
        let b = design.field(design.user_type(shelf).attr, "b").unwrap();
        assert_eq!(design.attr(b).type_, Some(DataType::User(collection)));
    }

    #[test]
    fn type_name_renames() {
        let mut session = Session::default();
        session.result_type("application/vnd.goa.bottle", |s| s.type_name("Bottle"));
        execute_roots(&mut session);
        let design = session.design();
        assert!(design.find_type("Bottle").is_some());
        assert!(design.find_type("GoaBottle").is_none());
    }

    #[test]
    fn convert_to_outside_type_is_incompatible() {
        let mut session = Session::default();
        session.convert_to(Shape::record_ref("R"));
        assert_eq!(session.errors()[0].message, "invalid use of ConvertTo (top level)");
    }
}
