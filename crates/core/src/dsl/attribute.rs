use serde_json::Value;

use crate::attribute::AttributeExpr;
use crate::dsl::TypeSpec;
use crate::expr::Expr;
use crate::session::Session;
use crate::types::{DataType, Object};

enum Container {
    Object,
    Union,
    Other(String),
}

impl Session {
    /// Declare a child attribute of the current attribute or type.
    #[track_caller]
    pub fn attribute(&mut self, name: &str, spec: impl Into<TypeSpec>) {
        self.add_attribute(name, Some(spec.into()), None::<fn(&mut Session)>);
    }

    /// Declare a typed child attribute and run `dsl` on it.
    #[track_caller]
    pub fn attribute_with(
        &mut self,
        name: &str,
        spec: impl Into<TypeSpec>,
        dsl: impl FnOnce(&mut Session),
    ) {
        self.add_attribute(name, Some(spec.into()), Some(dsl));
    }

    /// Declare a child attribute whose type comes from a referenced type
    /// or from the children `dsl` declares. Attributes still untyped at
    /// finalize become `string`.
    #[track_caller]
    pub fn attribute_dsl(&mut self, name: &str, dsl: impl FnOnce(&mut Session)) {
        self.add_attribute(name, None, Some(dsl));
    }

    /// Declare a union attribute; attributes declared by `dsl` are its
    /// variants.
    #[track_caller]
    pub fn one_of(&mut self, name: &str, dsl: impl FnOnce(&mut Session)) {
        self.add_attribute(
            name,
            None,
            Some(move |s: &mut Session| {
                if let Expr::Attribute(id) = s.current() {
                    s.design.attr_mut(id).type_ = Some(DataType::Union(Object::new()));
                }
                dsl(s);
            }),
        );
    }

    #[track_caller]
    fn add_attribute<F: FnOnce(&mut Session)>(
        &mut self,
        name: &str,
        spec: Option<TypeSpec>,
        dsl: Option<F>,
    ) {
        let Some(parent) = self.target_attr() else {
            self.incompatible_dsl("Attribute");
            return;
        };
        let container = self.design.attr(parent).type_.as_ref().map(|dt| match dt {
            DataType::Object(_) => Container::Object,
            DataType::Union(_) => Container::Union,
            other => Container::Other(self.design.type_name(other)),
        });
        match container {
            None => self.design.attr_mut(parent).type_ = Some(DataType::Object(Object::new())),
            Some(Container::Object) | Some(Container::Union) => {}
            Some(Container::Other(type_name)) => {
                self.report_error(format!(
                    "can't define child attribute \"{}\" on attribute of type {}",
                    name, type_name
                ));
                return;
            }
        }

        // A same-named field of a referenced type seeds the new attribute.
        let references = self.design.attr(parent).references.clone();
        let seed = references.iter().find_map(|r| {
            let ref_attr = self.design.user_type(*r).attr;
            self.design.field(ref_attr, name)
        });
        let dt = match spec {
            Some(spec) => Some(self.resolve_spec(spec)),
            None => None,
        };
        let attr = match seed {
            Some(field) => {
                let copy = self.design.dup_attr(field);
                if dt.is_some() {
                    self.design.attr_mut(copy).type_ = dt;
                }
                copy
            }
            None => self.design.new_attr(AttributeExpr {
                type_: dt,
                ..AttributeExpr::default()
            }),
        };
        self.design.attr_mut(attr).references = references;

        if let Some(dsl) = dsl {
            self.execute(Expr::Attribute(attr), dsl);
        }
        match &mut self.design.attr_mut(parent).type_ {
            Some(DataType::Object(obj)) | Some(DataType::Union(obj)) => obj.set(name, attr),
            _ => {}
        }
    }

    /// Set the description of the current declaration.
    #[track_caller]
    pub fn description(&mut self, text: &str) {
        let text = Some(text.to_string());
        match self.current() {
            Expr::Api => self.design.api.description = text,
            Expr::Docs => {
                if let Some(docs) = self.design.api.docs.as_mut() {
                    docs.description = text;
                }
            }
            Expr::Service(id) => self.design.service_mut(id).description = text,
            Expr::Method(id) => self.design.method_mut(id).description = text,
            Expr::Scheme(id) => self.design.scheme_mut(id).description = text,
            Expr::Attribute(id) => self.design.attr_mut(id).description = text,
            Expr::UserType(t) => {
                let attr = self.design.user_type(t).attr;
                self.design.attr_mut(attr).description = text;
            }
            Expr::Top | Expr::Contact | Expr::License => self.incompatible_dsl("Description"),
        }
    }

    /// Set the default value. Compatibility with the attribute type is
    /// checked at finalize, once forward references are resolved.
    #[track_caller]
    pub fn default_value(&mut self, value: impl Into<Value>) {
        match self.target_attr() {
            Some(attr) => self.design.attr_mut(attr).default = Some(value.into()),
            None => self.incompatible_dsl("Default"),
        }
    }

    #[track_caller]
    pub fn example(&mut self, value: impl Into<Value>) {
        match self.target_attr() {
            Some(attr) => self.design.attr_mut(attr).examples.push(value.into()),
            None => self.incompatible_dsl("Example"),
        }
    }

    /// Attach metadata. Repeated calls with one key append values.
    #[track_caller]
    pub fn meta(&mut self, key: &str, values: &[&str]) {
        match self.target_attr() {
            Some(attr) => self
                .design
                .attr_mut(attr)
                .meta
                .entry(key.to_string())
                .or_default()
                .extend(values.iter().map(|v| v.to_string())),
            None => self.incompatible_dsl("Meta"),
        }
    }

    /// Run `dsl` on the element attribute of the current array or map.
    #[track_caller]
    pub fn elem(&mut self, dsl: impl FnOnce(&mut Session)) {
        let Some(attr) = self.target_attr() else {
            self.incompatible_dsl("Elem");
            return;
        };
        let elem = match self.design.resolved_type(attr) {
            Some(DataType::Array(elem)) | Some(DataType::Map { elem, .. }) => *elem,
            _ => {
                self.report_error("Elem must be used in an array or map attribute");
                return;
            }
        };
        self.execute(Expr::Attribute(elem), dsl);
    }

    /// Run `dsl` on the key attribute of the current map.
    #[track_caller]
    pub fn key(&mut self, dsl: impl FnOnce(&mut Session)) {
        let Some(attr) = self.target_attr() else {
            self.incompatible_dsl("Key");
            return;
        };
        let key = match self.design.resolved_type(attr) {
            Some(DataType::Map { key, .. }) => *key,
            _ => {
                self.report_error("Key must be used in a map attribute");
                return;
            }
        };
        self.execute(Expr::Attribute(key), dsl);
    }

    /// Seed same-named child attributes from `type_name` and inherit its
    /// field properties at finalize.
    #[track_caller]
    pub fn reference(&mut self, type_name: &str) {
        let Some(attr) = self.target_attr() else {
            self.incompatible_dsl("Reference");
            return;
        };
        let t = self.type_ref(type_name);
        let references = &mut self.design.attr_mut(attr).references;
        if !references.contains(&t) {
            references.push(t);
        }
    }

    /// Merge every field of `type_name` missing here at finalize.
    #[track_caller]
    pub fn extend(&mut self, type_name: &str) {
        let Some(attr) = self.target_attr() else {
            self.incompatible_dsl("Extend");
            return;
        };
        let t = self.type_ref(type_name);
        let bases = &mut self.design.attr_mut(attr).bases;
        if !bases.contains(&t) {
            bases.push(t);
        }
    }
}
