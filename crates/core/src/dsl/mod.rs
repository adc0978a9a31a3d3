//! Host-facing DSL entry points.
//!
//! Every entry point is a method on [`Session`] and inspects
//! [`Session::current`] to decide what it applies to. A call made in a
//! context that does not accept it reports "invalid use of ..." and changes
//! nothing.
//!
//! Top-level declarations (API, services, methods, types, result types,
//! security schemes) are deferred: their closures run later, in
//! registration order. Everything else runs immediately.

mod api;
mod attribute;
mod security;
mod service;
mod types;
mod validation;

use crate::attribute::AttributeExpr;
use crate::expr::{Expr, TypeKind};
use crate::session::Session;
use crate::types::{AttrId, DataType, Primitive, TypeId};

/// A type written at a DSL call site.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Primitive(Primitive),
    /// A user type or result type by name. May be declared later.
    Named(String),
    ArrayOf(Box<TypeSpec>),
    MapOf(Box<TypeSpec>, Box<TypeSpec>),
    /// The collection generated for a result type, by element name.
    CollectionOf(String),
}

impl From<Primitive> for TypeSpec {
    fn from(p: Primitive) -> Self {
        TypeSpec::Primitive(p)
    }
}

impl From<&str> for TypeSpec {
    fn from(name: &str) -> Self {
        TypeSpec::Named(name.to_string())
    }
}

impl From<String> for TypeSpec {
    fn from(name: String) -> Self {
        TypeSpec::Named(name)
    }
}

pub fn array_of(elem: impl Into<TypeSpec>) -> TypeSpec {
    TypeSpec::ArrayOf(Box::new(elem.into()))
}

pub fn map_of(key: impl Into<TypeSpec>, elem: impl Into<TypeSpec>) -> TypeSpec {
    TypeSpec::MapOf(Box::new(key.into()), Box::new(elem.into()))
}

pub fn collection_of(elem: &str) -> TypeSpec {
    TypeSpec::CollectionOf(elem.to_string())
}

impl Session {
    /// The type named `name`, creating a placeholder when it has not been
    /// declared yet.
    pub(crate) fn type_ref(&mut self, name: &str) -> TypeId {
        if let Some(id) = self.design.find_type(name) {
            return self.design.resolve_id(id);
        }
        let attr = self.design.new_attr(AttributeExpr::default());
        self.design.add_type(name, attr, TypeKind::Placeholder, None)
    }

    pub(crate) fn resolve_spec(&mut self, spec: TypeSpec) -> DataType {
        match spec {
            TypeSpec::Primitive(p) => DataType::Primitive(p),
            TypeSpec::Named(name) => DataType::User(self.type_ref(&name)),
            TypeSpec::ArrayOf(elem) => {
                let dt = self.resolve_spec(*elem);
                DataType::Array(self.design.new_attr(AttributeExpr::typed(dt)))
            }
            TypeSpec::MapOf(key, elem) => {
                let key_dt = self.resolve_spec(*key);
                let elem_dt = self.resolve_spec(*elem);
                let key = self.design.new_attr(AttributeExpr::typed(key_dt));
                let elem = self.design.new_attr(AttributeExpr::typed(elem_dt));
                DataType::Map { key, elem }
            }
            TypeSpec::CollectionOf(name) => {
                let elem = self.type_ref(&name);
                DataType::User(self.generated_collection(elem, None))
            }
        }
    }

    /// The attribute a nested DSL call applies to.
    pub(crate) fn target_attr(&self) -> Option<AttrId> {
        match self.current() {
            Expr::Attribute(id) => Some(id),
            Expr::UserType(t) => Some(self.design.user_type(t).attr),
            Expr::Top
            | Expr::Api
            | Expr::Contact
            | Expr::License
            | Expr::Docs
            | Expr::Service(_)
            | Expr::Method(_)
            | Expr::Scheme(_) => None,
        }
    }
}
