//! Primitive kinds, arena handles and the closed set of data type shapes.
//!
//! Every attribute, user type, service, method and security scheme lives in
//! the [`Design`](crate::session::Design) arena and is addressed by one of
//! the index handles defined here. Handles are only meaningful for the
//! design that issued them.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Handles ──────────────────────────────────────────────────────────

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

handle!(
    /// Handle of an attribute in the design arena.
    AttrId
);
handle!(
    /// Handle of a named user type (or result type).
    TypeId
);
handle!(ServiceId);
handle!(MethodId);
handle!(SchemeId);

// ── Primitives ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Boolean,
    Int,
    Int32,
    Int64,
    UInt,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Any,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Int => "int",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::UInt => "uint",
            Primitive::UInt32 => "uint32",
            Primitive::UInt64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
            Primitive::Any => "any",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::Int
                | Primitive::Int32
                | Primitive::Int64
                | Primitive::UInt
                | Primitive::UInt32
                | Primitive::UInt64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Primitive::UInt | Primitive::UInt32 | Primitive::UInt64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::Float32 | Primitive::Float64)
    }

    /// Numeric bounds (`minimum`, `maximum`) apply to these kinds.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Data types ───────────────────────────────────────────────────────

/// The type of an attribute.
///
/// Nested attributes (array elements, map keys and values, object fields,
/// union variants) are owned by the enclosing attribute; `User` is the only
/// shared reference.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Primitive(Primitive),
    Array(AttrId),
    Map { key: AttrId, elem: AttrId },
    Object(Object),
    Union(Object),
    User(TypeId),
}

impl DataType {
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            DataType::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            DataType::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_primitive(&self, kind: Primitive) -> bool {
        matches!(self, DataType::Primitive(p) if *p == kind)
    }
}

/// One named entry of an [`Object`].
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttr {
    pub name: String,
    pub attr: AttrId,
}

/// Ordered mapping from field name to attribute.
///
/// Insertion order is significant and preserved. Setting an existing name
/// replaces the attribute in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    fields: Vec<NamedAttr>,
}

impl Object {
    pub fn new() -> Self {
        Object::default()
    }

    pub fn get(&self, name: &str) -> Option<AttrId> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.attr)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: impl Into<String>, attr: AttrId) {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.attr = attr,
            None => self.fields.push(NamedAttr { name, attr }),
        }
    }

    pub fn delete(&mut self, name: &str) -> Option<AttrId> {
        let pos = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(pos).attr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedAttr> {
        self.fields.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
