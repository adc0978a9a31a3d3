//! The attribute node, its validation rules and value compatibility.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::session::Design;
use crate::types::{AttrId, DataType, Primitive, TypeId};

/// Metadata key marking an error as temporary.
pub const META_TEMPORARY: &str = "trellis:error:temporary";
/// Metadata key marking an error as a timeout.
pub const META_TIMEOUT: &str = "trellis:error:timeout";
/// Metadata key marking an error as a server fault.
pub const META_FAULT: &str = "trellis:error:fault";
/// Metadata key tagging the payload attribute holding a security credential.
pub const META_SECURITY: &str = "security:attribute";

/// The universal node of a design.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeExpr {
    /// `None` until the type is known; attributes left untyped after
    /// evaluation become `string`.
    pub type_: Option<DataType>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub validation: Option<Validation>,
    pub meta: BTreeMap<String, Vec<String>>,
    pub examples: Vec<Value>,
    /// Types whose fields are merged into this attribute at finalize.
    pub bases: Vec<TypeId>,
    /// Types whose same-named fields seed this attribute's fields.
    pub references: Vec<TypeId>,
}

impl AttributeExpr {
    pub fn typed(dt: DataType) -> Self {
        AttributeExpr {
            type_: Some(dt),
            ..AttributeExpr::default()
        }
    }

    /// Required field names, empty when there is no validation.
    pub fn required(&self) -> &[String] {
        self.validation
            .as_ref()
            .map(|v| v.required.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required().iter().any(|r| r == name)
    }

    pub fn validation_mut(&mut self) -> &mut Validation {
        self.validation.get_or_insert_with(Validation::default)
    }

    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.meta.contains_key(key)
    }
}

// ── Validation ───────────────────────────────────────────────────────

/// Value format tags understood by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Date,
    DateTime,
    Uuid,
    Email,
    Hostname,
    Ipv4,
    Ipv6,
    Ip,
    Uri,
    Mac,
    Cidr,
    Regexp,
    Json,
    Rfc1123,
}

impl Format {
    pub const ALL: [Format; 14] = [
        Format::Date,
        Format::DateTime,
        Format::Uuid,
        Format::Email,
        Format::Hostname,
        Format::Ipv4,
        Format::Ipv6,
        Format::Ip,
        Format::Uri,
        Format::Mac,
        Format::Cidr,
        Format::Regexp,
        Format::Json,
        Format::Rfc1123,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Format::Date => "date",
            Format::DateTime => "date-time",
            Format::Uuid => "uuid",
            Format::Email => "email",
            Format::Hostname => "hostname",
            Format::Ipv4 => "ipv4",
            Format::Ipv6 => "ipv6",
            Format::Ip => "ip",
            Format::Uri => "uri",
            Format::Mac => "mac",
            Format::Cidr => "cidr",
            Format::Regexp => "regexp",
            Format::Json => "json",
            Format::Rfc1123 => "rfc1123",
        }
    }

    pub fn parse(name: &str) -> Option<Format> {
        Format::ALL.into_iter().find(|f| f.name() == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub values: Vec<Value>,
    pub format: Option<Format>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub required: Vec<String>,
}

impl Validation {
    /// Merge `other` into `self`. Unset rules are taken from `other`; when
    /// both set a bound the tighter one wins.
    pub fn merge(&mut self, other: &Validation) {
        if self.values.is_empty() {
            self.values = other.values.clone();
        }
        if self.format.is_none() {
            self.format = other.format;
        }
        if self.pattern.is_none() {
            self.pattern = other.pattern.clone();
        }
        self.minimum = tighter(self.minimum, other.minimum, f64::max);
        self.exclusive_minimum = tighter(self.exclusive_minimum, other.exclusive_minimum, f64::max);
        self.maximum = tighter(self.maximum, other.maximum, f64::min);
        self.exclusive_maximum = tighter(self.exclusive_maximum, other.exclusive_maximum, f64::min);
        self.min_length = tighter(self.min_length, other.min_length, usize::max);
        self.max_length = tighter(self.max_length, other.max_length, usize::min);
        self.add_required(&other.required);
    }

    /// Append required names not already present, keeping order.
    pub fn add_required<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if !self.required.iter().any(|r| r == name) {
                self.required.push(name.to_string());
            }
        }
    }

    /// A copy whose required list only keeps names accepted by `keep`.
    pub fn restrict_required(&self, keep: impl Fn(&str) -> bool) -> Validation {
        let mut v = self.clone();
        v.required.retain(|r| keep(r));
        v
    }

    pub fn is_empty(&self) -> bool {
        *self == Validation::default()
    }

    /// Contradictory bounds, one message per conflict.
    pub fn bound_conflicts(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.minimum.is_some() && self.exclusive_minimum.is_some() {
            out.push("both minimum and exclusive minimum are defined");
        }
        if self.maximum.is_some() && self.exclusive_maximum.is_some() {
            out.push("both maximum and exclusive maximum are defined");
        }
        if let (Some(min), Some(max)) = (self.minimum, self.maximum) {
            if min > max {
                out.push("minimum is greater than maximum");
            }
        }
        if let (Some(min), Some(max)) = (self.minimum, self.exclusive_maximum) {
            if min >= max {
                out.push("minimum is greater than or equal to exclusive maximum");
            }
        }
        if let (Some(min), Some(max)) = (self.exclusive_minimum, self.exclusive_maximum) {
            if min > max {
                out.push("exclusive minimum is greater than exclusive maximum");
            }
        }
        if let (Some(min), Some(max)) = (self.exclusive_minimum, self.maximum) {
            if min >= max {
                out.push("exclusive minimum is greater than or equal to maximum");
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                out.push("min length is greater than max length");
            }
        }
        out
    }
}

fn tighter<T: Copy>(ours: Option<T>, theirs: Option<T>, pick: fn(T, T) -> T) -> Option<T> {
    match (ours, theirs) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

// ── Value compatibility ──────────────────────────────────────────────

impl Design {
    /// Whether `value` may be used as a default or example of `attr`.
    pub fn is_compatible(&self, attr: AttrId, value: &Value) -> bool {
        match &self.attr(attr).type_ {
            Some(dt) => self.value_fits(dt, value, 0),
            None => value.is_string(),
        }
    }

    fn value_fits(&self, dt: &DataType, value: &Value, depth: usize) -> bool {
        // Recursive user types cannot nest values deeper than this.
        if depth > 64 {
            return false;
        }
        match dt {
            DataType::Primitive(p) => primitive_fits(*p, value),
            DataType::Array(elem) => match value {
                Value::Array(items) => items.iter().all(|v| self.attr_fits(*elem, v, depth)),
                _ => false,
            },
            DataType::Map { key, elem } => match value {
                Value::Object(entries) => entries.iter().all(|(k, v)| {
                    self.attr_fits(*key, &Value::String(k.clone()), depth)
                        && self.attr_fits(*elem, v, depth)
                }),
                _ => false,
            },
            DataType::Object(obj) => match value {
                Value::Object(entries) => entries.iter().all(|(k, v)| match obj.get(k) {
                    Some(field) => self.attr_fits(field, v, depth),
                    None => false,
                }),
                _ => false,
            },
            DataType::Union(variants) => variants
                .iter()
                .any(|variant| self.attr_fits(variant.attr, value, depth)),
            DataType::User(t) => self.attr_fits(self.user_type(*t).attr, value, depth + 1),
        }
    }

    fn attr_fits(&self, attr: AttrId, value: &Value, depth: usize) -> bool {
        match &self.attr(attr).type_ {
            Some(dt) => self.value_fits(dt, value, depth),
            None => value.is_string(),
        }
    }
}

fn primitive_fits(p: Primitive, value: &Value) -> bool {
    if p == Primitive::Any {
        return !value.is_null();
    }
    match value {
        Value::Bool(_) => p == Primitive::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            let negative = n.as_i64().is_some_and(|i| i < 0);
            (p.is_integer() && !(negative && p.is_unsigned())) || p.is_float()
        }
        Value::Number(_) => p.is_float(),
        Value::String(_) => p == Primitive::String || p == Primitive::Bytes,
        _ => false,
    }
}
