//! External shape descriptors.
//!
//! A [`Shape`] describes a record type defined outside the design (for
//! example a persistence model) that design types are converted to or
//! created from. Recursive records refer back to themselves by name with
//! [`Shape::RecordRef`].

use std::collections::HashMap;

/// Leaf kinds of an external shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Bool,
    Int,
    Int32,
    Int64,
    UInt,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Byte,
    Any,
}

impl ShapeKind {
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Bool => "bool",
            ShapeKind::Int => "int",
            ShapeKind::Int32 => "int32",
            ShapeKind::Int64 => "int64",
            ShapeKind::UInt => "uint",
            ShapeKind::UInt32 => "uint32",
            ShapeKind::UInt64 => "uint64",
            ShapeKind::Float32 => "float32",
            ShapeKind::Float64 => "float64",
            ShapeKind::String => "string",
            ShapeKind::Byte => "byte",
            ShapeKind::Any => "any",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Primitive(ShapeKind),
    Sequence(Box<Shape>),
    Keyed(Box<Shape>, Box<Shape>),
    Record(Record),
    Nullable(Box<Shape>),
    RecordRef(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<ShapeField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeField {
    pub name: String,
    pub shape: Shape,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&ShapeField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Shape {
    pub fn prim(kind: ShapeKind) -> Shape {
        Shape::Primitive(kind)
    }

    pub fn seq(elem: Shape) -> Shape {
        Shape::Sequence(Box::new(elem))
    }

    pub fn keyed(key: Shape, value: Shape) -> Shape {
        Shape::Keyed(Box::new(key), Box::new(value))
    }

    pub fn nullable(inner: Shape) -> Shape {
        Shape::Nullable(Box::new(inner))
    }

    pub fn record_ref(name: &str) -> Shape {
        Shape::RecordRef(name.to_string())
    }

    pub fn record<'a>(name: &str, fields: impl IntoIterator<Item = (&'a str, Shape)>) -> Shape {
        Shape::Record(Record {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, shape)| ShapeField {
                    name: name.to_string(),
                    shape,
                })
                .collect(),
        })
    }

    /// Strip one nullable wrapper, reporting whether there was one.
    pub fn unwrap_nullable(&self) -> (&Shape, bool) {
        match self {
            Shape::Nullable(inner) => (inner, true),
            other => (other, false),
        }
    }

    /// Name used in diagnostics: the record name, or the kind of the shape.
    pub fn display_name(&self) -> String {
        match self {
            Shape::Primitive(kind) => kind.name().to_string(),
            Shape::Sequence(_) => "sequence".to_string(),
            Shape::Keyed(_, _) => "keyed collection".to_string(),
            Shape::Record(r) => r.name.clone(),
            Shape::RecordRef(name) => name.clone(),
            Shape::Nullable(inner) => inner.display_name(),
        }
    }

    /// Every record defined anywhere inside this shape, by name.
    pub fn records(&self) -> HashMap<&str, &Record> {
        let mut out = HashMap::new();
        self.collect_records(&mut out);
        out
    }

    fn collect_records<'a>(&'a self, out: &mut HashMap<&'a str, &'a Record>) {
        match self {
            Shape::Primitive(_) | Shape::RecordRef(_) => {}
            Shape::Sequence(elem) | Shape::Nullable(elem) => elem.collect_records(out),
            Shape::Keyed(key, value) => {
                key.collect_records(out);
                value.collect_records(out);
            }
            Shape::Record(record) => {
                if out.insert(record.name.as_str(), record).is_none() {
                    for field in &record.fields {
                        field.shape.collect_records(out);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_collected_through_containers() {
        let shape = Shape::record(
            "Order",
            [
                ("Id", Shape::prim(ShapeKind::String)),
                (
                    "Lines",
                    Shape::seq(Shape::record("Line", [("Qty", Shape::prim(ShapeKind::Int))])),
                ),
                ("Parent", Shape::nullable(Shape::record_ref("Order"))),
            ],
        );
        let records = shape.records();
        assert_eq!(records.len(), 2);
        assert!(records.contains_key("Order"));
        assert_eq!(records["Line"].fields[0].name, "Qty");
    }

    #[test]
    fn display_name_sees_through_nullable() {
        let shape = Shape::nullable(Shape::Record(Record {
            name: "User".to_string(),
            fields: Vec::new(),
        }));
        assert_eq!(shape.display_name(), "User");
        assert_eq!(Shape::seq(Shape::prim(ShapeKind::Int)).display_name(), "sequence");
    }
}
