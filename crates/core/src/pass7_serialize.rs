//! Pass 7: Interchange serialization -- flatten the finalized design into a
//! [`Bundle`].
//!
//! Types are listed in declaration order, projections in the order they
//! were computed. Placeholders and synthesized external types are left
//! out; external records only appear through the conversion plans.

use trellis_interchange::{
    ApiDecl, Bundle, ContactDecl, ConversionDecl, ConversionDirection, DocsDecl, ErrorDecl,
    FieldConversionDecl, FieldDecl, HelperDecl, HelperKind, LicenseDecl, MetaDecl, MethodDecl,
    RequirementDecl, SchemeDecl, ServiceDecl, StreamKind as StreamDecl, TypeDecl, TypeOrigin,
    TypeRef, ValidationDecl, ViewDecl, BUNDLE_VERSION,
};

use crate::attribute::{Validation, META_FAULT, META_TEMPORARY, META_TIMEOUT};
use crate::expr::{Direction, ErrorExpr, Requirement, StreamKind, TypeKind};
use crate::pass6_transform::{Conversion, ConversionPlan, FieldConversion, HelperBody};
use crate::session::Design;
use crate::types::{AttrId, DataType, Object, TypeId};

pub fn serialize(design: &Design) -> Bundle {
    let mut types = Vec::new();
    let mut projections = Vec::new();
    for id in design.type_ids() {
        let origin = match design.user_type(id).kind {
            TypeKind::Declared => TypeOrigin::Declared,
            TypeKind::Builtin => TypeOrigin::Builtin,
            TypeKind::Generated => TypeOrigin::Generated,
            TypeKind::Projected => {
                projections.push(type_decl(design, id, TypeOrigin::Projected));
                continue;
            }
            TypeKind::Placeholder | TypeKind::External => continue,
        };
        types.push(type_decl(design, id, origin));
    }

    Bundle {
        version: BUNDLE_VERSION.to_string(),
        api: api_decl(design),
        types,
        projections,
        services: design
            .service_ids()
            .map(|sid| {
                let service = design.service(sid);
                ServiceDecl {
                    name: service.name.clone(),
                    description: service.description.clone(),
                    methods: service.methods.iter().map(|&mid| method_decl(design, mid)).collect(),
                    errors: error_decls(design, &service.errors),
                }
            })
            .collect(),
        schemes: design
            .schemes()
            .iter()
            .map(|s| SchemeDecl {
                name: s.name.clone(),
                kind: s.kind.name().to_string(),
                description: s.description.clone(),
                scopes: s.scopes.iter().map(|sc| sc.name.clone()).collect(),
            })
            .collect(),
        conversions: design.plans().iter().map(|p| conversion_decl(design, p)).collect(),
    }
}

// ── API ─────────────────────────────────────────────────────────────

fn api_decl(design: &Design) -> ApiDecl {
    let api = design.api();
    ApiDecl {
        name: api.name.clone(),
        title: api.title.clone(),
        description: api.description.clone(),
        version: api.version.clone(),
        terms_of_service: api.terms_of_service.clone(),
        contact: api.contact.as_ref().map(|c| ContactDecl {
            name: c.name.clone(),
            email: c.email.clone(),
            url: c.url.clone(),
        }),
        license: api.license.as_ref().map(|l| LicenseDecl {
            name: l.name.clone(),
            url: l.url.clone(),
        }),
        docs: api.docs.as_ref().map(|d| DocsDecl {
            description: d.description.clone(),
            url: d.url.clone(),
        }),
        errors: error_decls(design, &api.errors),
        requirements: requirement_decls(&api.requirements),
    }
}

fn requirement_decls(requirements: &[Requirement]) -> Vec<RequirementDecl> {
    requirements
        .iter()
        .map(|r| RequirementDecl {
            scheme: r.scheme.clone(),
            scopes: r.scopes.clone(),
        })
        .collect()
}

// ── Types ───────────────────────────────────────────────────────────

fn type_decl(design: &Design, id: TypeId, origin: TypeOrigin) -> TypeDecl {
    let t = design.user_type(id);
    let attr = design.attr(t.attr);
    let views = t
        .result
        .as_ref()
        .map(|info| {
            info.views
                .iter()
                .map(|v| ViewDecl {
                    name: v.name.clone(),
                    fields: design
                        .object(v.attr)
                        .map(|obj| obj.names().map(str::to_string).collect())
                        .unwrap_or_default(),
                    projected: design
                        .projection(id, &v.name)
                        .map(|p| design.user_type(p).name.clone()),
                })
                .collect()
        })
        .unwrap_or_default();
    TypeDecl {
        name: t.name.clone(),
        origin,
        description: attr.description.clone(),
        type_ref: type_ref(design, t.attr),
        required: attr.required().to_vec(),
        identifier: t.result.as_ref().map(|info| info.identifier.clone()),
        views,
    }
}

fn type_ref(design: &Design, attr: AttrId) -> TypeRef {
    match &design.attr(attr).type_ {
        Some(DataType::Primitive(p)) => TypeRef::Primitive {
            name: p.name().to_string(),
        },
        Some(DataType::Array(elem)) => TypeRef::Array {
            elem: Box::new(type_ref(design, *elem)),
        },
        Some(DataType::Map { key, elem }) => TypeRef::Map {
            key: Box::new(type_ref(design, *key)),
            elem: Box::new(type_ref(design, *elem)),
        },
        Some(DataType::Object(obj)) => TypeRef::Object {
            fields: field_decls(design, attr, obj),
        },
        Some(DataType::Union(obj)) => TypeRef::Union {
            variants: field_decls(design, attr, obj),
        },
        Some(DataType::User(t)) => TypeRef::Named {
            name: design.user_type(*t).name.clone(),
        },
        None => TypeRef::Primitive {
            name: design.attr_type_name(attr),
        },
    }
}

fn field_decls(design: &Design, parent: AttrId, obj: &Object) -> Vec<FieldDecl> {
    let parent = design.attr(parent);
    obj.iter()
        .map(|field| {
            let a = design.attr(field.attr);
            FieldDecl {
                name: field.name.clone(),
                type_ref: type_ref(design, field.attr),
                description: a.description.clone(),
                required: parent.is_required(&field.name),
                default: a.default.clone(),
                validation: a.validation.as_ref().and_then(validation_decl),
                meta: a
                    .meta
                    .iter()
                    .map(|(key, values)| MetaDecl {
                        key: key.clone(),
                        values: values.clone(),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Value rules of an attribute. Required names are carried by the parent.
fn validation_decl(v: &Validation) -> Option<ValidationDecl> {
    let decl = ValidationDecl {
        values: v.values.clone(),
        format: v.format.map(|f| f.name().to_string()),
        pattern: v.pattern.clone(),
        minimum: v.minimum,
        maximum: v.maximum,
        exclusive_minimum: v.exclusive_minimum,
        exclusive_maximum: v.exclusive_maximum,
        min_length: v.min_length,
        max_length: v.max_length,
    };
    (decl != ValidationDecl::default()).then_some(decl)
}

// ── Services ────────────────────────────────────────────────────────

fn method_decl(design: &Design, mid: crate::types::MethodId) -> MethodDecl {
    let method = design.method(mid);
    let or_empty = |attr: Option<AttrId>| {
        attr.map(|a| type_ref(design, a))
            .unwrap_or(TypeRef::Object { fields: Vec::new() })
    };
    MethodDecl {
        name: method.name.clone(),
        description: method.description.clone(),
        payload: or_empty(method.payload),
        streaming_payload: method.streaming_payload.map(|a| type_ref(design, a)),
        result: or_empty(method.result),
        streaming_result: method.streaming_result,
        stream: match method.stream {
            StreamKind::None => StreamDecl::None,
            StreamKind::Client => StreamDecl::Client,
            StreamKind::Server => StreamDecl::Server,
            StreamKind::Bidirectional => StreamDecl::Bidirectional,
        },
        errors: error_decls(design, &method.errors),
        requirements: requirement_decls(&method.requirements),
    }
}

fn error_decls(design: &Design, errors: &[ErrorExpr]) -> Vec<ErrorDecl> {
    errors
        .iter()
        .map(|e| {
            let a = design.attr(e.attr);
            ErrorDecl {
                name: e.name.clone(),
                type_ref: type_ref(design, e.attr),
                temporary: a.has_meta(META_TEMPORARY),
                timeout: a.has_meta(META_TIMEOUT),
                fault: a.has_meta(META_FAULT),
            }
        })
        .collect()
}

// ── Conversions ─────────────────────────────────────────────────────

fn conversion_decl(design: &Design, plan: &ConversionPlan) -> ConversionDecl {
    ConversionDecl {
        direction: match plan.direction {
            Direction::ConvertTo => ConversionDirection::ConvertTo,
            Direction::CreateFrom => ConversionDirection::CreateFrom,
        },
        type_name: design.user_type(plan.user).name.clone(),
        external: plan.external_name.clone(),
        function: plan.function.clone(),
        fields: plan.fields.iter().map(field_conversion_decl).collect(),
        helpers: plan
            .helpers
            .iter()
            .map(|h| {
                let (kind, fields) = match &h.body {
                    HelperBody::Object(fields) => {
                        (HelperKind::Object, fields.iter().map(field_conversion_decl).collect())
                    }
                    HelperBody::Array { elem } => {
                        (HelperKind::Array, vec![slot_decl("elem", elem)])
                    }
                    HelperBody::Map { key, elem } => (
                        HelperKind::Map,
                        vec![slot_decl("key", key), slot_decl("elem", elem)],
                    ),
                };
                HelperDecl {
                    name: h.name.clone(),
                    kind,
                    source: h.source.clone(),
                    target: h.target.clone(),
                    fields,
                }
            })
            .collect(),
    }
}

fn field_conversion_decl(f: &FieldConversion) -> FieldConversionDecl {
    FieldConversionDecl {
        source: f.source.clone(),
        target: f.target.clone(),
        op: op_name(&f.conversion).to_string(),
        helper: f.conversion.helper().map(str::to_string),
    }
}

fn slot_decl(slot: &str, conversion: &Conversion) -> FieldConversionDecl {
    FieldConversionDecl {
        source: slot.to_string(),
        target: slot.to_string(),
        op: op_name(conversion).to_string(),
        helper: conversion.helper().map(str::to_string),
    }
}

fn op_name(conversion: &Conversion) -> &'static str {
    match conversion {
        Conversion::Direct => "direct",
        Conversion::Dereference => "dereference",
        Conversion::AddressOf => "address_of",
        Conversion::Recurse { .. } => "recurse",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::types::Primitive;

    fn finalized(session: &mut Session) -> Bundle {
        session.run_dsl().unwrap();
        serialize(session.design())
    }

    #[test]
    fn placeholders_and_externals_are_left_out() {
        let mut session = Session::default();
        session.type_("User", |s| {
            s.attribute("id", Primitive::String);
            s.required(&["id"]);
            s.convert_to(crate::shape::Shape::record(
                "UserModel",
                [("ID", crate::shape::Shape::prim(crate::shape::ShapeKind::String))],
            ));
        });
        let bundle = finalized(&mut session);
        let names: Vec<_> = bundle.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Error", "User"]);
        let user = bundle.find_type("User").unwrap();
        assert_eq!(user.required, vec!["id"]);
        assert!(user.fields()[0].required);
        assert_eq!(bundle.conversions.len(), 1);
        assert_eq!(bundle.conversions[0].function, "ConvertToUserModel");
        assert_eq!(bundle.conversions[0].fields[0].op, "direct");
    }

    #[test]
    fn views_name_their_projection() {
        let mut session = Session::default();
        session.result_type("application/vnd.bottle", |s| {
            s.attributes(|s| {
                s.attribute("id", Primitive::Int);
                s.attribute("name", Primitive::String);
            });
            s.view("tiny", |s| s.attribute_dsl("id", |_| {}));
        });
        let bundle = finalized(&mut session);
        let bottle = bundle.find_type("Bottle").unwrap();
        let views: Vec<_> = bottle
            .views
            .iter()
            .map(|v| (v.name.as_str(), v.projected.as_deref()))
            .collect();
        assert_eq!(views, vec![("default", Some("Bottle")), ("tiny", Some("BottleTiny"))]);
        let tiny = bundle.find_projection("BottleTiny").unwrap();
        assert_eq!(tiny.origin, TypeOrigin::Projected);
        assert_eq!(tiny.identifier.as_deref(), Some("application/vnd.bottle; view=tiny"));
    }

    #[test]
    fn method_defaults_to_empty_objects() {
        let mut session = Session::default();
        session.service("calc", |s| s.method("ping", |_| {}));
        let bundle = finalized(&mut session);
        let ping = &bundle.find_service("calc").unwrap().methods[0];
        assert_eq!(ping.payload, TypeRef::Object { fields: Vec::new() });
        assert_eq!(ping.stream, StreamDecl::None);
    }
}
