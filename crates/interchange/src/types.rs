//! Typed structs representing a finalized trellis design.
//!
//! The bundle is the only surface renderers see: every named type, every
//! service method and every conversion plan, flattened into declaration
//! order. Attribute types are rendered as [`TypeRef`] trees so a consumer
//! never has to chase arena handles.

use serde::{Deserialize, Serialize};

/// Top-level bundle produced by a successful compilation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bundle {
    /// Bundle format version (semver).
    pub version: String,
    pub api: ApiDecl,
    pub types: Vec<TypeDecl>,
    /// Types computed from result type views, in projection order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projections: Vec<TypeDecl>,
    pub services: Vec<ServiceDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<SchemeDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversions: Vec<ConversionDecl>,
}

impl Bundle {
    /// Look up a type declaration by name.
    pub fn find_type(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Look up a projected type by name.
    pub fn find_projection(&self, name: &str) -> Option<&TypeDecl> {
        self.projections.iter().find(|t| t.name == name)
    }

    /// Look up a service declaration by name.
    pub fn find_service(&self, name: &str) -> Option<&ServiceDecl> {
        self.services.iter().find(|s| s.name == name)
    }
}

// ── API ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiDecl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<DocsDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<RequirementDecl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactDecl {
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LicenseDecl {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocsDecl {
    pub description: Option<String>,
    pub url: Option<String>,
}

// ── Types ───────────────────────────────────────────────────────────

/// How a named type came to exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TypeOrigin {
    /// Declared by the design.
    Declared,
    /// Registered by the compiler before evaluation (the error result type).
    Builtin,
    /// Generated by a collection declaration.
    Generated,
    /// Computed from a result type view.
    Projected,
}

/// A type reference. Named types are referenced by name only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    Primitive { name: String },
    Array { elem: Box<TypeRef> },
    Map { key: Box<TypeRef>, elem: Box<TypeRef> },
    Object { fields: Vec<FieldDecl> },
    Union { variants: Vec<FieldDecl> },
    Named { name: String },
}

/// A named user type or result type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub origin: TypeOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewDecl>,
}

impl TypeDecl {
    /// The top-level fields of an object type, in declaration order.
    pub fn fields(&self) -> &[FieldDecl] {
        match &self.type_ref {
            TypeRef::Object { fields } => fields,
            _ => &[],
        }
    }
}

/// One field of an object (or one variant of a union).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta: Vec<MetaDecl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationDecl {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetaDecl {
    pub key: String,
    pub values: Vec<String>,
}

/// A result type view: the ordered field names it exposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewDecl {
    pub name: String,
    pub fields: Vec<String>,
    /// Name of the projected type computed for this view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected: Option<String>,
}

// ── Services ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDecl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub methods: Vec<MethodDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDecl>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    None,
    Client,
    Server,
    Bidirectional,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub payload: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_payload: Option<TypeRef>,
    pub result: TypeRef,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streaming_result: bool,
    pub stream: StreamKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<RequirementDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub temporary: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timeout: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fault: bool,
}

// ── Security ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemeDecl {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequirementDecl {
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

// ── Conversions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversionDirection {
    ConvertTo,
    CreateFrom,
}

/// A conversion plan between a design type and an external record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionDecl {
    pub direction: ConversionDirection,
    /// Design type name.
    pub type_name: String,
    /// External record name.
    pub external: String,
    /// Entry function name.
    pub function: String,
    pub fields: Vec<FieldConversionDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub helpers: Vec<HelperDecl>,
}

/// How one target field is populated from its source field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldConversionDecl {
    pub source: String,
    pub target: String,
    /// One of `direct`, `dereference`, `address_of`, `recurse`.
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HelperKind {
    Object,
    Array,
    Map,
}

/// A helper function the entry function (or another helper) calls.
///
/// Object helpers list one conversion per field. Array helpers list the
/// element conversion (`elem`), map helpers the key and value conversions
/// (`key`, `elem`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelperDecl {
    pub name: String,
    pub kind: HelperKind,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldConversionDecl>,
}
