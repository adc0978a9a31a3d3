//! Declaration containers held by the design arena.
//!
//! Attributes hold the data; the structs in this module only name and group
//! them. [`Expr`] is the closed set of declaration kinds that can sit on the
//! evaluation stack.

use crate::shape::Shape;
use crate::types::{AttrId, MethodId, SchemeId, ServiceId, TypeId};

/// Name of the view every result type has.
pub const DEFAULT_VIEW: &str = "default";

/// Name of the built-in error result type.
pub const ERROR_TYPE: &str = "Error";

/// A declaration on the evaluation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr {
    /// Nothing is being evaluated: host code at the top level.
    Top,
    Api,
    Contact,
    License,
    Docs,
    Service(ServiceId),
    Method(MethodId),
    Attribute(AttrId),
    UserType(TypeId),
    Scheme(SchemeId),
}

// ── Types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Referenced by name but not declared (yet).
    Placeholder,
    Declared,
    Builtin,
    /// Created by a collection declaration.
    Generated,
    /// Computed from a result type view.
    Projected,
    /// Synthesized from an external shape.
    External,
}

#[derive(Debug, Clone)]
pub struct UserTypeExpr {
    pub name: String,
    pub attr: AttrId,
    pub kind: TypeKind,
    pub result: Option<ResultInfo>,
}

impl UserTypeExpr {
    pub fn is_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn view(&self, name: &str) -> Option<&ViewExpr> {
        self.result.as_ref()?.views.iter().find(|v| v.name == name)
    }
}

/// Result type specifics.
#[derive(Debug, Clone, Default)]
pub struct ResultInfo {
    pub identifier: String,
    pub content_type: Option<String>,
    pub views: Vec<ViewExpr>,
    /// Element result type of a generated collection.
    pub collection_of: Option<TypeId>,
}

/// A named subset of a result type's top-level fields.
#[derive(Debug, Clone)]
pub struct ViewExpr {
    pub name: String,
    /// Object attribute holding duplicates of the exposed fields.
    pub attr: AttrId,
}

/// Conversion direction of a [`TypeMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Design type to external record.
    ConvertTo,
    /// External record to design type.
    CreateFrom,
}

/// A design type paired with an external shape.
#[derive(Debug, Clone)]
pub struct TypeMap {
    pub user: TypeId,
    pub direction: Direction,
    pub shape: Shape,
}

// ── API ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ApiExpr {
    pub name: String,
    pub declared: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub terms_of_service: Option<String>,
    pub contact: Option<ContactExpr>,
    pub license: Option<LicenseExpr>,
    pub docs: Option<DocsExpr>,
    pub errors: Vec<ErrorExpr>,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactExpr {
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LicenseExpr {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocsExpr {
    pub description: Option<String>,
    pub url: Option<String>,
}

// ── Services ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceExpr {
    pub name: String,
    pub description: Option<String>,
    pub methods: Vec<MethodId>,
    pub errors: Vec<ErrorExpr>,
    pub requirements: Vec<Requirement>,
    pub no_security: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    None,
    Client,
    Server,
    Bidirectional,
}

#[derive(Debug, Clone)]
pub struct MethodExpr {
    pub name: String,
    pub service: ServiceId,
    pub description: Option<String>,
    pub payload: Option<AttrId>,
    pub streaming_payload: Option<AttrId>,
    pub result: Option<AttrId>,
    pub streaming_result: bool,
    pub errors: Vec<ErrorExpr>,
    pub requirements: Vec<Requirement>,
    pub no_security: bool,
    pub stream: StreamKind,
}

/// A named error response. The attribute's type defaults to the built-in
/// error result type.
#[derive(Debug, Clone)]
pub struct ErrorExpr {
    pub name: String,
    pub attr: AttrId,
}

// ── Security ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeKind {
    Basic,
    ApiKey,
    OAuth2,
    Jwt,
}

impl SchemeKind {
    pub fn name(self) -> &'static str {
        match self {
            SchemeKind::Basic => "basic",
            SchemeKind::ApiKey => "apikey",
            SchemeKind::OAuth2 => "oauth2",
            SchemeKind::Jwt => "jwt",
        }
    }

    /// Payload tag a method secured by this kind must define.
    pub fn payload_tags(self) -> &'static [&'static str] {
        match self {
            SchemeKind::Basic => &["username", "password"],
            SchemeKind::ApiKey => &["apikey"],
            SchemeKind::OAuth2 => &["accesstoken"],
            SchemeKind::Jwt => &["token"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemeExpr {
    pub name: String,
    pub kind: SchemeKind,
    pub description: Option<String>,
    pub scopes: Vec<ScopeExpr>,
}

#[derive(Debug, Clone)]
pub struct ScopeExpr {
    pub name: String,
    pub description: Option<String>,
}

/// A security requirement: a scheme (by name) and the scopes it demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub scheme: String,
    pub scopes: Vec<String>,
}
