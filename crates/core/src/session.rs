//! The design arena and the evaluation session.
//!
//! A [`Session`] is created per compilation run. It owns the [`Design`]
//! (every declaration and attribute), the stack of declarations currently
//! being evaluated, the queue of deferred declarations and the accumulated
//! errors. Nothing is global: two sessions never share state.

use std::collections::HashMap;
use std::panic::Location;

use serde_json::json;
use tracing::trace;

use crate::attribute::AttributeExpr;
use crate::config::CompileConfig;
use crate::error::EvalError;
use crate::expr::{
    ApiExpr, Expr, MethodExpr, ResultInfo, SchemeExpr, ServiceExpr, TypeKind, TypeMap,
    UserTypeExpr, ERROR_TYPE,
};
use crate::pass6_transform::ConversionPlan;
use crate::types::{AttrId, DataType, MethodId, Object, Primitive, SchemeId, ServiceId, TypeId};

/// A deferred declaration body.
pub type DslFn = Box<dyn FnOnce(&mut Session)>;

/// User types cannot alias each other deeper than this.
const MAX_ALIAS_DEPTH: usize = 32;

// ── Design ───────────────────────────────────────────────────────────

/// Arena owning every declaration of one compilation run.
#[derive(Debug, Default)]
pub struct Design {
    attrs: Vec<AttributeExpr>,
    types: Vec<UserTypeExpr>,
    type_names: HashMap<String, TypeId>,
    /// Placeholders adopted by a type renamed to their name.
    redirects: HashMap<TypeId, TypeId>,
    pub(crate) canonical_ids: HashMap<String, TypeId>,
    pub(crate) api: ApiExpr,
    services: Vec<ServiceExpr>,
    methods: Vec<MethodExpr>,
    schemes: Vec<SchemeExpr>,
    pub(crate) type_maps: Vec<TypeMap>,
    /// Element result type to generated collection type.
    pub(crate) collections: HashMap<TypeId, TypeId>,
    /// (result type, view name) to projected type.
    pub(crate) projections: HashMap<(TypeId, String), TypeId>,
    pub(crate) plans: Vec<ConversionPlan>,
}

impl Design {
    // ── Attributes ──

    pub(crate) fn new_attr(&mut self, attr: AttributeExpr) -> AttrId {
        self.attrs.push(attr);
        AttrId(self.attrs.len() - 1)
    }

    pub fn attr(&self, id: AttrId) -> &AttributeExpr {
        &self.attrs[id.0]
    }

    pub(crate) fn attr_mut(&mut self, id: AttrId) -> &mut AttributeExpr {
        &mut self.attrs[id.0]
    }

    pub(crate) fn attr_count(&self) -> usize {
        self.attrs.len()
    }

    /// Deep copy of an attribute. Nested attributes get fresh slots; named
    /// user types stay shared.
    pub(crate) fn dup_attr(&mut self, id: AttrId) -> AttrId {
        let mut copy = self.attr(id).clone();
        copy.type_ = match copy.type_.take() {
            Some(DataType::Array(elem)) => Some(DataType::Array(self.dup_attr(elem))),
            Some(DataType::Map { key, elem }) => Some(DataType::Map {
                key: self.dup_attr(key),
                elem: self.dup_attr(elem),
            }),
            Some(DataType::Object(obj)) => Some(DataType::Object(self.dup_object(&obj))),
            Some(DataType::Union(obj)) => Some(DataType::Union(self.dup_object(&obj))),
            other => other,
        };
        self.new_attr(copy)
    }

    pub(crate) fn dup_object(&mut self, obj: &Object) -> Object {
        let mut out = Object::new();
        for field in obj.iter() {
            let copy = self.dup_attr(field.attr);
            out.set(field.name.clone(), copy);
        }
        out
    }

    /// The type of an attribute with user type aliases followed.
    pub fn resolved_type(&self, attr: AttrId) -> Option<&DataType> {
        let mut dt = self.attr(attr).type_.as_ref()?;
        for _ in 0..MAX_ALIAS_DEPTH {
            match dt {
                DataType::User(t) => dt = self.attr(self.user_type(*t).attr).type_.as_ref()?,
                other => return Some(other),
            }
        }
        None
    }

    /// The object an attribute describes, following user types.
    pub fn object(&self, attr: AttrId) -> Option<&Object> {
        self.resolved_type(attr).and_then(DataType::as_object)
    }

    /// Field `name` of the object `attr` describes.
    pub fn field(&self, attr: AttrId, name: &str) -> Option<AttrId> {
        self.object(attr)?.get(name)
    }

    /// Required names of an attribute, following user types.
    pub fn all_required(&self, attr: AttrId) -> Vec<String> {
        let mut id = attr;
        for _ in 0..MAX_ALIAS_DEPTH {
            match &self.attr(id).type_ {
                Some(DataType::User(t)) if self.attr(id).required().is_empty() => {
                    id = self.user_type(*t).attr;
                }
                _ => return self.attr(id).required().to_vec(),
            }
        }
        Vec::new()
    }

    /// Name of a data type for diagnostics.
    pub fn type_name(&self, dt: &DataType) -> String {
        match dt {
            DataType::Primitive(p) => p.name().to_string(),
            DataType::Array(_) => "array".to_string(),
            DataType::Map { .. } => "map".to_string(),
            DataType::Object(_) => "object".to_string(),
            DataType::Union(_) => "union".to_string(),
            DataType::User(t) => self.user_type(*t).name.clone(),
        }
    }

    pub fn attr_type_name(&self, attr: AttrId) -> String {
        match &self.attr(attr).type_ {
            Some(dt) => self.type_name(dt),
            None => Primitive::String.name().to_string(),
        }
    }

    // ── User types ──

    pub(crate) fn add_type(
        &mut self,
        name: &str,
        attr: AttrId,
        kind: TypeKind,
        result: Option<ResultInfo>,
    ) -> TypeId {
        let id = self.add_unindexed_type(name, attr, kind, result);
        self.type_names.insert(name.to_string(), id);
        id
    }

    /// Add a type that cannot be found by name (projections and
    /// synthesized external types live in their own namespaces).
    pub(crate) fn add_unindexed_type(
        &mut self,
        name: &str,
        attr: AttrId,
        kind: TypeKind,
        result: Option<ResultInfo>,
    ) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(UserTypeExpr {
            name: name.to_string(),
            attr,
            kind,
            result,
        });
        id
    }

    /// Rename a type. A placeholder holding the new name is adopted: every
    /// reference to it now resolves to `id`. Fails when the name belongs to
    /// another declared type.
    pub(crate) fn rename_type(&mut self, id: TypeId, name: &str) -> Result<(), TypeId> {
        let id = self.resolve_id(id);
        if let Some(&other) = self.type_names.get(name) {
            if other == id {
                return Ok(());
            }
            if self.types[other.0].kind != TypeKind::Placeholder {
                return Err(other);
            }
            self.redirects.insert(other, id);
        }
        let old = std::mem::replace(&mut self.types[id.0].name, name.to_string());
        self.type_names.remove(&old);
        self.type_names.insert(name.to_string(), id);
        Ok(())
    }

    /// Follow placeholder adoption.
    pub fn resolve_id(&self, mut id: TypeId) -> TypeId {
        while let Some(&next) = self.redirects.get(&id) {
            id = next;
        }
        id
    }

    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.type_names.get(name).copied()
    }

    pub fn user_type(&self, id: TypeId) -> &UserTypeExpr {
        &self.types[self.resolve_id(id).0]
    }

    pub(crate) fn user_type_mut(&mut self, id: TypeId) -> &mut UserTypeExpr {
        let id = self.resolve_id(id);
        &mut self.types[id.0]
    }

    /// Every type handle in declaration order, adopted placeholders
    /// excluded.
    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        (0..self.types.len())
            .map(TypeId)
            .filter(|id| !self.redirects.contains_key(id))
    }

    /// The projected type computed for a result type view.
    pub fn projection(&self, result: TypeId, view: &str) -> Option<TypeId> {
        self.projections
            .get(&(self.resolve_id(result), view.to_string()))
            .copied()
    }

    /// The collection type generated for an element result type.
    pub fn collection(&self, elem: TypeId) -> Option<TypeId> {
        self.collections.get(&self.resolve_id(elem)).copied()
    }

    // ── API, services, methods, schemes ──

    pub fn api(&self) -> &ApiExpr {
        &self.api
    }

    pub(crate) fn add_service(&mut self, service: ServiceExpr) -> ServiceId {
        self.services.push(service);
        ServiceId(self.services.len() - 1)
    }

    pub fn service(&self, id: ServiceId) -> &ServiceExpr {
        &self.services[id.0]
    }

    pub(crate) fn service_mut(&mut self, id: ServiceId) -> &mut ServiceExpr {
        &mut self.services[id.0]
    }

    pub fn service_ids(&self) -> impl Iterator<Item = ServiceId> {
        (0..self.services.len()).map(ServiceId)
    }

    pub fn find_service(&self, name: &str) -> Option<ServiceId> {
        self.services
            .iter()
            .position(|s| s.name == name)
            .map(ServiceId)
    }

    pub(crate) fn add_method(&mut self, method: MethodExpr) -> MethodId {
        self.methods.push(method);
        MethodId(self.methods.len() - 1)
    }

    pub fn method(&self, id: MethodId) -> &MethodExpr {
        &self.methods[id.0]
    }

    pub(crate) fn method_mut(&mut self, id: MethodId) -> &mut MethodExpr {
        &mut self.methods[id.0]
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len()).map(MethodId)
    }

    pub fn find_method(&self, service: &str, method: &str) -> Option<MethodId> {
        let sid = self.find_service(service)?;
        self.service(sid)
            .methods
            .iter()
            .copied()
            .find(|m| self.method(*m).name == method)
    }

    pub(crate) fn add_scheme(&mut self, scheme: SchemeExpr) -> SchemeId {
        self.schemes.push(scheme);
        SchemeId(self.schemes.len() - 1)
    }

    pub fn scheme(&self, id: SchemeId) -> &SchemeExpr {
        &self.schemes[id.0]
    }

    pub(crate) fn scheme_mut(&mut self, id: SchemeId) -> &mut SchemeExpr {
        &mut self.schemes[id.0]
    }

    pub fn schemes(&self) -> &[SchemeExpr] {
        &self.schemes
    }

    pub fn find_scheme(&self, name: &str) -> Option<SchemeId> {
        self.schemes
            .iter()
            .position(|s| s.name == name)
            .map(SchemeId)
    }

    pub fn type_maps(&self) -> &[TypeMap] {
        &self.type_maps
    }

    /// Conversion plans computed by the last finalize.
    pub fn plans(&self) -> &[ConversionPlan] {
        &self.plans
    }

    /// Name of a declaration as used in error messages.
    pub fn eval_name(&self, expr: Expr) -> String {
        match expr {
            Expr::Top => "top level".to_string(),
            Expr::Api => format!("API \"{}\"", self.api.name),
            Expr::Contact => "contact".to_string(),
            Expr::License => "license".to_string(),
            Expr::Docs => "docs".to_string(),
            Expr::Service(id) => format!("service \"{}\"", self.service(id).name),
            Expr::Method(id) => {
                let m = self.method(id);
                format!(
                    "service \"{}\" method \"{}\"",
                    self.service(m.service).name,
                    m.name
                )
            }
            Expr::Attribute(_) => "attribute".to_string(),
            Expr::UserType(id) => {
                let t = self.user_type(id);
                if t.is_result() {
                    format!("result type \"{}\"", t.name)
                } else {
                    format!("type \"{}\"", t.name)
                }
            }
            Expr::Scheme(id) => {
                let s = self.scheme(id);
                format!("{} security scheme \"{}\"", s.kind.name(), s.name)
            }
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

struct Root {
    expr: Expr,
    dsl: Option<DslFn>,
}

/// One compilation run: the design plus evaluation state.
pub struct Session {
    pub(crate) design: Design,
    pub(crate) config: CompileConfig,
    pub(crate) errors: Vec<EvalError>,
    stack: Vec<Expr>,
    pending: Vec<Root>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(CompileConfig::default())
    }
}

impl Session {
    /// A fresh session with the built-in error result type registered.
    pub fn new(config: CompileConfig) -> Self {
        let mut session = Session {
            design: Design::default(),
            config,
            errors: Vec::new(),
            stack: Vec::new(),
            pending: Vec::new(),
        };
        session.register_error_type();
        session
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn errors(&self) -> &[EvalError] {
        &self.errors
    }

    pub fn into_design(self) -> Design {
        self.design
    }

    // ── Context stack ──

    /// The declaration currently being evaluated.
    pub fn current(&self) -> Expr {
        self.stack.last().copied().unwrap_or(Expr::Top)
    }

    /// Run `dsl` with `expr` on top of the stack. Returns true iff no error
    /// was reported while it ran.
    pub fn execute(&mut self, expr: Expr, dsl: impl FnOnce(&mut Session)) -> bool {
        let before = self.errors.len();
        self.stack.push(expr);
        dsl(self);
        self.stack.pop();
        self.errors.len() == before
    }

    /// Queue a deferred declaration. It runs after every declaration queued
    /// before it.
    pub(crate) fn register(&mut self, expr: Expr, dsl: Option<DslFn>) {
        trace!(context = %self.design.eval_name(expr), "registered deferred declaration");
        self.pending.push(Root { expr, dsl });
    }

    /// Take every queued declaration, leaving the queue empty.
    pub(crate) fn take_pending(&mut self) -> Vec<(Expr, Option<DslFn>)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|root| (root.expr, root.dsl))
            .collect()
    }

    // ── Errors ──

    /// Record an error against the current declaration, located at the
    /// host call site.
    #[track_caller]
    pub fn report_error(&mut self, message: impl Into<String>) {
        let location = Location::caller();
        let message = match self.current() {
            Expr::Top => format!("{} (top level)", message.into()),
            expr => format!("{} in {}", message.into(), self.design.eval_name(expr)),
        };
        self.errors.push(EvalError::new(
            message,
            Some(location.file()),
            Some(location.line()),
        ));
    }

    /// Report a DSL function used in a context that does not accept it.
    #[track_caller]
    pub fn incompatible_dsl(&mut self, construct: &str) {
        self.report_error(format!("invalid use of {}", construct));
    }

    pub(crate) fn record(&mut self, errors: Vec<EvalError>) {
        self.errors.extend(errors);
    }

    // ── Built-ins ──

    fn register_error_type(&mut self) {
        let string = DataType::Primitive(Primitive::String);
        let boolean = DataType::Primitive(Primitive::Boolean);
        let fields = [
            ("name", string.clone(), "Name is the name of this class of errors."),
            ("id", string.clone(), "ID is a unique identifier for this particular occurrence of the problem."),
            ("message", string, "Message is a human-readable explanation specific to this occurrence of the problem."),
            ("temporary", boolean.clone(), "Is the error temporary?"),
            ("timeout", boolean.clone(), "Is the error a timeout?"),
            ("fault", boolean, "Is the error a server-side fault?"),
        ];
        let mut obj = Object::new();
        for (name, dt, description) in fields {
            let field = self.design.new_attr(AttributeExpr {
                description: Some(description.to_string()),
                ..AttributeExpr::typed(dt)
            });
            obj.set(name, field);
        }
        let mut attr = AttributeExpr::typed(DataType::Object(obj));
        attr.description = Some("Error response result type".to_string());
        attr.validation_mut().add_required(&[
            "name",
            "id",
            "message",
            "temporary",
            "timeout",
            "fault",
        ]);
        attr.examples.push(json!({
            "name": "bad_request",
            "id": "3F1FKVRR",
            "message": "Value of ID must be an integer",
            "temporary": false,
            "timeout": false,
            "fault": false
        }));
        let attr = self.design.new_attr(attr);
        let info = ResultInfo {
            identifier: "application/vnd.trellis.error".to_string(),
            ..ResultInfo::default()
        };
        self.design
            .add_type(ERROR_TYPE, attr, TypeKind::Builtin, Some(info));
    }
}
