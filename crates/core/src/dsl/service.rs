use crate::attribute::{AttributeExpr, META_FAULT, META_TEMPORARY, META_TIMEOUT};
use crate::dsl::TypeSpec;
use crate::expr::{ErrorExpr, Expr, MethodExpr, ServiceExpr, StreamKind, ERROR_TYPE};
use crate::session::Session;
use crate::types::{AttrId, DataType, ServiceId};

/// Which method attribute a payload or result call sets.
#[derive(Clone, Copy)]
enum Slot {
    Payload,
    StreamingPayload,
    Result,
    StreamingResult,
}

impl Slot {
    fn construct(self) -> &'static str {
        match self {
            Slot::Payload => "Payload",
            Slot::StreamingPayload => "StreamingPayload",
            Slot::Result => "Result",
            Slot::StreamingResult => "StreamingResult",
        }
    }
}

impl Session {
    /// Declare a service. Its body runs after the current declarations.
    #[track_caller]
    pub fn service(
        &mut self,
        name: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<ServiceId> {
        if self.current() != Expr::Top {
            self.incompatible_dsl("Service");
            return None;
        }
        if let Some(existing) = self.design.find_service(name) {
            self.report_error(format!("service \"{}\" is defined twice", name));
            return Some(existing);
        }
        let id = self.design.add_service(ServiceExpr {
            name: name.to_string(),
            description: None,
            methods: Vec::new(),
            errors: Vec::new(),
            requirements: Vec::new(),
            no_security: false,
        });
        self.register(Expr::Service(id), Some(Box::new(dsl)));
        Some(id)
    }

    /// Declare a method of the current service. The body is deferred.
    #[track_caller]
    pub fn method(&mut self, name: &str, dsl: impl FnOnce(&mut Session) + 'static) {
        let service = match self.current() {
            Expr::Service(id) => id,
            _ => {
                self.incompatible_dsl("Method");
                return;
            }
        };
        let duplicate = self
            .design
            .service(service)
            .methods
            .iter()
            .any(|m| self.design.method(*m).name == name);
        if duplicate {
            self.report_error(format!("method \"{}\" is defined twice", name));
            return;
        }
        let id = self.design.add_method(MethodExpr {
            name: name.to_string(),
            service,
            description: None,
            payload: None,
            streaming_payload: None,
            result: None,
            streaming_result: false,
            errors: Vec::new(),
            requirements: Vec::new(),
            no_security: false,
            stream: StreamKind::None,
        });
        self.design.service_mut(service).methods.push(id);
        self.register(Expr::Method(id), Some(Box::new(dsl)));
    }

    #[track_caller]
    fn set_method_attr<F: FnOnce(&mut Session)>(
        &mut self,
        slot: Slot,
        spec: Option<TypeSpec>,
        dsl: Option<F>,
    ) {
        let method = match self.current() {
            Expr::Method(id) => id,
            _ => {
                self.incompatible_dsl(slot.construct());
                return;
            }
        };
        let dt = match spec {
            Some(spec) => Some(self.resolve_spec(spec)),
            None => None,
        };
        let attr = self.design.new_attr(AttributeExpr {
            type_: dt,
            ..AttributeExpr::default()
        });
        let m = self.design.method_mut(method);
        match slot {
            Slot::Payload => m.payload = Some(attr),
            Slot::StreamingPayload => m.streaming_payload = Some(attr),
            Slot::Result => {
                m.result = Some(attr);
                m.streaming_result = false;
            }
            Slot::StreamingResult => {
                m.result = Some(attr);
                m.streaming_result = true;
            }
        }
        if let Some(dsl) = dsl {
            self.execute(Expr::Attribute(attr), dsl);
        }
    }

    #[track_caller]
    pub fn payload(&mut self, spec: impl Into<TypeSpec>) {
        self.set_method_attr(Slot::Payload, Some(spec.into()), None::<fn(&mut Session)>);
    }

    #[track_caller]
    pub fn payload_with(&mut self, spec: impl Into<TypeSpec>, dsl: impl FnOnce(&mut Session)) {
        self.set_method_attr(Slot::Payload, Some(spec.into()), Some(dsl));
    }

    /// Declare an inline object payload.
    #[track_caller]
    pub fn payload_dsl(&mut self, dsl: impl FnOnce(&mut Session)) {
        self.set_method_attr(Slot::Payload, None, Some(dsl));
    }

    #[track_caller]
    pub fn streaming_payload(&mut self, spec: impl Into<TypeSpec>) {
        self.set_method_attr(
            Slot::StreamingPayload,
            Some(spec.into()),
            None::<fn(&mut Session)>,
        );
    }

    #[track_caller]
    pub fn streaming_payload_dsl(&mut self, dsl: impl FnOnce(&mut Session)) {
        self.set_method_attr(Slot::StreamingPayload, None, Some(dsl));
    }

    #[track_caller]
    pub fn result(&mut self, spec: impl Into<TypeSpec>) {
        self.set_method_attr(Slot::Result, Some(spec.into()), None::<fn(&mut Session)>);
    }

    #[track_caller]
    pub fn result_with(&mut self, spec: impl Into<TypeSpec>, dsl: impl FnOnce(&mut Session)) {
        self.set_method_attr(Slot::Result, Some(spec.into()), Some(dsl));
    }

    /// Declare an inline object result.
    #[track_caller]
    pub fn result_dsl(&mut self, dsl: impl FnOnce(&mut Session)) {
        self.set_method_attr(Slot::Result, None, Some(dsl));
    }

    #[track_caller]
    pub fn streaming_result(&mut self, spec: impl Into<TypeSpec>) {
        self.set_method_attr(
            Slot::StreamingResult,
            Some(spec.into()),
            None::<fn(&mut Session)>,
        );
    }

    // ── Errors ──

    /// Declare an error of the built-in error type.
    #[track_caller]
    pub fn error(&mut self, name: &str) {
        self.add_error(name, None, None::<fn(&mut Session)>);
    }

    /// Declare an error of the built-in error type and run `dsl` on it.
    #[track_caller]
    pub fn error_with(&mut self, name: &str, dsl: impl FnOnce(&mut Session)) {
        self.add_error(name, None, Some(dsl));
    }

    /// Declare an error with its own type.
    #[track_caller]
    pub fn error_of(&mut self, name: &str, spec: impl Into<TypeSpec>) {
        self.add_error(name, Some(spec.into()), None::<fn(&mut Session)>);
    }

    #[track_caller]
    fn add_error<F: FnOnce(&mut Session)>(
        &mut self,
        name: &str,
        spec: Option<TypeSpec>,
        dsl: Option<F>,
    ) {
        let current = self.current();
        let existing = match current {
            Expr::Api => &self.design.api.errors,
            Expr::Service(id) => &self.design.service(id).errors,
            Expr::Method(id) => &self.design.method(id).errors,
            _ => {
                self.incompatible_dsl("Error");
                return;
            }
        };
        if existing.iter().any(|e| e.name == name) {
            self.report_error(format!("error \"{}\" is defined twice", name));
            return;
        }
        let dt = match spec {
            Some(spec) => self.resolve_spec(spec),
            None => DataType::User(self.type_ref(ERROR_TYPE)),
        };
        let attr = self.design.new_attr(AttributeExpr::typed(dt));
        let error = ErrorExpr {
            name: name.to_string(),
            attr,
        };
        match current {
            Expr::Api => self.design.api.errors.push(error),
            Expr::Service(id) => self.design.service_mut(id).errors.push(error),
            Expr::Method(id) => self.design.method_mut(id).errors.push(error),
            _ => {}
        }
        if let Some(dsl) = dsl {
            self.execute(Expr::Attribute(attr), dsl);
        }
    }

    #[track_caller]
    fn tag_error(&mut self, construct: &str, key: &str) {
        match self.current() {
            Expr::Attribute(attr) if self.is_error_attr(attr) => {
                self.design
                    .attr_mut(attr)
                    .meta
                    .insert(key.to_string(), vec!["true".to_string()]);
            }
            _ => self.incompatible_dsl(construct),
        }
    }

    fn is_error_attr(&self, attr: AttrId) -> bool {
        let api = self.design.api.errors.iter();
        let services = self
            .design
            .service_ids()
            .flat_map(|s| self.design.service(s).errors.iter());
        let methods = self
            .design
            .method_ids()
            .flat_map(|m| self.design.method(m).errors.iter());
        api.chain(services).chain(methods).any(|e| e.attr == attr)
    }

    /// Mark the current error as temporary.
    #[track_caller]
    pub fn temporary(&mut self) {
        self.tag_error("Temporary", META_TEMPORARY);
    }

    #[track_caller]
    pub fn timeout(&mut self) {
        self.tag_error("Timeout", META_TIMEOUT);
    }

    #[track_caller]
    pub fn fault(&mut self) {
        self.tag_error("Fault", META_FAULT);
    }
}
