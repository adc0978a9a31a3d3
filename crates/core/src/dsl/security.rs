use crate::attribute::META_SECURITY;
use crate::expr::{Expr, Requirement, SchemeExpr, SchemeKind, ScopeExpr};
use crate::session::{DslFn, Session};
use crate::types::{Primitive, SchemeId};

impl Session {
    /// Declare a basic auth security scheme.
    #[track_caller]
    pub fn basic_auth(
        &mut self,
        name: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<SchemeId> {
        self.declare_scheme("BasicAuthSecurity", name, SchemeKind::Basic, Box::new(dsl))
    }

    #[track_caller]
    pub fn api_key_security(
        &mut self,
        name: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<SchemeId> {
        self.declare_scheme("APIKeySecurity", name, SchemeKind::ApiKey, Box::new(dsl))
    }

    #[track_caller]
    pub fn oauth2_security(
        &mut self,
        name: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<SchemeId> {
        self.declare_scheme("OAuth2Security", name, SchemeKind::OAuth2, Box::new(dsl))
    }

    #[track_caller]
    pub fn jwt_security(
        &mut self,
        name: &str,
        dsl: impl FnOnce(&mut Session) + 'static,
    ) -> Option<SchemeId> {
        self.declare_scheme("JWTSecurity", name, SchemeKind::Jwt, Box::new(dsl))
    }

    #[track_caller]
    fn declare_scheme(
        &mut self,
        construct: &str,
        name: &str,
        kind: SchemeKind,
        dsl: DslFn,
    ) -> Option<SchemeId> {
        if self.current() != Expr::Top {
            self.incompatible_dsl(construct);
            return None;
        }
        if let Some(existing) = self.design.find_scheme(name) {
            self.report_error(format!("security scheme \"{}\" is defined twice", name));
            return Some(existing);
        }
        let id = self.design.add_scheme(SchemeExpr {
            name: name.to_string(),
            kind,
            description: None,
            scopes: Vec::new(),
        });
        self.register(Expr::Scheme(id), Some(dsl));
        Some(id)
    }

    /// Declare a scope of the current OAuth2 or JWT scheme.
    #[track_caller]
    pub fn scope(&mut self, name: &str, description: &str) {
        match self.current() {
            Expr::Scheme(id)
                if matches!(
                    self.design.scheme(id).kind,
                    SchemeKind::OAuth2 | SchemeKind::Jwt
                ) =>
            {
                self.design.scheme_mut(id).scopes.push(ScopeExpr {
                    name: name.to_string(),
                    description: (!description.is_empty()).then(|| description.to_string()),
                });
            }
            _ => self.incompatible_dsl("Scope"),
        }
    }

    /// Require `scheme` with `scopes`. Scheme and scope names are checked
    /// at finalize.
    #[track_caller]
    pub fn security(&mut self, scheme: &str, scopes: &[&str]) {
        let requirement = Requirement {
            scheme: scheme.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        };
        match self.current() {
            Expr::Api => self.design.api.requirements.push(requirement),
            Expr::Service(id) => self.design.service_mut(id).requirements.push(requirement),
            Expr::Method(id) => self.design.method_mut(id).requirements.push(requirement),
            _ => self.incompatible_dsl("Security"),
        }
    }

    /// Opt out of inherited security requirements.
    #[track_caller]
    pub fn no_security(&mut self) {
        match self.current() {
            Expr::Service(id) => self.design.service_mut(id).no_security = true,
            Expr::Method(id) => self.design.method_mut(id).no_security = true,
            _ => self.incompatible_dsl("NoSecurity"),
        }
    }

    // ── Payload credentials ──

    #[track_caller]
    pub fn username(&mut self, name: &str) {
        self.credential("Username", name, &["username"]);
    }

    #[track_caller]
    pub fn password(&mut self, name: &str) {
        self.credential("Password", name, &["password"]);
    }

    /// Declare the payload attribute holding the key of `scheme`.
    #[track_caller]
    pub fn api_key(&mut self, scheme: &str, name: &str) {
        self.credential("APIKey", name, &["apikey", scheme]);
    }

    #[track_caller]
    pub fn token(&mut self, name: &str) {
        self.credential("Token", name, &["token"]);
    }

    #[track_caller]
    pub fn access_token(&mut self, name: &str) {
        self.credential("AccessToken", name, &["accesstoken"]);
    }

    #[track_caller]
    fn credential(&mut self, construct: &str, name: &str, tag: &[&str]) {
        if self.target_attr().is_none() {
            self.incompatible_dsl(construct);
            return;
        }
        let tag: Vec<String> = tag.iter().map(|t| t.to_string()).collect();
        self.attribute_with(name, Primitive::String, move |s| {
            let values: Vec<&str> = tag.iter().map(String::as_str).collect();
            s.meta(META_SECURITY, &values);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1_execute::execute_roots;

    #[test]
    fn scopes_only_on_oauth2_and_jwt() {
        let mut session = Session::default();
        session.oauth2_security("oauth", |s| s.scope("api:read", "Read access"));
        session.basic_auth("basic", |s| s.scope("api:read", ""));
        execute_roots(&mut session);
        let design = session.design();
        let oauth = design.find_scheme("oauth").unwrap();
        assert_eq!(design.scheme(oauth).scopes[0].name, "api:read");
        assert_eq!(session.errors().len(), 1);
        assert_eq!(
            session.errors()[0].message,
            "invalid use of Scope in basic security scheme \"basic\""
        );
    }

    #[test]
    fn credentials_are_tagged_payload_attributes() {
        let mut session = Session::default();
        session.api_key_security("key", |_| {});
        session.service("calc", |s| {
            s.method("add", |s| {
                s.security("key", &[]);
                s.payload_dsl(|s| s.api_key("key", "key"));
            });
        });
        execute_roots(&mut session);
        let design = session.design();
        let add = design.find_method("calc", "add").unwrap();
        let payload = design.method(add).payload.unwrap();
        let key = design.field(payload, "key").unwrap();
        assert_eq!(
            design.attr(key).meta.get(META_SECURITY).unwrap(),
            &vec!["apikey".to_string(), "key".to_string()]
        );
        assert_eq!(design.method(add).requirements[0].scheme, "key");
    }

    #[test]
    fn no_security_in_api_is_incompatible() {
        let mut session = Session::default();
        session.api("calc", |s| s.no_security());
        execute_roots(&mut session);
        assert_eq!(
            session.errors()[0].message,
            "invalid use of NoSecurity in API \"calc\""
        );
    }
}
