use crate::expr::{ContactExpr, DocsExpr, Expr, LicenseExpr};
use crate::session::Session;

impl Session {
    /// Declare the API. Only one API may be declared.
    #[track_caller]
    pub fn api(&mut self, name: &str, dsl: impl FnOnce(&mut Session) + 'static) {
        if self.current() != Expr::Top {
            self.incompatible_dsl("API");
            return;
        }
        if self.design.api.declared {
            self.report_error(format!(
                "API \"{}\" is already declared, cannot declare API \"{}\"",
                self.design.api.name, name
            ));
            return;
        }
        self.design.api.name = name.to_string();
        self.design.api.declared = true;
        self.register(Expr::Api, Some(Box::new(dsl)));
    }

    #[track_caller]
    pub fn title(&mut self, title: &str) {
        match self.current() {
            Expr::Api => self.design.api.title = Some(title.to_string()),
            _ => self.incompatible_dsl("Title"),
        }
    }

    #[track_caller]
    pub fn version(&mut self, version: &str) {
        match self.current() {
            Expr::Api => self.design.api.version = Some(version.to_string()),
            _ => self.incompatible_dsl("Version"),
        }
    }

    #[track_caller]
    pub fn terms_of_service(&mut self, terms: &str) {
        match self.current() {
            Expr::Api => self.design.api.terms_of_service = Some(terms.to_string()),
            _ => self.incompatible_dsl("TermsOfService"),
        }
    }

    #[track_caller]
    pub fn contact(&mut self, dsl: impl FnOnce(&mut Session)) {
        match self.current() {
            Expr::Api => {
                self.design.api.contact = Some(ContactExpr::default());
                self.execute(Expr::Contact, dsl);
            }
            _ => self.incompatible_dsl("Contact"),
        }
    }

    #[track_caller]
    pub fn license(&mut self, dsl: impl FnOnce(&mut Session)) {
        match self.current() {
            Expr::Api => {
                self.design.api.license = Some(LicenseExpr::default());
                self.execute(Expr::License, dsl);
            }
            _ => self.incompatible_dsl("License"),
        }
    }

    #[track_caller]
    pub fn docs(&mut self, dsl: impl FnOnce(&mut Session)) {
        match self.current() {
            Expr::Api => {
                self.design.api.docs = Some(DocsExpr::default());
                self.execute(Expr::Docs, dsl);
            }
            _ => self.incompatible_dsl("Docs"),
        }
    }

    #[track_caller]
    pub fn name(&mut self, name: &str) {
        let name = Some(name.to_string());
        match self.current() {
            Expr::Contact => {
                if let Some(contact) = self.design.api.contact.as_mut() {
                    contact.name = name;
                }
            }
            Expr::License => {
                if let Some(license) = self.design.api.license.as_mut() {
                    license.name = name;
                }
            }
            _ => self.incompatible_dsl("Name"),
        }
    }

    #[track_caller]
    pub fn email(&mut self, email: &str) {
        match self.current() {
            Expr::Contact => {
                if let Some(contact) = self.design.api.contact.as_mut() {
                    contact.email = Some(email.to_string());
                }
            }
            _ => self.incompatible_dsl("Email"),
        }
    }

    #[track_caller]
    pub fn url(&mut self, url: &str) {
        let url = Some(url.to_string());
        match self.current() {
            Expr::Contact => {
                if let Some(contact) = self.design.api.contact.as_mut() {
                    contact.url = url;
                }
            }
            Expr::License => {
                if let Some(license) = self.design.api.license.as_mut() {
                    license.url = url;
                }
            }
            Expr::Docs => {
                if let Some(docs) = self.design.api.docs.as_mut() {
                    docs.url = url;
                }
            }
            _ => self.incompatible_dsl("URL"),
        }
    }
}
