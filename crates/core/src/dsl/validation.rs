use serde_json::Value;

use crate::attribute::{Format, Validation};
use crate::session::Session;
use crate::types::{AttrId, DataType, Primitive};

#[derive(Clone, Copy)]
enum Rule {
    Numeric,
    Length,
    Any,
}

impl Session {
    /// Validation target of the current context, checked against the kind
    /// of rule when the attribute type is already known.
    #[track_caller]
    fn validation_target(&mut self, construct: &str, rule: Rule) -> Option<AttrId> {
        let Some(attr) = self.target_attr() else {
            self.incompatible_dsl(construct);
            return None;
        };
        let fits = match (rule, self.design.resolved_type(attr)) {
            (Rule::Any, _) | (_, None) => true,
            (Rule::Numeric, Some(DataType::Primitive(p))) => p.is_numeric(),
            (Rule::Numeric, Some(_)) => false,
            (Rule::Length, Some(DataType::Primitive(p))) => {
                matches!(p, Primitive::String | Primitive::Bytes)
            }
            (Rule::Length, Some(DataType::Array(_) | DataType::Map { .. })) => true,
            (Rule::Length, Some(_)) => false,
        };
        if !fits {
            let type_name = self.design.attr_type_name(attr);
            self.report_error(format!(
                "invalid validation {} for attribute of type {}",
                construct, type_name
            ));
            return None;
        }
        Some(attr)
    }

    #[track_caller]
    fn with_validation(&mut self, construct: &str, rule: Rule, f: impl FnOnce(&mut Validation)) {
        if let Some(attr) = self.validation_target(construct, rule) {
            f(self.design.attr_mut(attr).validation_mut());
        }
    }

    /// Restrict the value to one of `values`.
    #[track_caller]
    pub fn enum_values(&mut self, values: &[Value]) {
        self.with_validation("Enum", Rule::Any, |v| v.values = values.to_vec());
    }

    #[track_caller]
    pub fn format(&mut self, format: Format) {
        self.with_validation("Format", Rule::Any, |v| v.format = Some(format));
    }

    #[track_caller]
    pub fn pattern(&mut self, pattern: &str) {
        self.with_validation("Pattern", Rule::Any, |v| v.pattern = Some(pattern.to_string()));
    }

    #[track_caller]
    pub fn minimum(&mut self, min: f64) {
        self.with_validation("Minimum", Rule::Numeric, |v| v.minimum = Some(min));
    }

    #[track_caller]
    pub fn maximum(&mut self, max: f64) {
        self.with_validation("Maximum", Rule::Numeric, |v| v.maximum = Some(max));
    }

    #[track_caller]
    pub fn exclusive_minimum(&mut self, min: f64) {
        self.with_validation("ExclusiveMinimum", Rule::Numeric, |v| {
            v.exclusive_minimum = Some(min)
        });
    }

    #[track_caller]
    pub fn exclusive_maximum(&mut self, max: f64) {
        self.with_validation("ExclusiveMaximum", Rule::Numeric, |v| {
            v.exclusive_maximum = Some(max)
        });
    }

    #[track_caller]
    pub fn min_length(&mut self, len: usize) {
        self.with_validation("MinLength", Rule::Length, |v| v.min_length = Some(len));
    }

    #[track_caller]
    pub fn max_length(&mut self, len: usize) {
        self.with_validation("MaxLength", Rule::Length, |v| v.max_length = Some(len));
    }

    /// Mark child attributes as required. Names are checked at finalize.
    #[track_caller]
    pub fn required(&mut self, names: &[&str]) {
        self.with_validation("Required", Rule::Any, |v| v.add_required(names));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeExpr;
    use crate::expr::Expr;

    fn attr_of(session: &mut Session, p: Primitive) -> AttrId {
        session
            .design
            .new_attr(AttributeExpr::typed(DataType::Primitive(p)))
    }

    #[test]
    fn numeric_rules_on_numbers() {
        let mut session = Session::default();
        let attr = attr_of(&mut session, Primitive::Int);
        session.execute(Expr::Attribute(attr), |s| {
            s.minimum(1.0);
            s.maximum(5.0);
        });
        let v = session.design().attr(attr).validation.clone().unwrap();
        assert_eq!((v.minimum, v.maximum), (Some(1.0), Some(5.0)));
        assert!(session.errors().is_empty());
    }

    #[test]
    fn length_rule_on_number_is_rejected() {
        let mut session = Session::default();
        let attr = attr_of(&mut session, Primitive::Float64);
        session.execute(Expr::Attribute(attr), |s| s.max_length(3));
        assert_eq!(session.errors().len(), 1);
        assert!(session.errors()[0]
            .message
            .starts_with("invalid validation MaxLength for attribute of type float64"));
        assert!(session.design().attr(attr).validation.is_none());
    }

    #[test]
    fn required_deduplicates() {
        let mut session = Session::default();
        let attr = session.design.new_attr(AttributeExpr::default());
        session.execute(Expr::Attribute(attr), |s| {
            s.required(&["a", "b"]);
            s.required(&["b", "c"]);
        });
        assert_eq!(session.design().attr(attr).required(), vec!["a", "b", "c"]);
    }

    #[test]
    fn validation_outside_attribute_is_incompatible() {
        let mut session = Session::default();
        session.pattern("^a");
        assert_eq!(session.errors()[0].message, "invalid use of Pattern (top level)");
    }
}
