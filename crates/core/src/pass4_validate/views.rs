//! View validation.

use super::attributes::Checker;
use crate::expr::DEFAULT_VIEW;
use crate::types::{AttrId, DataType, TypeId};

pub(super) fn validate_views(checker: &mut Checker<'_>, id: TypeId, ctx: &str) {
    let design = checker.design;
    let t = design.user_type(id);
    let Some(info) = &t.result else {
        return;
    };
    let source = match info.collection_of {
        Some(elem) => design.user_type(elem).attr,
        None => t.attr,
    };
    for view in &info.views {
        let Some(fields) = design.object(view.attr) else {
            continue;
        };
        let view_ctx = format!("view \"{}\" of {}", view.name, ctx);
        for field in fields.iter() {
            if design.field(source, &field.name).is_none() {
                checker.report(format!("unknown attribute \"{}\"", field.name), &view_ctx);
            }
        }
    }
}

impl Checker<'_> {
    /// A pinned view must name a view of the attribute's result type.
    pub(super) fn check_view_meta(&mut self, attr: AttrId, ctx: &str) {
        let design = self.design;
        let Some(view) = design.attr(attr).meta_value(self.view_meta) else {
            return;
        };
        let target = match &design.attr(attr).type_ {
            Some(DataType::User(t)) => Some(*t),
            Some(DataType::Array(elem)) => match &design.attr(*elem).type_ {
                Some(DataType::User(t)) => Some(*t),
                _ => None,
            },
            _ => None,
        };
        let Some(result) = target.map(|t| design.user_type(t)).filter(|t| t.is_result()) else {
            self.report(
                format!("view \"{}\" is set on an attribute that is not a result type", view),
                ctx,
            );
            return;
        };
        if !self.defer_unknown_views && view != DEFAULT_VIEW && result.view(view).is_none() {
            self.report(
                format!("type \"{}\" does not define view \"{}\"", result.name, view),
                ctx,
            );
        }
    }
}
