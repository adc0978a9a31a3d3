//! JSON encoding and decoding of [`Bundle`]s.
//!
//! The main entry points are [`from_json`] and [`to_json`]. [`from_value`]
//! accepts an already parsed `serde_json::Value`.

use crate::types::*;

/// Current bundle format version.
pub const BUNDLE_VERSION: &str = "1.0.0";

/// Errors during bundle (de)serialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterchangeError {
    /// The input is not valid JSON or does not match the bundle schema.
    #[error("malformed bundle: {0}")]
    Malformed(String),
    /// The bundle declares a format version this crate does not read.
    #[error("unsupported bundle version '{found}' (expected {})", BUNDLE_VERSION)]
    UnsupportedVersion { found: String },
    /// The bundle could not be encoded.
    #[error("cannot encode bundle: {0}")]
    Encode(String),
}

/// Decode a bundle from a parsed JSON value.
///
/// Only the major version is checked: minor additions are optional fields.
pub fn from_value(value: serde_json::Value) -> Result<Bundle, InterchangeError> {
    let bundle: Bundle =
        serde_json::from_value(value).map_err(|e| InterchangeError::Malformed(e.to_string()))?;
    if major(&bundle.version) != major(BUNDLE_VERSION) {
        return Err(InterchangeError::UnsupportedVersion {
            found: bundle.version,
        });
    }
    Ok(bundle)
}

/// Decode a bundle from JSON text.
pub fn from_json(text: &str) -> Result<Bundle, InterchangeError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| InterchangeError::Malformed(e.to_string()))?;
    from_value(value)
}

/// Encode a bundle as pretty-printed JSON text.
pub fn to_json(bundle: &Bundle) -> Result<String, InterchangeError> {
    serde_json::to_string_pretty(bundle).map_err(|e| InterchangeError::Encode(e.to_string()))
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "version": BUNDLE_VERSION,
            "api": { "name": "calc" },
            "types": [],
            "services": []
        })
    }

    #[test]
    fn decodes_minimal_bundle() {
        let bundle = from_value(minimal()).unwrap();
        assert_eq!(bundle.api.name, "calc");
        assert!(bundle.types.is_empty());
        assert!(bundle.conversions.is_empty());
    }

    #[test]
    fn rejects_other_major_version() {
        let mut value = minimal();
        value["version"] = json!("2.0.0");
        let err = from_value(value).unwrap_err();
        assert_eq!(
            err,
            InterchangeError::UnsupportedVersion {
                found: "2.0.0".to_string()
            }
        );
    }

    #[test]
    fn accepts_minor_version_bump() {
        let mut value = minimal();
        value["version"] = json!("1.4.0");
        assert!(from_value(value).is_ok());
    }

    #[test]
    fn malformed_text_is_reported() {
        let err = from_json("{ not json").unwrap_err();
        assert!(matches!(err, InterchangeError::Malformed(_)));
        assert!(err.to_string().starts_with("malformed bundle:"));
    }

    #[test]
    fn type_refs_use_kind_tags() {
        let value = json!({
            "version": BUNDLE_VERSION,
            "api": { "name": "calc" },
            "types": [{
                "name": "Pair",
                "origin": "declared",
                "type": { "kind": "object", "fields": [
                    { "name": "left", "type": { "kind": "primitive", "name": "int" }, "required": true },
                    { "name": "tags", "type": { "kind": "array", "elem": { "kind": "primitive", "name": "string" } } }
                ]},
                "required": ["left"]
            }],
            "services": []
        });
        let bundle = from_value(value).unwrap();
        let pair = bundle.find_type("Pair").unwrap();
        assert_eq!(pair.fields().len(), 2);
        assert!(pair.fields()[0].required);
        assert!(!pair.fields()[1].required);
        assert!(matches!(pair.fields()[1].type_ref, TypeRef::Array { .. }));
    }

    #[test]
    fn api_errors_are_compared_by_value() {
        let mut value = minimal();
        value["api"]["errors"] = json!([{
            "name": "not_found",
            "type": { "kind": "named", "name": "Error" },
            "temporary": true
        }]);
        let bundle = from_value(value).unwrap();
        assert!(bundle.api.errors[0].temporary);
        assert_eq!(from_json(&to_json(&bundle).unwrap()).unwrap().api, bundle.api);
    }

    #[test]
    fn projections_and_helpers_survive_encoding() {
        let mut bundle = from_value(minimal()).unwrap();
        bundle.projections.push(TypeDecl {
            name: "BottleTiny".to_string(),
            origin: TypeOrigin::Projected,
            description: None,
            type_ref: TypeRef::Object { fields: Vec::new() },
            required: Vec::new(),
            identifier: Some("application/vnd.bottle; view=tiny".to_string()),
            views: Vec::new(),
        });
        bundle.conversions.push(ConversionDecl {
            direction: ConversionDirection::CreateFrom,
            type_name: "Shelf".to_string(),
            external: "ShelfModel".to_string(),
            function: "CreateFromShelfModel".to_string(),
            fields: vec![FieldConversionDecl {
                source: "Slots".to_string(),
                target: "slots".to_string(),
                op: "recurse".to_string(),
                helper: Some("transformSlotsArray".to_string()),
            }],
            helpers: vec![HelperDecl {
                name: "transformSlotsArray".to_string(),
                kind: HelperKind::Array,
                source: "[]int".to_string(),
                target: "array<int>".to_string(),
                fields: Vec::new(),
            }],
        });

        let text = to_json(&bundle).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["conversions"][0]["direction"], json!("create_from"));
        assert_eq!(value["conversions"][0]["helpers"][0]["kind"], json!("array"));
        assert_eq!(value["projections"][0]["origin"], json!("projected"));
        assert!(value.get("schemes").is_none());

        assert_eq!(from_json(&text).unwrap(), bundle);
    }
}
