//! trellis-interchange: the serialized form of a finalized design.
//!
//! Provides typed structs for everything a renderer consumes (API info,
//! named types with their views, services and methods, security schemes
//! and conversion plans) plus JSON entry points [`from_json`] and
//! [`to_json`].
//!
//! The compiler core produces a [`Bundle`]; renderers depend only on this
//! crate and never on the evaluator's arena types.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_json, from_value, to_json, InterchangeError, BUNDLE_VERSION};
pub use types::*;
