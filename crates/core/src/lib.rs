//! trellis-core: design evaluator, resolver and transformation engine.
//!
//! Host code describes an API by calling DSL methods on a [`Session`].
//! Declarations are deferred and executed to a fixed point, then a fixed
//! sequence of finalize passes completes the design and the result is
//! flattened into a `trellis_interchange::Bundle`.
//!
//! # Pipeline
//!
//! 1. [`pass1_execute`] -- run deferred declarations until none are left
//! 2. [`pass2_prepare`] -- fill collections, method defaults and security
//! 3. [`pass3_inherit`] -- apply references and bases
//! 4. [`pass4_validate`] -- structural checks, every error batched
//! 5. [`pass5_views`] -- default views and view projections
//! 6. [`pass6_transform`] -- compatibility, external types, conversion plans
//! 7. [`pass7_serialize`] -- interchange bundle
//!
//! [`compile()`] runs everything for a host closure.
//!
//! # Example
//!
//! ```
//! use trellis_core::{compile, CompileConfig, Primitive};
//!
//! let bundle = compile(CompileConfig::default(), |s| {
//!     s.api("calc", |s| s.title("Calculator"));
//!     s.type_("Pair", |s| {
//!         s.attribute("left", Primitive::Int);
//!         s.attribute("right", Primitive::Int);
//!         s.required(&["left", "right"]);
//!     });
//! })
//! .unwrap();
//! assert_eq!(bundle.find_type("Pair").unwrap().required, vec!["left", "right"]);
//! ```

pub mod attribute;
pub mod compile;
pub mod config;
pub mod dsl;
pub mod error;
pub mod expr;
pub mod names;
pub mod pass1_execute;
pub mod pass2_prepare;
pub mod pass3_inherit;
pub mod pass4_validate;
pub mod pass5_views;
pub mod pass6_transform;
pub mod pass7_serialize;
pub mod session;
pub mod shape;
pub mod types;

// ── Convenience re-exports: key types ────────────────────────────────

pub use attribute::{AttributeExpr, Format, Validation};
pub use config::{CompileConfig, EvalSettings, TransformSettings};
pub use dsl::{array_of, collection_of, map_of, TypeSpec};
pub use error::{CompileError, EvalError, TransformError};
pub use expr::{Direction, Expr, TypeKind, DEFAULT_VIEW};
pub use pass6_transform::{Conversion, ConversionPlan, FieldConversion, Helper, HelperBody};
pub use session::{Design, DslFn, Session};
pub use shape::{Record, Shape, ShapeField, ShapeKind};
pub use types::{AttrId, DataType, Object, Primitive, TypeId};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use compile::compile;
pub use names::{uniquify, Uniquifier};
pub use pass6_transform::compatible;
