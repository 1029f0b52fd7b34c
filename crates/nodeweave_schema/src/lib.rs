// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema language front end for nodeweave.
//!
//! This crate turns external node declarations into resolved models:
//! - Type expressions (`Optional`, `Union`, `List`, `Dict`, `Message`)
//! - A best-effort declaration scanner with single-parent inheritance
//! - Module-level constants and type aliases
//! - Link compatibility between producer and consumer types
//!
//! Nothing in this crate fails: malformed input degrades to fewer models
//! or to opaque values.

mod text;

pub mod compat;
pub mod model;
pub mod parser;
pub mod type_expr;

pub use compat::compatible;
pub use model::{DefaultValue, FieldDecl, Model, ModelInfo, Role, Schema, TYPE_TAG_FIELD};
pub use parser::parse_schema;
pub use type_expr::TypeExpr;
