// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema-driven node graph for nodeweave.
//!
//! This crate turns registered schemas into an editable workflow graph:
//! - Node instances expanded from models, with keyed multi-slots
//! - A graph store that keeps slot indices consistent on every edit
//! - A JSON workflow document codec with best-effort import
//! - Readiness tracking (local and chain completeness)
//! - Preview evaluation with pluggable executors
//!
//! ## Architecture
//!
//! [`Session`] is the entry point for hosts: it owns a [`SchemaRegistry`]
//! and a [`Graph`], refreshes readiness after each mutation and publishes
//! [`GraphEvent`]s to subscribers.

pub mod completeness;
pub mod connection;
pub mod document;
pub mod evaluation;
pub mod events;
pub mod graph;
pub mod node;
pub mod port;
pub mod registry;
pub mod session;

pub use completeness::Readiness;
pub use connection::{Link, LinkId};
pub use document::{Document, DocumentError, ExportOptions, ImportOptions, ImportReport};
pub use evaluation::{EvaluationContext, NodeExecutor, NodeOutput};
pub use events::GraphEvent;
pub use graph::{ConnectError, CycleError, Graph, SlotEditError};
pub use node::{NodeId, NodeInstance};
pub use port::{InputSlot, NativeInput, NativeKind, OutputSlot, SlotDirection, SlotMeta};
pub use registry::{RegistryOptions, SchemaRegistry};
pub use session::Session;
