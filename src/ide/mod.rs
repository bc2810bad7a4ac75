//! IDE features — High-level APIs for editor handlers.
//!
//! This module sits between the semantic model (HIR) and an editor
//! integration. Every function is pure: data in, data out, no protocol
//! types. Positions and ranges are left to the caller.
//!
//! ## Usage
//!
//! ```ignore
//! use metapath::hir::{PathQuery, ServiceRegistry};
//! use metapath::ide::complete_path_expressions;
//!
//! let details = registry.get("/srv/catalog/")?;
//! let resolver = details.resolver(Some("Ex.Product"), Default::default())?;
//! let items = complete_path_expressions(&resolver, "Supplier/", &PathQuery::any());
//! ```

mod completion;
mod targets;

pub use completion::{CompletionItem, CompletionKind, complete_path_expressions, meta_path_completions};
pub use targets::{
    BuildingBlock, annotation_path_suggestions, annotation_target_suggestions, annotations_for_target,
    building_block,
};
