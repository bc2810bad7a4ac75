//! # metapath-base
//!
//! Path caches and path-expression resolution for OData service metadata.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide     → Completion items, annotation lookup, target suggestions
//!   ↓
//! hir     → Metadata, annotations, path caches, resolver, diagnostics
//!   ↓
//! base    → Primitives (name resolution, segment ranges)
//! ```

/// Foundation types: name resolution, text ranges
pub mod base;

/// Semantic model: metadata, path caches and resolution
pub mod hir;

/// IDE features: completion and annotation target handling
pub mod ide;

// Re-export commonly needed items
pub use base::{ResolvedName, SchemaNamespace, TextRange, TextSize};
pub use hir::{
    Metadata, PathError, PathExpressions, PathInfo, PathQuery, PathResolver, PathResult, ServiceRegistry,
};
