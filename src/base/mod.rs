//! Foundation types for metadata path handling.
//!
//! This module provides the primitives used by the rest of the crate:
//! - [`SchemaNamespace`], [`ResolvedName`] - Element name resolution
//! - [`TextRange`], [`TextSize`], [`SegmentRanges`] - Positions of path segments
//!
//! This module has NO dependencies on other metapath modules.

mod name;
mod span;

pub use name::{ResolvedName, SchemaNamespace, namespace_of, resolve_element_name, strip_signature};
pub use span::{SegmentRanges, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
