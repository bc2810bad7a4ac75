//! Error types for the service boundary.
//!
//! Path resolution itself never fails: an invalid path is reported through
//! [`PathInfo`](super::PathInfo). These errors cover lookups that cannot
//! start at all and structural problems found in metadata.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised around path caches and resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// No service is registered under the given path.
    #[error("unknown service: {0}")]
    UnknownService(SmolStr),

    /// The anchor element of a relative path is not part of the metadata.
    #[error("unknown anchor element: {0}")]
    UnknownAnchor(SmolStr),

    /// A navigation property points to an entity type that does not exist.
    #[error("navigation property '{property}' of '{source_type}' targets unknown type '{target}'")]
    MissingNavigationTarget {
        source_type: SmolStr,
        property: SmolStr,
        target: SmolStr,
    },

    /// A property claims a structured type that is not defined.
    #[error("property '{property}' has unknown structured type '{type_name}'")]
    MissingStructuredType { property: SmolStr, type_name: SmolStr },

    /// An annotation target cannot be placed in the service namespace.
    #[error("annotation target cannot be resolved: {0}")]
    UnresolvableTarget(SmolStr),

    /// Two elements share one fully qualified name.
    #[error("duplicate element: {0}")]
    DuplicateElement(SmolStr),
}

impl PathError {
    /// Create a missing navigation target error.
    pub fn missing_navigation_target(
        source_type: impl Into<SmolStr>,
        property: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
    ) -> Self {
        Self::MissingNavigationTarget {
            source_type: source_type.into(),
            property: property.into(),
            target: target.into(),
        }
    }

    /// Create a missing structured type error.
    pub fn missing_structured_type(
        property: impl Into<SmolStr>,
        type_name: impl Into<SmolStr>,
    ) -> Self {
        Self::MissingStructuredType {
            property: property.into(),
            type_name: type_name.into(),
        }
    }
}

/// Result type for service-level operations.
pub type PathResult<T> = Result<T, PathError>;
