//! Semantic model — metadata, annotations, path caches and resolution.
//!
//! ## Data flow
//!
//! ```text
//! SchemaDef ──convert──▶ Metadata ─┐
//!                                  ├─▶ CacheBuilder ─▶ PathExpressions ─▶ PathResolver
//! AnnotationList[] ──group─────────┘
//! ```
//!
//! [`ServiceRegistry`] owns one immutable snapshot of all of this per
//! service and swaps it wholesale on rebuild.

mod annotations;
mod convert;
mod diagnostics;
mod error;
mod metadata;
mod path_cache;
mod resolve;
mod service;

pub use annotations::{
    Annotation, AnnotationList, AnnotationValue, AnnotationVisitor, PropertyValue, Record,
    group_annotation_lists, walk_collection, walk_record, walk_value,
};
pub use convert::{
    ActionDef, BindingDef, ComplexTypeDef, EntitySetDef, EntityTypeDef, NavigationPropertyDef, PropertyDef,
    SchemaDef, convert_schema,
};
pub use diagnostics::{
    Diagnostic, DiagnosticCollector, IssueKind, MetaPathChecker, MetaPathContext, Severity,
    check_annotation_target, check_meta_path, codes, has_allowed_annotation,
};
pub use error::{PathError, PathResult};
pub use metadata::{
    Action, ActionParameter, BindingTarget, ComplexType, ElementKind, EntitySet, EntityType, Metadata,
    MetadataElement, NavigationEdge, NavigationProperty, NavigationTargets, Property,
};
pub use path_cache::{
    ANY_TERM, CacheBuilder, CacheOptions, CaseMismatch, EdmType, PathExpressions, PathMap, PathNode, PathRef,
    PathValue, SELF_KEY, build_path_expressions,
};
pub use resolve::{
    CaseIssue, NextSegment, PathInfo, PathQuery, PathResolver, ResolveMode, ResolveOptions, SegmentPath,
    SegmentUsage,
};
pub use service::{ServiceDetails, ServiceRegistry};
