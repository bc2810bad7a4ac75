//! Diagnostics — path expression and annotation target issues.
//!
//! Checks run on attribute values that hold path expressions (`metaPath`)
//! or annotation targets (`contextPath`). Ranges are relative to the start
//! of the value; callers shift them into the document.

use std::sync::Arc;

use smol_str::SmolStr;

use crate::base::{SegmentRanges, TextRange, TextSize};

use super::annotations::AnnotationList;
use super::metadata::Metadata;
use super::path_cache::EdmType;
use super::resolve::{PathInfo, PathQuery, PathResolver};

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }
}

/// What went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueKind {
    PathDoesNotExist,
    /// The path exists, but not for a term the element accepts.
    InvalidAnnotationTerm,
    PropertyPathNotAllowed,
    AnnotationPathRequired,
    NameCaseMismatch,
    AnnotationTargetRequired,
    /// The target exists, but has no annotation the element accepts.
    InvalidAnnotationTarget,
    UnknownAnnotationTarget,
}

impl IssueKind {
    /// The diagnostic code for this kind.
    pub const fn code(&self) -> &'static str {
        match self {
            IssueKind::PathDoesNotExist => codes::PATH_DOES_NOT_EXIST,
            IssueKind::InvalidAnnotationTerm => codes::INVALID_ANNOTATION_TERM,
            IssueKind::PropertyPathNotAllowed => codes::PROPERTY_PATH_NOT_ALLOWED,
            IssueKind::AnnotationPathRequired => codes::ANNOTATION_PATH_REQUIRED,
            IssueKind::NameCaseMismatch => codes::NAME_CASE_MISMATCH,
            IssueKind::AnnotationTargetRequired => codes::ANNOTATION_TARGET_REQUIRED,
            IssueKind::InvalidAnnotationTarget => codes::INVALID_ANNOTATION_TARGET,
            IssueKind::UnknownAnnotationTarget => codes::UNKNOWN_ANNOTATION_TARGET,
        }
    }

    pub const fn severity(&self) -> Severity {
        match self {
            IssueKind::NameCaseMismatch => Severity::Hint,
            _ => Severity::Warning,
        }
    }
}

/// A diagnostic message with location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: IssueKind,
    /// Range inside the checked value.
    pub range: TextRange,
    pub severity: Severity,
    /// Diagnostic code (e.g., "E0001").
    pub code: Option<Arc<str>>,
    pub message: Arc<str>,
    /// Replacement text for `range` that fixes the issue.
    pub fix: Option<Arc<str>>,
}

impl Diagnostic {
    /// Create a diagnostic with the kind's default severity.
    pub fn new(kind: IssueKind, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            range,
            severity: kind.severity(),
            code: None,
            message: message.into(),
            fix: None,
        }
    }

    /// Set the diagnostic code.
    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the replacement that fixes the issue.
    pub fn with_fix(mut self, fix: impl Into<Arc<str>>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    /// Shift the ranges by `offset`, e.g. the position of the value.
    pub fn shifted(mut self, offset: TextSize) -> Self {
        self.range += offset;
        self
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Diagnostic codes for path expression issues.
pub mod codes {
    pub const PATH_DOES_NOT_EXIST: &str = "E0001";
    pub const INVALID_ANNOTATION_TERM: &str = "E0002";
    pub const PROPERTY_PATH_NOT_ALLOWED: &str = "E0003";
    pub const ANNOTATION_PATH_REQUIRED: &str = "E0004";
    pub const ANNOTATION_TARGET_REQUIRED: &str = "E0005";
    pub const INVALID_ANNOTATION_TARGET: &str = "E0006";
    pub const UNKNOWN_ANNOTATION_TARGET: &str = "E0007";

    /// Name differs from an existing one only in letter case.
    pub const NAME_CASE_MISMATCH: &str = "H0001";
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics while checking values.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add a diagnostic of `kind` with its standard code.
    pub fn report(&mut self, kind: IssueKind, range: TextRange, message: impl Into<Arc<str>>) {
        self.add(Diagnostic::new(kind, range, message).with_code(kind.code()));
    }

    /// Add a case mismatch hint that offers `correct` as fix.
    pub fn case_mismatch(&mut self, range: TextRange, wrong: &str, correct: &str) {
        self.add(
            Diagnostic::new(
                IssueKind::NameCaseMismatch,
                range,
                format!("'{wrong}' does not exist, did you mean '{correct}'?"),
            )
            .with_code(codes::NAME_CASE_MISMATCH)
            .with_fix(correct),
        );
    }

    /// Get all diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get diagnostics of one kind.
    pub fn diagnostics_of_kind(&self, kind: IssueKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }

    /// Get the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    /// Check if there is anything above hint level.
    pub fn has_problems(&self) -> bool {
        self.warning_count() > 0
    }

    /// Take all diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Clear all diagnostics.
    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

// ============================================================================
// META PATH CHECKER
// ============================================================================

/// What the element owning a `metaPath` accepts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaPathContext {
    /// Plain property paths are accepted besides annotation paths.
    pub allow_property_paths: bool,
    /// Navigation before the annotation segment is accepted. Off when an
    /// explicit context path pins the target.
    pub allow_navigation: bool,
    /// Terms the element accepts; empty accepts every term.
    pub allowed_terms: Vec<SmolStr>,
}

impl MetaPathContext {
    pub fn new() -> Self {
        Self {
            allow_navigation: true,
            ..Self::default()
        }
    }

    pub fn with_property_paths(mut self, allow: bool) -> Self {
        self.allow_property_paths = allow;
        self
    }

    pub fn with_navigation(mut self, allow: bool) -> Self {
        self.allow_navigation = allow;
        self
    }

    pub fn with_allowed_terms<T: Into<SmolStr>>(mut self, terms: impl IntoIterator<Item = T>) -> Self {
        self.allowed_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Query for annotation paths of the allowed terms.
    pub fn annotation_query(&self) -> PathQuery {
        if self.allowed_terms.is_empty() {
            PathQuery::any()
        } else {
            PathQuery::for_terms(self.allowed_terms.iter().cloned())
        }
    }
}

/// Checks `metaPath` values against a resolver anchored at the context.
pub struct MetaPathChecker<'r, 'a> {
    resolver: &'r PathResolver<'a>,
    context: MetaPathContext,
    collector: DiagnosticCollector,
}

impl<'r, 'a> MetaPathChecker<'r, 'a> {
    /// Create a new checker.
    pub fn new(resolver: &'r PathResolver<'a>, context: MetaPathContext) -> Self {
        Self {
            resolver,
            context,
            collector: DiagnosticCollector::new(),
        }
    }

    /// Check one value.
    pub fn check(&mut self, value: &str) {
        let whole = TextRange::up_to(TextSize::of(value));
        if value.is_empty() {
            self.collector
                .report(IssueKind::AnnotationPathRequired, whole, "Annotation path is required");
            return;
        }

        if !value.contains('@') {
            self.check_property_path(value, whole);
        } else {
            self.check_annotation_path(value, whole);
        }
    }

    fn check_property_path(&mut self, value: &str, whole: TextRange) {
        if !self.context.allow_property_paths {
            self.collector.report(
                IssueKind::PropertyPathNotAllowed,
                whole,
                "Property path not allowed. Use code completion to select annotation path",
            );
            return;
        }
        let query = PathQuery::for_kinds([EdmType::PrimitiveType, EdmType::ComplexType]);
        let info = self.resolver.check(value, &query);
        if !info.valid {
            self.report_missing(value, &info);
        }
    }

    fn check_annotation_path(&mut self, value: &str, whole: TextRange) {
        let ranges = path_segment_ranges(value);
        let term_index = value
            .trim_start_matches('/')
            .split('/')
            .position(|segment| segment.contains('@'))
            .unwrap_or(0);
        if term_index > 0 && !self.context.allow_navigation {
            let range = ranges.from_segment(0).unwrap_or(whole);
            self.collector.report(
                IssueKind::InvalidAnnotationTerm,
                range,
                "Navigation segments not allowed when contextPath is provided",
            );
            return;
        }

        let info = self.resolver.check(value, &self.context.annotation_query());
        if info.valid {
            return;
        }
        if self.context.allowed_terms.is_empty() {
            self.report_missing(value, &info);
            return;
        }

        let unrestricted = self.resolver.check(value, &PathQuery::any());
        if unrestricted.valid {
            let expected: Vec<&str> = self.context.allowed_terms.iter().map(SmolStr::as_str).collect();
            self.collector.report(
                IssueKind::InvalidAnnotationTerm,
                whole,
                format!("Invalid term: \"{value}\". Expected: {}", expected.join(", ")),
            );
        } else {
            self.report_missing(value, &unrestricted);
        }
    }

    fn report_missing(&mut self, value: &str, info: &PathInfo) {
        let ranges = path_segment_ranges(value);
        let whole = TextRange::up_to(TextSize::of(value));
        let range = info
            .invalid_segment_index
            .and_then(|index| ranges.from_segment(index))
            .unwrap_or(whole);
        let context = self.resolver.anchor().unwrap_or_default();
        self.collector.report(
            IssueKind::PathDoesNotExist,
            range,
            format!("Path does not exist: \"{context}/{value}\""),
        );

        if let Some(issue) = &info.case_issue {
            if let Some(range) = ranges.get(issue.segment_index) {
                self.collector.case_mismatch(range, &issue.wrong, &issue.correct);
            }
        }
    }

    /// Get the collected diagnostics.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.collector.diagnostics
    }
}

/// Segment ranges aligned with the resolver's user segment indices.
fn path_segment_ranges(value: &str) -> SegmentRanges {
    SegmentRanges::non_empty(value)
}

/// Check a `metaPath` value and return diagnostics.
pub fn check_meta_path(resolver: &PathResolver<'_>, context: MetaPathContext, value: &str) -> Vec<Diagnostic> {
    let mut checker = MetaPathChecker::new(resolver, context);
    checker.check(value);
    checker.finish()
}

// ============================================================================
// ANNOTATION TARGETS
// ============================================================================

/// Whether an annotation list holds an annotation with one of `terms`.
/// No terms accepts every non-empty list.
pub fn has_allowed_annotation(list: &AnnotationList, terms: &[SmolStr]) -> bool {
    list.annotations
        .iter()
        .any(|annotation| terms.is_empty() || terms.contains(&annotation.term))
}

/// Check a `contextPath` value naming an annotation target.
///
/// With `allow_property_paths`, every entity type is a valid target;
/// otherwise only targets carrying an annotation with one of
/// `allowed_terms`. Targets are compared through name resolution, so
/// `/Product`, `Ex.Product` and `com.example.Product` are the same target.
pub fn check_annotation_target(
    metadata: &Metadata,
    annotations: &[AnnotationList],
    allowed_terms: &[SmolStr],
    allow_property_paths: bool,
    value: &str,
) -> Vec<Diagnostic> {
    let schema = metadata.schema();
    let whole = TextRange::up_to(TextSize::of(value));
    let mut collector = DiagnosticCollector::new();

    let allowed: Vec<&str> = if allow_property_paths {
        metadata
            .entity_types()
            .iter()
            .map(|entity_type| entity_type.element.fqn.as_str())
            .collect()
    } else {
        annotations
            .iter()
            .filter(|list| has_allowed_annotation(list, allowed_terms))
            .map(|list| list.target.as_str())
            .collect()
    };

    if !value.is_empty() && allowed.iter().any(|target| schema.same_element(target, value)) {
        return Vec::new();
    }
    if value.is_empty() {
        collector.report(IssueKind::AnnotationTargetRequired, whole, "Annotation target is required");
        return collector.take();
    }

    let known = annotations
        .iter()
        .any(|list| schema.same_element(&list.target, value));
    if known {
        let message = if allowed.is_empty() {
            format!(
                "Invalid annotation target: {value}. There are no annotations in the project that are suitable for the current element"
            )
        } else {
            let mut expected: Vec<String> = Vec::new();
            for target in &allowed {
                let suggestion = format!("/{}", schema.resolve(target).name);
                if !expected.contains(&suggestion) {
                    expected.push(suggestion);
                }
            }
            format!("Invalid annotation target: {value}. Expected: {}", expected.join(", "))
        };
        collector.report(IssueKind::InvalidAnnotationTarget, whole, message);
    } else {
        collector.report(
            IssueKind::UnknownAnnotationTarget,
            whole,
            format!("Unknown annotation target: {value}"),
        );
    }
    collector.take()
}
