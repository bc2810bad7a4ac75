//! Path resolution — checking and completing path expressions.
//!
//! Resolution walks a path segment by segment over the path caches of a
//! service. It keeps a list of *branches*: ways of reading the path so far.
//! A branch normally continues the anchor's FQN; when a segment is a
//! navigation property, a new branch starts at the navigation target type,
//! so `Supplier/Title` below `ns.Product` is read both as
//! `ns.Product/Supplier/Title` and as `ns.Supplier/Title`. Branches that
//! lead nowhere are dropped after each step.
//!
//! Two modes share the walk:
//!
//! - [`ResolveMode::Check`] asks whether the whole path denotes something.
//! - [`ResolveMode::Complete`] asks which segments may follow a prefix.
//!
//! Resolution never fails. An unknown segment is reported through
//! [`PathInfo::invalid_segment_index`], relative to the user-written path.

use std::collections::VecDeque;

use smol_str::SmolStr;
use tracing::trace;

use super::metadata::{Metadata, NavigationEdge};
use super::path_cache::{CaseMismatch, EdmType, PathExpressions, PathMap, PathNode, PathValue};

// ============================================================================
// QUERY & OPTIONS
// ============================================================================

/// Whether a path is checked as a whole or completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolveMode {
    Check,
    Complete,
}

/// What a path must lead to.
///
/// With kinds, the type cache partitions of those kinds are consulted; with
/// terms (and no kinds), the annotation partitions of those terms; with
/// neither, all targets and all annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathQuery {
    kinds: Vec<EdmType>,
    terms: Vec<SmolStr>,
    collection_target: bool,
}

impl PathQuery {
    /// No restriction.
    pub fn any() -> Self {
        Self::default()
    }

    /// Paths ending on elements of the given kinds.
    pub fn for_kinds(kinds: impl IntoIterator<Item = EdmType>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Paths ending on annotations (or annotation values) of the given terms.
    pub fn for_terms<T: Into<SmolStr>>(terms: impl IntoIterator<Item = T>) -> Self {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// The requested type is itself a collection, so to-many navigation is
    /// allowed anywhere in the path.
    pub fn with_collection_target(mut self, collection_target: bool) -> Self {
        self.collection_target = collection_target;
        self
    }

    pub fn kinds(&self) -> &[EdmType] {
        &self.kinds
    }

    pub fn terms(&self) -> &[SmolStr] {
        &self.terms
    }

    /// Whether the query has no restriction.
    pub fn is_unrestricted(&self) -> bool {
        self.kinds.is_empty() && self.terms.is_empty()
    }

    /// Whether the path ends on an entity or navigation.
    pub fn is_navigation_path(&self) -> bool {
        self.kinds.iter().any(EdmType::is_navigation)
    }

    /// Whether to-many navigation may appear mid-path.
    ///
    /// Property-style ("instance") paths must stay single-valued; navigation
    /// paths, annotation paths and unrestricted paths may not.
    pub fn allows_collections(&self) -> bool {
        self.is_navigation_path() || self.kinds.is_empty() || self.collection_target
    }
}

/// Options for path resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveOptions {
    /// How many navigation hops are searched for a reachable target.
    pub max_navigation_depth: usize,
    /// Report segments that only match with different letter case.
    pub case_hints: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_navigation_depth: 3,
            case_hints: true,
        }
    }
}

impl ResolveOptions {
    pub fn with_max_navigation_depth(mut self, depth: usize) -> Self {
        self.max_navigation_depth = depth;
        self
    }

    pub fn with_case_hints(mut self, case_hints: bool) -> Self {
        self.case_hints = case_hints;
        self
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// How a next segment may be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentUsage {
    /// Valid end of the path; cannot be continued.
    Last,
    /// Must be continued.
    Intermediate,
    /// May end the path or be continued.
    LastOrIntermediate,
}

impl SegmentUsage {
    #[inline]
    pub const fn can_end(&self) -> bool {
        !matches!(self, SegmentUsage::Intermediate)
    }

    #[inline]
    pub const fn can_continue(&self) -> bool {
        !matches!(self, SegmentUsage::Last)
    }
}

/// A segment that may follow the resolved path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextSegment {
    pub name: SmolStr,
    /// Element or type the segment denotes, when known.
    pub target: Option<SmolStr>,
    pub usage: SegmentUsage,
}

/// A segment that only matched with different letter case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseIssue {
    /// Index in the user-written path.
    pub segment_index: usize,
    pub wrong: SmolStr,
    pub correct: SmolStr,
}

/// Outcome of checking or completing a path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathInfo {
    /// Self value of the resolved path.
    pub value: Option<PathValue>,
    /// Segments that may follow, in cache order.
    pub next_segments: Vec<NextSegment>,
    /// Completion: the prefix resolved. Check: the path denotes something.
    pub valid: bool,
    /// First segment (of the user-written path) that leads nowhere.
    pub invalid_segment_index: Option<usize>,
    pub case_issue: Option<CaseIssue>,
    /// A to-many navigation was followed.
    pub is_collection: bool,
    /// Completion: the unfinished last segment.
    pub partial: SmolStr,
    /// Number of user-written segments considered.
    pub segment_count: usize,
}

impl PathInfo {
    /// Number of leading segments that resolved.
    pub fn valid_up_to(&self) -> usize {
        self.invalid_segment_index.unwrap_or(self.segment_count)
    }

    /// Find a next segment by name.
    pub fn next_segment(&self, name: &str) -> Option<&NextSegment> {
        self.next_segments.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// SEGMENTS
// ============================================================================

/// A path split into the segments that are resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentPath {
    /// Absolute segments: anchor segments followed by the user's segments.
    pub segments: Vec<SmolStr>,
    /// How many leading segments come from the anchor.
    pub base_count: usize,
    /// Completion: the unfinished last segment, removed from `segments`.
    pub partial: SmolStr,
}

impl SegmentPath {
    /// Split `path`. A relative path is placed below `anchor`; in completion
    /// mode the last segment of a non-empty path is split off as `partial`.
    /// Empty segments are dropped, so `""` and `"/"` without anchor have no
    /// segments and list the cache root.
    pub fn parse(path: &str, anchor: Option<&str>, mode: ResolveMode) -> Self {
        let (absolute, base_count) = match anchor {
            Some(anchor) if !path.starts_with('/') => {
                let absolute = if path.is_empty() {
                    anchor.to_string()
                } else {
                    format!("{anchor}/{path}")
                };
                (absolute, anchor.split('/').count())
            }
            _ => (path.strip_prefix('/').unwrap_or(path).to_string(), 0),
        };

        let mut segments: Vec<SmolStr> = absolute.split('/').map(SmolStr::new).collect();
        let partial = if mode == ResolveMode::Complete && !path.is_empty() {
            segments.pop().unwrap_or_default()
        } else {
            SmolStr::default()
        };
        segments.retain(|segment| !segment.is_empty());

        Self {
            segments,
            base_count,
            partial,
        }
    }

    /// Number of user-written segments.
    pub fn user_segment_count(&self) -> usize {
        self.segments.len().saturating_sub(self.base_count)
    }
}

// ============================================================================
// CACHE LOOKUP
// ============================================================================

/// The cache partitions a query consults.
struct Lookup<'c> {
    roots: Vec<&'c PathMap>,
    restricted: bool,
    case_hints: bool,
}

/// What one lookup found.
#[derive(Default)]
struct Collected {
    found: bool,
    case: Option<CaseMismatch>,
}

impl<'c> Lookup<'c> {
    fn new(caches: &'c PathExpressions, query: &PathQuery, case_hints: bool) -> Self {
        let roots: Vec<&PathMap> = if !query.kinds().is_empty() {
            query
                .kinds()
                .iter()
                .filter_map(|&kind| caches.type_partition(kind))
                .collect()
        } else if !query.terms().is_empty() {
            query
                .terms()
                .iter()
                .filter_map(|term| caches.term_partition(term))
                .collect()
        } else {
            std::iter::once(caches.target_path())
                .chain(caches.any_term_partition())
                .collect()
        };
        Self {
            roots,
            restricted: !query.is_unrestricted(),
            case_hints,
        }
    }

    /// Accumulate what every partition has at `segments` into `acc`.
    ///
    /// With `existence_only`, stop at the first partition that contributes;
    /// with `whole_path` as well, only once a self value was found.
    fn collect<S: AsRef<str>>(&self, segments: &[S], existence_only: bool, whole_path: bool, acc: &mut PathMap) -> Collected {
        let mut collected = Collected::default();
        for root in &self.roots {
            match root.find(segments) {
                Some(node) => {
                    acc.accumulate(node);
                    collected.found = true;
                }
                None if self.case_hints => {
                    if let Some(mismatch) = root.find_case_mismatch(segments) {
                        collected.case = Some(mismatch);
                    }
                }
                None => {}
            }
            if existence_only {
                let done = if whole_path {
                    acc.self_value().is_some()
                } else {
                    acc.has_content()
                };
                if done {
                    break;
                }
            }
        }
        collected
    }

    /// The partitions' entries for a top-level key, merged.
    fn top_level(&self, key: &str) -> Option<PathNode> {
        let mut names = PathMap::new();
        let key = SmolStr::new(key);
        for root in &self.roots {
            if let Some(node) = root.get(&key) {
                names.merge_child(&key, node.clone());
            }
        }
        names.get(&key).cloned()
    }

    fn has_top_level(&self, key: &str) -> bool {
        self.roots.iter().any(|root| root.contains(key))
    }
}

/// Result of reading the last segment of a branch as navigation.
#[derive(Default)]
struct NavigationHop {
    target: Option<SmolStr>,
    is_collection: bool,
    /// Target of a to-many navigation that was not allowed here.
    blocked: Option<SmolStr>,
    case: Option<(SmolStr, SmolStr)>,
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves path expressions against one service.
///
/// ```ignore
/// let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.Product");
/// let info = resolver.check("Supplier/Title", &PathQuery::any());
/// assert!(info.valid);
/// ```
pub struct PathResolver<'a> {
    metadata: &'a Metadata,
    caches: &'a PathExpressions,
    anchor: Option<SmolStr>,
    options: ResolveOptions,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver without anchor; only absolute paths resolve.
    pub fn new(metadata: &'a Metadata, caches: &'a PathExpressions) -> Self {
        Self {
            metadata,
            caches,
            anchor: None,
            options: ResolveOptions::default(),
        }
    }

    /// Set the element relative paths start from, by FQN.
    pub fn with_anchor(mut self, anchor: impl Into<SmolStr>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn metadata(&self) -> &'a Metadata {
        self.metadata
    }

    /// Check whether `path` as a whole satisfies `query`.
    pub fn check(&self, path: &str, query: &PathQuery) -> PathInfo {
        let segments = SegmentPath::parse(path.trim(), self.anchor.as_deref(), ResolveMode::Check);
        self.path_info(&segments, query, ResolveMode::Check)
    }

    /// List the segments that may follow the completed part of `path`.
    pub fn complete(&self, path: &str, query: &PathQuery) -> PathInfo {
        let segments = SegmentPath::parse(path.trim(), self.anchor.as_deref(), ResolveMode::Complete);
        self.path_info(&segments, query, ResolveMode::Complete)
    }

    /// Resolve already split segments.
    pub fn path_info(&self, path: &SegmentPath, query: &PathQuery, mode: ResolveMode) -> PathInfo {
        let lookup = Lookup::new(self.caches, query, self.options.case_hints);
        let check = mode == ResolveMode::Check;
        let allow_collections = query.allows_collections();
        let segments = &path.segments;
        let base = path.base_count;

        let mut info = PathInfo {
            valid: true,
            partial: path.partial.clone(),
            segment_count: path.user_segment_count(),
            ..PathInfo::default()
        };
        let mut result = PathMap::new();
        let mut invalid: Option<usize> = None;

        if segments.is_empty() {
            lookup.collect::<SmolStr>(&[], check, check, &mut result);
        } else if !segments[0].contains('.') && !self.is_root_element(&segments[0]) {
            invalid = Some(0);
        } else {
            let mut branches: Vec<Vec<SmolStr>> = vec![Vec::new()];

            for (i, segment) in segments.iter().enumerate() {
                let is_last = i + 1 == segments.len();
                let existence_only = !is_last;
                result = PathMap::new();

                let mut queue: VecDeque<Vec<SmolStr>> = branches
                    .into_iter()
                    .map(|mut branch| {
                        branch.push(segment.clone());
                        branch
                    })
                    .collect();
                let mut survivors: Vec<Vec<SmolStr>> = Vec::new();
                let mut halted = false;

                while let Some(branch) = queue.pop_front() {
                    if halted {
                        survivors.push(branch);
                        continue;
                    }

                    let hop = self.navigation_hop(&branch, allow_collections || i < base);
                    if let Some(target) = &hop.target {
                        trace!("[RESOLVE] {} navigates to {target}", branch.join("/"));
                        queue.push_back(vec![target.clone()]);
                    }

                    if (is_last && check && result.self_value().is_some())
                        || (existence_only && result.has_content())
                    {
                        halted = true;
                        survivors.push(branch);
                        continue;
                    }

                    let collected = lookup.collect(&branch, existence_only, check, &mut result);
                    let mut found = collected.found;

                    let mut nav_added = false;
                    if !found || is_last {
                        nav_added = self.add_navigation_segments(
                            &branch.join("/"),
                            &lookup,
                            allow_collections || i + 1 < base,
                            &mut result,
                        );
                    }

                    if is_last && check {
                        if let Some(blocked) = &hop.blocked {
                            if lookup.has_top_level(blocked) {
                                result.set_self_value(PathValue::Target(blocked.clone()));
                                info.is_collection = true;
                                found = true;
                            }
                        }
                    }

                    if found || nav_added {
                        survivors.push(branch.clone());
                    }

                    if let Some(mismatch) = collected.case {
                        // The mismatch indexes the branch, whose last segment is segment `i`.
                        let path_index = i.saturating_sub(branch.len() - 1 - mismatch.index);
                        info.case_issue = Some(CaseIssue {
                            segment_index: path_index.saturating_sub(base),
                            wrong: branch.get(mismatch.index).cloned().unwrap_or_default(),
                            correct: mismatch.correct,
                        });
                    }
                    if let Some((wrong, correct)) = hop.case {
                        info.case_issue = Some(CaseIssue {
                            segment_index: i.saturating_sub(base),
                            wrong,
                            correct,
                        });
                    }
                    if hop.target.is_some() && hop.is_collection {
                        info.is_collection = true;
                    }
                }

                trace!(
                    "[RESOLVE] segment {i} '{segment}': {} branches, {} entries",
                    survivors.len(),
                    result.len()
                );
                if !result.has_content() {
                    invalid = Some(i);
                    break;
                }
                branches = survivors;
            }
        }

        match invalid {
            Some(index) => {
                info.valid = false;
                info.invalid_segment_index = Some(index.saturating_sub(base));
            }
            None => {
                info.value = result.self_value().cloned();
                if check {
                    info.valid = info.value.is_some();
                }
                info.next_segments = next_segments(&result);
            }
        }
        info
    }

    /// Whether an undotted first segment names an element of the service.
    fn is_root_element(&self, segment: &str) -> bool {
        self.metadata
            .resolve_name(segment)
            .fqn
            .is_some_and(|fqn| self.metadata.contains(&fqn))
    }

    /// Read the last segment of `branch` as navigation property of the
    /// element the other segments denote.
    fn navigation_hop(&self, branch: &[SmolStr], allow_collection: bool) -> NavigationHop {
        let mut hop = NavigationHop::default();
        let Some((name, source)) = branch.split_last() else {
            return hop;
        };
        let source = source.join("/");
        let Some(targets) = self.metadata.navigation_targets(&source) else {
            return hop;
        };

        for (target, properties) in targets {
            if let Some(edge) = properties.get(name) {
                hop.is_collection = edge.is_collection;
                if !edge.is_collection || allow_collection {
                    hop.target = Some(target.clone());
                } else {
                    hop.blocked = Some(target.clone());
                }
                return hop;
            }
            let similar = properties
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name));
            if let Some((correct, edge)) = similar {
                hop.is_collection = edge.is_collection;
                if self.options.case_hints && (!edge.is_collection || allow_collection) {
                    hop.case = Some((name.clone(), correct.clone()));
                }
            }
        }
        hop
    }

    /// Navigation edges from `source` as (target, property, edge), optionally
    /// without to-many ones.
    fn edges(&self, source: &str, allow_collection: bool) -> Vec<(&SmolStr, &SmolStr, &NavigationEdge)> {
        let Some(targets) = self.metadata.navigation_targets(source) else {
            return Vec::new();
        };
        targets
            .iter()
            .flat_map(|(target, properties)| properties.iter().map(move |(name, edge)| (target, name, edge)))
            .filter(|(_, _, edge)| allow_collection || !edge.is_collection)
            .collect()
    }

    /// Offer the navigation properties of `source` as next segments.
    ///
    /// Unrestricted queries offer every navigation property with the target
    /// type's entries below it. Restricted queries only offer navigation
    /// that leads to entries of the requested kinds or terms, directly or
    /// within `max_navigation_depth` further hops.
    fn add_navigation_segments(&self, source: &str, lookup: &Lookup<'_>, allow_collection: bool, acc: &mut PathMap) -> bool {
        let mut added = false;

        if !lookup.restricted {
            let Some(targets) = self.metadata.navigation_targets(source) else {
                return false;
            };
            for (target, properties) in targets {
                for name in properties.keys() {
                    let mut value = PathMap::new();
                    lookup.collect(std::slice::from_ref(target), false, false, &mut value);
                    acc.insert(name, Some(PathNode::Map(value)));
                    added = true;
                }
            }
            return added;
        }

        let mut seen_targets: Vec<&SmolStr> = Vec::new();
        for (target, _, _) in self.edges(source, allow_collection) {
            if seen_targets.contains(&target) || target.as_str() == source {
                continue;
            }
            seen_targets.push(target);

            let direct = lookup.top_level(target);
            let bridge = if direct.is_none() {
                let mut visited = vec![SmolStr::new(source), target.clone()];
                self.find_navigation_path(target, lookup, allow_collection, &mut visited, 0)
            } else {
                None
            };
            if direct.is_none() && bridge.is_none() {
                continue;
            }

            let names = self
                .edges(source, allow_collection)
                .into_iter()
                .filter(|(t, _, _)| *t == target)
                .map(|(_, name, _)| name);
            for name in names {
                match (&direct, &bridge) {
                    (Some(PathNode::Map(entries)), _) => {
                        if let Some(value) = entries.self_value() {
                            acc.insert_self(name, value.clone());
                        }
                        for (next, value) in entries.children() {
                            acc.insert(&format!("{name}/{next}"), Some(value.clone()));
                        }
                    }
                    (Some(PathNode::Leaf(value)), _) => {
                        acc.insert(name, Some(PathNode::Leaf(value.clone())));
                    }
                    (None, Some((chain, final_target))) => {
                        acc.insert(
                            &format!("{name}/{}", chain.join("/")),
                            Some(PathNode::target(final_target.clone())),
                        );
                    }
                    (None, None) => continue,
                }
                added = true;
            }
        }

        // To-many navigation that may not be continued can still end the path.
        if !allow_collection {
            for (target, name, edge) in self.edges(source, true) {
                if edge.is_collection && target.as_str() != source && lookup.has_top_level(target) {
                    acc.insert(name, Some(PathNode::target(target.clone())));
                    added = true;
                }
            }
        }

        added
    }

    /// Depth-first search for a navigation chain of at most
    /// `max_navigation_depth` hops from `from` to a type with entries in
    /// `lookup`. Returns the property names and the final type.
    fn find_navigation_path(
        &self,
        from: &str,
        lookup: &Lookup<'_>,
        allow_collection: bool,
        visited: &mut Vec<SmolStr>,
        depth: usize,
    ) -> Option<(Vec<SmolStr>, SmolStr)> {
        if depth >= self.options.max_navigation_depth {
            return None;
        }
        for (target, name, _) in self.edges(from, allow_collection) {
            if visited.contains(target) {
                continue;
            }
            if lookup.has_top_level(target) {
                return Some((vec![name.clone()], target.clone()));
            }
            visited.push(target.clone());
            let found = self.find_navigation_path(target, lookup, allow_collection, visited, depth + 1);
            visited.pop();
            if let Some((mut chain, final_target)) = found {
                chain.insert(0, name.clone());
                return Some((chain, final_target));
            }
        }
        None
    }
}

/// Classify the children of an accumulated result.
fn next_segments(result: &PathMap) -> Vec<NextSegment> {
    result
        .children()
        .map(|(name, node)| {
            let has_children = node.as_map().is_some_and(|map| !map.is_empty());
            let usage = match (node.self_value().is_some(), has_children) {
                (_, false) => SegmentUsage::Last,
                (false, true) => SegmentUsage::Intermediate,
                (true, true) => SegmentUsage::LastOrIntermediate,
            };
            NextSegment {
                name: name.clone(),
                target: node.self_value().and_then(PathValue::target).map(SmolStr::new),
                usage,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::annotations::{Annotation, AnnotationList};
    use crate::hir::convert::{EntityTypeDef, SchemaDef};
    use crate::hir::path_cache::build_path_expressions;

    fn make_service() -> (Metadata, PathExpressions) {
        let metadata = SchemaDef::new("ns")
            .with_entity_type(
                EntityTypeDef::new("A")
                    .with_property("Name", "Edm.String")
                    .with_navigation("toB", "B", false)
                    .with_navigation("toManyC", "C", true),
            )
            .with_entity_type(
                EntityTypeDef::new("B")
                    .with_property("Title", "Edm.String")
                    .with_navigation("toA", "A", false),
            )
            .with_entity_type(EntityTypeDef::new("C").with_property("Code", "Edm.String"))
            .into_metadata();
        let annotations = vec![AnnotationList::new("ns.B").with(Annotation::new("UI.HeaderInfo"))];
        let caches = build_path_expressions(&metadata, &annotations);
        (metadata, caches)
    }

    #[test]
    fn test_segment_path_relative() {
        let path = SegmentPath::parse("toB/Ti", Some("ns.A"), ResolveMode::Complete);
        assert_eq!(path.segments, vec!["ns.A", "toB"]);
        assert_eq!(path.partial, "Ti");
        assert_eq!(path.base_count, 1);
        assert_eq!(path.user_segment_count(), 1);
    }

    #[test]
    fn test_segment_path_absolute_and_empty() {
        let path = SegmentPath::parse("/ns.A/Name", Some("ns.B"), ResolveMode::Check);
        assert_eq!(path.segments, vec!["ns.A", "Name"]);
        assert_eq!(path.base_count, 0);

        let path = SegmentPath::parse("", Some("ns.EntityContainer/As"), ResolveMode::Complete);
        assert_eq!(path.segments, vec!["ns.EntityContainer", "As"]);
        assert_eq!(path.base_count, 2);
        assert_eq!(path.partial, "");
    }

    #[test]
    fn test_query_collections() {
        assert!(PathQuery::any().allows_collections());
        assert!(PathQuery::for_terms(["UI.LineItem"]).allows_collections());
        assert!(PathQuery::for_kinds([EdmType::EntityType]).allows_collections());
        assert!(!PathQuery::for_kinds([EdmType::PrimitiveType]).allows_collections());
        assert!(
            PathQuery::for_kinds([EdmType::PrimitiveType])
                .with_collection_target(true)
                .allows_collections()
        );
    }

    #[test]
    fn test_complete_unrestricted() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let info = resolver.complete("", &PathQuery::any());

        assert!(info.valid);
        assert_eq!(info.next_segment("Name").map(|s| s.usage), Some(SegmentUsage::Last));
        let to_b = info.next_segment("toB").unwrap();
        assert_eq!(to_b.usage, SegmentUsage::LastOrIntermediate);
        assert_eq!(to_b.target.as_deref(), Some("ns.B"));
        assert!(info.next_segment("toManyC").is_some());
    }

    #[test]
    fn test_check_across_navigation() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");

        let info = resolver.check("toB/Title", &PathQuery::any());
        assert!(info.valid);
        assert_eq!(info.value, Some(PathValue::Target("ns.B/Title".into())));

        let info = resolver.check("toB/Nope", &PathQuery::any());
        assert!(!info.valid);
        assert_eq!(info.invalid_segment_index, Some(1));
        assert_eq!(info.valid_up_to(), 1);
    }

    #[test]
    fn test_check_annotation_through_navigation() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        assert!(resolver.check("toB/@UI.HeaderInfo", &PathQuery::any()).valid);
        assert!(
            resolver
                .check("toB/@UI.HeaderInfo", &PathQuery::for_terms(["UI.HeaderInfo"]))
                .valid
        );
        assert!(
            !resolver
                .check("toB/@UI.HeaderInfo", &PathQuery::for_terms(["UI.LineItem"]))
                .valid
        );
    }

    #[test]
    fn test_first_segment_must_be_known() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches);
        let info = resolver.check("/Bogus/Name", &PathQuery::any());
        assert_eq!(info.invalid_segment_index, Some(0));
        assert!(!info.valid);
    }

    #[test]
    fn test_property_path_completion_bridges_navigation() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let query = PathQuery::for_kinds([EdmType::PrimitiveType]);

        let info = resolver.complete("toB/", &query);
        assert!(info.valid);
        assert_eq!(info.next_segment("Title").map(|s| s.usage), Some(SegmentUsage::Last));
    }

    #[test]
    fn test_collection_navigation_only_as_last_segment() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let query = PathQuery::for_kinds([EdmType::PrimitiveType]);

        let info = resolver.complete("", &query);
        let many = info.next_segment("toManyC").unwrap();
        assert_eq!(many.usage, SegmentUsage::Last);
        assert_eq!(info.next_segment("toB").map(|s| s.usage), Some(SegmentUsage::Intermediate));

        let continued = resolver.complete("toManyC/", &query);
        assert!(!continued.valid);
        assert_eq!(continued.invalid_segment_index, Some(0));

        let checked = resolver.check("toManyC", &query);
        assert!(checked.valid);
        assert!(checked.is_collection);
    }

    #[test]
    fn test_navigation_case_issue() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let info = resolver.check("tob/Title", &PathQuery::any());
        assert!(!info.valid);
        let issue = info.case_issue.unwrap();
        assert_eq!(issue.wrong, "tob");
        assert_eq!(issue.correct, "toB");
        assert_eq!(issue.segment_index, 0);
    }

    #[test]
    fn test_property_case_issue() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let info = resolver.check("name", &PathQuery::any());
        assert!(!info.valid);
        let issue = info.case_issue.unwrap();
        assert_eq!((issue.wrong.as_str(), issue.correct.as_str()), ("name", "Name"));

        let quiet = PathResolver::new(&metadata, &caches)
            .with_anchor("ns.A")
            .with_options(ResolveOptions::default().with_case_hints(false));
        assert!(quiet.check("name", &PathQuery::any()).case_issue.is_none());
    }

    #[test]
    fn test_case_issue_on_navigation_branch() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let info = resolver.check("toB/title", &PathQuery::any());
        assert!(!info.valid);
        assert_eq!(info.invalid_segment_index, Some(1));
        assert_eq!(
            info.case_issue,
            Some(CaseIssue {
                segment_index: 1,
                wrong: "title".into(),
                correct: "Title".into(),
            })
        );
    }

    #[test]
    fn test_segment_path_drops_empty_segments() {
        let path = SegmentPath::parse("", None, ResolveMode::Check);
        assert!(path.segments.is_empty());
        let path = SegmentPath::parse("/", None, ResolveMode::Complete);
        assert!(path.segments.is_empty());
        assert_eq!(path.partial, "");
        let path = SegmentPath::parse("toB/", Some("ns.A"), ResolveMode::Complete);
        assert_eq!(path.segments, vec!["ns.A", "toB"]);
    }

    #[test]
    fn test_empty_path_without_anchor_lists_root() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches);
        let query = PathQuery::for_kinds([EdmType::EntityType]);

        for path in ["", "/"] {
            let info = resolver.complete(path, &query);
            assert!(info.valid, "{path:?}");
            assert_eq!(info.invalid_segment_index, None);
            let names: Vec<&str> = info.next_segments.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["ns.A", "ns.B", "ns.C"]);
        }

        let info = resolver.check("", &query);
        assert_eq!(info.invalid_segment_index, None);
        assert_eq!(info.segment_count, 0);
        assert!(info.next_segment("ns.A").is_some());
    }

    /// `A -toC-> C -toManyD(*)-> D` with `UI.LineItem` on `D`.
    fn make_to_many_service() -> (Metadata, PathExpressions) {
        let metadata = SchemaDef::new("ns")
            .with_entity_type(EntityTypeDef::new("A").with_navigation("toC", "C", false))
            .with_entity_type(EntityTypeDef::new("C").with_navigation("toManyD", "D", true))
            .with_entity_type(EntityTypeDef::new("D").with_property("Value", "Edm.String"))
            .into_metadata();
        let annotations = vec![AnnotationList::new("ns.D").with(Annotation::new("UI.LineItem"))];
        let caches = build_path_expressions(&metadata, &annotations);
        (metadata, caches)
    }

    #[test]
    fn test_bridge_crosses_to_many_when_collections_allowed() {
        let (metadata, caches) = make_to_many_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let query = PathQuery::for_terms(["UI.LineItem"]);

        let info = resolver.complete("", &query);
        assert_eq!(info.next_segment("toC").map(|s| s.usage), Some(SegmentUsage::Intermediate));

        let info = resolver.check("toC/toManyD/@UI.LineItem", &query);
        assert!(info.valid);
        assert!(info.is_collection);
    }

    #[test]
    fn test_bridge_skips_to_many_for_instance_paths() {
        let (metadata, caches) = make_to_many_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.A");
        let query = PathQuery::for_kinds([EdmType::PrimitiveType]);

        let info = resolver.complete("", &query);
        assert!(info.next_segment("toC").is_none());
    }

    /// `Step0 -next-> Step1 -next-> ... -next-> Step5`, every step also
    /// navigating `back` to `Step0`, and `UI.LineItem` on `annotated`.
    fn make_chain_service(annotated: &str) -> (Metadata, PathExpressions) {
        let mut schema = SchemaDef::new("ns");
        for step in 0..=5 {
            let mut entity_type = EntityTypeDef::new(format!("Step{step}"));
            if step < 5 {
                entity_type = entity_type.with_navigation("next", format!("Step{}", step + 1), false);
            }
            if step > 0 {
                entity_type = entity_type.with_navigation("back", "Step0", false);
            }
            schema = schema.with_entity_type(entity_type);
        }
        let metadata = schema.into_metadata();
        let annotations = vec![AnnotationList::new(annotated).with(Annotation::new("UI.LineItem"))];
        let caches = build_path_expressions(&metadata, &annotations);
        (metadata, caches)
    }

    #[test]
    fn test_bridge_through_cycles_within_depth() {
        // One offered hop plus three bridged hops.
        let (metadata, caches) = make_chain_service("ns.Step4");
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.Step0");
        let query = PathQuery::for_terms(["UI.LineItem"]);

        let info = resolver.complete("", &query);
        assert_eq!(info.next_segment("next").map(|s| s.usage), Some(SegmentUsage::Intermediate));
        assert!(info.next_segment("back").is_none());
        assert!(resolver.check("next/next/next/next/@UI.LineItem", &query).valid);
    }

    #[test]
    fn test_bridge_depth_cap() {
        let (metadata, caches) = make_chain_service("ns.Step5");
        let query = PathQuery::for_terms(["UI.LineItem"]);

        let capped = PathResolver::new(&metadata, &caches).with_anchor("ns.Step0");
        assert!(capped.complete("", &query).next_segments.is_empty());
        let info = capped.check("next/next/next/next/next/@UI.LineItem", &query);
        assert!(!info.valid);
        assert_eq!(info.invalid_segment_index, Some(0));

        let deeper = PathResolver::new(&metadata, &caches)
            .with_anchor("ns.Step0")
            .with_options(ResolveOptions::default().with_max_navigation_depth(4));
        assert!(deeper.complete("", &query).next_segment("next").is_some());
        assert!(deeper.check("next/next/next/next/next/@UI.LineItem", &query).valid);
    }
}
