//! Path caches — prefix trees of every valid path in a service.
//!
//! A cache is a [`PathMap`]: a tree keyed by path segment where every node
//! may carry a *self value* (`$Self` when serialized). A node with a self
//! value is a valid end point; a node with children can be continued.
//!
//! [`PathExpressions`] bundles the three caches built per service:
//!
//! | cache             | first-level key                 | contents                         |
//! |-------------------|---------------------------------|----------------------------------|
//! | `target_path`     | element FQN segments            | entity types, members, sets, ... |
//! | `type_path`       | `Edm.*` kind ([`EdmType`])      | elements of that kind            |
//! | `annotation_path` | term, record `$Type`, `$AnyTerm`| annotation and value paths       |
//!
//! All caches are filled through [`PathMap::insert`], whose merge rules keep
//! insertion order-independent for the common cases.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, warn};

use super::annotations::{AnnotationList, AnnotationVisitor, Record, walk_record, walk_value};
use super::metadata::{Metadata, Property};

/// Serialized name of a node's self value.
pub const SELF_KEY: &str = "$Self";

/// Annotation cache partition holding the paths of all terms.
pub const ANY_TERM: &str = "$AnyTerm";

// ============================================================================
// TREE
// ============================================================================

/// The self value of a cache node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathValue {
    /// The path exists; nothing more is known.
    Exists,
    /// The path exists and denotes this element or type.
    Target(SmolStr),
}

impl PathValue {
    #[inline]
    pub const fn is_exists(&self) -> bool {
        matches!(self, PathValue::Exists)
    }

    /// The target name, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            PathValue::Exists => None,
            PathValue::Target(name) => Some(name),
        }
    }
}

/// A child of a [`PathMap`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathNode {
    /// A terminal entry.
    Leaf(PathValue),
    /// An entry that can be continued.
    Map(PathMap),
}

impl PathNode {
    /// A terminal `Exists` entry.
    pub const EXISTS: PathNode = PathNode::Leaf(PathValue::Exists);

    /// A terminal entry denoting `name`.
    pub fn target(name: impl Into<SmolStr>) -> Self {
        PathNode::Leaf(PathValue::Target(name.into()))
    }

    /// A continuable entry whose self value denotes `name`.
    pub fn target_map(name: impl Into<SmolStr>) -> Self {
        PathNode::Map(PathMap::with_self(PathValue::Target(name.into())))
    }

    /// The self value: the leaf value, or the map's self value.
    pub fn self_value(&self) -> Option<&PathValue> {
        match self {
            PathNode::Leaf(value) => Some(value),
            PathNode::Map(map) => map.self_value.as_ref(),
        }
    }

    pub fn as_map(&self) -> Option<&PathMap> {
        match self {
            PathNode::Map(map) => Some(map),
            PathNode::Leaf(_) => None,
        }
    }

    /// Borrowed view of this node.
    pub fn view(&self) -> PathRef<'_> {
        match self {
            PathNode::Leaf(value) => PathRef::Leaf(value),
            PathNode::Map(map) => PathRef::Map(map),
        }
    }

    fn into_self_value(self) -> PathValue {
        match self {
            PathNode::Leaf(value) => value,
            PathNode::Map(map) => map.self_value.unwrap_or(PathValue::Exists),
        }
    }
}

/// Borrowed view of a node found by [`PathMap::find`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathRef<'a> {
    Leaf(&'a PathValue),
    Map(&'a PathMap),
}

impl PathRef<'_> {
    pub fn self_value(&self) -> Option<&PathValue> {
        match self {
            PathRef::Leaf(value) => Some(value),
            PathRef::Map(map) => map.self_value.as_ref(),
        }
    }

    pub fn to_node(&self) -> PathNode {
        match self {
            PathRef::Leaf(value) => PathNode::Leaf((*value).clone()),
            PathRef::Map(map) => PathNode::Map((*map).clone()),
        }
    }
}

/// A segment that exists with different letter case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseMismatch {
    /// Index of the segment in the looked-up path.
    pub index: usize,
    /// The key as stored in the cache.
    pub correct: SmolStr,
}

/// A prefix tree node keyed by path segment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PathMap {
    self_value: Option<PathValue>,
    children: IndexMap<SmolStr, PathNode>,
}

impl PathMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with a self value.
    pub fn with_self(value: PathValue) -> Self {
        Self {
            self_value: Some(value),
            children: IndexMap::new(),
        }
    }

    pub fn self_value(&self) -> Option<&PathValue> {
        self.self_value.as_ref()
    }

    pub fn set_self_value(&mut self, value: PathValue) {
        self.self_value = Some(value);
    }

    /// Get a direct child.
    pub fn get(&self, segment: &str) -> Option<&PathNode> {
        self.children.get(segment)
    }

    /// Get a direct child that can be continued.
    pub fn get_map(&self, segment: &str) -> Option<&PathMap> {
        self.get(segment).and_then(PathNode::as_map)
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.children.contains_key(segment)
    }

    /// Iterate over children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&SmolStr, &PathNode)> {
        self.children.iter()
    }

    /// Get the number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Check if there are no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether there is a self value or any child.
    pub fn has_content(&self) -> bool {
        self.self_value.is_some() || !self.children.is_empty()
    }

    /// Insert `path`, merging with what is already there.
    ///
    /// The path is split on `/` and empty segments are skipped. Missing
    /// intermediate nodes are created empty; an intermediate leaf is turned
    /// into a map that keeps the leaf value as its self value. At the last
    /// segment `value` (default [`PathValue::Exists`]) is placed:
    ///
    /// - over an existing map, it becomes the map's self value;
    /// - over an existing leaf with a map value, the map is stored and the
    ///   old leaf value survives as self value unless it was `Exists` or the
    ///   incoming map carries a target;
    /// - over an existing leaf with a leaf value, the new value wins only if
    ///   the old one was `Exists` or the new one is a target.
    pub fn insert(&mut self, path: &str, value: Option<PathNode>) {
        let segments: Vec<&str> = path.split('/').collect();
        let last = segments.len() - 1;
        let mut current = self;

        for (idx, segment) in segments.into_iter().enumerate() {
            if segment.is_empty() {
                continue;
            }

            if idx == last {
                match current.children.get_mut(segment) {
                    Some(existing) => merge_terminal(existing, value),
                    None => {
                        current
                            .children
                            .insert(SmolStr::new(segment), value.unwrap_or(PathNode::EXISTS));
                    }
                }
                return;
            }

            let Some(next) = current.child_map_mut(segment) else {
                return;
            };
            current = next;
        }
    }

    /// Set the self value of the node at `path`, creating it if needed.
    ///
    /// A present self value is only replaced when it is `Exists` or the new
    /// value is a target.
    pub fn insert_self(&mut self, path: &str, value: PathValue) {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let Some(next) = current.child_map_mut(segment) else {
                return;
            };
            current = next;
        }
        let keep = matches!(&current.self_value, Some(old) if !old.is_exists() && value.is_exists());
        if !keep {
            current.self_value = Some(value);
        }
    }

    /// Child map for `segment`, created empty or promoted from a leaf.
    fn child_map_mut(&mut self, segment: &str) -> Option<&mut PathMap> {
        let node = self
            .children
            .entry(SmolStr::new(segment))
            .or_insert_with(|| PathNode::Map(PathMap::new()));
        if let PathNode::Leaf(old) = node {
            let promoted = PathMap::with_self(old.clone());
            *node = PathNode::Map(promoted);
        }
        match node {
            PathNode::Map(map) => Some(map),
            PathNode::Leaf(_) => None,
        }
    }

    /// Find the node at `segments`. No segments yields this map.
    ///
    /// A leaf cannot be continued, so any segment after a leaf fails.
    pub fn find<S: AsRef<str>>(&self, segments: &[S]) -> Option<PathRef<'_>> {
        let mut current = PathRef::Map(self);
        for segment in segments {
            let PathRef::Map(map) = current else {
                return None;
            };
            current = map.children.get(segment.as_ref())?.view();
        }
        Some(current)
    }

    /// Locate the first segment of a failed lookup that exists with
    /// different letter case.
    pub fn find_case_mismatch<S: AsRef<str>>(&self, segments: &[S]) -> Option<CaseMismatch> {
        let mut current = self;
        for (index, segment) in segments.iter().enumerate() {
            let segment = segment.as_ref();
            match current.children.get(segment) {
                Some(PathNode::Map(next)) => current = next,
                Some(PathNode::Leaf(_)) => return None,
                None => {
                    return current
                        .children
                        .keys()
                        .find(|key| key.eq_ignore_ascii_case(segment))
                        .map(|correct| CaseMismatch {
                            index,
                            correct: correct.clone(),
                        });
                }
            }
        }
        None
    }

    /// Merge a found node into this accumulated result.
    ///
    /// A leaf becomes the self value. For a map, its self value (if any)
    /// replaces ours and each child is merged in; children already present
    /// with a self value are kept as they are.
    pub fn accumulate(&mut self, found: PathRef<'_>) {
        match found {
            PathRef::Leaf(value) => self.self_value = Some(value.clone()),
            PathRef::Map(map) => {
                if let Some(value) = &map.self_value {
                    self.self_value = Some(value.clone());
                }
                for (key, child) in &map.children {
                    self.merge_child(key, child.clone());
                }
            }
        }
    }

    /// Merge `incoming` as child `key`, keeping a present child that has a
    /// self value.
    pub fn merge_child(&mut self, key: &SmolStr, incoming: PathNode) {
        if !self.children.contains_key(key) {
            self.children.insert(key.clone(), incoming);
            return;
        }
        let Some(existing) = self.children.get_mut(key) else {
            return;
        };
        let merged = match (std::mem::replace(existing, PathNode::EXISTS), incoming) {
            (PathNode::Map(kept), _) if kept.self_value.is_some() => PathNode::Map(kept),
            (PathNode::Leaf(_), PathNode::Leaf(value)) => PathNode::Leaf(value),
            (PathNode::Leaf(old), PathNode::Map(mut map)) => {
                map.self_value.get_or_insert(old);
                PathNode::Map(map)
            }
            (PathNode::Map(mut map), PathNode::Leaf(value)) => {
                map.self_value = Some(value);
                PathNode::Map(map)
            }
            (PathNode::Map(mut map), PathNode::Map(other)) => {
                map.self_value = other.self_value;
                map.children.extend(other.children);
                PathNode::Map(map)
            }
        };
        *existing = merged;
    }

    /// Drop all children and the self value.
    pub fn clear(&mut self) {
        self.self_value = None;
        self.children.clear();
    }
}

fn merge_terminal(existing: &mut PathNode, value: Option<PathNode>) {
    match existing {
        PathNode::Map(map) => {
            map.self_value = Some(value.map_or(PathValue::Exists, PathNode::into_self_value));
        }
        PathNode::Leaf(old) => {
            let old = old.clone();
            match value {
                Some(PathNode::Map(mut incoming)) => {
                    let self_value = match incoming.self_value.take() {
                        Some(PathValue::Target(name)) => PathValue::Target(name),
                        other if old.is_exists() => other.unwrap_or(PathValue::Exists),
                        _ => old,
                    };
                    incoming.self_value = Some(self_value);
                    *existing = PathNode::Map(incoming);
                }
                Some(PathNode::Leaf(PathValue::Target(name))) => {
                    *existing = PathNode::target(name);
                }
                Some(PathNode::Leaf(PathValue::Exists)) | None => {
                    if old.is_exists() {
                        *existing = PathNode::EXISTS;
                    }
                }
            }
        }
    }
}

impl fmt::Debug for PathMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        if let Some(value) = &self.self_value {
            map.entry(&SELF_KEY, value);
        }
        map.entries(self.children.iter()).finish()
    }
}

// ============================================================================
// TYPE KEYS
// ============================================================================

/// Abstract element kinds partitioning the type cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdmType {
    EntitySet,
    Singleton,
    EntityType,
    NavigationPropertyPath,
    PropertyPath,
    PrimitiveType,
    ComplexType,
}

impl EdmType {
    /// The cache key, e.g. `Edm.EntityType`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EdmType::EntitySet => "Edm.EntitySet",
            EdmType::Singleton => "Edm.Singleton",
            EdmType::EntityType => "Edm.EntityType",
            EdmType::NavigationPropertyPath => "Edm.NavigationPropertyPath",
            EdmType::PropertyPath => "Edm.PropertyPath",
            EdmType::PrimitiveType => "Edm.PrimitiveType",
            EdmType::ComplexType => "Edm.ComplexType",
        }
    }

    /// Kinds whose paths end on an entity or navigation.
    pub const fn is_navigation(&self) -> bool {
        matches!(
            self,
            EdmType::EntityType | EdmType::EntitySet | EdmType::NavigationPropertyPath
        )
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdmType {
    type Err = SmolStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Edm.EntitySet" => EdmType::EntitySet,
            "Edm.Singleton" => EdmType::Singleton,
            "Edm.EntityType" => EdmType::EntityType,
            "Edm.NavigationPropertyPath" => EdmType::NavigationPropertyPath,
            "Edm.PropertyPath" => EdmType::PropertyPath,
            "Edm.PrimitiveType" => EdmType::PrimitiveType,
            "Edm.ComplexType" => EdmType::ComplexType,
            other => return Err(SmolStr::new(other)),
        })
    }
}

// ============================================================================
// CACHES
// ============================================================================

/// The path caches of one service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathExpressions {
    target_path: PathMap,
    type_path: PathMap,
    annotation_path: PathMap,
}

impl PathExpressions {
    /// All annotation targets and their members, keyed by FQN segments.
    pub fn target_path(&self) -> &PathMap {
        &self.target_path
    }

    /// Elements partitioned by [`EdmType`].
    pub fn type_path(&self) -> &PathMap {
        &self.type_path
    }

    /// Annotation paths partitioned by term, record type and [`ANY_TERM`].
    pub fn annotation_path(&self) -> &PathMap {
        &self.annotation_path
    }

    /// The type cache partition for `kind`.
    pub fn type_partition(&self, kind: EdmType) -> Option<&PathMap> {
        self.type_path.get_map(kind.as_str())
    }

    /// The annotation cache partition for a term or record type.
    pub fn term_partition(&self, term: &str) -> Option<&PathMap> {
        self.annotation_path.get_map(term)
    }

    /// The partition with the annotation paths of every term.
    pub fn any_term_partition(&self) -> Option<&PathMap> {
        self.annotation_path.get_map(ANY_TERM)
    }

    /// Find an absolute path such as `/ns.Product/Name` in the target cache.
    pub fn lookup_target(&self, path: &str) -> Option<PathRef<'_>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.target_path.find(&segments)
    }

    /// Serialize all caches as pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(feature = "serde")]
mod ser {
    use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};

    use super::{PathExpressions, PathMap, PathNode, PathValue, SELF_KEY};

    impl Serialize for PathValue {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                PathValue::Exists => serializer.serialize_bool(true),
                PathValue::Target(name) => serializer.serialize_str(name),
            }
        }
    }

    impl Serialize for PathNode {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                PathNode::Leaf(value) => value.serialize(serializer),
                PathNode::Map(map) => map.serialize(serializer),
            }
        }
    }

    impl Serialize for PathMap {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let len = self.children.len() + usize::from(self.self_value.is_some());
            let mut map = serializer.serialize_map(Some(len))?;
            if let Some(value) = &self.self_value {
                map.serialize_entry(SELF_KEY, value)?;
            }
            for (key, child) in &self.children {
                map.serialize_entry(key.as_str(), child)?;
            }
            map.end()
        }
    }

    impl Serialize for PathExpressions {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut caches = serializer.serialize_struct("PathExpressions", 4)?;
            caches.serialize_field("targetPath", &self.target_path)?;
            caches.serialize_field("pathCc", &self.type_path)?;
            caches.serialize_field("annotationPath", &self.annotation_path)?;
            caches.serialize_field("annotationPathCc", &self.annotation_path)?;
            caches.end()
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Options for cache construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheOptions {
    /// How deep complex-typed properties are expanded into the type cache.
    pub max_complex_type_depth: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_complex_type_depth: 8,
        }
    }
}

impl CacheOptions {
    pub fn with_max_complex_type_depth(mut self, depth: usize) -> Self {
        self.max_complex_type_depth = depth;
        self
    }
}

/// Builds [`PathExpressions`] from metadata and annotations.
pub struct CacheBuilder<'a> {
    metadata: &'a Metadata,
    options: CacheOptions,
    caches: PathExpressions,
}

impl<'a> CacheBuilder<'a> {
    /// Create a builder for `metadata`.
    pub fn new(metadata: &'a Metadata) -> Self {
        Self {
            metadata,
            options: CacheOptions::default(),
            caches: PathExpressions::default(),
        }
    }

    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Build all caches.
    pub fn build(mut self, annotations: &[AnnotationList]) -> PathExpressions {
        for kind in [EdmType::EntityType, EdmType::PrimitiveType] {
            self.caches
                .type_path
                .insert(kind.as_str(), Some(PathNode::Map(PathMap::new())));
        }

        self.add_entity_types();
        self.add_complex_types();
        self.add_container();
        self.add_actions();
        self.add_annotations(annotations);

        debug!(
            "[CACHE] {}: {} targets, {} type partitions, {} annotation partitions",
            self.metadata.namespace(),
            self.caches.target_path.len(),
            self.caches.type_path.len(),
            self.caches.annotation_path.len()
        );
        self.caches
    }

    fn add_typed(&mut self, kind: EdmType, path: &str, value: Option<PathNode>) {
        self.caches
            .type_path
            .insert(&format!("{}/{path}", kind.as_str()), value);
    }

    fn add_entity_types(&mut self) {
        let metadata = self.metadata;
        for entity_type in metadata.entity_types() {
            let fqn = &entity_type.element.fqn;
            self.caches.target_path.insert(fqn, Some(PathNode::target_map(fqn.clone())));
            self.add_typed(EdmType::EntityType, fqn, None);

            for nav in &entity_type.navigation_properties {
                if metadata.entity_type(&nav.target_type_name).is_none() {
                    warn!(
                        "[CACHE] skipping {}: unknown target {}",
                        nav.element.fqn, nav.target_type_name
                    );
                    continue;
                }
                let target = PathNode::target(nav.target_type_name.clone());
                self.add_typed(EdmType::EntityType, &nav.element.fqn, Some(target.clone()));
                self.add_typed(EdmType::NavigationPropertyPath, &nav.element.fqn, Some(target));
            }

            for property in &entity_type.properties {
                let pfqn = &property.element.fqn;
                self.caches.target_path.insert(pfqn, Some(PathNode::target(pfqn.clone())));
                let mut expanding = Vec::new();
                self.add_property_types(pfqn, property, 0, &mut expanding);
            }
        }
    }

    /// Insert a property into the type cache under `path`, expanding
    /// complex types into their sub-properties.
    fn add_property_types(&mut self, path: &str, property: &Property, depth: usize, expanding: &mut Vec<SmolStr>) {
        if property.is_primitive() {
            self.add_typed(EdmType::PrimitiveType, path, None);
            return;
        }
        let Some(complex_name) = property.complex_type() else {
            return;
        };
        self.add_typed(EdmType::ComplexType, path, Some(PathNode::target(complex_name)));

        if depth >= self.options.max_complex_type_depth {
            debug!("[CACHE] complex type depth limit reached at {path}");
            return;
        }
        if expanding.iter().any(|name| name == complex_name) {
            return;
        }
        let metadata = self.metadata;
        let Some(complex) = metadata.complex_type(complex_name) else {
            warn!("[CACHE] {} has unknown complex type {complex_name}", property.element.fqn);
            return;
        };

        expanding.push(SmolStr::new(complex_name));
        for sub in &complex.properties {
            let sub_path = format!("{path}/{}", sub.element.name);
            self.add_property_types(&sub_path, sub, depth + 1, expanding);
        }
        expanding.pop();
    }

    fn add_complex_types(&mut self) {
        let metadata = self.metadata;
        for complex in metadata.complex_types() {
            let fqn = &complex.element.fqn;
            self.caches.target_path.insert(fqn, Some(PathNode::target_map(fqn.clone())));
            for property in &complex.properties {
                let pfqn = &property.element.fqn;
                self.caches.target_path.insert(pfqn, Some(PathNode::target(pfqn.clone())));
            }
        }
    }

    fn add_container(&mut self) {
        let metadata = self.metadata;
        if let Some(container) = metadata.container() {
            self.caches
                .target_path
                .insert(&container.fqn, Some(PathNode::target_map(container.fqn.clone())));
        }
        for set in metadata.entity_sets() {
            let fqn = &set.element.fqn;
            self.caches.target_path.insert(fqn, Some(PathNode::target(fqn.clone())));
        }
    }

    fn add_actions(&mut self) {
        let metadata = self.metadata;
        for action in metadata.actions() {
            let fqn = &action.element.fqn;
            self.caches.target_path.insert(fqn, Some(PathNode::target_map(fqn.clone())));
            for parameter in &action.parameters {
                let pfqn = &parameter.element.fqn;
                self.caches.target_path.insert(pfqn, Some(PathNode::target(pfqn.clone())));
            }
        }
    }

    fn add_annotations(&mut self, lists: &[AnnotationList]) {
        for list in lists {
            let resolved = self.metadata.resolve_name(&list.target);
            let target = resolved.fqn_or_name();
            for annotation in &list.annotations {
                let path = format!("{target}/{}", annotation.segment());
                let mut collector = AnnotationPaths {
                    cache: &mut self.caches.annotation_path,
                    keys: vec![annotation.term.clone(), SmolStr::new(ANY_TERM)],
                };
                collector.add(&path);
                if let Some(value) = &annotation.value {
                    walk_value(&mut collector, value, &path);
                }
            }
        }
    }
}

/// Inserts annotation value paths under every active partition key.
struct AnnotationPaths<'c> {
    cache: &'c mut PathMap,
    keys: Vec<SmolStr>,
}

impl AnnotationPaths<'_> {
    fn add(&mut self, path: &str) {
        for key in &self.keys {
            self.cache.insert(&format!("{key}/{path}"), None);
        }
    }
}

impl AnnotationVisitor for AnnotationPaths<'_> {
    fn visit_record(&mut self, record: &Record, path: &str) {
        let Some(type_name) = &record.type_name else {
            walk_record(self, record, path);
            return;
        };
        self.cache.insert(&format!("{type_name}/{path}"), None);
        self.keys.push(type_name.clone());
        walk_record(self, record, path);
        self.keys.pop();
    }

    fn visit_member(&mut self, path: &str) {
        self.add(path);
    }
}

/// Build the caches of a service with default options.
pub fn build_path_expressions(metadata: &Metadata, annotations: &[AnnotationList]) -> PathExpressions {
    CacheBuilder::new(metadata).build(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::annotations::{Annotation, AnnotationValue};
    use crate::hir::convert::{ComplexTypeDef, EntitySetDef, EntityTypeDef, SchemaDef};

    fn target(name: &str) -> PathNode {
        PathNode::target(name)
    }

    #[test]
    fn test_insert_creates_intermediates() {
        let mut map = PathMap::new();
        map.insert("a/b/c", None);
        let a = map.get_map("a").unwrap();
        assert_eq!(a.self_value(), None);
        assert_eq!(a.get_map("b").unwrap().get("c"), Some(&PathNode::EXISTS));
    }

    #[test]
    fn test_insert_skips_empty_segments() {
        let mut map = PathMap::new();
        map.insert("/a//b", None);
        assert_eq!(map.find(&["a", "b"]).map(|r| r.to_node()), Some(PathNode::EXISTS));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_insert_trailing_separator_is_intermediate() {
        let mut map = PathMap::new();
        map.insert("a/", None);
        assert_eq!(map.get("a"), Some(&PathNode::Map(PathMap::new())));
    }

    #[test]
    fn test_insert_promotes_leaf_to_map() {
        let mut map = PathMap::new();
        map.insert("a", Some(target("A")));
        map.insert("a/b", None);
        let a = map.get_map("a").unwrap();
        assert_eq!(a.self_value(), Some(&PathValue::Target("A".into())));
        assert!(a.contains("b"));
    }

    #[test]
    fn test_insert_over_map_sets_self() {
        let mut map = PathMap::new();
        map.insert("a/b", None);
        map.insert("a", Some(target("A")));
        let a = map.get_map("a").unwrap();
        assert_eq!(a.self_value(), Some(&PathValue::Target("A".into())));
        assert!(a.contains("b"));
    }

    #[test]
    fn test_insert_target_wins_over_exists() {
        let mut map = PathMap::new();
        map.insert("a", None);
        map.insert("a", Some(target("A")));
        assert_eq!(map.get("a"), Some(&target("A")));

        map.insert("a", None);
        assert_eq!(map.get("a"), Some(&target("A")));
    }

    #[test]
    fn test_insert_map_over_leaf() {
        let mut map = PathMap::new();
        map.insert("a", Some(target("old")));
        let mut incoming = PathMap::new();
        incoming.insert("x", None);
        map.insert("a", Some(PathNode::Map(incoming)));

        let a = map.get_map("a").unwrap();
        assert_eq!(a.self_value(), Some(&PathValue::Target("old".into())));
        assert!(a.contains("x"));
    }

    #[test]
    fn test_insert_self_keeps_target() {
        let mut map = PathMap::new();
        map.insert_self("a", PathValue::Target("A".into()));
        map.insert_self("a", PathValue::Exists);
        assert_eq!(map.get_map("a").unwrap().self_value(), Some(&PathValue::Target("A".into())));

        map.insert("b", None);
        map.insert_self("b", PathValue::Target("B".into()));
        assert_eq!(map.get("b").and_then(PathNode::self_value), Some(&PathValue::Target("B".into())));
    }

    #[test]
    fn test_find_does_not_continue_leaf() {
        let mut map = PathMap::new();
        map.insert("a", None);
        assert!(map.find(&["a"]).is_some());
        assert!(map.find(&["a", "b"]).is_none());
        assert!(matches!(map.find::<&str>(&[]), Some(PathRef::Map(_))));
    }

    #[test]
    fn test_find_case_mismatch() {
        let mut map = PathMap::new();
        map.insert("ns.Product/Name", None);
        let mismatch = map.find_case_mismatch(&["ns.Product", "name"]).unwrap();
        assert_eq!(mismatch, CaseMismatch { index: 1, correct: "Name".into() });
        assert!(map.find_case_mismatch(&["ns.Product", "Other"]).is_none());
    }

    #[test]
    fn test_accumulate_keeps_entries_with_self() {
        let mut acc = PathMap::new();
        acc.insert("x", Some(PathNode::target_map("first")));

        let mut found = PathMap::new();
        found.insert("x", Some(target("second")));
        found.insert("y", None);
        acc.accumulate(PathRef::Map(&found));

        assert_eq!(acc.get("x").and_then(PathNode::self_value), Some(&PathValue::Target("first".into())));
        assert!(acc.contains("y"));
    }

    #[test]
    fn test_accumulate_merges_partitions() {
        let mut acc = PathMap::new();
        let mut primitive = PathMap::new();
        primitive.insert("Address/Street", None);
        let mut complex = PathMap::new();
        complex.insert("Address", Some(target("ns.Address")));

        acc.accumulate(PathRef::Map(&primitive));
        acc.accumulate(PathRef::Map(&complex));

        let address = acc.get_map("Address").unwrap();
        assert_eq!(address.self_value(), Some(&PathValue::Target("ns.Address".into())));
        assert!(address.contains("Street"));
    }

    #[test]
    fn test_edm_type_round_trip() {
        for kind in [EdmType::EntityType, EdmType::PrimitiveType, EdmType::NavigationPropertyPath] {
            assert_eq!(kind.as_str().parse::<EdmType>(), Ok(kind));
        }
        assert!("Edm.String".parse::<EdmType>().is_err());
    }

    fn make_metadata() -> Metadata {
        SchemaDef::new("ns")
            .with_entity_type(
                EntityTypeDef::new("Product")
                    .with_property("Name", "Edm.String")
                    .with_property("Address", "Address")
                    .with_navigation("Supplier", "Supplier", false),
            )
            .with_entity_type(EntityTypeDef::new("Supplier").with_property("Title", "Edm.String"))
            .with_complex_type(
                ComplexTypeDef::new("Address")
                    .with_property("Street", "Edm.String")
                    .with_property("Parent", "Address"),
            )
            .with_entity_set(EntitySetDef::new("Products", "Product"))
            .into_metadata()
    }

    #[test]
    fn test_build_target_path() {
        let caches = build_path_expressions(&make_metadata(), &[]);
        let product = caches.target_path().get_map("ns.Product").unwrap();
        assert_eq!(product.self_value(), Some(&PathValue::Target("ns.Product".into())));
        assert_eq!(product.get("Name"), Some(&target("ns.Product/Name")));

        let container = caches.target_path().get_map("ns.EntityContainer").unwrap();
        assert_eq!(container.get("Products"), Some(&target("ns.EntityContainer/Products")));

        assert!(caches.lookup_target("/ns.Product/Name").is_some());
        assert!(caches.lookup_target("ns.Product/Missing").is_none());
    }

    #[test]
    fn test_build_type_partitions() {
        let caches = build_path_expressions(&make_metadata(), &[]);

        let entity = caches.type_partition(EdmType::EntityType).unwrap();
        let product = entity.get_map("ns.Product").unwrap();
        assert_eq!(product.self_value(), Some(&PathValue::Exists));
        assert_eq!(product.get("Supplier"), Some(&target("ns.Supplier")));

        let primitive = caches.type_partition(EdmType::PrimitiveType).unwrap();
        assert!(primitive.find(&["ns.Product", "Name"]).is_some());
        assert!(primitive.find(&["ns.Product", "Address", "Street"]).is_some());
        assert!(primitive.find(&["ns.Product", "Supplier"]).is_none());

        let complex = caches.type_partition(EdmType::ComplexType).unwrap();
        let address = complex.find(&["ns.Product", "Address"]).unwrap();
        assert_eq!(address.self_value(), Some(&PathValue::Target("ns.Address".into())));
    }

    #[test]
    fn test_build_recursive_complex_type_terminates() {
        let metadata = make_metadata();
        let caches = CacheBuilder::new(&metadata)
            .with_options(CacheOptions::default().with_max_complex_type_depth(2))
            .build(&[]);
        let complex = caches.type_partition(EdmType::ComplexType).unwrap();
        assert!(complex.find(&["ns.Product", "Address", "Parent"]).is_some());
        assert!(complex.find(&["ns.Product", "Address", "Parent", "Parent"]).is_none());
    }

    #[test]
    fn test_build_annotation_partitions() {
        let lists = vec![AnnotationList::new("Product").with(
            Annotation::new("UI.LineItem").with_value(AnnotationValue::Collection(vec![
                AnnotationValue::Record(
                    Record::typed("UI.DataField").with_property("Value", AnnotationValue::Path("Name".into())),
                ),
            ])),
        )];
        let caches = build_path_expressions(&make_metadata(), &lists);

        let term = caches.term_partition("UI.LineItem").unwrap();
        assert!(term.find(&["ns.Product", "@UI.LineItem"]).is_some());
        assert!(term.find(&["ns.Product", "@UI.LineItem", "0", "Value"]).is_some());

        let record = caches.term_partition("UI.DataField").unwrap();
        assert!(record.find(&["ns.Product", "@UI.LineItem", "0"]).is_some());
        assert!(record.find(&["ns.Product", "@UI.LineItem", "0", "Value"]).is_some());

        let any = caches.any_term_partition().unwrap();
        assert!(any.find(&["ns.Product", "@UI.LineItem"]).is_some());
    }
}
