//! Annotation model — annotation lists, values and traversal.
//!
//! Annotations arrive grouped by target. Values are a small tagged union;
//! records and collections nest arbitrarily. [`AnnotationVisitor`] walks a
//! value tree while tracking the path of every node, which is how the
//! annotation path cache is filled.

use indexmap::IndexMap;
use smol_str::{SmolStr, format_smolstr};

use crate::base::SchemaNamespace;

// ============================================================================
// MODEL
// ============================================================================

/// All annotations on one target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationList {
    /// Target as written: `Ex.Product`, `com.example.Product/Name`, ...
    pub target: SmolStr,
    pub annotations: Vec<Annotation>,
}

impl AnnotationList {
    pub fn new(target: impl Into<SmolStr>) -> Self {
        Self {
            target: target.into(),
            annotations: Vec::new(),
        }
    }

    /// Add an annotation.
    pub fn with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Find an annotation by term and qualifier.
    pub fn find(&self, term: &str, qualifier: Option<&str>) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.term == term && a.qualifier.as_deref() == qualifier)
    }
}

/// A single annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Annotation {
    /// Vocabulary term, e.g. `UI.LineItem`.
    pub term: SmolStr,
    pub qualifier: Option<SmolStr>,
    pub value: Option<AnnotationValue>,
}

impl Annotation {
    pub fn new(term: impl Into<SmolStr>) -> Self {
        Self {
            term: term.into(),
            qualifier: None,
            value: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<SmolStr>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_value(mut self, value: AnnotationValue) -> Self {
        self.value = Some(value);
        self
    }

    /// The path segment naming this annotation: `@term` or `@term#qualifier`.
    pub fn segment(&self) -> SmolStr {
        match &self.qualifier {
            Some(qualifier) => format_smolstr!("@{}#{}", self.term, qualifier),
            None => format_smolstr!("@{}", self.term),
        }
    }

    /// Whether `other` has the same term and qualifier.
    pub fn same_slot(&self, other: &Annotation) -> bool {
        self.term == other.term && self.qualifier == other.qualifier
    }
}

/// An annotation value.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnnotationValue {
    String(SmolStr),
    Bool(bool),
    EnumMember(SmolStr),
    Path(SmolStr),
    Record(Record),
    Collection(Vec<AnnotationValue>),
}

/// A record value with optional `$Type`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    pub type_name: Option<SmolStr>,
    pub properties: Vec<PropertyValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed(type_name: impl Into<SmolStr>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<SmolStr>, value: AnnotationValue) -> Self {
        self.properties.push(PropertyValue {
            name: name.into(),
            value,
        });
        self
    }
}

/// A named property value inside a record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyValue {
    pub name: SmolStr,
    pub value: AnnotationValue,
}

// ============================================================================
// TRAVERSAL
// ============================================================================

/// Visits an annotation value tree.
///
/// Every callback receives the path of the node it is called for. Default
/// implementations recurse; override a method and call the matching `walk_*`
/// function to keep recursing.
pub trait AnnotationVisitor {
    fn visit_record(&mut self, record: &Record, path: &str) {
        walk_record(self, record, path);
    }

    fn visit_collection(&mut self, items: &[AnnotationValue], path: &str) {
        walk_collection(self, items, path);
    }

    /// Called for every record property and collection item before its
    /// value is visited.
    fn visit_member(&mut self, _path: &str) {}

    fn visit_leaf(&mut self, _value: &AnnotationValue, _path: &str) {}
}

/// Dispatch on the value kind.
pub fn walk_value<V: AnnotationVisitor + ?Sized>(visitor: &mut V, value: &AnnotationValue, path: &str) {
    match value {
        AnnotationValue::Record(record) => visitor.visit_record(record, path),
        AnnotationValue::Collection(items) => visitor.visit_collection(items, path),
        leaf => visitor.visit_leaf(leaf, path),
    }
}

/// Visit every property of a record at `path/<name>`.
pub fn walk_record<V: AnnotationVisitor + ?Sized>(visitor: &mut V, record: &Record, path: &str) {
    for property in &record.properties {
        let member = format!("{path}/{}", property.name);
        visitor.visit_member(&member);
        walk_value(visitor, &property.value, &member);
    }
}

/// Visit every item of a collection at `path/<index>`.
pub fn walk_collection<V: AnnotationVisitor + ?Sized>(visitor: &mut V, items: &[AnnotationValue], path: &str) {
    for (idx, item) in items.iter().enumerate() {
        let member = format!("{path}/{idx}");
        visitor.visit_member(&member);
        walk_value(visitor, item, &member);
    }
}

// ============================================================================
// GROUPING
// ============================================================================

/// Merge annotation lists that address the same target.
///
/// Targets are compared by resolved FQN, so `Ex.Product` and
/// `com.example.Product` end up in one list. The first list seen for a
/// target keeps its spelling. Within a target, an annotation whose term and
/// qualifier are already present is dropped.
pub fn group_annotation_lists<I>(schema: &SchemaNamespace, lists: I) -> Vec<AnnotationList>
where
    I: IntoIterator<Item = AnnotationList>,
{
    let mut grouped: IndexMap<SmolStr, AnnotationList> = IndexMap::new();

    for list in lists {
        let key = SmolStr::new(schema.resolve(&list.target).fqn_or_name());
        let merged = grouped
            .entry(key)
            .or_insert_with(|| AnnotationList::new(list.target.clone()));
        for annotation in list.annotations {
            if !merged.annotations.iter().any(|a| a.same_slot(&annotation)) {
                merged.annotations.push(annotation);
            }
        }
    }

    grouped.into_values().collect()
}
