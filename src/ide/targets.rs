//! Annotation targets — building blocks, annotation lookup and target suggestions.

use crate::base::SchemaNamespace;
use crate::hir::{Annotation, AnnotationList, MetaPathContext, Metadata, has_allowed_annotation};
use smol_str::SmolStr;

use super::completion::{CompletionItem, CompletionKind};

/// A building block and the annotation terms its `metaPath` accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildingBlock {
    pub name: &'static str,
    pub allowed_terms: &'static [&'static str],
}

impl BuildingBlock {
    /// Only `Field` binds to plain properties.
    pub fn allows_property_paths(&self) -> bool {
        self.name == "Field"
    }

    pub fn allowed_terms(&self) -> Vec<SmolStr> {
        self.allowed_terms.iter().copied().map(SmolStr::new_static).collect()
    }

    /// The `metaPath` context of this block. Navigation is only accepted
    /// when no explicit context path pins the target.
    pub fn meta_path_context(&self, has_context_path: bool) -> MetaPathContext {
        MetaPathContext::new()
            .with_property_paths(self.allows_property_paths())
            .with_navigation(!has_context_path)
            .with_allowed_terms(self.allowed_terms())
    }
}

const BUILDING_BLOCKS: &[BuildingBlock] = &[
    BuildingBlock {
        name: "FilterBar",
        allowed_terms: &["com.sap.vocabularies.UI.v1.SelectionFields"],
    },
    BuildingBlock {
        name: "Form",
        allowed_terms: &["com.sap.vocabularies.UI.v1.FieldGroup"],
    },
    BuildingBlock {
        name: "Field",
        allowed_terms: &[
            "com.sap.vocabularies.UI.v1.DataField",
            "com.sap.vocabularies.UI.v1.DataPoint",
        ],
    },
    BuildingBlock {
        name: "MicroChart",
        allowed_terms: &["com.sap.vocabularies.UI.v1.Chart"],
    },
    BuildingBlock {
        name: "Chart",
        allowed_terms: &["com.sap.vocabularies.UI.v1.Chart"],
    },
    BuildingBlock {
        name: "Table",
        allowed_terms: &[
            "com.sap.vocabularies.UI.v1.LineItem",
            "com.sap.vocabularies.UI.v1.PresentationVariant",
        ],
    },
];

/// Look up a building block by element name.
pub fn building_block(name: &str) -> Option<&'static BuildingBlock> {
    BUILDING_BLOCKS.iter().find(|block| block.name == name)
}

/// All annotations whose list targets `context_path`.
///
/// Targets are compared through name resolution, so `/Product` finds the
/// annotations of `Ex.Product` and `com.example.Product` alike.
pub fn annotations_for_target<'l>(
    schema: &SchemaNamespace,
    lists: &'l [AnnotationList],
    context_path: &str,
) -> Vec<&'l Annotation> {
    lists
        .iter()
        .filter(|list| schema.same_element(&list.target, context_path))
        .flat_map(|list| list.annotations.iter())
        .collect()
}

/// Annotation path suggestions for a `metaPath` below an explicit context
/// path: `@term` or `@term#qualifier` of every allowed annotation.
pub fn annotation_path_suggestions(
    schema: &SchemaNamespace,
    lists: &[AnnotationList],
    context_path: &str,
    allowed_terms: &[SmolStr],
) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = Vec::new();
    for annotation in annotations_for_target(schema, lists, context_path) {
        if !allowed_terms.is_empty() && !allowed_terms.contains(&annotation.term) {
            continue;
        }
        let segment = annotation.segment();
        if items.iter().all(|item| *item.name != *segment) {
            items.push(CompletionItem::new(segment.as_str(), CompletionKind::Annotation));
        }
    }
    items
}

/// Suggestions for a `contextPath` value, as `/Name`.
///
/// With `allow_property_paths` every entity type is offered; otherwise
/// only targets carrying an annotation with one of `allowed_terms`.
/// Targets outside the service namespace are not offered.
pub fn annotation_target_suggestions(
    metadata: &Metadata,
    lists: &[AnnotationList],
    allowed_terms: &[SmolStr],
    allow_property_paths: bool,
) -> Vec<CompletionItem> {
    let schema = metadata.schema();
    let targets: Vec<&str> = if allow_property_paths {
        metadata
            .entity_types()
            .iter()
            .map(|entity_type| entity_type.element.fqn.as_str())
            .collect()
    } else {
        lists
            .iter()
            .filter(|list| has_allowed_annotation(list, allowed_terms))
            .map(|list| list.target.as_str())
            .collect()
    };

    let mut items: Vec<CompletionItem> = Vec::new();
    for target in targets {
        let resolved = schema.resolve(target);
        let Some(fqn) = &resolved.fqn else {
            continue;
        };
        let path = format!("/{}", resolved.name);
        if items.iter().all(|item| *item.name != *path) {
            items.push(CompletionItem::new(path, CompletionKind::AnnotationTarget).with_detail(fqn.as_str()));
        }
    }
    items
}
