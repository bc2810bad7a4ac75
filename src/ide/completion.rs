//! Completion for path expressions.

use std::sync::Arc;

use crate::hir::{EdmType, MetaPathContext, NextSegment, PathQuery, PathResolver, SegmentUsage};

/// Kind of completion item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionKind {
    Property,
    NavigationProperty,
    Annotation,
    AnnotationTarget,
}

impl CompletionKind {
    /// Convert to LSP completion item kind number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            CompletionKind::Property => 10,          // Property
            CompletionKind::NavigationProperty => 18, // Reference
            CompletionKind::Annotation => 12,        // Value
            CompletionKind::AnnotationTarget => 7,   // Class
        }
    }
}

/// A completion suggestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionItem {
    /// The label shown in the list.
    pub name: Arc<str>,
    /// The text to insert.
    pub text: Arc<str>,
    pub kind: CompletionKind,
    /// Element or type the suggestion denotes.
    pub detail: Option<Arc<str>>,
    /// Characters that accept the item and are then typed.
    pub commit_characters: Vec<char>,
    /// The item is only useful when continued with a commit character.
    pub commit_character_required: bool,
}

impl CompletionItem {
    /// Create a new completion item inserting its name.
    pub fn new(name: impl Into<Arc<str>>, kind: CompletionKind) -> Self {
        let name = name.into();
        Self {
            text: Arc::clone(&name),
            name,
            kind,
            detail: None,
            commit_characters: Vec::new(),
            commit_character_required: false,
        }
    }

    /// Set the detail text.
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Create from a next path segment.
    ///
    /// Segments that can be continued commit on `/`; segments that must be
    /// continued require it.
    pub fn from_segment(segment: &NextSegment, kind: CompletionKind) -> Self {
        let mut item = Self::new(segment.name.as_str(), kind);
        if segment.usage.can_continue() {
            item.commit_characters = vec!['/'];
        }
        item.commit_character_required = segment.usage == SegmentUsage::Intermediate;
        if let Some(target) = &segment.target {
            item.detail = Some(Arc::from(target.as_str()));
        }
        item
    }
}

/// Complete a path expression.
///
/// `prefix` is the text typed so far; its last, unfinished segment is not
/// used for filtering, which is left to the client.
pub fn complete_path_expressions(resolver: &PathResolver<'_>, prefix: &str, query: &PathQuery) -> Vec<CompletionItem> {
    let info = resolver.complete(prefix, query);
    if !info.valid {
        return Vec::new();
    }
    let metadata = resolver.metadata();
    info.next_segments
        .iter()
        .filter(|segment| !segment.name.is_empty())
        .map(|segment| {
            let is_entity = segment
                .target
                .as_deref()
                .is_some_and(|target| metadata.entity_type(target).is_some());
            let kind = if segment.name.starts_with('@') {
                CompletionKind::Annotation
            } else if is_entity {
                CompletionKind::NavigationProperty
            } else {
                CompletionKind::Property
            };
            CompletionItem::from_segment(segment, kind)
        })
        .collect()
}

/// Complete a `metaPath` value.
///
/// Elements that accept property paths get properties and navigation
/// properties; elements with allowed terms get paths to those annotations.
pub fn meta_path_completions(resolver: &PathResolver<'_>, context: &MetaPathContext, prefix: &str) -> Vec<CompletionItem> {
    let mut items = Vec::new();
    if context.allow_property_paths {
        let query = PathQuery::for_kinds([EdmType::EntityType, EdmType::PrimitiveType, EdmType::ComplexType]);
        items.extend(complete_path_expressions(resolver, prefix, &query));
    }
    if !context.allowed_terms.is_empty() {
        for item in complete_path_expressions(resolver, prefix, &context.annotation_query()) {
            let navigates = item.kind == CompletionKind::NavigationProperty || item.kind == CompletionKind::Property;
            if navigates && !context.allow_navigation {
                continue;
            }
            if !items.iter().any(|existing: &CompletionItem| existing.name == item.name) {
                items.push(item);
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{Annotation, AnnotationList, EntityTypeDef, Metadata, PathExpressions, SchemaDef, build_path_expressions};

    fn make_service() -> (Metadata, PathExpressions) {
        let metadata = SchemaDef::new("ns")
            .with_entity_type(
                EntityTypeDef::new("Product")
                    .with_property("Name", "Edm.String")
                    .with_navigation("Supplier", "Supplier", false)
                    .with_navigation("Reviews", "Review", true),
            )
            .with_entity_type(EntityTypeDef::new("Supplier").with_property("Title", "Edm.String"))
            .with_entity_type(EntityTypeDef::new("Review").with_property("Text", "Edm.String"))
            .into_metadata();
        let annotations = vec![
            AnnotationList::new("ns.Product").with(Annotation::new("UI.LineItem")),
            AnnotationList::new("ns.Supplier").with(Annotation::new("UI.LineItem").with_qualifier("Short")),
        ];
        let caches = build_path_expressions(&metadata, &annotations);
        (metadata, caches)
    }

    fn names(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|item| item.name.as_ref()).collect()
    }

    #[test]
    fn test_items_from_segments() {
        let last = NextSegment {
            name: "Name".into(),
            target: None,
            usage: SegmentUsage::Last,
        };
        let item = CompletionItem::from_segment(&last, CompletionKind::Property);
        assert!(item.commit_characters.is_empty());
        assert!(!item.commit_character_required);

        let intermediate = NextSegment {
            name: "Supplier".into(),
            target: Some("ns.Supplier".into()),
            usage: SegmentUsage::Intermediate,
        };
        let item = CompletionItem::from_segment(&intermediate, CompletionKind::NavigationProperty);
        assert_eq!(item.commit_characters, vec!['/']);
        assert!(item.commit_character_required);
        assert_eq!(item.detail.as_deref(), Some("ns.Supplier"));
        assert_eq!(item.text, item.name);
    }

    #[test]
    fn test_complete_unrestricted() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.Product");
        let items = complete_path_expressions(&resolver, "", &PathQuery::any());

        assert_eq!(names(&items), vec!["Name", "@UI.LineItem", "Supplier", "Reviews"]);
        assert_eq!(items[1].kind, CompletionKind::Annotation);
        assert_eq!(items[2].kind, CompletionKind::NavigationProperty);
    }

    #[test]
    fn test_complete_invalid_prefix_is_empty() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.Product");
        assert!(complete_path_expressions(&resolver, "Nope/", &PathQuery::any()).is_empty());
    }

    #[test]
    fn test_meta_path_annotation_completion() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.Product");
        let context = MetaPathContext::new().with_allowed_terms(["UI.LineItem"]);

        let items = meta_path_completions(&resolver, &context, "");
        assert_eq!(names(&items), vec!["@UI.LineItem", "Supplier"]);
        assert!(items[1].commit_character_required);

        let items = meta_path_completions(&resolver, &context, "Supplier/");
        assert_eq!(names(&items), vec!["@UI.LineItem#Short"]);

        let pinned = context.with_navigation(false);
        assert_eq!(names(&meta_path_completions(&resolver, &pinned, "")), vec!["@UI.LineItem"]);
    }

    #[test]
    fn test_meta_path_property_completion() {
        let (metadata, caches) = make_service();
        let resolver = PathResolver::new(&metadata, &caches).with_anchor("ns.Product");
        let context = MetaPathContext::new().with_property_paths(true);

        let items = meta_path_completions(&resolver, &context, "");
        assert!(names(&items).contains(&"Name"));
        assert!(names(&items).contains(&"Supplier"));
    }
}
