//! Metadata model — the schema elements paths are resolved against.
//!
//! A [`Metadata`] value holds the converted service schema plus the derived
//! indices every other part of the crate reads:
//!
//! - `lookup_map`: FQN → element, for every element reachable from the
//!   container, entity types, complex types and actions.
//! - `navigation_source_map`: source FQN → target entity type → navigation
//!   property name → [`NavigationEdge`].
//! - `action_map`: action FQN without signature → overload FQNs.
//! - `namespaces`: every namespace appearing in an element FQN.
//!
//! Metadata is immutable once built. Use [`SchemaDef`](super::SchemaDef) to
//! convert a schema definition, or [`Metadata::new`] to index elements that
//! were built by hand.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::error::PathError;
use crate::base::{ResolvedName, SchemaNamespace, namespace_of, strip_signature};

// ============================================================================
// ELEMENTS
// ============================================================================

/// The kind of a metadata element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    EntityContainer,
    EntityType,
    EntitySet,
    ComplexType,
    Property,
    NavigationProperty,
    Action,
    ActionParameter,
}

impl ElementKind {
    /// Human-readable kind name.
    pub fn display(&self) -> &'static str {
        match self {
            ElementKind::EntityContainer => "entity container",
            ElementKind::EntityType => "entity type",
            ElementKind::EntitySet => "entity set",
            ElementKind::ComplexType => "complex type",
            ElementKind::Property => "property",
            ElementKind::NavigationProperty => "navigation property",
            ElementKind::Action => "action",
            ElementKind::ActionParameter => "action parameter",
        }
    }
}

/// Data shared by every metadata element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataElement {
    pub kind: ElementKind,
    /// Simple name, e.g. `Name`.
    pub name: SmolStr,
    /// Fully qualified name, e.g. `com.example.Product/Name`.
    pub fqn: SmolStr,
    pub is_collection: bool,
    /// The element is, or is typed by, an entity type.
    pub is_entity_type: bool,
    /// The element is, or is typed by, a complex type.
    pub is_complex_type: bool,
    /// `Edm.*` type for primitive-typed elements.
    pub edm_primitive_type: Option<SmolStr>,
    /// FQN of the entity or complex type of structured elements.
    pub structured_type: Option<SmolStr>,
}

impl MetadataElement {
    /// Create an element with all flags cleared.
    pub fn new(kind: ElementKind, name: impl Into<SmolStr>, fqn: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            name: name.into(),
            fqn: fqn.into(),
            is_collection: false,
            is_entity_type: false,
            is_complex_type: false,
            edm_primitive_type: None,
            structured_type: None,
        }
    }

    /// Mark the element as collection-valued.
    pub fn with_collection(mut self, is_collection: bool) -> Self {
        self.is_collection = is_collection;
        self
    }

    /// Set the `Edm.*` primitive type.
    pub fn with_primitive_type(mut self, edm_type: impl Into<SmolStr>) -> Self {
        self.edm_primitive_type = Some(edm_type.into());
        self
    }

    /// Set the structured type, flagging it as entity or complex type.
    pub fn with_structured_type(mut self, type_fqn: impl Into<SmolStr>, is_entity_type: bool) -> Self {
        self.structured_type = Some(type_fqn.into());
        self.is_entity_type = is_entity_type;
        self.is_complex_type = !is_entity_type;
        self
    }
}

/// A structural property of an entity or complex type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub element: MetadataElement,
    /// Declared type as qualified by conversion, e.g. `Edm.String`.
    pub type_name: SmolStr,
}

impl Property {
    /// Whether the property has an `Edm.*` type.
    pub fn is_primitive(&self) -> bool {
        self.element.edm_primitive_type.is_some()
    }

    /// The complex type FQN, if the property is complex-typed.
    pub fn complex_type(&self) -> Option<&str> {
        if self.element.is_complex_type {
            self.element.structured_type.as_deref()
        } else {
            None
        }
    }
}

/// A navigation property of an entity or complex type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationProperty {
    pub element: MetadataElement,
    /// FQN of the target entity type.
    pub target_type_name: SmolStr,
    pub contains_target: bool,
}

/// An entity type with its properties and navigation properties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityType {
    pub element: MetadataElement,
    pub keys: Vec<SmolStr>,
    pub properties: Vec<Property>,
    pub navigation_properties: Vec<NavigationProperty>,
}

/// A complex type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplexType {
    pub element: MetadataElement,
    pub properties: Vec<Property>,
    pub navigation_properties: Vec<NavigationProperty>,
}

/// An entity set of the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySet {
    pub element: MetadataElement,
    /// FQN of the entity type of the set.
    pub entity_type_name: SmolStr,
    /// Navigation-property bindings, keyed by binding path.
    pub navigation_bindings: IndexMap<SmolStr, BindingTarget>,
}

/// Target of a navigation-property binding.
///
/// Bindings are expanded recursively. A set that was already expanded higher
/// up is referenced by FQN instead of being expanded again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingTarget {
    Set(Box<EntitySet>),
    Cycle(SmolStr),
}

impl BindingTarget {
    /// FQN of the bound entity set.
    pub fn set_fqn(&self) -> &str {
        match self {
            BindingTarget::Set(set) => &set.element.fqn,
            BindingTarget::Cycle(fqn) => fqn,
        }
    }
}

/// An action or function overload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub element: MetadataElement,
    pub is_bound: bool,
    pub is_function: bool,
    pub parameters: Vec<ActionParameter>,
    pub return_type: Option<SmolStr>,
}

/// A parameter of an action or function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionParameter {
    pub element: MetadataElement,
    pub type_name: SmolStr,
}

/// One navigation edge in the navigation-source map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NavigationEdge {
    pub is_collection: bool,
}

/// Target entity type → navigation property name → edge.
pub type NavigationTargets = IndexMap<SmolStr, IndexMap<SmolStr, NavigationEdge>>;

// ============================================================================
// METADATA
// ============================================================================

/// Converted service metadata with lookup indices.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    schema: SchemaNamespace,
    container: Option<MetadataElement>,
    entity_types: Vec<EntityType>,
    complex_types: Vec<ComplexType>,
    entity_sets: Vec<EntitySet>,
    actions: Vec<Action>,

    entity_type_index: FxHashMap<SmolStr, usize>,
    complex_type_index: FxHashMap<SmolStr, usize>,
    lookup_map: FxHashMap<SmolStr, MetadataElement>,
    action_map: IndexMap<SmolStr, IndexSet<SmolStr>>,
    navigation_source_map: IndexMap<SmolStr, NavigationTargets>,
    namespaces: IndexSet<SmolStr>,
    duplicates: Vec<SmolStr>,
}

impl Metadata {
    /// Index the given elements.
    pub fn new(
        schema: SchemaNamespace,
        container: Option<MetadataElement>,
        entity_types: Vec<EntityType>,
        complex_types: Vec<ComplexType>,
        entity_sets: Vec<EntitySet>,
        actions: Vec<Action>,
    ) -> Self {
        let mut metadata = Self {
            schema,
            container,
            entity_types,
            complex_types,
            entity_sets,
            actions,
            ..Self::default()
        };
        metadata.build_indices();
        metadata
    }

    fn build_indices(&mut self) {
        let mut elements: Vec<MetadataElement> = Vec::new();

        if let Some(container) = &self.container {
            elements.push(container.clone());
        }
        for set in &self.entity_sets {
            elements.push(set.element.clone());
        }
        for (idx, entity_type) in self.entity_types.iter().enumerate() {
            self.entity_type_index.insert(entity_type.element.fqn.clone(), idx);
            elements.push(entity_type.element.clone());
            elements.extend(entity_type.properties.iter().map(|p| p.element.clone()));
            elements.extend(entity_type.navigation_properties.iter().map(|n| n.element.clone()));
        }
        for (idx, complex_type) in self.complex_types.iter().enumerate() {
            self.complex_type_index.insert(complex_type.element.fqn.clone(), idx);
            elements.push(complex_type.element.clone());
            elements.extend(complex_type.properties.iter().map(|p| p.element.clone()));
            elements.extend(complex_type.navigation_properties.iter().map(|n| n.element.clone()));
        }
        for action in &self.actions {
            elements.push(action.element.clone());
            elements.extend(action.parameters.iter().map(|p| p.element.clone()));
            self.action_map
                .entry(SmolStr::new(strip_signature(&action.element.fqn)))
                .or_default()
                .insert(action.element.fqn.clone());
        }

        for element in elements {
            if let Some(namespace) = namespace_of(&element.fqn) {
                if !self.namespaces.contains(namespace) {
                    self.namespaces.insert(SmolStr::new(namespace));
                }
            }
            let fqn = element.fqn.clone();
            if self.lookup_map.insert(fqn.clone(), element).is_some() {
                self.duplicates.push(fqn);
            }
        }

        for entity_type in &self.entity_types {
            let targets = self
                .navigation_source_map
                .entry(entity_type.element.fqn.clone())
                .or_default();
            for nav in &entity_type.navigation_properties {
                targets
                    .entry(nav.target_type_name.clone())
                    .or_default()
                    .insert(
                        nav.element.name.clone(),
                        NavigationEdge {
                            is_collection: nav.element.is_collection,
                        },
                    );
            }
        }

        // Container/Set/... paths branch into the entity type of the set.
        if let Some(container) = &self.container {
            let targets = self
                .navigation_source_map
                .entry(container.fqn.clone())
                .or_default();
            for set in &self.entity_sets {
                targets
                    .entry(set.entity_type_name.clone())
                    .or_default()
                    .insert(set.element.name.clone(), NavigationEdge { is_collection: true });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The schema namespace and alias.
    pub fn schema(&self) -> &SchemaNamespace {
        &self.schema
    }

    /// The schema namespace.
    pub fn namespace(&self) -> &str {
        &self.schema.namespace
    }

    /// Resolve a user-written name against this service's namespace.
    pub fn resolve_name(&self, name: &str) -> ResolvedName {
        self.schema.resolve(name)
    }

    pub fn container(&self) -> Option<&MetadataElement> {
        self.container.as_ref()
    }

    pub fn entity_types(&self) -> &[EntityType] {
        &self.entity_types
    }

    pub fn complex_types(&self) -> &[ComplexType] {
        &self.complex_types
    }

    pub fn entity_sets(&self) -> &[EntitySet] {
        &self.entity_sets
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Get an entity type by FQN.
    pub fn entity_type(&self, fqn: &str) -> Option<&EntityType> {
        self.entity_type_index.get(fqn).map(|&idx| &self.entity_types[idx])
    }

    /// Get a complex type by FQN.
    pub fn complex_type(&self, fqn: &str) -> Option<&ComplexType> {
        self.complex_type_index.get(fqn).map(|&idx| &self.complex_types[idx])
    }

    /// Get an entity set by simple name.
    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.iter().find(|s| s.element.name == name)
    }

    /// Look up any element by FQN.
    pub fn lookup(&self, fqn: &str) -> Option<&MetadataElement> {
        self.lookup_map.get(fqn)
    }

    /// Check if an element with this FQN exists.
    pub fn contains(&self, fqn: &str) -> bool {
        self.lookup_map.contains_key(fqn)
    }

    /// Iterate over all indexed elements (unordered).
    pub fn elements(&self) -> impl Iterator<Item = &MetadataElement> {
        self.lookup_map.values()
    }

    /// Overload FQNs of an action, keyed by FQN without signature.
    pub fn action_overloads(&self, name: &str) -> Option<&IndexSet<SmolStr>> {
        self.action_map.get(strip_signature(name))
    }

    /// Navigation targets reachable from `source` in one step.
    pub fn navigation_targets(&self, source: &str) -> Option<&NavigationTargets> {
        self.navigation_source_map.get(source)
    }

    /// The full navigation-source map.
    pub fn navigation_source_map(&self) -> &IndexMap<SmolStr, NavigationTargets> {
        &self.navigation_source_map
    }

    /// Namespaces appearing in element FQNs.
    pub fn namespaces(&self) -> &IndexSet<SmolStr> {
        &self.namespaces
    }

    /// Get the number of indexed elements.
    pub fn len(&self) -> usize {
        self.lookup_map.len()
    }

    /// Check if the metadata has no elements.
    pub fn is_empty(&self) -> bool {
        self.lookup_map.is_empty()
    }

    // ------------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------------

    /// Report structural inconsistencies.
    ///
    /// Cache building tolerates every problem listed here by skipping the
    /// offending element.
    pub fn validate(&self) -> Vec<PathError> {
        let mut errors: Vec<PathError> = self
            .duplicates
            .iter()
            .map(|fqn| PathError::DuplicateElement(fqn.clone()))
            .collect();

        let navigations = self
            .entity_types
            .iter()
            .flat_map(|t| t.navigation_properties.iter().map(move |n| (&t.element, n)))
            .chain(
                self.complex_types
                    .iter()
                    .flat_map(|t| t.navigation_properties.iter().map(move |n| (&t.element, n))),
            );
        for (owner, nav) in navigations {
            if self.entity_type(&nav.target_type_name).is_none() {
                errors.push(PathError::missing_navigation_target(
                    owner.fqn.clone(),
                    nav.element.name.clone(),
                    nav.target_type_name.clone(),
                ));
            }
        }

        let properties = self
            .entity_types
            .iter()
            .flat_map(|t| t.properties.iter())
            .chain(self.complex_types.iter().flat_map(|t| t.properties.iter()));
        for property in properties {
            if let Some(complex) = property.complex_type() {
                if self.complex_type(complex).is_none() {
                    errors.push(PathError::missing_structured_type(
                        property.element.fqn.clone(),
                        complex,
                    ));
                }
            }
        }

        for set in &self.entity_sets {
            if self.entity_type(&set.entity_type_name).is_none() {
                errors.push(PathError::missing_structured_type(
                    set.element.fqn.clone(),
                    set.entity_type_name.clone(),
                ));
            }
        }

        errors
    }
}
