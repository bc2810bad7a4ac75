//! Schema conversion — turning schema definitions into [`Metadata`].
//!
//! [`SchemaDef`] is the plain description a metadata parser hands over:
//! simple names, declared type strings and binding targets. Conversion
//! qualifies every name into the schema namespace, classifies types,
//! expands navigation-property bindings and builds the lookup indices.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::{SmolStr, format_smolstr};
use tracing::{debug, warn};

use super::metadata::{
    Action, ActionParameter, BindingTarget, ComplexType, ElementKind, EntitySet, EntityType,
    Metadata, MetadataElement, NavigationProperty, Property,
};
use crate::base::SchemaNamespace;

const DEFAULT_CONTAINER: &str = "EntityContainer";

// ============================================================================
// DEFINITIONS
// ============================================================================

/// A service schema as delivered by a metadata parser.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct SchemaDef {
    pub namespace: SmolStr,
    pub alias: Option<SmolStr>,
    /// Entity container name; defaults to `EntityContainer`.
    pub container: Option<SmolStr>,
    pub entity_types: Vec<EntityTypeDef>,
    pub complex_types: Vec<ComplexTypeDef>,
    pub entity_sets: Vec<EntitySetDef>,
    pub actions: Vec<ActionDef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct EntityTypeDef {
    pub name: SmolStr,
    pub keys: Vec<SmolStr>,
    pub properties: Vec<PropertyDef>,
    pub navigation_properties: Vec<NavigationPropertyDef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ComplexTypeDef {
    pub name: SmolStr,
    pub properties: Vec<PropertyDef>,
    pub navigation_properties: Vec<NavigationPropertyDef>,
}

/// A property or parameter: name and declared type (`Edm.String`,
/// `Collection(Ex.Address)`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct PropertyDef {
    pub name: SmolStr,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub type_name: SmolStr,
}

impl PropertyDef {
    pub fn new(name: impl Into<SmolStr>, type_name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct NavigationPropertyDef {
    pub name: SmolStr,
    /// Target entity type; `Collection(..)` marks a to-many navigation.
    pub target_type: SmolStr,
    pub is_collection: bool,
    pub contains_target: bool,
}

impl NavigationPropertyDef {
    pub fn new(name: impl Into<SmolStr>, target_type: impl Into<SmolStr>, is_collection: bool) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
            is_collection,
            contains_target: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct EntitySetDef {
    pub name: SmolStr,
    pub entity_type: SmolStr,
    pub bindings: Vec<BindingDef>,
}

/// A navigation-property binding: binding path → target entity set name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BindingDef {
    pub path: SmolStr,
    pub target: SmolStr,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ActionDef {
    pub name: SmolStr,
    pub is_function: bool,
    /// Binding parameter type for bound actions.
    pub binding_type: Option<SmolStr>,
    pub parameters: Vec<PropertyDef>,
    pub return_type: Option<SmolStr>,
}

// ============================================================================
// BUILDER METHODS
// ============================================================================

impl SchemaDef {
    /// Create an empty schema definition.
    pub fn new(namespace: impl Into<SmolStr>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<SmolStr>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_container(mut self, name: impl Into<SmolStr>) -> Self {
        self.container = Some(name.into());
        self
    }

    pub fn with_entity_type(mut self, def: EntityTypeDef) -> Self {
        self.entity_types.push(def);
        self
    }

    pub fn with_complex_type(mut self, def: ComplexTypeDef) -> Self {
        self.complex_types.push(def);
        self
    }

    pub fn with_entity_set(mut self, def: EntitySetDef) -> Self {
        self.entity_sets.push(def);
        self
    }

    pub fn with_action(mut self, def: ActionDef) -> Self {
        self.actions.push(def);
        self
    }

    /// Convert into indexed metadata.
    pub fn into_metadata(self) -> Metadata {
        convert_schema(&self)
    }
}

impl EntityTypeDef {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, name: impl Into<SmolStr>) -> Self {
        self.keys.push(name.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<SmolStr>, type_name: impl Into<SmolStr>) -> Self {
        self.properties.push(PropertyDef::new(name, type_name));
        self
    }

    pub fn with_navigation(
        mut self,
        name: impl Into<SmolStr>,
        target_type: impl Into<SmolStr>,
        is_collection: bool,
    ) -> Self {
        self.navigation_properties
            .push(NavigationPropertyDef::new(name, target_type, is_collection));
        self
    }
}

impl ComplexTypeDef {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<SmolStr>, type_name: impl Into<SmolStr>) -> Self {
        self.properties.push(PropertyDef::new(name, type_name));
        self
    }
}

impl EntitySetDef {
    pub fn new(name: impl Into<SmolStr>, entity_type: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            bindings: Vec::new(),
        }
    }

    pub fn with_binding(mut self, path: impl Into<SmolStr>, target: impl Into<SmolStr>) -> Self {
        self.bindings.push(BindingDef {
            path: path.into(),
            target: target.into(),
        });
        self
    }
}

impl ActionDef {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn bound_to(mut self, binding_type: impl Into<SmolStr>) -> Self {
        self.binding_type = Some(binding_type.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<SmolStr>, type_name: impl Into<SmolStr>) -> Self {
        self.parameters.push(PropertyDef::new(name, type_name));
        self
    }
}

// ============================================================================
// CONVERSION
// ============================================================================

/// Classification of a declared type string.
#[derive(Clone, Debug, PartialEq, Eq)]
struct TypeInfo {
    qualified: SmolStr,
    is_collection: bool,
    primitive: bool,
    structured: Option<(SmolStr, bool)>,
}

struct Converter<'a> {
    def: &'a SchemaDef,
    schema: SchemaNamespace,
    entity_fqns: FxHashSet<SmolStr>,
    complex_fqns: FxHashSet<SmolStr>,
}

impl<'a> Converter<'a> {
    fn new(def: &'a SchemaDef) -> Self {
        let schema = SchemaNamespace {
            namespace: def.namespace.clone(),
            alias: def.alias.clone(),
        };
        let entity_fqns = def
            .entity_types
            .iter()
            .map(|t| format_smolstr!("{}.{}", def.namespace, t.name))
            .collect();
        let complex_fqns = def
            .complex_types
            .iter()
            .map(|t| format_smolstr!("{}.{}", def.namespace, t.name))
            .collect();
        Self {
            def,
            schema,
            entity_fqns,
            complex_fqns,
        }
    }

    /// Qualify a type reference; `Edm.*` and foreign names stay as written.
    fn qualify(&self, name: &str) -> SmolStr {
        if name.starts_with("Edm.") {
            return SmolStr::new(name);
        }
        SmolStr::new(self.schema.resolve(name).fqn_or_name())
    }

    fn type_info(&self, declared: &str) -> TypeInfo {
        let (inner, is_collection) = match declared
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => (inner, true),
            None => (declared, false),
        };
        let qualified = self.qualify(inner);
        let primitive = qualified.starts_with("Edm.");
        let structured = if self.complex_fqns.contains(&qualified) {
            Some((qualified.clone(), false))
        } else if self.entity_fqns.contains(&qualified) {
            Some((qualified.clone(), true))
        } else {
            None
        };
        TypeInfo {
            qualified,
            is_collection,
            primitive,
            structured,
        }
    }

    fn typed_element(&self, kind: ElementKind, owner: &str, name: &SmolStr, declared: &str) -> (MetadataElement, SmolStr) {
        let info = self.type_info(declared);
        let mut element = MetadataElement::new(kind, name.clone(), format_smolstr!("{owner}/{name}"))
            .with_collection(info.is_collection);
        if info.primitive {
            element = element.with_primitive_type(info.qualified.clone());
        }
        if let Some((fqn, is_entity)) = info.structured {
            element = element.with_structured_type(fqn, is_entity);
        }
        let type_name = if info.is_collection {
            format_smolstr!("Collection({})", info.qualified)
        } else {
            info.qualified
        };
        (element, type_name)
    }

    fn properties(&self, owner: &str, defs: &[PropertyDef]) -> Vec<Property> {
        defs.iter()
            .map(|def| {
                let (element, type_name) =
                    self.typed_element(ElementKind::Property, owner, &def.name, &def.type_name);
                Property { element, type_name }
            })
            .collect()
    }

    fn navigation_properties(&self, owner: &str, defs: &[NavigationPropertyDef]) -> Vec<NavigationProperty> {
        let mut result = Vec::new();
        for def in defs {
            let info = self.type_info(&def.target_type);
            if !self.entity_fqns.contains(&info.qualified) {
                warn!(
                    "[CONVERT] skipping navigation property {owner}/{}: unknown target {}",
                    def.name, info.qualified
                );
                continue;
            }
            let is_collection = def.is_collection || info.is_collection;
            let element = MetadataElement::new(
                ElementKind::NavigationProperty,
                def.name.clone(),
                format_smolstr!("{owner}/{}", def.name),
            )
            .with_collection(is_collection)
            .with_structured_type(info.qualified.clone(), true);
            result.push(NavigationProperty {
                element,
                target_type_name: info.qualified,
                contains_target: def.contains_target,
            });
        }
        result
    }

    fn entity_types(&self) -> Vec<EntityType> {
        self.def
            .entity_types
            .iter()
            .map(|def| {
                let fqn = format_smolstr!("{}.{}", self.def.namespace, def.name);
                let element = MetadataElement::new(ElementKind::EntityType, def.name.clone(), fqn.clone())
                    .with_collection(true)
                    .with_structured_type(fqn.clone(), true);
                EntityType {
                    element,
                    keys: def.keys.clone(),
                    properties: self.properties(&fqn, &def.properties),
                    navigation_properties: self.navigation_properties(&fqn, &def.navigation_properties),
                }
            })
            .collect()
    }

    fn complex_types(&self) -> Vec<ComplexType> {
        self.def
            .complex_types
            .iter()
            .map(|def| {
                let fqn = format_smolstr!("{}.{}", self.def.namespace, def.name);
                let element = MetadataElement::new(ElementKind::ComplexType, def.name.clone(), fqn.clone())
                    .with_structured_type(fqn.clone(), false);
                ComplexType {
                    element,
                    properties: self.properties(&fqn, &def.properties),
                    navigation_properties: self.navigation_properties(&fqn, &def.navigation_properties),
                }
            })
            .collect()
    }

    fn entity_sets(&self, container_fqn: &str) -> Vec<EntitySet> {
        let by_name: FxHashMap<&str, &EntitySetDef> = self
            .def
            .entity_sets
            .iter()
            .map(|set| (set.name.as_str(), set))
            .collect();

        self.def
            .entity_sets
            .iter()
            .map(|def| {
                let mut visited = FxHashSet::default();
                visited.insert(def.name.clone());
                self.entity_set(def, container_fqn, &by_name, &mut visited)
            })
            .collect()
    }

    /// Convert one set, expanding its bindings. Sets already in `visited`
    /// become back-references.
    fn entity_set(
        &self,
        def: &EntitySetDef,
        container_fqn: &str,
        by_name: &FxHashMap<&str, &EntitySetDef>,
        visited: &mut FxHashSet<SmolStr>,
    ) -> EntitySet {
        let entity_type_name = self.qualify(&def.entity_type);
        if !self.entity_fqns.contains(&entity_type_name) {
            warn!("[CONVERT] entity set {} has unknown type {}", def.name, entity_type_name);
        }
        let element = MetadataElement::new(
            ElementKind::EntitySet,
            def.name.clone(),
            format_smolstr!("{container_fqn}/{}", def.name),
        )
        .with_collection(true)
        .with_structured_type(entity_type_name.clone(), true);

        let mut navigation_bindings = IndexMap::new();
        for binding in &def.bindings {
            let target_name = binding.target.rsplit('/').next().unwrap_or(&binding.target);
            let Some(target) = by_name.get(target_name) else {
                warn!("[CONVERT] binding {}/{} targets unknown set {}", def.name, binding.path, binding.target);
                continue;
            };
            let bound = if visited.insert(target.name.clone()) {
                BindingTarget::Set(Box::new(self.entity_set(target, container_fqn, by_name, visited)))
            } else {
                BindingTarget::Cycle(format_smolstr!("{container_fqn}/{}", target.name))
            };
            navigation_bindings.insert(binding.path.clone(), bound);
        }

        EntitySet {
            element,
            entity_type_name,
            navigation_bindings,
        }
    }

    fn actions(&self) -> Vec<Action> {
        self.def
            .actions
            .iter()
            .map(|def| {
                let binding = def.binding_type.as_deref().map(|t| self.type_info(t));
                let signature = match &binding {
                    Some(info) if info.is_collection => format_smolstr!("Collection({})", info.qualified),
                    Some(info) => info.qualified.clone(),
                    None => SmolStr::default(),
                };
                let name = format_smolstr!("{}({signature})", def.name);
                let fqn = format_smolstr!("{}.{name}", self.def.namespace);
                let element = MetadataElement::new(ElementKind::Action, name, fqn.clone());
                let parameters = def
                    .parameters
                    .iter()
                    .map(|p| {
                        let (element, type_name) =
                            self.typed_element(ElementKind::ActionParameter, &fqn, &p.name, &p.type_name);
                        ActionParameter { element, type_name }
                    })
                    .collect();
                Action {
                    element,
                    is_bound: binding.is_some(),
                    is_function: def.is_function,
                    parameters,
                    return_type: def.return_type.as_deref().map(|t| self.qualify(t)),
                }
            })
            .collect()
    }
}

/// Convert a schema definition into indexed metadata.
pub fn convert_schema(def: &SchemaDef) -> Metadata {
    let converter = Converter::new(def);
    let container_name = def.container.clone().unwrap_or_else(|| SmolStr::new(DEFAULT_CONTAINER));
    let container_fqn = format_smolstr!("{}.{}", def.namespace, container_name);
    let container = MetadataElement::new(ElementKind::EntityContainer, container_name, container_fqn.clone());

    let metadata = Metadata::new(
        converter.schema.clone(),
        Some(container),
        converter.entity_types(),
        converter.complex_types(),
        converter.entity_sets(&container_fqn),
        converter.actions(),
    );
    debug!(
        "[CONVERT] {}: {} elements, {} entity types, {} entity sets",
        def.namespace,
        metadata.len(),
        metadata.entity_types().len(),
        metadata.entity_sets().len()
    );
    metadata
}
