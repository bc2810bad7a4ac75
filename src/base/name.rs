//! Element name resolution — mapping user-written names to schema FQNs.
//!
//! Names in annotation targets, context paths and path expressions come in
//! three spellings that all denote the same element:
//!
//! - bare: `Product` or absolute `/Products`
//! - namespace-qualified: `com.example.Product`
//! - alias-qualified: `Ex.Product`
//!
//! [`resolve_element_name`] normalises all of them against the service's
//! namespace and alias. Resolution is pure and idempotent: resolving the
//! `fqn` of a resolved name yields the same result again.

use smol_str::{SmolStr, format_smolstr};

/// Namespace and optional alias of a service schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SchemaNamespace {
    /// Full namespace, e.g. `com.example`.
    pub namespace: SmolStr,
    /// Short alias, e.g. `Ex`.
    pub alias: Option<SmolStr>,
}

impl SchemaNamespace {
    /// Create a namespace without alias.
    pub fn new(namespace: impl Into<SmolStr>) -> Self {
        Self {
            namespace: namespace.into(),
            alias: None,
        }
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<SmolStr>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Whether `prefix` names this schema, either by namespace or by alias.
    pub fn matches(&self, prefix: &str) -> bool {
        self.namespace == prefix || self.alias.as_deref() == Some(prefix)
    }

    /// Resolve a name against this schema.
    pub fn resolve(&self, name: &str) -> ResolvedName {
        resolve_element_name(self, name)
    }

    /// Whether two spellings denote the same element.
    ///
    /// Names that both resolve are compared by FQN; otherwise only the
    /// exact same string matches.
    pub fn same_element(&self, a: &str, b: &str) -> bool {
        match (self.resolve(a).fqn, self.resolve(b).fqn) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        }
    }
}

/// Result of resolving a name against a [`SchemaNamespace`].
///
/// `namespace`, `alias`, `fqn` and `aliased_name` are only present when the
/// name could be placed in the schema. An unresolvable name keeps just
/// `name`, which is then the raw input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResolvedName {
    /// Name relative to the namespace, e.g. `Product/Name`.
    pub name: SmolStr,
    /// Namespace the name was placed in.
    pub namespace: Option<SmolStr>,
    /// Alias of that namespace, if any.
    pub alias: Option<SmolStr>,
    /// `namespace.name`.
    pub fqn: Option<SmolStr>,
    /// `alias.name`, when an alias exists.
    pub aliased_name: Option<SmolStr>,
}

impl ResolvedName {
    /// Whether the name was placed in the schema.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.fqn.is_some()
    }

    /// The FQN if resolved, otherwise the raw name.
    pub fn fqn_or_name(&self) -> &str {
        self.fqn.as_deref().unwrap_or(&self.name)
    }

    fn unresolved(name: &str) -> Self {
        Self {
            name: SmolStr::new(name),
            ..Self::default()
        }
    }

    fn placed(schema: &SchemaNamespace, name: SmolStr) -> Self {
        let fqn = format_smolstr!("{}.{}", schema.namespace, name);
        let aliased_name = schema
            .alias
            .as_ref()
            .map(|alias| format_smolstr!("{}.{}", alias, name));
        Self {
            name,
            namespace: Some(schema.namespace.clone()),
            alias: schema.alias.clone(),
            fqn: Some(fqn),
            aliased_name,
        }
    }
}

/// Resolve `name` against `schema`.
///
/// The name is split on `/`. An empty first segment (absolute path) stands
/// for the namespace itself. A dotted first segment is split at its last
/// dot into a qualifier and a simple name. A single remaining segment is a
/// bare name in the schema's namespace; otherwise the first segment must be
/// the namespace or the alias, and the rest is the relative name. A name
/// without any non-empty segment stays unresolved.
pub fn resolve_element_name(schema: &SchemaNamespace, name: &str) -> ResolvedName {
    if name.split('/').all(str::is_empty) {
        return ResolvedName::unresolved(name);
    }
    let mut segments: Vec<&str> = name.split('/').collect();

    if segments[0].is_empty() {
        segments[0] = schema.namespace.as_str();
    } else if let Some(dot) = segments[0].rfind('.') {
        let head = segments[0];
        segments[0] = &head[dot + 1..];
        segments.insert(0, &head[..dot]);
    }

    if segments.len() == 1 {
        return ResolvedName::placed(schema, SmolStr::new(segments[0]));
    }

    if !schema.matches(segments[0]) {
        return ResolvedName::unresolved(name);
    }

    ResolvedName::placed(schema, SmolStr::from(segments[1..].join("/")))
}

/// Namespace part of a fully qualified name.
///
/// Only the first path segment is considered, and an action signature in
/// parentheses is ignored: `com.example.approve(com.example.Product)/in`
/// has namespace `com.example`. Returns `None` for undotted names.
pub fn namespace_of(fqn: &str) -> Option<&str> {
    let head = fqn.split('/').next().unwrap_or(fqn);
    let head = head.split('(').next().unwrap_or(head);
    head.rfind('.').map(|dot| &head[..dot])
}

/// An action or function name without its overload signature.
///
/// `com.example.approve(com.example.Product)` becomes `com.example.approve`.
pub fn strip_signature(name: &str) -> &str {
    match name.find('(') {
        Some(open) => &name[..open],
        None => name,
    }
}
