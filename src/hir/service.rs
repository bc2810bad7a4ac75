//! Service registry — per-service metadata and path cache snapshots.
//!
//! Every service is published as an immutable [`ServiceDetails`] snapshot.
//! A rebuild constructs a new snapshot from scratch and swaps it in; queries
//! holding the previous `Arc` keep seeing a consistent service. Rebuilds are
//! serialized, so two updates never race on the same registry.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use smol_str::SmolStr;
use tracing::debug;

use super::annotations::{AnnotationList, group_annotation_lists};
use super::error::{PathError, PathResult};
use super::metadata::Metadata;
use super::path_cache::{CacheBuilder, CacheOptions, PathExpressions};
use super::resolve::{PathInfo, PathQuery, PathResolver, ResolveOptions};

/// One published service: metadata, grouped annotations and their caches.
#[derive(Debug)]
pub struct ServiceDetails {
    path: SmolStr,
    metadata: Metadata,
    annotations: Vec<AnnotationList>,
    caches: PathExpressions,
}

impl ServiceDetails {
    /// Group `annotations` and build the caches for `metadata`.
    pub fn build(
        path: impl Into<SmolStr>,
        metadata: Metadata,
        annotations: Vec<AnnotationList>,
        options: &CacheOptions,
    ) -> Self {
        let annotations = group_annotation_lists(metadata.schema(), annotations);
        let caches = CacheBuilder::new(&metadata)
            .with_options(options.clone())
            .build(&annotations);
        Self {
            path: path.into(),
            metadata,
            annotations,
            caches,
        }
    }

    /// The service path, e.g. `/sap/opu/odata/sap/PRODUCTS/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Annotation lists grouped by target.
    pub fn annotations(&self) -> &[AnnotationList] {
        &self.annotations
    }

    pub fn caches(&self) -> &PathExpressions {
        &self.caches
    }

    /// A resolver over this snapshot.
    ///
    /// The anchor is resolved against the service namespace, so `Product`,
    /// `Alias.Product` and `com.example.Product` all anchor at the same type.
    pub fn resolver(&self, anchor: Option<&str>, options: ResolveOptions) -> PathResult<PathResolver<'_>> {
        let resolver = PathResolver::new(&self.metadata, &self.caches).with_options(options);
        let Some(anchor) = anchor else {
            return Ok(resolver);
        };
        let resolved = self.metadata.resolve_name(anchor);
        match resolved.fqn {
            Some(fqn) if self.caches.lookup_target(&fqn).is_some() => Ok(resolver.with_anchor(fqn)),
            _ => Err(PathError::UnknownAnchor(SmolStr::new(anchor))),
        }
    }
}

/// Registry of published services, keyed by service path.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<IndexMap<SmolStr, Arc<ServiceDetails>>>,
    /// Held for the duration of a rebuild.
    rebuild: Mutex<()>,
    cache_options: CacheOptions,
    resolve_options: ResolveOptions,
}

impl ServiceRegistry {
    /// Create an empty registry with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_options(mut self, options: CacheOptions) -> Self {
        self.cache_options = options;
        self
    }

    pub fn with_resolve_options(mut self, options: ResolveOptions) -> Self {
        self.resolve_options = options;
        self
    }

    /// Rebuild and publish the snapshot for `path`.
    pub fn update(
        &self,
        path: impl Into<SmolStr>,
        metadata: Metadata,
        annotations: Vec<AnnotationList>,
    ) -> Arc<ServiceDetails> {
        let path = path.into();
        let _rebuild = self.rebuild.lock();

        let details = Arc::new(ServiceDetails::build(
            path.clone(),
            metadata,
            annotations,
            &self.cache_options,
        ));
        debug!(
            "[SERVICE] rebuilt {path}: {} elements, {} annotation targets",
            details.metadata.len(),
            details.annotations.len()
        );
        self.services.write().insert(path, Arc::clone(&details));
        details
    }

    /// Rebuild several services at once.
    ///
    /// Snapshots are built in parallel and published together, in input
    /// order.
    pub fn update_all(&self, services: Vec<(SmolStr, Metadata, Vec<AnnotationList>)>) -> Vec<Arc<ServiceDetails>> {
        let _rebuild = self.rebuild.lock();

        let built: Vec<Arc<ServiceDetails>> = services
            .into_par_iter()
            .map(|(path, metadata, annotations)| {
                Arc::new(ServiceDetails::build(path, metadata, annotations, &self.cache_options))
            })
            .collect();

        let mut services = self.services.write();
        for details in &built {
            services.insert(details.path.clone(), Arc::clone(details));
        }
        debug!("[SERVICE] rebuilt {} services", built.len());
        built
    }

    /// Rebuild `path` with new annotations and its current metadata.
    pub fn update_annotations(&self, path: &str, annotations: Vec<AnnotationList>) -> PathResult<Arc<ServiceDetails>> {
        let current = self.get(path)?;
        let metadata = current.metadata.clone();
        Ok(self.update(SmolStr::new(path), metadata, annotations))
    }

    /// The current snapshot for `path`.
    pub fn get(&self, path: &str) -> PathResult<Arc<ServiceDetails>> {
        self.services
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| PathError::UnknownService(SmolStr::new(path)))
    }

    /// Remove a service. Snapshots already handed out stay valid.
    pub fn remove(&self, path: &str) -> Option<Arc<ServiceDetails>> {
        let _rebuild = self.rebuild.lock();
        self.services.write().shift_remove(path)
    }

    /// Get the number of services.
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Check if no service is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of all registered services.
    pub fn services(&self) -> Vec<SmolStr> {
        self.services.read().keys().cloned().collect()
    }

    /// Complete `path` below `anchor` in service `service`.
    pub fn complete(&self, service: &str, anchor: Option<&str>, path: &str, query: &PathQuery) -> PathResult<PathInfo> {
        let details = self.get(service)?;
        let resolver = details.resolver(anchor, self.resolve_options.clone())?;
        Ok(resolver.complete(path, query))
    }

    /// Check `path` below `anchor` in service `service`.
    pub fn check(&self, service: &str, anchor: Option<&str>, path: &str, query: &PathQuery) -> PathResult<PathInfo> {
        let details = self.get(service)?;
        let resolver = details.resolver(anchor, self.resolve_options.clone())?;
        Ok(resolver.check(path, query))
    }
}
