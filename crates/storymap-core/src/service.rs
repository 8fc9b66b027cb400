//! Service facade
//!
//! Wires the composer and the story builder to their collaborators and to
//! two tagged caches, one for composed configurations and one for story
//! structures. Invalidation by tag reaches both.

use crate::config::ServiceConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use storymap_cache::{CacheStats, TaggedCache};
use storymap_compose::{
    keys, ComposedConfig, Composer, FeatureRegistry, InstanceStore, LayerCatalog,
    QueryParams, RequestContext, RequestInfo, SettingsStore,
};
use storymap_model::{InstanceId, LayerCatalogEntry, StoryId};
use storymap_story::{StoryBuilder, StoryStore, StoryStructure};

/// Statistics of both service caches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    /// Composed configuration cache
    pub configurations: CacheSummary,
    /// Story structure cache
    pub structures: CacheSummary,
}

/// Serializable cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    /// Stored entries
    pub entries: u64,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that computed
    pub misses: u64,
    /// Tags with recorded keys
    pub tags: usize,
}

impl From<CacheStats> for CacheSummary {
    fn from(stats: CacheStats) -> Self {
        Self {
            entries: stats.entry_count,
            hits: stats.hits,
            misses: stats.misses,
            tags: stats.tag_count,
        }
    }
}

/// Collaborators the service reads from
#[derive(Clone)]
pub struct Backends {
    /// Layer catalog
    pub catalog: Arc<dyn LayerCatalog>,
    /// Story and step settings
    pub settings: Arc<dyn SettingsStore>,
    /// Instance defaults
    pub instances: Arc<dyn InstanceStore>,
    /// Story records
    pub stories: Arc<dyn StoryStore>,
}

impl Backends {
    /// Use one value for every collaborator
    pub fn shared<B>(backend: Arc<B>) -> Self
    where
        B: LayerCatalog + SettingsStore + InstanceStore + StoryStore + 'static,
    {
        Self {
            catalog: backend.clone(),
            settings: backend.clone(),
            instances: backend.clone(),
            stories: backend,
        }
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

/// storymap service
#[derive(Debug)]
pub struct StoryMapService {
    composer: Composer,
    stories: StoryBuilder,
    configurations: TaggedCache<Arc<ComposedConfig>>,
    structures: TaggedCache<Arc<StoryStructure>>,
    config: ServiceConfig,
}

impl StoryMapService {
    /// Create service
    pub fn new(config: ServiceConfig, backends: Backends, features: FeatureRegistry) -> Self {
        let composer = Composer::new(
            backends.catalog,
            backends.settings.clone(),
            backends.instances,
            features,
        )
        .with_options(config.compose_options());
        let stories = StoryBuilder::new(
            backends.stories,
            backends.settings,
            config.three_d_feature.clone(),
        );

        tracing::info!(
            cache_capacity = config.cache_capacity,
            features = composer.features().len(),
            "storymap service ready"
        );

        Self {
            composer,
            stories,
            configurations: TaggedCache::new(config.cache_capacity),
            structures: TaggedCache::new(config.cache_capacity),
            config,
        }
    }

    /// Service configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Registered feature plugins
    #[inline]
    #[must_use]
    pub fn features(&self) -> &FeatureRegistry {
        self.composer.features()
    }

    /// Compose the map configuration for a request
    ///
    /// Persisted compositions are cached under their cache key. Ad-hoc
    /// compositions are cached only when they select nothing, and requests
    /// with passthrough parameters are never cached, since the key encodes
    /// neither. `noCache` recomputes and restores. The request origin is not
    /// part of the key; a cached configuration served to another origin is a
    /// copy with its story index URL re-pointed.
    ///
    /// # Errors
    /// Returns [`StoryMapError::Compose`](crate::StoryMapError::Compose) for
    /// malformed requests and failed lookups. Nothing is cached on error.
    pub fn compose_map_configuration(
        &self,
        instance_id: &InstanceId,
        request: &RequestInfo,
    ) -> Result<Arc<ComposedConfig>> {
        let context = RequestContext::from_query(&request.query)?;

        let cacheable = request.query.passthrough().is_empty()
            && match &context {
                RequestContext::AdHoc(selection) => selection.is_empty(),
                RequestContext::Persisted { .. } => true,
            };
        if !cacheable {
            tracing::debug!(instance = %instance_id, "request not representable by a cache key, bypassing cache");
            return Ok(Arc::new(self.composer.compose(instance_id, &context, request)?));
        }

        let key = keys::config_cache_key(instance_id, context.story_id(), context.step_id());
        let no_cache = request.no_cache();

        let mut composed = self.configurations.try_get_or_compute_tagged(&key, no_cache, || {
            let composed = self.composer.compose(instance_id, &context, request)?;
            let tags = composed.tag_list();
            Ok::<_, storymap_compose::ComposeError>((Arc::new(composed), tags))
        })?;

        // Cached entries keep the story index URL of the request that composed them
        let story_index_url = self.composer.story_index_url(request);
        if composed.story_index_url() != Some(story_index_url.as_str()) {
            tracing::debug!(key = %key, url = %story_index_url, "re-pointing story index for request origin");
            Arc::make_mut(&mut composed).set_story_index_url(story_index_url);
        }
        Ok(composed)
    }

    /// Resolve layer ids to catalog definitions with passthrough parameters
    ///
    /// # Errors
    /// Propagates catalog lookup failures.
    pub fn resolve_layer_definitions<I, S>(
        &self,
        layer_ids: I,
        params: &QueryParams,
    ) -> Result<Vec<LayerCatalogEntry>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self
            .composer
            .resolver()
            .resolve_definitions(layer_ids, &params.passthrough())?)
    }

    /// Public structure of a story, cached under `story-structure:<id>`
    ///
    /// # Errors
    /// Returns [`StoryMapError::Story`](crate::StoryMapError::Story) for
    /// failed lookups and inconsistent step lists.
    pub fn build_story_structure(&self, story_id: StoryId, no_cache: bool) -> Result<Arc<StoryStructure>> {
        let key = keys::story_structure_key(story_id);

        let structure = self.structures.try_get_or_compute_tagged(&key, no_cache, || {
            let structure = self.stories.build_story_structure(story_id)?;
            let tags = structure.cache_tags().into_iter().collect();
            Ok::<_, storymap_story::StoryError>((Arc::new(structure), tags))
        })?;
        Ok(structure)
    }

    /// Invalidate everything recorded under a tag in both caches
    ///
    /// Returns the number of removed keys.
    pub fn invalidate(&self, tag: &str) -> usize {
        let removed = self.configurations.invalidate(tag) + self.structures.invalidate(tag);
        tracing::info!(tag, removed, "invalidated cache tag");
        removed
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.configurations.invalidate_all();
        self.structures.invalidate_all();
    }

    /// Cache statistics
    #[must_use]
    pub fn stats(&self) -> ServiceStats {
        self.configurations.run_pending_tasks();
        self.structures.run_pending_tasks();
        ServiceStats {
            configurations: self.configurations.stats().into(),
            structures: self.structures.stats().into(),
        }
    }
}
