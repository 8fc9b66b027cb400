//! Feature plugins and their registry
//!
//! Plugins are registered once at startup and run in registration order
//! after the base configuration is composed. A plugin sees the request and
//! may mutate the script augmentation and the structured configuration; it
//! never sees or changes the cache key or tags.

use crate::output::{ScriptAugmentation, StructuredConfig};
use crate::request::{RequestContext, RequestInfo};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use storymap_model::{FeatureSelection, InstanceId, ViewpointConfig};

/// What a plugin sees of the current composition
#[derive(Debug, Clone, Copy)]
pub struct PluginRequest<'a> {
    /// Incoming request
    pub info: &'a RequestInfo,
    /// Resolved request mode
    pub context: &'a RequestContext,
    /// Instance being composed
    pub instance_id: &'a InstanceId,
    /// Features active for the step (persisted mode with a step), else empty
    pub active_features: &'a FeatureSelection,
    /// Resolved viewpoint, if any
    pub viewpoint: Option<&'a ViewpointConfig>,
}

/// Optional map feature
///
/// Implementors must be stateless or internally synchronized; one plugin
/// value serves all requests concurrently.
pub trait MapFeaturePlugin: Send + Sync + Debug {
    /// Stable feature id, matched against story feature selections
    fn id(&self) -> &str;

    /// Whether the plugin runs for every ad-hoc (preview) request
    fn always_active_in_ad_hoc(&self) -> bool {
        false
    }

    /// Mutate the client-side script values
    fn mutate_script(&self, _script: &mut ScriptAugmentation, _request: &PluginRequest<'_>) {}

    /// Mutate the structured map configuration
    fn mutate_structured(&self, _config: &mut StructuredConfig, _request: &PluginRequest<'_>) {}
}

/// Public description of a registered plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDescriptor {
    /// Feature id
    pub id: String,
    /// Runs for every ad-hoc request
    pub always_active_in_ad_hoc: bool,
}

/// Ordered registry of feature plugins
#[derive(Debug, Default, Clone)]
pub struct FeatureRegistry {
    plugins: Vec<Arc<dyn MapFeaturePlugin>>,
}

impl FeatureRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin
    ///
    /// A plugin with an already registered id replaces the earlier one at
    /// its position.
    pub fn register(&mut self, plugin: Arc<dyn MapFeaturePlugin>) {
        match self.plugins.iter().position(|p| p.id() == plugin.id()) {
            Some(index) => {
                tracing::warn!(feature = plugin.id(), "replacing registered feature plugin");
                self.plugins[index] = plugin;
            }
            None => {
                tracing::debug!(feature = plugin.id(), "registered feature plugin");
                self.plugins.push(plugin);
            }
        }
    }

    /// Builder form of [`register`](Self::register)
    #[must_use]
    pub fn with_plugin(mut self, plugin: Arc<dyn MapFeaturePlugin>) -> Self {
        self.register(plugin);
        self
    }

    /// Descriptors in registration order
    #[must_use]
    pub fn list(&self) -> Vec<FeatureDescriptor> {
        self.plugins
            .iter()
            .map(|p| FeatureDescriptor {
                id: p.id().to_string(),
                always_active_in_ad_hoc: p.always_active_in_ad_hoc(),
            })
            .collect()
    }

    /// Check if a feature is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.plugins.iter().any(|p| p.id() == id)
    }

    /// Plugins that apply to a request, in registration order
    ///
    /// Ad-hoc requests get the always-active plugins; persisted requests get
    /// the plugins enabled in the story's feature selection.
    pub fn active_for<'a>(
        &'a self,
        context: &'a RequestContext,
        enabled: &'a FeatureSelection,
    ) -> impl Iterator<Item = &'a Arc<dyn MapFeaturePlugin>> + 'a {
        self.plugins.iter().filter(move |p| match context {
            RequestContext::AdHoc(_) => p.always_active_in_ad_hoc(),
            RequestContext::Persisted { .. } => enabled.contains(p.id()),
        })
    }

    /// Iterate plugins in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MapFeaturePlugin>> {
        self.plugins.iter()
    }

    /// Get number of registered plugins
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::AdHocSelection;
    use storymap_model::StoryId;

    #[derive(Debug)]
    struct Named(&'static str, bool);

    impl MapFeaturePlugin for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn always_active_in_ad_hoc(&self) -> bool {
            self.1
        }
    }

    fn registry() -> FeatureRegistry {
        FeatureRegistry::new()
            .with_plugin(Arc::new(Named("search", true)))
            .with_plugin(Arc::new(Named("threedimensional", false)))
            .with_plugin(Arc::new(Named("timeline", false)))
    }

    #[test]
    fn list_keeps_registration_order() {
        let ids: Vec<String> = registry().list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["search", "threedimensional", "timeline"]);
    }

    #[test]
    fn re_register_replaces_in_place() {
        let mut registry = registry();
        registry.register(Arc::new(Named("search", false)));

        assert_eq!(registry.len(), 3);
        let first = &registry.list()[0];
        assert_eq!(first.id, "search");
        assert!(!first.always_active_in_ad_hoc);
    }

    #[test]
    fn active_for_ad_hoc_uses_flag() {
        let registry = registry();
        let ctx = RequestContext::AdHoc(AdHocSelection::default());
        let enabled: FeatureSelection = ["timeline"].into_iter().collect();

        let ids: Vec<&str> = registry.active_for(&ctx, &enabled).map(|p| p.id()).collect();
        assert_eq!(ids, vec!["search"]);
    }

    #[test]
    fn active_for_persisted_uses_selection() {
        let registry = registry();
        let ctx = RequestContext::story(StoryId(1));
        let enabled: FeatureSelection = ["timeline", "threedimensional", "unknown"].into_iter().collect();

        let ids: Vec<&str> = registry.active_for(&ctx, &enabled).map(|p| p.id()).collect();
        assert_eq!(ids, vec!["threedimensional", "timeline"]);
    }
}
