//! Configuration composer
//!
//! Merges three sources with fixed precedence:
//!
//! 1. the instance default configuration (lowest)
//! 2. the persisted story settings, with step settings overriding only
//!    visibility, active tool and viewpoint
//! 3. ad-hoc request parameters (preview requests, no persisted settings)
//!
//! and then runs the applicable feature plugins. Composition only reads its
//! collaborators; caching is left to the caller.

use crate::error::{ComposeError, ComposeResult, LookupError};
use crate::feature::{FeatureRegistry, PluginRequest};
use crate::keys;
use crate::output::{content_fingerprint, ComposedConfig, ScriptAugmentation, StructuredConfig};
use crate::request::{AdHocSelection, RequestContext, RequestInfo};
use crate::resolver::LayerResolver;
use crate::source::{InstanceStore, LayerCatalog, SettingsStore};
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use storymap_model::{
    shallow_merge, Channel, FeatureSelection, InstanceId, LayerCatalogEntry,
    LayerChannel, LayerRef, SettingsDocument, StepId, StoryId, ToolSelection, ViewpointConfig,
};

/// Reserved story navigation tool
pub const STORY_NAVIGATOR_TOOL: &str = "storyNavigator";
/// Reserved story index tool
pub const STORY_INDEX_TOOL: &str = "storyIndex";
/// Default feature id that switches a step to the 3D viewpoint
pub const DEFAULT_THREE_D_FEATURE: &str = "threedimensional";
/// Default route of the story index page
pub const DEFAULT_STORY_INDEX_ROUTE: &str = "/stories";

/// Composer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Route appended to the request origin for `storyIndex.url`
    pub story_index_route: String,
    /// Feature id selecting the 3D viewpoint for a step
    pub three_d_feature: String,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            story_index_route: DEFAULT_STORY_INDEX_ROUTE.to_string(),
            three_d_feature: DEFAULT_THREE_D_FEATURE.to_string(),
        }
    }
}

impl ComposeOptions {
    /// Set story index route
    #[must_use]
    pub fn with_story_index_route(mut self, route: impl Into<String>) -> Self {
        self.story_index_route = route.into();
        self
    }

    /// Set 3D feature id
    #[must_use]
    pub fn with_three_d_feature(mut self, id: impl Into<String>) -> Self {
        self.three_d_feature = id.into();
        self
    }
}

/// Everything a request resolves to before output is built
#[derive(Debug)]
struct Resolved {
    channels: Vec<LayerChannel>,
    /// Replace the instance's channel in the layer tree
    replace: [bool; 2],
    tools: ToolSelection,
    active_tool: Option<String>,
    enabled_features: FeatureSelection,
    active_features: FeatureSelection,
    viewpoint: Option<ViewpointConfig>,
}

/// Composes map widget configurations
pub struct Composer {
    settings: Arc<dyn SettingsStore>,
    instances: Arc<dyn InstanceStore>,
    resolver: LayerResolver,
    features: FeatureRegistry,
    options: ComposeOptions,
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("features", &self.features)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Composer {
    /// Create composer over its collaborators
    pub fn new(
        catalog: Arc<dyn LayerCatalog>,
        settings: Arc<dyn SettingsStore>,
        instances: Arc<dyn InstanceStore>,
        features: FeatureRegistry,
    ) -> Self {
        Self {
            settings,
            instances,
            resolver: LayerResolver::new(catalog),
            features,
            options: ComposeOptions::default(),
        }
    }

    /// Set composer options
    #[must_use]
    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    /// Composer options
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    /// Registered feature plugins
    #[inline]
    #[must_use]
    pub fn features(&self) -> &FeatureRegistry {
        &self.features
    }

    /// Layer resolver over the composer's catalog
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &LayerResolver {
        &self.resolver
    }

    /// Settings store
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Story index URL for the origin of a request
    ///
    /// The URL depends on the request, not on the cache key, so cached
    /// configurations are re-pointed with
    /// [`ComposedConfig::set_story_index_url`] before they are served.
    #[must_use]
    pub fn story_index_url(&self, info: &RequestInfo) -> String {
        format!("{}{}", info.origin(), self.options.story_index_route)
    }

    /// Resolve the request mode from the query, then compose
    ///
    /// # Errors
    /// See [`RequestContext::from_query`] and [`Composer::compose`].
    pub fn compose_request(
        &self,
        instance_id: &InstanceId,
        info: &RequestInfo,
    ) -> ComposeResult<ComposedConfig> {
        let context = RequestContext::from_query(&info.query)?;
        self.compose(instance_id, &context, info)
    }

    /// Compose the configuration of one map widget
    ///
    /// # Errors
    /// - [`ComposeError::Lookup`] when the instance, story settings or step
    ///   settings are absent or a collaborator fails
    /// - [`ComposeError::InvalidLayerPatch`] when a stored layer patch is not
    ///   a JSON object
    pub fn compose(
        &self,
        instance_id: &InstanceId,
        context: &RequestContext,
        info: &RequestInfo,
    ) -> ComposeResult<ComposedConfig> {
        let instance = LookupError::require(
            self.instances.instance(instance_id)?,
            "instance",
            instance_id,
        )?;

        let resolved = match context {
            RequestContext::AdHoc(selection) => Self::resolve_ad_hoc(selection),
            RequestContext::Persisted { story_id, step_id } => {
                self.resolve_persisted(*story_id, *step_id)?
            }
        };

        // Every catalog id in use, background first
        let layer_ids: IndexSet<&str> = resolved
            .channels
            .iter()
            .flat_map(LayerChannel::atomic_ids)
            .collect();

        let mut definitions = self
            .resolver
            .resolve_definitions(layer_ids.iter(), &info.query.passthrough())?;
        let catalog_names: HashMap<String, String> = definitions
            .iter()
            .map(|d| (d.id.clone(), d.name.clone()))
            .collect();

        let mut script = ScriptAugmentation::new(instance.script);
        let mut structured = StructuredConfig::new(instance.structured);

        self.apply_layer_tree(&mut structured, instance_id, &resolved, &catalog_names)?;
        apply_display_names(&mut definitions, &resolved.channels);
        self.apply_tools(&mut structured, &resolved, info);
        if let Some(viewpoint) = &resolved.viewpoint {
            structured
                .object_at_mut(&["mapView"])
                .insert("viewpoint".to_string(), viewpoint_json(viewpoint));
        }

        let plugin_request = PluginRequest {
            info,
            context,
            instance_id,
            active_features: &resolved.active_features,
            viewpoint: resolved.viewpoint.as_ref(),
        };
        for plugin in self.features.active_for(context, &resolved.enabled_features) {
            tracing::debug!(feature = plugin.id(), "applying feature plugin");
            plugin.mutate_script(&mut script, &plugin_request);
            plugin.mutate_structured(&mut structured, &plugin_request);
        }

        let cache_key =
            keys::config_cache_key(instance_id, context.story_id(), context.step_id());
        let cache_tags = cache_tags(instance_id, context, &layer_ids);
        let fingerprint = content_fingerprint(&script, &structured, &definitions);

        tracing::info!(
            instance = %instance_id,
            key = %cache_key,
            layers = definitions.len(),
            fingerprint = fingerprint.short(),
            "composed map configuration"
        );

        Ok(ComposedConfig {
            script_augmentation: script,
            structured_config: structured,
            layer_definitions: definitions,
            cache_key,
            cache_tags,
            fingerprint,
        })
    }

    fn resolve_ad_hoc(selection: &AdHocSelection) -> Resolved {
        let channel = |channel, layers: &[LayerRef]| {
            LayerChannel::new(
                channel,
                layers.iter().cloned(),
                selection.visible.iter().cloned(),
                IndexMap::new(),
            )
        };
        let background = channel(Channel::Background, &selection.background);
        let foreground = channel(Channel::Foreground, &selection.foreground);

        let tools = selection
            .tools
            .iter()
            .fold(ToolSelection::new(), |tools, id| tools.with_tool(id.clone(), json!({})));

        Resolved {
            replace: [!background.is_empty(), !foreground.is_empty()],
            channels: vec![background, foreground],
            tools,
            active_tool: None,
            enabled_features: FeatureSelection::default(),
            active_features: FeatureSelection::default(),
            viewpoint: None,
        }
    }

    fn resolve_persisted(&self, story_id: StoryId, step_id: Option<StepId>) -> ComposeResult<Resolved> {
        let story = LookupError::require(
            self.settings.story_settings(story_id)?,
            "story settings",
            story_id,
        )?;
        let step: Option<SettingsDocument> = match step_id {
            Some(step_id) => Some(LookupError::require(
                self.settings.step_settings(step_id)?,
                "step settings",
                step_id,
            )?),
            None => None,
        };

        let channels = Channel::ALL
            .iter()
            .map(|&channel| {
                let resolved = LayerChannel::from_settings(channel, story.channel(channel));
                match &step {
                    Some(step) => {
                        let step_channel = step.channel(channel);
                        let dropped = step_channel
                            .selected
                            .iter()
                            .filter(|layer| !resolved.selected().contains(layer))
                            .count();
                        if dropped > 0 {
                            tracing::debug!(%channel, dropped, "ignoring layers selected only by the step");
                        }
                        resolved.with_visible(step_channel.visible.iter().cloned())
                    }
                    None => resolved,
                }
            })
            .collect();

        let active_features = step
            .as_ref()
            .map(|step| step.features.clone())
            .unwrap_or_default();
        let three_d = active_features.contains(&self.options.three_d_feature);
        let viewpoint = ViewpointConfig::select(
            three_d,
            step.as_ref().map(|step| &step.viewpoint),
            Some(&story.viewpoint),
        );

        Ok(Resolved {
            channels,
            replace: [true, true],
            active_tool: step
                .as_ref()
                .and_then(SettingsDocument::active_tool)
                .map(str::to_string),
            tools: story.tools,
            enabled_features: story.features,
            active_features,
            viewpoint,
        })
    }

    fn apply_layer_tree(
        &self,
        structured: &mut StructuredConfig,
        instance_id: &InstanceId,
        resolved: &Resolved,
        catalog_names: &HashMap<String, String>,
    ) -> ComposeResult<()> {
        let previous = match structured.0.remove("layerTree") {
            Some(JsonValue::Object(map)) => map,
            _ => Map::new(),
        };

        let mut tree = Map::new();
        for (channel, replace) in resolved.channels.iter().zip(resolved.replace) {
            let key = channel.channel().as_str();
            if replace {
                let entries = channel
                    .selected()
                    .iter()
                    .filter_map(|layer| {
                        self.layer_entry(instance_id, channel, layer, catalog_names)
                            .transpose()
                    })
                    .collect::<ComposeResult<Vec<_>>>()?;
                tree.insert(key.to_string(), JsonValue::Array(entries));
            } else if let Some(kept) = previous.get(key) {
                tree.insert(key.to_string(), kept.clone());
            }
        }
        for (key, value) in previous {
            if !tree.contains_key(&key) {
                tree.insert(key, value);
            }
        }

        structured
            .0
            .insert("layerTree".to_string(), JsonValue::Object(tree));
        Ok(())
    }

    /// Structured entry of one selected layer, `None` when the catalog knows
    /// none of its ids
    fn layer_entry(
        &self,
        instance_id: &InstanceId,
        channel: &LayerChannel,
        layer: &LayerRef,
        catalog_names: &HashMap<String, String>,
    ) -> ComposeResult<Option<JsonValue>> {
        if !layer.atomic_ids().any(|id| catalog_names.contains_key(id)) {
            tracing::debug!(layer = %layer, "skipping layer unknown to the catalog");
            return Ok(None);
        }

        let mut entry = Map::new();
        entry.insert("id".to_string(), layer.to_json_id());
        if let LayerRef::Single(id) = layer {
            if let Some(name) = catalog_names.get(id) {
                entry.insert("name".to_string(), JsonValue::from(name.as_str()));
            }
        }

        if let Some(overrides) = channel.override_for(layer) {
            if let Some(name) = overrides.display_name() {
                entry.insert("name".to_string(), JsonValue::from(name));
                entry.insert("layerAttribution".to_string(), JsonValue::from(name));
            }
            let patch = overrides
                .patch()
                .map_err(|reason| ComposeError::InvalidLayerPatch {
                    instance: instance_id.clone(),
                    layer: layer.key(),
                    reason,
                })?;
            if let Some(patch) = patch {
                shallow_merge(&mut entry, &patch);
            }
        }

        // Last, so a patch can not make a layer visible
        entry.insert(
            "visibility".to_string(),
            JsonValue::Bool(channel.is_visible(layer)),
        );
        Ok(Some(JsonValue::Object(entry)))
    }

    fn apply_tools(&self, structured: &mut StructuredConfig, resolved: &Resolved, info: &RequestInfo) {
        let instance_tools = match structured.pointer(&["menu", "tools"]) {
            Some(JsonValue::Object(tools)) => tools.clone(),
            _ => Map::new(),
        };

        let mut tools = if resolved.tools.is_empty() {
            instance_tools.clone()
        } else {
            resolved
                .tools
                .iter()
                .map(|(id, stored)| {
                    let mut config = object_or_empty(instance_tools.get(id));
                    if let JsonValue::Object(stored) = stored {
                        shallow_merge(&mut config, stored);
                    }
                    (id.clone(), JsonValue::Object(config))
                })
                .collect()
        };

        for (id, defaults) in reserved_tool_defaults() {
            let mut config = defaults;
            if let Some(JsonValue::Object(instance)) = instance_tools.get(id) {
                shallow_merge(&mut config, instance);
            }
            if let Some(JsonValue::Object(stored)) = resolved.tools.get(id) {
                shallow_merge(&mut config, stored);
            }
            if id == STORY_INDEX_TOOL {
                config.insert("url".to_string(), JsonValue::from(self.story_index_url(info)));
            }
            tools.insert(id.to_string(), JsonValue::Object(config));
        }

        if let Some(active) = &resolved.active_tool {
            match tools.get_mut(active) {
                Some(JsonValue::Object(config)) => {
                    config.insert("active".to_string(), JsonValue::Bool(true));
                }
                _ => tracing::debug!(tool = %active, "active tool is not in the tool menu"),
            }
        }

        structured
            .object_at_mut(&["menu"])
            .insert("tools".to_string(), JsonValue::Object(tools));
    }
}

fn reserved_tool_defaults() -> [(&'static str, Map<String, JsonValue>); 2] {
    [
        (
            STORY_NAVIGATOR_TOOL,
            object_or_empty(Some(&json!({
                "name": "Story",
                "icon": "bi-signpost-split",
                "renderToWindow": false
            }))),
        ),
        (
            STORY_INDEX_TOOL,
            object_or_empty(Some(&json!({
                "name": "All stories",
                "icon": "bi-collection",
                "url": ""
            }))),
        ),
    ]
}

fn object_or_empty(value: Option<&JsonValue>) -> Map<String, JsonValue> {
    match value {
        Some(JsonValue::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn viewpoint_json(viewpoint: &ViewpointConfig) -> JsonValue {
    match viewpoint {
        ViewpointConfig::TwoD { center, zoom_level } => json!({
            "mode": "2D",
            "center": center,
            "zoomLevel": zoom_level,
        }),
        ViewpointConfig::ThreeD {
            camera_position,
            heading,
            pitch,
        } => json!({
            "mode": "3D",
            "cameraPosition": camera_position,
            "heading": heading,
            "pitch": pitch,
        }),
    }
}

/// Display-name overrides of single layers also rename their definitions
fn apply_display_names(definitions: &mut [LayerCatalogEntry], channels: &[LayerChannel]) {
    let mut names: HashMap<&str, &str> = HashMap::new();
    for channel in channels {
        for layer in channel.selected() {
            if let (LayerRef::Single(id), Some(name)) = (
                layer,
                channel.override_for(layer).and_then(|o| o.display_name()),
            ) {
                names.entry(id.as_str()).or_insert(name);
            }
        }
    }
    for definition in definitions {
        if let Some(name) = names.get(definition.id.as_str()) {
            definition.name = (*name).to_string();
        }
    }
}

fn cache_tags(
    instance_id: &InstanceId,
    context: &RequestContext,
    layer_ids: &IndexSet<&str>,
) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    tags.insert(keys::instance_tag(instance_id));
    tags.extend(layer_ids.iter().map(|id| keys::layer_tag(instance_id, id)));
    if let Some(story) = context.story_id() {
        tags.insert(keys::story_tag(story));
    }
    if let Some(step) = context.step_id() {
        tags.insert(keys::step_tag(step));
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewpoint_json_matches_serde_shape() {
        let vp = ViewpointConfig::ThreeD {
            camera_position: [1.0, 2.0, 3.0],
            heading: 0.1,
            pitch: -0.2,
        };
        assert_eq!(viewpoint_json(&vp), serde_json::to_value(&vp).unwrap());

        let vp = ViewpointConfig::TwoD {
            center: [7.0, 50.0],
            zoom_level: 9,
        };
        assert_eq!(viewpoint_json(&vp), serde_json::to_value(&vp).unwrap());
    }

    #[test]
    fn tags_cover_instance_layers_story_and_step() {
        let main = InstanceId::new("main");
        let ids: IndexSet<&str> = ["10", "11"].into_iter().collect();
        let tags = cache_tags(&main, &RequestContext::step(StoryId(3), StepId(8)), &ids);

        let expected: BTreeSet<String> = [
            "instance:main",
            "main:layer:10",
            "main:layer:11",
            "node:3",
            "story_step:8",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        assert_eq!(tags, expected);
    }

    #[test]
    fn display_names_rename_single_definitions_only() {
        let mut overrides = IndexMap::new();
        overrides.insert(
            "1".to_string(),
            storymap_model::LayerOverride {
                display_name: Some("Roads".into()),
                json_patch: None,
            },
        );
        overrides.insert(
            r#"["2","3"]"#.to_string(),
            storymap_model::LayerOverride {
                display_name: Some("Districts".into()),
                json_patch: None,
            },
        );
        let channel = LayerChannel::new(
            Channel::Foreground,
            vec![LayerRef::single("1"), LayerRef::group(["2", "3"])],
            Vec::new(),
            overrides,
        );
        let mut defs = vec![
            LayerCatalogEntry::new("1", "Streets", "u", "WMS"),
            LayerCatalogEntry::new("2", "A", "u", "WMS"),
        ];

        apply_display_names(&mut defs, &[channel]);
        assert_eq!(defs[0].name, "Roads");
        assert_eq!(defs[1].name, "A");
    }
}
