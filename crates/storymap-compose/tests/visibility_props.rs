use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use storymap_compose::{
    Composer, FeatureRegistry, InstanceStore, LayerCatalog, LookupError, MapInstance,
    QueryParams, RequestInfo, SettingsStore,
};
use storymap_model::{InstanceId, LayerCatalogEntry, SettingsDocument, StepId, StoryId};

struct Stores {
    story: SettingsDocument,
    step: SettingsDocument,
}

/// Every fourth id is missing from the catalog
fn in_catalog(id: &str) -> bool {
    id.parse::<u32>().is_ok_and(|n| n % 4 != 0)
}

impl LayerCatalog for Stores {
    fn get(&self, id: &str) -> Result<Option<LayerCatalogEntry>, LookupError> {
        Ok(in_catalog(id)
            .then(|| LayerCatalogEntry::new(id, format!("Layer {id}"), "https://tiles.example/wms", "WMS")))
    }
}

impl SettingsStore for Stores {
    fn story_settings(&self, _story: StoryId) -> Result<Option<SettingsDocument>, LookupError> {
        Ok(Some(self.story.clone()))
    }

    fn step_settings(&self, _step: StepId) -> Result<Option<SettingsDocument>, LookupError> {
        Ok(Some(self.step.clone()))
    }
}

impl InstanceStore for Stores {
    fn instance(&self, id: &InstanceId) -> Result<Option<MapInstance>, LookupError> {
        Ok(Some(MapInstance::new(id.clone())))
    }
}

fn layer_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec((1u32..20).prop_map(|n| n.to_string()), 0..8)
}

fn compose(story: SettingsDocument, step: SettingsDocument, query: &str) -> storymap_compose::ComposedConfig {
    let stores = Arc::new(Stores { story, step });
    Composer::new(stores.clone(), stores.clone(), stores, FeatureRegistry::new())
        .compose_request(
            &InstanceId::new("main"),
            &RequestInfo::new("https", "maps.example", QueryParams::parse(query)),
        )
        .unwrap()
}

fn first_occurrences(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for id in ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

fn known(ids: Vec<String>) -> Vec<String> {
    ids.into_iter().filter(|id| in_catalog(id)).collect()
}

fn entries(config: &storymap_compose::ComposedConfig, channel: &str) -> Vec<Value> {
    config
        .structured_config
        .pointer(&["layerTree", channel])
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

// Selected layers unknown to the catalog get no layer tree entry, so the
// visibility property quantifies over catalog-known ids only.
proptest! {
    #[test]
    fn prop_visible_entries_are_selected_and_order_is_kept(
        selected in layer_ids(),
        story_visible in layer_ids(),
        step_visible in layer_ids(),
        with_step in any::<bool>(),
    ) {
        let story: SettingsDocument = serde_json::from_value(json!({
            "foreground": {"selected": selected, "visible": story_visible}
        })).unwrap();
        let step: SettingsDocument = serde_json::from_value(json!({
            "foreground": {"selected": step_visible, "visible": step_visible}
        })).unwrap();

        let query = if with_step { "story=1&step=2" } else { "story=1" };
        let config = compose(story, step, query);
        let foreground = entries(&config, "foreground");

        let expected_order = known(first_occurrences(&selected));
        let ids: Vec<String> = foreground.iter().map(|e| e["id"].as_str().unwrap().to_string()).collect();
        prop_assert_eq!(&ids, &expected_order);

        let visible_source = if with_step { &step_visible } else { &story_visible };
        let visible: HashMap<String, bool> = foreground
            .iter()
            .map(|e| (e["id"].as_str().unwrap().to_string(), e["visibility"] == json!(true)))
            .collect();
        for id in &expected_order {
            prop_assert_eq!(visible[id], visible_source.contains(id), "{}", id);
        }
        for id in selected.iter().filter(|id| !in_catalog(id)) {
            prop_assert!(!visible.contains_key(id), "unknown layer {} has an entry", id);
        }
    }

    #[test]
    fn prop_ad_hoc_background_precedes_foreground(
        background in layer_ids(),
        foreground in layer_ids(),
    ) {
        let query = format!(
            "preview=1&BackgroundLayer={}&ForegroundLayer={}",
            background.join("/"),
            foreground.join("/"),
        );
        let config = compose(SettingsDocument::default(), SettingsDocument::default(), &query);

        let mut expected: Vec<String> = first_occurrences(&background);
        expected.extend(first_occurrences(&foreground));
        let expected = known(first_occurrences(&expected));

        let ids: Vec<&str> = config.layer_definitions.iter().map(|d| d.id.as_str()).collect();
        prop_assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(entries(&config, "background").len(), known(first_occurrences(&background)).len());
    }
}
