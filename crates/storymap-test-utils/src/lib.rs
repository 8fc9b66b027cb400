//! Testing utilities for storymap workspace
//!
//! Shared fixtures, a recording feature plugin and service setup helpers.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use storymap_compose::{
    FeatureRegistry, MapFeaturePlugin, PluginRequest, QueryParams, RequestInfo,
    ScriptAugmentation, StructuredConfig,
};
use storymap_core::{Backends, MemoryBackend, ServiceConfig, StoryMapService};
use storymap_model::{InstanceId, StepId, StoryId};

/// The "River walk" fixture: instance `main`, story 42 with steps 7, 8 (child of 7) and 9
pub const FIXTURE_JSON: &str = include_str!("../../../demos/river-walk.json");

pub const STORY: StoryId = StoryId(42);
pub const FIRST_STEP: StepId = StepId(7);
pub const NESTED_STEP: StepId = StepId(8);
pub const LAST_STEP: StepId = StepId(9);

pub fn main_instance() -> InstanceId {
    InstanceId::new("main")
}

pub fn create_test_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::from_fixture_json(FIXTURE_JSON).unwrap())
}

pub fn setup_test_service(features: FeatureRegistry) -> (StoryMapService, Arc<MemoryBackend>) {
    let backend = create_test_backend();
    let service = StoryMapService::new(
        ServiceConfig::default(),
        Backends::shared(backend.clone()),
        features,
    );
    (service, backend)
}

pub fn request(query: &str) -> RequestInfo {
    RequestInfo::new("https", "maps.example.org", QueryParams::parse(query))
}

/// Feature plugin that records every invocation and marks the output
#[derive(Debug)]
pub struct RecordingPlugin {
    id: String,
    always_active_in_ad_hoc: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingPlugin {
    pub fn new(id: &str, always_active_in_ad_hoc: bool) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            always_active_in_ad_hoc,
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl MapFeaturePlugin for RecordingPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn always_active_in_ad_hoc(&self) -> bool {
        self.always_active_in_ad_hoc
    }

    fn mutate_script(&self, script: &mut ScriptAugmentation, request: &PluginRequest<'_>) {
        self.calls.lock().push(format!("script:{}", request.instance_id));
        script.set(format!("{}Enabled", self.id), json!(true));
    }

    fn mutate_structured(&self, config: &mut StructuredConfig, request: &PluginRequest<'_>) {
        self.calls.lock().push(format!("structured:{}", request.instance_id));
        config
            .object_at_mut(&["features"])
            .insert(self.id.clone(), json!({"is3D": request.viewpoint.is_some_and(|v| v.is_3d())}));
    }
}
