use mockall::mock;
use mockall::predicate::eq;
use proptest::prelude::*;
use std::sync::Arc;
use storymap_compose::{FeatureRegistry, LookupError, SettingsStore};
use storymap_core::{Backends, ServiceConfig, StoryMapError, StoryMapService};
use storymap_model::{SettingsDocument, StepId, StoryId, StoryRecord};
use storymap_story::StoryStore;
use storymap_test_utils::{create_test_backend, main_instance, request, STORY};

mock! {
    Stories {}
    impl StoryStore for Stories {
        fn story(&self, id: StoryId) -> Result<Option<StoryRecord>, LookupError>;
    }
}

mock! {
    Settings {}
    impl SettingsStore for Settings {
        fn story_settings(&self, story: StoryId) -> Result<Option<SettingsDocument>, LookupError>;
        fn step_settings(&self, step: StepId) -> Result<Option<SettingsDocument>, LookupError>;
    }
}

fn service_with(stories: Arc<dyn StoryStore>, settings: Arc<dyn SettingsStore>) -> StoryMapService {
    let backend = create_test_backend();
    let backends = Backends {
        catalog: backend.clone(),
        settings,
        instances: backend,
        stories,
    };
    StoryMapService::new(ServiceConfig::default(), backends, FeatureRegistry::new())
}

#[test]
fn unavailable_story_store_is_retried_on_next_request() {
    let backend = create_test_backend();
    let record = backend.story(STORY).unwrap();

    let mut stories = MockStories::new();
    let mut seq = mockall::Sequence::new();
    stories
        .expect_story()
        .with(eq(STORY))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(LookupError::unavailable("story", "connection reset")));
    stories
        .expect_story()
        .with(eq(STORY))
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(record.clone()));

    let service = service_with(Arc::new(stories), backend);

    let err = service.build_story_structure(STORY, false).unwrap_err();
    assert!(matches!(err, StoryMapError::Story(_)));
    assert!(!err.is_not_found());
    assert_eq!(service.stats().structures.entries, 0);

    let structure = service.build_story_structure(STORY, false).unwrap();
    assert_eq!(structure.title, "River walk");
    assert_eq!(service.stats().structures.entries, 1);
}

#[test]
fn settings_failure_is_not_cached() {
    let backend = create_test_backend();
    let mut settings = MockSettings::new();
    settings
        .expect_story_settings()
        .times(2)
        .returning(|_| Err(LookupError::unavailable("story settings", "timeout")));
    settings.expect_step_settings().never();

    let service = service_with(backend, Arc::new(settings));
    for _ in 0..2 {
        let err = service
            .compose_map_configuration(&main_instance(), &request("story=42"))
            .unwrap_err();
        assert!(!err.is_client_error());
    }

    let stats = service.stats().configurations;
    assert_eq!((stats.entries, stats.misses, stats.hits), (0, 2, 0));
}

proptest! {
    #[test]
    fn entries_match_distinct_persisted_keys(steps in prop::collection::vec(prop::option::of(7u64..=9), 1..12)) {
        let backend = create_test_backend();
        let service = StoryMapService::new(
            ServiceConfig::default(),
            Backends::shared(backend),
            FeatureRegistry::new(),
        );

        let mut distinct = std::collections::BTreeSet::new();
        for step in &steps {
            let query = match step {
                Some(step) => format!("story=42&step={step}"),
                None => "story=42".to_string(),
            };
            service.compose_map_configuration(&main_instance(), &request(&query)).unwrap();
            distinct.insert(*step);
        }

        let stats = service.stats().configurations;
        prop_assert_eq!(stats.entries, distinct.len() as u64);
        prop_assert_eq!(stats.misses, distinct.len() as u64);
        prop_assert_eq!(stats.hits + stats.misses, steps.len() as u64);
    }
}
