//! Story metadata and flat step records

use crate::ids::{StepId, StoryId};
use serde::{Deserialize, Serialize};

/// One story step as stored: a flat record with a parent reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Step id
    pub id: StepId,
    /// Parent step id, `0` for top-level steps
    #[serde(default)]
    pub parent_id: u64,
    /// Sort weight among all steps of the story
    #[serde(default)]
    pub weight: i32,
    /// Step title
    pub title: String,
    /// Title image URL
    #[serde(default)]
    pub title_image: Option<String>,
    /// Title image alternative text
    #[serde(default)]
    pub title_image_alt: Option<String>,
    /// Reference to the step's content document
    #[serde(default)]
    pub content_ref: Option<String>,
}

impl StepRecord {
    /// Create a step record with only the structural fields set
    pub fn new(id: u64, parent_id: u64, weight: i32, title: impl Into<String>) -> Self {
        Self {
            id: StepId(id),
            parent_id,
            weight,
            title: title.into(),
            title_image: None,
            title_image_alt: None,
            content_ref: None,
        }
    }

    /// Parent step, `None` for top-level steps
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<StepId> {
        StepId::parent_ref(self.parent_id)
    }
}

/// Story metadata plus its flat step list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    /// Story id
    pub id: StoryId,
    /// Title
    pub title: String,
    /// Author display name
    #[serde(default)]
    pub author: Option<String>,
    /// Teaser text
    #[serde(default)]
    pub description: Option<String>,
    /// Cover image URL
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Steps in storage order (not necessarily weight order)
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_record_defaults() {
        let step: StepRecord = serde_json::from_value(json!({"id": 4, "title": "Intro"})).unwrap();
        assert_eq!(step.parent(), None);
        assert_eq!(step.weight, 0);
    }

    #[test]
    fn story_record_from_json() {
        let story: StoryRecord = serde_json::from_value(json!({
            "id": 9,
            "title": "River walk",
            "coverImage": "/img/river.jpg",
            "steps": [{"id": 1, "title": "Start"}, {"id": 2, "parentId": 1, "weight": 1, "title": "Bridge"}]
        }))
        .unwrap();

        assert_eq!(story.id, StoryId(9));
        assert_eq!(story.steps[1].parent(), Some(StepId(1)));
        assert_eq!(story.cover_image.as_deref(), Some("/img/river.jpg"));
    }
}
