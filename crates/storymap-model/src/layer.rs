//! Layers, layer channels and per-story layer overrides

use crate::error::ModelError;
use crate::settings::ChannelSettings;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::fmt;

/// Canonical layer definition owned by the layer catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerCatalogEntry {
    /// Catalog id
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Access URL of the layer service
    pub source_url: String,
    /// Service kind (WMS, WFS, ...)
    pub kind: String,
}

impl LayerCatalogEntry {
    /// Create catalog entry
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_url: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_url: source_url.into(),
            kind: kind.into(),
        }
    }
}

/// A selected layer: one catalog id, or a composite group of ids
///
/// Composite layers travel as JSON-array tokens (`["10","11"]`). The
/// canonical token text is the layer's [`key`](LayerRef::key); selection,
/// visibility and overrides are all keyed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayerRef {
    /// Single catalog layer
    Single(String),
    /// Composite layer rendered from several catalog layers
    Group(Vec<String>),
}

impl LayerRef {
    /// Single layer reference
    #[inline]
    #[must_use]
    pub fn single(id: impl Into<String>) -> Self {
        Self::Single(id.into())
    }

    /// Composite layer reference; a group of one collapses to [`LayerRef::Single`]
    #[must_use]
    pub fn group<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.len() == 1 {
            Self::Single(ids.remove(0))
        } else {
            Self::Group(ids)
        }
    }

    /// Decode a request token: a plain id or a JSON array of ids
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidLayerToken`] for empty tokens, malformed
    /// JSON arrays and arrays holding anything but strings or numbers.
    pub fn parse(token: &str) -> Result<Self, ModelError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ModelError::invalid_layer_token(token, "empty token"));
        }
        if trimmed.starts_with('[') {
            let values: Vec<JsonValue> = serde_json::from_str(trimmed)
                .map_err(|e| ModelError::invalid_layer_token(token, e.to_string()))?;
            return Self::from_values(&values)
                .map_err(|reason| ModelError::invalid_layer_token(token, reason));
        }
        Ok(Self::Single(trimmed.to_string()))
    }

    fn from_values(values: &[JsonValue]) -> Result<Self, String> {
        if values.is_empty() {
            return Err("empty layer group".to_string());
        }
        let ids = values
            .iter()
            .map(|value| match value {
                JsonValue::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                JsonValue::Number(n) => Ok(n.to_string()),
                other => Err(format!("unsupported layer id {other}")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::group(ids))
    }

    /// Canonical token text
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Single(id) => id.clone(),
            Self::Group(ids) => JsonValue::from(ids.clone()).to_string(),
        }
    }

    /// Catalog ids this reference renders
    pub fn atomic_ids(&self) -> impl Iterator<Item = &str> {
        let ids: &[String] = match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Group(ids) => ids,
        };
        ids.iter().map(String::as_str)
    }

    /// Value of the `id` field in structured configuration output
    #[must_use]
    pub fn to_json_id(&self) -> JsonValue {
        match self {
            Self::Single(id) => JsonValue::from(id.as_str()),
            Self::Group(ids) => JsonValue::from(ids.clone()),
        }
    }

    /// Whether this is a composite layer
    #[inline]
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl fmt::Display for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl Serialize for LayerRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Single(id) => serializer.serialize_str(id),
            Self::Group(ids) => ids.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLayerRef {
    Text(String),
    Number(serde_json::Number),
    List(Vec<JsonValue>),
}

impl<'de> Deserialize<'de> for LayerRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawLayerRef::deserialize(deserializer)? {
            RawLayerRef::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
            RawLayerRef::Number(n) => Ok(Self::Single(n.to_string())),
            RawLayerRef::List(values) => {
                Self::from_values(&values).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// Per-story customization of one selected layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerOverride {
    /// Replaces the layer name and attribution when non-empty
    pub display_name: Option<String>,
    /// Object shallow-merged onto the layer entry; stored as JSON text or inline
    pub json_patch: Option<JsonValue>,
}

impl LayerOverride {
    /// Non-empty display name
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Parsed patch object, `None` when no patch is stored
    ///
    /// # Errors
    /// Returns the decoder message when the stored patch is not a JSON object.
    pub fn patch(&self) -> Result<Option<Map<String, JsonValue>>, String> {
        match &self.json_patch {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(text)) if text.trim().is_empty() => Ok(None),
            Some(JsonValue::String(text)) => match serde_json::from_str::<JsonValue>(text) {
                Ok(JsonValue::Object(map)) => Ok(non_empty(map)),
                Ok(other) => Err(format!("expected object, got {}", json_kind(&other))),
                Err(e) => Err(e.to_string()),
            },
            Some(JsonValue::Object(map)) => Ok(non_empty(map.clone())),
            Some(other) => Err(format!("expected object, got {}", json_kind(other))),
        }
    }
}

fn non_empty(map: Map<String, JsonValue>) -> Option<Map<String, JsonValue>> {
    (!map.is_empty()).then_some(map)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Layer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Base maps, rendered below everything else
    Background,
    /// Thematic layers
    Foreground,
}

impl Channel {
    /// Channels in output order
    pub const ALL: [Channel; 2] = [Channel::Background, Channel::Foreground];

    /// Key used in structured configuration output
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Foreground => "foreground",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved layer channel
///
/// Construction enforces the channel invariants: the selection holds each
/// key once (first occurrence wins), visibility is a subset of the
/// selection, and overrides exist only for selected layers.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerChannel {
    channel: Channel,
    selected: Vec<LayerRef>,
    visible: HashSet<String>,
    overrides: IndexMap<String, LayerOverride>,
}

impl LayerChannel {
    /// Create channel, dropping anything that violates the invariants
    pub fn new(
        channel: Channel,
        selected: impl IntoIterator<Item = LayerRef>,
        visible: impl IntoIterator<Item = LayerRef>,
        overrides: IndexMap<String, LayerOverride>,
    ) -> Self {
        let mut seen = HashSet::new();
        let selected: Vec<LayerRef> = selected
            .into_iter()
            .filter(|layer| seen.insert(layer.key()))
            .collect();

        let overrides = overrides
            .into_iter()
            .filter_map(|(key, value)| match LayerRef::parse(&key) {
                Ok(layer) => Some((layer.key(), value)),
                Err(err) => {
                    tracing::debug!(%channel, %err, "ignoring override with unreadable layer key");
                    None
                }
            })
            .filter(|(key, _)| seen.contains(key))
            .collect();

        let mut resolved = Self {
            channel,
            selected,
            visible: HashSet::new(),
            overrides,
        };
        resolved.visible = resolved.filter_visible(visible);
        resolved
    }

    /// Empty channel
    #[inline]
    #[must_use]
    pub fn empty(channel: Channel) -> Self {
        Self::new(channel, Vec::new(), Vec::new(), IndexMap::new())
    }

    /// Build from a stored settings document channel
    #[must_use]
    pub fn from_settings(channel: Channel, settings: &ChannelSettings) -> Self {
        Self::new(
            channel,
            settings.selected.iter().cloned(),
            settings.visible.iter().cloned(),
            settings.overrides.clone(),
        )
    }

    /// Replace visibility, keeping only selected layers
    #[must_use]
    pub fn with_visible(mut self, visible: impl IntoIterator<Item = LayerRef>) -> Self {
        self.visible = self.filter_visible(visible);
        self
    }

    fn filter_visible(&self, visible: impl IntoIterator<Item = LayerRef>) -> HashSet<String> {
        let selected: HashSet<String> = self.selected.iter().map(LayerRef::key).collect();
        visible
            .into_iter()
            .map(|layer| layer.key())
            .filter(|key| selected.contains(key))
            .collect()
    }

    /// Channel kind
    #[inline]
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Selected layers in render order
    #[inline]
    #[must_use]
    pub fn selected(&self) -> &[LayerRef] {
        &self.selected
    }

    /// Whether nothing is selected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Whether a layer is visible
    #[inline]
    #[must_use]
    pub fn is_visible(&self, layer: &LayerRef) -> bool {
        self.visible.contains(&layer.key())
    }

    /// Visible layer keys in selection order
    #[must_use]
    pub fn visible_keys(&self) -> Vec<String> {
        self.selected
            .iter()
            .map(LayerRef::key)
            .filter(|key| self.visible.contains(key))
            .collect()
    }

    /// Override stored for a selected layer
    #[inline]
    #[must_use]
    pub fn override_for(&self, layer: &LayerRef) -> Option<&LayerOverride> {
        self.overrides.get(&layer.key())
    }

    /// Catalog ids used by the selection, in order (may repeat across groups)
    pub fn atomic_ids(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().flat_map(LayerRef::atomic_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_plain_and_group_tokens() {
        assert_eq!(LayerRef::parse(" 100 ").unwrap(), LayerRef::single("100"));
        assert_eq!(
            LayerRef::parse(r#"["10", 11]"#).unwrap(),
            LayerRef::Group(vec!["10".into(), "11".into()])
        );
        assert_eq!(LayerRef::parse(r#"["7"]"#).unwrap(), LayerRef::single("7"));
    }

    #[test]
    fn parse_rejects_bad_tokens() {
        assert!(LayerRef::parse("").is_err());
        assert!(LayerRef::parse("[10").is_err());
        assert!(LayerRef::parse("[]").is_err());
        assert!(LayerRef::parse("[{}]").is_err());
    }

    #[test]
    fn group_key_is_canonical() {
        let a = LayerRef::parse(r#"[10,"11"]"#).unwrap();
        let b = LayerRef::parse(r#"["10","11"]"#).unwrap();
        assert_eq!(a.key(), r#"["10","11"]"#);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn layer_ref_serde_accepts_all_shapes() {
        let refs: Vec<LayerRef> = serde_json::from_value(json!(["1", 2, ["3", "4"], "[\"5\",\"6\"]"])).unwrap();
        assert_eq!(refs[0], LayerRef::single("1"));
        assert_eq!(refs[1], LayerRef::single("2"));
        assert_eq!(refs[2], LayerRef::group(["3", "4"]));
        assert_eq!(refs[3], LayerRef::group(["5", "6"]));

        assert_eq!(serde_json::to_value(&refs[2]).unwrap(), json!(["3", "4"]));
    }

    #[test]
    fn override_patch_forms() {
        let text = LayerOverride {
            json_patch: Some(json!("{\"opacity\": 0.5}")),
            ..Default::default()
        };
        assert_eq!(text.patch().unwrap().unwrap()["opacity"], json!(0.5));

        let inline = LayerOverride {
            json_patch: Some(json!({"opacity": 0.2})),
            ..Default::default()
        };
        assert!(inline.patch().unwrap().is_some());

        let empty = LayerOverride {
            json_patch: Some(json!("  ")),
            ..Default::default()
        };
        assert_eq!(empty.patch().unwrap(), None);

        let array = LayerOverride {
            json_patch: Some(json!("[1]")),
            ..Default::default()
        };
        assert!(array.patch().is_err());
    }

    #[test]
    fn display_name_ignores_blank() {
        let o = LayerOverride {
            display_name: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(o.display_name(), None);
    }

    #[test]
    fn channel_enforces_invariants() {
        let mut overrides = IndexMap::new();
        overrides.insert("200".to_string(), LayerOverride::default());
        overrides.insert("999".to_string(), LayerOverride::default());

        let channel = LayerChannel::new(
            Channel::Foreground,
            vec![LayerRef::single("100"), LayerRef::single("200"), LayerRef::single("100")],
            vec![LayerRef::single("200"), LayerRef::single("300")],
            overrides,
        );

        assert_eq!(channel.selected().len(), 2);
        assert_eq!(channel.visible_keys(), vec!["200".to_string()]);
        assert!(channel.override_for(&LayerRef::single("200")).is_some());
        assert!(channel.override_for(&LayerRef::single("999")).is_none());
    }

    #[test]
    fn override_keys_are_canonicalised() {
        let mut overrides = IndexMap::new();
        overrides.insert(
            r#"["10", "11"]"#.to_string(),
            LayerOverride {
                display_name: Some("Parks".into()),
                ..Default::default()
            },
        );
        overrides.insert(" 12 ".to_string(), LayerOverride::default());
        overrides.insert("[10".to_string(), LayerOverride::default());

        let channel = LayerChannel::new(
            Channel::Foreground,
            vec![LayerRef::group(["10", "11"]), LayerRef::single("12")],
            Vec::new(),
            overrides,
        );

        let group = channel.override_for(&LayerRef::group(["10", "11"])).unwrap();
        assert_eq!(group.display_name(), Some("Parks"));
        assert!(channel.override_for(&LayerRef::single("12")).is_some());
        assert_eq!(channel.overrides.len(), 2);
    }

    #[test]
    fn numeric_group_override_key_matches() {
        let mut overrides = IndexMap::new();
        overrides.insert("[10,11]".to_string(), LayerOverride::default());
        let channel = LayerChannel::new(
            Channel::Background,
            vec![LayerRef::parse(r#"["10","11"]"#).unwrap()],
            Vec::new(),
            overrides,
        );
        assert!(channel.override_for(&LayerRef::group(["10", "11"])).is_some());
    }

    #[test]
    fn with_visible_replaces_visibility() {
        let channel = LayerChannel::new(
            Channel::Background,
            vec![LayerRef::single("1"), LayerRef::single("2")],
            vec![LayerRef::single("1")],
            IndexMap::new(),
        )
        .with_visible(vec![LayerRef::single("2"), LayerRef::single("3")]);

        assert!(!channel.is_visible(&LayerRef::single("1")));
        assert!(channel.is_visible(&LayerRef::single("2")));
        assert!(!channel.is_visible(&LayerRef::single("3")));
    }

    #[test]
    fn atomic_ids_flatten_groups() {
        let channel = LayerChannel::new(
            Channel::Background,
            vec![LayerRef::single("1"), LayerRef::group(["2", "3"])],
            Vec::new(),
            IndexMap::new(),
        );
        assert_eq!(channel.atomic_ids().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }
}
