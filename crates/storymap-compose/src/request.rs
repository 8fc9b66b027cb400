//! Request parameters and mode resolution
//!
//! A map request is either *ad-hoc* (layer and tool lists passed directly in
//! the query, used for previews) or *persisted* (settings loaded for a story
//! and optionally one of its steps). [`RequestContext::from_query`] decides
//! which, following the reserved parameter names below; every other
//! parameter is a passthrough parameter for layer services.

use crate::error::{ComposeError, ComposeResult};
use serde::{Deserialize, Serialize};
use storymap_model::{LayerRef, StepId, StoryId};
use url::form_urlencoded;

/// Preview flag; selects ad-hoc mode
pub const PARAM_PREVIEW: &str = "preview";
/// Story URL reference; selects persisted mode
pub const PARAM_STORY: &str = "story";
/// Story step id (persisted mode)
pub const PARAM_STEP: &str = "step";
/// Background layer list
pub const PARAM_BACKGROUND: &str = "BackgroundLayer";
/// Foreground layer list
pub const PARAM_FOREGROUND: &str = "ForegroundLayer";
/// Visible layer list
pub const PARAM_VISIBLE: &str = "VisibleLayers";
/// Tool list (ad-hoc mode)
pub const PARAM_TOOLS: &str = "Tools";
/// Cache bypass flag
pub const PARAM_NO_CACHE: &str = "noCache";

/// Parameters consumed by the composer itself
pub const RESERVED_PARAMS: [&str; 8] = [
    PARAM_PREVIEW,
    PARAM_STORY,
    PARAM_STEP,
    PARAM_BACKGROUND,
    PARAM_FOREGROUND,
    PARAM_VISIBLE,
    PARAM_TOOLS,
    PARAM_NO_CACHE,
];

/// Ordered, decoded query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Empty parameter list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (leading `?` allowed)
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        Self(
            form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// Build from decoded pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Append a parameter
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// First value for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Flag semantics: present and not `0`/`false`
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| !matches!(v.trim(), "0" | "false"))
    }

    /// Parameters that are not reserved by the composer
    #[must_use]
    pub fn passthrough(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
                .cloned()
                .collect(),
        )
    }

    /// Encode as `k=v&k2=v2`
    #[must_use]
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }

    /// Iterate pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no pairs
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Incoming request as seen by the composer and feature plugins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// URL scheme of the current request
    pub scheme: String,
    /// Host (with port, if any) of the current request
    pub host: String,
    /// Decoded query parameters
    pub query: QueryParams,
}

impl RequestInfo {
    /// Create request info
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, query: QueryParams) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            query,
        }
    }

    /// `scheme://host`
    #[must_use]
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Whether the caller asked to bypass the cache
    #[inline]
    #[must_use]
    pub fn no_cache(&self) -> bool {
        self.query.flag(PARAM_NO_CACHE)
    }
}

/// Layer and tool lists of an ad-hoc request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdHocSelection {
    /// Background layers in order
    pub background: Vec<LayerRef>,
    /// Foreground layers in order
    pub foreground: Vec<LayerRef>,
    /// Visible layers (either channel)
    pub visible: Vec<LayerRef>,
    /// Tool ids in menu order
    pub tools: Vec<String>,
}

impl AdHocSelection {
    /// Whether the request selects nothing and so yields the instance default
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.background.is_empty() && self.foreground.is_empty() && self.tools.is_empty()
    }
}

/// Resolved request mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestContext {
    /// Explicit, ungoverned selection from the query
    AdHoc(AdHocSelection),
    /// Settings loaded from the settings store
    Persisted {
        /// Story whose settings apply
        story_id: StoryId,
        /// Step whose visibility, tool and viewpoint apply
        step_id: Option<StepId>,
    },
}

impl RequestContext {
    /// Persisted context for a story
    #[inline]
    #[must_use]
    pub fn story(story_id: StoryId) -> Self {
        Self::Persisted {
            story_id,
            step_id: None,
        }
    }

    /// Persisted context for a story step
    #[inline]
    #[must_use]
    pub fn step(story_id: StoryId, step_id: StepId) -> Self {
        Self::Persisted {
            story_id,
            step_id: Some(step_id),
        }
    }

    /// Resolve the mode of a request
    ///
    /// Persisted when `story` is present and `preview` is not; ad-hoc when
    /// `preview` is present, even as `preview=0`.
    ///
    /// # Errors
    /// Returns [`ComposeError::MalformedRequest`] when neither applies or a
    /// reserved parameter can not be parsed.
    pub fn from_query(query: &QueryParams) -> ComposeResult<Self> {
        // Presence decides, whatever the value
        if query.get(PARAM_PREVIEW).is_some() {
            return Ok(Self::AdHoc(AdHocSelection {
                background: layer_list(query, PARAM_BACKGROUND)?,
                foreground: layer_list(query, PARAM_FOREGROUND)?,
                visible: layer_list(query, PARAM_VISIBLE)?,
                tools: query
                    .get(PARAM_TOOLS)
                    .map(|tools| {
                        tools
                            .split('/')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            }));
        }

        if let Some(reference) = query.get(PARAM_STORY) {
            let story_id = story_id_from_reference(reference)?;
            let step_id = query
                .get(PARAM_STEP)
                .map(|raw| {
                    raw.parse::<StepId>()
                        .map_err(|e| ComposeError::malformed(e.to_string()))
                })
                .transpose()?;
            return Ok(Self::Persisted { story_id, step_id });
        }

        Err(ComposeError::malformed(format!(
            "request carries neither '{PARAM_PREVIEW}' nor '{PARAM_STORY}'"
        )))
    }

    /// Story id in persisted mode
    #[inline]
    #[must_use]
    pub fn story_id(&self) -> Option<StoryId> {
        match self {
            Self::AdHoc(_) => None,
            Self::Persisted { story_id, .. } => Some(*story_id),
        }
    }

    /// Step id in persisted mode
    #[inline]
    #[must_use]
    pub fn step_id(&self) -> Option<StepId> {
        match self {
            Self::AdHoc(_) => None,
            Self::Persisted { step_id, .. } => *step_id,
        }
    }

    /// Whether this is ad-hoc mode
    #[inline]
    #[must_use]
    pub fn is_ad_hoc(&self) -> bool {
        matches!(self, Self::AdHoc(_))
    }
}

/// Derive a story id from a story URL reference: the last numeric path
/// segment (`https://host/story/42`, `/node/42/`, `42`)
///
/// # Errors
/// Returns [`ComposeError::MalformedRequest`] when no segment is a valid id.
pub fn story_id_from_reference(reference: &str) -> ComposeResult<StoryId> {
    let path = match url::Url::parse(reference) {
        Ok(url) => url.path().to_string(),
        Err(_) => reference
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    path.split('/')
        .rev()
        .filter(|segment| !segment.is_empty())
        .find_map(|segment| segment.parse::<StoryId>().ok())
        .ok_or_else(|| {
            ComposeError::malformed(format!("story reference '{reference}' names no story"))
        })
}

/// Split a slash-delimited layer list into tokens
///
/// Slashes inside a JSON-array token (including inside its quoted ids) do
/// not split.
///
/// # Errors
/// Returns [`ComposeError::MalformedRequest`] for unbalanced brackets or
/// quotes.
pub fn split_layer_list(value: &str) -> ComposeResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for ch in value.chars() {
        if in_string {
            current.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ComposeError::malformed(format!("unbalanced ']' in layer list '{value}'"))
                })?;
            }
            '/' if depth == 0 => {
                push_token(&mut tokens, &mut current);
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if depth != 0 || in_string {
        return Err(ComposeError::malformed(format!(
            "unterminated layer group in layer list '{value}'"
        )));
    }
    push_token(&mut tokens, &mut current);
    Ok(tokens)
}

fn push_token(tokens: &mut Vec<String>, current: &mut String) {
    let token = current.trim();
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
    current.clear();
}

fn layer_list(query: &QueryParams, key: &str) -> ComposeResult<Vec<LayerRef>> {
    let Some(value) = query.get(key) else {
        return Ok(Vec::new());
    };
    split_layer_list(value)?
        .iter()
        .map(|token| {
            LayerRef::parse(token).map_err(|e| ComposeError::malformed(format!("{key}: {e}")))
        })
        .collect()
}
