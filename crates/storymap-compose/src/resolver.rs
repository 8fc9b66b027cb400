//! Layer resolver: layer ids to catalog definitions

use crate::error::ComposeResult;
use crate::request::QueryParams;
use crate::source::LayerCatalog;
use indexmap::IndexSet;
use std::sync::Arc;
use storymap_model::LayerCatalogEntry;

/// Resolves layer ids against the catalog
#[derive(Clone)]
pub struct LayerResolver {
    catalog: Arc<dyn LayerCatalog>,
}

impl std::fmt::Debug for LayerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerResolver").finish_non_exhaustive()
    }
}

impl LayerResolver {
    /// Create resolver over a catalog
    #[inline]
    #[must_use]
    pub fn new(catalog: Arc<dyn LayerCatalog>) -> Self {
        Self { catalog }
    }

    /// Resolve ids to catalog entries
    ///
    /// - Duplicate ids are resolved once, at their first position
    /// - Unknown ids are skipped
    /// - Every source URL gets `params` appended
    ///
    /// # Errors
    /// Propagates catalog lookup failures.
    pub fn resolve_definitions<I, S>(
        &self,
        layer_ids: I,
        params: &QueryParams,
    ) -> ComposeResult<Vec<LayerCatalogEntry>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: IndexSet<String> = layer_ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let query = params.to_query_string();

        let mut definitions = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.catalog.get(id)? {
                Some(mut entry) => {
                    entry.source_url = append_query(&entry.source_url, &query);
                    definitions.push(entry);
                }
                None => tracing::debug!(layer = %id, "skipping unknown layer id"),
            }
        }
        Ok(definitions)
    }
}

/// Append an encoded query to a URL, `?` or `&` as appropriate
#[must_use]
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if !url.contains('?') {
        "?"
    } else if url.ends_with('?') || url.ends_with('&') {
        ""
    } else {
        "&"
    };
    format!("{url}{separator}{query}")
}
