use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::core::api::{ApiResult, Gateway, SearchResult, SearchSource};
use crate::core::cache::{Query, QueryClient, QueryKey, QueryPolicy};
use crate::core::debounce::DebouncedInput;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
pub const SEARCH_LIMIT: u32 = 50;

/// Active sources. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter(BTreeSet<SearchSource>);

impl Default for SourceFilter {
    fn default() -> Self {
        Self(SearchSource::ALL.into_iter().collect())
    }
}

impl SourceFilter {
    /// `None` when `sources` is empty.
    pub fn from_sources(sources: impl IntoIterator<Item = SearchSource>) -> Option<Self> {
        let set: BTreeSet<_> = sources.into_iter().collect();
        (!set.is_empty()).then_some(Self(set))
    }

    pub fn contains(&self, source: SearchSource) -> bool {
        self.0.contains(&source)
    }

    /// Flip `source`. Turning off the last active source is refused and
    /// reported as `false`.
    pub fn toggle(&mut self, source: SearchSource) -> bool {
        if self.0.contains(&source) {
            if self.0.len() == 1 {
                return false;
            }
            self.0.remove(&source);
        } else {
            self.0.insert(source);
        }
        true
    }

    pub fn sources(&self) -> Vec<SearchSource> {
        self.0.iter().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub sources: Vec<SearchSource>,
    pub limit: u32,
}

impl SearchRequest {
    /// Gate: the trimmed query must be non-empty.
    pub fn new(query: &str, filter: &SourceFilter) -> Option<Self> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        Some(Self {
            query: query.to_string(),
            sources: filter.sources(),
            limit: SEARCH_LIMIT,
        })
    }

    pub fn key(&self) -> QueryKey {
        let sources: Vec<String> = self.sources.iter().map(|s| s.as_str().to_string()).collect();
        QueryKey::search(&self.query, &sources)
    }

    pub async fn run(&self, gateway: &Gateway) -> ApiResult<Vec<SearchResult>> {
        gateway
            .search(&self.query, &self.sources, Some(self.limit))
            .await
    }
}

/// Search page state: debounced text plus the source filter.
pub struct SearchBox {
    input: DebouncedInput,
    filter: SourceFilter,
}

impl Default for SearchBox {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchBox {
    pub fn new() -> Self {
        Self {
            input: DebouncedInput::new(SEARCH_DEBOUNCE),
            filter: SourceFilter::default(),
        }
    }

    pub fn set_text(&mut self, text: &str) {
        self.input.set(text);
    }

    pub fn text(&self) -> &str {
        self.input.raw()
    }

    pub fn toggle(&mut self, source: SearchSource) -> bool {
        self.filter.toggle(source)
    }

    pub fn filter(&self) -> &SourceFilter {
        &self.filter
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.input.subscribe()
    }

    /// Request for the settled text, if it passes the gate.
    pub fn request(&self) -> Option<SearchRequest> {
        SearchRequest::new(&self.input.settled(), &self.filter)
    }

    pub fn query(&self, client: &QueryClient, gateway: &Gateway) -> Option<Arc<Query<Vec<SearchResult>>>> {
        let request = self.request()?;
        let gateway = gateway.clone();
        Some(client.query(request.key(), QueryPolicy::SEARCH, move || {
            let gateway = gateway.clone();
            let request = request.clone();
            async move { request.run(&gateway).await }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_source_cannot_be_turned_off() {
        let mut filter = SourceFilter::from_sources([SearchSource::Sessions]).unwrap();
        assert!(!filter.toggle(SearchSource::Sessions));
        assert_eq!(filter.sources(), vec![SearchSource::Sessions]);

        assert!(filter.toggle(SearchSource::Notes));
        assert!(filter.toggle(SearchSource::Sessions));
        assert_eq!(filter.sources(), vec![SearchSource::Notes]);
    }

    #[test]
    fn empty_filter_is_unrepresentable() {
        assert!(SourceFilter::from_sources([]).is_none());
        assert_eq!(SourceFilter::default().sources().len(), 3);
    }

    #[test]
    fn blank_query_is_gated() {
        let filter = SourceFilter::default();
        assert!(SearchRequest::new("   ", &filter).is_none());
        let req = SearchRequest::new(" invoice ", &filter).unwrap();
        assert_eq!(req.query, "invoice");
        assert_eq!(req.limit, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn search_box_waits_for_settled_text() {
        let mut search = SearchBox::new();
        search.set_text("invoice");
        assert!(search.request().is_none());

        tokio::time::sleep(SEARCH_DEBOUNCE + Duration::from_millis(1)).await;
        let request = search.request().expect("settled query");
        assert_eq!(request.query, "invoice");
        assert_eq!(
            request.key(),
            QueryKey::new(["search", "invoice", "notes", "tasks", "sessions"])
        );
    }
}
