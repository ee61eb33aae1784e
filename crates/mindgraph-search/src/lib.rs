use mindgraph_core::NodeId;
use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32String};
use serde::{Deserialize, Serialize};

mod debounce;

pub use debounce::SearchDebouncer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    /// Match only labels equal to the whole query.
    pub whole_label: bool,
    /// Rank with the fuzzy matcher instead of substring matching.
    pub fuzzy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub min_query_length: usize,
    pub options: SearchOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_query_length: 1,
            options: SearchOptions::default(),
        }
    }
}

/// Label search over the visible projection, with a cursor over the hits.
pub struct SearchEngine {
    matcher: Matcher,
    config: SearchConfig,
    query: Option<String>,
    results: Vec<NodeId>,
    cursor: Option<usize>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("config", &self.config)
            .field("query", &self.query)
            .field("results", &self.results)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            matcher: Matcher::new(Config::DEFAULT),
            config,
            query: None,
            results: Vec::new(),
            cursor: None,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn options(&self) -> SearchOptions {
        self.config.options
    }

    pub fn set_options(&mut self, options: SearchOptions) {
        self.config.options = options;
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.query.is_some()
    }

    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<NodeId> {
        self.cursor.map(|idx| self.results[idx])
    }

    /// Run `query` over `labels`. Returns the hit count.
    ///
    /// A query shorter than the configured minimum (after trimming) clears the search.
    pub fn search<'a, I>(&mut self, query: &str, labels: I) -> usize
    where
        I: IntoIterator<Item = (NodeId, &'a str)>,
    {
        let query = query.trim();
        if query.chars().count() < self.config.min_query_length.max(1) {
            self.clear();
            return 0;
        }

        self.results = if self.config.options.fuzzy {
            self.fuzzy_matches(query, labels)
        } else {
            let options = self.config.options;
            labels
                .into_iter()
                .filter(|(_, label)| label_matches(label, query, options))
                .map(|(id, _)| id)
                .collect()
        };
        self.query = Some(query.to_string());
        self.cursor = if self.results.is_empty() { None } else { Some(0) };

        tracing::debug!("Search {:?} matched {} nodes", query, self.results.len());
        self.results.len()
    }

    /// Re-run the active query, e.g. after the projection changed.
    pub fn rerun<'a, I>(&mut self, labels: I) -> usize
    where
        I: IntoIterator<Item = (NodeId, &'a str)>,
    {
        match self.query.clone() {
            Some(query) => {
                let previous = self.current();
                let count = self.search(&query, labels);
                if let Some(idx) = previous.and_then(|id| self.results.iter().position(|r| *r == id)) {
                    self.cursor = Some(idx);
                }
                count
            }
            None => 0,
        }
    }

    fn fuzzy_matches<'a, I>(&mut self, query: &str, labels: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = (NodeId, &'a str)>,
    {
        let case = if self.config.options.case_sensitive {
            CaseMatching::Respect
        } else {
            CaseMatching::Ignore
        };
        let pattern = Pattern::new(query, case, Normalization::Smart, AtomKind::Fuzzy);

        let mut matches = Vec::new();
        for (order, (id, label)) in labels.into_iter().enumerate() {
            let name = Utf32String::from(label);
            if let Some(score) = pattern.score(name.slice(..), &mut self.matcher) {
                matches.push((id, score, order));
            }
        }

        // Best score first, ties in projection order.
        matches.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        matches.into_iter().map(|(id, _, _)| id).collect()
    }

    /// Move to the next hit, wrapping around.
    pub fn next(&mut self) -> Option<NodeId> {
        let len = self.results.len();
        if len == 0 {
            return None;
        }
        self.cursor = Some(self.cursor.map_or(0, |idx| (idx + 1) % len));
        self.current()
    }

    /// Move to the previous hit, wrapping around.
    pub fn prev(&mut self) -> Option<NodeId> {
        let len = self.results.len();
        if len == 0 {
            return None;
        }
        self.cursor = Some(self.cursor.map_or(len - 1, |idx| (idx + len - 1) % len));
        self.current()
    }

    pub fn clear(&mut self) {
        self.query = None;
        self.results.clear();
        self.cursor = None;
    }
}

fn label_matches(label: &str, query: &str, options: SearchOptions) -> bool {
    if options.case_sensitive {
        if options.whole_label {
            label == query
        } else {
            label.contains(query)
        }
    } else {
        let label = label.to_lowercase();
        let query = query.to_lowercase();
        if options.whole_label {
            label == query
        } else {
            label.contains(&query)
        }
    }
}
