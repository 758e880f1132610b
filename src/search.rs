//! Search dispatch over the vault index
//!
//! `dispatch` maps a [`SearchMode`] to exactly one call on a
//! [`SearchBackend`]. The mode enum is closed, so an unknown mode string is
//! rejected when it is deserialized, before anything is dispatched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::BridgeResult;

/// How a query is matched against the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// BM25 keyword match
    Keyword,
    /// Embedding similarity
    Semantic,
    /// Keyword and embedding results combined
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyword" => Ok(SearchMode::Keyword),
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!(
                "unknown search mode '{}' (expected keyword, semantic or hybrid)",
                other
            )),
        }
    }
}

/// One hit from the index, in backend order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document identifier
    pub docid: String,
    /// Source path of the document
    pub file: String,
    /// Relevance score
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Limits passed through to the backend
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub min_score: Option<f64>,
}

impl SearchOptions {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            min_score: None,
        }
    }
}

/// A search index the vault tools and routes query
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Keyword search
    async fn lexical(&self, query: &str, options: SearchOptions) -> BridgeResult<Vec<SearchResult>>;

    /// Embedding search
    async fn semantic(&self, query: &str, options: SearchOptions)
        -> BridgeResult<Vec<SearchResult>>;

    /// Combined keyword and embedding search
    async fn combined(&self, query: &str, options: SearchOptions)
        -> BridgeResult<Vec<SearchResult>>;

    /// Full text of a document by path or document id
    ///
    /// Fails with `BridgeError::NotFound` when the reference does not resolve.
    async fn get(&self, reference: &str) -> BridgeResult<String>;

    /// Index status as reported by the backend
    async fn status(&self) -> BridgeResult<Value>;

    /// Re-scan the vault for changed files
    async fn update(&self) -> BridgeResult<()>;

    /// Compute missing embeddings
    async fn embed(&self) -> BridgeResult<()>;
}

/// Run `query` against the one backend call selected by `mode`
pub async fn dispatch(
    backend: &dyn SearchBackend,
    query: &str,
    mode: SearchMode,
    options: SearchOptions,
) -> BridgeResult<Vec<SearchResult>> {
    tracing::debug!("[Search] {} query={:?} {:?}", mode, query, options);

    match mode {
        SearchMode::Keyword => backend.lexical(query, options).await,
        SearchMode::Semantic => backend.semantic(query, options).await,
        SearchMode::Hybrid => backend.combined(query, options).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BridgeError;
    use parking_lot::Mutex;

    /// Records every call and returns `hits` results
    struct RecordingBackend {
        calls: Mutex<Vec<&'static str>>,
        hits: usize,
    }

    impl RecordingBackend {
        fn new(hits: usize) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                hits,
            }
        }

        fn results(&self, label: &str) -> Vec<SearchResult> {
            (0..self.hits)
                .map(|i| SearchResult {
                    docid: format!("#{}{}", label, i),
                    file: format!("notes/{}-{}.md", label, i),
                    score: 1.0 - i as f64 * 0.1,
                    snippet: None,
                    title: None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl SearchBackend for RecordingBackend {
        async fn lexical(&self, _q: &str, _o: SearchOptions) -> BridgeResult<Vec<SearchResult>> {
            self.calls.lock().push("lexical");
            Ok(self.results("k"))
        }

        async fn semantic(&self, _q: &str, _o: SearchOptions) -> BridgeResult<Vec<SearchResult>> {
            self.calls.lock().push("semantic");
            Ok(self.results("s"))
        }

        async fn combined(&self, _q: &str, _o: SearchOptions) -> BridgeResult<Vec<SearchResult>> {
            self.calls.lock().push("combined");
            Ok(self.results("h"))
        }

        async fn get(&self, reference: &str) -> BridgeResult<String> {
            Err(BridgeError::not_found(reference))
        }

        async fn status(&self) -> BridgeResult<Value> {
            Ok(Value::Null)
        }

        async fn update(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn embed(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_each_mode_hits_one_backend_call() {
        for (mode, expected) in [
            (SearchMode::Keyword, "lexical"),
            (SearchMode::Semantic, "semantic"),
            (SearchMode::Hybrid, "combined"),
        ] {
            let backend = RecordingBackend::new(1);
            dispatch(&backend, "q", mode, SearchOptions::default())
                .await
                .unwrap();
            assert_eq!(*backend.calls.lock(), vec![expected]);
        }
    }

    #[tokio::test]
    async fn test_hybrid_preserves_backend_order() {
        let backend = RecordingBackend::new(3);
        let results = dispatch(
            &backend,
            "project ideas",
            SearchMode::Hybrid,
            SearchOptions::with_limit(5),
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3);
        let files: Vec<_> = results.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["notes/h-0.md", "notes/h-1.md", "notes/h-2.md"]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("semantic".parse::<SearchMode>(), Ok(SearchMode::Semantic));
        assert!("fuzzy".parse::<SearchMode>().is_err());
        assert!(serde_json::from_str::<SearchMode>("\"fuzzy\"").is_err());
        assert_eq!(SearchMode::default(), SearchMode::Hybrid);
    }

    #[test]
    fn test_result_optional_fields() {
        let raw = r##"{"docid":"#a1","file":"a.md","score":0.42}"##;
        let result: SearchResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.snippet, None);
        assert_eq!(result.title, None);
        assert!((result.score - 0.42).abs() < f64::EPSILON);
    }
}
