//! Mock source adapter for testing.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::net::RequestContext;
use crate::source::{MediaQuery, MediaRecord, SourceAdapter, SourceError};

/// Mock implementation of the `SourceAdapter` trait.
///
/// Provides controllable behavior for testing:
/// - Scripted result pages (one query per page)
/// - Per-page artificial delays to scramble completion order
/// - Failure injection at query planning or query execution
/// - Call counting for assertions
///
/// # Example
///
/// ```rust,ignore
/// use crescendo_core::testing::{fixtures, MockAdapter};
///
/// let adapter = MockAdapter::new("alpha")
///     .with_records(vec![fixtures::leaf_record("alpha", "alpha:1", "One")]);
/// let queries = adapter.build_queries("kw", &ctx).await?;
/// assert_eq!(queries.len(), 1);
/// ```
pub struct MockAdapter {
    name: String,
    pages: Vec<Vec<MediaRecord>>,
    page_delays_ms: Vec<u64>,
    fail_queries: bool,
    fail_execution: bool,
    calls: Mutex<Calls>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Calls {
    build_queries: usize,
    execute_query: usize,
}

impl MockAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pages: Vec::new(),
            page_delays_ms: Vec::new(),
            fail_queries: false,
            fail_execution: false,
            calls: Mutex::new(Calls::default()),
        }
    }

    /// Script a single result page.
    pub fn with_records(mut self, records: Vec<MediaRecord>) -> Self {
        self.pages = vec![records];
        self
    }

    /// Script one result list per page; `build_queries` plans one query per
    /// page.
    pub fn with_pages(mut self, pages: Vec<Vec<MediaRecord>>) -> Self {
        self.pages = pages;
        self
    }

    /// Delay each page's execution by the matching number of milliseconds.
    pub fn with_page_delays(mut self, delays_ms: Vec<u64>) -> Self {
        self.page_delays_ms = delays_ms;
        self
    }

    /// Make `build_queries` fail.
    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// Make every `execute_query` fail.
    pub fn failing_execution(mut self) -> Self {
        self.fail_execution = true;
        self
    }

    pub fn build_queries_calls(&self) -> usize {
        self.calls.lock().unwrap().build_queries
    }

    pub fn execute_query_calls(&self) -> usize {
        self.calls.lock().unwrap().execute_query
    }

    fn scripted_error(&self, what: &str) -> SourceError {
        SourceError::Payload {
            url: format!("mock://{}/{what}", self.name),
            reason: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn build_queries(
        &self,
        _keyword: &str,
        _ctx: &RequestContext,
    ) -> Result<Vec<MediaQuery>, SourceError> {
        self.calls.lock().unwrap().build_queries += 1;
        if self.fail_queries {
            return Err(self.scripted_error("queries"));
        }
        Ok((0..self.pages.len())
            .map(|page| {
                MediaQuery::new(
                    self.name.clone(),
                    page as u32,
                    format!("mock://{}/page/{page}", self.name),
                )
            })
            .collect())
    }

    async fn execute_query(
        &self,
        query: &MediaQuery,
        _ctx: &RequestContext,
    ) -> Result<Vec<MediaRecord>, SourceError> {
        self.calls.lock().unwrap().execute_query += 1;

        let page = query.page_index as usize;
        if let Some(delay_ms) = self.page_delays_ms.get(page) {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }
        if self.fail_execution {
            return Err(self.scripted_error("execute"));
        }
        Ok(self.pages.get(page).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_one_query_per_page() {
        let adapter = MockAdapter::new("m").with_pages(vec![vec![], vec![], vec![]]);
        let queries = adapter
            .build_queries("kw", &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[2].page_index, 2);
        assert_eq!(adapter.build_queries_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_records_returned() {
        let adapter = MockAdapter::new("m")
            .with_records(vec![fixtures::leaf_record("m", "m:1", "One")]);
        let queries = adapter
            .build_queries("kw", &RequestContext::new())
            .await
            .unwrap();
        let records = adapter
            .execute_query(&queries[0], &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(adapter.execute_query_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let adapter = MockAdapter::new("m").failing_queries();
        assert!(adapter
            .build_queries("kw", &RequestContext::new())
            .await
            .is_err());

        let adapter = MockAdapter::new("m")
            .with_records(vec![])
            .failing_execution();
        let query = MediaQuery::new("m", 0, "mock://m/page/0");
        assert!(adapter
            .execute_query(&query, &RequestContext::new())
            .await
            .is_err());
    }
}
