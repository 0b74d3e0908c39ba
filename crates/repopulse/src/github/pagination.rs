//! Page-number pagination over GitHub list endpoints.

use serde::de::DeserializeOwned;

use super::client::GitHubClient;
use super::error::Result;

/// Largest page size GitHub accepts.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Configuration for a paginated fetch.
pub struct PaginatedFetchConfig<'a> {
    /// Label used in logs.
    pub namespace: &'a str,
    /// Function to build the API route for a given page number.
    pub route_fn: Box<dyn Fn(u32) -> String + Send + Sync + 'a>,
    /// Items per page; a shorter page ends the fetch.
    pub page_size: u32,
}

impl<'a> PaginatedFetchConfig<'a> {
    /// Config for listing every contributor of a repository.
    pub fn contributors(owner: &'a str, name: &'a str, page_size: u32) -> Self {
        Self {
            namespace: "contributors",
            route_fn: Box::new(move |page| {
                format!(
                    "/repos/{}/{}/contributors?per_page={}&page={}",
                    owner, name, page_size, page
                )
            }),
            page_size,
        }
    }
}

impl GitHubClient {
    /// Fetch every page of a list endpoint, concatenating items in order.
    ///
    /// Starts at page 1 and stops after the first page holding fewer than
    /// `page_size` items (an empty page included). There is no page cap and
    /// no retry: the first failing page aborts the whole fetch.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        config: &PaginatedFetchConfig<'_>,
    ) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut page = 1u32;

        loop {
            let route = (config.route_fn)(page);
            let items: Vec<T> = self.get(&route).await?;
            let count = items.len();
            all_items.extend(items);

            tracing::debug!(
                namespace = config.namespace,
                page,
                count,
                total_so_far = all_items.len(),
                "Fetched page"
            );

            if count < config.page_size as usize {
                break;
            }
            page += 1;
        }

        Ok(all_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::error::ErrorKind;
    use crate::http::{HttpResponse, MockTransport};
    use std::sync::Arc;

    const HOST: &str = "https://api.test";

    fn items(start: usize, count: usize) -> serde_json::Value {
        serde_json::Value::Array((start..start + count).map(|i| serde_json::json!(i)).collect())
    }

    fn client(transport: &MockTransport) -> GitHubClient {
        GitHubClient::new_with_transport(HOST, None, Arc::new(transport.clone()))
    }

    fn page_url(page: u32) -> String {
        format!("{HOST}/repos/o/r/contributors?per_page=100&page={page}")
    }

    #[tokio::test]
    async fn test_fetch_all_concatenates_until_short_page() {
        let transport = MockTransport::new();
        transport.push_json(page_url(1), 200, items(0, 100));
        transport.push_json(page_url(2), 200, items(100, 100));
        transport.push_json(page_url(3), 200, items(200, 37));

        let config = PaginatedFetchConfig::contributors("o", "r", DEFAULT_PAGE_SIZE);
        let all: Vec<usize> = client(&transport)
            .fetch_all(&config)
            .await
            .expect("pagination should succeed");

        assert_eq!(all.len(), 237);
        assert_eq!(all, (0..237).collect::<Vec<_>>());
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_empty_page() {
        let transport = MockTransport::new();
        transport.push_json(page_url(1), 200, items(0, 100));
        transport.push_json(page_url(2), 200, serde_json::json!([]));

        let config = PaginatedFetchConfig::contributors("o", "r", DEFAULT_PAGE_SIZE);
        let all: Vec<usize> = client(&transport)
            .fetch_all(&config)
            .await
            .expect("pagination should succeed");

        assert_eq!(all.len(), 100);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_single_short_page_issues_one_request() {
        let transport = MockTransport::new();
        transport.push_json(page_url(1), 200, items(0, 3));

        let config = PaginatedFetchConfig::contributors("o", "r", DEFAULT_PAGE_SIZE);
        let all: Vec<usize> = client(&transport).fetch_all(&config).await.expect("ok");
        assert_eq!(all, vec![0, 1, 2]);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_aborts_on_failed_page() {
        let transport = MockTransport::new();
        transport.push_json(page_url(1), 200, items(0, 100));
        transport.push_response(
            page_url(2),
            HttpResponse {
                status: 502,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let config = PaginatedFetchConfig::contributors("o", "r", DEFAULT_PAGE_SIZE);
        let err = client(&transport)
            .fetch_all::<usize>(&config)
            .await
            .expect_err("second page failure should abort");
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_custom_page_size_changes_route_and_termination() {
        let transport = MockTransport::new();
        let url = |p: u32| format!("{HOST}/repos/o/r/contributors?per_page=2&page={p}");
        transport.push_json(url(1), 200, items(0, 2));
        transport.push_json(url(2), 200, items(2, 1));

        let config = PaginatedFetchConfig::contributors("o", "r", 2);
        let all: Vec<usize> = client(&transport).fetch_all(&config).await.expect("ok");
        assert_eq!(all, vec![0, 1, 2]);
    }
}
