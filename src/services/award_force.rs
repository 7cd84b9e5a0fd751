// src/services/award_force.rs

//! Award Force (Creative Force) API client.
//!
//! Listings are paginated: every page carries `data` and an absolute
//! `next_page_url`. A listing is only returned once every page has been
//! read, so a short read can never reach the diff.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, CATEGORY_FIELD, CategoryConfig, Chapter, Record, SummaryConfig};
use crate::services::RecordSource;
use crate::utils::http::{self, classify_status};
use crate::utils::retry::{RetryPolicy, with_retry};

/// One page of a listing.
#[derive(Debug, Deserialize)]
struct Page {
    data: Vec<Value>,
    #[serde(default)]
    next_page_url: Option<String>,
}

/// Authenticated client for the awards platform.
pub struct AwardForceClient {
    client: Client,
    base_url: Url,
    api: ApiConfig,
    summary: SummaryConfig,
    retry: RetryPolicy,
}

impl AwardForceClient {
    /// Create a client that authenticates with `api_key`.
    pub fn new(
        api: &ApiConfig,
        summary: &SummaryConfig,
        retry: RetryPolicy,
        api_key: &str,
    ) -> Result<Self> {
        let client = http::create_api_client(api, api_key)?;
        Self::with_client(client, api, summary, retry)
    }

    /// Create a client around a preconfigured `reqwest::Client`.
    pub fn with_client(
        client: Client,
        api: &ApiConfig,
        summary: &SummaryConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let base_url = Url::parse(&api.base_url)?;
        Ok(Self {
            client,
            base_url,
            api: api.clone(),
            summary: summary.clone(),
            retry,
        })
    }

    /// Fetch every entry of every configured category.
    ///
    /// Categories are fetched concurrently but returned in configuration order.
    pub async fn fetch_all_records(&self) -> Result<Vec<Record>> {
        let fetches: Vec<_> = self
            .api
            .categories
            .iter()
            .map(|category| self.fetch_category(category))
            .collect();
        let per_category: Vec<Vec<Record>> = stream::iter(fetches)
            .buffered(self.api.max_concurrent.max(1))
            .try_collect()
            .await?;

        Ok(per_category.into_iter().flatten().collect())
    }

    /// Fetch active chapters.
    pub async fn fetch_chapters(&self) -> Result<Vec<Chapter>> {
        let per_page = self.api.per_page.to_string();
        let items = self
            .get_all(
                "chapter",
                "/chapter",
                &[("status", "active"), ("per_page", per_page.as_str())],
            )
            .await?;

        let chapters = items
            .iter()
            .map(|value| Chapter::from_value(value, &self.api.language, &self.summary))
            .collect::<Result<Vec<_>>>()?;
        log::info!("Loaded {} chapters", chapters.len());
        Ok(chapters)
    }

    async fn fetch_category(&self, category: &CategoryConfig) -> Result<Vec<Record>> {
        log::info!(
            "Pulling entries for category {} ({})",
            category.key,
            category.slug
        );
        let per_page = self.api.per_page.to_string();
        let context = format!("entries[{}]", category.key);
        let items = self
            .get_all(
                &context,
                "/entry",
                &[
                    ("category", category.slug.as_str()),
                    ("per_page", per_page.as_str()),
                ],
            )
            .await?;

        let records = items
            .iter()
            .map(|entry| {
                Record::from_entry(
                    entry,
                    &self.api.id_field,
                    &self.api.fields,
                    &self.api.language,
                )
                .map(|record| record.with_field(CATEGORY_FIELD, category.key.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;
        log::info!("Category {}: {} entries", category.key, records.len());
        Ok(records)
    }

    /// Follow `next_page_url` until the listing is exhausted.
    async fn get_all(&self, context: &str, path: &str, params: &[(&str, &str)]) -> Result<Vec<Value>> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut().extend_pairs(params);

        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(url);
        let mut page_no = 0usize;

        while let Some(url) = next.take() {
            page_no += 1;
            if page_no > self.api.max_pages {
                return Err(AppError::api(
                    context,
                    format!("more than {} pages", self.api.max_pages),
                ));
            }
            if !seen.insert(url.to_string()) {
                return Err(AppError::api(
                    context,
                    format!("pagination loops back to {url}"),
                ));
            }

            let label = format!("{context} page {page_no}");
            let page = with_retry(&self.retry, &label, |_| self.get_page(&label, &url)).await?;
            log::debug!("{}: {} items", label, page.data.len());
            items.extend(page.data);

            next = match page.next_page_url.as_deref().map(str::trim) {
                Some(link) if !link.is_empty() => Some(self.base_url.join(link)?),
                _ => None,
            };
        }

        Ok(items)
    }

    /// Single attempt at one page.
    async fn get_page(&self, context: &str, url: &Url) -> Result<Page> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(context, e))?;

        let status = response.status();
        let retry_after = http::retry_after(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::from_reqwest(context, e))?;

        if !status.is_success() {
            return Err(classify_status(
                context,
                status,
                retry_after,
                &String::from_utf8_lossy(&body),
            ));
        }

        serde_json::from_slice(&body)
            .map_err(|e| AppError::api(context, format!("unexpected listing payload: {e}")))
    }
}

#[async_trait]
impl RecordSource for AwardForceClient {
    async fn fetch_records(&self) -> Result<Vec<Record>> {
        self.fetch_all_records().await
    }

    async fn fetch_chapters(&self) -> Result<Vec<Chapter>> {
        AwardForceClient::fetch_chapters(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Record};
    use crate::utils::test_server::{Reply, TestServer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn api_config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            categories: vec![CategoryConfig {
                key: "13_17".into(),
                slug: "ZLgyzemp".into(),
            }],
            ..ApiConfig::default()
        }
    }

    fn client(base_url: &str) -> AwardForceClient {
        AwardForceClient::new(
            &api_config(base_url),
            &SummaryConfig::default(),
            RetryPolicy::immediate(3),
            "secret-key",
        )
        .unwrap()
    }

    fn entry(slug: &str, status: &str) -> String {
        format!(
            r#"{{"slug":"{slug}","title":{{"en_GB":"Film {slug}"}},"status":"{status}","chapter":{{"slug":"br"}}}}"#
        )
    }

    #[tokio::test]
    async fn test_follows_pagination_and_sends_headers() {
        let server = TestServer::start(|req, base| {
            if req.target.contains("page=2") {
                Reply::json(
                    200,
                    format!(r#"{{"data":[{}],"next_page_url":null}}"#, entry("b", "in_progress")),
                )
            } else {
                Reply::json(
                    200,
                    format!(
                        r#"{{"data":[{}],"next_page_url":"{base}/entry?category=ZLgyzemp&page=2"}}"#,
                        entry("a", "submitted")
                    ),
                )
            }
        })
        .await;

        let records = client(&server.base_url).fetch_all_records().await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            records[0].field(CATEGORY_FIELD),
            Some(&FieldValue::from("13_17"))
        );
        assert_eq!(records[0].field("title"), Some(&FieldValue::from("Film a")));

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path(), "/entry");
        assert!(requests[0].target.contains("category=ZLgyzemp"));
        assert!(requests[0].target.contains("per_page=100"));
        assert_eq!(requests[0].header("x-api-key"), Some("secret-key"));
        assert_eq!(requests[0].header("x-api-language"), Some("en_GB"));
        assert_eq!(
            requests[0].header("accept"),
            Some("application/vnd.Creative Force.v2.3+json")
        );
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let server = TestServer::start(|_, _| Reply::json(401, r#"{"message":"Unauthenticated."}"#)).await;

        let err = client(&server.base_url).fetch_all_records().await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_page_failure_is_retried() {
        let calls = AtomicUsize::new(0);
        let server = TestServer::start(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::json(503, "{}")
            } else {
                Reply::json(200, format!(r#"{{"data":[{}]}}"#, entry("a", "submitted")))
            }
        })
        .await;

        let records = client(&server.base_url).fetch_all_records().await.unwrap();
        assert_eq!(records, vec![
            Record::new("a")
                .with_field("chapter", "br")
                .with_field("status", "submitted")
                .with_field("title", "Film a")
                .with_field(CATEGORY_FIELD, "13_17")
        ]);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_second_page_aborts() {
        let server = TestServer::start(|req, base| {
            if req.target.contains("page=2") {
                Reply::json(429, "{}").with_header("Retry-After", "0")
            } else {
                Reply::json(
                    200,
                    format!(
                        r#"{{"data":[{}],"next_page_url":"{base}/entry?page=2"}}"#,
                        entry("a", "submitted")
                    ),
                )
            }
        })
        .await;

        let err = client(&server.base_url).fetch_all_records().await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
        // one first page, three attempts at the second
        assert_eq!(server.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_pagination_loop_is_detected() {
        let server = TestServer::start(|_, base| {
            Reply::json(
                200,
                format!(r#"{{"data":[],"next_page_url":"{base}/entry?page=2"}}"#),
            )
        })
        .await;

        let err = client(&server.base_url).fetch_all_records().await.unwrap_err();
        assert!(matches!(err, AppError::Api { .. }));
    }

    #[tokio::test]
    async fn test_page_limit_aborts_endless_listing() {
        let server = TestServer::start(|req, base| {
            let page: usize = req
                .target
                .split_once("?page=")
                .and_then(|(_, n)| n.parse().ok())
                .unwrap_or(1);
            Reply::json(
                200,
                format!(
                    r#"{{"data":[{}],"next_page_url":"{base}/entry?page={}"}}"#,
                    entry(&format!("e{page}"), "submitted"),
                    page + 1
                ),
            )
        })
        .await;

        let api = ApiConfig {
            max_pages: 3,
            ..api_config(&server.base_url)
        };
        let client = AwardForceClient::new(
            &api,
            &SummaryConfig::default(),
            RetryPolicy::immediate(1),
            "secret-key",
        )
        .unwrap();

        let err = client.fetch_all_records().await.unwrap_err();
        assert!(matches!(err, AppError::Api { ref message, .. } if message.contains("more than 3 pages")));
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_api_error() {
        let server = TestServer::start(|_, _| Reply::json(200, r#"{"entries":[]}"#)).await;

        let err = client(&server.base_url).fetch_all_records().await.unwrap_err();
        assert!(matches!(err, AppError::Api { .. }));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_chapters_resolves_regions() {
        let server = TestServer::start(|_, _| {
            Reply::json(
                200,
                r#"{"data":[
                    {"slug":"br","name":{"en_GB":"Brazil"}},
                    {"slug":"gf","name":{"en_GB":"Global Festival"}}
                ]}"#,
            )
        })
        .await;

        let chapters = client(&server.base_url).fetch_chapters().await.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].region, "AMR");
        assert_eq!(chapters[1].region, "Other");

        let requests = server.requests();
        assert_eq!(requests[0].path(), "/chapter");
        assert!(requests[0].target.contains("status=active"));
    }
}
