use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::settings::Settings;

const BASE_BACKOFF_MS: u64 = 2000;

/// MediaWiki API client for page HTML and contributor names.
pub struct WikiClient {
    http: Client,
    api_url: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    info: String,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<ParseBody>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ContributorsResponse {
    query: Option<ContributorsQuery>,
    #[serde(rename = "continue")]
    cont: Option<BTreeMap<String, Value>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ContributorsQuery {
    #[serde(default)]
    pages: Vec<ContributorsPage>,
}

#[derive(Debug, Deserialize)]
struct ContributorsPage {
    #[serde(default)]
    contributors: Vec<Contributor>,
}

#[derive(Debug, Deserialize)]
struct Contributor {
    name: String,
}

impl WikiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: settings.api_url(),
            max_retries: settings.max_retries,
        })
    }

    /// Rendered HTML of a page.
    pub async fn fetch_page_html(&self, title: &str) -> Result<String> {
        info!(title, "Fetching page HTML");
        let params = vec![
            ("action".to_string(), "parse".to_string()),
            ("page".to_string(), title.to_string()),
            ("prop".to_string(), "text".to_string()),
            ("format".to_string(), "json".to_string()),
            ("formatversion".to_string(), "2".to_string()),
        ];
        let body = self.get_with_retry(&params).await?;
        parse_page_response(&body)
    }

    /// Contributor names in API order, following continuation.
    pub async fn fetch_authors(&self, title: &str) -> Result<Vec<String>> {
        let mut authors = Vec::new();
        let mut cont: BTreeMap<String, Value> = BTreeMap::new();

        loop {
            let mut params = vec![
                ("action".to_string(), "query".to_string()),
                ("prop".to_string(), "contributors".to_string()),
                ("titles".to_string(), title.to_string()),
                ("pclimit".to_string(), "max".to_string()),
                ("format".to_string(), "json".to_string()),
                ("formatversion".to_string(), "2".to_string()),
            ];
            params.extend(cont.iter().map(|(k, v)| (k.clone(), value_to_param(v))));

            let body = self.get_with_retry(&params).await?;
            let (names, next) = parse_contributors_response(&body)?;
            authors.extend(names);

            match next {
                Some(next) => cont = next,
                None => break,
            }
        }

        info!(title, count = authors.len(), "Fetched contributors");
        Ok(authors)
    }

    async fn get_with_retry(&self, params: &[(String, String)]) -> Result<String> {
        for attempt in 0..=self.max_retries {
            let response = self
                .http
                .get(&self.api_url)
                .query(params)
                .send()
                .await
                .with_context(|| format!("Request to {} failed", self.api_url))?;

            let status = response.status();
            if status.is_success() {
                return response.text().await.context("Failed to read response body");
            }

            if !is_retryable(status) || attempt == self.max_retries {
                bail!("{} returned {}", self.api_url, status);
            }

            let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
            warn!(
                "{} from {} (attempt {}/{}), backing off {:.1}s",
                status,
                self.api_url,
                attempt + 1,
                self.max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
        }

        Err(anyhow!("{} retries exhausted", self.api_url))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn value_to_param(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_page_response(body: &str) -> Result<String> {
    let resp: ParseResponse =
        serde_json::from_str(body).context("Unexpected parse API response")?;
    if let Some(e) = resp.error {
        bail!("MediaWiki error {}: {}", e.code, e.info);
    }
    resp.parse
        .map(|p| p.text)
        .ok_or_else(|| anyhow!("No page text in parse API response"))
}

type ContinueToken = BTreeMap<String, Value>;

fn parse_contributors_response(body: &str) -> Result<(Vec<String>, Option<ContinueToken>)> {
    let resp: ContributorsResponse =
        serde_json::from_str(body).context("Unexpected contributors API response")?;
    if let Some(e) = resp.error {
        bail!("MediaWiki error {}: {}", e.code, e.info);
    }
    let names = resp
        .query
        .into_iter()
        .flat_map(|q| q.pages)
        .flat_map(|p| p.contributors)
        .map(|c| c.name)
        .collect();
    Ok((names, resp.cont))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_text_is_extracted() {
        let body = r#"{"parse":{"title":"List of intelligence agencies","pageid":1,"text":"<div>hi</div>"}}"#;
        assert_eq!(parse_page_response(body).unwrap(), "<div>hi</div>");
    }

    #[test]
    fn api_error_is_a_fetch_failure() {
        let body = r#"{"error":{"code":"missingtitle","info":"The page you specified doesn't exist."}}"#;
        let err = parse_page_response(body).unwrap_err().to_string();
        assert!(err.contains("missingtitle"), "{err}");
    }

    #[test]
    fn contributors_with_continuation() {
        let body = r#"{
            "continue": {"pccontinue": "12345|678", "continue": "||"},
            "query": {"pages": [{"pageid": 1, "title": "T", "contributors": [
                {"userid": 1, "name": "Alice"}, {"userid": 2, "name": "Bob"}
            ]}]}
        }"#;
        let (names, cont) = parse_contributors_response(body).unwrap();
        assert_eq!(names, vec!["Alice", "Bob"]);
        let cont = cont.unwrap();
        assert_eq!(value_to_param(&cont["pccontinue"]), "12345|678");
    }

    #[test]
    fn last_contributors_page_ends_loop() {
        let body = r#"{"batchcomplete": true, "query": {"pages": [{"pageid": 1, "contributors": [{"userid": 3, "name": "Carol"}]}]}}"#;
        let (names, cont) = parse_contributors_response(body).unwrap();
        assert_eq!(names, vec!["Carol"]);
        assert!(cont.is_none());
    }

    #[test]
    fn retry_policy() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }
}
