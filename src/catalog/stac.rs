//! STAC API client
//!
//! Searches go to `POST {base}/search`. Result pages are followed through
//! their `next` links until the request's item cap is reached. Transient
//! failures (connection errors, timeouts, 5xx and 429 responses) are
//! retried with exponential backoff.

use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::thread;
use std::time::Duration;

use crate::error::{ChipError, ChipResult};

use super::scene::{SceneCandidate, SceneCatalog, SearchRequest};

/// Public Earth Search endpoint
pub const DEFAULT_CATALOG_URL: &str = "https://earth-search.aws.element84.com/v1";

/// Items requested per page
const PAGE_SIZE: usize = 100;

/// Property holding the scene cloud cover percentage
const CLOUD_COVER_PROPERTY: &str = "eo:cloud_cover";

#[derive(Debug, Deserialize)]
struct ItemCollection {
    #[serde(default)]
    features: Vec<StacItem>,
    #[serde(default)]
    links: Vec<StacLink>,
}

#[derive(Debug, Deserialize)]
struct StacItem {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    assets: HashMap<String, StacAsset>,
}

#[derive(Debug, Deserialize)]
struct StacAsset {
    href: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StacLink {
    rel: String,
    href: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    merge: bool,
}

/// How to fetch the page after the current one
#[derive(Debug, Clone, PartialEq)]
pub enum NextPage {
    Get(String),
    Post { href: String, body: Value },
}

/// Candidates and continuation parsed from one search response page
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub candidates: Vec<SceneCandidate>,
    pub next: Option<NextPage>,
}

/// Parse one `ItemCollection` page
///
/// `request_body` is the body of the request that produced the page; POST
/// `next` links with `merge: true` are merged into it.
pub fn parse_search_page(json: &str, request_body: &Value) -> ChipResult<SearchPage> {
    let collection: ItemCollection = serde_json::from_str(json)?;

    let candidates = collection.features.into_iter()
        .filter_map(|item| {
            let cloud_cover = item.properties.get(CLOUD_COVER_PROPERTY).and_then(Value::as_f64);
            let Some(cloud_cover) = cloud_cover else {
                debug!("Ignoring item {} without numeric {}", item.id, CLOUD_COVER_PROPERTY);
                return None;
            };
            let assets: BTreeMap<String, String> = item.assets.into_iter()
                .filter_map(|(key, asset)| asset.href.map(|href| (key, href)))
                .collect();
            Some(SceneCandidate { id: item.id, cloud_cover, assets })
        })
        .collect();

    let next = collection.links.into_iter()
        .find(|link| link.rel == "next")
        .map(|link| next_page(link, request_body));

    Ok(SearchPage { candidates, next })
}

fn next_page(link: StacLink, request_body: &Value) -> NextPage {
    let is_post = link.method.as_deref().is_some_and(|m| m.eq_ignore_ascii_case("POST"));
    if !is_post {
        return NextPage::Get(link.href);
    }

    let body = match (link.body, link.merge) {
        (Some(Value::Object(extra)), true) => {
            let mut merged = request_body.as_object().cloned().unwrap_or_default();
            merged.extend(extra);
            Value::Object(merged)
        }
        (Some(body), false) => body,
        (Some(_), true) | (None, _) => request_body.clone(),
    };
    NextPage::Post { href: link.href, body }
}

/// Blocking STAC API client
#[derive(Clone)]
pub struct StacClient {
    base_url: String,
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl StacClient {
    /// Create a client for a STAC API root
    pub fn new(base_url: &str, timeout_secs: u64) -> ChipResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .user_agent(concat!("chipkit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a client around an existing HTTP client
    pub fn with_client(base_url: &str, client: Client) -> Self {
        StacClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Retry policy for transient failures
    pub fn retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = Duration::from_millis(backoff_ms);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    fn is_transient(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Send a request, retrying transient failures
    fn send<F>(&self, url: &str, build: F) -> ChipResult<String>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(attempt));
            let outcome = build().send();

            match outcome {
                Ok(response) if response.status().is_success() => return Ok(response.text()?),
                Ok(response) if Self::is_transient(response.status()) && attempt < self.max_retries => {
                    warn!("{} returned {}, retrying in {:?}", url, response.status(), delay);
                }
                Ok(response) => return Err(Self::status_error(url, response)),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries => {
                    warn!("Request to {} failed ({}), retrying in {:?}", url, e, delay);
                }
                Err(e) => return Err(ChipError::Http(e)),
            }

            thread::sleep(delay);
            attempt += 1;
        }
    }

    fn status_error(url: &str, response: Response) -> ChipError {
        let status = response.status();
        let text = response.text().unwrap_or_default();
        let snippet: String = text.chars().take(200).collect();
        ChipError::Catalog(format!("{} returned {}: {}", url, status, snippet))
    }
}

impl SceneCatalog for StacClient {
    fn search(&self, request: &SearchRequest) -> ChipResult<Vec<SceneCandidate>> {
        let mut body = request.to_body(PAGE_SIZE);
        let mut next = Some(NextPage::Post { href: self.search_url(), body: body.clone() });
        let mut candidates = Vec::new();
        let mut pages = 0;

        while let Some(page) = next.take() {
            let text = match &page {
                NextPage::Get(href) => self.send(href, || self.client.get(href)),
                NextPage::Post { href, body } => self.send(href, || self.client.post(href).json(body)),
            }?;
            if let NextPage::Post { body: sent, .. } = &page {
                body = sent.clone();
            }

            let parsed = parse_search_page(&text, &body)?;
            pages += 1;
            let returned = parsed.candidates.len();
            candidates.extend(parsed.candidates);

            if candidates.len() >= request.max_items {
                candidates.truncate(request.max_items);
                break;
            }
            // An empty page with a next link would loop forever on some servers
            if returned > 0 {
                next = parsed.next;
            }
        }

        debug!("STAC search returned {} items over {} pages", candidates.len(), pages);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::time_window::TimeWindow;
    use crate::coordinate::Point;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    const PAGE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "id": "S2B_54SUE_20200314_0_L2A",
                "properties": {"eo:cloud_cover": 3.2, "datetime": "2020-03-14T01:35:12Z"},
                "assets": {
                    "red": {"href": "https://bucket.example/red.tif"},
                    "nir08": {"href": "https://bucket.example/nir08.tif"},
                    "thumbnail": {"title": "no href"}
                }
            },
            {"id": "no-cloud", "properties": {}, "assets": {}},
            {"id": "string-cloud", "properties": {"eo:cloud_cover": "low"}}
        ],
        "links": [
            {"rel": "self", "href": "https://stac.example/search"},
            {"rel": "next", "href": "https://stac.example/search", "method": "POST",
             "body": {"next": "token-2"}, "merge": true}
        ]
    }"#;

    #[test]
    fn test_parse_page() {
        let request_body = json!({"collections": ["sentinel-2-l2a"], "limit": 100});
        let page = parse_search_page(PAGE, &request_body).unwrap();

        assert_eq!(page.candidates.len(), 1);
        let scene = &page.candidates[0];
        assert_eq!(scene.id, "S2B_54SUE_20200314_0_L2A");
        assert_eq!(scene.cloud_cover, 3.2);
        assert_eq!(scene.asset("red"), Some("https://bucket.example/red.tif"));
        assert_eq!(scene.asset("thumbnail"), None);

        match page.next {
            Some(NextPage::Post { href, body }) => {
                assert_eq!(href, "https://stac.example/search");
                assert_eq!(body["next"], "token-2");
                assert_eq!(body["collections"][0], "sentinel-2-l2a");
            }
            other => panic!("unexpected next page {:?}", other),
        }
    }

    #[test]
    fn test_get_next_link_and_last_page() {
        let body = json!({});
        let page = parse_search_page(
            r#"{"features": [], "links": [{"rel": "next", "href": "https://stac.example/search?page=2"}]}"#,
            &body,
        ).unwrap();
        assert_eq!(page.next, Some(NextPage::Get("https://stac.example/search?page=2".to_string())));

        let last = parse_search_page(r#"{"features": []}"#, &body).unwrap();
        assert!(last.candidates.is_empty());
        assert_eq!(last.next, None);

        assert!(parse_search_page("<html>", &body).is_err());
    }

    /// Serve canned responses, one connection each, recording request bodies
    ///
    /// `responses` gets the server's base URL so pages can link back to it.
    fn serve<F>(responses: F) -> (String, Arc<Mutex<Vec<String>>>)
    where
        F: FnOnce(&str) -> Vec<(u16, String)>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let responses = responses(&base);
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&bodies);

        thread::spawn(move || {
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                let mut request_body = vec![0u8; content_length];
                reader.read_exact(&mut request_body).unwrap();
                recorded.lock().unwrap().push(String::from_utf8(request_body).unwrap());

                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status, body.len(), body
                ).unwrap();
            }
        });
        (base, bodies)
    }

    fn item(id: &str, cloud: f64) -> Value {
        json!({"id": id, "properties": {"eo:cloud_cover": cloud}, "assets": {"red": {"href": format!("{}.tif", id)}}})
    }

    fn request() -> SearchRequest {
        SearchRequest::new("sentinel-2-l2a", Point::new(139.0, 36.0), TimeWindow::month(2020, 3).unwrap(), 5.0)
    }

    #[test]
    fn test_search_follows_pages_and_retries() {
        let (base, bodies) = serve(|base| vec![
            (503, "{}".to_string()),
            (200, json!({
                "features": [item("a", 4.0)],
                "links": [{"rel": "next", "href": format!("{}/search", base), "method": "POST",
                           "body": {"next": "p2"}, "merge": true}]
            }).to_string()),
            (200, json!({"features": [item("b", 1.0)], "links": []}).to_string()),
        ]);

        let client = StacClient::new(&format!("{}/", base), 5).unwrap().retries(2, 1);
        let candidates = client.search(&request()).unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 3);
        let first: Value = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(first["datetime"], "2020-03-01T00:00:00Z/2020-04-01T00:00:00Z");
        let last: Value = serde_json::from_str(&bodies[2]).unwrap();
        assert_eq!(last["next"], "p2");
        assert_eq!(last["collections"][0], "sentinel-2-l2a");
    }

    #[test]
    fn test_item_cap_stops_paging() {
        let (base, bodies) = serve(|base| vec![
            (200, json!({
                "features": [item("a", 1.0), item("b", 2.0), item("c", 3.0)],
                "links": [{"rel": "next", "href": format!("{}/search?page=2", base)}]
            }).to_string()),
        ]);

        let client = StacClient::new(&base, 5).unwrap();
        let candidates = client.search(&request().max_items(2)).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(bodies.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let (base, _) = serve(|_| vec![(400, r#"{"description": "bad query"}"#.to_string())]);
        let client = StacClient::new(&base, 5).unwrap().retries(3, 1);
        match client.search(&request()) {
            Err(ChipError::Catalog(msg)) => assert!(msg.contains("400")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
