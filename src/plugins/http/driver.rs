use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, TE, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use std::time::Duration;

use crate::plugins::registry::{FetchContext, FetchError, FetchResponse, Fetcher};

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Plain GET with a browser-like header set; the image host blocks obvious bots.
pub struct HttpFetcher {
    client: reqwest::Client,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(ctx: &FetchContext) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            headers: Self::build_headers(ctx)?,
            timeout: Duration::from_secs(ctx.timeout_secs.max(1)),
        })
    }

    fn build_headers(ctx: &FetchContext) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_str(&ctx.user_agent)?);
        h.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        h.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        h.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        h.insert("sec-fetch-dest", HeaderValue::from_static("document"));
        h.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        h.insert("sec-fetch-site", HeaderValue::from_static("none"));
        h.insert("sec-fetch-user", HeaderValue::from_static("?1"));
        h.insert(TE, HeaderValue::from_static("trailers"));
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes())?;
            let value = HeaderValue::from_str(v)?;
            h.insert(name, value);
        }
        Ok(h)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str { "http-fetcher" }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let transport = |e: reqwest::Error| FetchError::Transport { url: url.to_string(), source: Box::new(e) };

        let resp = self.client
            .get(parsed)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status().as_u16();
        // Drain the body even on a miss so the connection goes back to the pool.
        let body = resp.bytes().await.map_err(transport)?;
        tracing::debug!(url, status, bytes = body.len(), "fetched");

        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_browser_headers_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo/1/bigphoto/abc/XYZ1_0.jpg"))
            .and(header("user-agent", BROWSER_USER_AGENT))
            .and(header("sec-fetch-mode", "navigate"))
            .and(header("x-extra", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .mount(&server)
            .await;

        let mut headers = HashMap::new();
        headers.insert("X-Extra".to_string(), "1".to_string());
        let ctx = FetchContext { headers, ..FetchContext::default() };
        let fetcher = HttpFetcher::new(&ctx).unwrap();

        let resp = fetcher
            .fetch(&format!("{}/photo/1/bigphoto/abc/XYZ1_0.jpg", server.uri()))
            .await
            .unwrap();
        assert!(resp.is_ok());
        assert_eq!(&resp.body[..], b"jpeg");
    }

    #[tokio::test]
    async fn non_200_status_is_a_response_not_an_error() {
        let server = MockServer::start().await;
        let fetcher = HttpFetcher::new(&FetchContext::default()).unwrap();

        let resp = fetcher.fetch(&format!("{}/missing.jpg", server.uri())).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_ok());
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let fetcher = HttpFetcher::new(&FetchContext::default()).unwrap();

        let err = fetcher.fetch(&format!("http://{addr}/x.jpg")).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }

    #[tokio::test]
    async fn garbage_url_is_a_request_error() {
        let fetcher = HttpFetcher::new(&FetchContext::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }
}
