use anyhow::Context;
use async_trait::async_trait;
use crate::core::model::{ListingInput, ResolvedListing};
use crate::plugins::registry::{ListingResolver, ResolveContext};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Host, numeric bucket, `bigphoto`, a word token and the photo id. The id
/// stops at the first `_`, which is where the per-photo coordinates start.
const SEED_PREFIX: &str = r"https?://[\w.\-]+(?::\d+)?/photo/\d+/bigphoto/\w+/[0-9A-Za-z]+";

fn is_http(u: &Url) -> bool {
    u.scheme() == "http" || u.scheme() == "https"
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([0-9A-Za-z\s#.]+),").expect("title regex"));

static SEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?P<prefix>{})(?:(?:_\d+)*(?P<suffix>_\d+\.jpg))?", SEED_PREFIX)).expect("seed regex")
});

static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_\d+\.jpg").expect("suffix regex"));

static PHOTO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<prefix>{})(?:_\d+)*(?P<suffix>_\d+\.jpg)$",
        SEED_PREFIX.replacen("[0-9A-Za-z]+", "(?P<id>[0-9A-Za-z]+)", 1)
    ))
    .expect("photo regex")
});

/// Scrapes a listing page for the address and the first big-photo url.
pub struct ListingPageResolver;

impl ListingPageResolver {
    /// Leftmost `<title>` match, up to the first comma.
    pub fn extract_address(&self, html: &str) -> anyhow::Result<String> {
        let caps = TITLE_RE
            .captures(html)
            .context("can't find listing address in page <title>")?;
        let address = caps[1].trim().to_string();
        tracing::debug!(%address, "extracted address");
        Ok(address)
    }

    /// Leftmost big-photo url in document order, split into prefix and suffix.
    /// When the url itself carries no `_<n>.jpg` tail, the first such token in
    /// the page is used, and failing that the empty suffix.
    pub fn extract_seed(&self, html: &str) -> anyhow::Result<(String, String)> {
        let caps = SEED_RE
            .captures(html)
            .context("can't find big photo url pattern in page")?;
        let prefix = caps["prefix"].to_string();

        let suffix = match caps.name("suffix") {
            Some(m) => m.as_str().to_string(),
            None => {
                let fallback = SUFFIX_RE.find(html).map(|m| m.as_str().to_string()).unwrap_or_default();
                tracing::debug!(%prefix, suffix = %fallback, "seed url has no suffix, using first one in page");
                fallback
            }
        };

        tracing::debug!(%prefix, %suffix, "extracted seed");
        Ok((prefix, suffix))
    }
}

#[async_trait]
impl ListingResolver for ListingPageResolver {
    fn name(&self) -> &'static str { "listing-page-resolver" }

    fn can_handle(&self, input: &ListingInput) -> u8 {
        match Url::parse(&input.raw) {
            Ok(u) if is_http(&u) => 60,
            _ => 0,
        }
    }

    async fn resolve(&self, input: &ListingInput, ctx: &ResolveContext) -> anyhow::Result<ResolvedListing> {
        let resp = ctx
            .fetcher
            .fetch(&input.raw)
            .await
            .with_context(|| format!("fetch listing page {}", input.raw))?;
        if !resp.is_ok() {
            anyhow::bail!("listing page {} returned status {}", input.raw, resp.status);
        }

        let html = String::from_utf8_lossy(&resp.body);
        let name = self.extract_address(&html)?;
        let (seed_prefix, seed_suffix) = self.extract_seed(&html)?;

        Ok(ResolvedListing { name, seed_prefix, seed_suffix })
    }
}

/// Takes a big-photo url straight from the command line as the seed.
pub struct DirectSeedResolver;

impl DirectSeedResolver {
    fn normalized(raw: &str) -> Option<String> {
        let mut u = Url::parse(raw).ok()?;
        if !is_http(&u) {
            return None;
        }
        u.set_query(None);
        u.set_fragment(None);
        Some(u.to_string())
    }
}

#[async_trait]
impl ListingResolver for DirectSeedResolver {
    fn name(&self) -> &'static str { "direct-seed-resolver" }

    fn can_handle(&self, input: &ListingInput) -> u8 {
        match Self::normalized(&input.raw) {
            Some(u) if PHOTO_RE.is_match(&u) => 90,
            _ => 0,
        }
    }

    async fn resolve(&self, input: &ListingInput, _ctx: &ResolveContext) -> anyhow::Result<ResolvedListing> {
        let u = Self::normalized(&input.raw).context("not an http(s) url")?;
        let caps = PHOTO_RE
            .captures(&u)
            .with_context(|| format!("not a big photo url: {}", input.raw))?;

        Ok(ResolvedListing {
            name: caps["id"].to_string(),
            seed_prefix: caps["prefix"].to_string(),
            seed_suffix: caps["suffix"].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::http::driver::HttpFetcher;
    use crate::plugins::registry::FetchContext;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head>
<title>123 Main St #4, Irvine, CA 92618 | MLS# OC22362195 | Redfin</title>
</head><body>
<img src="https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195_0.jpg">
<img src="https://ssl.cdn-redfin.com/photo/69/bigphoto/777/OTHER999_5.jpg">
</body></html>"#;

    fn input(raw: &str) -> ListingInput {
        ListingInput { raw: raw.to_string() }
    }

    #[test]
    fn address_is_title_up_to_first_comma() {
        let r = ListingPageResolver;
        assert_eq!(r.extract_address(PAGE).unwrap(), "123 Main St #4");
    }

    #[test]
    fn missing_title_is_an_error() {
        let r = ListingPageResolver;
        let err = r.extract_address("<html><body>nothing</body></html>").unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn seed_is_leftmost_photo_url() {
        let r = ListingPageResolver;
        let (prefix, suffix) = r.extract_seed(PAGE).unwrap();
        assert_eq!(prefix, "https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195");
        assert_eq!(suffix, "_0.jpg");
    }

    #[test]
    fn seed_suffix_skips_middle_segment() {
        let r = ListingPageResolver;
        let html = r#"<img src="https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195_3_2.jpg">"#;
        let (prefix, suffix) = r.extract_seed(html).unwrap();
        assert_eq!(prefix, "https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195");
        assert_eq!(suffix, "_2.jpg");
    }

    #[test]
    fn seed_suffix_keeps_zero_padding() {
        let html = r#"<img src="https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195_01.jpg">"#;
        let (_, suffix) = ListingPageResolver.extract_seed(html).unwrap();
        assert_eq!(suffix, "_01.jpg");
    }

    #[test]
    fn seed_suffix_falls_back_to_first_token_in_page() {
        let r = ListingPageResolver;
        let html = r#"<a data-x="thumb_7.jpg"></a>
<meta content="https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195">"#;
        let (_, suffix) = r.extract_seed(html).unwrap();
        assert_eq!(suffix, "_7.jpg");

        let bare = r#"<meta content="https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195">"#;
        let (_, suffix) = r.extract_seed(bare).unwrap();
        assert_eq!(suffix, "");
    }

    #[test]
    fn missing_seed_is_an_error() {
        let r = ListingPageResolver;
        assert!(r.extract_seed("<title>1 A St, X</title>").is_err());
    }

    #[tokio::test]
    async fn resolves_listing_page_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/CA/Irvine/home/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let ctx = ResolveContext { fetcher: Arc::new(HttpFetcher::new(&FetchContext::default()).unwrap()) };
        let listing = ListingPageResolver
            .resolve(&input(&format!("{}/CA/Irvine/home/1", server.uri())), &ctx)
            .await
            .unwrap();

        assert_eq!(listing.name, "123 Main St #4");
        assert_eq!(listing.seed_suffix, "_0.jpg");
    }

    #[tokio::test]
    async fn non_200_listing_page_is_an_error() {
        let server = MockServer::start().await;
        let ctx = ResolveContext { fetcher: Arc::new(HttpFetcher::new(&FetchContext::default()).unwrap()) };

        let err = ListingPageResolver
            .resolve(&input(&format!("{}/gone", server.uri())), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn direct_seed_splits_photo_url() {
        let r = DirectSeedResolver;
        let raw = "https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195_3_2.jpg?w=1";
        assert_eq!(r.can_handle(&input(raw)), 90);

        let ctx = ResolveContext { fetcher: Arc::new(HttpFetcher::new(&FetchContext::default()).unwrap()) };
        let listing = r.resolve(&input(raw), &ctx).await.unwrap();
        assert_eq!(listing.name, "OC22362195");
        assert_eq!(listing.seed_prefix, "https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC22362195");
        assert_eq!(listing.seed_suffix, "_2.jpg");
    }

    #[test]
    fn direct_seed_ignores_listing_pages() {
        let r = DirectSeedResolver;
        assert_eq!(r.can_handle(&input("https://www.redfin.com/CA/Irvine/home/1")), 0);
        assert_eq!(r.can_handle(&input("https://ssl.cdn-redfin.com/photo/69/bigphoto/499/OC1.png")), 0);
    }
}
