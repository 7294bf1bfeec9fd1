mod config;

pub use config::{Config, DEFAULT_USER_AGENT};
use http_body_util::{BodyExt, Empty};
use hyper::{
    body::Bytes,
    header::{LOCATION, USER_AGENT},
    Request, Uri,
};
use hyper_tls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_yaml::Value;
use tokio::time;

use crate::error::{FetchError, ParseError};

/// Downloads subscription documents and extracts their raw node records.
pub struct SubscriptionFetcher {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>, // Shared by all sites.
    config: Config,
}

impl SubscriptionFetcher {
    pub fn new(config: Config) -> Self {
        let client =
            Client::builder(TokioExecutor::new()).build::<_, Empty<Bytes>>(HttpsConnector::new());
        Self { client, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Retrieves a subscription and returns the records of its `proxies` list.
    ///
    /// # Arguments
    ///
    /// * `url`: Address of the subscription endpoint.
    ///
    /// # Returns
    ///
    /// The raw records in document order. A document without a `proxies` key
    /// yields an empty list.
    pub async fn fetch(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        let timeout = self.config.request_timeout;
        let body = time::timeout(timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;
        Ok(parse_proxies(&body)?)
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        let mut uri = parse_url(url)?;

        for _ in 0..=self.config.max_redirects {
            let request = Request::get(uri.clone())
                .header(USER_AGENT, self.config.user_agent.as_str())
                .body(Empty::<Bytes>::new())
                .map_err(|_| FetchError::InvalidUrl(uri.to_string()))?;

            let response = self.client.request(request).await?;
            let status = response.status();

            if status.is_redirection() {
                if let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                {
                    #[cfg(feature = "log")]
                    log::debug!("{}: redirected to {}", uri, location);
                    uri = redirect_target(&uri, location)?;
                    continue;
                }
            }

            if !status.is_success() {
                return Err(FetchError::Status(status));
            }

            let body = response.into_body().collect().await?.to_bytes();
            return Ok(String::from_utf8_lossy(&body).into_owned());
        }

        Err(FetchError::TooManyRedirects)
    }
}

impl Default for SubscriptionFetcher {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Extracts the `proxies` list from a subscription body.
pub fn parse_proxies(body: &str) -> Result<Vec<Value>, ParseError> {
    let mut document: Value = serde_yaml::from_str(body)?;
    document.apply_merge()?;

    let Value::Mapping(mut document) = document else {
        return Err(ParseError::NotAMapping);
    };
    match document.remove("proxies") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(proxies)) => Ok(proxies),
        Some(_) => Err(ParseError::InvalidProxies),
    }
}

fn parse_url(url: &str) -> Result<Uri, FetchError> {
    match url.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() && uri.host().is_some() => Ok(uri),
        _ => Err(FetchError::InvalidUrl(url.to_owned())),
    }
}

fn redirect_target(base: &Uri, location: &str) -> Result<Uri, FetchError> {
    if let Ok(uri) = location.parse::<Uri>() {
        if uri.scheme().is_some() {
            return Ok(uri);
        }
    }

    let invalid = || FetchError::InvalidUrl(location.to_owned());
    let (Some(scheme), Some(authority)) = (base.scheme_str(), base.authority()) else {
        return Err(invalid());
    };
    let path = if location.starts_with('/') {
        location.to_owned()
    } else {
        let dir = base.path().rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        format!("{}/{}", dir, location)
    };
    format!("{}://{}{}", scheme, authority, path)
        .parse()
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    const SUBSCRIPTION: &str = r#"
port: 7890
proxies:
  - name: hk-01
    type: ss
    server: hk.example.com
    port: 8388
    cipher: aes-256-gcm
    password: pw
  - name: jp-01
    type: trojan
    server: jp.example.com
    port: 443
    password: pw
"#;

    #[test]
    fn parses_proxies_in_order() {
        let proxies = parse_proxies(SUBSCRIPTION).unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0]["name"], Value::String("hk-01".into()));
        assert_eq!(proxies[1]["name"], Value::String("jp-01".into()));
    }

    #[test]
    fn missing_or_null_proxies_is_empty() {
        assert!(parse_proxies("port: 7890").unwrap().is_empty());
        assert!(parse_proxies("proxies: ~").unwrap().is_empty());
    }

    #[test]
    fn rejects_unusable_documents() {
        assert!(matches!(
            parse_proxies("- a\n- b"),
            Err(ParseError::NotAMapping)
        ));
        assert!(matches!(
            parse_proxies("proxies: nope"),
            Err(ParseError::InvalidProxies)
        ));
        assert!(matches!(
            parse_proxies("proxies: [unclosed"),
            Err(ParseError::Yaml(_))
        ));
    }

    #[test]
    fn resolves_relative_redirects() {
        let base: Uri = "https://example.com/api/v1/sub?token=1".parse().unwrap();
        assert_eq!(
            redirect_target(&base, "/other").unwrap().to_string(),
            "https://example.com/other"
        );
        assert_eq!(
            redirect_target(&base, "next.yaml").unwrap().to_string(),
            "https://example.com/api/v1/next.yaml"
        );
        assert_eq!(
            redirect_target(&base, "http://mirror.example.org/sub")
                .unwrap()
                .to_string(),
            "http://mirror.example.org/sub"
        );
    }

    #[tokio::test]
    async fn sends_user_agent_and_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sub"))
            .and(header("User-Agent", DEFAULT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUBSCRIPTION))
            .mount(&server)
            .await;

        let fetcher = SubscriptionFetcher::default();
        let proxies = fetcher
            .fetch(&format!("{}/sub", server.uri()))
            .await
            .unwrap();
        assert_eq!(proxies.len(), 2);
    }

    #[tokio::test]
    async fn follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUBSCRIPTION))
            .mount(&server)
            .await;

        let proxies = SubscriptionFetcher::default()
            .fetch(&format!("{}/old", server.uri()))
            .await
            .unwrap();
        assert_eq!(proxies.len(), 2);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = SubscriptionFetcher::default()
            .fetch(&format!("{}/sub", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(status) if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SUBSCRIPTION)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fetcher = SubscriptionFetcher::new(Config {
            request_timeout: Duration::from_millis(200),
            ..Default::default()
        });
        let err = fetcher
            .fetch(&format!("{}/sub", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn rejects_urls_without_host() {
        let err = SubscriptionFetcher::default()
            .fetch("not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
