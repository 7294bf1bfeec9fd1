use std::{io::Write, sync::Arc};

use serde_yaml::Value;
use submerge::{
    fetcher::SubscriptionFetcher, resolver::SystemResolver, MergedDocument, Merger, SiteConfig,
};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SITE_A: &str = r#"
proxies:
  - {name: n1, server: 1.1.1.1, port: 443, type: ss, cipher: aes-128-gcm, password: a}
  - {name: n2, server: 1.1.1.1, port: 443, type: ss, cipher: aes-128-gcm, password: a}
  - {name: shared, server: 1.1.1.2, port: 443, type: trojan, password: from-a}
  - {name: CN-Node-1, server: 1.1.1.3, port: 443, type: trojan, password: a}
  - {name: broken, server: 1.1.1.4, type: trojan}
"#;

const SITE_B: &str = r#"
proxies:
  - {name: shared, server: 2.2.2.2, port: 8443, type: trojan, password: from-b}
  - {name: b-only, server: 2.2.2.3, port: 443, type: vless, uuid: x, reality-opts: {public-key: k, short-id: 0a}}
"#;

async fn serve(server: &MockServer, route: &str, body: &'static str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("User-Agent", "ClashForAndroid/2.5.12"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn names(document: &MergedDocument) -> Vec<&str> {
    document
        .proxies
        .iter()
        .map(|p| p.get("name").and_then(Value::as_str).unwrap())
        .collect()
}

#[tokio::test]
async fn merges_sites_in_declaration_order() {
    let server = MockServer::start().await;
    serve(&server, "/a", SITE_A).await;
    serve(&server, "/b", SITE_B).await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut a = SiteConfig::new(format!("{}/a", server.uri()));
    a.exclusion = vec!["cn".into()];
    let down = SiteConfig::new(format!("{}/down", server.uri()));
    let b = SiteConfig::new(format!("{}/b", server.uri()));

    let merger = Merger::new(
        SubscriptionFetcher::default(),
        Arc::new(SystemResolver::new(2)),
    );
    let merged = merger.run(vec![a, down, b]).await;

    assert_eq!(merged.reports.len(), 3);
    assert_eq!(merged.reports[0].fetched, Some(5));
    assert_eq!(merged.reports[0].kept, 2);
    assert_eq!(merged.reports[1].fetched, None);
    assert_eq!(merged.reports[1].kept, 0);
    assert_eq!(merged.reports[2].kept, 2);

    let document = merged.into_document();
    assert_eq!(names(&document), ["n1", "shared", "b-only"]);
    assert_eq!(
        document.proxies[1].get("password").and_then(Value::as_str),
        Some("from-a")
    );
}

#[tokio::test]
async fn runs_from_a_sources_file() {
    let server = MockServer::start().await;
    serve(&server, "/b", SITE_B).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "sources:\n  - url: {}/b\n    inclusion: [only]\n",
        server.uri()
    )
    .unwrap();

    let merged = submerge::merge_sources(file.path()).await.unwrap();
    assert_eq!(names(&merged.into_document()), ["b-only"]);
}

#[tokio::test]
async fn broken_sources_file_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "sources: {{url: [").unwrap();

    assert!(submerge::merge_sources(file.path()).await.is_err());
}
