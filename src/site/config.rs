use hyper::Uri;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP: &str = "PROXY";
const GITHUB_RAW_HOST: &str = "raw.githubusercontent.com";
const UNKNOWN_SITE: &str = "Unknown";

/// Per-endpoint settings, as written in the sources document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Address of the subscription endpoint.
    pub url: String,
    /// Display name; derived from `url` when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Proxy group the site's nodes are meant for.
    #[serde(default = "default_group")]
    pub group: String,
    /// Keep only nodes matching one of these keywords (optional).
    #[serde(default)]
    pub inclusion: Vec<String>,
    /// Drop nodes matching any of these keywords (optional).
    #[serde(default)]
    pub exclusion: Vec<String>,
    /// Drop nodes that share a resolved `(ip, port)` with an earlier node.
    #[serde(default = "default_dedup")]
    pub dedup: bool,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_owned()
}

fn default_dedup() -> bool {
    true
}

impl SiteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            group: default_group(),
            inclusion: Vec::new(),
            exclusion: Vec::new(),
            dedup: true,
        }
    }

    /// The configured name, or one derived from the URL.
    ///
    /// Raw GitHub content URLs are named after their repository; other URLs after
    /// the second-level label of their host.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => name_from_url(&self.url),
        }
    }
}

fn name_from_url(url: &str) -> String {
    let Ok(uri) = url.parse::<Uri>() else {
        return UNKNOWN_SITE.to_owned();
    };
    let Some(host) = uri.host() else {
        return UNKNOWN_SITE.to_owned();
    };

    let label = if host.contains(GITHUB_RAW_HOST) {
        // /<owner>/<repository>/<ref>/<path>
        uri.path().split('/').nth(2)
    } else {
        let labels: Vec<&str> = host.split('.').collect();
        labels.len().checked_sub(2).map(|i| labels[i])
    };

    match label {
        Some(label) if !label.is_empty() => label.to_owned(),
        _ => UNKNOWN_SITE.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_minimal_entry() {
        let config: SiteConfig = serde_yaml::from_str("url: https://sub.example.com/a").unwrap();
        assert_eq!(config, SiteConfig::new("https://sub.example.com/a"));
        assert_eq!(config.group, "PROXY");
        assert!(config.dedup);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<SiteConfig, _> =
            serde_yaml::from_str("url: https://a.example.com\nfilter: [x]");
        assert!(result.is_err());
    }

    #[test]
    fn explicit_name_wins() {
        let mut config = SiteConfig::new("https://sub.example.com/a");
        config.name = Some("mine".into());
        assert_eq!(config.display_name(), "mine");
    }

    #[test]
    fn derives_name_from_url() {
        let cases = [
            ("https://sub.example.com/api?token=x", "example"),
            ("https://example.co:8443/x", "example"),
            (
                "https://raw.githubusercontent.com/someone/free-nodes/main/clash.yaml",
                "free-nodes",
            ),
            ("https://raw.githubusercontent.com/someone", "Unknown"),
            ("http://localhost:8080/sub", "Unknown"),
            ("not a url", "Unknown"),
        ];
        for (url, expected) in cases {
            assert_eq!(SiteConfig::new(url).display_name(), expected, "{}", url);
        }
    }
}
