use std::time::Duration;

/// Identifies us to subscription servers, which may tailor the document to the client.
pub const DEFAULT_USER_AGENT: &str = "ClashForAndroid/2.5.12";

/// Options for retrieving subscription documents.
#[derive(Debug, Clone)]
pub struct Config {
    /// Time allowed for one whole request, redirects and body included.
    pub request_timeout: Duration,
    /// Value of the `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Maximum number of redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_redirects: 5,
        }
    }
}
