pub mod config;

use std::fmt::Display;

pub use config::SiteConfig;
use hashbrown::HashSet;
use serde_yaml::{Mapping, Value};

use crate::{
    fetcher::SubscriptionFetcher, filter::KeywordFilter, proxy::ProxyNode,
    resolver::HostResolver,
};

/// Where a site is in its lifecycle.
#[derive(Debug)]
pub enum SiteState {
    Created,
    /// Raw records retrieved from the endpoint, not yet validated.
    Fetched(Vec<Value>),
    FetchFailed,
    Processed,
}

/// Outcome of one site, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteReport {
    pub name: String,
    pub group: String,
    /// Records retrieved, or `None` when the fetch failed.
    pub fetched: Option<usize>,
    /// Nodes left after validation, filtering and deduplication.
    pub kept: usize,
}

impl Display for SiteReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fetched {
            Some(fetched) => write!(
                f,
                "[{}] {} of {} nodes kept for {}",
                self.name, self.kept, fetched, self.group
            ),
            None => write!(f, "[{}] unavailable", self.name),
        }
    }
}

/// One subscription endpoint and the nodes it contributes to a run.
pub struct Site {
    config: SiteConfig,
    name: String,
    state: SiteState,
    fetched: Option<usize>,
    nodes: Vec<ProxyNode>,
}

impl Site {
    pub fn new(config: SiteConfig) -> Self {
        let name = config.display_name();
        Self {
            config,
            name,
            state: SiteState::Created,
            fetched: None,
            nodes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn state(&self) -> &SiteState {
        &self.state
    }

    /// Retrieves the subscription.
    ///
    /// Failures are logged and leave the site in `FetchFailed`; they are never
    /// returned, so one broken endpoint cannot disturb the others.
    pub async fn fetch(&mut self, fetcher: &SubscriptionFetcher) {
        match fetcher.fetch(&self.config.url).await {
            Ok(records) => self.load(records),
            Err(_e) => {
                #[cfg(feature = "log")]
                log::warn!("[{}] failed to fetch subscription: {}", self.name, _e);
                self.fetched = None;
                self.state = SiteState::FetchFailed;
            }
        }
    }

    /// Uses already retrieved records instead of fetching them.
    pub fn load(&mut self, records: Vec<Value>) {
        #[cfg(feature = "log")]
        log::info!("[{}] fetched {} nodes", self.name, records.len());
        self.fetched = Some(records.len());
        self.state = SiteState::Fetched(records);
    }

    /// Validates, filters and deduplicates the fetched records.
    ///
    /// Every stage keeps the fetched record order. A site that failed to fetch
    /// ends up processed with no nodes.
    ///
    /// # Arguments
    ///
    /// * `resolver`: Used for the `(ip, port)` identity when `dedup` is enabled.
    pub async fn process(&mut self, resolver: &dyn HostResolver) {
        let records = match std::mem::replace(&mut self.state, SiteState::Processed) {
            SiteState::Fetched(records) => records,
            SiteState::Processed => return,
            SiteState::Created | SiteState::FetchFailed => {
                #[cfg(feature = "log")]
                log::info!("[{}] no nodes found", self.name);
                Vec::new()
            }
        };

        let nodes = self.validate(records);
        let nodes = KeywordFilter::new(&self.config.inclusion, &self.config.exclusion).apply(nodes);
        self.nodes = if self.config.dedup {
            self.deduplicate(nodes, resolver).await
        } else {
            nodes
        };

        #[cfg(feature = "log")]
        log::debug!("[{}] {} nodes after processing", self.name, self.nodes.len());
    }

    fn validate(&self, records: Vec<Value>) -> Vec<ProxyNode> {
        records
            .into_iter()
            .filter_map(|record| {
                #[cfg(feature = "log")]
                let label = record_label(&record);
                match ProxyNode::from_value(record) {
                    Ok(node) => Some(node),
                    Err(_e) => {
                        #[cfg(feature = "log")]
                        log::warn!("[{}] skipping invalid node {}: {}", self.name, label, _e);
                        None
                    }
                }
            })
            .collect()
    }

    async fn deduplicate(
        &self, nodes: Vec<ProxyNode>, resolver: &dyn HostResolver,
    ) -> Vec<ProxyNode> {
        let mut seen = HashSet::with_capacity(nodes.len());
        let mut unique = Vec::with_capacity(nodes.len());

        for mut node in nodes {
            match node.identity(resolver).await {
                Some(identity) if seen.insert(identity) => {
                    #[cfg(feature = "log")]
                    log::debug!("[{}] {} is {}", self.name, node.name(), identity);
                    unique.push(node);
                }
                Some(_identity) => {
                    #[cfg(feature = "log")]
                    log::info!(
                        "[{}] dropping duplicate node {} ({})",
                        self.name,
                        node.name(),
                        _identity
                    );
                }
                None => {
                    #[cfg(feature = "log")]
                    log::warn!(
                        "[{}] cannot resolve node {}: {}",
                        self.name,
                        node.name(),
                        node.server()
                    );
                }
            }
        }
        unique
    }

    /// Surviving nodes, in order.
    pub fn nodes(&self) -> &[ProxyNode] {
        &self.nodes
    }

    /// The surviving records exactly as they were received.
    pub fn proxy_data(&self) -> Vec<Mapping> {
        self.nodes.iter().map(|node| node.raw().clone()).collect()
    }

    pub fn into_nodes(self) -> Vec<ProxyNode> {
        self.nodes
    }

    pub fn report(&self) -> SiteReport {
        SiteReport {
            name: self.name.clone(),
            group: self.config.group.clone(),
            fetched: self.fetched,
            kept: self.nodes.len(),
        }
    }
}

#[cfg(feature = "log")]
fn record_label(record: &Value) -> String {
    match record.get("name") {
        Some(Value::String(name)) => name.clone(),
        _ => "unknown".to_owned(),
    }
}
