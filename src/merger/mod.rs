mod config;

use std::sync::Arc;

pub use config::SourcesConfig;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use tokio::task::JoinHandle;

use crate::{
    fetcher::SubscriptionFetcher,
    resolver::{self, HostResolver},
    site::{Site, SiteConfig, SiteReport},
};

/// Shape of the merged output document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedDocument {
    #[serde(default)]
    pub proxies: Vec<Mapping>,
}

/// Nodes of all sites, unique by name, in site declaration order.
#[derive(Debug, Clone, Default)]
pub struct MergedResult {
    pub proxies: Vec<Mapping>,
    pub reports: Vec<SiteReport>,
}

impl MergedResult {
    pub fn count(&self) -> usize {
        self.proxies.len()
    }

    pub fn into_document(self) -> MergedDocument {
        MergedDocument {
            proxies: self.proxies,
        }
    }
}

/// Runs every site through the pipeline and folds their nodes together.
pub struct Merger {
    fetcher: Arc<SubscriptionFetcher>,
    resolver: Arc<dyn HostResolver>,
}

impl Merger {
    pub fn new(fetcher: SubscriptionFetcher, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            resolver,
        }
    }

    /// Builds a merger with the default fetcher and the resolver the config asks for.
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self::new(
            SubscriptionFetcher::default(),
            resolver::from_config(&config.nameservers, config.resolve_workers),
        )
    }

    /// Fetches all sites concurrently, then processes all sites concurrently,
    /// then merges their nodes.
    ///
    /// Processing starts only once every fetch has finished.
    ///
    /// # Arguments
    ///
    /// * `configs`: The sites, in priority order.
    ///
    /// # Returns
    ///
    /// The merged node list with one report per site.
    pub async fn run(&self, configs: Vec<SiteConfig>) -> MergedResult {
        let sites: Vec<Site> = configs.into_iter().map(Site::new).collect();

        #[cfg(feature = "log")]
        log::debug!("Fetching {} sources", sites.len());
        let sites = self.fetch_all(sites).await;

        #[cfg(feature = "log")]
        log::debug!("Processing {} sources", sites.len());
        let sites = self.process_all(sites).await;

        merge_sites(sites)
    }

    async fn fetch_all(&self, sites: Vec<Site>) -> Vec<Site> {
        let handles = sites
            .into_iter()
            .map(|mut site| {
                let fetcher = Arc::clone(&self.fetcher);
                tokio::spawn(async move {
                    site.fetch(&fetcher).await;
                    site
                })
            })
            .collect();
        join_in_order(handles).await
    }

    async fn process_all(&self, sites: Vec<Site>) -> Vec<Site> {
        let handles = sites
            .into_iter()
            .map(|mut site| {
                let resolver = Arc::clone(&self.resolver);
                tokio::spawn(async move {
                    site.process(resolver.as_ref()).await;
                    site
                })
            })
            .collect();
        join_in_order(handles).await
    }
}

/// Waits for every site task; the barrier between pipeline stages.
///
/// Sites come back in the order their tasks were spawned. A task that panicked
/// loses its site, the rest are unaffected.
async fn join_in_order(handles: Vec<JoinHandle<Site>>) -> Vec<Site> {
    let mut sites = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(site) => sites.push(site),
            Err(_e) => {
                #[cfg(feature = "log")]
                log::error!("site task failed: {}", _e);
            }
        }
    }
    sites
}

/// Folds processed sites into one list where every name appears once.
///
/// Sites are visited in the given order and nodes in their processed order;
/// the first node to claim a name keeps it.
pub fn merge_sites(sites: Vec<Site>) -> MergedResult {
    let reports = sites.iter().map(Site::report).collect();
    let mut names = HashSet::new();
    let mut proxies = Vec::new();

    for site in sites {
        #[cfg(feature = "log")]
        let site_name = site.name().to_owned();
        for node in site.into_nodes() {
            if names.insert(node.name().to_owned()) {
                proxies.push(node.into_raw());
            } else {
                #[cfg(feature = "log")]
                log::debug!("[{}] name {} already taken", site_name, node.name());
            }
        }
    }

    MergedResult { proxies, reports }
}
