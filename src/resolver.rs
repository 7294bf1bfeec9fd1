use std::{
    net::{IpAddr, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::Semaphore, task, time};
use trust_dns_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};

use crate::error::ResolutionError;

/// Upper bound for a single lookup, so a hung resolver cannot stall a site.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default size of the blocking lookup pool.
pub const DEFAULT_WORKERS: usize = 4;

/// Turns a host string into one network address.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolutionError>;
}

/// Resolves through the operating system's resolver.
///
/// The lookup itself is blocking, so it runs on tokio's blocking pool and at
/// most `workers` lookups are in flight at once. The calling task is suspended
/// while waiting; the scheduler is not.
pub struct SystemResolver {
    workers: Arc<Semaphore>,
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(workers.max(1))),
            timeout: LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolutionError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| ResolutionError::PoolClosed)?;

        let name = host.to_owned();
        let lookup = task::spawn_blocking(move || {
            // Held until the lookup returns, even if the caller gave up waiting.
            let _permit = permit;
            (name.as_str(), 0)
                .to_socket_addrs()
                .map(|mut addrs| addrs.next())
        });

        match time::timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(Some(addr)))) => Ok(addr.ip()),
            Ok(Ok(Ok(None))) => Err(ResolutionError::NotFound(host.to_owned())),
            Ok(Ok(Err(e))) => Err(ResolutionError::Io(e)),
            Ok(Err(e)) => Err(ResolutionError::Worker(e)),
            Err(_) => Err(ResolutionError::Timeout(host.to_owned())),
        }
    }
}

/// Resolves by querying the given nameservers directly.
pub struct DnsResolver {
    inner: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsResolver {
    /// Creates a resolver that sends plain DNS queries to `nameservers` on port 53.
    pub fn new(nameservers: &[IpAddr]) -> Self {
        let inner = TokioAsyncResolver::tokio(
            ResolverConfig::from_parts(
                None,
                vec![],
                NameServerConfigGroup::from_ips_clear(nameservers, 53, true),
            ),
            ResolverOpts::default(),
        );
        Self {
            inner,
            timeout: LOOKUP_TIMEOUT,
        }
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolutionError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let lookup = time::timeout(self.timeout, self.inner.lookup_ip(host))
            .await
            .map_err(|_| ResolutionError::Timeout(host.to_owned()))??;

        lookup
            .iter()
            .next()
            .ok_or_else(|| ResolutionError::NotFound(host.to_owned()))
    }
}

/// Picks the resolver for a run: direct DNS when nameservers are configured,
/// the system resolver otherwise.
pub fn from_config(nameservers: &[IpAddr], workers: usize) -> Arc<dyn HostResolver> {
    if nameservers.is_empty() {
        Arc::new(SystemResolver::new(workers))
    } else {
        #[cfg(feature = "log")]
        log::debug!("Resolving hosts through {:?}", nameservers);
        Arc::new(DnsResolver::new(nameservers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ip_literals_resolve_to_themselves() {
        let resolver = SystemResolver::default();
        assert_eq!(
            resolver.resolve("1.1.1.1").await.unwrap(),
            "1.1.1.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            resolver.resolve("2001:db8::1").await.unwrap(),
            "2001:db8::1".parse::<IpAddr>().unwrap()
        );

        let dns = DnsResolver::new(&["127.0.0.1".parse().unwrap()]);
        assert_eq!(
            dns.resolve("8.8.8.8").await.unwrap(),
            "8.8.8.8".parse::<IpAddr>().unwrap()
        );
    }

    #[tokio::test]
    async fn localhost_resolves_to_loopback() {
        let ip = SystemResolver::new(1).resolve("localhost").await.unwrap();
        assert!(ip.is_loopback());
    }

    #[tokio::test]
    async fn unknown_host_is_an_error() {
        let resolver = SystemResolver::new(1);
        assert!(resolver.resolve("no-such-host.invalid").await.is_err());
    }

    #[tokio::test]
    async fn single_worker_serves_concurrent_lookups() {
        let resolver = Arc::new(SystemResolver::new(1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve("localhost").await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn configured_resolvers_pass_ip_literals_through() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        for resolver in [
            from_config(&[], 2),
            from_config(&["127.0.0.1".parse().unwrap()], 2),
        ] {
            assert_eq!(resolver.resolve("203.0.113.7").await.unwrap(), ip);
        }
    }
}
