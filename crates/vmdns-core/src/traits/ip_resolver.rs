// # IP Resolver Trait
//
// Resolves a hostname to the current IP address of the VM behind it.
// Where the address actually lives (inventory service, state store,
// orchestrator API) is the implementation's business. Resolution must be
// side-effect-free and fast; results are not cached here.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;

/// Trait for hostname-to-IP resolution
///
/// `Ok(None)` means "no address recorded for this VM" and is a deliberate
/// skip for the mutator, not an error. `Err` means the lookup itself
/// broke and is surfaced as [`Error::IpResolver`].
///
/// [`Error::IpResolver`]: crate::Error::IpResolver
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Look up the current IP address for `hostname`
    async fn get_ip(&self, hostname: &str) -> Result<Option<IpAddr>>;
}

/// Fixed in-memory resolver backed by a hostname map
///
/// Serves `vmdnsctl`'s explicit `host=ip` batches and doubles as a test
/// resolver; hostnames absent from the map resolve to `None`.
#[derive(Debug, Clone, Default)]
pub struct StaticIpResolver {
    entries: HashMap<String, IpAddr>,
}

impl StaticIpResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a hostname mapping
    pub fn insert(&mut self, hostname: impl Into<String>, ip: IpAddr) {
        self.entries.insert(hostname.into(), ip);
    }
}

impl FromIterator<(String, IpAddr)> for StaticIpResolver {
    fn from_iter<I: IntoIterator<Item = (String, IpAddr)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IpResolver for StaticIpResolver {
    async fn get_ip(&self, hostname: &str) -> Result<Option<IpAddr>> {
        Ok(self.entries.get(hostname).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_returns_mapped_ip() {
        let mut resolver = StaticIpResolver::new();
        resolver.insert("vm-1.test.example.net", "10.0.0.1".parse().unwrap());

        let ip = resolver.get_ip("vm-1.test.example.net").await.unwrap();
        assert_eq!(ip, Some("10.0.0.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn unknown_hostname_resolves_to_none() {
        let resolver = StaticIpResolver::new();
        assert_eq!(resolver.get_ip("vm-9.test.example.net").await.unwrap(), None);
    }
}
