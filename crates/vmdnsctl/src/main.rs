// # vmdnsctl - one-shot VM DNS record apply tool
//
// Thin integration layer only: reads configuration from environment
// variables, wires the Cloud DNS backend into `vmdns-core`'s pool and
// mutator, applies one batch of record changes concurrently and exits.
// All DNS logic, pooling and retry policy lives in `vmdns-core`.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `VMDNS_ZONE_NAME`: managed zone holding the records (required)
// - `VMDNS_PROJECT`: Cloud DNS project (required)
// - `VMDNS_API_TOKEN`: OAuth2 bearer token with DNS admin scope (required)
// - `VMDNS_ENSURE`: comma-separated `hostname=ip` pairs to upsert
// - `VMDNS_REMOVE`: comma-separated hostnames to delete
// - `VMDNS_MANAGED_POOLS`: comma-separated VM pool names (pool sizing)
// - `VMDNS_MAX_TRIES`: connection-open attempts (default 3)
// - `VMDNS_RETRY_FACTOR_SECS`: linear backoff factor (default 10)
// - `VMDNS_TASK_LIMIT`: concurrent task bound (default 10)
// - `VMDNS_LEASE_TIMEOUT_SECS`: pool lease timeout (default 60)
// - `VMDNS_LOG_LEVEL`: trace|debug|info|warn|error (default info)
// - `VMDNS_VERBOSE_ECHO`: mirror mutator debug lines to stdout
//
// ## Example
//
// ```bash
// export VMDNS_ZONE_NAME=test.example.net
// export VMDNS_PROJECT=vm-fleet-staging
// export VMDNS_API_TOKEN=$(gcloud auth print-access-token)
// export VMDNS_ENSURE=vm-8.test.example.net=10.0.4.8
// export VMDNS_REMOVE=vm-3.test.example.net
//
// vmdnsctl
// ```

use anyhow::{Context, Result};
use std::env;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use vmdns_core::{ConnectionPool, DnsConfig, RecordMutator, StaticIpResolver};
use vmdns_core::traits::LogMetricsSink;
use vmdns_provider_clouddns::ClouddnsFactory;

/// Exit codes for the different termination scenarios
#[derive(Debug, Clone, Copy)]
enum VmdnsExitCode {
    /// Every requested change applied
    Clean = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// One or more record changes failed
    RuntimeError = 2,
}

impl From<VmdnsExitCode> for ExitCode {
    fn from(code: VmdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration, straight from the environment
struct Config {
    zone_name: String,
    project: String,
    api_token: String,
    ensure: Vec<(String, IpAddr)>,
    remove: Vec<String>,
    managed_pools: Vec<String>,
    max_tries: Option<u32>,
    retry_factor_secs: Option<u64>,
    task_limit: Option<usize>,
    lease_timeout_secs: Option<u64>,
    log_level: String,
    verbose_echo: bool,
}

impl Config {
    fn from_env() -> Result<Self> {
        Ok(Self {
            zone_name: env::var("VMDNS_ZONE_NAME").context("VMDNS_ZONE_NAME is required")?,
            project: env::var("VMDNS_PROJECT").context("VMDNS_PROJECT is required")?,
            api_token: env::var("VMDNS_API_TOKEN").context("VMDNS_API_TOKEN is required")?,
            ensure: parse_ensure(&env::var("VMDNS_ENSURE").unwrap_or_default())?,
            remove: parse_list(&env::var("VMDNS_REMOVE").unwrap_or_default()),
            managed_pools: parse_list(&env::var("VMDNS_MANAGED_POOLS").unwrap_or_default()),
            max_tries: parse_env("VMDNS_MAX_TRIES")?,
            retry_factor_secs: parse_env("VMDNS_RETRY_FACTOR_SECS")?,
            task_limit: parse_env("VMDNS_TASK_LIMIT")?,
            lease_timeout_secs: parse_env("VMDNS_LEASE_TIMEOUT_SECS")?,
            log_level: env::var("VMDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            verbose_echo: env::var("VMDNS_VERBOSE_ECHO").is_ok_and(|v| v == "1" || v == "true"),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            anyhow::bail!("VMDNS_API_TOKEN cannot be empty");
        }
        if self.ensure.is_empty() && self.remove.is_empty() {
            anyhow::bail!(
                "nothing to do: set VMDNS_ENSURE (hostname=ip,...) and/or VMDNS_REMOVE (hostname,...)"
            );
        }
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!(
                "VMDNS_LOG_LEVEL '{other}' is not valid. Valid levels: trace, debug, info, warn, error"
            ),
        }
        Ok(())
    }

    /// Build the core configuration, applying environment overrides over
    /// the library defaults, and run its own validation
    fn dns_config(&self) -> Result<DnsConfig> {
        let mut config = DnsConfig::new(&self.zone_name, &self.project);
        config.managed_pools = self.managed_pools.clone();
        config.verbose_local_echo = self.verbose_echo;
        if let Some(max_tries) = self.max_tries {
            config.max_tries = max_tries;
        }
        if let Some(retry_factor_secs) = self.retry_factor_secs {
            config.retry_factor_secs = retry_factor_secs;
        }
        if let Some(task_limit) = self.task_limit {
            config.task_limit = task_limit;
        }
        if let Some(lease_timeout_secs) = self.lease_timeout_secs {
            config.lease_timeout_secs = lease_timeout_secs;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_ensure(raw: &str) -> Result<Vec<(String, IpAddr)>> {
    parse_list(raw)
        .into_iter()
        .map(|pair| {
            let (hostname, ip) = pair
                .split_once('=')
                .with_context(|| format!("VMDNS_ENSURE entry '{pair}' is not hostname=ip"))?;
            let ip = ip
                .trim()
                .parse()
                .with_context(|| format!("VMDNS_ENSURE entry '{pair}' has an invalid ip"))?;
            Ok((hostname.trim().to_string(), ip))
        })
        .collect()
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => Ok(Some(
            raw.parse()
                .with_context(|| format!("{name} '{raw}' is not a valid value"))?,
        )),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return VmdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("configuration validation error: {e:#}");
        return VmdnsExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {e}");
        return VmdnsExitCode::ConfigError.into();
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {e}");
            return VmdnsExitCode::RuntimeError.into();
        }
    };

    runtime.block_on(async {
        match apply(config).await {
            Ok(()) => VmdnsExitCode::Clean.into(),
            Err(e) => {
                error!("{e:#}");
                VmdnsExitCode::RuntimeError.into()
            }
        }
    })
}

/// Apply the configured batch of record changes over one shared pool
async fn apply(config: Config) -> Result<()> {
    let dns_config = config.dns_config()?;
    info!(
        zone = %dns_config.zone_name,
        project = %dns_config.project,
        ensure = config.ensure.len(),
        remove = config.remove.len(),
        "applying record changes"
    );

    let factory = ClouddnsFactory::new(&config.project, &config.api_token);
    let pool = Arc::new(ConnectionPool::new(
        factory,
        Arc::new(LogMetricsSink),
        &dns_config,
    ));
    let resolver: StaticIpResolver = config.ensure.iter().cloned().collect();
    let mutator = Arc::new(RecordMutator::new(pool, resolver, &dns_config));

    let mut tasks = JoinSet::new();
    for (hostname, _) in &config.ensure {
        let mutator = Arc::clone(&mutator);
        let hostname = hostname.clone();
        tasks.spawn(async move {
            let result = mutator.create_or_replace(&hostname).await;
            ("ensure", hostname, result)
        });
    }
    for hostname in &config.remove {
        let mutator = Arc::clone(&mutator);
        let hostname = hostname.clone();
        tasks.spawn(async move {
            let result = mutator.delete(&hostname).await;
            ("remove", hostname, result)
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (operation, hostname, result) = joined.context("record task panicked")?;
        match result {
            Ok(()) => info!(operation, hostname = %hostname, "record change applied"),
            Err(e) => {
                failures += 1;
                error!(operation, hostname = %hostname, error = %e, "record change failed");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} record change(s) failed");
    }
    info!("all record changes applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_pairs_parse_into_hostname_and_ip() {
        let pairs = parse_ensure("vm-1.test.example.net=10.0.0.1, vm-2.test.example.net=10.0.0.2")
            .expect("valid pairs parse");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "vm-1.test.example.net");
        assert_eq!(pairs[0].1, "10.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn malformed_ensure_entries_are_rejected() {
        assert!(parse_ensure("vm-1.test.example.net").is_err(), "missing ip");
        assert!(parse_ensure("vm-1.test.example.net=not-an-ip").is_err());
    }

    #[test]
    fn empty_lists_parse_to_nothing() {
        assert!(parse_list("").is_empty());
        assert!(parse_ensure("").expect("empty is fine").is_empty());
    }
}
