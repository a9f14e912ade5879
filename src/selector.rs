//! Choosing which cluster node a request goes to.
//!
//! [`FixedSelector`] always targets one node. [`PooledSelector`] picks a random
//! healthy node and runs two background tasks that bring nodes marked bad
//! back into rotation once a health check passes again.

use std::{
    collections::HashSet,
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use rand::Rng;
use reqwest::Url;
use tokio::{
    runtime::Handle,
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{Result, RqliteError};

/// Source of target URLs for [`crate::RqliteClient`].
pub trait Selector: Send + Sync {
    /// Returns the base URL of the node the next request should go to.
    fn next(&self) -> Result<Url>;
}

pub(crate) fn parse_address(address: &str) -> Result<Url> {
    Url::parse(address).map_err(|err| RqliteError::InvalidAddress {
        address: address.to_owned(),
        reason: err.to_string(),
    })
}

/// Always returns the single address it was built with. Performs no health checks.
#[derive(Clone, Debug)]
pub struct FixedSelector {
    url: Url,
}

impl FixedSelector {
    pub fn new(address: &str) -> Result<Self> {
        Ok(Self {
            url: parse_address(address)?,
        })
    }
}

impl Selector for FixedSelector {
    fn next(&self) -> Result<Url> {
        Ok(self.url.clone())
    }
}

pub type HealthCheckFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Decides whether a node marked bad may be used again.
///
/// Implemented for any `Fn(Url) -> impl Future<Output = bool>` closure.
pub trait HealthCheck: Send + Sync + 'static {
    fn check(&self, url: &Url) -> HealthCheckFuture;
}

impl<F, Fut> HealthCheck for F
where
    F: Fn(Url) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn check(&self, url: &Url) -> HealthCheckFuture {
        Box::pin(self(url.clone()))
    }
}

#[derive(Debug)]
struct Endpoint {
    url: Url,
    healthy: bool,
}

type Endpoints = Arc<RwLock<Vec<Endpoint>>>;

/// Random selection over a fixed pool of nodes with background recovery.
///
/// All endpoints start healthy. [`PooledSelector::mark_bad`] removes one from
/// rotation; every `interval` a prober task runs the health check against the
/// bad endpoints and hands passing ones to a promoter task over a bounded
/// channel. Call [`PooledSelector::close`] to stop and join both tasks.
pub struct PooledSelector {
    endpoints: Endpoints,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for PooledSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSelector")
            .field("healthy", &self.healthy())
            .field("bad", &self.bad())
            .finish()
    }
}

impl PooledSelector {
    /// Builds the pool and spawns its background tasks on the current Tokio runtime.
    ///
    /// Fails with [`RqliteError::InvalidInterval`] for a zero `interval` and
    /// with [`RqliteError::NoRuntime`] when called outside a runtime.
    pub fn new<I, S, H>(addresses: I, health_check: H, interval: Duration) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        H: HealthCheck,
    {
        let mut seen = HashSet::new();
        let mut endpoints = Vec::new();
        for address in addresses {
            let url = parse_address(address.as_ref())?;
            if !seen.insert(url.to_string()) {
                return Err(RqliteError::DuplicateAddress(url.to_string()));
            }
            endpoints.push(Endpoint { url, healthy: true });
        }
        if endpoints.is_empty() {
            return Err(RqliteError::NoAddresses);
        }
        if interval.is_zero() {
            return Err(RqliteError::InvalidInterval);
        }
        let runtime =
            Handle::try_current().map_err(|err| RqliteError::NoRuntime(err.to_string()))?;

        let (promote_tx, promote_rx) = mpsc::channel(endpoints.len());
        let endpoints: Endpoints = Arc::new(RwLock::new(endpoints));
        let shutdown = CancellationToken::new();

        let prober = runtime.spawn(probe_bad_endpoints(
            Arc::clone(&endpoints),
            Arc::new(health_check),
            interval,
            promote_tx,
            shutdown.clone(),
        ));
        let promoter = runtime.spawn(promote_endpoints(
            Arc::clone(&endpoints),
            promote_rx,
            shutdown.clone(),
        ));

        Ok(Self {
            endpoints,
            shutdown,
            tasks: Mutex::new(vec![prober, promoter]),
        })
    }

    /// Removes `url` from rotation until a later health check passes.
    pub fn mark_bad(&self, url: &Url) {
        let mut endpoints = write(&self.endpoints);
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == *url) {
            #[cfg(feature = "tracing")]
            tracing::debug!(endpoint = %url, was_healthy = endpoint.healthy, "endpoint marked bad");
            endpoint.healthy = false;
        }
    }

    /// Snapshot of the endpoints currently in rotation.
    pub fn healthy(&self) -> Vec<Url> {
        self.snapshot(true)
    }

    /// Snapshot of the endpoints currently marked bad.
    pub fn bad(&self) -> Vec<Url> {
        self.snapshot(false)
    }

    /// Stops both background tasks and waits for them to exit.
    ///
    /// Only the first call does any work.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    fn snapshot(&self, healthy: bool) -> Vec<Url> {
        snapshot(&self.endpoints, healthy)
    }
}

impl Selector for PooledSelector {
    fn next(&self) -> Result<Url> {
        let endpoints = read(&self.endpoints);
        let healthy: Vec<&Endpoint> = endpoints.iter().filter(|e| e.healthy).collect();
        if healthy.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("no healthy endpoints available");
            return Err(RqliteError::NoEndpointsAvailable);
        }
        let index = rand::thread_rng().gen_range(0..healthy.len());
        Ok(healthy[index].url.clone())
    }
}

impl Drop for PooledSelector {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn read(endpoints: &Endpoints) -> std::sync::RwLockReadGuard<'_, Vec<Endpoint>> {
    endpoints.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(endpoints: &Endpoints) -> std::sync::RwLockWriteGuard<'_, Vec<Endpoint>> {
    endpoints.write().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot(endpoints: &Endpoints, healthy: bool) -> Vec<Url> {
    read(endpoints)
        .iter()
        .filter(|e| e.healthy == healthy)
        .map(|e| e.url.clone())
        .collect()
}

async fn probe_bad_endpoints(
    endpoints: Endpoints,
    health_check: Arc<dyn HealthCheck>,
    interval: Duration,
    promote: mpsc::Sender<Url>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        // The lock is released before any probe runs.
        let bad = snapshot(&endpoints, false);
        for url in bad {
            let passed = tokio::select! {
                _ = shutdown.cancelled() => return,
                passed = health_check.check(&url) => passed,
            };
            if !passed {
                continue;
            }
            tokio::select! {
                _ = shutdown.cancelled() => return,
                sent = promote.send(url) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

async fn promote_endpoints(
    endpoints: Endpoints,
    mut promote: mpsc::Receiver<Url>,
    shutdown: CancellationToken,
) {
    loop {
        let url = tokio::select! {
            _ = shutdown.cancelled() => return,
            url = promote.recv() => match url {
                Some(url) => url,
                None => return,
            },
        };

        let mut guard = write(&endpoints);
        if let Some(endpoint) = guard.iter_mut().find(|e| e.url == url) {
            #[cfg(feature = "tracing")]
            tracing::debug!(endpoint = %url, "endpoint healthy again");
            endpoint.healthy = true;
        }
    }
}
