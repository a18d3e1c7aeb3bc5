//! Naming registry backends and the server's registration lifecycle.
//!
//! [`Registration`] advertises the server when it starts listening,
//! refreshes the entry on a heartbeat so it outlives the registry TTL, and
//! removes it exactly once during shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use janus_core::{BoxFuture, NamingRegistry, RegistryError};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
struct Entry {
    address: String,
    expires_at: Instant,
}

/// In-process registry with TTL expiry.
///
/// Useful for tests and single-host deployments. Entries expire `ttl`
/// after their last registration.
#[derive(Debug)]
pub struct MemoryRegistry {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    registrations: AtomicUsize,
    deregistrations: AtomicUsize,
}

impl MemoryRegistry {
    /// Creates a registry whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            registrations: AtomicUsize::new(0),
            deregistrations: AtomicUsize::new(0),
        }
    }

    /// Returns the live address of `service`, if any.
    #[must_use]
    pub fn lookup(&self, service: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(service)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.address.clone())
    }

    /// Number of `register` calls, heartbeats included.
    #[must_use]
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Number of `deregister` calls.
    #[must_use]
    pub fn deregistrations(&self) -> usize {
        self.deregistrations.load(Ordering::SeqCst)
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl NamingRegistry for MemoryRegistry {
    fn register<'a>(
        &'a self,
        service: &'a str,
        address: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().insert(
                service.to_string(),
                Entry {
                    address: address.to_string(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
            Ok(())
        })
    }

    fn deregister<'a>(&'a self, service: &'a str) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async move {
            self.deregistrations.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().remove(service);
            Ok(())
        })
    }
}

/// Registry that accepts everything and stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

impl NamingRegistry for NoopRegistry {
    fn register<'a>(
        &'a self,
        _service: &'a str,
        _address: &'a str,
    ) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async { Ok(()) })
    }

    fn deregister<'a>(&'a self, _service: &'a str) -> BoxFuture<'a, Result<(), RegistryError>> {
        Box::pin(async { Ok(()) })
    }
}

/// A live advertisement of this server in a naming registry.
pub struct Registration {
    registry: Arc<dyn NamingRegistry>,
    service: String,
    timeout: Duration,
    heartbeat: Option<JoinHandle<()>>,
}

impl Registration {
    /// Registers `service` at `address` and starts the heartbeat.
    ///
    /// A failed first registration is logged; the heartbeat keeps trying,
    /// and the server serves traffic either way.
    pub async fn start(
        registry: Arc<dyn NamingRegistry>,
        service: &str,
        address: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        match call_with_timeout(timeout, registry.register(service, address)).await {
            Ok(()) => tracing::info!(service, address, "registered with naming registry"),
            Err(error) => tracing::warn!(service, address, %error, "naming registration failed"),
        }

        let period = (ttl / 2).max(MIN_HEARTBEAT);
        let heartbeat = {
            let registry = Arc::clone(&registry);
            let service = service.to_string();
            let address = address.to_string();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(error) =
                        call_with_timeout(timeout, registry.register(&service, &address)).await
                    {
                        tracing::warn!(service = %service, %error, "naming heartbeat failed");
                    }
                }
            })
        };

        Self {
            registry,
            service: service.to_string(),
            timeout,
            heartbeat: Some(heartbeat),
        }
    }

    /// Returns the advertised service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Stops the heartbeat and removes the advertisement.
    ///
    /// The heartbeat task is fully stopped before deregistering, so a
    /// refresh already in flight cannot land after the removal. Consuming
    /// `self` makes a second deregistration impossible.
    pub async fn stop(mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
            // Cancellation is the expected outcome.
            let _ = heartbeat.await;
        }
        match call_with_timeout(self.timeout, self.registry.deregister(&self.service)).await {
            Ok(()) => tracing::info!(service = %self.service, "deregistered from naming registry"),
            Err(error) => {
                tracing::warn!(service = %self.service, %error, "naming deregistration failed");
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("service", &self.service)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

async fn call_with_timeout(
    timeout: Duration,
    call: BoxFuture<'_, Result<(), RegistryError>>,
) -> Result<(), RegistryError> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(RegistryError::Timeout(timeout)))
}
