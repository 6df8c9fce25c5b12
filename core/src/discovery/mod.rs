//! Discovery & Reload (§4.A): enumerate test declarations from a user project and
//! invalidate cached state on demand.
//!
//! The engine never assumes in-process code mutation (§9 "Hot reload without a
//! package manager"): [`Discovery::reload`] is the seam a real plugin
//! implementation (dynamic load, embedded runtime, out-of-process helper)
//! would hook into. [`FsDiscovery`] ships a dependency-light realization that
//! treats "test code" as declarative case files rather than embedding a
//! scripting runtime.

mod fs;
mod parser;

use async_trait::async_trait;

pub use fs::FsDiscovery;
pub use parser::{CaseParser, DefaultCaseParser, ParsedTest};

use crate::domain::{CaseSpec, TestDescriptor};
use crate::error::DiscoveryError;

/// Result of a `list_tests()` scan: possibly-partial results plus an optional
/// error describing what could not be loaded (§4.A "Contract").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiscoveryResult {
    pub tests: Vec<TestDescriptor>,
    pub error: Option<String>,
}

/// Enumerates tests and reloads cached source on demand. Also the seam the
/// execution pipeline uses to fetch a test's declared case(s) (§4.C step 1).
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn list_tests(&self) -> DiscoveryResult;

    /// Drops cached source artifacts so the next `list_tests`/`load_case`
    /// observes fresh user code.
    async fn reload(&self);

    /// Loads the case(s) declared by one discovered test. More than one case
    /// is legal at this layer; the pipeline (§9 Open Question) decides what
    /// to do with it.
    async fn load_case(&self, descriptor: &TestDescriptor) -> Result<Vec<CaseSpec>, DiscoveryError>;
}

/// Wraps any [`Discovery`] with the single-writer reload-lock and
/// cold-cache-triggers-scan behavior of §4.A's concurrency clause.
///
/// Uses a `tokio::sync::RwLock` for the cache and a `tokio::sync::Mutex` as
/// the reload/discovery serialization lock, the same lock shape the
/// framework uses for its workspace-store single-writer sections.
pub struct CachedDiscovery<D: Discovery> {
    inner: D,
    cache: tokio::sync::RwLock<Option<DiscoveryResult>>,
    scan_lock: tokio::sync::Mutex<()>,
}

impl<D: Discovery> CachedDiscovery<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            cache: tokio::sync::RwLock::new(None),
            scan_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl<D: Discovery> Discovery for CachedDiscovery<D> {
    async fn list_tests(&self) -> DiscoveryResult {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return cached.clone();
        }
        // Cold cache: serialize against reload/other cold scans, then re-check
        // in case a concurrent caller already populated it while we waited.
        let _guard = self.scan_lock.lock().await;
        if let Some(cached) = self.cache.read().await.as_ref() {
            return cached.clone();
        }
        let result = self.inner.list_tests().await;
        *self.cache.write().await = Some(result.clone());
        result
    }

    async fn reload(&self) {
        let _guard = self.scan_lock.lock().await;
        self.inner.reload().await;
        *self.cache.write().await = None;
    }

    async fn load_case(&self, descriptor: &TestDescriptor) -> Result<Vec<CaseSpec>, DiscoveryError> {
        self.inner.load_case(descriptor).await
    }
}
