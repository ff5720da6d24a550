//! Lazy remote loader for the stdlib type catalog.
//!
//! The manifest is fetched eagerly at construction; module catalogs are
//! fetched on first demand and cached for the life of the registry. A
//! module is downloaded at most once per process: concurrent callers for
//! the same missing module coordinate on a per-key cell so only one HTTP
//! request is ever in flight, and the loser waits for the winner's
//! result.
//!
//! Failures degrade, never abort: a failed manifest fetch leaves the
//! registry in a failed state where every query answers `false`; a failed
//! or checksum-mismatching module fetch disables that one module.

use super::stdlib::{
    resolve_member, verify_checksum, ManifestEntry, MemberKind, StdlibManifest, StdlibModule,
    StdlibQuery,
};
use rustc_hash::FxHashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Default deadline for each HTTP fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning knobs for the remote registry.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Per-request deadline.
    pub timeout: Duration,
    /// Retry a failed fetch once, after a short backoff.
    pub retry: bool,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            retry: false,
        }
    }
}

type ModuleSlot = Arc<OnceLock<Option<Arc<StdlibModule>>>>;

/// Stdlib catalog served from a CDN.
pub struct RemoteStdlibRegistry {
    agent: ureq::Agent,
    /// Directory URL holding `manifest.json` and the module files.
    base: String,
    /// Manifest entries by module name; `None` when the manifest fetch
    /// failed.
    manifest: Option<FxHashMap<String, ManifestEntry>>,
    /// Per-module download slots. The outer lock only guards the map;
    /// fetches run outside it so unrelated modules never serialize.
    cache: Mutex<FxHashMap<String, ModuleSlot>>,
    retry: bool,
}

impl std::fmt::Debug for RemoteStdlibRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStdlibRegistry")
            .field("base", &self.base)
            .field("failed", &self.manifest.is_none())
            .finish_non_exhaustive()
    }
}

impl RemoteStdlibRegistry {
    /// Connects to a catalog for the given Python version, eagerly
    /// fetching `${base}/python${version}/stdlib/v1/manifest.json`.
    ///
    /// Construction never fails: a manifest that cannot be fetched or
    /// parsed leaves the registry in a failed state (see
    /// [`Self::is_failed`]) where all queries return `false`.
    #[must_use]
    pub fn connect(base_url: &str, python_version: &str, options: RemoteOptions) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(options.timeout).build();
        let base = format!(
            "{}/python{python_version}/stdlib/v1",
            base_url.trim_end_matches('/')
        );

        let manifest_url = format!("{base}/manifest.json");
        let manifest = match fetch_bytes(&agent, &manifest_url, options.retry) {
            Ok(bytes) => match serde_json::from_slice::<StdlibManifest>(&bytes) {
                Ok(manifest) => {
                    debug!(
                        modules = manifest.modules.len(),
                        schema = %manifest.schema_version,
                        "loaded stdlib manifest"
                    );
                    Some(
                        manifest
                            .modules
                            .into_iter()
                            .map(|e| (e.name.clone(), e))
                            .collect(),
                    )
                }
                Err(err) => {
                    warn!(url = %manifest_url, %err, "malformed stdlib manifest");
                    None
                }
            },
            Err(err) => {
                warn!(url = %manifest_url, %err, "stdlib manifest fetch failed");
                None
            }
        };

        Self {
            agent,
            base,
            manifest,
            cache: Mutex::new(FxHashMap::default()),
            retry: options.retry,
        }
    }

    /// True when the manifest could not be loaded; every query then
    /// answers `false`.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.manifest.is_none()
    }

    /// Number of modules listed by the manifest.
    #[must_use]
    pub fn manifest_module_count(&self) -> usize {
        self.manifest.as_ref().map_or(0, FxHashMap::len)
    }

    /// Returns the cached module, downloading it on first demand.
    fn module(&self, name: &str) -> Option<Arc<StdlibModule>> {
        let entry = self.manifest.as_ref()?.get(name)?.clone();

        let slot = {
            #[allow(clippy::unwrap_used)]
            let mut cache = self.cache.lock().unwrap();
            Arc::clone(cache.entry(name.to_owned()).or_default())
        };

        // get_or_init blocks concurrent callers for the same module, so
        // at most one request per module is ever in flight.
        slot.get_or_init(|| self.fetch_module(&entry)).clone()
    }

    fn fetch_module(&self, entry: &ManifestEntry) -> Option<Arc<StdlibModule>> {
        let url = format!("{}/{}", self.base, entry.file);
        let bytes = match fetch_bytes(&self.agent, &url, self.retry) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(module = %entry.name, %err, "stdlib module fetch failed");
                return None;
            }
        };

        if let Err(err) = verify_checksum(&entry.name, &bytes, &entry.checksum) {
            warn!(module = %entry.name, %err, "stdlib module rejected");
            return None;
        }

        match serde_json::from_slice::<StdlibModule>(&bytes) {
            Ok(module) => {
                debug!(module = %entry.name, "cached stdlib module");
                Some(Arc::new(module))
            }
            Err(err) => {
                warn!(module = %entry.name, %err, "malformed stdlib module");
                None
            }
        }
    }

    fn resolve(&self, fqn: &str) -> Option<(Arc<StdlibModule>, String, MemberKind)> {
        let manifest = self.manifest.as_ref()?;
        resolve_member(
            fqn,
            &|name: &str| manifest.contains_key(name),
            &|name: &str| self.module(name),
        )
    }
}

impl StdlibQuery for RemoteStdlibRegistry {
    fn validate_fqn(&self, fqn: &str) -> bool {
        self.resolve(fqn).is_some()
    }

    fn return_type(&self, fqn: &str) -> Option<String> {
        let (module, member, kind) = self.resolve(fqn)?;
        if kind == MemberKind::Function {
            module.functions.get(&member)?.return_type.clone()
        } else {
            None
        }
    }
}

/// Fetches a URL to bytes, optionally retrying once with backoff.
fn fetch_bytes(agent: &ureq::Agent, url: &str, retry: bool) -> Result<Vec<u8>, FetchError> {
    match fetch_once(agent, url) {
        Ok(bytes) => Ok(bytes),
        Err(err) if retry => {
            debug!(%url, %err, "retrying fetch after backoff");
            std::thread::sleep(Duration::from_millis(250));
            fetch_once(agent, url)
        }
        Err(err) => Err(err),
    }
}

fn fetch_once(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = agent
        .get(url)
        .call()
        .map_err(|e| FetchError::Http(e.to_string()))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(FetchError::Read)?;
    Ok(bytes)
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("{0}")]
    Http(String),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
}
