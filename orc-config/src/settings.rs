//! Typed settings read from the process environment after [`crate::load_and_apply`] has run.

use std::path::PathBuf;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_WORKER_COUNT: usize = 4;
const DEFAULT_TASK_QUEUE_CAPACITY: usize = 256;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_DISCOVERY_ROOT: &str = "tests";
const DEFAULT_HISTORY_DB_PATH: &str = "orc-history.sqlite3";

/// Settings the server and CLI read at startup.
#[derive(Clone, Debug)]
pub struct OrcConfig {
    /// Address the HTTP/WS server binds to, e.g. `127.0.0.1:8080`.
    pub listen_addr: String,
    /// Root directory [`FsDiscovery`](../core/discovery) scans for test files.
    pub discovery_root: PathBuf,
    /// Number of worker tasks the job dispatcher spawns.
    pub worker_count: usize,
    /// Capacity of the dispatcher's task queue channel.
    pub task_queue_capacity: usize,
    /// Capacity of the event bus's broadcast channel.
    pub event_queue_capacity: usize,
    /// Path to the sqlite history database file.
    pub history_db_path: PathBuf,
}

impl Default for OrcConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            discovery_root: PathBuf::from(DEFAULT_DISCOVERY_ROOT),
            worker_count: DEFAULT_WORKER_COUNT,
            task_queue_capacity: DEFAULT_TASK_QUEUE_CAPACITY,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            history_db_path: PathBuf::from(DEFAULT_HISTORY_DB_PATH),
        }
    }
}

impl OrcConfig {
    /// Reads settings from the process environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env_string("ORC_LISTEN_ADDR", defaults.listen_addr),
            discovery_root: env_path("ORC_DISCOVERY_ROOT", defaults.discovery_root),
            worker_count: env_usize("ORC_WORKER_COUNT", defaults.worker_count),
            task_queue_capacity: env_usize(
                "ORC_TASK_QUEUE_CAPACITY",
                defaults.task_queue_capacity,
            ),
            event_queue_capacity: env_usize(
                "ORC_EVENT_QUEUE_CAPACITY",
                defaults.event_queue_capacity,
            ),
            history_db_path: env_path("ORC_HISTORY_DB_PATH", defaults.history_db_path),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
