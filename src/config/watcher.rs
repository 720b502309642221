//! Applies config file changes to a running server.
//!
//! Two settings are live: the shutdown timeout (sampled when `stop` begins)
//! and the compression referrer allow-list (read per request). Any other
//! change is logged and waits for a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::config::loader::load_config;
use crate::config::schema::{HttpConfig, ServerConfig};
use crate::http::compression::ReferrerAllowList;

/// Settings that can change without restarting the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSettings {
    pub shutdown_timeout: Duration,
    pub compression_referrers: Option<Vec<String>>,
}

impl LiveSettings {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            shutdown_timeout: config.shutdown_timeout(),
            compression_referrers: config.compression.referrer_whitelist.clone(),
        }
    }
}

/// Where reloaded settings are published.
#[derive(Debug, Clone)]
pub struct ReloadTargets {
    pub shutdown_timeout: watch::Sender<Duration>,
    pub compression_referrers: ReferrerAllowList,
}

impl ReloadTargets {
    /// Publish the settings of `config` that differ from `applied`.
    /// Returns the names of the settings that changed.
    pub fn apply(&self, applied: &mut LiveSettings, config: &ServerConfig) -> Vec<&'static str> {
        let next = LiveSettings::from_config(&config.http);
        let mut changed = Vec::new();

        if next.shutdown_timeout != applied.shutdown_timeout {
            let _ = self.shutdown_timeout.send(next.shutdown_timeout);
            changed.push("shutdown_timeout");
        }
        if next.compression_referrers != applied.compression_referrers {
            self.compression_referrers
                .replace(next.compression_referrers.clone());
            changed.push("compression.referrer_whitelist");
        }

        *applied = next;
        changed
    }
}

pub struct ConfigWatcher {
    path: PathBuf,
    targets: ReloadTargets,
    applied: LiveSettings,
}

impl ConfigWatcher {
    /// `current` is the config the server was set up with.
    pub fn new(path: &Path, current: &ServerConfig, targets: ReloadTargets) -> Self {
        Self {
            path: path.to_path_buf(),
            targets,
            applied: LiveSettings::from_config(&current.http),
        }
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            targets,
            mut applied,
        } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(config) => {
                            let changed = targets.apply(&mut applied, &config);
                            if changed.is_empty() {
                                tracing::info!(path = ?path, "Config reloaded; settings other than the shutdown timeout and compression referrers apply after a restart");
                            } else {
                                tracing::info!(path = ?path, changed = ?changed, "Config reloaded");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config; keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ShutdownTimeout;

    fn config(shutdown_timeout_ms: u64, referrers: Option<&[&str]>) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.http.shutdown_timeout_ms = shutdown_timeout_ms;
        config.http.compression.referrer_whitelist =
            referrers.map(|list| list.iter().map(|s| s.to_string()).collect());
        config
    }

    #[test]
    fn only_changed_settings_are_published() {
        let initial = config(30_000, None);
        let (tx, shutdown_timeout) = ShutdownTimeout::channel(initial.http.shutdown_timeout());
        let referrers = ReferrerAllowList::new(None);
        let targets = ReloadTargets {
            shutdown_timeout: tx,
            compression_referrers: referrers.clone(),
        };
        let mut applied = LiveSettings::from_config(&initial.http);

        assert!(targets.apply(&mut applied, &initial).is_empty());

        let changed = targets.apply(&mut applied, &config(5_000, None));
        assert_eq!(changed, vec!["shutdown_timeout"]);
        assert_eq!(shutdown_timeout.sample(), Duration::from_secs(5));
        assert!(referrers.current().is_none());

        let changed = targets.apply(&mut applied, &config(5_000, Some(&["a.example"])));
        assert_eq!(changed, vec!["compression.referrer_whitelist"]);
        assert_eq!(
            referrers.current().as_deref(),
            Some(&vec!["a.example".to_string()])
        );
    }

    #[tokio::test]
    async fn file_change_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[http]\nshutdown_timeout_ms = 30000\n").unwrap();

        let initial = load_config(&path).unwrap();
        let (tx, shutdown_timeout) = ShutdownTimeout::channel(initial.http.shutdown_timeout());
        let targets = ReloadTargets {
            shutdown_timeout: tx,
            compression_referrers: ReferrerAllowList::new(None),
        };
        let _watcher = ConfigWatcher::new(&path, &initial, targets).run().unwrap();

        std::fs::write(&path, "[http]\nshutdown_timeout_ms = 1500\n").unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while shutdown_timeout.sample() != Duration::from_millis(1500) {
            assert!(tokio::time::Instant::now() < deadline, "reload was not applied");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
