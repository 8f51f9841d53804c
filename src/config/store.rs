use std::sync::{Arc, OnceLock, RwLock};

use tracing::{error, info};

use super::loader::ConfigLoader;
use super::policy::PolicyConfig;
use super::settings::GuardSettings;
use crate::error::ConfigError;

/// Holds the active policy snapshot behind a single swappable reference.
///
/// Readers clone the `Arc` and keep a consistent snapshot for the whole call;
/// reloads build a complete new snapshot before swapping it in.
#[derive(Debug)]
pub struct PolicyStore {
    loader: ConfigLoader,
    active: RwLock<Arc<PolicyConfig>>,
}

impl PolicyStore {
    /// Create a store, loading the initial snapshot (built-in policy if the
    /// document is malformed).
    pub fn new(loader: ConfigLoader) -> Self {
        let initial = loader.load();
        Self {
            loader,
            active: RwLock::new(Arc::new(initial)),
        }
    }

    /// Create a store around an existing snapshot
    pub fn with_config(loader: ConfigLoader, config: PolicyConfig) -> Self {
        Self {
            loader,
            active: RwLock::new(Arc::new(config)),
        }
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        // a poisoned lock still holds a complete snapshot
        let guard = self.active.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Rebuild the snapshot from the loader and swap it in.
    ///
    /// On a malformed document the previous snapshot stays active and the
    /// error is returned.
    pub fn reload(&self) -> Result<Arc<PolicyConfig>, ConfigError> {
        match self.loader.try_load() {
            Ok(config) => {
                let config = self.replace(config);
                info!(summary = ?config.summary(), "policy reloaded");
                Ok(config)
            }
            Err(e) => {
                error!(error = %e, "policy reload failed, keeping previous policy");
                Err(e)
            }
        }
    }

    /// Swap in a prebuilt snapshot
    pub fn replace(&self, config: PolicyConfig) -> Arc<PolicyConfig> {
        let next = Arc::new(config);
        let mut guard = self.active.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&next);
        next
    }
}

static GLOBAL_STORE: OnceLock<Arc<PolicyStore>> = OnceLock::new();

/// Process-wide store, initialized from the environment on first use.
pub fn global_store() -> Arc<PolicyStore> {
    Arc::clone(GLOBAL_STORE.get_or_init(|| {
        let settings = GuardSettings::from_env();
        Arc::new(PolicyStore::new(ConfigLoader::new(settings.policy_path)))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use crate::config::PolicyOverrides;

    #[test]
    fn snapshot_survives_replace() {
        let store = PolicyStore::new(ConfigLoader::builtin_only());
        let before = store.snapshot();

        let overrides = PolicyOverrides {
            dangerous_commands: HashMap::from([("iam".to_string(), vec![])]),
            ..PolicyOverrides::default()
        };
        store.replace(before.with_overrides(overrides).unwrap());

        // the old handle is untouched, new readers see the new tables
        assert!(before.check("aws iam create-user", "aws").is_err());
        assert!(store.snapshot().check("aws iam create-user", "aws").is_ok());
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[dangerous_commands]\niam = []").unwrap();

        let store = PolicyStore::new(ConfigLoader::new(Some(file.path().to_path_buf())));
        assert!(store.snapshot().check("aws iam create-user", "aws").is_ok());

        std::fs::write(file.path(), "[dangerous_commands\n").unwrap();
        assert!(store.reload().is_err());
        assert!(store.snapshot().check("aws iam create-user", "aws").is_ok());
    }

    #[test]
    fn reload_is_idempotent() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[safe_patterns]\ngeneral = [\"--help\"]").unwrap();

        let store = PolicyStore::new(ConfigLoader::new(Some(file.path().to_path_buf())));
        let first = store.reload().unwrap();
        let second = store.reload().unwrap();

        for command in [
            "aws iam create-user",
            "aws iam create-user --dry-run",
            "aws iam create-user --help",
            "aws s3 ls",
            "aws ec2 authorize-security-group-ingress --cidr 0.0.0.0/0 --port 22",
        ] {
            assert_eq!(first.check(command, "aws"), second.check(command, "aws"));
        }
        assert_eq!(first.summary(), second.summary());
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(PolicyStore::new(ConfigLoader::builtin_only()));
        let empty = PolicyConfig::default();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = store.snapshot();
                        let blocked = snapshot.check("aws iam create-user", "aws").is_err();
                        let has_rules = !snapshot.regex_rules("general").is_empty();
                        // builtin has both, the empty policy has neither
                        assert_eq!(blocked, has_rules);
                    }
                })
            })
            .collect();

        for i in 0..50 {
            if i % 2 == 0 {
                store.replace(empty.clone());
            } else {
                store.replace(PolicyConfig::builtin());
            }
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
