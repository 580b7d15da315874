//! Action Registry: loads `{keys, command}` records from a directory,
//! compiles each key to a regex, and answers `find(instruction)` against an
//! atomically-swapped immutable snapshot (spec §4.6).
//!
//! Grounded on `original_source/src/action.py`'s `Action.compile_regexes`
//! and `ActionRegistry.load_actions`/`find`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use regex::Regex;
use serde::Deserialize;

use crate::error::RegistryLoadError;

#[derive(Debug, Deserialize)]
struct ActionRecord {
    keys: Vec<String>,
    command: serde_json::Value,
}

/// A loaded action: its compiled patterns and opaque command payload.
#[derive(Debug, Clone)]
pub struct Action {
    pub keys: Vec<String>,
    pub command: serde_json::Value,
    patterns: Vec<Regex>,
}

impl Action {
    /// A key wrapped in `/…/` is used verbatim as a regex; any other key is
    /// wrapped as `.*<key>.*` (spec §3).
    fn compile(
        keys: Vec<String>,
        command: serde_json::Value,
        file_path: &str,
    ) -> Result<Self, RegistryLoadError> {
        let mut patterns = Vec::with_capacity(keys.len());
        for key in &keys {
            let pattern_str = if key.starts_with('/') && key.ends_with('/') && key.len() >= 2 {
                key[1..key.len() - 1].to_string()
            } else {
                format!(".*{key}.*")
            };
            let pattern = Regex::new(&pattern_str).map_err(|source| RegistryLoadError::InvalidPattern {
                path: file_path.to_string(),
                key: key.clone(),
                source,
            })?;
            patterns.push(pattern);
        }
        Ok(Self {
            keys,
            command,
            patterns,
        })
    }

    /// Returns the first pattern match against the (already lowercased)
    /// instruction text, if any.
    pub fn matches(&self, lowercased_instruction: &str) -> Option<regex::Match<'_>> {
        self.patterns
            .iter()
            .find_map(|p| p.find(lowercased_instruction))
    }
}

struct LoadedFile {
    action: Action,
    modified: SystemTime,
}

struct Snapshot {
    files: BTreeMap<String, LoadedFile>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    fn actions(&self) -> impl Iterator<Item = &Action> {
        self.files.values().map(|f| &f.action)
    }
}

/// Reads every regular file in `directory`, compiles it, and assembles a
/// filename-keyed map. Files that fail to parse are logged and skipped
/// (spec §4.6) rather than aborting the load.
fn load_directory(directory: &Path) -> BTreeMap<String, LoadedFile> {
    let mut files = BTreeMap::new();
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %directory.display(), error = %e, "action directory unreadable");
            return files;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        match load_one(&path) {
            Ok(action) => {
                files.insert(name, LoadedFile { action, modified });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not load action");
            }
        }
    }
    files
}

fn load_one(path: &Path) -> Result<Action, RegistryLoadError> {
    let display_path = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| RegistryLoadError::Io {
        path: display_path.clone(),
        source,
    })?;
    let record: ActionRecord =
        serde_json::from_str(&content).map_err(|source| RegistryLoadError::Parse {
            path: display_path.clone(),
            source,
        })?;
    Action::compile(record.keys, record.command, &display_path)
}

/// Matches user-defined action patterns against transcribed instructions.
/// Reads (`find`) and the background reloader may run on different threads;
/// consistency is provided by swapping an immutable `Arc<Snapshot>`.
pub struct ActionRegistry {
    directory: PathBuf,
    snapshot: ArcSwap<Snapshot>,
}

impl ActionRegistry {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
        }
    }

    /// One-shot full load, replacing the snapshot wholesale.
    pub fn load_once(&self) {
        let files = load_directory(&self.directory);
        let count = files.len();
        self.snapshot.store(Arc::new(Snapshot { files }));
        tracing::info!(count, directory = %self.directory.display(), "action registry loaded");
    }

    /// Runs forever on the calling thread, rescanning every `interval` and
    /// reloading any file whose modification time is newer than what's
    /// stored (or a file not seen before). Deletions are not reflected — an
    /// explicit minimum per spec §4.6 ("add/update only").
    pub fn run_periodic_reload(&self, interval: Duration) {
        loop {
            std::thread::sleep(interval);
            self.reload_changed();
        }
    }

    /// Spawns the periodic reloader on its own background thread and
    /// returns immediately (spec §4.6 `start_periodic_reload`). The
    /// returned handle runs for the life of the process; the registry is
    /// shared via `Arc` with readers on the Listener/Dispatcher thread.
    pub fn start_periodic_reload(
        self: &Arc<Self>,
        interval: Duration,
    ) -> std::thread::JoinHandle<()> {
        let registry = self.clone();
        std::thread::Builder::new()
            .name("action-registry-reload".into())
            .spawn(move || registry.run_periodic_reload(interval))
            .expect("failed to spawn action registry reload thread")
    }

    fn reload_changed(&self) {
        let current = self.snapshot.load();
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.directory.display(), error = %e, "action directory unreadable during reload");
                return;
            }
        };

        let mut updated: BTreeMap<String, LoadedFile> = current
            .files
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    LoadedFile {
                        action: v.action.clone(),
                        modified: v.modified,
                    },
                )
            })
            .collect();
        let mut changed = false;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            let needs_reload = match updated.get(&name) {
                Some(existing) => modified > existing.modified,
                None => true,
            };
            if !needs_reload {
                continue;
            }

            match load_one(&path) {
                Ok(action) => {
                    updated.insert(name, LoadedFile { action, modified });
                    changed = true;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not reload action");
                }
            }
        }

        if changed {
            let count = updated.len();
            self.snapshot.store(Arc::new(Snapshot { files: updated }));
            tracing::info!(count, "action registry reloaded");
        }
    }

    /// Returns the first action whose any pattern matches `instruction`
    /// (lowercased internally), together with the regex match span's text.
    pub fn find(&self, instruction: &str) -> Option<(Action, String)> {
        let lowered = instruction.to_lowercase();
        let snapshot = self.snapshot.load();
        for action in snapshot.actions() {
            if let Some(m) = action.matches(&lowered) {
                let matched_text = m.as_str().to_string();
                return Some((action.clone(), matched_text));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_action(dir: &Path, filename: &str, keys: &[&str], command: &str) {
        let path = dir.join(filename);
        let mut f = std::fs::File::create(path).unwrap();
        let body = serde_json::json!({ "keys": keys, "command": command });
        write!(f, "{}", body).unwrap();
    }

    #[test]
    fn test_load_once_and_find() {
        let dir = tempfile::tempdir().unwrap();
        write_action(dir.path(), "lights.json", &["turn off the lights"], "lights_off");

        let registry = ActionRegistry::new(dir.path());
        registry.load_once();

        let found = registry.find("please turn off the lights now");
        assert!(found.is_some());
        let (action, _) = found.unwrap();
        assert_eq!(action.command, serde_json::json!("lights_off"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        write_action(dir.path(), "lights.json", &["turn off the lights"], "lights_off");

        let registry = ActionRegistry::new(dir.path());
        registry.load_once();

        assert!(registry.find("make coffee").is_none());
    }

    #[test]
    fn test_verbatim_regex_key() {
        let dir = tempfile::tempdir().unwrap();
        write_action(dir.path(), "exact.json", &["/^hello$/"], "greet");

        let registry = ActionRegistry::new(dir.path());
        registry.load_once();

        assert!(registry.find("hello").is_some());
        assert!(registry.find("well hello there").is_none());
    }

    #[test]
    fn test_malformed_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        write_action(dir.path(), "ok.json", &["turn on the fan"], "fan_on");

        let registry = ActionRegistry::new(dir.path());
        registry.load_once();

        assert!(registry.find("turn on the fan please").is_some());
    }

    #[test]
    fn test_reload_picks_up_updated_file() {
        let dir = tempfile::tempdir().unwrap();
        write_action(dir.path(), "a.json", &["alpha"], "v1");

        let registry = ActionRegistry::new(dir.path());
        registry.load_once();
        assert!(registry.find("alpha").is_some());

        std::thread::sleep(Duration::from_millis(10));
        write_action(dir.path(), "a.json", &["bravo"], "v2");
        registry.reload_changed();

        assert!(registry.find("bravo").is_some());
    }

    #[test]
    fn test_idempotent_load() {
        let dir = tempfile::tempdir().unwrap();
        write_action(dir.path(), "a.json", &["alpha"], "v1");

        let registry = ActionRegistry::new(dir.path());
        registry.load_once();
        let first = registry.find("alpha").map(|(a, _)| a.command);
        registry.load_once();
        let second = registry.find("alpha").map(|(a, _)| a.command);
        assert_eq!(first, second);
    }
}
