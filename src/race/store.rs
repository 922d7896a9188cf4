//! Result Store
//!
//! Persists one result set per race and guarantees at most one is ever
//! committed, even when several simulations for the same race finish at
//! the same time.
//!
//! ## Layers
//!
//! ```text
//! ResultStore
//! ├── per-race write lock   - serialises create_if_absent per race
//! ├── read cache            - written through on commit, never holds "empty"
//! └── ResultBackend         - MemoryBackend | FileBackend
//! ```
//!
//! The backend's `insert_new` is itself insert-if-absent, so two stores
//! sharing one data directory still cannot both commit.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::RaceError;
use super::model::{RaceId, ResultSet};

/// Result store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A backend lock was poisoned by a panicking writer.
    #[error("Backend lock poisoned")]
    Poisoned,

    /// Empty sets are never committed.
    #[error("Refusing to store an empty result set for race {0}")]
    EmptyResultSet(RaceId),

    /// Candidate belongs to another race.
    #[error("Result set for race {found} offered for race {expected}")]
    RaceMismatch {
        /// Race the caller asked for.
        expected: RaceId,
        /// Race the candidate belongs to.
        found: RaceId,
    },
}

impl From<StoreError> for RaceError {
    fn from(err: StoreError) -> Self {
        RaceError::Unavailable(err.to_string())
    }
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Durable storage behind the result store.
pub trait ResultBackend: Send + Sync {
    /// Load the committed set for a race, if any.
    fn load(&self, race_id: RaceId) -> Result<Option<ResultSet>, StoreError>;

    /// Commit `set` unless one already exists for its race.
    ///
    /// Returns `None` when `set` was committed, or the previously
    /// committed set otherwise. Never overwrites.
    fn insert_new(&self, set: &ResultSet) -> Result<Option<ResultSet>, StoreError>;
}

/// In-process backend.
#[derive(Default)]
pub struct MemoryBackend {
    sets: StdMutex<BTreeMap<RaceId, ResultSet>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultBackend for MemoryBackend {
    fn load(&self, race_id: RaceId) -> Result<Option<ResultSet>, StoreError> {
        let sets = self.sets.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(sets.get(&race_id).cloned())
    }

    fn insert_new(&self, set: &ResultSet) -> Result<Option<ResultSet>, StoreError> {
        let mut sets = self.sets.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(existing) = sets.get(&set.race_id) {
            return Ok(Some(existing.clone()));
        }
        sets.insert(set.race_id, set.clone());
        Ok(None)
    }
}

/// One JSON file per race under a data directory.
///
/// Commits write a uniquely named temp file and hard-link it to
/// `race-<id>.json`. The link fails if the name exists, which makes the
/// file name a unique constraint and means readers never see a partial file.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (and create if needed) a data directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, race_id: RaceId) -> PathBuf {
        self.dir.join(format!("race-{}.json", race_id))
    }

    fn temp_path_for(&self, race_id: RaceId) -> PathBuf {
        self.dir
            .join(format!(".race-{}-{}.tmp", race_id, uuid::Uuid::new_v4()))
    }
}

impl ResultBackend for FileBackend {
    fn load(&self, race_id: RaceId) -> Result<Option<ResultSet>, StoreError> {
        match fs::read(self.path_for(race_id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_new(&self, set: &ResultSet) -> Result<Option<ResultSet>, StoreError> {
        let final_path = self.path_for(set.race_id);
        let temp_path = self.temp_path_for(set.race_id);

        {
            let mut file: File = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(&serde_json::to_vec_pretty(set)?)?;
            file.sync_all()?;
        }

        let linked = fs::hard_link(&temp_path, &final_path);

        if let Err(e) = fs::remove_file(&temp_path) {
            warn!("Failed to remove temp file {}: {}", temp_path.display(), e);
        }

        match linked {
            Ok(()) => {
                // The link is the commit; make the new directory entry durable.
                if let Err(e) = sync_dir(&self.dir) {
                    warn!("Failed to sync data dir {}: {}", self.dir.display(), e);
                }
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => match self.load(set.race_id)? {
                Some(existing) => Ok(Some(existing)),
                None => Err(StoreError::Io(e)),
            },
            Err(e) => Err(e.into()),
        }
    }
}

fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

// =============================================================================
// RESULT STORE
// =============================================================================

/// Outcome of [`ResultStore::create_if_absent`].
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// The committed set: the candidate if it won, the earlier set otherwise.
    pub results: Arc<ResultSet>,
    /// Whether the candidate was the one committed.
    pub was_created: bool,
}

/// Owns every committed result set.
pub struct ResultStore {
    backend: Box<dyn ResultBackend>,
    cache: RwLock<BTreeMap<RaceId, Arc<ResultSet>>>,
    write_locks: Mutex<BTreeMap<RaceId, Arc<Mutex<()>>>>,
}

impl ResultStore {
    /// Create a store over `backend`.
    pub fn new(backend: Box<dyn ResultBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(BTreeMap::new()),
            write_locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create a store backed by memory only.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Committed results for a race, or an empty set if none exist yet.
    pub async fn get_results(&self, race_id: RaceId) -> Result<Arc<ResultSet>, StoreError> {
        if let Some(set) = self.cache.read().await.get(&race_id) {
            return Ok(set.clone());
        }

        match self.backend.load(race_id)? {
            Some(set) => Ok(self.remember(set).await),
            None => Ok(Arc::new(ResultSet::empty(race_id))),
        }
    }

    /// Commit `candidate` unless a set already exists for the race.
    ///
    /// Concurrent callers for the same race are serialised; exactly one
    /// of them sees `was_created = true`, the rest get the winner's set.
    pub async fn create_if_absent(
        &self,
        race_id: RaceId,
        candidate: ResultSet,
    ) -> Result<CreateOutcome, StoreError> {
        if candidate.race_id != race_id {
            return Err(StoreError::RaceMismatch {
                expected: race_id,
                found: candidate.race_id,
            });
        }
        if candidate.is_empty() {
            return Err(StoreError::EmptyResultSet(race_id));
        }

        let lock = self.write_lock(race_id).await;
        let _guard = lock.lock().await;

        if let Some(existing) = self.cache.read().await.get(&race_id) {
            debug!("Race {} already has results, discarding candidate", race_id);
            return Ok(CreateOutcome {
                results: existing.clone(),
                was_created: false,
            });
        }

        match self.backend.insert_new(&candidate)? {
            Some(existing) => {
                debug!("Race {} results found in backend, discarding candidate", race_id);
                Ok(CreateOutcome {
                    results: self.remember(existing).await,
                    was_created: false,
                })
            }
            None => {
                info!(
                    "Committed {} results for race {} (digest {})",
                    candidate.len(),
                    race_id,
                    hex::encode(&candidate.digest()[..8])
                );
                Ok(CreateOutcome {
                    results: self.remember(candidate).await,
                    was_created: true,
                })
            }
        }
    }

    async fn remember(&self, set: ResultSet) -> Arc<ResultSet> {
        let set = Arc::new(set);
        let mut cache = self.cache.write().await;
        cache.entry(set.race_id).or_insert(set).clone()
    }

    async fn write_lock(&self, race_id: RaceId) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks.entry(race_id).or_default().clone()
    }
}
