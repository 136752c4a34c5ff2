use std::{
    fs::{self, OpenOptions, rename, write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde_json::to_string_pretty;
use tracing::debug;
use uuid::Uuid;

use crate::{
    models::store::{CURRENT_VERSION, Store},
    storage::{
        Storage, StorageError,
        migrations::{apply_migrations, detect_version},
    },
};

const MAX_BACKUPS: usize = 5;

pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn create_backup(&self) -> Result<u64, StorageError> {
        let file_exists = fs::exists(&self.path).map_err(|e| StorageError::BackupFailed {
            path: self.path.clone(),
            source: e,
        })?;
        if !file_exists {
            return Ok(0);
        }

        let backups_dir = self.get_backup_dir();
        fs::create_dir_all(&backups_dir).map_err(|e| StorageError::BackupFailed {
            path: backups_dir.clone(),
            source: e,
        })?;

        let backup_path = self.get_backup_path();
        let bytes = fs::copy(&self.path, &backup_path).map_err(|e| StorageError::BackupFailed {
            path: backup_path.clone(),
            source: e,
        })?;
        debug!(path = %backup_path.display(), bytes, "store backed up");
        Ok(bytes)
    }

    fn cleanup_old_backups(&self) -> Result<(), StorageError> {
        let backup_dir = self.get_backup_dir();
        let backup_dir_exists =
            fs::exists(&backup_dir).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        if !backup_dir_exists {
            return Ok(());
        }

        let mut file_entries = fs::read_dir(&backup_dir)
            .map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();

        // Names end in zero-padded epoch nanoseconds, so lexical order is age order.
        file_entries.sort();

        let number_of_files_to_delete = file_entries.len().saturating_sub(MAX_BACKUPS);
        for file_path in &file_entries[..number_of_files_to_delete] {
            fs::remove_file(file_path).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        }

        Ok(())
    }

    fn get_backup_dir(&self) -> PathBuf {
        let parent_store_path = self.path.parent().unwrap_or(Path::new("."));
        parent_store_path.join("backups")
    }

    fn get_backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        let nanos = jiff::Timestamp::now().as_nanosecond();

        self.get_backup_dir()
            .join(format!("{}-{:020}.json", stem, nanos))
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Store, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no store yet, starting empty");
                return Ok(Store::default());
            }
            Err(e) => {
                return Err(StorageError::LoadFailed {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let mut data: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                path: self.path.clone(),
                source: e,
            })?;

        let file_version = detect_version(&data)?;
        if file_version > CURRENT_VERSION {
            return Err(StorageError::FutureVersion(file_version));
        }
        if file_version < CURRENT_VERSION {
            data = apply_migrations(data, file_version, CURRENT_VERSION)?;
        }

        if let Some(obj) = data.as_object_mut() {
            obj.insert("version".to_string(), serde_json::json!(CURRENT_VERSION));
        }

        let store: Store = serde_json::from_value(data).map_err(|e| StorageError::ParseFailed {
            path: self.path.clone(),
            source: e,
        })?;
        debug!(
            path = %self.path.display(),
            proposals = store.proposals.len(),
            "store loaded"
        );
        Ok(store)
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        let json =
            to_string_pretty(store).map_err(|e| StorageError::SerializeFailed { source: e })?;

        let lock_file_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file_path)
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path,
                source: e,
            })?;

        // The temp file is only created while the lock is held.
        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), Uuid::new_v4()));
        let result = write(&temp_path, json)
            .map_err(|e| StorageError::SaveFailed {
                path: temp_path.clone(),
                source: e,
            })
            .and_then(|_| self.create_backup())
            .and_then(|_| self.cleanup_old_backups())
            .and_then(|_| {
                rename(&temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
                    path: self.path.clone(),
                    source: e,
                })
            });

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }

        FileExt::unlock(&lock_file).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        result?;
        debug!(
            path = %self.path.display(),
            proposals = store.proposals.len(),
            "store saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{
        payment::ScheduledPayment, proposal::Proposal, signature::Signature,
        status::ProposalStatus,
    };

    fn count_backups(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .count()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));

        let proposal = Proposal {
            slug: "acme-co".to_string(),
            company_name: "Acme Co".to_string(),
            title: "Website".to_string(),
            status: ProposalStatus::PartiallySigned,
            payments: vec![ScheduledPayment::new(0, "on signing")].into(),
            ..Proposal::default()
        };
        let proposal_id = proposal.id;
        let mut store = Store::default();
        store.add_proposal(proposal);
        store.signatures_for_mut(proposal_id).append(Signature {
            id: Uuid::new_v4(),
            proposal_id,
            signer_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Some("client".to_string()),
            signed_at: "2025-01-01T00:00:00Z".parse().unwrap(),
            ip_address: "10.0.0.1".parse().unwrap(),
        });

        storage.save(&store).unwrap();
        let loaded = storage.load().unwrap();

        assert_eq!(loaded.proposals, store.proposals);
        assert_eq!(loaded.signatures, store.signatures);
    }

    #[test]
    fn test_load_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("missing.json"));
        let store = storage.load().unwrap();
        assert!(store.proposals.is_empty());
        assert_eq!(store.version, CURRENT_VERSION);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ this is not valid json }").unwrap();

        let result = JsonFileStorage::new(path).load();
        assert!(matches!(result, Err(StorageError::ParseFailed { .. })));
    }

    #[test]
    fn test_load_rejects_unknown_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_status.json");
        let mut value = serde_json::to_value(Proposal::default()).unwrap();
        value["status"] = serde_json::json!("ARCHIVED");
        fs::write(
            &path,
            serde_json::json!({"version": 1, "proposals": [value]}).to_string(),
        )
        .unwrap();

        let result = JsonFileStorage::new(path).load();
        assert!(matches!(result, Err(StorageError::ParseFailed { .. })));
    }

    #[test]
    fn test_load_v1_without_version_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.json");
        fs::write(&path, r#"{ "proposals": [], "signatures": {} }"#).unwrap();

        let store = JsonFileStorage::new(path).load().unwrap();
        assert_eq!(store.version, CURRENT_VERSION);
    }

    #[test]
    fn test_load_future_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        fs::write(&path, r#"{ "version": 999, "proposals": [] }"#).unwrap();

        let result = JsonFileStorage::new(path).load();
        assert!(matches!(result, Err(StorageError::FutureVersion(999))));
    }

    #[test]
    fn test_backup_creation_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));

        for _ in 0..7 {
            storage.save(&Store::default()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert_eq!(count_backups(&dir.path().join("backups")), MAX_BACKUPS);
    }

    #[test]
    fn test_backup_directory_created_on_second_save() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        let backups_dir = dir.path().join("backups");

        storage.save(&Store::default()).unwrap();
        assert!(
            !backups_dir.exists(),
            "Backups dir should not exist after first save"
        );

        storage.save(&Store::default()).unwrap();
        assert!(backups_dir.is_dir(), "Backups dir should exist after second save");
        assert_eq!(count_backups(&backups_dir), 1);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        storage.save(&Store::default()).unwrap();

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_failed_lock_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        fs::create_dir(dir.path().join("store.lock")).unwrap();

        let result = storage.save(&Store::default());
        assert!(matches!(result, Err(StorageError::SaveFailed { .. })));

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
        assert!(!dir.path().join("store.json").exists());
    }

    #[test]
    fn test_failed_backup_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        storage.save(&Store::default()).unwrap();
        // A file where the backups directory should be makes the backup step fail.
        fs::write(dir.path().join("backups"), "").unwrap();

        let result = storage.save(&Store::default());
        assert!(matches!(result, Err(StorageError::BackupFailed { .. })));

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }
}
