//! Write-through repositories: an in-memory collection mirrored to a JSON file
//! on every mutation.

pub mod error;
pub mod interface;

use {
    crate::{
        metrics::STORAGE_FAILURES_TOTAL,
        models::{Entity, User},
        persistence::{Document, JsonFile, StorageError},
        repository::{
            error::RepositoryError,
            interface::{RepositoryInterface, UserRepositoryInterface},
        },
    },
    std::{
        collections::BTreeMap,
        path::PathBuf,
        sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    },
    tracing::{debug, error, info, warn},
};

struct Collection<E> {
    // Always greater than every id in `entities`; ids are never reused.
    current_id: u64,
    entities: BTreeMap<u64, E>,
}

impl<E: Entity> Collection<E> {
    fn empty() -> Self {
        Collection {
            current_id: 1,
            entities: BTreeMap::new(),
        }
    }

    fn hydrate(document: Document) -> Self {
        let mut entities = BTreeMap::new();

        for entry in document.entries {
            match serde_json::from_value::<E>(entry) {
                Ok(entity) => match entity.id() {
                    Some(id) if id > 0 => {
                        entities.insert(id, entity);
                    }
                    _ => warn!("Skipping {} entry without id", E::COLLECTION),
                },
                Err(e) => warn!("Skipping invalid {} entry: {}", E::COLLECTION, e),
            }
        }

        let next_free = entities.keys().next_back().map_or(1, |id| id + 1);
        if next_free > document.current_id {
            warn!(
                "currentId {} of {} is not above the highest stored id, raising it to {}",
                document.current_id,
                E::COLLECTION,
                next_free
            );
        }

        Collection {
            current_id: document.current_id.max(next_free),
            entities,
        }
    }

    fn to_document(&self) -> Result<Document, serde_json::Error> {
        let entries = self
            .entities
            .values()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Document {
            current_id: self.current_id,
            entries,
        })
    }
}

/// Repository backed by a single JSON file. The lock is held across both the
/// in-memory mutation and the file rewrite, so writers never interleave.
pub struct JsonRepository<E: Entity> {
    file: JsonFile,
    collection: RwLock<Collection<E>>,
}

impl<E: Entity> JsonRepository<E> {
    /// Opens the collection stored at `path`, creating the data directory and
    /// an empty file when needed.
    ///
    /// A file that cannot be parsed is logged and the repository starts empty;
    /// the next write then replaces whatever the file contained.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let file = JsonFile::new(path, E::COLLECTION);
        file.ensure_parent()?;

        let collection = match file.read() {
            Ok(Some(document)) => {
                let collection = Collection::hydrate(document);
                info!(
                    "Loaded {} {} from {}",
                    collection.entities.len(),
                    E::COLLECTION,
                    file.path().display()
                );
                collection
            }
            Ok(None) => {
                let collection = Collection::empty();
                file.write(&collection.to_document().map_err(StorageError::from)?)?;
                info!("Created empty {} file at {}", E::COLLECTION, file.path().display());
                collection
            }
            Err(e) => {
                error!(
                    "Error loading {} from file: {}. Starting empty; the next write overwrites {}",
                    E::COLLECTION,
                    e,
                    file.path().display()
                );
                Collection::empty()
            }
        };

        Ok(JsonRepository {
            file,
            collection: RwLock::new(collection),
        })
    }

    fn acquire_write_lock(&self) -> Result<RwLockWriteGuard<'_, Collection<E>>, RepositoryError> {
        self.collection
            .write()
            .map_err(|_| RepositoryError::FailedToAcquireWriteLock)
    }

    fn acquire_read_lock(&self) -> Result<RwLockReadGuard<'_, Collection<E>>, RepositoryError> {
        self.collection
            .read()
            .map_err(|_| RepositoryError::FailedToAcquireReadLock)
    }

    /// Mirrors the collection to disk. The in-memory state is kept even when
    /// the write fails.
    fn persist(&self, collection: &Collection<E>) -> Result<(), RepositoryError> {
        let result = collection
            .to_document()
            .map_err(StorageError::from)
            .and_then(|document| self.file.write(&document));

        if let Err(e) = result {
            STORAGE_FAILURES_TOTAL.inc();
            error!("Error saving {} to file: {}", E::COLLECTION, e);
            return Err(e.into());
        }

        debug!("{} saved to {}", E::COLLECTION, self.file.path().display());
        Ok(())
    }
}

impl<E: Entity> RepositoryInterface<E> for JsonRepository<E> {
    fn save(&self, mut entity: E) -> Result<u64, RepositoryError> {
        let mut collection = self.acquire_write_lock()?;

        let id = collection.current_id;
        collection.current_id += 1;
        entity.set_id(id);
        collection.entities.insert(id, entity);

        self.persist(&collection)?;
        info!("Saved {} entry with id {}", E::COLLECTION, id);

        Ok(id)
    }

    fn find_by_id(&self, id: u64) -> Result<Option<E>, RepositoryError> {
        let collection = self.acquire_read_lock()?;
        Ok(collection.entities.get(&id).cloned())
    }

    fn find_all(&self) -> Result<Vec<E>, RepositoryError> {
        let collection = self.acquire_read_lock()?;
        Ok(collection.entities.values().cloned().collect())
    }

    fn update(&self, id: u64, patch: E::Patch) -> Result<Option<E>, RepositoryError> {
        let mut collection = self.acquire_write_lock()?;

        let updated = {
            let Some(entity) = collection.entities.get_mut(&id) else {
                debug!("No {} entry with id {}, skipping update", E::COLLECTION, id);
                return Ok(None);
            };
            entity.apply(patch)?;
            entity.clone()
        };

        self.persist(&collection)?;
        info!("Updated {} entry {}", E::COLLECTION, id);

        Ok(Some(updated))
    }

    fn delete(&self, id: u64) -> Result<Option<E>, RepositoryError> {
        let mut collection = self.acquire_write_lock()?;

        let removed = collection.entities.remove(&id);

        // Rewritten even when nothing was removed.
        self.persist(&collection)?;
        info!("Deleted {} entry {}", E::COLLECTION, id);

        Ok(removed)
    }

    fn find_first(&self, predicate: &dyn Fn(&E) -> bool) -> Result<Option<E>, RepositoryError> {
        let collection = self.acquire_read_lock()?;
        Ok(collection
            .entities
            .values()
            .find(|entity| predicate(entity))
            .cloned())
    }
}

impl UserRepositoryInterface for JsonRepository<User> {}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::models::{
            Transaction, TransactionDetails, TransactionPatch, TransactionType, UserPatch,
        },
        serde_json::{Value, json},
        std::{fs, path::Path, sync::Arc, thread},
    };

    fn billet(value: f64, user_id: u64) -> Transaction {
        Transaction::new(
            value,
            user_id,
            TransactionType::Entry,
            "Caixa Econômica",
            TransactionDetails::Billet {
                code: "12345.67890 12345.678901".to_string(),
            },
        )
        .unwrap()
    }

    fn user(name: &str, email: &str) -> User {
        User::natural(name, email, "secret", "12345678900", "/profile-1.png")
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_open_creates_directory_and_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/transactions.json");

        let repository = JsonRepository::<Transaction>::open(&path).unwrap();

        assert!(repository.find_all().unwrap().is_empty());
        assert_eq!(
            read_json(&path),
            json!({"currentId": 1, "transactions": []})
        );
    }

    #[test]
    fn test_ids_strictly_increase_and_are_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        let repository =
            JsonRepository::<Transaction>::open(dir.path().join("transactions.json")).unwrap();

        let first = repository.save(billet(1.0, 1)).unwrap();
        let second = repository.save(billet(2.0, 1)).unwrap();
        repository.delete(second).unwrap();
        let third = repository.save(billet(3.0, 1)).unwrap();

        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[test]
    fn test_find_by_id_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let repository =
            JsonRepository::<Transaction>::open(dir.path().join("transactions.json")).unwrap();
        let transaction = billet(300.0, 4);

        let id = repository.save(transaction.clone()).unwrap();

        let mut expected = transaction;
        expected.id = Some(id);
        assert_eq!(repository.find_by_id(id).unwrap(), Some(expected));
        assert_eq!(repository.find_by_id(id + 1).unwrap(), None);
    }

    #[test]
    fn test_delete_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let repository =
            JsonRepository::<Transaction>::open(dir.path().join("transactions.json")).unwrap();
        let id = repository.save(billet(10.0, 1)).unwrap();

        assert!(repository.delete(id).unwrap().is_some());
        assert_eq!(repository.find_by_id(id).unwrap(), None);
        assert!(repository.delete(id).unwrap().is_none());
    }

    #[test]
    fn test_update_changes_only_patched_field() {
        let dir = tempfile::tempdir().unwrap();
        let repository =
            JsonRepository::<Transaction>::open(dir.path().join("transactions.json")).unwrap();
        let id = repository.save(billet(10.0, 1)).unwrap();
        let before = repository.find_by_id(id).unwrap().unwrap();

        let updated = repository
            .update(
                id,
                TransactionPatch {
                    value: Some(42.5),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.value, 42.5);
        assert_eq!(updated.id, Some(id));
        assert_eq!(updated.bank, before.bank);
        assert_eq!(updated.details, before.details);
        assert_eq!(repository.find_by_id(id).unwrap(), Some(updated));
    }

    #[test]
    fn test_update_missing_id_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let repository =
            JsonRepository::<Transaction>::open(dir.path().join("transactions.json")).unwrap();
        repository.save(billet(10.0, 1)).unwrap();
        let before = repository.find_all().unwrap();

        let result = repository
            .update(
                99,
                TransactionPatch {
                    value: Some(1.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(result.is_none());
        assert_eq!(repository.find_all().unwrap(), before);
    }

    #[test]
    fn test_invalid_update_leaves_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let repository =
            JsonRepository::<Transaction>::open(dir.path().join("transactions.json")).unwrap();
        let id = repository.save(billet(10.0, 1)).unwrap();
        let before = repository.find_by_id(id).unwrap();

        let result = repository.update(
            id,
            TransactionPatch {
                key: Some("pix-key".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(RepositoryError::Model(_))));
        assert_eq!(repository.find_by_id(id).unwrap(), before);
    }

    #[test]
    fn test_reopen_restores_collection_and_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let saved: Vec<User> = {
            let repository = JsonRepository::<User>::open(&path).unwrap();
            for i in 0..3 {
                repository
                    .save(user(&format!("user {i}"), &format!("u{i}@x.com")))
                    .unwrap();
            }
            repository.find_all().unwrap()
        };

        let reopened = JsonRepository::<User>::open(&path).unwrap();

        assert_eq!(reopened.find_all().unwrap(), saved);
        assert_eq!(read_json(&path)["currentId"], json!(4));
        assert_eq!(reopened.save(user("next", "n@x.com")).unwrap(), 4);
    }

    #[test]
    fn test_hydration_skips_bad_entries_and_raises_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(
            &path,
            json!({
                "currentId": 2,
                "users": [
                    {"id": 5, "name": "A", "email": "a@x.com", "password": "p", "cpf": "1"},
                    {"name": "No id", "email": "b@x.com", "password": "p", "cpf": "2"},
                    {"id": 6, "name": "Both", "email": "c@x.com", "password": "p", "cpf": "3", "cnpj": "4"}
                ]
            })
            .to_string(),
        )
        .unwrap();

        let repository = JsonRepository::<User>::open(&path).unwrap();

        let users = repository.find_all().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, Some(5));
        assert_eq!(repository.save(user("next", "n@x.com")).unwrap(), 6);
    }

    #[test]
    fn test_form_records_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        fs::write(
            &path,
            json!({
                "currentId": 3,
                "transactions": [
                    {
                        "id": 1,
                        "value": 1000,
                        "user_id": 1,
                        "transaction_type": "entry",
                        "bank": "Pós Bank",
                        "transaction_method": "pix",
                        "key": "joao@email.com",
                        "sent_by": "",
                        "received_by": "",
                        "code": "",
                        "created_at": "2025-01-10T12:00:00.000Z"
                    },
                    {
                        "id": 2,
                        "value": 300,
                        "user_id": 1,
                        "transaction_type": "exit",
                        "bank": "Pós Bank",
                        "key": "",
                        "sent_by": "",
                        "received_by": "",
                        "code": "12345.67890 12345.678901",
                        "created_at": "2025-01-11T09:30:00.000Z"
                    }
                ]
            })
            .to_string(),
        )
        .unwrap();

        let repository = JsonRepository::<Transaction>::open(&path).unwrap();
        assert_eq!(repository.find_all().unwrap().len(), 2);

        repository.delete(99).unwrap();

        let stored = read_json(&path);
        let entries = stored["transactions"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["kind"], json!("pix"));
        assert_eq!(entries[0]["key"], json!("joao@email.com"));
        assert_eq!(entries[0]["created_at"], json!("2025-01-10T12:00:00Z"));
        assert_eq!(entries[1]["kind"], json!("billet"));
        assert_eq!(entries[1]["created_at"], json!("2025-01-11T09:30:00Z"));
        assert!(entries[1].get("key").is_none());

        let reopened = JsonRepository::<Transaction>::open(&path).unwrap();
        assert_eq!(reopened.find_all().unwrap(), repository.find_all().unwrap());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        fs::write(&path, "{ definitely not json").unwrap();

        let repository = JsonRepository::<Transaction>::open(&path).unwrap();

        assert!(repository.find_all().unwrap().is_empty());
        assert_eq!(repository.save(billet(1.0, 1)).unwrap(), 1);
    }

    #[test]
    fn test_failed_write_is_surfaced_but_kept_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let repository =
            JsonRepository::<Transaction>::open(data_dir.join("transactions.json")).unwrap();

        fs::remove_dir_all(&data_dir).unwrap();
        let result = repository.save(billet(1.0, 1));

        assert!(matches!(result, Err(RepositoryError::Storage(_))));
        assert_eq!(repository.find_all().unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_email_returns_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let repository = JsonRepository::<User>::open(dir.path().join("users.json")).unwrap();
        let first = repository.save(user("First", "dup@x.com")).unwrap();
        repository.save(user("Second", "dup@x.com")).unwrap();

        let found = repository.find_by_email("dup@x.com").unwrap().unwrap();

        assert_eq!(found.id, Some(first));
        assert!(repository.find_by_email("DUP@x.com").unwrap().is_none());
    }

    #[test]
    fn test_user_update_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let repository = JsonRepository::<User>::open(dir.path().join("users.json")).unwrap();
        let id = repository.save(user("Ana", "ana@x.com")).unwrap();

        repository
            .update(
                id,
                UserPatch {
                    email: Some("ana.maria@x.com".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let stored = repository.find_by_id(id).unwrap().unwrap();
        assert_eq!(stored.email, "ana.maria@x.com");
        assert_eq!(stored.name, "Ana");
        assert_eq!(stored.id, Some(id));
    }

    #[test]
    fn test_concurrent_saves_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        let repository = Arc::new(JsonRepository::<Transaction>::open(&path).unwrap());

        let handles: Vec<_> = (0..8_u32)
            .map(|i| {
                let repository = Arc::clone(&repository);
                thread::spawn(move || repository.save(billet(f64::from(i), 1)).unwrap())
            })
            .collect();

        let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();

        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(read_json(&path)["transactions"].as_array().unwrap().len(), 8);
    }
}
