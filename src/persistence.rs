//! On-disk JSON document holding one entity collection and its id counter.

use {
    crate::{measure, metrics::FILE_WRITE_TIME_SECONDS},
    serde_json::{Map, Value},
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Document in {0} is not an object with `currentId` and an entity array")]
    Shape(PathBuf),
    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Contents of a collection file. Entries stay as raw JSON so that one bad
/// record does not prevent the rest from loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub current_id: u64,
    pub entries: Vec<Value>,
}

impl Default for Document {
    fn default() -> Self {
        Document {
            current_id: 1,
            entries: Vec::new(),
        }
    }
}

pub struct JsonFile {
    path: PathBuf,
    collection: &'static str,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>, collection: &'static str) -> Self {
        JsonFile {
            path: path.into(),
            collection,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_parent(&self) -> Result<(), StorageError> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|source| self.io_error(source))
            }
            _ => Ok(()),
        }
    }

    /// Reads the document, or `None` when the file does not exist yet.
    pub fn read(&self) -> Result<Option<Document>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let parsed: Value =
            serde_json::from_str(&contents).map_err(|source| StorageError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let Value::Object(mut object) = parsed else {
            return Err(StorageError::Shape(self.path.clone()));
        };

        // A missing or zero counter falls back to 1.
        let current_id = object
            .get("currentId")
            .and_then(Value::as_u64)
            .filter(|id| *id > 0)
            .unwrap_or(1);

        let entries = match object.remove(self.collection) {
            Some(Value::Array(entries)) => entries,
            None | Some(Value::Null) => Vec::new(),
            Some(_) => return Err(StorageError::Shape(self.path.clone())),
        };

        Ok(Some(Document {
            current_id,
            entries,
        }))
    }

    /// Rewrites the whole file.
    pub fn write(&self, document: &Document) -> Result<(), StorageError> {
        let mut object = Map::new();
        object.insert("currentId".to_string(), Value::from(document.current_id));
        object.insert(
            self.collection.to_string(),
            Value::Array(document.entries.clone()),
        );

        let contents = serde_json::to_string_pretty(&Value::Object(object))?;

        measure!(FILE_WRITE_TIME_SECONDS, {
            fs::write(&self.path, contents).map_err(|source| self.io_error(source))
        })
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("users.json"), "users");

        assert!(file.read().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested/data/users.json"), "users");
        file.ensure_parent().unwrap();

        let document = Document {
            current_id: 3,
            entries: vec![json!({"id": 1}), json!({"id": 2})],
        };
        file.write(&document).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(raw["currentId"], json!(3));
        assert_eq!(raw["users"].as_array().unwrap().len(), 2);

        assert_eq!(file.read().unwrap(), Some(document));
    }

    #[test]
    fn test_zero_counter_defaults_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        fs::write(&path, r#"{"currentId": 0}"#).unwrap();

        let document = JsonFile::new(&path, "transactions").read().unwrap().unwrap();

        assert_eq!(document, Document::default());
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        fs::write(&path, "{ not json").unwrap();

        let result = JsonFile::new(&path, "transactions").read();

        assert!(matches!(result, Err(StorageError::Parse { .. })));
    }

    #[test]
    fn test_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, r#"{"currentId": 2, "users": {"id": 1}}"#).unwrap();

        let result = JsonFile::new(&path, "users").read();

        assert!(matches!(result, Err(StorageError::Shape(_))));
    }
}
