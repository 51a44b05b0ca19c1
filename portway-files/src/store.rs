//! Content-addressed storage for `File` endpoints (`spec.md` §4.H).
//! Each environment gets its own subtree; the payload and a JSON metadata
//! sidecar are written next to each other under `{fileId}` / `{fileId}.meta`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use portway_registry::FileEndpoint;
use serde::{Deserialize, Serialize};

use crate::error::FileError;
use crate::fileid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

pub struct FileStore<'a> {
    endpoint_name: &'a str,
    endpoint: &'a FileEndpoint,
}

fn guess_content_type(filename: &str) -> String {
    mime_guess_from_extension(filename)
        .unwrap_or_else(|| "application/octet-stream".to_owned())
}

fn mime_guess_from_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    Some(
        match ext.as_str() {
            "json" => "application/json",
            "xml" => "application/xml",
            "txt" => "text/plain",
            "csv" => "text/csv",
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "zip" => "application/zip",
            _ => return None,
        }
        .to_owned(),
    )
}

impl<'a> FileStore<'a> {
    pub fn new(endpoint_name: &'a str, endpoint: &'a FileEndpoint) -> Self {
        Self {
            endpoint_name,
            endpoint,
        }
    }

    fn env_dir(&self, env: &str) -> PathBuf {
        Path::new(&self.endpoint.storage_root).join(env)
    }

    fn payload_path(&self, env: &str, file_id: &str) -> PathBuf {
        self.env_dir(env).join(file_id)
    }

    fn meta_path(&self, env: &str, file_id: &str) -> PathBuf {
        self.env_dir(env).join(format!("{file_id}.meta.json"))
    }

    fn check_extension(&self, filename: &str) -> Result<(), FileError> {
        if self.endpoint.allowed_extensions.is_empty() {
            return Ok(());
        }
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let allowed = self
            .endpoint
            .allowed_extensions
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext));
        if allowed {
            Ok(())
        } else {
            Err(FileError::ExtensionNotAllowed(ext))
        }
    }

    pub fn store(
        &self,
        env: &str,
        filename: &str,
        content: &[u8],
        content_type: Option<&str>,
        overwrite: bool,
    ) -> Result<FileRecord, FileError> {
        self.check_extension(filename)?;
        if content.len() as u64 > self.endpoint.max_bytes {
            return Err(FileError::PayloadTooLarge);
        }

        let file_id = fileid::compute(self.endpoint_name, filename, content);
        let dir = self.env_dir(env);
        std::fs::create_dir_all(&dir)?;

        let payload_path = self.payload_path(env, &file_id);
        if payload_path.exists() && !overwrite {
            let existing = std::fs::read(&payload_path)?;
            if existing != content {
                return Err(FileError::AlreadyExists);
            }
            if let Ok(record) = self.read_meta(env, &file_id) {
                return Ok(record);
            }
        }

        std::fs::write(&payload_path, content)?;
        let record = FileRecord {
            file_id: file_id.clone(),
            file_name: filename.to_owned(),
            content_type: content_type
                .map(str::to_owned)
                .unwrap_or_else(|| guess_content_type(filename)),
            size: content.len() as u64,
            last_modified: Utc::now(),
        };
        self.write_meta(env, &file_id, &record)?;
        Ok(record)
    }

    fn write_meta(&self, env: &str, file_id: &str, record: &FileRecord) -> Result<(), FileError> {
        let bytes = serde_json::to_vec(record).map_err(|e| FileError::Storage(e.to_string()))?;
        std::fs::write(self.meta_path(env, file_id), bytes)?;
        Ok(())
    }

    fn read_meta(&self, env: &str, file_id: &str) -> Result<FileRecord, FileError> {
        let bytes = std::fs::read(self.meta_path(env, file_id)).map_err(|_| FileError::NotFound)?;
        serde_json::from_slice(&bytes).map_err(|e| FileError::Storage(e.to_string()))
    }

    pub fn fetch(&self, env: &str, file_id: &str) -> Result<(FileRecord, Vec<u8>), FileError> {
        let record = self.read_meta(env, file_id)?;
        let bytes = std::fs::read(self.payload_path(env, file_id)).map_err(|_| FileError::NotFound)?;
        Ok((record, bytes))
    }

    pub fn delete(&self, env: &str, file_id: &str) -> Result<(), FileError> {
        let payload = self.payload_path(env, file_id);
        let meta = self.meta_path(env, file_id);
        if !payload.exists() {
            return Err(FileError::NotFound);
        }
        std::fs::remove_file(payload)?;
        let _ = std::fs::remove_file(meta);
        Ok(())
    }

    pub fn list(&self, env: &str, prefix: Option<&str>) -> Result<Vec<FileRecord>, FileError> {
        let dir = self.env_dir(env);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(file_id) = name.strip_suffix(".meta.json") else {
                continue;
            };
            let record = self.read_meta(env, file_id)?;
            if prefix.map(|p| record.file_name.starts_with(p)).unwrap_or(true) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portway_registry::EndpointMeta;
    use serde_json::Map;

    fn endpoint(root: &Path) -> FileEndpoint {
        FileEndpoint {
            meta: EndpointMeta {
                name: "Invoices".to_owned(),
                namespace: None,
                allowed_methods: vec![],
                is_private: false,
                extra: Map::new(),
            },
            storage_root: root.to_string_lossy().into_owned(),
            allowed_extensions: vec!["pdf".to_owned(), "txt".to_owned()],
            max_bytes: 1024,
            memory_only: false,
        }
    }

    #[test]
    fn stores_and_fetches_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = endpoint(dir.path());
        let store = FileStore::new("Invoices", &endpoint);

        let record = store
            .store("prod", "q3.pdf", b"%PDF-fake", None, false)
            .unwrap();
        assert_eq!(record.file_name, "q3.pdf");
        assert_eq!(record.content_type, "application/pdf");

        let (fetched, bytes) = store.fetch("prod", &record.file_id).unwrap();
        assert_eq!(fetched, record);
        assert_eq!(bytes, b"%PDF-fake");
    }

    #[test]
    fn rejects_disallowed_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = endpoint(dir.path());
        let store = FileStore::new("Invoices", &endpoint);

        let err = store.store("prod", "virus.exe", b"x", None, false).unwrap_err();
        assert!(matches!(err, FileError::ExtensionNotAllowed(_)));
    }

    #[test]
    fn rejects_oversize_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = endpoint(dir.path());
        let store = FileStore::new("Invoices", &endpoint);

        let big = vec![0u8; 2048];
        let err = store.store("prod", "big.pdf", &big, None, false).unwrap_err();
        assert!(matches!(err, FileError::PayloadTooLarge));
    }

    #[test]
    fn identical_reupload_without_overwrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = endpoint(dir.path());
        let store = FileStore::new("Invoices", &endpoint);

        let first = store.store("prod", "q3.pdf", b"same bytes", None, false).unwrap();
        let second = store.store("prod", "q3.pdf", b"same bytes", None, false).unwrap();
        assert_eq!(first.file_id, second.file_id);
    }

    #[test]
    fn delete_then_fetch_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = endpoint(dir.path());
        let store = FileStore::new("Invoices", &endpoint);

        let record = store.store("prod", "q3.txt", b"hi", None, false).unwrap();
        store.delete("prod", &record.file_id).unwrap();
        assert!(matches!(store.fetch("prod", &record.file_id), Err(FileError::NotFound)));
    }

    #[test]
    fn list_filters_by_filename_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = endpoint(dir.path());
        let store = FileStore::new("Invoices", &endpoint);

        store.store("prod", "alpha.txt", b"a", None, false).unwrap();
        store.store("prod", "beta.txt", b"b", None, false).unwrap();

        let listed = store.list("prod", Some("alpha")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_name, "alpha.txt");
    }
}
