//! Routes a request at a [`FileEndpoint`] to `portway-files` (`spec.md`
//! §4.H): `POST` uploads a multipart `file` field, `GET`/`DELETE` operate
//! on a single `fileId`, `GET .../list` lists the current environment's
//! records.

use actix_multipart::Multipart;
use actix_web::HttpRequest;
use futures::{StreamExt, TryStreamExt};
use portway_common::PortwayError;
use portway_files::{FileRecord, FileStore};
use portway_registry::FileEndpoint;

async fn read_multipart_file(mut payload: Multipart) -> Result<(String, Option<String>, Vec<u8>), PortwayError> {
    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|e| PortwayError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let content_disposition = field.content_disposition().clone();
        let is_file_field = content_disposition
            .get_name()
            .map(|name| name == "file")
            .unwrap_or(false);
        if !is_file_field {
            continue;
        }

        let filename = content_disposition
            .get_filename()
            .map(str::to_owned)
            .ok_or_else(|| PortwayError::bad_request("multipart `file` field is missing a filename"))?;
        let content_type = field.content_type().map(|m| m.to_string());

        let mut bytes = Vec::new();
        let mut field = field;
        while let Some(chunk) = field
            .next()
            .await
            .transpose()
            .map_err(|e| PortwayError::bad_request(format!("invalid multipart body: {e}")))?
        {
            bytes.extend_from_slice(&chunk);
        }
        return Ok((filename, content_type, bytes));
    }
    Err(PortwayError::bad_request("multipart body is missing a `file` field"))
}

pub async fn upload(
    req: &HttpRequest,
    endpoint_name: &str,
    endpoint: &FileEndpoint,
    env: &str,
    payload: Multipart,
) -> Result<FileRecord, PortwayError> {
    let overwrite = req
        .query_string()
        .split('&')
        .any(|pair| pair == "overwrite=true");
    let (filename, content_type, bytes) = read_multipart_file(payload).await?;
    let store = FileStore::new(endpoint_name, endpoint);
    store
        .store(env, &filename, &bytes, content_type.as_deref(), overwrite)
        .map_err(PortwayError::from)
}

pub fn fetch(
    endpoint_name: &str,
    endpoint: &FileEndpoint,
    env: &str,
    file_id: &str,
) -> Result<(FileRecord, Vec<u8>), PortwayError> {
    let store = FileStore::new(endpoint_name, endpoint);
    store.fetch(env, file_id).map_err(PortwayError::from)
}

pub fn delete(endpoint_name: &str, endpoint: &FileEndpoint, env: &str, file_id: &str) -> Result<(), PortwayError> {
    let store = FileStore::new(endpoint_name, endpoint);
    store.delete(env, file_id).map_err(PortwayError::from)
}

pub fn list(
    endpoint_name: &str,
    endpoint: &FileEndpoint,
    env: &str,
    prefix: Option<&str>,
) -> Result<Vec<FileRecord>, PortwayError> {
    let store = FileStore::new(endpoint_name, endpoint);
    store.list(env, prefix).map_err(PortwayError::from)
}
