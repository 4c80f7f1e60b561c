//! Google Drive v3 implementation of [`RemoteStorage`]
//!
//! Containers are Drive folders, entries are plain files. Content is sent
//! through resumable upload sessions in fixed-size chunks so large archives
//! never have to be held in memory at once.

use super::google_auth::GoogleAuth;
use super::storage_ops::{EntryKind, EntryQuery, RemoteEntry, RemoteStorage, StorageError};
use crate::config::DriveConfig;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";

/// Mime type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Upload chunk size; Drive requires multiples of 256 KiB
pub const CHUNK_SIZE: usize = 32 * 256 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

/// Authenticated Drive client
pub struct GoogleDrive {
    auth: GoogleAuth,
    http: Client,
    access_token: Option<String>,
}

impl GoogleDrive {
    pub fn new(config: &DriveConfig) -> Result<Self, StorageError> {
        // No overall request timeout: uploads block until Drive answers
        let http = Client::builder()
            .user_agent(concat!("world-backup/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(None::<std::time::Duration>)
            .build()?;

        Ok(Self {
            auth: GoogleAuth::new(&config.credentials_file, &config.token_file, http.clone()),
            http,
            access_token: None,
        })
    }

    fn token(&self) -> Result<&str, StorageError> {
        self.access_token
            .as_deref()
            .ok_or(StorageError::NotAuthenticated)
    }

    /// Open a resumable session and return its upload URL
    fn start_session(
        &self,
        method: reqwest::Method,
        url: &str,
        metadata: serde_json::Value,
        size: u64,
    ) -> Result<String, StorageError> {
        let response = self
            .http
            .request(method, url)
            .bearer_auth(self.token()?)
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", "application/octet-stream")
            .header("X-Upload-Content-Length", size.to_string())
            .json(&metadata)
            .send()?;
        let response = check_status(response, "start upload session")?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                StorageError::Protocol("upload session has no Location header".to_string())
            })
    }

    /// Send the file through an open session; returns the file id Drive reports
    fn send_chunks(&self, session_url: &str, local_file: &Path) -> Result<String, StorageError> {
        let io_err = |source: io::Error| StorageError::Io {
            path: local_file.to_path_buf(),
            source,
        };

        let mut file = File::open(local_file).map_err(io_err)?;
        let total = file.metadata().map_err(io_err)?.len();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut offset = 0u64;

        loop {
            file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
            let read = read_chunk(&mut file, &mut buffer).map_err(io_err)?;

            let range = content_range(offset, read, total)?;
            debug!("Uploading {} of {:?}", range, local_file);

            let response = self
                .http
                .put(session_url)
                .bearer_auth(self.token()?)
                .header(CONTENT_RANGE, range)
                .body(buffer[..read].to_vec())
                .send()?;

            if response.status() == StatusCode::PERMANENT_REDIRECT {
                // 308 Resume Incomplete: continue after the last byte Drive acknowledged
                offset = response
                    .headers()
                    .get(RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(acknowledged_end)
                    .map_or(0, |end| end + 1);
                if read == 0 && offset >= total {
                    return Err(StorageError::Protocol(
                        "Drive kept the session open after the final chunk".to_string(),
                    ));
                }
                continue;
            }

            let response = check_status(response, "upload chunk")?;
            let created: DriveFile = response.json()?;
            return Ok(created.id);
        }
    }
}

impl RemoteStorage for GoogleDrive {
    fn authenticate(&mut self) -> Result<(), StorageError> {
        let token = self.auth.access_token()?;
        self.access_token = Some(token);
        info!("Google Drive authentication successful");
        Ok(())
    }

    fn list_entries(&self, query: &EntryQuery) -> Result<Vec<RemoteEntry>, StorageError> {
        let q = build_query(query);
        debug!("Drive query: {}", q);

        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", DRIVE_API))
                .bearer_auth(self.token()?)
                .query(&[
                    ("q", q.as_str()),
                    ("spaces", "drive"),
                    ("fields", "nextPageToken, files(id, name)"),
                    ("pageSize", "100"),
                ]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let list: FileList = check_status(request.send()?, "list files")?.json()?;
            entries.extend(list.files.into_iter().map(|f| RemoteEntry {
                id: f.id,
                name: f.name,
            }));

            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(entries),
            }
        }
    }

    fn create_container(&self, name: &str) -> Result<String, StorageError> {
        let response = self
            .http
            .post(format!("{}/files", DRIVE_API))
            .bearer_auth(self.token()?)
            .query(&[("fields", "id")])
            .json(&json!({ "name": name, "mimeType": FOLDER_MIME_TYPE }))
            .send()?;

        let folder: DriveFile = check_status(response, "create folder")?.json()?;
        Ok(folder.id)
    }

    fn create_entry(
        &self,
        container_id: &str,
        name: &str,
        local_file: &Path,
    ) -> Result<String, StorageError> {
        let size = file_size(local_file)?;
        let session = self.start_session(
            reqwest::Method::POST,
            &format!("{}/files", UPLOAD_API),
            json!({ "name": name, "parents": [container_id] }),
            size,
        )?;
        self.send_chunks(&session, local_file)
    }

    fn update_entry_content(&self, entry_id: &str, local_file: &Path) -> Result<(), StorageError> {
        let size = file_size(local_file)?;
        let session = self.start_session(
            reqwest::Method::PATCH,
            &format!("{}/files/{}", UPLOAD_API, entry_id),
            json!({}),
            size,
        )?;
        self.send_chunks(&session, local_file)?;
        Ok(())
    }
}

/// Drive `q` expression for an exact-match lookup
pub fn build_query(query: &EntryQuery) -> String {
    let mut clauses = vec![format!("name = '{}'", escape_query_value(&query.name))];

    match query.kind {
        EntryKind::Container => clauses.push(format!("mimeType = '{}'", FOLDER_MIME_TYPE)),
        EntryKind::Entry => clauses.push(format!("mimeType != '{}'", FOLDER_MIME_TYPE)),
        EntryKind::Any => {}
    }

    if let Some(ref parent) = query.parent {
        clauses.push(format!("'{}' in parents", escape_query_value(parent)));
    }

    if !query.include_trashed {
        clauses.push("trashed = false".to_string());
    }

    clauses.join(" and ")
}

/// Escape a string literal for the Drive query language
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Last byte offset from a `Range: bytes=0-N` header
fn acknowledged_end(range: &str) -> Option<u64> {
    range
        .strip_prefix("bytes=")?
        .split_once('-')
        .and_then(|(_, end)| end.trim().parse().ok())
}

/// `Content-Range` header for `read` bytes starting at `offset`
fn content_range(offset: u64, read: usize, total: u64) -> Result<String, StorageError> {
    match (total, read) {
        (0, _) => Ok("bytes */0".to_string()),
        (_, 0) if offset >= total => Err(StorageError::Protocol(
            "Drive kept the session open after the final chunk".to_string(),
        )),
        // the file shrank after its size was sent to Drive
        (_, 0) => Err(StorageError::Protocol(format!(
            "file ended at byte {} of {} during upload",
            offset, total
        ))),
        _ => Ok(format!("bytes {}-{}/{}", offset, offset + read as u64 - 1, total)),
    }
}

/// Fill `buffer` as far as the file allows
fn read_chunk(file: &mut File, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn file_size(path: &Path) -> Result<u64, StorageError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn check_status(response: Response, operation: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(StorageError::Api {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}
