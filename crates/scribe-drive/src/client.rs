//! Google Drive API client.
//!
//! A low-level typed wrapper over the Drive API v3 surface this service
//! needs: folder lookup/creation, plain-text file upload, download, copy,
//! and delete. The client is a cheap capability object derived from an
//! access token — callers construct one per operation from the current
//! credential rather than mutating a shared client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{DriveError, DriveResult};

/// Base URL for Drive API v3 metadata operations.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive API v3 media uploads.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// MIME type of content files.
pub const TEXT_MIME_TYPE: &str = "text/plain";

/// Metadata fields requested on every file response.
const FILE_FIELDS: &str = "id,name,createdTime";

/// Page size for list requests.
const PAGE_SIZE: usize = 100;

/// A file or folder reference returned by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Opaque provider identifier.
    pub id: String,
    /// The file or folder name.
    pub name: String,
    /// Creation time, when requested.
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
}

/// Google Drive API client bound to one access token.
#[derive(Debug)]
pub struct DriveClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
    upload_url: String,
}

impl DriveClient {
    /// Creates a client with the given access token and per-call timeout.
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> DriveResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DriveError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            access_token: access_token.into(),
            base_url: DRIVE_API_BASE.to_string(),
            upload_url: DRIVE_UPLOAD_BASE.to_string(),
        })
    }

    /// Overrides the API base URL; media uploads go to `{url}/upload`.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.upload_url = format!("{}/upload", url);
        self.base_url = url;
        self
    }

    /// Finds a folder by exact name, optionally under a parent folder.
    ///
    /// Returns the first match; provider namespaces are not unique, so
    /// duplicates resolve to the oldest listing order Drive returns.
    pub async fn find_folder(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> DriveResult<Option<FileRef>> {
        let files = self.list(&folder_query(name, parent), None).await?;
        Ok(files.into_iter().next())
    }

    /// Creates a folder, optionally under a parent folder.
    pub async fn create_folder(&self, name: &str, parent: Option<&str>) -> DriveResult<FileRef> {
        let mut body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent) = parent {
            body["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let body = check(response).await?.text().await.map_err(|e| {
            DriveError::network(format!("failed to read create response: {}", e))
        })?;

        let folder: FileRef = serde_json::from_str(&body).map_err(|e| {
            DriveError::invalid_response(format!("invalid create response: {}", e))
        })?;

        debug!("created folder {:?} ({})", folder.name, folder.id);
        Ok(folder)
    }

    /// Lists plain-text files with the given name inside a folder.
    pub async fn find_files(&self, parent: &str, name: &str) -> DriveResult<Vec<FileRef>> {
        self.list(&file_query(parent, name), None).await
    }

    /// Lists all folders inside a folder, ordered by name.
    pub async fn list_folders(&self, parent: &str) -> DriveResult<Vec<FileRef>> {
        self.list(&folders_query(parent), Some("name")).await
    }

    /// Lists all children of a folder, oldest first.
    pub async fn list_children(&self, parent: &str) -> DriveResult<Vec<FileRef>> {
        self.list(&children_query(parent), Some("createdTime")).await
    }

    /// Creates a plain-text file and uploads its body.
    pub async fn create_text_file(
        &self,
        parent: &str,
        name: &str,
        content: &str,
    ) -> DriveResult<FileRef> {
        let body = serde_json::json!({
            "name": name,
            "mimeType": TEXT_MIME_TYPE,
            "parents": [parent],
        });

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let body = check(response).await?.text().await.map_err(|e| {
            DriveError::network(format!("failed to read create response: {}", e))
        })?;

        let file: FileRef = serde_json::from_str(&body).map_err(|e| {
            DriveError::invalid_response(format!("invalid create response: {}", e))
        })?;

        self.update_text_file(&file.id, content).await?;
        debug!("created file {:?} ({})", file.name, file.id);
        Ok(file)
    }

    /// Overwrites the body of an existing file in full.
    pub async fn update_text_file(&self, file_id: &str, content: &str) -> DriveResult<()> {
        let response = self
            .http
            .patch(format!("{}/files/{}", self.upload_url, file_id))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, TEXT_MIME_TYPE)
            .body(content.to_string())
            .send()
            .await
            .map_err(map_transport_error)?;

        check(response).await?;
        Ok(())
    }

    /// Downloads the full body of a file as text.
    pub async fn download_text(&self, file_id: &str) -> DriveResult<String> {
        let response = self
            .http
            .get(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(map_transport_error)?;

        check(response)
            .await?
            .text()
            .await
            .map_err(|e| DriveError::network(format!("failed to read file body: {}", e)))
    }

    /// Copies a file under a new name in the same folder.
    pub async fn copy_file(&self, file_id: &str, name: &str) -> DriveResult<FileRef> {
        let response = self
            .http
            .post(format!("{}/files/{}/copy", self.base_url, file_id))
            .bearer_auth(&self.access_token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(map_transport_error)?;

        let body = check(response).await?.text().await.map_err(|e| {
            DriveError::network(format!("failed to read copy response: {}", e))
        })?;

        serde_json::from_str(&body)
            .map_err(|e| DriveError::invalid_response(format!("invalid copy response: {}", e)))
    }

    /// Deletes a file. Folders delete their contents recursively.
    pub async fn delete_file(&self, file_id: &str) -> DriveResult<()> {
        let response = self
            .http
            .delete(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        check(response).await?;
        Ok(())
    }

    /// Runs a files.list query, following page tokens.
    async fn list(&self, query: &str, order_by: Option<&str>) -> DriveResult<Vec<FileRef>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);
        let page_size = PAGE_SIZE.to_string();

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("q", query),
                    ("fields", fields.as_str()),
                    ("pageSize", page_size.as_str()),
                ]);

            if let Some(order) = order_by {
                request = request.query(&[("orderBy", order)]);
            }
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(map_transport_error)?;
            let body = check(response).await?.text().await.map_err(|e| {
                DriveError::network(format!("failed to read list response: {}", e))
            })?;

            let page: FileList = serde_json::from_str(&body).map_err(|e| {
                DriveError::invalid_response(format!("invalid list response: {}", e))
            })?;

            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }
}

/// Response from the files.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
    next_page_token: Option<String>,
}

/// Escapes a term for embedding in a Drive query string.
fn escape_query(term: &str) -> String {
    term.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query for a folder by name, optionally scoped to a parent.
pub(crate) fn folder_query(name: &str, parent: Option<&str>) -> String {
    let mut query = format!(
        "name='{}' and mimeType='{}' and trashed=false",
        escape_query(name),
        FOLDER_MIME_TYPE
    );
    if let Some(parent) = parent {
        query.push_str(&format!(" and '{}' in parents", escape_query(parent)));
    }
    query
}

/// Query for plain-text files by name inside a folder.
pub(crate) fn file_query(parent: &str, name: &str) -> String {
    format!(
        "'{}' in parents and name='{}' and mimeType='{}' and trashed=false",
        escape_query(parent),
        escape_query(name),
        TEXT_MIME_TYPE
    )
}

/// Query for all folders inside a folder.
pub(crate) fn folders_query(parent: &str) -> String {
    format!(
        "'{}' in parents and mimeType='{}' and trashed=false",
        escape_query(parent),
        FOLDER_MIME_TYPE
    )
}

/// Query for all children of a folder.
pub(crate) fn children_query(parent: &str) -> String {
    format!("'{}' in parents and trashed=false", escape_query(parent))
}

fn map_transport_error(e: reqwest::Error) -> DriveError {
    if e.is_timeout() {
        DriveError::network("request timeout")
    } else if e.is_connect() {
        DriveError::network(format!("connection failed: {}", e))
    } else {
        DriveError::network(format!("request failed: {}", e))
    }
}

/// Maps provider error statuses to the error taxonomy.
async fn check(response: reqwest::Response) -> DriveResult<reqwest::Response> {
    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(DriveError::unauthorized("access token expired or rejected"));
    }
    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(DriveError::unauthorized("access to Drive denied"));
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DriveError::not_found("resource not found"));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(DriveError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::server(format!(
            "Drive API error ({}): {}",
            status, body
        )));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn client_for(server: &mockito::Server) -> DriveClient {
        DriveClient::new("test-token", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url())
    }

    #[test]
    fn query_escaping() {
        assert_eq!(escape_query("plain"), "plain");
        assert_eq!(escape_query("it's"), "it\\'s");
        assert_eq!(escape_query("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn folder_query_format() {
        let query = folder_query("My Notes", None);
        assert_eq!(
            query,
            "name='My Notes' and mimeType='application/vnd.google-apps.folder' and trashed=false"
        );

        let scoped = folder_query("My Notes", Some("root1"));
        assert!(scoped.ends_with("and 'root1' in parents"));
    }

    #[test]
    fn file_query_format() {
        let query = file_query("folder1", "content.txt");
        assert_eq!(
            query,
            "'folder1' in parents and name='content.txt' and mimeType='text/plain' and trashed=false"
        );
    }

    #[test]
    fn parse_file_list() {
        let json = r#"{
            "files": [
                {"id": "abc", "name": "content.txt", "createdTime": "2024-03-15T10:00:00Z"},
                {"id": "def", "name": "Notes"}
            ]
        }"#;

        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(list.files.len(), 2);
        assert_eq!(list.files[0].id, "abc");
        assert!(list.files[0].created_time.is_some());
        assert!(list.files[1].created_time.is_none());
        assert!(list.next_page_token.is_none());
    }

    #[tokio::test]
    async fn find_folder_returns_first_match() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::UrlEncoded(
                "q".into(),
                folder_query("Scribe", None),
            ))
            .with_status(200)
            .with_body(r#"{"files":[{"id":"root1","name":"Scribe"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let folder = client.find_folder("Scribe", None).await.unwrap().unwrap();
        assert_eq!(folder.id, "root1");
    }

    #[tokio::test]
    async fn find_folder_absent_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.find_folder("Ghost", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let mut server = mockito::Server::new_async().await;
        // The page-token mock is registered last so it takes priority when
        // both the first-page and second-page requests carry the same query.
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::UrlEncoded(
                "q".into(),
                folders_query("root1"),
            ))
            .with_status(200)
            .with_body(r#"{"files":[{"id":"a","name":"A"}],"nextPageToken":"next"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::UrlEncoded(
                "pageToken".into(),
                "next".into(),
            ))
            .with_status(200)
            .with_body(r#"{"files":[{"id":"b","name":"B"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let folders = client.list_folders("root1").await.unwrap();
        let ids: Vec<_> = folders.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unauthorized_status_maps_to_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.find_folder("Scribe", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn rate_limit_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .with_header("Retry-After", "7")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.find_folder("Scribe", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());
        assert!(err.message().contains("7"));
    }

    #[tokio::test]
    async fn create_text_file_uploads_body() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/files")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"name":"content.txt","parents":["proj1"]}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"id":"file1","name":"content.txt"}"#)
            .create_async()
            .await;
        let upload = server
            .mock("PATCH", "/upload/files/file1")
            .match_query(mockito::Matcher::UrlEncoded(
                "uploadType".into(),
                "media".into(),
            ))
            .match_body("Welcome to your new project!")
            .with_status(200)
            .with_body(r#"{"id":"file1"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let file = client
            .create_text_file("proj1", "content.txt", "Welcome to your new project!")
            .await
            .unwrap();
        assert_eq!(file.id, "file1");
        create.assert_async().await;
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn download_returns_full_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files/file1")
            .match_query(mockito::Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(200)
            .with_body("Chapter 1 draft")
            .create_async()
            .await;

        let client = client_for(&server);
        let content = client.download_text("file1").await.unwrap();
        assert_eq!(content, "Chapter 1 draft");
    }

    #[tokio::test]
    async fn delete_succeeds_on_no_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/files/proj1")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(&server);
        client.delete_file("proj1").await.unwrap();
        mock.assert_async().await;
    }
}
