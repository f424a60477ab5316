//! WebDAV Storage Client
//!
//! Directory listing and file operations against a single storage root.
//! Compatible with Nextcloud, ownCloud, Apache mod_dav, nginx-dav and other
//! RFC 4918 servers.
//!
//! All paths taken by this client are storage paths (see [`crate::paths`]).
//! No operation touches an in-memory listing; callers re-list after a
//! successful mutation.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use url::Url;

use super::multistatus::{parse_multistatus, ResourceBlock};
use super::transport::{DavMethod, DavRequest, DavResponse, DavTransport, HttpTransport, TRANSFER_TIMEOUT};
use super::{DavBody, DavEntry, DavError, WebDavConfig, WopiProperties};
use crate::paths::{
    canonical_path, display_path, parent_of, paths_equal, percent_decode, with_trailing_slash,
    without_trailing_slash,
};
use crate::upload::UploadFile;

/// Properties requested for listings and probes
const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<D:propfind xmlns:D="DAV:" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
  <D:prop>
    <D:getlastmodified/>
    <D:getcontenttype/>
    <D:getcontentlength/>
    <D:resourcetype/>
    <D:displayname/>
    <D:creationdate/>
    <oc:permissions/>
  </D:prop>
</D:propfind>"#;

const WOPI_PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<D:propfind xmlns:D="DAV:" xmlns:W="https://interoperability.blob.core.windows.net/files/MS-WOPI/">
  <D:prop>
    <W:wopi-url/><W:token/><W:token-ttl/>
  </D:prop>
</D:propfind>"#;

/// Parse `getlastmodified` (RFC 1123) or `creationdate` (RFC 3339) values
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Display name of the last path segment; the raw segment when decoding
/// fails or would produce a separator
fn segment_name(path: &str) -> String {
    let raw = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let decoded = percent_decode(raw);
    if decoded.contains('/') {
        raw.to_string()
    } else {
        decoded.into_owned()
    }
}

/// WebDAV client bound to one storage root
pub struct WebDavClient<T: DavTransport = HttpTransport> {
    config: WebDavConfig,
    transport: T,
}

impl WebDavClient<HttpTransport> {
    /// Create a client using the reqwest transport
    pub fn connect(config: WebDavConfig) -> Result<Self, DavError> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: DavTransport> WebDavClient<T> {
    pub fn with_transport(config: WebDavConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &WebDavConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, storage_path: &str) -> Result<Url, DavError> {
        self.config.resource_url(storage_path)
    }

    /// Execute a request and turn any non-2xx status into a protocol error
    async fn send(&self, request: DavRequest, target: &str) -> Result<DavResponse, DavError> {
        let method = request.method;
        let response = self.transport.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            tracing::warn!(
                "[WebDAV] {} {} failed with status {}",
                method,
                target,
                response.status
            );
            Err(DavError::from_status(response.status, &display_path(target)))
        }
    }

    async fn propfind(&self, storage_path: &str, depth: &str, body: &str) -> Result<(Url, Vec<ResourceBlock>), DavError> {
        let url = self.url(storage_path)?;
        let request = DavRequest::new(DavMethod::Propfind, url.clone())
            .header("Depth", depth)
            .xml(body);
        let response = self.send(request, storage_path).await?;
        let xml = String::from_utf8(response.body)
            .map_err(|e| DavError::MalformedResponse(format!("response is not UTF-8: {}", e)))?;
        let blocks = parse_multistatus(&xml)?;
        Ok((url, blocks))
    }

    /// Build an entry from one response block, `None` when the block is unusable
    fn entry_from_block(block: &ResourceBlock, base: &Url) -> Option<DavEntry> {
        let Some(href) = block.href.as_deref() else {
            tracing::debug!("[WebDAV] Skipping response without href");
            return None;
        };
        let resolved = match base.join(href) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("[WebDAV] Skipping unresolvable href {}: {}", href, e);
                return None;
            }
        };
        let Some(props) = block.successful_props() else {
            tracing::debug!("[WebDAV] Skipping {} without a successful propstat", href);
            return None;
        };

        let is_dir = props.is_collection;
        let (path, uri) = if is_dir {
            (with_trailing_slash(resolved.path()), with_trailing_slash(href))
        } else {
            (resolved.path().to_string(), href.to_string())
        };

        let size = if is_dir {
            None
        } else {
            props
                .content_length
                .as_deref()
                .and_then(|len| len.trim().parse::<u64>().ok())
        };
        let mime = if is_dir { None } else { props.content_type.clone() };

        // A storage served from the host root has no last segment to name it by
        let name = match segment_name(&path) {
            name if name.is_empty() => props.display_name.clone().unwrap_or_default(),
            name => name,
        };

        Some(DavEntry {
            name,
            uri,
            path,
            is_dir,
            size,
            mime,
            modified: parse_timestamp(props.last_modified.as_deref()),
            created: parse_timestamp(props.creation_date.as_deref()),
            permissions: props.permissions.clone(),
        })
    }

    /// List the immediate children of a directory.
    ///
    /// `storage_path` must already end in `/`. The directory's own entry is
    /// never part of the result; unusable blocks are skipped.
    pub async fn list_directory(&self, storage_path: &str) -> Result<Vec<DavEntry>, DavError> {
        tracing::info!("[WebDAV] Listing path: {}", storage_path);

        let (url, blocks) = self.propfind(storage_path, "1", PROPFIND_BODY).await?;
        let total = blocks.len();
        let entries: Vec<DavEntry> = blocks
            .iter()
            .filter_map(|block| Self::entry_from_block(block, &url))
            .filter(|entry| {
                let is_self = paths_equal(&entry.path, url.path(), "");
                if is_self {
                    tracing::debug!("[WebDAV] Skipping self-reference: {}", entry.path);
                }
                !is_self
            })
            .collect();

        tracing::info!(
            "[WebDAV] Parsed {} entries from {} response blocks",
            entries.len(),
            total
        );
        Ok(entries)
    }

    /// Fetch the entry of a single resource (PROPFIND depth 0)
    pub async fn stat(&self, storage_path: &str) -> Result<DavEntry, DavError> {
        let (url, blocks) = self.propfind(storage_path, "0", PROPFIND_BODY).await?;
        blocks
            .iter()
            .filter_map(|block| Self::entry_from_block(block, &url))
            .find(|entry| paths_equal(&entry.path, url.path(), ""))
            .ok_or_else(|| {
                DavError::MalformedResponse(format!(
                    "no usable properties for {}",
                    display_path(storage_path)
                ))
            })
    }

    /// Type probe; a missing resource is not a directory
    pub async fn is_directory(&self, storage_path: &str) -> Result<bool, DavError> {
        match self.stat(storage_path).await {
            Ok(entry) => Ok(entry.is_dir),
            Err(DavError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Probe used by directory creation: missing or unreachable parents count as absent
    async fn directory_exists(&self, storage_path: &str) -> Result<bool, DavError> {
        match self.stat(storage_path).await {
            Ok(entry) => Ok(entry.is_dir),
            Err(DavError::NotFound(_)) | Err(DavError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn mkcol(&self, dir_path: &str) -> Result<(), DavError> {
        let request = DavRequest::new(DavMethod::Mkcol, self.url(dir_path)?);
        self.send(request, dir_path).await.map(|_| ())
    }

    /// Create a directory.
    ///
    /// An existing directory counts as success. When the server reports a
    /// conflict because ancestors are missing, they are created top-down one
    /// level at a time and the target is retried once.
    pub async fn create_directory(&self, storage_path: &str) -> Result<(), DavError> {
        let target = with_trailing_slash(&canonical_path(storage_path));
        tracing::info!("[WebDAV] Creating directory: {}", target);

        let err = match self.mkcol(&target).await {
            Ok(()) => return Ok(()),
            Err(e @ (DavError::Conflict(_) | DavError::MethodNotAllowed(_))) => e,
            Err(e) => return Err(e),
        };

        if self.directory_exists(&target).await? {
            tracing::info!("[WebDAV] Directory already exists: {}", target);
            return Ok(());
        }
        if !matches!(err, DavError::Conflict(_)) {
            return Err(err);
        }

        let mut missing = Vec::new();
        let mut ancestor = parent_of(&target);
        while ancestor != "/" {
            if self.directory_exists(&ancestor).await? {
                break;
            }
            missing.push(ancestor.clone());
            ancestor = parent_of(&ancestor);
        }
        if missing.is_empty() {
            return Err(err);
        }

        for dir in missing.iter().rev() {
            tracing::info!("[WebDAV] Creating missing parent directory: {}", dir);
            self.mkcol(dir).await?;
        }
        self.mkcol(&target).await
    }

    async fn put(&self, target: &str, body: DavBody, content_type: &str) -> Result<(), DavError> {
        let request = DavRequest::new(DavMethod::Put, self.url(target)?)
            .header("Content-Type", content_type)
            .body(body)
            .timeout(TRANSFER_TIMEOUT);
        self.send(request, target).await.map(|_| ())
    }

    /// Create a file, or overwrite it if it exists
    pub async fn create_file(&self, storage_path: &str, content: &[u8]) -> Result<(), DavError> {
        let target = canonical_path(storage_path);
        tracing::info!("[WebDAV] Writing file: {} ({} bytes)", target, content.len());
        let content_type = mime_guess::from_path(display_path(&target))
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        self.put(&target, DavBody::Bytes(content.to_vec()), &content_type)
            .await
    }

    /// Replace a text file's content
    pub async fn save_file_content(&self, storage_path: &str, content: &str) -> Result<(), DavError> {
        self.create_file(storage_path, content.as_bytes()).await
    }

    /// Upload one file, reporting `on_progress(percent, file)` on every
    /// transport tick
    pub async fn upload_file<F>(
        &self,
        storage_path: &str,
        file: &UploadFile,
        mut on_progress: F,
    ) -> Result<(), DavError>
    where
        F: FnMut(u8, &UploadFile),
    {
        let target = canonical_path(storage_path);
        tracing::info!("[WebDAV] Uploading {} to {}", file.name, target);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = DavRequest::new(DavMethod::Put, self.url(&target)?)
            .header("Content-Type", file.content_type())
            .body(file.body())
            .timeout(TRANSFER_TIMEOUT)
            .progress(tx);

        let send = self.send(request, &target);
        tokio::pin!(send);
        let mut ticks_open = true;
        let result = loop {
            tokio::select! {
                result = &mut send => break result,
                tick = rx.recv(), if ticks_open => match tick {
                    Some(tick) => on_progress(tick.percent(), file),
                    None => ticks_open = false,
                },
            }
        };
        while let Ok(tick) = rx.try_recv() {
            on_progress(tick.percent(), file);
        }

        result.map(|_| ())
    }

    /// Download a file's bytes
    pub async fn download_file(&self, storage_path: &str) -> Result<Vec<u8>, DavError> {
        let target = canonical_path(storage_path);
        tracing::info!("[WebDAV] Downloading {}", target);
        let request = DavRequest::new(DavMethod::Get, self.url(&target)?).timeout(TRANSFER_TIMEOUT);
        let response = self.send(request, &target).await?;
        Ok(response.body)
    }

    /// Read a text file
    pub async fn get_file_content(&self, storage_path: &str) -> Result<String, DavError> {
        let bytes = self.download_file(storage_path).await?;
        String::from_utf8(bytes).map_err(|_| {
            DavError::MalformedResponse(format!("{} is not a UTF-8 text file", display_path(storage_path)))
        })
    }

    /// Delete a file or directory (recursively, server-side).
    ///
    /// Directories must be addressed with a trailing separator and files
    /// without one, so the type is probed first unless the path already ends
    /// in `/`.
    pub async fn delete(&self, storage_path: &str) -> Result<(), DavError> {
        let path = canonical_path(storage_path);
        let is_dir = path.ends_with('/') || self.is_directory(&path).await?;
        let target = if is_dir {
            with_trailing_slash(&path)
        } else {
            without_trailing_slash(&path).to_string()
        };

        tracing::info!("[WebDAV] Deleting {} (directory: {})", target, is_dir);
        let request = DavRequest::new(DavMethod::Delete, self.url(&target)?);
        self.send(request, &target).await.map(|_| ())
    }

    /// Move or rename a file or directory
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), DavError> {
        let source = canonical_path(old_path);
        let destination = canonical_path(new_path);
        let is_dir = source.ends_with('/') || self.is_directory(&source).await?;
        let (source, destination) = if is_dir {
            (with_trailing_slash(&source), with_trailing_slash(&destination))
        } else {
            (source, destination)
        };

        let destination_url = self.url(&destination)?;
        tracing::info!("[WebDAV] Moving {} -> {}", source, destination);
        let request = DavRequest::new(DavMethod::Move, self.url(&source)?)
            .header("Destination", destination_url.as_str());
        self.send(request, &source).await.map(|_| ())
    }

    /// Document-collaboration (WOPI) properties of a file
    pub async fn wopi_properties(&self, storage_path: &str) -> Result<WopiProperties, DavError> {
        let target = canonical_path(storage_path);
        let (_, blocks) = self.propfind(&target, "0", WOPI_PROPFIND_BODY).await?;
        let props = blocks.iter().find_map(|b| b.successful_props());
        Ok(props
            .map(|p| WopiProperties {
                wopi_url: p.wopi_url.clone(),
                token: p.token.clone(),
                token_ttl: p.token_ttl.clone(),
            })
            .unwrap_or_default())
    }
}
