//! Directory navigation
//!
//! [`Navigator`] owns the entry set currently shown and the current-directory
//! cell. Every mutation goes through the [`WebDavClient`] facade and, once it
//! has succeeded, is followed by a fresh listing. The entry set and the cell
//! are only replaced after a listing succeeds, so a failed request leaves the
//! previous view intact.

use std::cmp::Ordering;
use tokio::sync::watch;

use crate::paths::{
    display_path, join_child, parent_of, paths_equal, storage_path_of, to_navigation_segment,
    to_storage_path,
};
use crate::preferences::{PreferenceStore, Preferences, SortOrder};
use crate::providers::{DavEntry, DavError, DavTransport, HttpTransport, WebDavClient};
use crate::upload::{UploadBatch, UploadFile};

/// Route prefix of the directory view
pub const BROWSE_ROUTE: &str = "/browse";

/// Single-writer cell holding the storage path of the directory on screen.
///
/// Readers take a [`watch::Receiver`] and observe changes without triggering
/// a listing themselves.
#[derive(Debug)]
pub struct CurrentDirectory {
    tx: watch::Sender<String>,
}

impl Default for CurrentDirectory {
    fn default() -> Self {
        let (tx, _) = watch::channel("/".to_string());
        Self { tx }
    }
}

impl CurrentDirectory {
    pub fn get(&self) -> String {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }

    fn set(&self, storage_path: String) {
        self.tx.send_replace(storage_path);
    }
}

/// Visible route for a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// `/browse` or `/browse/<segment>`
    pub path: String,
    /// Target is the directory already shown; the listing must be redone
    pub force_refresh: bool,
}

/// Order entries for display. The order is total: ties fall back to the name.
pub fn sort_entries(entries: &mut [DavEntry], order: SortOrder) {
    fn by_name(a: &DavEntry, b: &DavEntry) -> Ordering {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    }
    fn dirs_first(a: &DavEntry, b: &DavEntry) -> Ordering {
        b.is_dir.cmp(&a.is_dir)
    }

    match order {
        SortOrder::Name => entries.sort_by(|a, b| dirs_first(a, b).then_with(|| by_name(a, b))),
        SortOrder::Date => entries.sort_by(|a, b| {
            match (a.modified, b.modified) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| by_name(a, b))
        }),
        SortOrder::Size => entries.sort_by(|a, b| {
            dirs_first(a, b).then_with(|| {
                if a.is_dir {
                    by_name(a, b)
                } else {
                    b.size
                        .unwrap_or(0)
                        .cmp(&a.size.unwrap_or(0))
                        .then_with(|| by_name(a, b))
                }
            })
        }),
    }
}

/// Reject names that are empty or would escape the current directory
pub fn validate_name(name: &str) -> Result<&str, DavError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DavError::InvalidName("name cannot be empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DavError::InvalidName(format!(
            "'{}' cannot contain a path separator",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(DavError::InvalidName(format!("'{}' is a reserved name", name)));
    }
    Ok(name)
}

/// Browsing state plus the operations a user can trigger from the listing
pub struct Navigator<T: DavTransport = HttpTransport> {
    client: WebDavClient<T>,
    current: CurrentDirectory,
    entries: Vec<DavEntry>,
    sort_order: SortOrder,
    preferences: PreferenceStore,
}

impl<T: DavTransport> Navigator<T> {
    /// Create a navigator; the sort order comes from the stored preferences.
    /// Nothing is listed until [`Navigator::open`] is called.
    pub fn new(client: WebDavClient<T>, preferences: PreferenceStore) -> Self {
        let sort_order = preferences.load().sort_order;
        Self {
            client,
            current: CurrentDirectory::default(),
            entries: Vec::new(),
            sort_order,
            preferences,
        }
    }

    pub fn client(&self) -> &WebDavClient<T> {
        &self.client
    }

    pub fn entries(&self) -> &[DavEntry] {
        &self.entries
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn current_directory(&self) -> &CurrentDirectory {
        &self.current
    }

    /// Storage path of the directory on screen
    pub fn current_path(&self) -> String {
        self.current.get()
    }

    fn root_path(&self) -> &str {
        self.client.config().root_path()
    }

    /// Storage path of a listed entry
    pub fn entry_storage_path(&self, entry: &DavEntry) -> String {
        storage_path_of(&entry.path, self.root_path())
    }

    /// List a directory and make it the current one
    pub async fn open(&mut self, navigation_path: &str) -> Result<(), DavError> {
        let storage_path = to_storage_path(navigation_path);
        let mut entries = self.client.list_directory(&storage_path).await?;
        sort_entries(&mut entries, self.sort_order);

        tracing::info!(
            "Loaded {} entries for {}",
            entries.len(),
            display_path(&storage_path)
        );
        self.entries = entries;
        self.current.set(storage_path);
        Ok(())
    }

    /// Route for a directory given as a storage path, a server path or a full URL
    pub fn route_to(&self, target_path: &str) -> Route {
        let root = self.client.config().root_url.as_str();
        let segment = to_navigation_segment(target_path, root);
        let path = if segment.is_empty() {
            BROWSE_ROUTE.to_string()
        } else {
            format!("{}/{}", BROWSE_ROUTE, segment)
        };
        let force_refresh = paths_equal(&to_storage_path(&segment), &self.current.get(), root);
        Route {
            path,
            force_refresh,
        }
    }

    /// Move to a directory. The listing is redone even when it is already shown.
    pub async fn navigate_to(&mut self, target_path: &str) -> Result<Route, DavError> {
        let route = self.route_to(target_path);
        if route.force_refresh {
            tracing::debug!("Re-listing current directory {}", route.path);
        }
        let segment = route
            .path
            .strip_prefix(BROWSE_ROUTE)
            .unwrap_or("")
            .to_string();
        self.open(&segment).await?;
        Ok(route)
    }

    pub async fn refresh(&mut self) -> Result<(), DavError> {
        let current = self.current.get();
        self.open(&current).await
    }

    pub async fn parent_directory(&mut self) -> Result<(), DavError> {
        let parent = parent_of(&self.current.get());
        self.open(&parent).await
    }

    /// Re-sort the entries on screen and remember the choice
    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
        sort_entries(&mut self.entries, order);
        if let Err(e) = self.preferences.save(&Preferences { sort_order: order }) {
            tracing::warn!("Failed to persist sort order: {}", e);
        }
    }

    fn child_path(&self, name: &str, is_dir: bool) -> String {
        join_child(&self.current.get(), name, is_dir)
    }

    /// Create a directory in the current directory; returns its storage path
    pub async fn create_directory(&mut self, name: &str) -> Result<String, DavError> {
        let name = validate_name(name)?;
        let path = self.child_path(name, true);
        self.client.create_directory(&path).await?;
        self.refresh().await?;
        Ok(path)
    }

    /// Create (or overwrite) a file in the current directory
    pub async fn create_file(&mut self, name: &str, content: &str) -> Result<String, DavError> {
        let name = validate_name(name)?;
        let path = self.child_path(name, false);
        self.client.create_file(&path, content.as_bytes()).await?;
        self.refresh().await?;
        Ok(path)
    }

    pub async fn delete_entry(&mut self, entry: &DavEntry) -> Result<String, DavError> {
        let path = self.entry_storage_path(entry);
        self.client.delete(&path).await?;
        self.refresh().await?;
        Ok(path)
    }

    /// Rename an entry within the current directory; returns the new storage path
    pub async fn rename_entry(&mut self, entry: &DavEntry, new_name: &str) -> Result<String, DavError> {
        let new_name = validate_name(new_name)?;
        let old_path = self.entry_storage_path(entry);
        let new_path = self.child_path(new_name, entry.is_dir);
        tracing::info!("Renaming {} -> {}", entry.name, new_name);
        self.client.rename(&old_path, &new_path).await?;
        self.refresh().await?;
        Ok(new_path)
    }

    /// Upload files into the current directory one after another.
    ///
    /// `on_progress` receives the aggregate percentage and the per-file
    /// records after every tick. The first failure stops the batch.
    pub async fn upload_files<F>(
        &mut self,
        files: &[UploadFile],
        mut on_progress: F,
    ) -> Result<UploadBatch, DavError>
    where
        F: FnMut(u8, &UploadBatch),
    {
        let mut batch = UploadBatch::new(files);
        if files.is_empty() {
            return Ok(batch);
        }
        for file in files {
            validate_name(&file.name)?;
        }

        for (index, file) in files.iter().enumerate() {
            let path = self.child_path(file.name.trim(), false);
            self.client
                .upload_file(&path, file, |percent, _| {
                    batch.update(index, percent);
                    on_progress(batch.aggregate(), &batch);
                })
                .await?;
            batch.complete(index);
            on_progress(batch.aggregate(), &batch);
        }

        tracing::info!("Uploaded {} files to {}", files.len(), display_path(&self.current.get()));
        self.refresh().await?;
        Ok(batch)
    }

    pub async fn save_entry_content(&mut self, entry: &DavEntry, content: &str) -> Result<(), DavError> {
        let path = self.entry_storage_path(entry);
        self.client.save_file_content(&path, content).await?;
        self.refresh().await
    }

    pub async fn download_entry(&self, entry: &DavEntry) -> Result<Vec<u8>, DavError> {
        self.client.download_file(&self.entry_storage_path(entry)).await
    }

    pub async fn entry_content(&self, entry: &DavEntry) -> Result<String, DavError> {
        self.client.get_file_content(&self.entry_storage_path(entry)).await
    }
}
