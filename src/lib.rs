// WebDAV Navigator - file manager core for WebDAV storage
// Listing, path resolution and file operations against a single storage root

pub mod config;
pub mod dialogs;
pub mod helpers;
pub mod navigation;
pub mod paths;
pub mod preferences;
pub mod providers;
pub mod upload;

pub use config::AppConfig;
pub use dialogs::{DialogOutcome, DialogRequest};
pub use navigation::{CurrentDirectory, Navigator, Route};
pub use preferences::{PreferenceStore, SortOrder};
pub use providers::{DavEntry, DavError, ErrorKind, WebDavClient, WebDavConfig};
pub use upload::{UploadBatch, UploadFile};

/// Install the fmt subscriber, logging to stderr
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
