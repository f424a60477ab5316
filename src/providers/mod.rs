//! WebDAV access layer
//!
//! Everything that talks to the storage server lives here. The client builds
//! requests, a transport executes them, and the multistatus parser turns
//! listing bodies into resource blocks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                WebDavClient                  │
//! │ list, stat, mkcol, put, get, delete, move    │
//! └──────────────────────────────────────────────┘
//!            │                        │
//!            ▼                        ▼
//!   ┌──────────────────┐    ┌──────────────────┐
//!   │  DavTransport    │    │   multistatus    │
//!   │ (reqwest / mem)  │    │  (quick-xml)     │
//!   └──────────────────┘    └──────────────────┘
//! ```

pub mod multistatus;
pub mod transport;
pub mod types;
pub mod webdav;

#[cfg(test)]
pub(crate) mod memory;

pub use transport::{
    DavBody, DavMethod, DavRequest, DavResponse, DavTransport, HttpTransport, TransferTick,
    METADATA_TIMEOUT, TRANSFER_TIMEOUT,
};
pub use types::*;
pub use webdav::WebDavClient;
