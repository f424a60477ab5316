// Dialog requests
// Every confirmation dialog of the file manager submits one of these

use serde::{Deserialize, Serialize};

use crate::navigation::Navigator;
use crate::providers::{DavEntry, DavError, DavTransport};
use crate::upload::{UploadBatch, UploadFile};

/// What a dialog asks the navigator to do
#[derive(Debug, Clone)]
pub enum DialogRequest {
    CreateDirectory { name: String },
    CreateFile { name: String, content: String },
    Rename { entry: DavEntry, new_name: String },
    Delete { entry: DavEntry },
    Upload { files: Vec<UploadFile> },
}

impl DialogRequest {
    pub fn title(&self) -> &'static str {
        match self {
            DialogRequest::CreateDirectory { .. } => "New folder",
            DialogRequest::CreateFile { .. } => "New file",
            DialogRequest::Rename { .. } => "Rename",
            DialogRequest::Delete { .. } => "Delete",
            DialogRequest::Upload { .. } => "Upload",
        }
    }
}

/// Result of a submitted dialog; storage paths of what changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogOutcome {
    DirectoryCreated { path: String },
    FileCreated { path: String },
    Renamed { from: String, to: String },
    Deleted { path: String },
    Uploaded { batch: UploadBatch },
}

impl<T: DavTransport> Navigator<T> {
    /// Run the operation behind a dialog. The listing is refreshed on success.
    pub async fn submit(&mut self, request: DialogRequest) -> Result<DialogOutcome, DavError> {
        tracing::debug!("Dialog submitted: {}", request.title());
        match request {
            DialogRequest::CreateDirectory { name } => {
                let path = self.create_directory(&name).await?;
                Ok(DialogOutcome::DirectoryCreated { path })
            }
            DialogRequest::CreateFile { name, content } => {
                let path = self.create_file(&name, &content).await?;
                Ok(DialogOutcome::FileCreated { path })
            }
            DialogRequest::Rename { entry, new_name } => {
                let from = self.entry_storage_path(&entry);
                let to = self.rename_entry(&entry, &new_name).await?;
                Ok(DialogOutcome::Renamed { from, to })
            }
            DialogRequest::Delete { entry } => {
                let path = self.delete_entry(&entry).await?;
                Ok(DialogOutcome::Deleted { path })
            }
            DialogRequest::Upload { files } => {
                let batch = self
                    .upload_files(&files, |aggregate, _| {
                        tracing::debug!("Upload progress: {}%", aggregate);
                    })
                    .await?;
                Ok(DialogOutcome::Uploaded { batch })
            }
        }
    }
}
