// Data models for the FileMuncher API

pub mod manifest;
pub mod upload;
pub mod workspace;

pub use manifest::{FileManifest, ManifestFile};
pub use upload::{VideoUploadRequest, VideoUploadSession};
pub use workspace::{CreateWorkspaceRequest, WorkspaceAccessToken};
