//! Media attachment cipher pipeline: per-blob key schedule, AES-256-CBC
//! encryption, truncated HMAC authentication, and size-limited upload and
//! download through a caller-supplied HTTPS collaborator.

mod pipeline;
mod transport;

pub use pipeline::{download, upload, DownloadedMedia, MediaKind, UploadedMedia};
pub use transport::MediaTransport;
