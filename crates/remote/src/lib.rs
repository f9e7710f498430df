//! Remote store abstraction used by the publish pipeline.
//!
//! - [`RemotePath`]: normalized absolute slash-separated identifier.
//! - [`RemoteStorage`]: the capability set a transport must provide
//!   (existence, mkdir, upload, atomic rename, delete, free space).
//! - [`classify`]: folds transport failures into a closed [`ErrorKind`]
//!   taxonomy for logging and control decisions.
//! - [`DirStorage`]: a transport over a locally mounted directory tree.
//! - [`WebDavStorage`]: a transport over WebDAV (HTTP or HTTPS).

mod classify;
mod dir;
mod path;
mod storage;
mod webdav;

pub use classify::{ClassifiedError, ErrorKind, classify};
pub use dir::DirStorage;
pub use path::{PathError, RemotePath};
pub use storage::{RemoteError, RemoteStorage};
pub use webdav::{WebDavOptions, WebDavStorage};
