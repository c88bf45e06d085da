pub mod config;
pub mod logging;
pub mod paths;
pub mod remote;
pub mod retry;
pub mod scheduler;
pub mod task;
pub mod transfer;
pub mod walker;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, MirrorConfig};
pub use remote::{RemoteError, RemoteStore, YadiskRemote};
pub use retry::RetryPolicy;
pub use scheduler::{Mirror, MirrorError, MirrorSummary};
pub use task::{TaskError, UploadTask};
pub use transfer::{TransferError, TransferReport, upload_resumable};
pub use walker::{SourceEntry, TreeWalker, WalkError};
