pub mod error;
pub mod fetch;
pub mod inventory;
pub mod walker;

pub use error::ScanError;
pub use fetch::Fetcher;
pub use inventory::{CrawlInventory, ExtensionFilter, NodeKind, RemoteNode};
pub use walker::{ProgressCallback, Walker};
