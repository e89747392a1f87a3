pub mod dedup;
pub mod error;
pub mod progress;
pub mod types;

pub use dedup::{DedupStore, FileDedupStore, MemoryDedupStore};
pub use error::{Result, StoreError};
pub use progress::{FileProgressStore, MemoryProgressStore, ProgressStore};
pub use types::{DedupEntry, FinalStatus};
