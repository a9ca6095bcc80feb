//! Foundational low-level utilities shared across the extraction-merge
//! pipeline's crates: atomic file writes, time helpers, table-name
//! normalization, the cross-cutting error taxonomy, and retry/backoff math.

pub mod atomic_io;
pub mod cancellation;
pub mod error;
pub mod normalize;
pub mod retry;
pub mod time_utils;

pub use atomic_io::{remove_dir_all_if_exists, write_bytes_atomic, write_text_atomic};
pub use cancellation::CancellationToken;
pub use error::PipelineError;
pub use normalize::{is_cte_alias, normalize_table_name};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms};
