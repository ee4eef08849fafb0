pub mod descriptor;
pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod outcome;

pub use descriptor::{Credential, RangeEncoding, SourceDescriptor, DEFAULT_TIMEOUT};
pub use error::{FetchError, SkipReason};
pub use fetcher::RangeFetcher;
pub use normalize::flatten_entries;
pub use outcome::{Batch, FetchOutcome};
