pub mod item;
pub mod loaders;
pub mod outcome;
pub mod resource;

pub use item::{CaptureStrategy, CapturedPage, DiscoveredItem, ProbedItem};
pub use loaders::{load_urls_from_file, parse_url_list};
pub use outcome::{BatchOutcome, BatchSummary, OutcomeStatus};
pub use resource::{ResourceKind, ResourceRef};
