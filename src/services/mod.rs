pub mod assembler;
pub mod capture;
pub mod discovery;
pub mod extractor;
pub mod naming;

pub use assembler::{sweep_stale_workspaces, AssemblyReport, DocumentAssembler};
pub use capture::CaptureRouter;
pub use discovery::{discover, DiscoveryConfig, DiscoveryOutcome, DiscoverySource, StopReason};
pub use extractor::{FolderEntrySource, PageImageSource};
pub use naming::{sanitize_filename, strip_pdf_extension, unique_destination};
