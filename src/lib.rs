// dashgrab — resolve a video page URL into media streams, download split
// DASH tracks concurrently, and remux them into one playable file.

pub mod errors;
pub mod fetch;
pub mod merge;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod selector;
pub mod traits;
pub mod utils;

pub use errors::FatalError;
pub use models::{FormatDescriptor, Report, Selection};
pub use orchestrator::Orchestrator;
pub use selector::{select, QUALITY_CEILING};
