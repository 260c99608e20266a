//! The four pipeline steps. Each is a free function over the collaborator traits
//! (`SearchClient`, `LlmClient`, `PageExtractor`) so tests can swap in fakes.

mod analyst;
mod researcher;
mod reviewer;
mod writer;

pub use analyst::run_analyst;
pub use researcher::run_researcher;
pub use reviewer::{render_markdown_brief, run_reviewer};
pub use writer::{WriterError, run_writer};
