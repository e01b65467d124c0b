//! In-memory view state: URL pagination/search and scroll offsets.

pub mod page;
pub mod scroll;

pub use page::{BROWSE_KEY, PageState};
pub use scroll::ScrollMemory;
