pub mod batch;
pub mod parse;
pub mod pipeline;
pub mod stages;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use batch::{BatchOptions, Reprocessor};
pub use pipeline::Pipeline;
pub use traits::CommentStore;
