//! Provider-agnostic chat model client.
//!
//! Every provider implements [`ChatModel`]: one prompt in, one text
//! completion out. [`RetryingModel`] adds timeouts and bounded retries
//! around any of them.

pub mod claude;
pub mod gemini;
mod http;
pub mod openai;
pub mod retry;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use gemini::Gemini;
pub use openai::OpenAi;
pub use retry::{RetryPolicy, RetryingModel};
pub use traits::{ChatModel, Completion, Message, MessageRole, Prompt};
pub use util::{sanitize_llm_json, truncate_to_char_boundary};
