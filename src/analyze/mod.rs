//! Event classification: LLM seam (`ai_adapter`) and reply validation (`classifier`).

pub mod ai_adapter;
pub mod classifier;

pub use ai_adapter::{DynLlmClient, LlmClient, MockClient, OpenAiClient};
pub use classifier::{parse_classification, ClassifyError};
