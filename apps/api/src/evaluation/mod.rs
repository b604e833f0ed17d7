// Resume Evaluation Pipeline
// Implements: upload validation, text extraction, LLM scoring with key rotation,
// candidate/evaluation persistence, notification hand-off, SSE progress streaming.
// All LLM calls go through llm_client via the ChatBackend trait.

pub mod evaluator;
pub mod extractor;
pub mod handlers;
pub mod key_store;
pub mod models;
pub mod persister;
pub mod pipeline;
pub mod prompts;
pub mod stream;
