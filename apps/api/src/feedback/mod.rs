// Feedback pipeline: prompt templates, the two-track session, and its HTTP handlers.
// All completion calls go through llm_client; nothing here talks to the provider directly.

pub mod handlers;
pub mod prompts;
pub mod session;
