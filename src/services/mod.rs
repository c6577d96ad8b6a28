pub mod chunker;
pub mod cohere;
pub mod conversation;
pub mod library;
pub mod llm_provider;
pub mod pdf;
pub mod session;
