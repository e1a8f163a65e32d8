pub mod auth;
pub mod dao;
pub mod llm;
pub mod resume;
pub mod store;
pub mod transcribe;
