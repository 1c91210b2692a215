// Library interface for curator modules
// This allows tests and other binaries to import modules

pub mod articles;
pub mod components;
pub mod error;
pub mod llm;
pub mod preflight;
pub mod server;
pub mod session;
pub mod tools;
pub mod workflow;
