//! Meek core library: application paths, `app.ini` lookup, prompt skills, and the chat kernel
//! used by the `meek` CLI.

pub mod config;
pub mod kernel;
pub mod llm;
pub mod paths;
pub mod skills;
