pub mod commands;
pub mod config;
pub mod export;
pub mod llm;
pub mod research;
pub mod search;
