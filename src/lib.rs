pub mod config;
pub mod core;
pub mod logging;
pub mod search;
pub mod session;
pub mod tools;

// Model API and credentials
pub mod llm;

// External collaborators: qmd, Obsidian, the vault on disk
pub mod integrations;

// Conversation bridge and event normalization
pub mod agent;

// Terminal and HTTP delivery
pub mod cli;
pub mod transport;
