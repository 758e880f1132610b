//! Terminal presentation

pub mod console;

pub use console::Console;
