use colored::*;
use serde_json::Value;
use std::io::{self, Write};

use crate::search::SearchResult;

/// Colored output for the `ra` commands.
///
/// Assistant text goes to stdout; tool activity and errors go to stderr so
/// piping `ra ask` captures only the answer.
pub struct Console {
    user_color: Color,
    assistant_color: Color,
    tool_color: Color,
}

impl Console {
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
            assistant_color: Color::Green,
            tool_color: Color::Magenta,
        }
    }

    /// Print a welcome banner for a chat session
    pub fn print_banner(&self, vault_name: &str) {
        println!(
            "{}",
            format!("Research Assistant \u{2014} {}", vault_name)
                .bright_blue()
                .bold()
        );
        println!("Type your questions. /quit or Ctrl+C to exit.");
        println!();
    }

    /// Print the input prompt marker (without newline)
    pub fn print_prompt(&self) {
        print!("{} ", ">".color(self.user_color).bold());
        let _ = io::stdout().flush();
    }

    /// Print a chunk of assistant response as it arrives
    pub fn print_assistant_chunk(&self, chunk: &str) {
        print!("{}", chunk.color(self.assistant_color));
        let _ = io::stdout().flush();
    }

    pub fn print_raw(&self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }

    pub fn println(&self) {
        println!();
    }

    /// Print a tool invocation
    pub fn print_tool_start(&self, tool_name: &str, input: &Value) {
        eprintln!(
            "{} {}",
            format!("[{}]", tool_name).color(self.tool_color).bold(),
            input.to_string().bright_black()
        );
    }

    /// Print a tool result, truncated
    pub fn print_tool_end(&self, tool_name: &str, result: &str) {
        let display = truncate(result, 200);
        eprintln!(
            "{} {}",
            format!("[{} done]", tool_name).color(self.tool_color),
            display.bright_black()
        );
    }

    /// Print a system message
    pub fn print_info(&self, message: &str) {
        eprintln!("{}", message);
    }

    pub fn print_success(&self, message: &str) {
        eprintln!("{} {}", "\u{2713}".green().bold(), message);
    }

    pub fn print_warning(&self, message: &str) {
        eprintln!("{} {}", "!".yellow().bold(), message.yellow());
    }

    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Print search hits in rank order
    pub fn print_search_results(&self, results: &[SearchResult]) {
        if results.is_empty() {
            println!("{}", "No results.".bright_black());
            return;
        }

        for (rank, result) in results.iter().enumerate() {
            let title = result.title.as_deref().unwrap_or(&result.file);
            println!(
                "{} {} {}",
                format!("{:>2}.", rank + 1).bright_black(),
                title.bold(),
                format!("({:.2})", result.score).bright_black()
            );
            if result.title.is_some() {
                println!("    {}", result.file.color(self.tool_color));
            }
            if let Some(snippet) = &result.snippet {
                println!("    {}", truncate(snippet.trim(), 160));
            }
        }
    }

    /// Print index status as key/value lines
    pub fn print_status(&self, status: &Value) {
        match status.as_object() {
            Some(fields) => {
                for (key, value) in fields {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    println!("{} {}", format!("{}:", key).bold(), value);
                }
            }
            None => println!("{}", status),
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` to at most `max` characters, marking the cut
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
