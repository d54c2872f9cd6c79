//! Splits raw input into a command identifier and its arguments.

use serde::Serialize;

/// A tokenized command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCommand {
    /// The input as scored by the complexity estimator.
    pub raw: String,
    /// First whitespace-delimited token (e.g. `/review`). Empty for blank input.
    pub id: String,
    /// Remaining tokens, in order.
    pub args: Vec<String>,
}

impl ParsedCommand {
    pub fn parse(input: &str) -> Self {
        let raw = input.trim().to_string();
        let mut tokens = raw.split_whitespace().map(str::to_string);
        let id = tokens.next().unwrap_or_default();
        let args = tokens.collect();
        Self { raw, id, args }
    }

    /// Append caller-supplied arguments after any inline ones.
    pub fn with_args<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in extra {
            let arg = arg.into();
            if arg.is_empty() {
                continue;
            }
            if !self.raw.is_empty() {
                self.raw.push(' ');
            }
            self.raw.push_str(&arg);
            self.args.push(arg);
        }
        self
    }

    /// Slash commands go through the routing policy; anything else is free text.
    pub fn is_slash_command(&self) -> bool {
        self.id.starts_with('/')
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Number of tokens, command identifier included.
    pub fn token_count(&self) -> usize {
        if self.id.is_empty() {
            0
        } else {
            1 + self.args.len()
        }
    }
}
