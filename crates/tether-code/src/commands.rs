//! Slash-command parser for the REPL.
//!
//! Lines starting with `/` are commands for the surrounding REPL; anything
//! else is a prompt for the agent. Unknown commands come back as
//! [`ReplCommand::Unknown`] so the REPL can hint instead of erroring.

/// One parsed REPL input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    /// Show the todo list.
    Todos,
    /// Show model and workspace information.
    Status,
    /// Compact the context window now.
    Compact,
    /// Drop the conversation context.
    Clear,
    /// Show the model (`/model`) or switch it (`/model <id>`).
    Model(Option<String>),
    /// Trip the cancellation flag.
    Cancel,
    Quit,
    /// Plain text for the agent.
    Prompt(String),
    Unknown(String),
}

/// Parse one input line. Returns `None` for blank lines.
pub fn parse_line(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ReplCommand::Prompt(line.to_string()));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    Some(match name {
        "help" | "h" | "?" => ReplCommand::Help,
        "todos" | "todo" => ReplCommand::Todos,
        "status" => ReplCommand::Status,
        "compact" => ReplCommand::Compact,
        "clear" => ReplCommand::Clear,
        "model" => ReplCommand::Model(argument.map(String::from)),
        "cancel" => ReplCommand::Cancel,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    })
}

/// Help text for `/help`.
pub const HELP_TEXT: &str = "\
Commands:
  /help           show this help
  /todos          show the todo list
  /status         show model and workspace
  /compact        compact the conversation context now
  /clear          drop the conversation context
  /model [id]     show or switch the model
  /cancel         cancel the in-flight request
  /quit           exit
Anything else is sent to the agent.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   \t "), None);
    }

    #[test]
    fn plain_text_is_a_prompt() {
        assert_eq!(
            parse_line("explain src/main.zig"),
            Some(ReplCommand::Prompt("explain src/main.zig".into()))
        );
    }

    #[test]
    fn commands_parse_with_aliases() {
        assert_eq!(parse_line("/help"), Some(ReplCommand::Help));
        assert_eq!(parse_line("/?"), Some(ReplCommand::Help));
        assert_eq!(parse_line("/todo"), Some(ReplCommand::Todos));
        assert_eq!(parse_line("/quit"), Some(ReplCommand::Quit));
        assert_eq!(parse_line("/exit"), Some(ReplCommand::Quit));
        assert_eq!(parse_line("/cancel"), Some(ReplCommand::Cancel));
    }

    #[test]
    fn model_takes_an_optional_argument() {
        assert_eq!(parse_line("/model"), Some(ReplCommand::Model(None)));
        assert_eq!(
            parse_line("/model vendor/some-model"),
            Some(ReplCommand::Model(Some("vendor/some-model".into())))
        );
    }

    #[test]
    fn unknown_commands_are_reported_not_fatal() {
        assert_eq!(
            parse_line("/frobnicate now"),
            Some(ReplCommand::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn leading_whitespace_is_tolerated() {
        assert_eq!(parse_line("  /status  "), Some(ReplCommand::Status));
    }
}
