//! Bot command parsing.
//!
//! Recognised commands:
//!
//! | Input                     | Command                         |
//! |---------------------------|---------------------------------|
//! | `!chat <prompt>`          | chat completion with history    |
//! | `!generate <prompt>`      | image generation                |
//! | `!resetmemory [user]`     | owner-only history reset        |
//! | `!help`                   | command list                    |
//!
//! `--debug` anywhere in a chat or generate prompt is stripped and asks for the
//! raw backend response instead of the formatted answer.

const CHAT_PREFIX: &str = "!chat ";
const GENERATE_PREFIX: &str = "!generate ";
const RESET_COMMAND: &str = "!resetmemory";
const HELP_COMMAND: &str = "!help";
const DEBUG_FLAG: &str = "--debug";

/// A parsed bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat { prompt: String, debug: bool },
    Generate { prompt: String, debug: bool },
    ResetMemory { target: Option<String> },
    Help,
}

impl Command {
    /// Parse a message. Returns `None` for anything that is not a command.
    pub fn parse(content: &str) -> Option<Self> {
        if let Some(rest) = strip_word(content, RESET_COMMAND) {
            let target = rest.split_whitespace().next().map(strip_mention);
            return Some(Self::ResetMemory { target });
        }

        if content.trim() == HELP_COMMAND {
            return Some(Self::Help);
        }

        if let Some(rest) = content.strip_prefix(CHAT_PREFIX) {
            let (prompt, debug) = take_debug_flag(rest)?;
            return Some(Self::Chat { prompt, debug });
        }

        if let Some(rest) = content.strip_prefix(GENERATE_PREFIX) {
            let (prompt, debug) = take_debug_flag(rest)?;
            return Some(Self::Generate { prompt, debug });
        }

        None
    }
}

/// Strip `word` when it is the whole first token of `content`.
fn strip_word<'a>(content: &'a str, word: &str) -> Option<&'a str> {
    let rest = content.strip_prefix(word)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Remove every `--debug` token. `None` when nothing is left to send.
fn take_debug_flag(raw: &str) -> Option<(String, bool)> {
    let raw = raw.trim();
    let debug = raw.contains(DEBUG_FLAG);
    let prompt = if debug {
        raw.replace(DEBUG_FLAG, "").trim().to_string()
    } else {
        raw.to_string()
    };

    if prompt.is_empty() {
        None
    } else {
        Some((prompt, debug))
    }
}

/// `<@123>` / `<@!123>` → `123`; anything else is returned unchanged.
fn strip_mention(token: &str) -> String {
    token
        .strip_prefix("<@")
        .and_then(|t| t.strip_suffix('>'))
        .map(|t| t.trim_start_matches('!'))
        .unwrap_or(token)
        .to_string()
}

/// Text sent for `!help`.
pub fn help_text() -> String {
    [
        "**Commands**",
        "`!chat <prompt>` - talk to the model (attach an image to include it)",
        "`!generate <prompt>` - generate an image",
        "`!resetmemory [user]` - clear conversation memory (owner only)",
        "Add `--debug` to a chat or generate prompt to see the raw backend response.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat() {
        assert_eq!(
            Command::parse("!chat  hello there "),
            Some(Command::Chat {
                prompt: "hello there".into(),
                debug: false
            })
        );
    }

    #[test]
    fn parse_chat_debug_anywhere() {
        assert_eq!(
            Command::parse("!chat what --debug is this"),
            Some(Command::Chat {
                prompt: "what  is this".into(),
                debug: true
            })
        );
        assert_eq!(
            Command::parse("!chat --debug hi"),
            Some(Command::Chat {
                prompt: "hi".into(),
                debug: true
            })
        );
    }

    #[test]
    fn parse_generate() {
        assert_eq!(
            Command::parse("!generate a red fox --debug"),
            Some(Command::Generate {
                prompt: "a red fox".into(),
                debug: true
            })
        );
    }

    #[test]
    fn empty_prompts_are_ignored() {
        assert_eq!(Command::parse("!chat "), None);
        assert_eq!(Command::parse("!chat --debug"), None);
        assert_eq!(Command::parse("!generate    "), None);
        assert_eq!(Command::parse("!chat"), None);
    }

    #[test]
    fn parse_reset_memory() {
        assert_eq!(
            Command::parse("!resetmemory"),
            Some(Command::ResetMemory { target: None })
        );
        assert_eq!(
            Command::parse("!resetmemory <@!42> extra"),
            Some(Command::ResetMemory {
                target: Some("42".into())
            })
        );
        assert_eq!(
            Command::parse("!resetmemory 77"),
            Some(Command::ResetMemory {
                target: Some("77".into())
            })
        );
        assert_eq!(Command::parse("!resetmemoryplease"), None);
    }

    #[test]
    fn parse_help() {
        assert_eq!(Command::parse("!help"), Some(Command::Help));
        assert!(help_text().contains("!resetmemory"));
    }

    #[test]
    fn other_text_is_not_a_command() {
        assert_eq!(Command::parse("hello bot"), None);
        assert_eq!(Command::parse(" !chat leading space"), None);
        assert_eq!(Command::parse("!unknown"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn mention_stripping() {
        assert_eq!(strip_mention("<@123>"), "123");
        assert_eq!(strip_mention("<@!123>"), "123");
        assert_eq!(strip_mention("plain"), "plain");
    }
}
