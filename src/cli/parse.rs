//! Free-form command strings such as
//! `"write a report on tides and send to ops@example.com"`.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").ok());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("No valid email found in command")]
    NoAddress,

    #[error("No goal/action found in command")]
    EmptyGoal,
}

/// Goal and delivery target extracted from a command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub goal: String,
    pub target: String,
}

/// Splits a command into its goal and the first e-mail address it names.
///
/// A trailing `send to <addr>` / `and send to <addr>` clause is removed from
/// the goal; other mentions of the address are left as written.
pub fn parse_command(command: &str) -> Result<ParsedCommand, CommandParseError> {
    let target = EMAIL
        .as_ref()
        .and_then(|re| re.find(command))
        .map(|m| m.as_str().to_string())
        .ok_or(CommandParseError::NoAddress)?;

    let clause = format!(r"(?i)\s+(and\s+)?send\s+to\s+{}", regex::escape(&target));
    let goal = match Regex::new(&clause) {
        Ok(re) => re.replace_all(command, "").trim().to_string(),
        Err(_) => command.trim().to_string(),
    };

    if goal.is_empty() {
        return Err(CommandParseError::EmptyGoal);
    }
    Ok(ParsedCommand { goal, target })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_send_to_clause_is_removed() {
        let parsed = parse_command("create report on tides and send to abc@gmail.com").unwrap();
        assert_eq!(parsed.goal, "create report on tides");
        assert_eq!(parsed.target, "abc@gmail.com");

        let parsed = parse_command("Summarise Q3 numbers Send To ops.team@corp.example.io").unwrap();
        assert_eq!(parsed.goal, "Summarise Q3 numbers");
        assert_eq!(parsed.target, "ops.team@corp.example.io");
    }

    #[test]
    fn test_other_phrasings_keep_the_address_in_the_goal() {
        let parsed = parse_command("send meeting reminder to xyz@gmail.com").unwrap();
        assert_eq!(parsed.goal, "send meeting reminder to xyz@gmail.com");
        assert_eq!(parsed.target, "xyz@gmail.com");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_command("write a poem"),
            Err(CommandParseError::NoAddress)
        );
        assert_eq!(
            parse_command("  send to a@b.com"),
            Err(CommandParseError::EmptyGoal)
        );
    }
}
