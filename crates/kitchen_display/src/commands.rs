//! Operator commands typed at the display's terminal.

use common::{ControlCommand, View};

/// Parse one input line. Unknown input yields `None`.
///
/// Accepted: `active`, `completed`, `finish <id>`, `unfinish <id>`, `quit`.
pub fn parse_command(input: &str) -> Option<ControlCommand> {
    let mut parts = input.split_whitespace();
    let verb = parts.next()?.to_ascii_lowercase();
    let arg = parts.next();
    if parts.next().is_some() {
        return None;
    }

    match (verb.as_str(), arg) {
        ("active" | "a", None) => Some(ControlCommand::SetView(View::Active)),
        ("completed" | "c", None) => Some(ControlCommand::SetView(View::Completed)),
        ("finish" | "f", Some(id)) => id.parse().ok().map(ControlCommand::FinishOrder),
        ("unfinish" | "u", Some(id)) => id.parse().ok().map(ControlCommand::UnfinishOrder),
        ("quit" | "q" | "exit", None) => Some(ControlCommand::Shutdown),
        _ => None,
    }
}
