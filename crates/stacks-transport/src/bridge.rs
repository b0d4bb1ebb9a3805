//! Reparses [`stacks_conversation::Conversation::serialize`] output back
//! into structured messages, per the §4.4/§6.1 bracketed-header contract.
//!
//! The round-trip is not guaranteed lossless for content containing lines
//! that happen to match a header pattern — a known limitation carried over
//! verbatim from the contract this bridges.

use stacks_conversation::{ConversationMessage, Role};

pub const ROLE_HEADERS: &[&str] = &["[System]", "[User]", "[Assistant]"];

enum Header {
    System,
    User,
    Assistant,
    ToolResult(String),
}

fn match_header(line: &str) -> Option<Header> {
    match line {
        "[System]" => Some(Header::System),
        "[User]" => Some(Header::User),
        "[Assistant]" => Some(Header::Assistant),
        _ => {
            let rest = line.strip_prefix("[Tool Result: ")?;
            let label = rest.strip_suffix(']')?;
            Some(Header::ToolResult(label.to_string()))
        }
    }
}

/// Splits on the documented headers and reconstructs the role sequence.
pub fn parse_transcript(text: &str) -> Vec<ConversationMessage> {
    let mut messages = Vec::new();
    let mut current: Option<(Header, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(header) = match_header(line) {
            if let Some((prev_header, content_lines)) = current.take() {
                messages.push(build_message(prev_header, content_lines));
            }
            current = Some((header, Vec::new()));
        } else if let Some((_, content_lines)) = &mut current {
            content_lines.push(line);
        }
    }
    if let Some((header, content_lines)) = current {
        messages.push(build_message(header, content_lines));
    }
    messages
}

fn build_message(header: Header, content_lines: Vec<&str>) -> ConversationMessage {
    let content = content_lines.join("\n").trim_end().to_string();
    match header {
        Header::System => ConversationMessage {
            role: Role::System,
            content,
            tool_call_id: None,
            tool_name: None,
        },
        Header::User => ConversationMessage {
            role: Role::User,
            content,
            tool_call_id: None,
            tool_name: None,
        },
        Header::Assistant => ConversationMessage {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            tool_name: None,
        },
        Header::ToolResult(label) => ConversationMessage {
            role: Role::ToolResult,
            content,
            tool_call_id: Some(label.clone()),
            tool_name: Some(label),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacks_conversation::{Conversation, ConversationConfig};

    #[test]
    fn round_trips_role_sequence() {
        let mut c = Conversation::new(ConversationConfig::default());
        c.set_system_prompt("be helpful");
        c.add_user("hi there");
        c.add_assistant("hello!");
        c.add_tool_result("call_1", "search", "result data");

        let serialized = c.serialize();
        let parsed = parse_transcript(&serialized);
        let roles: Vec<Role> = parsed.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::ToolResult]
        );
        assert_eq!(parsed[1].content, "hi there");
        assert_eq!(parsed[3].tool_name.as_deref(), Some("search"));
    }
}
