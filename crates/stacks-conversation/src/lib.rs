//! Append-only multi-role message log with a bracketed-header
//! serialization contract and auto-compaction signal (§4.4).

pub use stacks_core::ConversationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
}

impl ConversationMessage {
    fn header(&self) -> String {
        match self.role {
            Role::System => "[System]".to_string(),
            Role::User => "[User]".to_string(),
            Role::Assistant => "[Assistant]".to_string(),
            Role::ToolResult => {
                let label = self
                    .tool_name
                    .as_deref()
                    .or(self.tool_call_id.as_deref())
                    .unwrap_or("unknown");
                format!("[Tool Result: {label}]")
            }
        }
    }
}

/// A single optional system prompt kept separate from the ordered message
/// list; on serialization the system prompt is prepended.
pub struct Conversation {
    system_prompt: Option<String>,
    messages: Vec<ConversationMessage>,
    config: ConversationConfig,
}

impl Conversation {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            system_prompt: None,
            messages: Vec::new(),
            config,
        }
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
        self.trim();
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.push(ConversationMessage {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
        });
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.push(ConversationMessage {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
        });
    }

    pub fn add_tool_result(
        &mut self,
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.push(ConversationMessage {
            role: Role::ToolResult,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_name: Some(name.into()),
        });
    }

    /// Replaces the buffer. Any `system`-role message in `msgs` becomes the
    /// system prompt (the last one wins); all others become the ordered
    /// message list in order.
    pub fn load_messages(&mut self, msgs: Vec<ConversationMessage>) {
        self.messages.clear();
        for msg in msgs {
            if msg.role == Role::System {
                self.system_prompt = Some(msg.content);
            } else {
                self.messages.push(msg);
            }
        }
        self.trim();
    }

    /// `[system?] ++ messages` as an immutable sequence.
    pub fn to_messages(&self) -> Vec<ConversationMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            out.push(ConversationMessage {
                role: Role::System,
                content: prompt.clone(),
                tool_call_id: None,
                tool_name: None,
            });
        }
        out.extend(self.messages.iter().cloned());
        out
    }

    /// The canonical string used as the transport's prompt input. A
    /// contract: the transport bridge reparses this back into structured
    /// messages by splitting on the documented headers.
    pub fn serialize(&self) -> String {
        self.to_messages()
            .iter()
            .map(|m| format!("{}\n{}", m.header(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Empties the buffer and inserts a single `user` message summarizing
    /// it. Never raises; callers decide whether to invoke this at all.
    pub fn compact(&mut self, summary: impl AsRef<str>) {
        self.messages.clear();
        self.messages.push(ConversationMessage {
            role: Role::User,
            content: format!("[Conversation summary]\n{}", summary.as_ref()),
            tool_call_id: None,
            tool_name: None,
        });
    }

    pub fn estimated_chars(&self) -> usize {
        let system_len = self.system_prompt.as_ref().map(|s| s.len()).unwrap_or(0);
        system_len + self.messages.iter().map(|m| m.content.len()).sum::<usize>()
    }

    pub fn needs_compaction(&self) -> bool {
        self.estimated_chars() > self.config.auto_compact_chars
    }

    /// Drops the oldest non-system messages to fit `max_messages`, when
    /// trimming is enabled (`max_messages > 0`).
    fn trim(&mut self) {
        if self.config.max_messages == 0 {
            return;
        }
        if self.messages.len() > self.config.max_messages {
            let excess = self.messages.len() - self.config.max_messages;
            self.messages.drain(0..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> Conversation {
        Conversation::new(ConversationConfig::default())
    }

    #[test]
    fn serialize_prepends_system_prompt() {
        let mut c = conv();
        c.set_system_prompt("be helpful");
        c.add_user("hi");
        let s = c.serialize();
        assert!(s.starts_with("[System]\nbe helpful"));
        assert!(s.contains("[User]\nhi"));
    }

    #[test]
    fn tool_result_header_uses_name_over_id() {
        let mut c = conv();
        c.add_tool_result("call_1", "search", "result data");
        let s = c.serialize();
        assert!(s.contains("[Tool Result: search]\nresult data"));
    }

    #[test]
    fn compact_replaces_buffer_with_single_summary_message() {
        let mut c = conv();
        c.add_user("a");
        c.add_assistant("b");
        c.compact("summary text");
        let msgs = c.to_messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].content, "[Conversation summary]\nsummary text");
    }

    #[test]
    fn needs_compaction_reflects_threshold() {
        let mut config = ConversationConfig::default();
        config.auto_compact_chars = 10;
        let mut c = Conversation::new(config);
        assert!(!c.needs_compaction());
        c.add_user("this message is definitely longer than ten characters");
        assert!(c.needs_compaction());
    }

    #[test]
    fn trimming_drops_oldest_non_system_messages() {
        let mut config = ConversationConfig::default();
        config.max_messages = 2;
        let mut c = Conversation::new(config);
        c.set_system_prompt("sys");
        c.add_user("one");
        c.add_user("two");
        c.add_user("three");
        let msgs = c.to_messages();
        // system prompt is kept separate from trimming and always present.
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].content, "two");
        assert_eq!(msgs[2].content, "three");
    }

    #[test]
    fn load_messages_extracts_system_role() {
        let mut c = conv();
        c.load_messages(vec![
            ConversationMessage {
                role: Role::System,
                content: "sys".into(),
                tool_call_id: None,
                tool_name: None,
            },
            ConversationMessage {
                role: Role::User,
                content: "hi".into(),
                tool_call_id: None,
                tool_name: None,
            },
        ]);
        assert_eq!(c.system_prompt(), Some("sys"));
        assert_eq!(c.to_messages().len(), 2);
    }
}
