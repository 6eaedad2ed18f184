//! Append-only chat transcript.

use serde::{Deserialize, Serialize};

/// One line of the synthesized "thinking" interstitial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingStatus {
    /// `{step_id}-{interstitial}-{line}`; unique across a session.
    pub id: String,
    pub label: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// The widget for a step, introduced by its prompt text.
    BotStep {
        step_id: String,
        index: usize,
        prompt: String,
    },
    UserEcho {
        text: String,
    },
    Acknowledgement {
        text: String,
    },
    Credential {
        text: String,
    },
    Thinking {
        step_id: String,
        lines: Vec<ThinkingStatus>,
    },
    Diagnosis {
        headline: String,
        body: String,
    },
    /// Free-form bot note, e.g. the escalation warning shown after the
    /// diagnosis.
    Consequence {
        text: String,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::BotStep { .. } => "bot_step",
            Message::UserEcho { .. } => "user_echo",
            Message::Acknowledgement { .. } => "acknowledgement",
            Message::Credential { .. } => "credential",
            Message::Thinking { .. } => "thinking",
            Message::Diagnosis { .. } => "diagnosis",
            Message::Consequence { .. } => "consequence",
        }
    }

    /// Plain text for terminal rendering. Bot steps render as their prompt.
    pub fn text(&self) -> String {
        match self {
            Message::BotStep { prompt, .. } => prompt.clone(),
            Message::UserEcho { text }
            | Message::Acknowledgement { text }
            | Message::Credential { text }
            | Message::Consequence { text } => text.clone(),
            Message::Thinking { lines, .. } => lines
                .iter()
                .map(|line| format!("{} {}", line.icon, line.label))
                .collect::<Vec<_>>()
                .join("\n"),
            Message::Diagnosis { headline, body } => format!("{headline} {body}"),
        }
    }

    pub fn is_from_user(&self) -> bool {
        matches!(self, Message::UserEcho { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_serialize_with_type_tag() {
        let echo = Message::UserEcho {
            text: "Let's see my plan!".into(),
        };
        assert_eq!(
            serde_json::to_value(&echo).unwrap(),
            json!({ "type": "user_echo", "text": "Let's see my plan!" })
        );
        assert_eq!(echo.kind(), "user_echo");
        assert!(echo.is_from_user());
    }

    #[test]
    fn thinking_text_joins_lines() {
        let message = Message::Thinking {
            step_id: "severity".into(),
            lines: vec![
                ThinkingStatus {
                    id: "severity-1-0".into(),
                    label: "Weighing severity".into(),
                    icon: "📊".into(),
                },
                ThinkingStatus {
                    id: "severity-1-1".into(),
                    label: "Done".into(),
                    icon: "✅".into(),
                },
            ],
        };
        assert_eq!(message.text(), "📊 Weighing severity\n✅ Done");
    }
}
