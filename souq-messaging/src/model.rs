use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use souq_core::types::User;

/// Deterministic id shared by both directions of a pair.
pub fn conversation_id(user_a: &str, user_b: &str) -> String {
    if user_a < user_b {
        format!("{}_{}", user_a, user_b)
    } else {
        format!("{}_{}", user_b, user_a)
    }
}

/// Display snapshot of a participant, taken when the conversation is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub profile_image: Option<String>,
}

impl From<&User> for Participant {
    fn from(user: &User) -> Self {
        Participant {
            id: user.id.clone(),
            name: user.full_name.clone(),
            profile_image: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub recipient_id: String,
    pub recipient_name: String,
    pub text: String,
    /// `text`, `image`, `product_inquiry`, ...
    pub message_type: String,
    pub product_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn is_unread_by(&self, user_id: &str) -> bool {
        self.recipient_id == user_id && !self.read
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub product_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub last_message: Option<Message>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// New conversation seeded with its first message.
    pub fn start(sender: Participant, recipient: Participant, product_id: Option<String>, first: Message) -> Self {
        let at = first.created_at;
        Conversation {
            id: first.conversation_id.clone(),
            participants: vec![sender, recipient],
            product_id,
            messages: vec![first.clone()],
            last_message: Some(first),
            last_message_at: Some(at),
            created_at: Some(at),
            updated_at: Some(at),
        }
    }

    /// Placeholder returned for a pair that has never exchanged a message.
    pub fn shell(id: String, product_id: Option<String>) -> Self {
        Conversation {
            id,
            participants: Vec::new(),
            product_id,
            messages: Vec::new(),
            last_message: None,
            last_message_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn append(&mut self, message: Message) {
        let at = message.created_at;
        self.messages.push(message.clone());
        self.last_message = Some(message);
        self.last_message_at = Some(at);
        self.updated_at = Some(at);
    }

    /// Flip every message addressed to `user_id` to read. Returns how many changed.
    pub fn mark_read_for(&mut self, user_id: &str) -> usize {
        let mut marked = 0;
        for message in self.messages.iter_mut().filter(|m| m.is_unread_by(user_id)) {
            message.read = true;
            marked += 1;
        }

        if marked > 0 {
            if let Some(last) = self.last_message.as_mut().filter(|m| m.recipient_id == user_id) {
                last.read = true;
            }
        }

        marked
    }

    pub fn unread_for(&self, user_id: &str) -> usize {
        self.messages.iter().filter(|m| m.is_unread_by(user_id)).count()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }

    pub fn other_participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id != user_id)
    }

    /// Case-insensitive match on the other participant's name or any message text.
    /// `needle` must already be lowercased.
    pub fn matches(&self, user_id: &str, needle: &str) -> bool {
        let name_match = self
            .other_participant(user_id)
            .map(|p| p.name.to_lowercase().contains(needle))
            .unwrap_or(false);

        name_match || self.messages.iter().any(|m| m.text.to_lowercase().contains(needle))
    }
}

/// Inbox entry: the conversation as seen by one participant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: usize,
    pub other_participant: Option<Participant>,
}

impl ConversationSummary {
    pub fn for_user(conversation: Conversation, user_id: &str) -> Self {
        let unread_count = conversation.unread_for(user_id);
        let other_participant = conversation.other_participant(user_id).cloned();
        ConversationSummary {
            conversation,
            unread_count,
            other_participant,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub exists: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSummary {
    pub unread_count: usize,
    /// Only conversations with at least one unread message.
    pub by_conversation: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub recipient_id: Option<String>,
    pub text: Option<String>,
    pub product_id: Option<String>,
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub message: Message,
    pub conversation_id: String,
}
