use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use std::cmp::Reverse;

use souq_core::error::{AppError, AppResult};
use souq_core::store::{get_json, set_json};
use souq_core::types::{generate_id, User};
use souq_core::{keys, SouqContext};

use crate::model::{
    conversation_id, Conversation, ConversationSummary, ConversationView, Message, Participant, SendMessageInput,
    SentMessage, UnreadSummary,
};

pub struct MessagingService {
    ctx: SouqContext,
}

impl MessagingService {
    pub fn new(ctx: SouqContext) -> Self {
        Self { ctx }
    }

    pub async fn send_message(&self, sender: &User, input: SendMessageInput) -> AppResult<SentMessage> {
        let recipient_id = non_empty(input.recipient_id)
            .ok_or_else(|| AppError::validation("Recipient ID is required", "معرف المستلم مطلوب"))?;

        let text = non_empty(input.text)
            .ok_or_else(|| AppError::validation("Message text is required", "نص الرسالة مطلوب"))?;

        if recipient_id == sender.id {
            return Err(AppError::validation(
                "Cannot send a message to yourself",
                "لا يمكن إرسال رسالة إلى نفسك",
            ));
        }

        let recipient = self
            .ctx
            .users()
            .get(&recipient_id)
            .await?
            .ok_or_else(|| AppError::validation("Recipient not found", "المستلم غير موجود"))?;

        let conversation_id = conversation_id(&sender.id, &recipient.id);
        let product_id = non_empty(input.product_id);

        let conversation_key = keys::conversation(&conversation_id);
        let _conversation_guard = self.ctx.locks.lock(&conversation_key).await;

        // Stamped under the lock so append order matches timestamp order.
        let message = Message {
            id: generate_id("msg"),
            conversation_id: conversation_id.clone(),
            sender_id: sender.id.clone(),
            sender_name: sender.full_name.clone(),
            recipient_id: recipient.id.clone(),
            recipient_name: recipient.full_name.clone(),
            text,
            message_type: non_empty(input.message_type).unwrap_or_else(|| "text".to_string()),
            product_id: product_id.clone(),
            read: false,
            created_at: Utc::now(),
        };

        let conversation = match get_json::<Conversation>(self.ctx.store.as_ref(), &conversation_key).await? {
            Some(mut existing) => {
                existing.append(message.clone());
                existing
            }
            None => Conversation::start(
                Participant::from(sender),
                Participant::from(&recipient),
                product_id,
                message.clone(),
            ),
        };

        set_json(self.ctx.store.as_ref(), &conversation_key, &conversation).await?;

        self.add_to_index(&sender.id, &conversation_id).await?;
        self.add_to_index(&recipient.id, &conversation_id).await?;
        let recount = conversation.unread_for(&recipient.id) as u64;
        self.increment_unread(&recipient.id, &conversation_id, recount).await?;

        tracing::info!(
            "Message sent from {} to {} in conversation {}",
            sender.id,
            recipient.id,
            conversation_id
        );

        Ok(SentMessage {
            message,
            conversation_id,
        })
    }

    /// Full history with `other_user_id`. Reading marks the requester's messages as read.
    pub async fn get_conversation(
        &self,
        requester_id: &str,
        other_user_id: Option<String>,
        product_id: Option<String>,
    ) -> AppResult<ConversationView> {
        let other_user_id = non_empty(other_user_id)
            .ok_or_else(|| AppError::validation("Other user ID is required", "معرف المستخدم الآخر مطلوب"))?;

        let conversation_id = conversation_id(requester_id, &other_user_id);
        let conversation_key = keys::conversation(&conversation_id);
        let _conversation_guard = self.ctx.locks.lock(&conversation_key).await;

        let Some(mut conversation) = get_json::<Conversation>(self.ctx.store.as_ref(), &conversation_key).await? else {
            return Ok(ConversationView {
                conversation: Conversation::shell(conversation_id, non_empty(product_id)),
                exists: false,
            });
        };

        if conversation.mark_read_for(requester_id) > 0 {
            set_json(self.ctx.store.as_ref(), &conversation_key, &conversation).await?;
        }
        self.reset_unread(requester_id, &conversation_id).await?;

        tracing::debug!("Conversation {} fetched by user {}", conversation_id, requester_id);

        Ok(ConversationView {
            conversation,
            exists: true,
        })
    }

    /// Inbox, newest activity first. Unread counts come from the message lists.
    pub async fn get_conversations(&self, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
        let conversations = self.load_conversations(user_id).await?;

        let mut summaries: Vec<ConversationSummary> = conversations
            .into_iter()
            .map(|conversation| ConversationSummary::for_user(conversation, user_id))
            .collect();
        sort_by_recency(&mut summaries);

        tracing::debug!("Fetched {} conversations for user {}", summaries.len(), user_id);

        Ok(summaries)
    }

    /// Returns how many messages were flipped to read.
    pub async fn mark_conversation_as_read(&self, user_id: &str, conversation_id: Option<String>) -> AppResult<usize> {
        let conversation_id = non_empty(conversation_id)
            .ok_or_else(|| AppError::validation("Conversation ID is required", "معرف المحادثة مطلوب"))?;

        let conversation_key = keys::conversation(&conversation_id);
        let _conversation_guard = self.ctx.locks.lock(&conversation_key).await;

        let mut conversation = get_json::<Conversation>(self.ctx.store.as_ref(), &conversation_key)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation not found", "المحادثة غير موجودة"))?;

        if !conversation.is_participant(user_id) {
            return Err(AppError::forbidden(
                "You are not a participant in this conversation",
                "لست مشاركاً في هذه المحادثة",
            ));
        }

        let marked = conversation.mark_read_for(user_id);
        if marked > 0 {
            set_json(self.ctx.store.as_ref(), &conversation_key, &conversation).await?;
        }
        self.reset_unread(user_id, &conversation_id).await?;

        tracing::info!("Marked {} messages as read in conversation {}", marked, conversation_id);

        Ok(marked)
    }

    /// Recounts unread messages across the inbox and repairs any stored
    /// counter that disagrees with the recount.
    pub async fn get_unread_count(&self, user_id: &str) -> AppResult<UnreadSummary> {
        let conversations = self.load_conversations(user_id).await?;
        let mut summary = UnreadSummary::default();

        for conversation in &conversations {
            let unread = conversation.unread_for(user_id);
            if unread > 0 {
                summary.unread_count += unread;
                summary.by_conversation.insert(conversation.id.clone(), unread);
            }

            let stored = self.stored_unread(user_id, &conversation.id).await?;
            if !counter_matches(stored.as_ref(), unread as u64) {
                self.reconcile_unread(user_id, &conversation.id).await?;
            }
        }

        Ok(summary)
    }

    /// Hides the conversation from `user_id`'s inbox. The record and the other
    /// participant's index stay as they are.
    pub async fn delete_conversation(&self, user_id: &str, conversation_id: Option<String>) -> AppResult<bool> {
        let conversation_id = non_empty(conversation_id)
            .ok_or_else(|| AppError::validation("Conversation ID is required", "معرف المحادثة مطلوب"))?;

        let index_key = keys::user_conversations(user_id);
        let _index_guard = self.ctx.locks.lock(&index_key).await;

        let Some(mut ids) = get_json::<Vec<String>>(self.ctx.store.as_ref(), &index_key).await? else {
            return Ok(false);
        };

        let before = ids.len();
        ids.retain(|id| *id != conversation_id);
        let removed = ids.len() != before;

        if removed {
            set_json(self.ctx.store.as_ref(), &index_key, &ids).await?;
        }

        tracing::info!("Conversation {} removed from user {}'s list", conversation_id, user_id);

        Ok(removed)
    }

    pub async fn search_conversations(&self, user_id: &str, query: Option<String>) -> AppResult<Vec<ConversationSummary>> {
        let needle = non_empty(query)
            .map(|q| q.to_lowercase())
            .ok_or_else(|| AppError::validation("Search query is required", "نص البحث مطلوب"))?;

        let conversations = self.load_conversations(user_id).await?;

        let mut matching: Vec<ConversationSummary> = conversations
            .into_iter()
            .filter(|conversation| conversation.matches(user_id, &needle))
            .map(|conversation| ConversationSummary::for_user(conversation, user_id))
            .collect();
        sort_by_recency(&mut matching);

        Ok(matching)
    }

    /// Resolve the user's index. Ids whose record is gone are skipped.
    async fn load_conversations(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        let store = self.ctx.store.as_ref();
        let ids: Vec<String> = get_json(store, &keys::user_conversations(user_id))
            .await?
            .unwrap_or_default();

        let records = try_join_all(ids.iter().map(|id| async move {
            let key = keys::conversation(id);
            get_json::<Conversation>(store, &key).await
        }))
        .await?;

        Ok(ids
            .iter()
            .zip(records)
            .filter_map(|(id, record)| {
                if record.is_none() {
                    tracing::warn!("Dangling conversation {} in index of user {}", id, user_id);
                }
                record
            })
            .collect())
    }

    async fn add_to_index(&self, user_id: &str, conversation_id: &str) -> AppResult<()> {
        let index_key = keys::user_conversations(user_id);
        let _index_guard = self.ctx.locks.lock(&index_key).await;

        let mut ids: Vec<String> = get_json(self.ctx.store.as_ref(), &index_key)
            .await?
            .unwrap_or_default();

        if !ids.iter().any(|id| id == conversation_id) {
            ids.push(conversation_id.to_string());
            set_json(self.ctx.store.as_ref(), &index_key, &ids).await?;
        }

        Ok(())
    }

    /// Raw counter value. Anything that is not a non-negative integer counts as drift.
    async fn stored_unread(&self, user_id: &str, conversation_id: &str) -> AppResult<Option<Value>> {
        Ok(self.ctx.store.get(&keys::user_unread(user_id, conversation_id)).await?)
    }

    /// `recount` replaces a counter that no longer decodes.
    async fn increment_unread(&self, user_id: &str, conversation_id: &str, recount: u64) -> AppResult<()> {
        let counter_key = keys::user_unread(user_id, conversation_id);
        let _counter_guard = self.ctx.locks.lock(&counter_key).await;

        let next = match self.stored_unread(user_id, conversation_id).await? {
            None => 1,
            Some(value) => match value.as_u64() {
                Some(current) => current.saturating_add(1),
                None => {
                    tracing::warn!(
                        "Unreadable unread counter for user {} in {}: {}, restarting at {}",
                        user_id,
                        conversation_id,
                        value,
                        recount
                    );
                    recount
                }
            },
        };
        set_json(self.ctx.store.as_ref(), &counter_key, &next).await?;

        Ok(())
    }

    async fn reset_unread(&self, user_id: &str, conversation_id: &str) -> AppResult<()> {
        let counter_key = keys::user_unread(user_id, conversation_id);
        let _counter_guard = self.ctx.locks.lock(&counter_key).await;

        let stored = self.stored_unread(user_id, conversation_id).await?;
        if stored.as_ref().and_then(Value::as_u64) != Some(0) {
            set_json(self.ctx.store.as_ref(), &counter_key, &0u64).await?;
        }

        Ok(())
    }

    /// Rewrite the counter from a fresh read of the conversation, holding the
    /// conversation lock so no send can land between the recount and the write.
    async fn reconcile_unread(&self, user_id: &str, conversation_id: &str) -> AppResult<()> {
        let conversation_key = keys::conversation(conversation_id);
        let _conversation_guard = self.ctx.locks.lock(&conversation_key).await;

        let Some(conversation) = get_json::<Conversation>(self.ctx.store.as_ref(), &conversation_key).await? else {
            return Ok(());
        };
        let actual = conversation.unread_for(user_id) as u64;

        let counter_key = keys::user_unread(user_id, conversation_id);
        let _counter_guard = self.ctx.locks.lock(&counter_key).await;

        let stored = self.stored_unread(user_id, conversation_id).await?;
        if stored.as_ref().and_then(Value::as_u64) != Some(actual) {
            tracing::warn!(
                "Repaired unread counter for user {} in {}: {:?} -> {}",
                user_id,
                conversation_id,
                stored,
                actual
            );
            set_json(self.ctx.store.as_ref(), &counter_key, &actual).await?;
        }

        Ok(())
    }
}

/// A missing counter stands for zero.
fn counter_matches(stored: Option<&Value>, expected: u64) -> bool {
    match stored {
        None => expected == 0,
        Some(value) => value.as_u64() == Some(expected),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Most recent activity first; conversations without a timestamp sort as epoch 0.
fn sort_by_recency(summaries: &mut [ConversationSummary]) {
    summaries.sort_by_key(|s| {
        Reverse(
            s.conversation
                .last_message_at
                .map(|at| at.timestamp_millis())
                .unwrap_or(0),
        )
    });
}
