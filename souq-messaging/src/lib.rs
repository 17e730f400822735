pub mod model;
pub mod service;


pub use model::{
    conversation_id, Conversation, ConversationSummary, ConversationView, Message, Participant,
    SendMessageInput, SentMessage, UnreadSummary,
};
pub use service::MessagingService;
