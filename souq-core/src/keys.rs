//! Store key layout.

pub const USER_PREFIX: &str = "user:";

pub fn user(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn conversation(conversation_id: &str) -> String {
    format!("conversation:{}", conversation_id)
}

pub fn user_conversations(user_id: &str) -> String {
    format!("user:{}:conversations", user_id)
}

pub fn user_unread(user_id: &str, conversation_id: &str) -> String {
    format!("user:{}:unread:{}", user_id, conversation_id)
}

pub fn user_notifications(user_id: &str) -> String {
    format!("user:{}:notifications", user_id)
}

pub fn user_notification_preferences(user_id: &str) -> String {
    format!("user:{}:notification_preferences", user_id)
}

pub fn email_index(email: &str) -> String {
    format!("index:email:{}", email.trim().to_lowercase())
}

pub fn phone_index(normalized_phone: &str) -> String {
    format!("index:phone:{}", normalized_phone)
}

pub fn national_id_index(national_id: &str) -> String {
    format!("index:national_id:{}", national_id.trim())
}

/// Lock name guarding the registration uniqueness indexes.
pub const REGISTRATION_LOCK: &str = "lock:registration";
