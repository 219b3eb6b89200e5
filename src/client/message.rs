use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

/// One entry of the in-memory conversation. Text is append-only while its
/// stream runs and immutable once frozen.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    frozen: bool,
}

impl ChatMessage {
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Ordered message list with monotonic ids. Messages are never deleted
/// within a session.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
        }
    }

    /// User input is complete on arrival, so it is born frozen.
    pub fn push_user(&mut self, text: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            text: text.into(),
            sender: Sender::User,
            frozen: true,
        });
        id
    }

    /// Open the growing bot message for a new streaming session.
    pub fn begin_bot(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            text: String::new(),
            sender: Sender::Bot,
            frozen: false,
        });
        id
    }

    /// Append a decoded fragment in arrival order. Frozen messages reject
    /// appends; there is no reordering and no rollback.
    pub fn append(&mut self, id: u64, fragment: &str) -> Result<(), ChatError> {
        let message = self
            .get_mut(id)
            .ok_or_else(|| ChatError::Internal(format!("no message with id {}", id)))?;

        if message.frozen {
            return Err(ChatError::Internal(format!(
                "append to frozen message {}",
                id
            )));
        }

        message.text.push_str(fragment);
        Ok(())
    }

    /// End the streaming session; the record takes no further appends.
    pub fn freeze(&mut self, id: u64) -> Result<&ChatMessage, ChatError> {
        let pos = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| ChatError::Internal(format!("no message with id {}", id)))?;

        self.messages[pos].frozen = true;
        Ok(&self.messages[pos])
    }

    pub fn get(&self, id: u64) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}
