//! Append-only chat history.

use shared::domain::{ChatMessage, MessageId, MessageStatus};

#[derive(Debug, Default)]
pub struct ChatTranscript {
    entries: Vec<(MessageId, ChatMessage)>,
    next_id: u64,
}

impl ChatTranscript {
    pub fn push(&mut self, message: ChatMessage) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, message));
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, message)| message)
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().map(|(_, message)| message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends streamed text to a pending placeholder. Resolved entries are left untouched.
    pub fn append_text(&mut self, id: MessageId, text: &str) -> Option<&ChatMessage> {
        let message = self.pending_mut(id)?;
        message.text.push_str(text);
        Some(message)
    }

    pub fn set_sources(&mut self, id: MessageId, sources: Vec<String>) -> Option<&ChatMessage> {
        let message = self.pending_mut(id)?;
        message.sources = sources;
        Some(message)
    }

    pub fn complete(
        &mut self,
        id: MessageId,
        text: String,
        sources: Vec<String>,
        model: Option<String>,
    ) -> Option<&ChatMessage> {
        let message = self.pending_mut(id)?;
        message.text = text;
        message.sources = sources;
        message.model = model;
        message.status = MessageStatus::Complete;
        Some(message)
    }

    /// Marks a streamed placeholder complete, keeping whatever text already arrived.
    pub fn finish(&mut self, id: MessageId) -> Option<&ChatMessage> {
        let message = self.pending_mut(id)?;
        message.status = MessageStatus::Complete;
        Some(message)
    }

    pub fn fail(&mut self, id: MessageId, marker: &str) -> Option<&ChatMessage> {
        let message = self.pending_mut(id)?;
        if message.text.is_empty() {
            message.text = marker.to_string();
        } else {
            message.text.push_str("\n\n");
            message.text.push_str(marker);
        }
        message.status = MessageStatus::Failed;
        Some(message)
    }

    fn pending_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.entries
            .iter_mut()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, message)| message)
            .filter(|message| message.is_pending())
    }
}
