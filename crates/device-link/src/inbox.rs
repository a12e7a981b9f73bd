/// Single-slot holder for the latest operator command.
///
/// Each write overwrites the slot whether or not the previous command was
/// read; each stored command is handed out at most once.
#[derive(Debug, Clone, Default)]
pub struct CommandInbox {
    pending: Option<String>,
}

impl CommandInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `command`, returning `true` if an unread command was lost.
    pub fn set_command(&mut self, command: impl Into<String>) -> bool {
        self.pending.replace(command.into()).is_some()
    }

    /// Takes the stored command, leaving the slot empty.
    pub fn try_take_command(&mut self) -> Option<String> {
        self.pending.take()
    }

    pub fn has_command(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
