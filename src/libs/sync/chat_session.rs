use crate::libs::api::api_traits::ChatApi;
use crate::libs::core::models::Message;
use crate::libs::realtime::channel::{LiveFeeds, RealtimeSink};
use crate::libs::sync::chat_sync::ChatSync;
use crate::libs::sync::SyncError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The open chat screen for one conversation: the draft being typed and the task that
/// feeds socket events into the store. Closing or dropping it closes the socket.
pub struct ChatSession<A: ChatApi + 'static, R: RealtimeSink + 'static> {
    conversation_id: String,
    sync: Arc<ChatSync<A, R>>,
    draft: Mutex<String>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<A: ChatApi + 'static, R: RealtimeSink + 'static> ChatSession<A, R> {
    pub fn new(sync: Arc<ChatSync<A, R>>, conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            sync,
            draft: Mutex::new(String::new()),
            pump: Mutex::new(None),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn sync(&self) -> &Arc<ChatSync<A, R>> {
        &self.sync
    }

    pub fn draft(&self) -> String {
        lock(&self.draft).clone()
    }

    pub fn on_text_changed(&self, text: &str) -> Result<(), SyncError> {
        *lock(&self.draft) = text.to_string();
        self.sync.on_text_changed(&self.conversation_id, text)
    }

    /// Sends the trimmed draft and clears it, then tells the peer typing stopped.
    /// A blank draft does nothing.
    pub async fn send_draft(&self) -> Result<Option<Message>, SyncError> {
        let text = {
            let mut draft = lock(&self.draft);
            let text = draft.trim().to_string();
            if text.is_empty() {
                return Ok(None);
            }
            draft.clear();
            text
        };

        let sent = self.sync.send(&self.conversation_id, &text).await;
        if let Err(err) = self.sync.on_text_changed(&self.conversation_id, "") {
            warn!(conversation_id = %self.conversation_id, %err, "Could not clear typing indicator");
        }
        sent
    }

    /// Starts feeding live events into the store. Replaces any earlier pump.
    pub fn start_live(&self, feeds: LiveFeeds) {
        let handle = tokio::spawn(pump(self.sync.clone(), self.conversation_id.clone(), feeds));
        if let Some(previous) = lock(&self.pump).replace(handle) {
            previous.abort();
        }
    }

    pub fn close(&self) {
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
        self.sync.realtime().disconnect();
    }
}

impl<A: ChatApi + 'static, R: RealtimeSink + 'static> Drop for ChatSession<A, R> {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn pump<A: ChatApi, R: RealtimeSink>(sync: Arc<ChatSync<A, R>>, conversation_id: String, mut feeds: LiveFeeds) {
    loop {
        tokio::select! {
            message = feeds.messages.recv() => match message {
                Ok(remote) => {
                    if let Err(err) = sync.receive_live(remote, Some(&conversation_id)) {
                        warn!(%conversation_id, %err, "Could not store live message");
                    }
                }
                // Dropped messages may belong to any conversation: re-pull this one's
                // history and the list that carries everyone else's previews and unread counts.
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%conversation_id, skipped, "Live messages dropped, catching up");
                    if let Err(err) = sync.refresh_history(&conversation_id).await {
                        warn!(%conversation_id, %err, "Catch-up refresh failed");
                    }
                    if let Err(err) = sync.refresh_conversations().await {
                        warn!(%err, "Catch-up conversation refresh failed");
                    }
                }
                Err(RecvError::Closed) => break,
            },
            status = feeds.statuses.recv() => match status {
                Ok(status) => sync.apply_presence(status),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            typing = feeds.typing.recv() => match typing {
                Ok(typing) if typing.conversation_id == conversation_id => sync.apply_typing(typing),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!(%conversation_id, "Live event pump stopped");
}
