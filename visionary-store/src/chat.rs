//! Chat desk: the visitor widget and the admin console over one session row
//!
//! Writes inside this process are serialized: each one re-reads the latest
//! row, applies its change and writes the row back. Other processes writing
//! the same row are still last-write-wins.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};
use visionary_common::chat::{self, Party, VisitorId};
use visionary_common::events::{EventBus, StoreEvent};
use visionary_common::schema::{SessionPatch, CHAT_UPLOADS_BUCKET};
use visionary_common::{time, ChatMessage, ChatSession, Error, MessageKind, Result, Sender};

use crate::backend::Backend;

pub struct ChatDesk {
    backend: Arc<dyn Backend>,
    bus: EventBus,
    welcome: String,
    write_lock: Mutex<()>,
}

impl ChatDesk {
    pub fn new(backend: Arc<dyn Backend>, bus: EventBus, welcome: impl Into<String>) -> Self {
        Self {
            backend,
            bus,
            welcome: welcome.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Load the visitor's session, creating it on first contact
    ///
    /// `open` means the widget is showing the conversation, which clears the
    /// customer's unread counter.
    pub async fn open_session(&self, visitor: &VisitorId, open: bool) -> Result<ChatSession> {
        let _guard = self.write_lock.lock().await;

        let mut session = match self.backend.fetch_session(visitor.as_str()).await? {
            Some(session) => session,
            None => self.create(visitor).await?,
        };

        if open && chat::mark_read(&mut session, Party::Customer) {
            self.write(&session, SessionPatch::counters(&session)).await?;
        }
        Ok(session)
    }

    pub async fn session(&self, session_id: &str) -> Result<ChatSession> {
        self.backend
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Chat session {}", session_id)))
    }

    /// Append one message to the visitor's session
    pub async fn send(
        &self,
        visitor: &VisitorId,
        sender: Sender,
        kind: MessageKind,
        content: &str,
    ) -> Result<ChatSession> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("Message is empty".to_string()));
        }

        let _guard = self.write_lock.lock().await;

        let mut session = match self.backend.fetch_session(visitor.as_str()).await? {
            Some(session) => session,
            None => self.create(visitor).await?,
        };

        let now = time::now_millis();
        chat::append(&mut session, ChatMessage::new(sender, kind, content, now), now);
        self.write(&session, SessionPatch::full(&session)).await?;

        debug!(
            session_id = %session.session_id,
            sender = ?sender,
            unread_admin = session.unread_admin_count,
            unread_user = session.unread_user_count,
            "Message appended"
        );
        Ok(session)
    }

    /// Admin reply; the session must already exist
    pub async fn reply(&self, session_id: &str, content: &str) -> Result<ChatSession> {
        let visitor: VisitorId = session_id.parse()?;
        self.session(session_id).await?;
        self.send(&visitor, Sender::Admin, MessageKind::Text, content).await
    }

    /// Reset `party`'s unread counter
    pub async fn mark_read(&self, session_id: &str, party: Party) -> Result<ChatSession> {
        let _guard = self.write_lock.lock().await;

        let mut session = self.session(session_id).await?;
        if chat::mark_read(&mut session, party) {
            self.write(&session, SessionPatch::counters(&session)).await?;
        }
        Ok(session)
    }

    /// All sessions, most recently active first
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let mut sessions = self.backend.fetch_sessions().await?;
        chat::sort_by_activity(&mut sessions);
        Ok(sessions)
    }

    /// Admin opens a conversation in the console
    pub async fn select_session(&self, session_id: &str) -> Result<ChatSession> {
        self.mark_read(session_id, Party::Admin).await
    }

    /// Upload an image or video and send its public URL as a message
    ///
    /// Nothing is appended when the upload fails.
    pub async fn upload_attachment(
        &self,
        visitor: &VisitorId,
        sender: Sender,
        filename: Option<&str>,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ChatSession> {
        let kind = MessageKind::for_mime(content_type).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Only images and videos can be sent (got {})",
                content_type
            ))
        })?;
        if bytes.is_empty() {
            return Err(Error::InvalidInput("Attachment is empty".to_string()));
        }

        let object = chat::attachment_object_name(visitor, filename, content_type, time::now_millis());
        let size = bytes.len();
        let url = self
            .backend
            .upload_object(CHAT_UPLOADS_BUCKET, &object, content_type, bytes)
            .await?;

        info!(session_id = %visitor, object = %object, bytes = size, "Attachment uploaded");
        self.send(visitor, sender, kind, &url).await
    }

    async fn create(&self, visitor: &VisitorId) -> Result<ChatSession> {
        let session = chat::new_session(visitor, &self.welcome, time::now_millis());
        self.backend.insert_session(&session).await?;
        info!(session_id = %session.session_id, "New chat session");
        self.bus
            .emit_lossy(StoreEvent::chat_session_changed(&session.session_id));
        Ok(session)
    }

    async fn write(&self, session: &ChatSession, patch: SessionPatch) -> Result<()> {
        self.backend.update_session(&session.session_id, &patch).await?;
        self.bus
            .emit_lossy(StoreEvent::chat_session_changed(&session.session_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use visionary_common::chat::DEFAULT_WELCOME;

    fn desk() -> (Arc<MemoryBackend>, EventBus, ChatDesk) {
        let backend = Arc::new(MemoryBackend::new());
        let bus = EventBus::new(32);
        let desk = ChatDesk::new(backend.clone(), bus.clone(), DEFAULT_WELCOME);
        (backend, bus, desk)
    }

    fn visitor() -> VisitorId {
        "user_abc123xyz".parse().unwrap()
    }

    #[tokio::test]
    async fn test_first_contact_creates_session() {
        let (backend, _, desk) = desk();
        let session = desk.open_session(&visitor(), false).await.unwrap();

        assert_eq!(session.session_id, "user_abc123xyz");
        assert_eq!(session.user_name, "Visitor 3xyz");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.unread_user_count, 1);
        assert!(backend.fetch_session("user_abc123xyz").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_opening_widget_clears_customer_counter() {
        let (backend, _, desk) = desk();
        desk.open_session(&visitor(), false).await.unwrap();
        let session = desk.open_session(&visitor(), true).await.unwrap();
        assert_eq!(session.unread_user_count, 0);

        let stored = backend.fetch_session("user_abc123xyz").await.unwrap().unwrap();
        assert_eq!(stored.unread_user_count, 0);
    }

    #[tokio::test]
    async fn test_send_bumps_opposite_counter_only() {
        let (_, _, desk) = desk();
        let v = visitor();
        desk.open_session(&v, true).await.unwrap();

        let s = desk.send(&v, Sender::Customer, MessageKind::Text, "hello").await.unwrap();
        assert_eq!((s.unread_admin_count, s.unread_user_count), (1, 0));

        let s = desk.send(&v, Sender::Customer, MessageKind::Text, "anyone?").await.unwrap();
        assert_eq!((s.unread_admin_count, s.unread_user_count), (2, 0));

        let s = desk.reply("user_abc123xyz", "hi!").await.unwrap();
        assert_eq!((s.unread_admin_count, s.unread_user_count), (2, 1));
        assert_eq!(s.messages.len(), 4);
        assert_eq!(s.messages[3].sender, Sender::Admin);
    }

    #[tokio::test]
    async fn test_select_session_clears_admin_counter() {
        let (_, _, desk) = desk();
        let v = visitor();
        desk.send(&v, Sender::Customer, MessageKind::Text, "question").await.unwrap();

        let s = desk.select_session(v.as_str()).await.unwrap();
        assert_eq!(s.unread_admin_count, 0);
        // Welcome message still unread by the customer
        assert_eq!(s.unread_user_count, 1);
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let (_, _, desk) = desk();
        assert!(matches!(
            desk.send(&visitor(), Sender::Customer, MessageKind::Text, "  ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_to_unknown_session() {
        let (_, _, desk) = desk();
        assert!(matches!(
            desk.reply("user_nobody", "hi").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_sends_are_not_lost() {
        let (_, _, desk) = desk();
        let desk = Arc::new(desk);
        let v = visitor();
        desk.open_session(&v, true).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let desk = desk.clone();
            let v = v.clone();
            handles.push(tokio::spawn(async move {
                desk.send(&v, Sender::Customer, MessageKind::Text, &format!("m{}", i))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let s = desk.session(v.as_str()).await.unwrap();
        assert_eq!(s.messages.len(), 11);
        assert_eq!(s.unread_admin_count, 10);
    }

    #[tokio::test]
    async fn test_attachment_upload_sends_url() {
        let (backend, _, desk) = desk();
        let v = visitor();
        let s = desk
            .upload_attachment(&v, Sender::Customer, Some("clip.MP4"), "video/mp4", vec![0; 8])
            .await
            .unwrap();

        let last = s.messages.last().unwrap();
        assert_eq!(last.kind, MessageKind::Video);
        assert!(last.content.starts_with("memory://chat-uploads/user_abc123xyz_"));
        assert!(last.content.ends_with(".mp4"));

        let object = last.content.trim_start_matches("memory://chat-uploads/");
        assert!(backend.object(CHAT_UPLOADS_BUCKET, object).await.is_some());
    }

    #[tokio::test]
    async fn test_attachment_rejects_other_types() {
        let (_, _, desk) = desk();
        let result = desk
            .upload_attachment(&visitor(), Sender::Customer, Some("a.pdf"), "application/pdf", vec![1])
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_failed_upload_writes_nothing() {
        let (backend, _, desk) = desk();
        let v = visitor();
        desk.open_session(&v, false).await.unwrap();
        backend.set_unreachable(true);

        assert!(desk
            .upload_attachment(&v, Sender::Customer, None, "image/png", vec![1])
            .await
            .is_err());

        backend.set_unreachable(false);
        let s = desk.session(v.as_str()).await.unwrap();
        assert_eq!(s.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_writes_emit_session_events() {
        let (_, bus, desk) = desk();
        let mut rx = bus.subscribe();
        let v = visitor();
        desk.send(&v, Sender::Customer, MessageKind::Text, "hey").await.unwrap();

        // create + append
        for _ in 0..2 {
            let event = rx.recv().await.unwrap();
            assert!(event.is_chat_for("user_abc123xyz"));
        }
    }
}
