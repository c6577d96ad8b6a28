use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::chunker::Chunk;
use super::library::LoadedSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Role {
    User,
    Chatbot,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub created_at: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Append-only, chronologically ordered chat history of one session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn with_greeting(greeting: &str) -> Self {
        Self {
            messages: vec![Message::new(Role::Chatbot, greeting)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record a finished turn. Both messages go in together so a turn is
    /// never half-recorded.
    pub fn push_turn(&mut self, prompt: &str, reply: &str) {
        self.messages.reserve(2);
        self.messages.push(Message::new(Role::User, prompt));
        self.messages.push(Message::new(Role::Chatbot, reply));
    }
}

/// Everything the widget keeps for one visitor.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub transcript: Transcript,
    pub location: String,
    pub chunks: Arc<[Chunk]>,
    pub credential: Option<String>,
    pub last_active: Instant,
}

impl Session {
    pub fn new(id: String, greeting: &str, schedule: LoadedSchedule) -> Self {
        Self {
            id,
            transcript: Transcript::with_greeting(greeting),
            location: schedule.location,
            chunks: schedule.chunks,
            credential: None,
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Replace the chunk list wholesale with the newly selected schedule.
    pub fn switch_schedule(&mut self, schedule: LoadedSchedule) {
        tracing::info!(
            "Session {} switched from '{}' to '{}' ({} chunks)",
            self.id,
            self.location,
            schedule.location,
            schedule.chunks.len()
        );
        self.location = schedule.location;
        self.chunks = schedule.chunks;
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory sessions keyed by identifier. Each session has its own lock,
/// the map lock is only held for lookup and insert.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session and mark it active.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        handle.lock().await.touch();
        Some(handle)
    }

    /// Insert a session. An existing session with the same id is kept and
    /// returned instead, so two racing first requests end up sharing one.
    pub async fn insert(&self, session: Session) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone()
    }

    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session idle for at least `ttl`. Sessions whose lock is
    /// held are mid-request and always survive.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.idle_for() < ttl,
            Err(_) => true,
        });
        before - sessions.len()
    }

    /// Run `evict_idle` every `every` for as long as the runtime lives.
    pub fn spawn_idle_sweeper(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(ttl).await;
                if evicted > 0 {
                    tracing::info!("Evicted {evicted} idle widget sessions");
                }
            }
        })
    }
}
