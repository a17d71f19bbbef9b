//! Session pool
//!
//! The unit external callers actually invoke: keyed by conversation
//! identity, it constructs an orchestrator on first request
//! (single-flight under concurrent first requests), refreshes access
//! stamps on reuse, evicts idle sessions with a periodic sweep, and tears
//! sessions down explicitly when a conversation's configuration changes.
//!
//! All dependencies are injected; the pool owns no process-wide state.

use converse_core::{Collaborators, ConversationId, EngineConfig, ModelId, PoolConfig};
use converse_engine::Orchestrator;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Sessions currently registered
    pub live_sessions: usize,
    /// Orchestrators constructed over the pool's lifetime
    pub constructed: u64,
    /// Sessions evicted by the idle sweep
    pub evicted: u64,
    /// Sessions torn down by explicit invalidation
    pub invalidated: u64,
}

/// One pooled session: the orchestrator plus access metadata
struct Session {
    orchestrator: Arc<Orchestrator>,
    last_access: Mutex<Instant>,
}

impl Session {
    fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }
}

/// Pool of per-conversation orchestrators
pub struct SessionPool {
    inner: Arc<PoolInner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

struct PoolInner {
    sessions: DashMap<ConversationId, Session>,
    /// Per-key construction locks; an entry exists only while a
    /// construction is in flight
    building: DashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>,
    collaborators: Collaborators,
    engine_config: EngineConfig,
    config: PoolConfig,
    constructed: AtomicU64,
    evicted: AtomicU64,
    invalidated: AtomicU64,
}

impl SessionPool {
    /// Create a pool over the injected collaborators and configuration.
    /// The eviction sweep does not run until `start` is called.
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        engine_config: EngineConfig,
        config: PoolConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                sessions: DashMap::new(),
                building: DashMap::new(),
                collaborators,
                engine_config,
                config,
                constructed: AtomicU64::new(0),
                evicted: AtomicU64::new(0),
                invalidated: AtomicU64::new(0),
            }),
            sweeper: Mutex::new(None),
        }
    }

    /// Start the periodic idle-eviction sweep. Idempotent.
    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }
        let inner = self.inner.clone();
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = interval(inner.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick of an interval completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                inner.sweep_expired().await;
            }
        }));
    }

    /// Get the live orchestrator for a conversation, constructing it on
    /// first request.
    ///
    /// Concurrent first requests for the same conversation are
    /// single-flighted: exactly one construction runs and every caller
    /// receives the same instance. Reuse refreshes the access stamp.
    pub async fn get_or_create(
        &self,
        conversation: &ConversationId,
        model: &ModelId,
    ) -> Arc<Orchestrator> {
        if let Some(orchestrator) = self.inner.live(conversation) {
            return orchestrator;
        }

        let gate = self
            .inner
            .building
            .entry(conversation.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .value()
            .clone();
        let _guard = gate.lock().await;

        // the construction we were waiting on may have registered it
        if let Some(orchestrator) = self.inner.live(conversation) {
            return orchestrator;
        }

        let orchestrator = Arc::new(
            Orchestrator::spawn(
                conversation.clone(),
                model.clone(),
                self.inner.collaborators.clone(),
                self.inner.engine_config,
            )
            .await,
        );
        self.inner
            .sessions
            .insert(conversation.clone(), Session::new(orchestrator.clone()));
        self.inner.constructed.fetch_add(1, Ordering::SeqCst);
        self.inner.building.remove(conversation);
        tracing::info!(conversation = %conversation, "session constructed");
        orchestrator
    }

    /// Stop and remove a conversation's session so the next request
    /// constructs a fresh one (e.g. its data-source list changed).
    ///
    /// Returns whether a session existed.
    pub async fn invalidate(&self, conversation: &ConversationId) -> bool {
        match self.inner.sessions.remove(conversation) {
            Some((_, session)) => {
                self.inner.invalidated.fetch_add(1, Ordering::SeqCst);
                tracing::info!(conversation = %conversation, "session invalidated");
                session.orchestrator.stop().await;
                true
            }
            None => false,
        }
    }

    /// Run one eviction pass immediately, independent of the sweeper.
    pub async fn sweep_expired(&self) {
        self.inner.sweep_expired().await;
    }

    /// Stop the sweeper and every live session.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
        let conversations: Vec<ConversationId> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for conversation in conversations {
            if let Some((_, session)) = self.inner.sessions.remove(&conversation) {
                session.orchestrator.stop().await;
            }
        }
        tracing::info!("session pool shut down");
    }

    /// Number of live sessions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Whether the pool has no live sessions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Current pool statistics
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live_sessions: self.inner.sessions.len(),
            constructed: self.inner.constructed.load(Ordering::SeqCst),
            evicted: self.inner.evicted.load(Ordering::SeqCst),
            invalidated: self.inner.invalidated.load(Ordering::SeqCst),
        }
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    /// Return a conversation's live session, refreshing its access stamp.
    /// A session stopped behind the pool's back is dropped.
    fn live(&self, conversation: &ConversationId) -> Option<Arc<Orchestrator>> {
        let session = self.sessions.get(conversation)?;
        if session.orchestrator.is_stopped() {
            drop(session);
            self.sessions.remove(conversation);
            return None;
        }
        session.touch();
        Some(session.orchestrator.clone())
    }

    /// Evict every session idle past the inactivity window.
    async fn sweep_expired(&self) {
        let idle_timeout = self.config.idle_timeout;
        let candidates: Vec<ConversationId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() >= idle_timeout)
            .map(|entry| entry.key().clone())
            .collect();

        for conversation in candidates {
            // re-checked under removal so a just-touched session survives
            let removed = self
                .sessions
                .remove_if(&conversation, |_, session| {
                    session.idle_for() >= idle_timeout
                });
            if let Some((_, session)) = removed {
                self.evicted.fetch_add(1, Ordering::SeqCst);
                tracing::info!(conversation = %conversation, "evicting idle session");
                session.orchestrator.stop().await;
            }
        }
    }
}
