//! Call session registry
//!
//! Each live call is an `Arc<CallEntry>` holding its `CallSession` behind an
//! async mutex, so one caller's turns are serialized while different calls
//! proceed in parallel. Capacity is bounded by `max_sessions`; idle calls are
//! swept by a background task.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};

use intake_agent::{CallSession, IntakeAgent};

use crate::ServerError;

/// One registered call
pub struct CallEntry {
    pub id: String,
    pub call: Mutex<CallSession>,
    pub created_at: Instant,
    last_activity: RwLock<Instant>,
}

impl CallEntry {
    fn new(session: CallSession) -> Self {
        Self {
            id: session.call_id().to_string(),
            call: Mutex::new(session),
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }
}

/// Session manager
///
/// Expired calls are hung up through the agent, so a caller who walks away
/// mid-call gives their held slot back.
pub struct SessionManager {
    agent: Arc<IntakeAgent>,
    sessions: RwLock<HashMap<String, Arc<CallEntry>>>,
    max_sessions: usize,
    session_timeout: Duration,
    cleanup_interval: Duration,
}

impl SessionManager {
    pub fn new(agent: Arc<IntakeAgent>, max_sessions: usize) -> Self {
        Self::with_config(
            agent,
            max_sessions,
            Duration::from_secs(1800),
            Duration::from_secs(300),
        )
    }

    pub fn with_config(
        agent: Arc<IntakeAgent>,
        max_sessions: usize,
        session_timeout: Duration,
        cleanup_interval: Duration,
    ) -> Self {
        Self {
            agent,
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            session_timeout,
            cleanup_interval,
        }
    }

    /// Periodically end idle calls. Send `true` on the returned channel to stop.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let interval = manager.cleanup_interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let removed = manager.cleanup_expired().await;
                        if removed > 0 {
                            tracing::info!(removed, remaining = manager.count(), "Expired idle calls");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Register a freshly started call
    pub fn insert(&self, session: CallSession) -> Result<Arc<CallEntry>, ServerError> {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.max_sessions {
            return Err(ServerError::Capacity(self.max_sessions));
        }
        if sessions.contains_key(session.call_id()) {
            return Err(ServerError::InvalidRequest(format!(
                "call {} already exists",
                session.call_id()
            )));
        }

        let entry = Arc::new(CallEntry::new(session));
        sessions.insert(entry.id.clone(), entry.clone());
        metrics::gauge!("intake_active_calls").set(sessions.len() as f64);
        tracing::info!(call_id = %entry.id, "Registered call");
        Ok(entry)
    }

    /// Room for one more call, without reserving it
    pub fn has_capacity(&self) -> bool {
        self.sessions.read().len() < self.max_sessions
    }

    /// Like `has_capacity`, but a full registry first ends its idle calls
    pub async fn ensure_capacity(&self) -> Result<(), ServerError> {
        if !self.has_capacity() {
            self.cleanup_expired().await;
        }
        if self.has_capacity() {
            Ok(())
        } else {
            Err(ServerError::Capacity(self.max_sessions))
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<CallEntry>, ServerError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<CallEntry>> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(id);
        if removed.is_some() {
            metrics::gauge!("intake_active_calls").set(sessions.len() as f64);
            tracing::info!(call_id = %id, "Removed call");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Hang up and drop every idle call. Returns how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let expired = self.take_expired();
        for entry in &expired {
            let mut session = entry.call.lock().await;
            if let Err(e) = self.agent.hang_up(&mut session).await {
                tracing::warn!(call_id = %entry.id, error = %e, "Hang-up of expired call failed");
            }
        }
        expired.len()
    }

    fn take_expired(&self) -> Vec<Arc<CallEntry>> {
        let timeout = self.session_timeout;
        let mut sessions = self.sessions.write();
        let ids: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| entry.is_expired(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        let expired: Vec<Arc<CallEntry>> = ids
            .iter()
            .filter_map(|id| sessions.remove(id))
            .inspect(|entry| tracing::info!(call_id = %entry.id, "Expired call"))
            .collect();
        if !expired.is_empty() {
            metrics::gauge!("intake_active_calls").set(sessions.len() as f64);
        }
        expired
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use intake_config::IntakePolicy;
    use intake_core::IntakeStage;
    use intake_tools::{InMemoryCalendar, IntakeTools, StubInsuranceVerifier, TransferDesk};

    fn june_3() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn session(id: &str) -> CallSession {
        CallSession::new(id, june_3())
    }

    fn agent_with_calendar() -> (Arc<IntakeAgent>, Arc<InMemoryCalendar>) {
        let policy = Arc::new(IntakePolicy::default());
        let calendar = Arc::new(InMemoryCalendar::from_roster(&policy.scheduling.roster).unwrap());
        let tools = IntakeTools::new(
            calendar.clone(),
            Arc::new(StubInsuranceVerifier::new(policy.insurance.clone())),
            Arc::new(TransferDesk::new()),
        );
        (Arc::new(IntakeAgent::new(policy, tools)), calendar)
    }

    fn manager(max: usize) -> SessionManager {
        SessionManager::new(agent_with_calendar().0, max)
    }

    #[test]
    fn test_insert_get_remove() {
        let manager = manager(10);
        manager.insert(session("call-1")).unwrap();

        assert_eq!(manager.get("call-1").unwrap().id, "call-1");
        assert!(matches!(manager.get("nope"), Err(ServerError::NotFound(_))));

        assert!(manager.remove("call-1").is_some());
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_capacity_limit() {
        let manager = manager(2);
        manager.insert(session("a")).unwrap();
        manager.insert(session("b")).unwrap();

        assert!(!manager.has_capacity());
        assert!(matches!(manager.insert(session("c")), Err(ServerError::Capacity(2))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let manager = manager(5);
        manager.insert(session("a")).unwrap();
        assert!(matches!(
            manager.insert(session("a")),
            Err(ServerError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_calls_make_room() {
        let (agent, _) = agent_with_calendar();
        let manager = SessionManager::with_config(agent, 1, Duration::ZERO, Duration::from_secs(60));
        manager.insert(session("old")).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        manager.ensure_capacity().await.unwrap();
        manager.insert(session("new")).unwrap();
        assert_eq!(manager.list(), vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_expiry_releases_held_slot() {
        let (agent, calendar) = agent_with_calendar();
        let (mut call, _) = agent.start_call(Some("call-idle".to_string()), june_3());
        for line in [
            "Hi, I'm a new patient",
            "I've been feeling really anxious and I can't sleep",
            "about three weeks",
            "I live in Delhi",
            "next week",
            "yes",
        ] {
            agent.handle_utterance(&mut call, line).await.unwrap();
        }
        assert_eq!(call.stage(), IntakeStage::Insurance);
        assert!(calendar.held_by("call-idle").is_some());

        let manager =
            SessionManager::with_config(agent, 10, Duration::ZERO, Duration::from_secs(60));
        let entry = manager.insert(call).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(manager.cleanup_expired().await, 1);
        assert_eq!(manager.count(), 0);
        assert_eq!(calendar.hold_count(), 0);
        assert!(calendar.held_by("call-idle").is_none());
        assert!(entry.call.lock().await.is_closed());
    }
}
