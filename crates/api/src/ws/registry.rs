use dashmap::DashMap;

/// Registry of sessions currently attached to a live connection, keyed by
/// session id. Owned by the transport layer and injected — sessions
/// themselves live with their connection task; the registry only tracks
/// which ids are active (status display, duplicate-init checks, shutdown
/// accounting).
pub struct SessionRegistry {
    active: DashMap<String, ActiveSession>,
}

#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub user_id: String,
    pub kind: &'static str,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    pub fn add(&self, session_id: String, user_id: String, kind: &'static str) {
        self.active
            .insert(session_id, ActiveSession { user_id, kind });
    }

    pub fn remove(&self, session_id: &str) {
        self.active.remove(session_id);
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_active_sessions() {
        let registry = SessionRegistry::new();
        registry.add("s1".to_string(), "u1".to_string(), "technical");
        assert!(registry.contains("s1"));
        assert_eq!(registry.active_count(), 1);

        registry.remove("s1");
        assert!(!registry.contains("s1"));
        assert_eq!(registry.active_count(), 0);
    }
}
