//! Per-session state: the topic gate and the stop-hook debouncer.
//!
//! Both live in the store's `session_state` table under core-owned keys.
//! Each hook owns its key namespace by convention, so no multi-key
//! transactions are needed.

pub mod instances;
pub mod recovery;

use crate::score::jaccard;
use crate::store::NoteStore;

/// Store key holding the JSON array of the last injected topic's terms.
pub const KEY_LAST_TOPIC_TERMS: &str = "last_topic_terms";

/// Store key recording the handoff path created for this session.
pub const KEY_HANDOFF_CREATED: &str = "handoff_created";

/// Jaccard similarity at or below which the topic counts as changed.
pub const TOPIC_SIMILARITY_THRESHOLD: f64 = 0.35;

/// Stop-hook cooldown window in seconds.
pub const STOP_COOLDOWN_SECS: i64 = 300;

/// Decides whether the prompt moved to a new topic.
///
/// Changed when there is no session id, no stored terms, the stored JSON
/// is corrupt, or the Jaccard similarity against the stored terms is at or
/// below the threshold.
pub fn is_topic_change(
    store: &dyn NoteStore,
    session_id: Option<&str>,
    current_terms: &[String],
) -> bool {
    let Some(session_id) = session_id.filter(|s| !s.is_empty()) else {
        return true;
    };
    let stored = match store.session_state_get(session_id, KEY_LAST_TOPIC_TERMS) {
        Ok(Some(json)) => json,
        _ => return true,
    };
    let Ok(stored_terms) = serde_json::from_str::<Vec<String>>(&stored) else {
        return true;
    };
    jaccard(current_terms, &stored_terms) <= TOPIC_SIMILARITY_THRESHOLD
}

/// Persists the current topic terms after an injection.
///
/// # Errors
///
/// Returns an error if the store write fails.
pub fn persist_topic_terms(
    store: &mut dyn NoteStore,
    session_id: &str,
    terms: &[String],
) -> crate::Result<()> {
    let json = serde_json::to_string(terms)
        .map_err(|e| crate::error::StoreError::Serialization(e.to_string()))?;
    store.session_state_set(session_id, KEY_LAST_TOPIC_TERMS, &json)
}

/// Stop-hook debouncer.
///
/// Returns true (skip) when the hook's cooldown timestamp is within the
/// window; otherwise records `now` and returns false. Keeps one session's
/// many Stop events from regenerating artifacts every turn.
pub fn stop_hook_debounce(
    store: &mut dyn NoteStore,
    session_id: &str,
    hook_name: &str,
    now_unix: i64,
) -> bool {
    let key = format!("stop_cooldown_{hook_name}");
    let recent = store
        .session_state_get(session_id, &key)
        .ok()
        .flatten()
        .and_then(|v| v.parse::<i64>().ok())
        .is_some_and(|last| now_unix - last < STOP_COOLDOWN_SECS);
    if recent {
        return true;
    }
    let _ = store.session_state_set(session_id, &key, &now_unix.to_string());
    false
}
