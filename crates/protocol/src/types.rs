use serde::{Deserialize, Serialize};

/// Lifecycle of an upload session.
///
/// A session starts `receiving` on its first chunk, moves to `merging` once
/// every index is present, and ends `completed` after the final file exists.
/// A failed merge returns the session to `receiving`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Receiving,
    Merging,
    Completed,
}

impl SessionState {
    /// Returns `true` once the final file has been produced.
    pub fn is_completed(self) -> bool {
        matches!(self, SessionState::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_serialization() {
        let json = serde_json::to_string(&SessionState::Receiving).unwrap();
        assert_eq!(json, r#""receiving""#);
        let json = serde_json::to_string(&SessionState::Completed).unwrap();
        assert_eq!(json, r#""completed""#);

        let parsed: SessionState = serde_json::from_str(r#""merging""#).unwrap();
        assert_eq!(parsed, SessionState::Merging);
    }

    #[test]
    fn only_completed_is_completed() {
        assert!(SessionState::Completed.is_completed());
        assert!(!SessionState::Receiving.is_completed());
        assert!(!SessionState::Merging.is_completed());
    }
}
