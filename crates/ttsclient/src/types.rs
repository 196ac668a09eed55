use serde::{Deserialize, Serialize};

/// Payload for creating or updating a clip.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClipSpec {
    pub name: String,
    /// Text to synthesize, including any inline markup the voice understands.
    pub body: String,
    /// Voice identifier on the remote service.
    pub voice: String,
}

/// Status of a clip as reported by the service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClipState {
    pub id: String,
    /// True once the audio has been rendered and `link` is valid.
    pub finished: bool,
    /// Download URL, present when `finished`.
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_state_pending_has_no_link() {
        let raw = r#"{"id":"c-1","finished":false,"link":null}"#;
        let state: ClipState = serde_json::from_str(raw).unwrap();
        assert!(!state.finished);
        assert!(state.link.is_none());
    }

    #[test]
    fn clip_state_finished_carries_link() {
        let raw = r#"{"id":"c-1","finished":true,"link":"https://cdn.example/c-1.wav"}"#;
        let state: ClipState = serde_json::from_str(raw).unwrap();
        assert!(state.finished);
        assert_eq!(state.link.as_deref(), Some("https://cdn.example/c-1.wav"));
    }
}
