use serde::Serialize;

/// Event name used when the public lobby list changes.
pub const LOBBIES_UPDATED: &str = "lobbies.updated";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_event_carries_name_and_payload() {
        let event = ServerEvent::json(
            LOBBIES_UPDATED.to_string(),
            &serde_json::json!({ "lobbies": [] }),
        )
        .unwrap();
        assert_eq!(event.event.as_deref(), Some(LOBBIES_UPDATED));
        assert_eq!(event.data, r#"{"lobbies":[]}"#);
    }
}
