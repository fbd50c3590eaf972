use serde::Serialize;

/// Structured probe events emitted by the client and the scenarios.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ProbeEvent {
    SseConnected {
        url: String,
        status: u16,
    },
    SessionEstablished {
        session_id: String,
        endpoint_url: String,
        lines_read: usize,
    },
    HeartbeatReceived {
        timestamp: Option<String>,
        events_seen: u64,
    },
    DrainEnded {
        events: u64,
        heartbeats: u64,
        stopped: bool,
    },
    SseClosed {
        session_id: String,
        joined: bool,
    },
    RequestAttempt {
        method: String,
        request_id: String,
        attempt: u32,
        status: u16,
        duration_ms: u64,
    },
    RequestFinished {
        method: String,
        request_id: String,
        success: bool,
        attempts: u32,
        target_service: Option<String>,
    },
}

impl ProbeEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(probe_event = %json, "mrp_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_is_tagged_by_variant_name() {
        let ev = ProbeEvent::RequestAttempt {
            method: "tools/list".into(),
            request_id: "req-1".into(),
            attempt: 2,
            status: 200,
            duration_ms: 14,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "RequestAttempt");
        assert_eq!(v["attempt"], 2);
        assert_eq!(v["method"], "tools/list");
    }

    #[test]
    fn heartbeat_without_timestamp_serializes_null() {
        let ev = ProbeEvent::HeartbeatReceived {
            timestamp: None,
            events_seen: 3,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert!(v["timestamp"].is_null());
    }
}
