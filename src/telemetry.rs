//! Telemetry Module for the HTML filter
//!
//! In Wasm, we emit structured logs that can be collected by
//! Envoy's access logging or external collectors.

use log::{info, warn};
use serde::Serialize;

/// Audit event types
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Filter rules (re)loaded
    FilterConfigured,
    /// Plugin configuration rejected
    ConfigRejected,
    /// A response body went through the filter
    DocumentFiltered,
}

/// Audit event for logging
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event type
    pub event_type: AuditEventType,
    /// Envoy context ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<u32>,
    /// Number of tag/attribute rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_count: Option<usize>,
    /// Body bytes received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_in: Option<usize>,
    /// Body bytes forwarded after filtering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_out: Option<usize>,
    /// Body chunks seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    /// Reason for action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            context_id: None,
            filter_count: None,
            bytes_in: None,
            bytes_out: None,
            chunks: None,
            reason: None,
        }
    }

    /// Set context ID
    pub fn with_context_id(mut self, id: u32) -> Self {
        self.context_id = Some(id);
        self
    }

    /// Set byte counts
    pub fn with_bytes(mut self, bytes_in: usize, bytes_out: usize) -> Self {
        self.bytes_in = Some(bytes_in);
        self.bytes_out = Some(bytes_out);
        self
    }

    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = Some(chunks);
        self
    }

    /// Set reason
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                AuditEventType::ConfigRejected => warn!("[HTML-FILTER-AUDIT] {}", json),
                _ => info!("[HTML-FILTER-AUDIT] {}", json),
            },
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
            }
        }
    }
}

/// Create a configuration loaded audit event
pub fn audit_configured(filter_count: usize, internal_encoding: bool) -> AuditEvent {
    let mut event = AuditEvent::new(AuditEventType::FilterConfigured);
    event.filter_count = Some(filter_count);
    if internal_encoding {
        event = event.with_reason("internal encoding");
    }
    event
}

/// Create a configuration rejected audit event
pub fn audit_config_rejected(error: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::ConfigRejected).with_reason(error)
}

/// Create a document filtered audit event
pub fn audit_document(context_id: u32, bytes_in: usize, bytes_out: usize) -> AuditEvent {
    AuditEvent::new(AuditEventType::DocumentFiltered)
        .with_context_id(context_id)
        .with_bytes(bytes_in, bytes_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = audit_document(7, 1200, 300).with_chunks(3);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("document_filtered"));
        assert!(json.contains("\"bytes_out\":300"));
        assert!(!json.contains("reason"));
    }

    #[test]
    fn test_audit_configured() {
        let event = audit_configured(4, true);
        assert_eq!(event.filter_count, Some(4));
        assert_eq!(event.reason.as_deref(), Some("internal encoding"));
    }

    #[test]
    fn test_audit_config_rejected() {
        let event = audit_config_rejected("Invalid JSON: eof");
        assert!(event.reason.as_ref().unwrap().contains("Invalid JSON"));
    }
}
