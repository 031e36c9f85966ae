//! Event types carried on the message bus and delivered to the external sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bus topic for location updates
pub const LOCATION_TOPIC: &str = "location-updates";

/// Event type tag for location updates
pub const LOCATION_EVENT_TYPE: &str = "location_update";

/// Transport projection of a persisted fix.
///
/// The event id equals the fix id so the external sink can deduplicate
/// redeliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: String,
    pub session_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
}

impl LocationEvent {
    /// Bus subject for this event; one subject per tenant so fixes for a
    /// tenant are serialized through a single ordered stream partition.
    pub fn subject(&self) -> String {
        format!("{}.{}", LOCATION_TOPIC, self.tenant_id)
    }
}

/// Envelope wrapping an event for the external POST
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    pub event_type: String,
    pub data: LocationEvent,
    pub timestamp: DateTime<Utc>,
}

impl DeliveryEnvelope {
    pub fn new(event: LocationEvent) -> Self {
        Self {
            event_type: LOCATION_EVENT_TYPE.to_string(),
            data: event,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> LocationEvent {
        LocationEvent {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: "subject-1".to_string(),
            session_id: Uuid::new_v4(),
            latitude: 40.0,
            longitude: -74.0,
            timestamp: Utc::now(),
            event_type: LOCATION_EVENT_TYPE.to_string(),
        }
    }

    #[test]
    fn test_event_wire_fields() {
        let event = sample_event();
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("id").is_some());
        assert!(json.get("tenant_id").is_some());
        assert!(json.get("user_id").is_some());
        assert!(json.get("session_id").is_some());
        assert!(json.get("latitude").is_some());
        assert!(json.get("longitude").is_some());
        assert!(json.get("timestamp").is_some());
        assert_eq!(json["event_type"], "location_update");
    }

    #[test]
    fn test_subject_is_tenant_partitioned() {
        let event = sample_event();
        assert_eq!(
            event.subject(),
            format!("location-updates.{}", event.tenant_id)
        );
    }

    #[test]
    fn test_envelope_wraps_event() {
        let event = sample_event();
        let id = event.id;
        let envelope = DeliveryEnvelope::new(event);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event_type"], "location_update");
        assert_eq!(json["data"]["id"], id.to_string());
        assert!(json.get("timestamp").is_some());
    }
}
