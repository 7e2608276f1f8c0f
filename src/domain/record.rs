use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Record with no usable container identifier.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("record is missing a non-empty container identifier")]
pub struct MissingContainerId;

/// A single telemetry report from a container tracking device.
///
/// This is the canonical representation throughout the pipeline, from
/// ingestion through persistence, replication, and fan-out. All device
/// values travel as strings; the device firmware formats them before
/// transmission and the destination expects them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    // Identity (ISO 6346 container code), accepted under either wire name
    #[serde(alias = "containerId")]
    pub iso6346: String,

    // Device and network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msisdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgi: Option<String>,
    #[serde(rename = "bat-soc", default, skip_serializing_if = "Option::is_none")]
    pub bat_soc: Option<String>,

    // Sensor readings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door: Option<String>,

    // Position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,

    // GNSS quality
    #[serde(rename = "ble-m", default, skip_serializing_if = "Option::is_none")]
    pub ble_m: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdop: Option<String>,

    // Stamped at ingestion accept if the device did not supply one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    // Ad hoc fields from the ingestion boundary. Accepted and echoed in
    // JSON, but not part of the fixed compression schema: they do not
    // survive an encode/decode round trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TelemetryRecord {
    /// Minimal record carrying only the container identity.
    pub fn with_container_id(iso6346: impl Into<String>) -> Self {
        Self {
            iso6346: iso6346.into(),
            msisdn: None,
            time: None,
            rssi: None,
            cgi: None,
            bat_soc: None,
            acc: None,
            temperature: None,
            humidity: None,
            pressure: None,
            door: None,
            latitude: None,
            longitude: None,
            altitude: None,
            speed: None,
            heading: None,
            ble_m: None,
            gnss: None,
            nsat: None,
            hdop: None,
            timestamp: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.iso6346
    }

    /// Identity must be present and non-empty after trimming.
    pub fn validate(&self) -> Result<(), MissingContainerId> {
        if self.iso6346.trim().is_empty() {
            return Err(MissingContainerId);
        }
        Ok(())
    }

    /// Stamps the ingestion timestamp (ISO 8601, UTC) if the record
    /// arrived without one.
    pub fn ensure_ingestion_timestamp(&mut self) {
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        }
    }
}

/// A record staged in the ingestion queue, awaiting batch persistence.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub record: TelemetryRecord,
    pub enqueued_at_ms: i64,
}

impl QueueItem {
    pub fn new(record: TelemetryRecord) -> Self {
        Self {
            record,
            enqueued_at_ms: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_container_id_alias() {
        let record: TelemetryRecord =
            serde_json::from_str(r#"{"containerId": "LMCU1234567", "temperature": "21.4"}"#)
                .unwrap();
        assert_eq!(record.container_id(), "LMCU1234567");
        assert_eq!(record.temperature.as_deref(), Some("21.4"));
    }

    #[test]
    fn hyphenated_wire_names_round_trip() {
        let json = r#"{"iso6346": "LMCU0000001", "bat-soc": "87", "ble-m": "1"}"#;
        let record: TelemetryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.bat_soc.as_deref(), Some("87"));
        assert_eq!(record.ble_m.as_deref(), Some("1"));

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["bat-soc"], "87");
        assert_eq!(out["ble-m"], "1");
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let record = TelemetryRecord::with_container_id("LMCU7654321");
        let out = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["iso6346"]);
    }

    #[test]
    fn validate_rejects_blank_identity() {
        let record = TelemetryRecord::with_container_id("   ");
        assert_eq!(record.validate(), Err(MissingContainerId));
        assert!(TelemetryRecord::with_container_id("LMCU1").validate().is_ok());
    }

    #[test]
    fn ingestion_timestamp_is_stamped_once() {
        let mut record = TelemetryRecord::with_container_id("LMCU2");
        record.ensure_ingestion_timestamp();
        let first = record.timestamp.clone();
        assert!(first.is_some());

        record.ensure_ingestion_timestamp();
        assert_eq!(record.timestamp, first);
    }

    #[test]
    fn unknown_fields_are_kept_in_extra() {
        let record: TelemetryRecord =
            serde_json::from_str(r#"{"iso6346": "LMCU3", "customTag": "yard-9"}"#).unwrap();
        assert_eq!(
            record.extra.get("customTag"),
            Some(&serde_json::Value::String("yard-9".into()))
        );
    }
}
