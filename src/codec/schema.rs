//! Fixed field ordering for the dense payload layout.
//!
//! Field names never travel in a compressed payload. Each record is
//! projected onto a fixed, versioned position table and only the values
//! are serialized; decode re-attaches names by position. The table below
//! matches the device firmware's field numbering, with the ingestion
//! timestamp appended at the final slot.

use crate::domain::TelemetryRecord;
use std::collections::BTreeMap;

/// Version tag carried in every payload. Bump when the position table changes.
pub const SCHEMA_VERSION: u8 = 1;

/// Number of positions in the current table.
pub const FIELD_COUNT: usize = 21;

/// Extracts a record's values in schema order. Fields outside the table
/// (the `extra` map) are dropped here; this is the codec's documented
/// lossy boundary.
pub(crate) fn project(record: &TelemetryRecord) -> Vec<Option<String>> {
    vec![
        record.msisdn.clone(),            // 0
        Some(record.iso6346.clone()),     // 1
        record.time.clone(),              // 2
        record.rssi.clone(),              // 3
        record.cgi.clone(),               // 4
        record.bat_soc.clone(),           // 5
        record.acc.clone(),               // 6
        record.temperature.clone(),       // 7
        record.humidity.clone(),          // 8
        record.pressure.clone(),          // 9
        record.door.clone(),              // 10
        record.latitude.clone(),          // 11
        record.longitude.clone(),         // 12
        record.altitude.clone(),          // 13
        record.speed.clone(),             // 14
        record.heading.clone(),           // 15
        record.ble_m.clone(),             // 16
        record.gnss.clone(),              // 17
        record.nsat.clone(),              // 18
        record.hdop.clone(),              // 19
        record.timestamp.clone(),         // 20
    ]
}

/// Rebuilds a record from schema-ordered values. Positions holding `None`
/// stay absent so the reconstructed record gains no spurious fields.
/// Short vectors (from a writer with a smaller table) are padded with `None`.
pub(crate) fn reassemble(mut values: Vec<Option<String>>) -> TelemetryRecord {
    values.resize(FIELD_COUNT, None);
    let mut take = |position: usize| values[position].take();

    TelemetryRecord {
        msisdn: take(0),
        iso6346: take(1).unwrap_or_default(),
        time: take(2),
        rssi: take(3),
        cgi: take(4),
        bat_soc: take(5),
        acc: take(6),
        temperature: take(7),
        humidity: take(8),
        pressure: take(9),
        door: take(10),
        latitude: take(11),
        longitude: take(12),
        altitude: take(13),
        speed: take(14),
        heading: take(15),
        ble_m: take(16),
        gnss: take(17),
        nsat: take(18),
        hdop: take(19),
        timestamp: take(20),
        extra: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> TelemetryRecord {
        let mut record = TelemetryRecord::with_container_id("LMCU1234567");
        record.msisdn = Some("393315537123".into());
        record.temperature = Some("21.4".into());
        record.bat_soc = Some("87".into());
        record.door = Some("C".into());
        record.latitude = Some("31.230".into());
        record.longitude = Some("29.945".into());
        record.nsat = Some("08".into());
        record.hdop = Some("1.2".into());
        record.timestamp = Some("2026-08-21T09:15:00.000Z".into());
        record
    }

    #[test]
    fn projection_preserves_positions() {
        let values = project(&sample_record());
        assert_eq!(values.len(), FIELD_COUNT);
        assert_eq!(values[1].as_deref(), Some("LMCU1234567"));
        assert_eq!(values[5].as_deref(), Some("87"));
        assert_eq!(values[18].as_deref(), Some("08"));
        assert_eq!(values[19].as_deref(), Some("1.2"));
        assert_eq!(values[2], None);
    }

    #[test]
    fn project_then_reassemble_is_identity() {
        let record = sample_record();
        assert_eq!(reassemble(project(&record)), record);
    }

    #[test]
    fn extra_fields_do_not_survive_projection() {
        let mut record = sample_record();
        record
            .extra
            .insert("customTag".into(), serde_json::Value::String("yard-9".into()));

        let rebuilt = reassemble(project(&record));
        assert!(rebuilt.extra.is_empty());
        record.extra.clear();
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn short_value_vectors_are_padded() {
        let rebuilt = reassemble(vec![None, Some("LMCU1".into())]);
        assert_eq!(rebuilt.container_id(), "LMCU1");
        assert_eq!(rebuilt.timestamp, None);
    }
}
