use cargolink::codec::{CodecError, TelemetryCodec};
use cargolink::domain::TelemetryRecord;

fn full_record(id: &str) -> TelemetryRecord {
    TelemetryRecord {
        msisdn: Some("882360002704335".to_string()),
        time: Some("2031-07-06 06:50:45".to_string()),
        rssi: Some("-83".to_string()),
        cgi: Some("240-07-66011-34045".to_string()),
        bat_soc: Some("87".to_string()),
        acc: Some("0.02".to_string()),
        temperature: Some("21.4".to_string()),
        humidity: Some("64".to_string()),
        pressure: Some("101.32".to_string()),
        door: Some("closed".to_string()),
        latitude: Some("57.708870".to_string()),
        longitude: Some("11.974560".to_string()),
        altitude: Some("12.1".to_string()),
        speed: Some("0.0".to_string()),
        heading: Some("241".to_string()),
        ble_m: Some("1".to_string()),
        gnss: Some("1".to_string()),
        nsat: Some("11".to_string()),
        hdop: Some("0.8".to_string()),
        timestamp: Some("2031-07-06T06:50:46.123Z".to_string()),
        ..TelemetryRecord::with_container_id(id)
    }
}

#[test]
fn single_record_round_trips_exactly() {
    let codec = TelemetryCodec::new();
    let record = full_record("LMCU2284833");

    let bytes = codec.encode_one(&record).unwrap();
    let decoded = codec.decode_one(&bytes).unwrap();

    assert_eq!(decoded, record);
}

#[test]
fn sparse_record_round_trips_without_gaining_fields() {
    let codec = TelemetryCodec::new();
    let record = TelemetryRecord {
        temperature: Some("3.5".to_string()),
        ..TelemetryRecord::with_container_id("LMCU0000009")
    };

    let decoded = codec.decode_one(&codec.encode_one(&record).unwrap()).unwrap();

    assert_eq!(decoded, record);
    assert!(decoded.humidity.is_none());
    assert!(decoded.latitude.is_none());

    // Absent fields must stay absent on the wire too.
    let json = serde_json::to_value(&decoded).unwrap();
    assert!(json.get("humidity").is_none());
}

#[test]
fn fields_outside_the_schema_are_dropped() {
    let codec = TelemetryCodec::new();
    let mut record = full_record("LMCU2284833");
    record.extra.insert(
        "customTag".to_string(),
        serde_json::Value::String("warehouse-7".to_string()),
    );

    let decoded = codec.decode_one(&codec.encode_one(&record).unwrap()).unwrap();

    assert!(decoded.extra.is_empty());
    assert_ne!(decoded, record);
    record.extra.clear();
    assert_eq!(decoded, record);
}

#[test]
fn bulk_round_trip_preserves_order() {
    let codec = TelemetryCodec::new();
    let records: Vec<TelemetryRecord> = (0..5)
        .map(|i| full_record(&format!("LMCU{i:07}")))
        .collect();

    let bytes = codec.encode_many(&records).unwrap();
    let decoded = codec.decode_many(&bytes).unwrap();

    assert_eq!(decoded, records);
}

#[test]
fn empty_batch_round_trips() {
    let codec = TelemetryCodec::new();
    let bytes = codec.encode_many(&[]).unwrap();
    assert!(codec.decode_many(&bytes).unwrap().is_empty());
}

#[test]
fn malformed_bytes_are_rejected() {
    let codec = TelemetryCodec::new();

    assert!(matches!(
        codec.decode_one(b"definitely not gzip"),
        Err(CodecError::IoError(_))
    ));
    assert!(codec.decode_many(&[0x1f, 0x8b, 0x00, 0x00]).is_err());
}

#[test]
fn decode_one_refuses_multi_record_payloads() {
    let codec = TelemetryCodec::new();
    let records = vec![full_record("LMCU0000001"), full_record("LMCU0000002")];
    let bytes = codec.encode_many(&records).unwrap();

    assert!(matches!(
        codec.decode_one(&bytes),
        Err(CodecError::UnexpectedRecordCount { count: 2 })
    ));
}

#[test]
fn bulk_encoding_beats_natural_json() {
    let codec = TelemetryCodec::new();
    let records: Vec<TelemetryRecord> = (0..100)
        .map(|i| full_record(&format!("LMCU{i:07}")))
        .collect();

    let compressed = codec.encode_many(&records).unwrap();
    let json = serde_json::to_vec(&records).unwrap();

    // Key-stripping plus gzip should win by a wide margin on dense batches.
    assert!(compressed.len() * 2 < json.len());
}
