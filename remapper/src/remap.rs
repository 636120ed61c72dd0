use crate::document::{Inbound, ProxyConfigDocument};
use node_config::PortMap;
use serde_json::Value as JsonValue;
use std::borrow::Cow;

#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("failed to parse config for port mapping: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to marshal config after port mapping: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Rewrites inbound ports in `document` according to `port_map`.
///
/// Inbounds whose port is missing, unusable or not in the map are left as
/// they are, as is a document without a well-formed `inbounds` array.
pub fn apply_port_map(
    mut document: ProxyConfigDocument,
    port_map: &PortMap,
) -> ProxyConfigDocument {
    if port_map.is_empty() {
        return document;
    }

    for inbound in document.listeners_mut() {
        remap_inbound(inbound, port_map);
    }

    document
}

/// Same as [`apply_port_map`] for a document held as a generic JSON value.
/// Values that are not JSON objects are returned unchanged.
pub fn apply_port_map_to_value(value: JsonValue, port_map: &PortMap) -> JsonValue {
    if port_map.is_empty() {
        return value;
    }

    let JsonValue::Object(fields) = value else {
        return value;
    };

    apply_port_map(ProxyConfigDocument::from(fields), port_map).into()
}

/// Applies the port map to a JSON encoded config.
///
/// With an empty map the input is handed back as-is, without being parsed.
pub fn apply_port_map_to_bytes<'a>(
    config_bytes: &'a [u8],
    port_map: &PortMap,
) -> Result<Cow<'a, [u8]>, SerializationError> {
    if port_map.is_empty() {
        return Ok(Cow::Borrowed(config_bytes));
    }

    let document: ProxyConfigDocument =
        serde_json::from_slice(config_bytes).map_err(SerializationError::Decode)?;
    let document = apply_port_map(document, port_map);
    let result = serde_json::to_vec(&document).map_err(SerializationError::Encode)?;

    Ok(Cow::Owned(result))
}

fn remap_inbound(inbound: &mut Inbound, port_map: &PortMap) {
    let Some(original_port) = inbound
        .port
        .as_ref()
        .and_then(|port| port.as_port())
        .and_then(|port| u16::try_from(port).ok())
    else {
        return;
    };

    if let Some(mapped_port) = port_map.get(original_port) {
        tracing::info!(
            tag = inbound.tag(),
            original_port,
            mapped_port,
            "Port mapping applied"
        );
        inbound.port = Some(mapped_port.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PortValue;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    type Record = HashMap<String, String>;

    /// Collects the fields of every event emitted while it is installed.
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<Record>>>);

    impl CapturedEvents {
        fn records(&self) -> Vec<Record> {
            self.0.lock().unwrap().clone()
        }
    }

    struct RecordVisitor<'a>(&'a mut Record);

    impl Visit for RecordVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl<S: Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut record = Record::new();
            event.record(&mut RecordVisitor(&mut record));
            self.0.lock().unwrap().push(record);
        }
    }

    fn with_captured_events<T>(f: impl FnOnce() -> T) -> (T, Vec<Record>) {
        let events = CapturedEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, events.records())
    }

    fn port_map() -> PortMap {
        PortMap::from_iter([(443, 10000), (80, 10001)])
    }

    fn document(value: JsonValue) -> ProxyConfigDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_rewrites_matching_inbounds() {
        let input = document(json!({
            "inbounds": [
                {"tag": "vless", "port": 443},
                {"tag": "http", "port": 80},
                {"tag": "other", "port": 9999}
            ]
        }));

        let (output, records) = with_captured_events(|| apply_port_map(input, &port_map()));

        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({
                "inbounds": [
                    {"tag": "vless", "port": 10000},
                    {"tag": "http", "port": 10001},
                    {"tag": "other", "port": 9999}
                ]
            })
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["tag"], "vless");
        assert_eq!(records[0]["original_port"], "443");
        assert_eq!(records[0]["mapped_port"], "10000");
        assert_eq!(records[1]["tag"], "http");
        assert_eq!(records[1]["original_port"], "80");
        assert_eq!(records[1]["mapped_port"], "10001");
    }

    #[test]
    fn test_port_encodings_match_alike() {
        let input = document(json!({
            "inbounds": [
                {"tag": "int", "port": 443},
                {"tag": "float", "port": 443.0},
                {"tag": "string", "port": "443"}
            ]
        }));

        let (output, records) = with_captured_events(|| apply_port_map(input, &port_map()));
        let ports: Vec<_> = output
            .listeners()
            .map(|inbound| inbound.port.clone())
            .collect();
        assert_eq!(ports, vec![Some(PortValue::from(10000u16)); 3]);

        assert_eq!(records.len(), 3);
        for (record, tag) in records.iter().zip(["int", "float", "string"]) {
            assert_eq!(record["tag"], tag);
            assert_eq!(record["original_port"], "443");
            assert_eq!(record["mapped_port"], "10000");
        }
    }

    #[test]
    fn test_empty_map_is_identity() {
        let input = document(json!({
            "inbounds": [{"tag": "vless", "port": 443}],
            "outbounds": []
        }));

        let (output, records) =
            with_captured_events(|| apply_port_map(input.clone(), &PortMap::new()));
        assert_eq!(output, input);
        assert!(records.is_empty());
    }

    #[test]
    fn test_unusable_ports_untouched() {
        let original = json!({
            "inbounds": [
                {"tag": "zero", "port": 0},
                {"tag": "zero-string", "port": "0"},
                {"tag": "bool", "port": true},
                {"tag": "null", "port": null},
                {"tag": "range", "port": "443-444"},
                {"tag": "too-big", "port": 65979},
                {"tag": "missing"},
                "not-an-object",
                17
            ]
        });
        // 65979 would wrap around to 443 if narrowed to u16 carelessly
        let (output, records) =
            with_captured_events(|| apply_port_map(document(original.clone()), &port_map()));
        assert_eq!(serde_json::to_value(&output).unwrap(), original);
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_inbounds_untouched() {
        for original in [
            json!({"inbounds": "443"}),
            json!({"inbounds": {"port": 443}}),
            json!({"inbounds": null}),
            json!({"outbounds": [{"port": 443}]}),
        ] {
            let output = apply_port_map(document(original.clone()), &port_map());
            assert_eq!(serde_json::to_value(&output).unwrap(), original);
        }
    }

    #[test]
    fn test_unknown_fields_survive() {
        let input = document(json!({
            "log": {"loglevel": "warning"},
            "inbounds": [{
                "tag": "vless",
                "port": 443,
                "listen": "0.0.0.0",
                "protocol": "vless",
                "settings": {"clients": [], "decryption": "none"},
                "streamSettings": {"network": "tcp", "security": "reality"}
            }],
            "routing": {"rules": []}
        }));

        let output = serde_json::to_value(apply_port_map(input, &port_map())).unwrap();
        assert_eq!(output["log"]["loglevel"], "warning");
        assert_eq!(output["routing"], json!({"rules": []}));
        assert_eq!(output["inbounds"][0]["port"], 10000);
        assert_eq!(output["inbounds"][0]["listen"], "0.0.0.0");
        assert_eq!(output["inbounds"][0]["streamSettings"]["security"], "reality");
    }

    #[test]
    fn test_missing_or_non_string_tag() {
        let input = document(json!({
            "inbounds": [{"port": 443}, {"tag": 5, "port": 80}]
        }));

        let (_, records) = with_captured_events(|| apply_port_map(input, &port_map()));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["tag"], "");
        assert_eq!(records[1]["tag"], "");
    }

    #[test]
    fn test_apply_to_value() {
        let output = apply_port_map_to_value(
            json!({"inbounds": [{"tag": "vless", "port": "443"}], "dns": {}}),
            &port_map(),
        );
        assert_eq!(
            output,
            json!({"inbounds": [{"tag": "vless", "port": 10000}], "dns": {}})
        );

        assert_eq!(
            apply_port_map_to_value(json!([1, 2, 3]), &port_map()),
            json!([1, 2, 3])
        );
    }

    #[test]
    fn test_bytes_empty_map_returns_input() {
        let input = serde_json::to_vec(&json!({
            "inbounds": [{"tag": "vless", "port": 443}]
        }))
        .unwrap();

        let output = apply_port_map_to_bytes(&input, &PortMap::new()).unwrap();
        assert!(matches!(output, Cow::Borrowed(_)));
        assert_eq!(output.as_ref(), input.as_slice());

        // Not even parsed when there is nothing to map
        let garbage = b"{not json";
        assert_eq!(
            apply_port_map_to_bytes(garbage, &PortMap::new()).unwrap().as_ref(),
            garbage
        );
    }

    #[test]
    fn test_bytes_rewrite() {
        let input = br#"{"inbounds":[{"tag":"vless","port":443,"protocol":"vless"}]}"#;

        let output = apply_port_map_to_bytes(input, &port_map()).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&output).unwrap();
        assert_eq!(
            parsed,
            json!({"inbounds": [{"tag": "vless", "port": 10000, "protocol": "vless"}]})
        );
        // Key order within an inbound is kept
        assert_eq!(
            std::str::from_utf8(&output).unwrap(),
            r#"{"inbounds":[{"tag":"vless","port":10000,"protocol":"vless"}]}"#
        );
    }

    #[test]
    fn test_bytes_decode_errors() {
        assert!(matches!(
            apply_port_map_to_bytes(b"{not json", &port_map()),
            Err(SerializationError::Decode(_))
        ));
        assert!(matches!(
            apply_port_map_to_bytes(b"[1, 2]", &port_map()),
            Err(SerializationError::Decode(_))
        ));

        let err = apply_port_map_to_bytes(b"", &port_map()).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("failed to parse config for port mapping")
        );
    }
}
