fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use serde_json::value::RawValue;
    use zilink_protocol::messages::{AuthRequest, CommandBody, ErrorBody};
    use zilink_protocol::{ComponentUpdate, Envelope, Inbound, MessageType};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Compares an emitted frame against a fixture (order-independent).
    fn assert_matches_fixture(name: &str, emitted: &str) {
        let fixture = load_fixture(name);
        let emitted: serde_json::Value = serde_json::from_str(emitted)
            .unwrap_or_else(|e| panic!("emitted frame for {name} is not JSON: {e}"));
        assert_eq!(
            fixture, emitted,
            "wire mismatch for {name}:\n  server: {fixture}\n  device: {emitted}"
        );
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  device: {reserialized}"
        );
    }

    fn fixture_text(name: &str) -> String {
        load_fixture(name).to_string()
    }

    // --- Device -> server ---

    #[test]
    fn fixture_auth_request() {
        let frame = Envelope::auth(
            "de45f6f5-a2ce-43e4-b784-e9c0e5f83a47",
            "eyJhbGciOiJIUzI1NiJ9.device.sig",
        )
        .to_text()
        .unwrap();
        assert_matches_fixture("auth_request.json", &frame);
        roundtrip_test::<Envelope<AuthRequest>>("auth_request.json");
    }

    #[test]
    fn fixture_device_data() {
        let sensors =
            RawValue::from_string(r#"[{"type":"light","value":300,"unit":"lux"}]"#.into())
                .unwrap();
        let frame = Envelope::device_data(&sensors).to_text().unwrap();
        assert_matches_fixture("device_data.json", &frame);
    }

    #[test]
    fn fixture_component_toggle() {
        let frame = serde_json::to_string(&ComponentUpdate::toggle("led", true)).unwrap();
        assert_matches_fixture("component_toggle.json", &frame);
        roundtrip_test::<ComponentUpdate>("component_toggle.json");
    }

    #[test]
    fn fixture_component_slider() {
        let frame = serde_json::to_string(&ComponentUpdate::slider("fan", 40)).unwrap();
        assert_matches_fixture("component_slider.json", &frame);
        roundtrip_test::<ComponentUpdate>("component_slider.json");
    }

    // --- Server -> device ---

    #[test]
    fn fixture_auth_success() {
        assert_eq!(
            Inbound::parse(&fixture_text("auth_success.json")).unwrap(),
            Inbound::AuthSuccess
        );
    }

    #[test]
    fn fixture_error() {
        assert_eq!(
            Inbound::parse(&fixture_text("error.json")).unwrap(),
            Inbound::Error {
                error: "Authentication failed".into()
            }
        );
        roundtrip_test::<Envelope<ErrorBody>>("error.json");
    }

    #[test]
    fn fixture_command() {
        let text = fixture_text("command.json");
        assert_eq!(
            Inbound::parse(&text).unwrap(),
            Inbound::Command {
                command: "toggle".into()
            }
        );
        // Pub/sub delivers the same envelope as raw bytes.
        assert_eq!(
            Inbound::parse_slice(text.as_bytes()).unwrap(),
            Inbound::parse(&text).unwrap()
        );
        roundtrip_test::<Envelope<CommandBody>>("command.json");
    }

    #[test]
    fn fixture_types_are_known() {
        for (name, expected) in [
            ("auth_request.json", MessageType::Auth),
            ("device_data.json", MessageType::DeviceData),
            ("auth_success.json", MessageType::AuthSuccess),
            ("error.json", MessageType::Error),
            ("command.json", MessageType::Command),
        ] {
            let envelope: Envelope = serde_json::from_value(load_fixture(name)).unwrap();
            assert_eq!(envelope.msg_type, expected, "{name}");
        }
    }
}
