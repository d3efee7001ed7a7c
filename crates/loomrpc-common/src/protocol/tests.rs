use super::*;

#[test]
fn test_message_builder() {
    let message = Message::new("Arith", "mul")
        .with_payload(vec![1, 2, 3])
        .with_metadata("trace", "abc");

    assert_eq!(message.service_path, "Arith");
    assert_eq!(message.service_method, "mul");
    assert_eq!(message.payload, vec![1, 2, 3]);
    assert_eq!(message.metadata.get("trace"), Some(&"abc".to_string()));
    assert!(!message.oneway);
    assert_eq!(message.serialize_type, SerializeType::None);
    assert_eq!(message.compress_type, CompressType::None);
}

#[test]
fn test_application_error_absent() {
    let message = Message::new("Arith", "mul");
    assert_eq!(message.application_error(), None);
}

#[test]
fn test_application_error_present() {
    let message = Message::new("Arith", "mul")
        .with_metadata(metadata::ERROR_CODE, "500")
        .with_metadata(metadata::ERROR_MESSAGE, "boom");

    assert_eq!(message.application_error(), Some((500, "boom".to_string())));
}

#[test]
fn test_application_error_without_message() {
    let message = Message::new("Arith", "mul").with_metadata(metadata::ERROR_CODE, "7");
    assert_eq!(message.application_error(), Some((7, String::new())));
}

#[test]
fn test_envelope_kinds() {
    let request = Envelope::request(1, Message::new("Arith", "mul"));
    let response = Envelope::response(1, Message::new("Arith", "mul"));
    let heartbeat = Envelope::heartbeat(2);

    assert_eq!(request.kind, CommandKind::Request);
    assert!(!request.is_response());
    assert!(response.is_response());
    assert_eq!(heartbeat.kind, CommandKind::Heartbeat);
    assert_eq!(heartbeat.opaque, 2);
}

#[test]
fn test_envelope_serde_round_trip() {
    let message = Message::new("Echo", "say")
        .with_payload(b"hello".to_vec())
        .with_metadata("k", "v");
    let envelope = Envelope::request(99, message);

    let encoded = serde_json::to_vec(&envelope).unwrap();
    let decoded: Envelope = serde_json::from_slice(&encoded).unwrap();

    assert_eq!(envelope, decoded);
}
