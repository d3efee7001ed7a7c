use super::*;
use crate::protocol::{Envelope, LoomError, Message};

#[tokio::test]
async fn test_frame_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    write_frame(&mut client, b"hello frame").await.unwrap();
    let frame = read_frame(&mut server).await.unwrap();

    assert_eq!(frame, b"hello frame");
}

#[tokio::test]
async fn test_multiple_frames_in_order() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    write_frame(&mut client, b"one").await.unwrap();
    write_frame(&mut client, b"two").await.unwrap();

    assert_eq!(read_frame(&mut server).await.unwrap(), b"one");
    assert_eq!(read_frame(&mut server).await.unwrap(), b"two");
}

#[tokio::test]
async fn test_empty_frame() {
    let (mut client, mut server) = tokio::io::duplex(64);

    write_frame(&mut client, b"").await.unwrap();
    let frame = read_frame(&mut server).await.unwrap();

    assert!(frame.is_empty());
}

#[tokio::test]
async fn test_oversized_frame_rejected_on_read() {
    use tokio::io::AsyncWriteExt;

    let (mut client, mut server) = tokio::io::duplex(64);

    // A length prefix announcing more than the frame limit, no body needed.
    let len = (MAX_FRAME_SIZE as u32) + 1;
    client.write_all(&len.to_be_bytes()).await.unwrap();

    let err = read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, LoomError::InvalidFrame(_)));
}

#[tokio::test]
async fn test_read_frame_eof() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);

    let err = read_frame(&mut server).await.unwrap_err();
    match err {
        LoomError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("expected Io error, got {other}"),
    }
}

#[test]
fn test_codec_round_trip() {
    let message = Message::new("Arith", "mul").with_payload(vec![9, 8, 7]);
    let envelope = Envelope::request(7, message);

    let encoded = JsonCodec::encode(&envelope).unwrap();
    let decoded = JsonCodec::decode(&encoded).unwrap();

    assert_eq!(envelope, decoded);
}

#[test]
fn test_codec_enum_dispatch() {
    let envelope = Envelope::response(3, Message::new("Echo", "say"));
    let codec = Codec::new();

    let encoded = codec.encode(&envelope).unwrap();
    let decoded = codec.decode(&encoded).unwrap();

    assert_eq!(envelope, decoded);
}

#[test]
fn test_codec_rejects_garbage() {
    let err = JsonCodec::decode(b"not json at all").unwrap_err();
    assert!(matches!(err, LoomError::Serialization(_)));
}
