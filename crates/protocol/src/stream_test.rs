//! Tests for the stream buffer

use tokio::io::AsyncWriteExt;

use crate::{FramingError, StreamBuffer};

/// In-memory stream pre-loaded with `data`; dropping the writer gives EOF
async fn loaded(data: &[u8]) -> tokio::io::DuplexStream {
    let (mut tx, rx) = tokio::io::duplex(1024);
    tx.write_all(data).await.unwrap();
    drop(tx);
    rx
}

#[tokio::test]
async fn test_byte_at_reads_on_demand() {
    let mut stream = loaded(b"hello").await;
    let mut buf = StreamBuffer::new(&mut stream);

    assert_eq!(buf.byte_at(0).await.unwrap(), b'h');
    assert_eq!(buf.len(), 1);
    assert_eq!(buf.byte_at(4).await.unwrap(), b'o');
    assert_eq!(buf.len(), 5);

    // Already-buffered bytes stay addressable without further reads
    assert_eq!(buf.byte_at(1).await.unwrap(), b'e');
    assert_eq!(buf.bytes(), b"hello");
}

#[tokio::test]
async fn test_try_byte_at_eof_is_none() {
    let mut stream = loaded(b"").await;
    let mut buf = StreamBuffer::new(&mut stream);
    assert!(buf.try_byte_at(0).await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_until_delimiter() {
    let mut stream = loaded(b"123 payload").await;
    let mut buf = StreamBuffer::new(&mut stream);

    buf.read_until_delimiter(&[b' ']).await.unwrap();
    assert_eq!(buf.bytes(), b"123 ");
}

#[tokio::test]
async fn test_read_until_delimiter_multiple_candidates() {
    let mut stream = loaded(b"abc\0def").await;
    let mut buf = StreamBuffer::new(&mut stream);

    buf.read_until_delimiter(&[b'\n', 0x00]).await.unwrap();
    assert_eq!(buf.bytes(), b"abc\0");
}

#[tokio::test]
async fn test_read_exact_more_does_not_overread() {
    let mut stream = loaded(b"abcdefgh").await;
    {
        let mut buf = StreamBuffer::new(&mut stream);
        buf.read_exact_more(3).await.unwrap();
        assert_eq!(buf.bytes(), b"abc");
    }

    // The remaining bytes are still in the stream for the next frame
    let mut buf = StreamBuffer::new(&mut stream);
    buf.read_exact_more(5).await.unwrap();
    assert_eq!(buf.bytes(), b"defgh");
}

#[tokio::test]
async fn test_read_exact_more_eof_mid_frame() {
    let mut stream = loaded(b"ab").await;
    let mut buf = StreamBuffer::new(&mut stream);

    match buf.read_exact_more(10).await {
        Err(FramingError::UnexpectedEof { buffered }) => assert_eq!(buffered, 2),
        other => panic!("expected UnexpectedEof, got {:?}", other),
    }
}

#[tokio::test]
async fn test_read_until_delimiter_eof_mid_frame() {
    let mut stream = loaded(b"no terminator").await;
    let mut buf = StreamBuffer::new(&mut stream);

    assert!(matches!(
        buf.read_until_delimiter(&[b'\n']).await,
        Err(FramingError::UnexpectedEof { .. })
    ));
}
