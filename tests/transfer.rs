mod common;

use std::time::Duration;
use tokio::time::timeout;
use zio_sendfile as zio;
use zio_sendfile::{ Config, Method, TransferError };
use crate::common::init_tracing;


const SMALL: u64 = 8 << 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sendfile_one_gib() {
    init_tracing();

    let report = zio::run(&Config::default()).await.unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.received.bytes, zio::ZERO_LEN);
    assert_eq!(report.received.digest, zio::ZERO_SHA256);
}

#[tokio::test]
async fn test_empty_file() {
    init_tracing();

    let report = zio::run(&Config::with_size(0)).await.unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.received.bytes, 0);
    assert_eq!(report.received.digest, zio::EMPTY_SHA256);
}

#[tokio::test]
async fn test_buffered_matches_sendfile() {
    init_tracing();

    let fast = zio::run(&Config::with_size(SMALL)).await.unwrap();
    let slow = zio::run(&Config::with_size(SMALL).method(Method::Buffered)).await.unwrap();

    assert!(fast.is_success(), "{:?}", fast.failures);
    assert!(slow.is_success(), "{:?}", slow.failures);
    assert_eq!(fast.received, slow.received);
    assert_eq!(fast.received.digest, zio::zero_digest(SMALL));
}

#[tokio::test]
async fn test_repeated_runs_are_independent() {
    init_tracing();

    let config = Config::with_size(SMALL);
    let first = zio::run(&config).await.unwrap();
    let second = zio::run(&config).await.unwrap();

    assert!(first.is_success(), "{:?}", first.failures);
    assert!(second.is_success(), "{:?}", second.failures);
    assert_eq!(first.received, second.received);
}

#[tokio::test]
async fn test_truncated_file_reports_short_transfer() {
    init_tracing();

    let config = Config::with_size(SMALL).truncate_to(SMALL / 4);
    let report = timeout(Duration::from_secs(60), zio::run(&config))
        .await
        .expect("short transfer must not hang")
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.received.bytes, SMALL / 4);
    assert_eq!(report.failures.len(), 3, "{:?}", report.failures);
    assert!(matches!(
        report.failures[0],
        TransferError::ByteCountMismatch { received, expected }
            if received == SMALL / 4 && expected == SMALL
    ));
    assert!(matches!(report.failures[1], TransferError::DigestMismatch { .. }));
    assert!(matches!(
        report.failures[2],
        TransferError::ShortTransfer { sent, expected }
            if sent == SMALL / 4 && expected == SMALL
    ));
    assert!(report.failures.iter().all(|err| !err.is_fatal()));
}

#[tokio::test]
async fn test_wrong_digest_is_only_failure() {
    init_tracing();

    let config = Config::with_size(4096).expected_digest(zio::EMPTY_SHA256);
    let report = zio::run(&config).await.unwrap();

    assert_eq!(report.received.bytes, 4096);
    assert_eq!(report.failures.len(), 1, "{:?}", report.failures);
    assert!(matches!(report.failures[0], TransferError::DigestMismatch { .. }));
}

#[tokio::test]
async fn test_serve_and_receive() {
    init_tracing();

    let file = zio::zero_file(SMALL).unwrap();
    let listener = zio::listen_local().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let slot = zio::serve(listener, file.reopen().unwrap(), SMALL, Method::Sendfile);
    let received = zio::receive(addr).await.unwrap();

    assert!(received.check(SMALL, &zio::zero_digest(SMALL)).is_empty());
    assert!(slot.drain().await.is_none());
}

#[tokio::test]
async fn test_serve_reports_unexpected_length() {
    init_tracing();

    let file = zio::zero_file(1000).unwrap();
    let listener = zio::listen_local().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let slot = zio::serve(listener, file.reopen().unwrap(), 2000, Method::Buffered);
    let received = zio::receive(addr).await.unwrap();

    assert_eq!(received.bytes, 1000);
    let err = slot.drain().await.unwrap();
    assert_eq!(err.to_string(), "sent 1000 bytes; expected 2000");
}
