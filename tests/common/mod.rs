#![allow(dead_code)]

use std::io::{ Seek, Write };
use std::net::SocketAddr;
use tempfile::NamedTempFile;
use tokio::sync::oneshot;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;


pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Echo server living on the calling test's runtime.
pub async fn echo_server() -> SocketAddr {
    let (send, recv) = oneshot::channel();

    tokio::spawn(async move {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(&addr).await.unwrap();

        send.send(listener.local_addr().unwrap()).unwrap();

        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                tokio::io::copy(&mut r, &mut w).await.unwrap();
            });
        }
    });

    recv.await.unwrap()
}

/// Non-zero bytes, so an offset mistake shows up as a content mismatch.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}

pub fn file_with(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file.rewind().unwrap();
    file
}
