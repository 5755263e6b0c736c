use std::{ fs, io };
use std::net::SocketAddr;
use sha2::{ Digest, Sha256 };
use tokio::io::{ AsyncRead, AsyncReadExt, AsyncWriteExt };
use tokio::net::{ TcpListener, TcpStream };
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use crate::config::Config;
use crate::copy::{ copy_file_report, Buffered, Method };
use crate::error::TransferError;
use crate::zero::zero_file;


const READ_BUF: usize = 64 * 1024;

/// Binds a listener on loopback with an OS-assigned port.
pub async fn listen_local() -> io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
}

/// Holds at most one error from the background producer.
///
/// The producer drops its sender when it finishes, so draining never
/// blocks past the end of the transfer.
#[derive(Debug)]
pub struct ErrorSlot {
    recv: oneshot::Receiver<TransferError>,
    acceptor: Option<JoinHandle<()>>
}

impl ErrorSlot {
    fn new() -> (oneshot::Sender<TransferError>, ErrorSlot) {
        let (send, recv) = oneshot::channel();
        (send, ErrorSlot { recv, acceptor: None })
    }

    /// Waits for the producer to finish. `None` means it finished cleanly.
    pub async fn drain(self) -> Option<TransferError> {
        self.recv.await.ok()
    }

    /// Stops waiting for a connection, releasing the listener and the file.
    /// A transfer that already started runs to completion.
    pub fn abort(&self) {
        if let Some(ref acceptor) = self.acceptor {
            acceptor.abort();
        }
    }
}

/// Accepts one connection on `listener` and streams `file` into it.
///
/// Accept failure, copy failure, and sending anything other than
/// `expected` bytes are reported through the returned slot.
pub fn serve(listener: TcpListener, file: fs::File, expected: u64, method: Method) -> ErrorSlot {
    let (send, mut slot) = ErrorSlot::new();

    let acceptor = tokio::spawn(async move {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!("accept error: {err}");
                let _ = send.send(TransferError::Accept(err));
                return
            }
        };
        drop(listener);
        tracing::debug!(%peer, "accepted");

        tokio::spawn(async move {
            if let Err(err) = produce(stream, file, expected, method).await {
                tracing::warn!(%peer, "producer error: {err}");
                let _ = send.send(err);
            }
        });
    });

    slot.acceptor = Some(acceptor);
    slot
}

async fn produce(mut stream: TcpStream, mut file: fs::File, expected: u64, method: Method)
    -> Result<u64, TransferError>
{
    let report = match method {
        Method::Sendfile => copy_file_report(&mut file, &mut stream).await,
        Method::Buffered => copy_file_report(&mut file, &mut Buffered(&mut stream)).await
    }.map_err(TransferError::Copy)?;

    stream.shutdown().await.map_err(TransferError::Copy)?;
    tracing::info!(bytes = report.bytes, method = ?report.method, "file served");

    if report.bytes != expected {
        return Err(TransferError::ShortTransfer { sent: report.bytes, expected });
    }

    Ok(report.bytes)
}

/// What the receiving end saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub bytes: u64,
    pub digest: String
}

impl Received {
    /// Compares against the expected length and hex digest. Both checks
    /// always run.
    pub fn check(&self, expected_len: u64, expected_digest: &str) -> Vec<TransferError> {
        let mut failures = Vec::new();

        if self.bytes != expected_len {
            failures.push(TransferError::ByteCountMismatch {
                received: self.bytes,
                expected: expected_len
            });
        }

        if !self.digest.eq_ignore_ascii_case(expected_digest) {
            failures.push(TransferError::DigestMismatch {
                actual: self.digest.clone(),
                expected: expected_digest.to_owned()
            });
        }

        failures
    }
}

/// Streaming SHA-256 accumulator for an inbound byte stream.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    hasher: Sha256,
    bytes: u64
}

impl Verifier {
    pub fn new() -> Verifier {
        Verifier::default()
    }

    /// Hashes everything `reader` yields until EOF. Bytes read before an
    /// error stay counted.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized
    {
        let mut buf = vec![0; READ_BUF];
        let mut count = 0;

        loop {
            match reader.read(&mut buf).await? {
                0 => break,
                n => {
                    self.hasher.update(&buf[..n]);
                    self.bytes += n as u64;
                    count += n as u64;
                }
            }
        }

        Ok(count)
    }

    pub fn finish(self) -> Received {
        Received {
            bytes: self.bytes,
            digest: hex::encode(self.hasher.finalize())
        }
    }
}

/// Dials `addr` and hashes the whole stream.
pub async fn receive(addr: SocketAddr) -> Result<Received, TransferError> {
    let mut stream = TcpStream::connect(addr).await.map_err(TransferError::Setup)?;
    let mut verifier = Verifier::new();
    verifier.read_from(&mut stream).await.map_err(TransferError::Receive)?;
    Ok(verifier.finish())
}

/// Outcome of a run that got past setup.
#[derive(Debug)]
pub struct Report {
    pub received: Received,
    /// Non-fatal failures: receive error, count and digest mismatches,
    /// then whatever the producer reported.
    pub failures: Vec<TransferError>
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Creates the zero file, serves it on loopback, receives and verifies it.
///
/// Setup failures return `Err`. The temp file and listener belong to this
/// call and are gone when it returns.
pub async fn run(config: &Config) -> Result<Report, TransferError> {
    let file = zero_file(config.size).map_err(TransferError::Setup)?;
    if let Some(len) = config.truncate_to {
        file.as_file().set_len(len).map_err(TransferError::Setup)?;
    }
    let source = file.reopen().map_err(TransferError::Setup)?;

    let listener = listen_local().await.map_err(TransferError::Setup)?;
    let addr = listener.local_addr().map_err(TransferError::Setup)?;
    tracing::info!(%addr, size = config.size, method = ?config.method, "serving zero file");

    let slot = serve(listener, source, config.size, config.method);

    let mut stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(err) => {
            slot.abort();
            return Err(TransferError::Setup(err));
        }
    };
    let mut verifier = Verifier::new();
    let mut failures = Vec::new();

    if let Err(err) = verifier.read_from(&mut stream).await {
        failures.push(TransferError::Receive(err));
    }
    drop(stream);

    let received = verifier.finish();
    failures.extend(received.check(config.size, &config.digest_oracle()));

    if let Some(err) = slot.drain().await {
        failures.push(err);
    }

    if failures.is_empty() {
        tracing::info!(bytes = received.bytes, digest = %received.digest, "transfer verified");
    } else {
        tracing::warn!(failures = failures.len(), bytes = received.bytes, "transfer failed verification");
    }

    Ok(Report { received, failures })
}
