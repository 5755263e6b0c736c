use std::{ fs, io };
use std::io::{ Seek, SeekFrom };
use std::os::unix::io::AsRawFd;
use std::pin::Pin;
use std::task::{ Context, Poll };
use tokio::io::{ AsyncWrite, DuplexStream };
use tokio::net::{ tcp, unix, TcpStream, UnixStream };
use crate::common::is_unsupported;
use crate::sendfile::{ send_range, SendfileTarget };


/// How the bytes of a [`copy_file`] call actually moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// In-kernel `sendfile(2)`.
    Sendfile,
    /// Read into a user-space buffer, then write.
    Buffered
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub bytes: u64,
    pub method: Method
}

/// An async byte sink that may expose a faster way to take bytes from a
/// file than the generic read/write loop.
///
/// Every implementor gets the buffered path. Destinations backed by a
/// socket descriptor return themselves from `sendfile_target` so
/// [`copy_file`] can hand the transfer to the kernel.
pub trait CopyFile: AsyncWrite + Unpin + Send {
    fn sendfile_target(&self) -> Option<&(dyn SendfileTarget + Sync)> {
        None
    }
}

macro_rules! sendfile_capable {
    ( $( $ty:ty ),* ) => {
        $(
            impl CopyFile for $ty {
                fn sendfile_target(&self) -> Option<&(dyn SendfileTarget + Sync)> {
                    Some(self)
                }
            }
        )*
    }
}

sendfile_capable!(TcpStream, UnixStream, tcp::OwnedWriteHalf, unix::OwnedWriteHalf);

impl CopyFile for Vec<u8> {}
impl CopyFile for DuplexStream {}

impl<W: CopyFile + ?Sized> CopyFile for &mut W {
    fn sendfile_target(&self) -> Option<&(dyn SendfileTarget + Sync)> {
        (**self).sendfile_target()
    }
}

/// Hides any fast path of the wrapped writer, forcing the buffered copy.
#[derive(Debug)]
pub struct Buffered<W>(pub W);

impl<W> Buffered<W> {
    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for Buffered<W> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8])
        -> Poll<io::Result<usize>>
    {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_write_vectored(mut self: Pin<&mut Self>, cx: &mut Context<'_>, bufs: &[io::IoSlice<'_>])
        -> Poll<io::Result<usize>>
    {
        Pin::new(&mut self.0).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.0.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

impl<W: AsyncWrite + Unpin + Send> CopyFile for Buffered<W> {}

/// Copies `file` from its current read position to EOF into `writer`.
///
/// On return the file position sits right after the last byte sent. The
/// writer is flushed but not shut down.
pub async fn copy_file<W>(file: &mut fs::File, writer: &mut W) -> io::Result<u64>
where
    W: CopyFile + ?Sized
{
    copy_file_report(file, writer).await
        .map(|report| report.bytes)
}

/// Same as [`copy_file`], also telling which path carried the bytes.
pub async fn copy_file_report<W>(file: &mut fs::File, writer: &mut W)
    -> io::Result<CopyReport>
where
    W: CopyFile + ?Sized
{
    if let Some(target) = writer.sendfile_target() {
        if let Some(bytes) = try_sendfile(target, file).await? {
            tracing::debug!(bytes, method = ?Method::Sendfile, "file copied");
            return Ok(CopyReport { bytes, method: Method::Sendfile });
        }
    }

    let bytes = buffered_copy(file, writer).await?;
    tracing::debug!(bytes, method = ?Method::Buffered, "file copied");
    Ok(CopyReport { bytes, method: Method::Buffered })
}

/// Runs the kernel path. `None` hands the whole copy to the buffered loop,
/// either because the source cannot be addressed by offset or because the
/// kernel refused before any byte moved.
async fn try_sendfile(target: &(dyn SendfileTarget + Sync), file: &mut fs::File)
    -> io::Result<Option<u64>>
{
    let start = match file.stream_position() {
        Ok(pos) => pos,
        Err(ref err) if err.raw_os_error() == Some(libc::ESPIPE) => {
            tracing::debug!("source is not seekable, using buffered copy");
            return Ok(None)
        },
        Err(err) => return Err(err)
    };

    // procfs and sysfs report 0 for files that do have content, so only a
    // non-empty regular file has a length worth trusting
    let metadata = file.metadata()?;
    if !metadata.is_file() || metadata.len() == 0 {
        tracing::debug!(len = metadata.len(), "source length unknown, using buffered copy");
        return Ok(None);
    }

    let len = metadata.len().saturating_sub(start);
    let mut offset = start as libc::off_t;

    let ret = send_range(target, file.as_raw_fd(), &mut offset, len as usize).await;
    let moved = (offset as u64).saturating_sub(start);

    match ret {
        // nothing went out yet, the buffered loop can still take over
        Err(ref err) if moved == 0 && is_unsupported(err) => {
            tracing::debug!(error = %err, "sendfile unavailable, using buffered copy");
            Ok(None)
        },
        ret => {
            let seeked = file.seek(SeekFrom::Start(start + moved));
            let bytes = ret? as u64;
            seeked?;
            Ok(Some(bytes))
        }
    }
}

async fn buffered_copy<W>(file: &fs::File, writer: &mut W) -> io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized
{
    // the duplicate shares the open file description, so reads advance
    // the caller's position too
    let mut reader = tokio::fs::File::from_std(file.try_clone()?);
    tokio::io::copy(&mut reader, writer).await
}
