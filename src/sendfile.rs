use std::{ fs, io, future };
use std::ops::{ Bound, RangeBounds };
use std::os::unix::io::{ AsRawFd, RawFd };
use std::task::{ ready, Context, Poll };
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::net::{ tcp, unix, TcpStream, UnixStream };
#[cfg(any(target_os = "linux", target_os = "android"))]
use crate::common::cvt;


/// Largest byte count handed to a single `sendfile` call.
pub const MAX_CHUNK: usize = 4 << 20;

/// A non-blocking descriptor, registered with the tokio reactor, that
/// `sendfile(2)` can write into.
pub trait SendfileTarget {
    /// Waits for write readiness and issues one `sendfile` of at most `len`
    /// bytes from `file` starting at `*offset`. The kernel advances
    /// `offset` by the returned count.
    fn poll_sendfile(
        &self,
        cx: &mut Context<'_>,
        file: RawFd,
        offset: &mut libc::off_t,
        len: usize
    )
        -> Poll<io::Result<usize>>;
}

impl<T: SendfileTarget + ?Sized> SendfileTarget for &T {
    fn poll_sendfile(&self, cx: &mut Context<'_>, file: RawFd, offset: &mut libc::off_t, len: usize)
        -> Poll<io::Result<usize>>
    {
        (**self).poll_sendfile(cx, file, offset, len)
    }
}

impl<T: AsRawFd> SendfileTarget for AsyncFd<T> {
    fn poll_sendfile(&self, cx: &mut Context<'_>, file: RawFd, offset: &mut libc::off_t, len: usize)
        -> Poll<io::Result<usize>>
    {
        loop {
            let mut guard = ready!(self.poll_write_ready(cx))?;

            match guard.try_io(|inner| sendfile_imp(
                inner.get_ref().as_raw_fd(),
                file,
                offset,
                len
            )) {
                Ok(ret) => return Poll::Ready(ret),
                Err(_would_block) => continue
            }
        }
    }
}

macro_rules! stream_target {
    ( $( $ty:ty ),* ) => {
        $(
            impl SendfileTarget for $ty {
                fn poll_sendfile(
                    &self,
                    cx: &mut Context<'_>,
                    file: RawFd,
                    offset: &mut libc::off_t,
                    len: usize
                )
                    -> Poll<io::Result<usize>>
                {
                    loop {
                        ready!(self.poll_write_ready(cx))?;

                        match self.try_io(Interest::WRITABLE, || sendfile_imp(
                            self.as_raw_fd(),
                            file,
                            offset,
                            len
                        )) {
                            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                            ret => return Poll::Ready(ret)
                        }
                    }
                }
            }
        )*
    }
}

stream_target!(TcpStream, UnixStream);

impl SendfileTarget for tcp::OwnedWriteHalf {
    fn poll_sendfile(&self, cx: &mut Context<'_>, file: RawFd, offset: &mut libc::off_t, len: usize)
        -> Poll<io::Result<usize>>
    {
        let stream: &TcpStream = self.as_ref();
        stream.poll_sendfile(cx, file, offset, len)
    }
}

impl SendfileTarget for unix::OwnedWriteHalf {
    fn poll_sendfile(&self, cx: &mut Context<'_>, file: RawFd, offset: &mut libc::off_t, len: usize)
        -> Poll<io::Result<usize>>
    {
        let stream: &UnixStream = self.as_ref();
        stream.poll_sendfile(cx, file, offset, len)
    }
}

/// Sends `range` of `fd` to `writer` with `sendfile(2)`.
///
/// An unbounded end means "to the end of the file as it is now". The file's
/// own read position is not used and not moved. A short count without error
/// means the file ended early.
pub async fn sendfile<W, R>(writer: &W, fd: &fs::File, range: R)
    -> io::Result<usize>
where
    W: SendfileTarget + ?Sized,
    R: RangeBounds<usize>
{
    let offset = match range.start_bound() {
        Bound::Included(&x) => x,
        Bound::Excluded(&x) => x.checked_add(1).ok_or_else(range_overflow)?,
        Bound::Unbounded => 0
    };

    let len = match range.end_bound() {
        Bound::Excluded(&y) => y.saturating_sub(offset),
        Bound::Included(&y) => y.checked_add(1).ok_or_else(range_overflow)?.saturating_sub(offset),
        Bound::Unbounded => (fd.metadata()?.len() as usize).saturating_sub(offset)
    };

    let mut offset = offset as libc::off_t;
    send_range(writer, fd.as_raw_fd(), &mut offset, len).await
}

fn range_overflow() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "sendfile range bound overflows usize")
}

/// Loops `sendfile` until `len` bytes moved or the file hits EOF. `offset`
/// tracks progress even when an error is returned.
pub(crate) async fn send_range<W>(
    writer: &W,
    fd: RawFd,
    offset: &mut libc::off_t,
    len: usize
)
    -> io::Result<usize>
where
    W: SendfileTarget + ?Sized
{
    let mut count = 0;

    while len > count {
        let chunk = (len - count).min(MAX_CHUNK);

        match future::poll_fn(|cx| writer.poll_sendfile(cx, fd, offset, chunk)).await? {
            0 => break,
            n => count += n
        }
    }

    Ok(count)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn sendfile_imp(writer: RawFd, reader: RawFd, offset: &mut libc::off_t, len: usize)
    -> io::Result<usize>
{
    cvt(unsafe { libc::sendfile(writer, reader, offset, len) })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn sendfile_imp(_writer: RawFd, _reader: RawFd, _offset: &mut libc::off_t, _len: usize)
    -> io::Result<usize>
{
    Err(io::Error::from_raw_os_error(libc::ENOSYS))
}
