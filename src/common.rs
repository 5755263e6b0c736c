use std::io;


/// Maps a libc return value to `io::Result`, reading `errno` on `-1`.
pub fn cvt(ret: libc::ssize_t) -> io::Result<usize> {
    match ret {
        -1 => Err(io::Error::last_os_error()),
        n => Ok(n as usize)
    }
}

/// Errors meaning "this descriptor pair cannot do sendfile", as opposed to
/// a real transport failure.
pub fn is_unsupported(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EINVAL) | Some(libc::ENOSYS) | Some(libc::EOPNOTSUPP)
    ) || err.raw_os_error() == Some(libc::ENOTSUP)
}
