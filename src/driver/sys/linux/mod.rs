use libc::{self, c_int};

mod awakener;
pub(crate) mod epoll;
mod io;
mod ready;

pub use self::awakener::Awakener;
pub use self::epoll::Selector;
pub use self::io::Io;
pub use self::ready::{UnixReady, READY_ALL};

use std::os::unix::io::FromRawFd;

/// Opens a pipe whose ends are both non-blocking and close-on-exec.
///
/// `pipe2` sets the flags atomically, so a concurrently forking thread can
/// never inherit a descriptor that lacks `O_CLOEXEC`.
pub fn pipe() -> std::io::Result<(Io, Io)> {
    let mut pipes: [c_int; 2] = [0; 2];
    unsafe {
        cvt(libc::pipe2(
            pipes.as_mut_ptr(),
            libc::O_NONBLOCK | libc::O_CLOEXEC,
        ))?;
        Ok((Io::from_raw_fd(pipes[0]), Io::from_raw_fd(pipes[1])))
    }
}

pub(crate) trait IsMinusOne {
    fn is_minus_one(&self) -> bool;
}

impl IsMinusOne for i32 {
    fn is_minus_one(&self) -> bool {
        *self == -1
    }
}
impl IsMinusOne for isize {
    fn is_minus_one(&self) -> bool {
        *self == -1
    }
}

pub(crate) fn cvt<T: IsMinusOne>(t: T) -> std::io::Result<T> {
    use std::io;

    if t.is_minus_one() {
        Err(io::Error::last_os_error())
    } else {
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn pipe_is_nonblocking() {
        let (mut rd, mut wr) = pipe().unwrap();
        let mut buf = [0u8; 4];
        let err = rd.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);

        wr.write_all(b"ok").unwrap();
        assert_eq!(rd.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ok");
    }

    #[test]
    fn cvt_maps_minus_one() {
        assert!(cvt(-1i32).is_err());
        assert_eq!(cvt(7isize).unwrap(), 7);
    }
}
