pub use self::pipe::Awakener;

/// Default awakener backed by a pipe
mod pipe {
    use crate::driver::sys::linux;
    use log::trace;
    use std::io::{self, Read, Write};
    use std::os::unix::io::{AsRawFd, RawFd};

    /*
     *
     * ===== Awakener =====
     *
     */

    /// Cross-thread signal that interrupts a blocked [`Poll`] wait.
    ///
    /// Any number of threads may call [`wakeup`] concurrently. Signals are
    /// buffered in the pipe until the waiting side drains them, so a signal
    /// raised before the wait begins still ends that wait. Several signals
    /// coalesce into at least one wakeup; once the pipe is full further
    /// signals are dropped because one is already pending.
    ///
    /// [`Poll`]: ../struct.Poll.html
    /// [`wakeup`]: #method.wakeup
    #[derive(Debug)]
    pub struct Awakener {
        reader: linux::Io,
        writer: linux::Io,
    }

    impl Awakener {
        pub fn new() -> io::Result<Awakener> {
            let (rd, wr) = linux::pipe()?;

            Ok(Awakener {
                reader: rd,
                writer: wr,
            })
        }

        /// Signals the awakener. Never blocks.
        pub fn wakeup(&self) -> io::Result<()> {
            loop {
                match (&self.writer).write(&[1]) {
                    Ok(_) => return Ok(()),
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    // pipe full: a wakeup is already pending
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
        }

        /// Consumes all pending signals.
        pub fn cleanup(&self) {
            let mut buf = [0; 128];
            let mut drained = 0;

            loop {
                // Consume data until all bytes are purged
                match (&self.reader).read(&mut buf) {
                    Ok(i) if i > 0 => drained += i,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    _ => break,
                }
            }

            trace!("awakener drained {} pending signals", drained);
        }

        /// The descriptor that turns readable while a signal is pending.
        pub(crate) fn fd(&self) -> RawFd {
            self.reader.as_raw_fd()
        }
    }

    impl AsRawFd for Awakener {
        fn as_raw_fd(&self) -> RawFd {
            self.fd()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Awakener;
    use std::io;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn cleanup_drains_every_signal() {
        let awakener = Awakener::new().unwrap();
        for _ in 0..1000 {
            awakener.wakeup().unwrap();
        }
        awakener.cleanup();

        let mut buf = [0u8; 1];
        let rc = unsafe { libc::read(awakener.as_raw_fd(), buf.as_mut_ptr() as *mut _, 1) };
        assert_eq!(rc, -1);
        assert_eq!(
            io::Error::last_os_error().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn full_pipe_is_not_an_error() {
        let awakener = Awakener::new().unwrap();
        // Linux pipes hold 64 KiB by default.
        for _ in 0..(128 * 1024) {
            awakener.wakeup().unwrap();
        }
        awakener.cleanup();
    }
}
