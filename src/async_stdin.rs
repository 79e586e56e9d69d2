// tokio::io::stdin hands reads off to a blocking thread, which keeps the
// process alive after we're done. registering fd 0 with the reactor lets us
// wait for readiness and only read once something is there.
struct RawStdin {
    fd: std::os::unix::io::RawFd,
}

impl std::io::Read for RawStdin {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::stdin().lock().read(buf)
    }
}

impl mio::Evented for RawStdin {
    fn register(
        &self,
        poll: &mio::Poll,
        token: mio::Token,
        interest: mio::Ready,
        opts: mio::PollOpt,
    ) -> std::io::Result<()> {
        mio::unix::EventedFd(&self.fd).register(poll, token, interest, opts)
    }

    fn reregister(
        &self,
        poll: &mio::Poll,
        token: mio::Token,
        interest: mio::Ready,
        opts: mio::PollOpt,
    ) -> std::io::Result<()> {
        mio::unix::EventedFd(&self.fd).reregister(poll, token, interest, opts)
    }

    fn deregister(&self, poll: &mio::Poll) -> std::io::Result<()> {
        mio::unix::EventedFd(&self.fd).deregister(poll)
    }
}

pub struct Stdin {
    input: tokio::reactor::PollEvented2<RawStdin>,
}

impl Stdin {
    pub fn new() -> Self {
        Self {
            input: tokio::reactor::PollEvented2::new(RawStdin { fd: 0 }),
        }
    }
}

impl std::io::Read for Stdin {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl tokio::io::AsyncRead for Stdin {
    fn poll_read(
        &mut self,
        buf: &mut [u8],
    ) -> std::result::Result<futures::Async<usize>, tokio::io::Error> {
        let ready = mio::Ready::readable();
        if let futures::Async::NotReady =
            self.input.poll_read_ready(ready)?
        {
            return Ok(futures::Async::NotReady);
        }

        // a single read per readiness event, since a second read could
        // block. a keypress or paste fits comfortably in one buffer.
        let res = self.input.poll_read(buf);
        self.input.clear_read_ready(ready)?;
        res
    }
}
