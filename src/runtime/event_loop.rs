//! mio event loop driving one connection at a time.
//!
//! Readiness-based model: poll tells us when the listener or the active
//! connection is ready, then we perform non-blocking syscalls. Uses epoll
//! on Linux, kqueue on macOS.

use std::io;
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::protocol::{self, Exchange};
use crate::runtime::sock::LineSock;
use crate::runtime::task::{Step, Task};

const LISTENER: Token = Token(0);
const CONNECTION: Token = Token(1);

/// Accept backlog; arrivals beyond the active connection wait here.
const BACKLOG: i32 = 8;

/// The single accepted connection with its socket and task.
#[derive(Debug)]
struct Active {
    stream: TcpStream,
    sock: LineSock,
    task: Task<Exchange>,
    peer: SocketAddr,
}

/// Single-threaded server: listening while `active` is `None`, servicing
/// otherwise.
#[derive(Debug)]
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    capacity: usize,
    active: Option<Active>,
}

impl Server {
    /// Bind the listening endpoint and set up the poller.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = create_listener(addr)?;
        let mut listener = TcpListener::from_std(listener);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Self {
            poll,
            listener,
            capacity: config.capacity,
            active: None,
        })
    }

    /// Address the listener actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until the process is terminated.
    pub fn run(&mut self) -> io::Result<()> {
        info!(
            addr = %self.local_addr()?,
            capacity = self.capacity,
            "listening"
        );

        let mut events = Events::with_capacity(64);

        loop {
            self.poll.poll(&mut events, None)?;

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.try_accept()?,
                    CONNECTION => self.drive(event)?,
                    Token(_) => {}
                }
            }
        }
    }

    /// Accept one connection when idle. While servicing, arrivals stay in
    /// the kernel backlog until the current connection terminates.
    fn try_accept(&mut self) -> io::Result<()> {
        if self.active.is_some() {
            trace!("arrival while servicing; left queued");
            return Ok(());
        }

        let (mut stream, peer) = match self.listener.accept() {
            Ok(pair) => pair,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e),
        };

        // A fresh socket reports writable right away, so the first poll
        // wakeup drives the greeting.
        self.poll.registry().register(
            &mut stream,
            CONNECTION,
            Interest::READABLE | Interest::WRITABLE,
        )?;

        debug!(peer = %peer, "accepted");

        self.active = Some(Active {
            stream,
            sock: LineSock::new(self.capacity),
            task: Task::start(),
            peer,
        });

        Ok(())
    }

    /// Drive the active task exactly once for one readiness event.
    fn drive(&mut self, event: &mio::event::Event) -> io::Result<()> {
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return Ok(()),
        };

        if event.is_error() {
            debug!(peer = %active.peer, "transport error");
            return self.teardown();
        }

        let peer = active.peer;
        let Active {
            stream, sock, task, ..
        } = active;

        let outcome = task.advance(|point| protocol::step(point, &mut *sock, &mut *stream));
        match outcome {
            Ok(Step::Pending) => Ok(()),
            Ok(Step::Complete) => {
                debug!(peer = %peer, captured = sock.data_len(), "exchange finished");
                self.teardown()
            }
            Err(e) => {
                debug!(peer = %peer, error = %e, "connection lost");
                self.teardown()
            }
        }
    }

    /// Discard the active binding unconditionally and return to listening.
    /// Always re-attempts accept: a queued arrival's readiness edge may
    /// already have been consumed while servicing.
    fn teardown(&mut self) -> io::Result<()> {
        if let Some(mut active) = self.active.take() {
            let _ = self.poll.registry().deregister(&mut active.stream);
        }
        self.try_accept()
    }
}

/// Build the std listener with socket2: reuse-address, non-blocking, small
/// explicit backlog.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}
