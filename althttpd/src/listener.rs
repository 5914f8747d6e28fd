//! Accept loops for the two ways this server gets a connection: binding a
//! socket directly (standalone mode) or inheriting one already attached to
//! stdin/stdout (super-server / inetd-style mode).
//!
//! Grounded on the teacher's `servente_http1::start`: bind, loop `accept`,
//! spawn one task per connection, and back off with `task::yield_now` on
//! `EMFILE` instead of busy-looping a fatal-looking error message forever.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use althttpd_config::Family;
use socket2::{Domain, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::task;

use crate::pipeline;
use crate::server_config::ServerConfig;

/// §4.10's "very coarse admission control under load": above this many
/// live connections, the accept loop sleeps `(count - SOFT_CAP)` seconds
/// before taking the next one, rather than refusing it outright.
const SOFT_CAP: usize = 50;

/// Strips the `::ffff:`-prefixed IPv4-mapped-IPv6 form a dual-stack listener
/// can report for an IPv4 peer (§3 "remote_addr").
fn peer_addr(stream: &TcpStream) -> String {
    stream
        .peer_addr()
        .map(|addr| pipeline::strip_ipv4_mapped(&addr.ip().to_string()))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Builds the listening socket for `--family`, using `socket2` directly
/// (rather than `TcpListener::bind`'s string-address parsing) so `Any` can
/// explicitly clear `IPV6_V6ONLY` and serve both address families on one
/// socket, matching what a bare `bind(::, 0)` gives a C server for free.
fn bind_listener(config: &ServerConfig) -> std::io::Result<TcpListener> {
    let (domain, addr): (Domain, SocketAddr) = match config.family {
        Family::Ipv4 => (Domain::IPV4, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.default_port).into()),
        Family::Ipv6 => (Domain::IPV6, SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, config.default_port, 0, 0).into()),
        Family::Any => (Domain::IPV6, SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, config.default_port, 0, 0).into()),
    };

    let socket = Socket::new(domain, Type::STREAM, None)?;
    if config.family == Family::Any {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// Binds `--port` and serves connections until the process is killed. Each
/// accepted connection gets its own task (the async analogue of the
/// original's fork-per-connection model), so one slow client never blocks
/// another's request.
pub async fn run_standalone(config: Arc<ServerConfig>) -> std::io::Result<()> {
    let listener = bind_listener(&config)?;
    tracing::info!(port = config.default_port, family = ?config.family, "listening");

    let live_connections = Arc::new(AtomicUsize::new(0));

    loop {
        let count = live_connections.load(Ordering::Relaxed);
        if count > SOFT_CAP {
            tracing::warn!(count, "live connection count over soft cap, throttling accept loop");
            tokio::time::sleep(Duration::from_secs((count - SOFT_CAP) as u64)).await;
        }

        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                #[cfg(unix)]
                if err.raw_os_error() == Some(EMFILE) {
                    task::yield_now().await;
                    continue;
                }
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };

        let remote_addr = peer_addr(&stream);
        let config = Arc::clone(&config);
        let live_connections = Arc::clone(&live_connections);
        live_connections.fetch_add(1, Ordering::Relaxed);
        task::spawn(async move {
            pipeline::serve_connection(stream, &config, remote_addr).await;
            live_connections.fetch_sub(1, Ordering::Relaxed);
        });
    }
}

/// `EMFILE` (too many open files), the one `accept` failure worth retrying
/// rather than logging and moving on (§9 design note, mirroring the
/// teacher's own `servente_common::platform::unix::ERRNO_EMFILE` check).
#[cfg(unix)]
const EMFILE: i32 = 24;

/// Serves exactly one connection already wired to this process's stdin and
/// stdout (the `inetd`/`xinetd`-launched form, §5 "Super-server mode"), then
/// returns once that connection closes.
pub async fn run_super_server(config: Arc<ServerConfig>) {
    let stream = StdioStream { stdin: tokio::io::stdin(), stdout: tokio::io::stdout() };
    pipeline::serve_connection(stream, &config, "stdio".to_string()).await;
}

/// Glues together `tokio::io::{Stdin, Stdout}` into one `AsyncRead +
/// AsyncWrite` value so [`pipeline::serve_connection`] can treat it exactly
/// like a `TcpStream`.
struct StdioStream {
    stdin: tokio::io::Stdin,
    stdout: tokio::io::Stdout,
}

impl tokio::io::AsyncRead for StdioStream {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.stdin).poll_read(cx, buf)
    }
}

impl tokio::io::AsyncWrite for StdioStream {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.stdout).poll_write(cx, buf)
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.stdout).poll_flush(cx)
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.stdout).poll_shutdown(cx)
    }
}
