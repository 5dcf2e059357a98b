//! TCP accept loop with per-address connect limiting.

use std::{
    io,
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};

use tandem_core::{
    Environment,
    rate_limiter::{RateDecision, RateLimitConfig, WindowLimiter},
};
use tandem_proto::{ServerEvent, events::server::ErrorPayload};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::{actor::Command, codec, connection};

/// Shown to clients refused by the connect limit
pub const CONNECT_LIMIT_MESSAGE: &str = "Too many connections, please try again later";

/// Pause after a failed accept, so a full file table does not spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and hands each one to a connection task.
pub struct Listener<E>
where
    E: Environment,
{
    listener: TcpListener,
    env: E,
    limiter: WindowLimiter<IpAddr>,
    commands: mpsc::Sender<Command>,
    next_prune: Instant,
}

impl<E> Listener<E>
where
    E: Environment,
{
    /// Bind `addr`.
    ///
    /// # Errors
    ///
    /// Returns the bind error if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        env: E,
        connect_rate: RateLimitConfig,
        commands: mpsc::Sender<Command>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let next_prune = env.now() + connect_rate.window;

        Ok(Self { listener, env, limiter: WindowLimiter::new(connect_rate), commands, next_prune })
    }

    /// Address actually bound
    ///
    /// # Errors
    ///
    /// Returns error if the socket cannot report its address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(mut self) {
        info!(addr = ?self.listener.local_addr().ok(), "listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    self.env.sleep(ACCEPT_BACKOFF).await;
                    continue;
                },
            };

            if let RateDecision::Limited { retry_after } = self.admit(peer.ip()) {
                warn!(peer = %peer, retry_after = ?retry_after, "connect rate exceeded");
                tokio::spawn(refuse(stream, retry_after));
                continue;
            }

            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %e, "failed to set nodelay");
            }
            debug!(peer = %peer, "accepted");

            let (reader, writer) = stream.into_split();
            tokio::spawn(connection::serve(reader, writer, self.commands.clone()));
        }
    }

    fn admit(&mut self, ip: IpAddr) -> RateDecision {
        let now = self.env.now();

        if now >= self.next_prune {
            self.next_prune = now + self.limiter.config().window;
            let pruned = self.limiter.prune(now);
            if pruned > 0 {
                debug!(pruned, tracked = self.limiter.len(), "pruned connect limiter");
            }
        }

        self.limiter.check(ip, now)
    }
}

/// Tell a refused client when to come back, then close.
async fn refuse(mut stream: TcpStream, retry_after: Duration) {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    let event = ServerEvent::Error(ErrorPayload {
        message: CONNECT_LIMIT_MESSAGE.to_string(),
        retry_after: Some(secs),
    });

    match event.into_frame() {
        Ok(frame) => {
            if let Err(e) = codec::write_frame(&mut stream, &frame).await {
                debug!(error = %e, "failed to send refusal");
            }
        },
        Err(e) => warn!(error = %e, "failed to encode refusal"),
    }

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "shutdown failed");
    }
}
