//! TCP server the turnstiles connect to.
//!
//! With online validation enabled, a Henry turnstile opens a connection for
//! every access attempt, sends one event line and waits a few seconds for a
//! single verdict byte. The [`BridgeServer`] answers each connection on its
//! own task.
//!
//! # Architecture
//!
//! ```text
//! Turnstile 01 ┐
//!              │                 ┌─> BridgeCodec (line framing)
//! Turnstile 02 ├──> BridgeServer ┤
//!              │                 └─> Decider ──(HTTP)──> academy backend
//! Turnstile 15 ┘
//! ```
//!
//! # Fail-closed
//!
//! Whatever happens inside the pipeline (timeout, malformed line, backend
//! outage, panic) the connection ends in [`respond`], which writes exactly
//! one byte. Only an explicit grant from the decider produces `0x01`.
//!
//! # Timing
//!
//! - the line must arrive within `frame_timeout` of the accept
//! - the decision must arrive within `decision_timeout` of the line; the
//!   bridge enforces this itself, whatever the decider does
//! - the verdict write is bounded by `write_timeout`

use futures::{FutureExt, SinkExt, StreamExt};
use henry_core::{Error, Verdict};
use henry_decision::{CheckInRequest, Decider, Decision, DecisionError};
use henry_protocol::{BridgeCodec, RawFrame};
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Duration, timeout, timeout_at};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::{BridgeConfig, millis},
    error::BridgeError,
    session::{ConnectionState, Session},
    stats::{BridgeStats, StatsSnapshot},
};

/// Shared, read-only state handed to every connection task.
struct ConnectionContext<D> {
    config: Arc<BridgeConfig>,
    decider: Arc<D>,
    stats: Arc<BridgeStats>,
}

impl<D> Clone for ConnectionContext<D> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            decider: Arc::clone(&self.decider),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// TCP server bridging turnstiles to a [`Decider`].
///
/// # Connection Lifecycle
///
/// 1. Bind with `bind()`; a bind failure is fatal
/// 2. Serve with `run_until()` until the shutdown future completes
/// 3. In-flight connections are drained before `run_until()` returns
///
/// # Example
///
/// ```no_run
/// use henry_network::{BridgeConfig, BridgeServer};
/// # use henry_decision::HttpDecisionClient;
/// use std::sync::Arc;
///
/// # async fn example(decider: HttpDecisionClient) -> Result<(), Box<dyn std::error::Error>> {
/// let config = BridgeConfig::new(
///     "0.0.0.0:3000".parse()?,
///     "3f1c2a9e-7a43-4a57-9d7c-1d5e9a4b2c10".parse()?,
/// );
/// let server = BridgeServer::bind(config, Arc::new(decider)).await?;
/// println!("listening on {}", server.local_addr()?);
/// # Ok(())
/// # }
/// ```
pub struct BridgeServer<D> {
    /// TCP listener for accepting device connections
    listener: TcpListener,

    /// Shared per-connection context
    context: ConnectionContext<D>,
}

impl<D: Decider + 'static> BridgeServer<D> {
    /// Validate the configuration and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the configuration is invalid (`BridgeError::InvalidConfig`)
    /// - the address is in use or not permitted (`BridgeError::BindFailed`)
    pub async fn bind(config: BridgeConfig, decider: Arc<D>) -> Result<Self, BridgeError> {
        config.validate()?;

        info!("Binding bridge to {}", config.bind_addr);
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| BridgeError::BindFailed {
                addr: config.bind_addr,
                source,
            })?;

        info!(
            addr = %listener.local_addr()?,
            frame_timeout_ms = millis(config.frame_timeout),
            decision_timeout_ms = millis(config.decision_timeout),
            device_window_ms = millis(config.device_window),
            connection_deadline_ms = millis(config.connection_deadline()),
            time_zone = %config.time_zone,
            unit = %config.unit_id,
            "Bridge listening"
        );

        Ok(Self {
            listener,
            context: ConnectionContext {
                config: Arc::new(config),
                decider,
                stats: Arc::new(BridgeStats::new()),
            },
        })
    }

    /// Address the listener is bound to (resolves port `0`).
    ///
    /// # Errors
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Counters shared with the connection tasks.
    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.context.stats)
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// On shutdown the listener is closed, connections still waiting for
    /// their line are answered with a deny, and every in-flight connection is
    /// drained before returning.
    ///
    /// # Errors
    ///
    /// Accept errors are logged and do not stop the server; the result is
    /// currently always `Ok`.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<StatsSnapshot, BridgeError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut join_set = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                res = self.listener.accept() => match res {
                    Ok((stream, peer)) => {
                        let context = self.context.clone();
                        let rx = shutdown_rx.clone();
                        join_set.spawn(handle_connection(stream, peer, context, rx));
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                Some(res) = join_set.join_next(), if !join_set.is_empty() => {
                    log_task_result(res);
                }
            }
        }

        drop(self.listener);
        let _ = shutdown_tx.send(true);

        let in_flight = join_set.len();
        if in_flight > 0 {
            info!(in_flight, "Draining in-flight connections");
        }
        while let Some(res) = join_set.join_next().await {
            log_task_result(res);
        }

        let snapshot = self.context.stats.snapshot();
        info!(
            accepted = snapshot.accepted,
            granted = snapshot.granted,
            denied = snapshot.denied,
            malformed = snapshot.malformed,
            frame_timeouts = snapshot.frame_timeouts,
            decision_timeouts = snapshot.decision_timeouts,
            backend_failures = snapshot.backend_failures,
            faults = snapshot.faults,
            "Bridge stopped"
        );
        Ok(snapshot)
    }
}

fn log_task_result(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        error!("Connection task failed: {}", e);
    }
}

/// Serve one device connection from accept to close.
async fn handle_connection<D: Decider>(
    stream: TcpStream,
    peer: SocketAddr,
    context: ConnectionContext<D>,
    shutdown: watch::Receiver<bool>,
) {
    debug!(peer = %peer, "Accepted device connection");
    context.stats.connection_opened();

    // Verdict must leave as soon as it is written.
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
    }

    let codec = BridgeCodec::with_max_frame_len(context.config.max_frame_len);
    let mut framed = Framed::new(stream, codec);
    let mut session = Session::new(peer);

    let pipeline = AssertUnwindSafe(resolve(&mut framed, &mut session, &context, shutdown));
    let verdict = match pipeline.catch_unwind().await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            error!(peer = %peer, state = %session.state(), error = %e, "Connection pipeline failed");
            session.fault();
            Verdict::Deny
        }
        Err(panic) => {
            error!(
                peer = %peer,
                state = %session.state(),
                panic = panic_message(panic.as_ref()),
                "Connection pipeline panicked"
            );
            session.fault();
            Verdict::Deny
        }
    };

    respond(&mut framed, verdict, peer, context.config.write_timeout).await;
    context.stats.connection_closed(session.state(), verdict);

    trace!(
        peer = %peer,
        state = %session.state(),
        verdict = %verdict,
        elapsed_ms = millis(session.accepted_at().elapsed()),
        "Connection closed"
    );
}

/// Drive the session from `AwaitingFrame` to a terminal state and return the
/// verdict to send.
async fn resolve<T, D>(
    framed: &mut Framed<T, BridgeCodec>,
    session: &mut Session,
    context: &ConnectionContext<D>,
    shutdown: watch::Receiver<bool>,
) -> Result<Verdict, BridgeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    D: Decider,
{
    let config = &context.config;
    let peer = session.peer();

    // AwaitingFrame
    let next = tokio::select! {
        res = timeout(config.frame_timeout, framed.next()) => res,
        () = shutdown_requested(shutdown) => {
            debug!(peer = %peer, "Bridge shutting down before line arrived");
            session.enter(ConnectionState::DenyTimeout)?;
            return Ok(Verdict::Deny);
        }
    };
    let frame = match next {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(e))) if e.is_malformed() => {
            warn!(peer = %peer, raw = %buffered_preview(framed), error = %e, "Malformed frame");
            session.enter(ConnectionState::DenyMalformed)?;
            return Ok(Verdict::Deny);
        }
        Ok(Some(Err(e))) => {
            warn!(peer = %peer, raw = %buffered_preview(framed), error = %e, "Failed to read frame");
            session.enter(ConnectionState::DenyFault)?;
            return Ok(Verdict::Deny);
        }
        Ok(None) => {
            debug!(peer = %peer, "Device closed the connection without sending a line");
            session.enter(ConnectionState::DenyMalformed)?;
            return Ok(Verdict::Deny);
        }
        Err(_) => {
            let err = Error::FrameTimeout {
                timeout_ms: millis(config.frame_timeout),
            };
            warn!(peer = %peer, buffered = framed.read_buffer().len(), "{}", err);
            session.enter(ConnectionState::DenyTimeout)?;
            return Ok(Verdict::Deny);
        }
    };

    session.enter(ConnectionState::Decoding)?;
    let received_at = session
        .frame_received_at()
        .unwrap_or_else(tokio::time::Instant::now);
    trace!(peer = %peer, bytes = frame.size(), "Received line");

    let parsed = frame
        .parse(&config.layout)
        .and_then(|event| Ok((config.time_zone.resolve(event.timestamp)?, event)));
    let (timestamp, event) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(peer = %peer, raw = %frame.preview(), error = %e, "Malformed frame");
            session.enter(ConnectionState::DenyMalformed)?;
            return Ok(Verdict::Deny);
        }
    };

    let request = CheckInRequest::from_event(
        &event,
        timestamp,
        config.unit_id,
        config.device_id_for(peer),
    );

    session.enter(ConnectionState::Resolving)?;
    let decision = if event.credential.is_blank() {
        info!(
            peer = %peer,
            sequence = event.sequence_number(),
            "Blank credential, denying without consulting backend"
        );
        Decision::Skipped {
            reason: "blank credential",
        }
    } else {
        let deadline = received_at + config.decision_timeout;
        match timeout_at(deadline, context.decider.decide(&request)).await {
            Ok(decision) => decision,
            Err(_) => {
                let error = DecisionError::Timeout {
                    timeout_ms: millis(config.decision_timeout),
                };
                error!(
                    peer = %peer,
                    credential = %event.credential,
                    error = %error,
                    "Decision deadline exceeded, denying access"
                );
                Decision::Failed { error }
            }
        }
    };
    context.stats.decision_made(&decision);

    session.enter(ConnectionState::Responding)?;
    let verdict = decision.verdict();
    info!(
        peer = %peer,
        sequence = event.sequence_number(),
        credential = %event.credential,
        direction = %event.direction,
        outcome = decision.outcome(),
        verdict = %verdict,
        elapsed_ms = millis(received_at.elapsed()),
        "Access resolved"
    );
    Ok(verdict)
}

/// Write the verdict byte, flush and close the write side.
///
/// This is the single exit of every connection.
async fn respond<T>(
    framed: &mut Framed<T, BridgeCodec>,
    verdict: Verdict,
    peer: SocketAddr,
    write_timeout: Duration,
) where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let write = async {
        framed.send(verdict).await?;
        framed.get_mut().shutdown().await?;
        Ok::<_, Error>(())
    };

    match timeout(write_timeout, write).await {
        Ok(Ok(())) => trace!(peer = %peer, verdict = %verdict, "Verdict written"),
        Ok(Err(e)) => debug!(peer = %peer, verdict = %verdict, error = %e, "Failed to write verdict"),
        Err(_) => warn!(
            peer = %peer,
            "Verdict write timed out after {}ms",
            millis(write_timeout)
        ),
    }
}

/// Escaped, truncated view of the bytes the codec still holds.
fn buffered_preview<T>(framed: &Framed<T, BridgeCodec>) -> String {
    RawFrame::new(framed.read_buffer().clone().freeze()).preview()
}

/// Completes once shutdown has been signalled.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender dropped without signalling; never interrupt.
        std::future::pending::<()>().await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use henry_core::UnitId;
    use tokio::io::{AsyncReadExt, DuplexStream};

    struct BackendDown;

    impl Decider for BackendDown {
        async fn decide(&self, _request: &CheckInRequest) -> Decision {
            Decision::Failed {
                error: DecisionError::Network("unused".into()),
            }
        }
    }

    fn context() -> ConnectionContext<BackendDown> {
        let unit: UnitId = "3f1c2a9e-7a43-4a57-9d7c-1d5e9a4b2c10".parse().unwrap();
        ConnectionContext {
            config: Arc::new(
                BridgeConfig::new("127.0.0.1:0".parse().unwrap(), unit)
                    .with_frame_timeout(Duration::from_millis(200)),
            ),
            decider: Arc::new(BackendDown),
            stats: Arc::new(BridgeStats::new()),
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn run(input: &'static [u8]) -> (ConnectionState, Verdict, DuplexStream) {
        let (mut device, bridge) = tokio::io::duplex(1024);
        device.write_all(input).await.unwrap();

        let mut framed = Framed::new(bridge, BridgeCodec::new());
        let mut session = Session::new(peer());
        let (_tx, rx) = watch::channel(false);
        let verdict = resolve(&mut framed, &mut session, &context(), rx)
            .await
            .unwrap();
        respond(&mut framed, verdict, peer(), Duration::from_millis(100)).await;
        (session.state(), verdict, device)
    }

    #[tokio::test]
    async fn test_truncated_line_is_malformed() {
        let (state, verdict, mut device) =
            run(b"000001597[000[000001[05/01/2026 08:15:30[1[1}000[03\n").await;

        assert_eq!(state, ConnectionState::DenyMalformed);
        assert_eq!(verdict, Verdict::Deny);
        assert_eq!(device.read_u8().await.unwrap(), 0x00);
    }

    #[tokio::test]
    async fn test_blank_credential_skips_decider() {
        let (state, verdict, _) =
            run(b"000001597[000[                    [05/01/2026 08:15:30[1[1}000[03[0\n").await;

        assert_eq!(state, ConnectionState::Responding);
        assert_eq!(verdict, Verdict::Deny);
    }

    #[tokio::test]
    async fn test_failed_decision_denies() {
        let (state, verdict, _) =
            run(b"000001597[000[000001[05/01/2026 08:15:30[1[1}000[03[0\n").await;

        assert_eq!(state, ConnectionState::Responding);
        assert_eq!(verdict, Verdict::Deny);
    }

    #[tokio::test]
    async fn test_partial_line_then_close_is_malformed() {
        let (mut device, bridge) = tokio::io::duplex(1024);
        device
            .write_all(b"000001597[000[      000001        [05/01")
            .await
            .unwrap();
        device.shutdown().await.unwrap();

        let mut framed = Framed::new(bridge, BridgeCodec::new());
        let mut session = Session::new(peer());
        let (_tx, rx) = watch::channel(false);
        let verdict = resolve(&mut framed, &mut session, &context(), rx)
            .await
            .unwrap();

        assert_eq!(session.state(), ConnectionState::DenyMalformed);
        assert_eq!(verdict, Verdict::Deny);
        assert_eq!(
            buffered_preview(&framed),
            "000001597[000[      000001        [05/01"
        );

        respond(&mut framed, verdict, peer(), Duration::from_millis(100)).await;
        assert_eq!(device.read_u8().await.unwrap(), 0x00);
    }

    #[tokio::test]
    async fn test_runaway_line_is_malformed() {
        let (mut device, bridge) = tokio::io::duplex(1024);
        device.write_all(&[b'7'; 40]).await.unwrap();

        let mut framed = Framed::new(bridge, BridgeCodec::with_max_frame_len(16));
        let mut session = Session::new(peer());
        let (_tx, rx) = watch::channel(false);
        let verdict = resolve(&mut framed, &mut session, &context(), rx)
            .await
            .unwrap();

        assert_eq!(session.state(), ConnectionState::DenyMalformed);
        assert_eq!(verdict, Verdict::Deny);
        assert_eq!(buffered_preview(&framed), "7".repeat(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_times_out() {
        let (device, bridge) = tokio::io::duplex(64);
        let mut framed = Framed::new(bridge, BridgeCodec::new());
        let mut session = Session::new(peer());
        let (_tx, rx) = watch::channel(false);

        let verdict = resolve(&mut framed, &mut session, &context(), rx)
            .await
            .unwrap();

        assert_eq!(session.state(), ConnectionState::DenyTimeout);
        assert_eq!(verdict, Verdict::Deny);
        drop(device);
    }

    #[tokio::test]
    async fn test_shutdown_cuts_frame_wait() {
        let (_device, bridge) = tokio::io::duplex(64);
        let mut framed = Framed::new(bridge, BridgeCodec::new());
        let mut session = Session::new(peer());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let verdict = resolve(&mut framed, &mut session, &context(), rx)
            .await
            .unwrap();
        assert_eq!(session.state(), ConnectionState::DenyTimeout);
        assert_eq!(verdict, Verdict::Deny);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
