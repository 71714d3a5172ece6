//! The connection engine: state, timers, and the single-task event loop
//! multiplexing socket I/O, timer expiry, out-of-band messages and child
//! exits.

pub(crate) mod dispatch;
pub(crate) mod exec;
pub(crate) mod stream;

pub use self::stream::ConnStateSnapshot;
pub use self::stream::LocalState;
pub use self::stream::RemoteState;
pub use self::stream::StreamSnapshot;

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::channel::mpsc;
use futures::channel::oneshot;
use futures::future::poll_fn;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::codec::queued_write::QueuedWrite;
use crate::conf::ServerConf;
use crate::conn::stream::HttpStream;
use crate::conn::stream::StreamMap;
use crate::handler::InfoMessage;
use crate::handler::StreamHandler;
use crate::handler::TerminateReason;
use crate::hpack;
use crate::misc::any_to_string;
use crate::net::socket::SocketStream;
use crate::wire::end_stream::EndStream;
use crate::wire::error_code::ErrorCode;
use crate::wire::frame::GoawayFrame;
use crate::wire::frame::HttpSettings;
use crate::wire::frame::RstStreamFrame;
use crate::wire::frame::SettingsFrame;
use crate::wire::frame::FRAME_HEADER_LEN;
use crate::wire::stream_id::StreamId;
use crate::wire::DEFAULT_SETTINGS;
use crate::Error;

const READ_CHUNK: usize = 8192;

/// Opaque timer identity. A fired timer whose handle no longer matches
/// the armed expectation is stale and silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    Preface,
    SettingsAck,
    Idle,
}

struct Timers {
    next_handle: u64,
    armed: Vec<(TimerHandle, Instant, TimerEvent)>,
}

impl Timers {
    fn new() -> Timers {
        Timers {
            next_handle: 1,
            armed: Vec::new(),
        }
    }

    fn arm(&mut self, after: Duration, event: TimerEvent) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.armed.push((handle, Instant::now() + after, event));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.retain(|(h, _, _)| *h != handle);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.armed.iter().map(|(_, deadline, _)| *deadline).min()
    }

    fn pop_due(&mut self, now: Instant) -> Option<(TimerHandle, TimerEvent)> {
        let index = self
            .armed
            .iter()
            .position(|(_, deadline, _)| *deadline <= now)?;
        let (handle, _, event) = self.armed.swap_remove(index);
        Some((handle, event))
    }
}

/// What the parser expects next, per the connection handshake and the
/// CONTINUATION rules. The preface states carry the preface timer.
pub(crate) enum ParseMode {
    PrefaceSequence(TimerHandle),
    PrefaceSettings(TimerHandle),
    Normal,
    Continuation {
        stream_id: StreamId,
        end_stream: EndStream,
        fragment: BytesMut,
    },
}

/// Message addressed to the connection itself.
pub(crate) enum ConnMsg {
    DumpState(oneshot::Sender<ConnStateSnapshot>),
    Shutdown,
}

/// Message routed through the connection loop.
pub(crate) enum LoopMsg {
    Conn(ConnMsg),
    Stream(StreamId, InfoMessage),
}

/// Why the connection is going down.
pub(crate) enum ConnEnd {
    /// Protocol violation: GOAWAY with the code, then close.
    ConnectionError(ErrorCode, Error),
    /// The transport failed; no further I/O is attempted.
    SocketError(Error),
    /// Clean shutdown: peer GOAWAY or local request.
    Stop,
}

pub(crate) type LoopResult<T> = Result<T, ConnEnd>;

enum LoopEvent {
    Read(io::Result<usize>),
    Timer,
    Msg(LoopMsg),
    ChannelClosed,
    ChildExit(u64, StreamId),
}

pub(crate) struct Conn<H: StreamHandler, I: SocketStream> {
    pub service: Arc<H>,
    read: ReadHalf<I>,
    pub queued_write: QueuedWrite<WriteHalf<I>>,
    pub peer_addr: SocketAddr,
    conf: ServerConf,

    /// Our settings last acknowledged by the peer.
    pub local_settings: HttpSettings,
    /// The peer's settings as last received.
    pub remote_settings: HttpSettings,
    /// Our settings sent and not yet acknowledged, oldest first.
    pending_local_settings: VecDeque<(TimerHandle, HttpSettings)>,

    pub read_buf: BytesMut,
    /// Minimum buffered bytes before the parser is worth retrying.
    pub parse_needs: usize,
    pub parse_mode: ParseMode,

    pub decoder: hpack::Decoder,
    pub encoder: hpack::Encoder,

    pub streams: StreamMap<H>,
    /// `(child id, abort handle, owning stream)` of registered workers.
    children: Vec<(u64, tokio::task::AbortHandle, StreamId)>,
    child_exits: FuturesUnordered<BoxFuture<'static, (u64, StreamId)>>,
    next_child_id: u64,

    /// Next server-initiated stream id for PUSH_PROMISE.
    pub next_push_stream_id: StreamId,
    /// Highest client stream id accepted so far.
    pub last_peer_stream_id: StreamId,

    timers: Timers,
    idle_timer: TimerHandle,

    loop_rx: mpsc::UnboundedReceiver<LoopMsg>,
    // keeps `loop_rx` open for the lifetime of the connection
    _loop_tx: mpsc::UnboundedSender<LoopMsg>,
}

impl<H, I> Conn<H, I>
where
    H: StreamHandler,
    I: SocketStream,
{
    fn new(
        socket: I,
        peer_addr: SocketAddr,
        conf: ServerConf,
        service: Arc<H>,
        loop_rx: mpsc::UnboundedReceiver<LoopMsg>,
        loop_tx: mpsc::UnboundedSender<LoopMsg>,
    ) -> Conn<H, I> {
        let (read, write) = tokio::io::split(socket);

        let mut timers = Timers::new();
        let preface_timer = timers.arm(
            Duration::from_millis(conf.preface_timeout_ms()),
            TimerEvent::Preface,
        );
        let idle_timer = timers.arm(
            Duration::from_millis(conf.idle_timeout_ms()),
            TimerEvent::Idle,
        );

        let mut conn = Conn {
            service,
            read,
            queued_write: QueuedWrite::new(write),
            peer_addr,
            conf,
            local_settings: DEFAULT_SETTINGS,
            remote_settings: DEFAULT_SETTINGS,
            pending_local_settings: VecDeque::new(),
            read_buf: BytesMut::new(),
            parse_needs: crate::wire::PREFACE.len(),
            parse_mode: ParseMode::PrefaceSequence(preface_timer),
            decoder: hpack::Decoder::new(),
            encoder: hpack::Encoder::new(),
            streams: StreamMap::new(),
            children: Vec::new(),
            child_exits: FuturesUnordered::new(),
            next_child_id: 1,
            next_push_stream_id: 2,
            last_peer_stream_id: 0,
            timers,
            idle_timer,
            loop_rx,
            _loop_tx: loop_tx,
        };

        conn.send_initial_settings();
        conn
    }

    /// The server half of the handshake: our SETTINGS frame goes out
    /// first, and its ack timer starts ticking.
    fn send_initial_settings(&mut self) {
        let settings = self.conf.http2_settings.unwrap_or(DEFAULT_SETTINGS);
        let frame = SettingsFrame::from_settings(settings.diff_from_default());
        self.queued_write.queue_not_goaway(frame);

        let timer = self.timers.arm(
            Duration::from_millis(self.conf.settings_timeout_ms()),
            TimerEvent::SettingsAck,
        );
        self.pending_local_settings.push_back((timer, settings));
    }

    /// The largest frame the peer may currently send us: our acked
    /// advertisement, or anything we have put on the wire and not yet
    /// seen acknowledged (the peer applies our SETTINGS before acking).
    pub fn recv_max_frame_size(&self) -> u32 {
        self.pending_local_settings
            .iter()
            .map(|(_, s)| s.max_frame_size)
            .chain(std::iter::once(self.local_settings.max_frame_size))
            .max()
            .unwrap_or(DEFAULT_SETTINGS.max_frame_size)
    }

    pub fn process_settings_ack(&mut self) -> LoopResult<()> {
        match self.pending_local_settings.pop_front() {
            Some((timer, settings)) => {
                self.timers.cancel(timer);
                self.local_settings = settings;
                self.decoder
                    .set_max_size_setting(settings.header_table_size as usize);
                Ok(())
            }
            None => Err(ConnEnd::ConnectionError(
                ErrorCode::ProtocolError,
                Error::SettingsAckWithoutSettingsSent,
            )),
        }
    }

    pub fn cancel_preface_timer(&mut self, handle: TimerHandle) {
        self.timers.cancel(handle);
    }

    async fn run(mut self) {
        let end = self.run_loop().await;
        self.terminate_conn(end).await;
    }

    async fn run_loop(&mut self) -> ConnEnd {
        loop {
            if let Err(end) = self.flush().await {
                return end;
            }

            self.read_buf.reserve(READ_CHUNK);
            let deadline = self.timers.next_deadline();

            let event = tokio::select! {
                r = self.read.read_buf(&mut self.read_buf) => LoopEvent::Read(r),
                _ = async {
                    match deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => LoopEvent::Timer,
                msg = self.loop_rx.next() => match msg {
                    Some(msg) => LoopEvent::Msg(msg),
                    None => LoopEvent::ChannelClosed,
                },
                Some((child_id, stream_id)) = self.child_exits.next(),
                    if !self.child_exits.is_empty() =>
                {
                    LoopEvent::ChildExit(child_id, stream_id)
                }
            };

            let step = match event {
                LoopEvent::Read(Ok(0)) => Err(ConnEnd::SocketError(Error::EofFromStream)),
                LoopEvent::Read(Ok(_)) => {
                    self.bump_idle_timer();
                    self.process_read_buf().await
                }
                LoopEvent::Read(Err(e)) => Err(ConnEnd::SocketError(e.into())),
                LoopEvent::Timer => self.process_timers(),
                LoopEvent::Msg(msg) => {
                    self.bump_idle_timer();
                    self.process_loop_msg(msg).await
                }
                LoopEvent::ChannelClosed => Err(ConnEnd::Stop),
                LoopEvent::ChildExit(child_id, stream_id) => {
                    self.bump_idle_timer();
                    debug!("child {} of stream {} exited", child_id, stream_id);
                    self.children.retain(|(id, _, _)| *id != child_id);
                    Ok(())
                }
            };

            if let Err(end) = step {
                return end;
            }
        }
    }

    fn bump_idle_timer(&mut self) {
        self.timers.cancel(self.idle_timer);
        self.idle_timer = self.timers.arm(
            Duration::from_millis(self.conf.idle_timeout_ms()),
            TimerEvent::Idle,
        );
    }

    fn process_timers(&mut self) -> LoopResult<()> {
        let now = Instant::now();
        while let Some((handle, event)) = self.timers.pop_due(now) {
            match event {
                TimerEvent::Preface => match self.parse_mode {
                    ParseMode::PrefaceSequence(expected)
                    | ParseMode::PrefaceSettings(expected)
                        if expected == handle =>
                    {
                        return Err(ConnEnd::ConnectionError(
                            ErrorCode::ProtocolError,
                            Error::PrefaceTimeout,
                        ));
                    }
                    _ => debug!("stale preface timer"),
                },
                TimerEvent::SettingsAck => {
                    if self
                        .pending_local_settings
                        .iter()
                        .any(|(h, _)| *h == handle)
                    {
                        return Err(ConnEnd::ConnectionError(
                            ErrorCode::SettingsTimeout,
                            Error::SettingsAckTimeout,
                        ));
                    }
                    debug!("stale settings ack timer");
                }
                TimerEvent::Idle => {
                    if handle == self.idle_timer {
                        return Err(ConnEnd::ConnectionError(
                            ErrorCode::InternalError,
                            Error::IdleTimeout,
                        ));
                    }
                    debug!("stale idle timer");
                }
            }
        }
        Ok(())
    }

    async fn process_loop_msg(&mut self, msg: LoopMsg) -> LoopResult<()> {
        match msg {
            LoopMsg::Conn(ConnMsg::DumpState(tx)) => {
                let _ = tx.send(self.state_snapshot());
                Ok(())
            }
            LoopMsg::Conn(ConnMsg::Shutdown) => Err(ConnEnd::Stop),
            LoopMsg::Stream(stream_id, message) => {
                if !self.streams.contains(stream_id) {
                    debug!("message for unknown stream {} dropped", stream_id);
                    return Ok(());
                }
                if let Some(commands) = self.invoke_info(stream_id, message) {
                    self.run_commands(stream_id, commands).await?;
                }
                Ok(())
            }
        }
    }

    pub async fn flush(&mut self) -> LoopResult<()> {
        poll_fn(|cx| self.queued_write.poll_flush(cx))
            .await
            .map_err(ConnEnd::SocketError)
    }

    fn state_snapshot(&self) -> ConnStateSnapshot {
        ConnStateSnapshot {
            streams: self.streams.snapshot(),
        }
    }

    /// Register a worker task against a stream.
    pub fn register_child(&mut self, stream_id: StreamId, child: crate::command::ChildTask) {
        let child_id = self.next_child_id;
        self.next_child_id += 1;

        let abort = child.handle.abort_handle();
        self.children.push((child_id, abort, stream_id));

        let handle = child.handle;
        self.child_exits.push(Box::pin(async move {
            // aborted children resolve with a JoinError, which is fine
            let _ = handle.await;
            (child_id, stream_id)
        }));
        debug!("registered child {} for stream {}", child_id, stream_id);
    }

    /// Anomalous stream termination: RST_STREAM out, handler notified.
    pub fn reset_stream(&mut self, stream_id: StreamId, code: ErrorCode, reason: TerminateReason) {
        self.queued_write
            .queue_not_goaway(RstStreamFrame::new(stream_id, code));
        self.terminate_stream(stream_id, reason);
    }

    /// Remove the stream, notify its handler exactly once, and abort its
    /// children. A no-op for unknown streams.
    pub fn terminate_stream(&mut self, stream_id: StreamId, reason: TerminateReason) {
        if let Some(stream) = self.streams.remove(stream_id) {
            self.notify_terminate(stream_id, &reason, stream.state);
        }
        self.children.retain(|(_, abort, owner)| {
            if *owner == stream_id {
                abort.abort();
                false
            } else {
                true
            }
        });
    }

    fn notify_terminate(
        &self,
        stream_id: StreamId,
        reason: &TerminateReason,
        state: Option<H::State>,
    ) {
        debug!("terminate stream {}: {:?}", stream_id, reason);
        let service = self.service.clone();
        let result = panic::catch_unwind(panic::AssertUnwindSafe(move || {
            service.terminate(stream_id, reason, state)
        }));
        if let Err(e) = result {
            warn!(
                "handler terminate for stream {} panicked: {}",
                stream_id,
                any_to_string(e)
            );
        }
    }

    async fn terminate_conn(&mut self, end: ConnEnd) {
        let reason = match &end {
            ConnEnd::ConnectionError(code, e) => {
                warn!("connection error ({}): {}", code, e);
                self.queued_write
                    .queue_goaway(GoawayFrame::new(self.last_peer_stream_id, *code));
                TerminateReason::ConnectionError(*code)
            }
            ConnEnd::SocketError(e) => {
                warn!("socket error: {}", e);
                TerminateReason::SocketError
            }
            ConnEnd::Stop => {
                debug!("connection stopping");
                TerminateReason::Stop
            }
        };

        // drain the outbound queue best-effort; the socket may be gone
        if !matches!(end, ConnEnd::SocketError(..)) {
            let _ = tokio::time::timeout(
                Duration::from_secs(1),
                poll_fn(|cx| self.queued_write.poll_flush(cx)),
            )
            .await;
        }

        for (stream_id, stream) in self.streams.drain() {
            self.notify_terminate(stream_id, &reason, stream.state);
        }
        for (_, abort, _) in self.children.drain(..) {
            abort.abort();
        }
    }
}

/// Handle to a running server connection.
///
/// Created together with the connection future by [`ServerConn::new`];
/// the future must be spawned (or awaited) for the connection to make
/// progress.
pub struct ServerConn {
    loop_tx: mpsc::UnboundedSender<LoopMsg>,
}

impl ServerConn {
    pub fn new<H, I>(
        socket: I,
        peer_addr: SocketAddr,
        conf: ServerConf,
        service: Arc<H>,
    ) -> (ServerConn, impl Future<Output = ()>)
    where
        H: StreamHandler,
        I: SocketStream,
    {
        let (loop_tx, loop_rx) = mpsc::unbounded();

        let conn = Conn::new(
            socket,
            peer_addr,
            conf,
            service,
            loop_rx,
            loop_tx.clone(),
        );

        (ServerConn { loop_tx }, conn.run())
    }

    pub fn new_plain<H>(
        socket: TcpStream,
        peer_addr: SocketAddr,
        conf: ServerConf,
        service: Arc<H>,
    ) -> (ServerConn, impl Future<Output = ()>)
    where
        H: StreamHandler,
    {
        ServerConn::new(socket, peer_addr, conf, service)
    }

    /// Deliver an out-of-band message to a stream; it reaches the
    /// handler's `info` callback on the connection task.
    pub fn stream_message(
        &self,
        stream_id: StreamId,
        message: InfoMessage,
    ) -> crate::Result<()> {
        self.loop_tx
            .unbounded_send(LoopMsg::Stream(stream_id, message))
            .map_err(|_| Error::ConnDied)
    }

    /// Request a clean connection shutdown.
    pub fn shutdown(&self) -> crate::Result<()> {
        self.loop_tx
            .unbounded_send(LoopMsg::Conn(ConnMsg::Shutdown))
            .map_err(|_| Error::ConnDied)
    }

    /// For tests and diagnostics.
    pub fn dump_state(&self) -> impl Future<Output = crate::Result<ConnStateSnapshot>> {
        let (tx, rx) = oneshot::channel();
        let sent = self
            .loop_tx
            .unbounded_send(LoopMsg::Conn(ConnMsg::DumpState(tx)));
        async move {
            if sent.is_err() {
                return Err(Error::ConnDied);
            }
            rx.await.map_err(|_| Error::ConnDied)
        }
    }
}

impl<H, I> Conn<H, I>
where
    H: StreamHandler,
    I: SocketStream,
{
    /// Reset `parse_needs` to one frame header after a frame was consumed.
    pub fn parse_consumed(&mut self) {
        self.parse_needs = FRAME_HEADER_LEN;
    }

    pub fn new_stream(&mut self, stream_id: StreamId, remote: stream::RemoteState) {
        debug!("new stream: {}", stream_id);
        self.streams.insert(stream_id, HttpStream::new(remote));
    }
}
