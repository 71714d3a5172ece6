//! Frame-level semantics: the incremental parse loop (preface handshake
//! and CONTINUATION reassembly) and the per-frame-type dispatch.

use std::mem;
use std::panic;

use bytes::Bytes;
use bytes::BytesMut;

use crate::command::Commands;
use crate::conn::stream::RemoteState;
use crate::conn::Conn;
use crate::conn::ConnEnd;
use crate::conn::LoopResult;
use crate::conn::ParseMode;
use crate::handler::DataFin;
use crate::handler::InfoMessage;
use crate::handler::StreamHandler;
use crate::handler::TerminateReason;
use crate::headers;
use crate::misc::any_to_string;
use crate::net::socket::SocketStream;
use crate::req::ServerRequest;
use crate::wire::end_stream::EndStream;
use crate::wire::error_code::ErrorCode;
use crate::wire::frame::continuation::CONTINUATION_FRAME_TYPE;
use crate::wire::frame::settings::SETTINGS_FRAME_TYPE;
use crate::wire::frame::parse_frame;
use crate::wire::frame::DataFrame;
use crate::wire::frame::HttpFrame;
use crate::wire::frame::ParseFrameOutcome;
use crate::wire::frame::PingFrame;
use crate::wire::frame::RawHttpFrameType;
use crate::wire::frame::SettingsFrame;
use crate::wire::frame::FRAME_HEADER_LEN;
use crate::wire::stream_id::is_client_initiated;
use crate::wire::stream_id::StreamId;
use crate::wire::PREFACE;
use crate::Error;

impl<H, I> Conn<H, I>
where
    H: StreamHandler,
    I: SocketStream,
{
    /// Advance the parser over everything buffered, per the current parse
    /// mode, until the buffer runs dry or more bytes are needed.
    pub(crate) async fn process_read_buf(&mut self) -> LoopResult<()> {
        loop {
            match &self.parse_mode {
                ParseMode::PrefaceSequence(timer) => {
                    let timer = *timer;
                    // whatever prefix of the preface has arrived must
                    // match byte-for-byte
                    let n = std::cmp::min(self.read_buf.len(), PREFACE.len());
                    if self.read_buf[..n] != PREFACE[..n] {
                        return Err(ConnEnd::ConnectionError(
                            ErrorCode::ProtocolError,
                            Error::InvalidPreface,
                        ));
                    }
                    if self.read_buf.len() < PREFACE.len() {
                        self.parse_needs = PREFACE.len();
                        return Ok(());
                    }
                    let _ = self.read_buf.split_to(PREFACE.len());
                    debug!("received connection preface");
                    self.parse_mode = ParseMode::PrefaceSettings(timer);
                    self.parse_needs = FRAME_HEADER_LEN;
                }

                ParseMode::PrefaceSettings(timer) => {
                    let timer = *timer;
                    if self.read_buf.len() < self.parse_needs.max(FRAME_HEADER_LEN) {
                        self.parse_needs = self.parse_needs.max(FRAME_HEADER_LEN);
                        return Ok(());
                    }
                    let frame_type = self.read_buf[3];
                    if frame_type != SETTINGS_FRAME_TYPE {
                        return Err(ConnEnd::ConnectionError(
                            ErrorCode::ProtocolError,
                            Error::ExpectedSettingsAfterPreface(RawHttpFrameType(frame_type)),
                        ));
                    }
                    let max_frame_size = self.recv_max_frame_size();
                    match parse_frame(&mut self.read_buf, max_frame_size) {
                        ParseFrameOutcome::NeedBytes(n) => {
                            self.parse_needs = n;
                            return Ok(());
                        }
                        ParseFrameOutcome::Frame(HttpFrame::Settings(frame)) => {
                            if frame.is_ack() {
                                return Err(ConnEnd::ConnectionError(
                                    ErrorCode::ProtocolError,
                                    Error::ExpectedSettingsAfterPreface(RawHttpFrameType(
                                        SETTINGS_FRAME_TYPE,
                                    )),
                                ));
                            }
                            self.cancel_preface_timer(timer);
                            self.parse_mode = ParseMode::Normal;
                            self.parse_consumed();
                            self.process_frame(HttpFrame::Settings(frame)).await?;
                        }
                        ParseFrameOutcome::Frame(..) | ParseFrameOutcome::StreamError(..) => {
                            // unreachable: the type octet was checked above
                            return Err(ConnEnd::ConnectionError(
                                ErrorCode::ProtocolError,
                                Error::ExpectedSettingsAfterPreface(RawHttpFrameType(frame_type)),
                            ));
                        }
                        ParseFrameOutcome::Error(e) => {
                            return Err(ConnEnd::ConnectionError(e.error_code(), e.into()));
                        }
                    }
                }

                ParseMode::Normal => {
                    if self.read_buf.is_empty() || self.read_buf.len() < self.parse_needs {
                        return Ok(());
                    }
                    let max_frame_size = self.recv_max_frame_size();
                    match parse_frame(&mut self.read_buf, max_frame_size) {
                        ParseFrameOutcome::NeedBytes(n) => {
                            self.parse_needs = n;
                            return Ok(());
                        }
                        ParseFrameOutcome::Frame(frame) => {
                            self.parse_consumed();
                            match frame {
                                HttpFrame::Headers(frame) if !frame.is_end_of_headers() => {
                                    // header block to be continued; no other
                                    // frame may intervene
                                    self.parse_mode = ParseMode::Continuation {
                                        stream_id: frame.stream_id,
                                        end_stream: EndStream::from_bool(
                                            frame.is_end_of_stream(),
                                        ),
                                        fragment: BytesMut::from(&frame.header_fragment[..]),
                                    };
                                }
                                HttpFrame::Continuation(..) => {
                                    return Err(ConnEnd::ConnectionError(
                                        ErrorCode::ProtocolError,
                                        Error::ContinuationFrameWithoutHeaders,
                                    ));
                                }
                                frame => self.process_frame(frame).await?,
                            }
                        }
                        ParseFrameOutcome::StreamError(stream_id, code, msg) => {
                            self.parse_consumed();
                            warn!("stream error on {}: {}", stream_id, msg);
                            self.reset_stream(
                                stream_id,
                                code,
                                TerminateReason::StreamError(code),
                            );
                        }
                        ParseFrameOutcome::Error(e) => {
                            return Err(ConnEnd::ConnectionError(e.error_code(), e.into()));
                        }
                    }
                }

                ParseMode::Continuation { stream_id, .. } => {
                    let expected_stream_id = *stream_id;
                    if self.read_buf.len() < self.parse_needs.max(FRAME_HEADER_LEN) {
                        self.parse_needs = self.parse_needs.max(FRAME_HEADER_LEN);
                        return Ok(());
                    }
                    let frame_type = self.read_buf[3];
                    if frame_type != CONTINUATION_FRAME_TYPE {
                        return Err(ConnEnd::ConnectionError(
                            ErrorCode::ProtocolError,
                            Error::ExpectingContinuationGot(RawHttpFrameType(frame_type)),
                        ));
                    }
                    let max_frame_size = self.recv_max_frame_size();
                    match parse_frame(&mut self.read_buf, max_frame_size) {
                        ParseFrameOutcome::NeedBytes(n) => {
                            self.parse_needs = n;
                            return Ok(());
                        }
                        ParseFrameOutcome::Frame(HttpFrame::Continuation(frame)) => {
                            self.parse_consumed();
                            if frame.stream_id != expected_stream_id {
                                return Err(ConnEnd::ConnectionError(
                                    ErrorCode::ProtocolError,
                                    Error::ExpectingContinuationGotDifferentStreamId(
                                        expected_stream_id,
                                        frame.stream_id,
                                    ),
                                ));
                            }
                            let headers_end = frame.is_headers_end();
                            // TODO: bound the total accumulated header block size
                            if let ParseMode::Continuation { fragment, .. } =
                                &mut self.parse_mode
                            {
                                fragment.extend_from_slice(&frame.header_fragment);
                            }
                            if headers_end {
                                let mode =
                                    mem::replace(&mut self.parse_mode, ParseMode::Normal);
                                match mode {
                                    ParseMode::Continuation {
                                        stream_id,
                                        end_stream,
                                        fragment,
                                    } => {
                                        self.init_stream(
                                            stream_id,
                                            end_stream,
                                            fragment.freeze(),
                                        )
                                        .await?;
                                    }
                                    _ => {
                                        return Err(ConnEnd::ConnectionError(
                                            ErrorCode::InternalError,
                                            Error::ContinuationFrameWithoutHeaders,
                                        ))
                                    }
                                }
                            }
                        }
                        ParseFrameOutcome::Frame(..) | ParseFrameOutcome::StreamError(..) => {
                            // unreachable: the type octet was checked above
                            return Err(ConnEnd::ConnectionError(
                                ErrorCode::ProtocolError,
                                Error::ExpectingContinuationGot(RawHttpFrameType(frame_type)),
                            ));
                        }
                        ParseFrameOutcome::Error(e) => {
                            return Err(ConnEnd::ConnectionError(e.error_code(), e.into()));
                        }
                    }
                }
            }
        }
    }

    /// Per-frame-type semantics, for complete logical frames only (the
    /// parse loop has already folded CONTINUATIONs away).
    async fn process_frame(&mut self, frame: HttpFrame) -> LoopResult<()> {
        match frame {
            HttpFrame::Data(frame) => self.process_data(frame).await,
            HttpFrame::Headers(frame) => {
                let end_stream = EndStream::from_bool(frame.is_end_of_stream());
                self.init_stream(frame.stream_id, end_stream, frame.header_fragment)
                    .await
            }
            HttpFrame::Priority(frame) => {
                debug!("PRIORITY for stream {} ignored", frame.stream_id);
                Ok(())
            }
            HttpFrame::RstStream(frame) => {
                // the peer reset the stream: terminate without answering
                // with an RST of our own
                let code = frame.error_code();
                debug!("peer reset stream {} with {}", frame.stream_id, code);
                self.terminate_stream(frame.stream_id, TerminateReason::StreamError(code));
                Ok(())
            }
            HttpFrame::Settings(frame) if frame.is_ack() => self.process_settings_ack(),
            HttpFrame::Settings(frame) => {
                self.remote_settings.apply_from_frame(&frame);
                self.queued_write.queue_not_goaway(SettingsFrame::new_ack());
                Ok(())
            }
            HttpFrame::PushPromise(..) => Err(ConnEnd::ConnectionError(
                ErrorCode::ProtocolError,
                Error::UnexpectedPushPromise,
            )),
            HttpFrame::Ping(frame) if frame.is_ack() => Ok(()),
            HttpFrame::Ping(frame) => {
                self.queued_write
                    .queue_not_goaway(PingFrame::new_ack(frame.opaque_data));
                Ok(())
            }
            HttpFrame::Goaway(frame) => {
                debug!("received GOAWAY: {}", frame.error_code());
                Err(ConnEnd::Stop)
            }
            HttpFrame::WindowUpdate(frame) => {
                // outbound windows are treated as unbounded
                debug!(
                    "WINDOW_UPDATE +{} on stream {} ignored",
                    frame.increment, frame.stream_id
                );
                Ok(())
            }
            HttpFrame::Continuation(..) => Err(ConnEnd::ConnectionError(
                ErrorCode::ProtocolError,
                Error::ContinuationFrameWithoutHeaders,
            )),
            HttpFrame::Unknown(raw) => {
                debug!("ignored frame of unknown type {}", raw.header().frame_type);
                Ok(())
            }
        }
    }

    async fn process_data(&mut self, frame: DataFrame) -> LoopResult<()> {
        let stream_id = frame.stream_id;

        let fin = match self.streams.get_mut(stream_id) {
            Some(stream) if stream.remote == RemoteState::Nofin => {
                stream.body_length += frame.data.len() as u64;
                if frame.is_end_of_stream() {
                    stream.remote = RemoteState::Fin;
                    DataFin::Fin {
                        body_length: stream.body_length,
                    }
                } else {
                    DataFin::Nofin
                }
            }
            _ => {
                // closed or never-opened stream
                warn!("DATA for closed stream {}", stream_id);
                self.reset_stream(
                    stream_id,
                    ErrorCode::StreamClosed,
                    TerminateReason::StreamError(ErrorCode::StreamClosed),
                );
                return Ok(());
            }
        };

        if let Some(commands) = self.invoke_data(stream_id, fin, frame.data) {
            self.run_commands(stream_id, commands).await?;
        }
        Ok(())
    }

    /// A complete header block arrived: open the stream and hand the
    /// request to the handler.
    pub(crate) async fn init_stream(
        &mut self,
        stream_id: StreamId,
        end_stream: EndStream,
        fragment: Bytes,
    ) -> LoopResult<()> {
        if !is_client_initiated(stream_id) {
            return Err(ConnEnd::ConnectionError(
                ErrorCode::ProtocolError,
                Error::InitiatedStreamWithServerIdFromClient(stream_id),
            ));
        }
        if stream_id <= self.last_peer_stream_id {
            return Err(ConnEnd::ConnectionError(
                ErrorCode::ProtocolError,
                Error::StreamIdLeExistingStream(stream_id, self.last_peer_stream_id),
            ));
        }
        self.last_peer_stream_id = stream_id;

        // decoder state must advance whether or not the request is usable
        let fields = match self.decoder.decode(&fragment) {
            Ok(fields) => fields,
            Err(e) => {
                return Err(ConnEnd::ConnectionError(ErrorCode::CompressionError, e.into()))
            }
        };

        let (pseudo, req_headers) = headers::split_pseudo_headers(fields);

        let (method, path_and_query) = match (pseudo.method, pseudo.path) {
            (Some(method), Some(path)) if !path.is_empty() => (method, path),
            _ => {
                // 8.1.2.6: malformed request
                warn!("stream {}: missing :method or :path", stream_id);
                self.queued_write.queue_not_goaway(
                    crate::wire::frame::RstStreamFrame::new(stream_id, ErrorCode::ProtocolError),
                );
                return Ok(());
            }
        };

        let body_length = match end_stream {
            EndStream::Yes => Some(0),
            EndStream::No => match req_headers.get("content-length") {
                None => None,
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) => Some(n),
                    Err(_) => {
                        warn!(
                            "stream {}: unparseable content-length {:?}",
                            stream_id, value
                        );
                        self.queued_write.queue_not_goaway(
                            crate::wire::frame::RstStreamFrame::new(
                                stream_id,
                                ErrorCode::ProtocolError,
                            ),
                        );
                        return Ok(());
                    }
                },
            },
        };

        let scheme = pseudo.scheme.unwrap_or_else(|| "http".to_owned());
        let (host, port) = headers::parse_authority(&pseudo.authority.unwrap_or_default());
        let port = port.unwrap_or_else(|| headers::scheme_default_port(&scheme));
        let (path, query) = headers::split_path(&path_and_query);

        let req = ServerRequest {
            peer_addr: self.peer_addr,
            stream_id,
            version: "HTTP/2",
            method,
            scheme,
            host,
            port,
            path,
            query,
            headers: req_headers,
            has_body: end_stream == EndStream::No,
            body_length,
        };

        let remote = match end_stream {
            EndStream::Yes => RemoteState::Fin,
            EndStream::No => RemoteState::Nofin,
        };
        self.new_stream(stream_id, remote);

        if let Some((commands, state)) = self.invoke_init(stream_id, req) {
            if let Some(stream) = self.streams.get_mut(stream_id) {
                stream.state = Some(state);
            }
            self.run_commands(stream_id, commands).await?;
        }
        Ok(())
    }

    /// Call the handler's `init`, containing any fault to this stream.
    pub(crate) fn invoke_init(
        &mut self,
        stream_id: StreamId,
        req: ServerRequest,
    ) -> Option<(Commands, H::State)> {
        let service = self.service.clone();
        let result = panic::catch_unwind(panic::AssertUnwindSafe(move || {
            service.init(stream_id, req)
        }));
        self.contain_handler_fault(stream_id, result)
    }

    pub(crate) fn invoke_data(
        &mut self,
        stream_id: StreamId,
        fin: DataFin,
        data: Bytes,
    ) -> Option<Commands> {
        let service = self.service.clone();
        let result = {
            let stream = self.streams.get_mut(stream_id)?;
            let state = stream.state.as_mut()?;
            panic::catch_unwind(panic::AssertUnwindSafe(move || {
                service.data(stream_id, fin, data, state)
            }))
        };
        self.contain_handler_fault(stream_id, result)
    }

    pub(crate) fn invoke_info(
        &mut self,
        stream_id: StreamId,
        message: InfoMessage,
    ) -> Option<Commands> {
        let service = self.service.clone();
        let result = {
            let stream = self.streams.get_mut(stream_id)?;
            let state = stream.state.as_mut()?;
            panic::catch_unwind(panic::AssertUnwindSafe(move || {
                service.info(stream_id, message, state)
            }))
        };
        self.contain_handler_fault(stream_id, result)
    }

    /// Turn a handler error or panic into a stream reset; exceptions
    /// never cross the loop boundary.
    fn contain_handler_fault<T>(
        &mut self,
        stream_id: StreamId,
        result: std::thread::Result<crate::Result<T>>,
    ) -> Option<T> {
        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("handler failed for stream {}: {}", stream_id, e);
                self.reset_stream(
                    stream_id,
                    ErrorCode::InternalError,
                    TerminateReason::InternalError(e.to_string()),
                );
                None
            }
            Err(panic) => {
                let message = any_to_string(panic);
                warn!("handler panicked for stream {}: {}", stream_id, message);
                self.reset_stream(
                    stream_id,
                    ErrorCode::InternalError,
                    TerminateReason::InternalError(message),
                );
                None
            }
        }
    }
}
