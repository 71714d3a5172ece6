//! The command executor: translates handler command sequences into wire
//! frames and stream state transitions, in order.

use std::collections::VecDeque;
use std::path::Path;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncSeekExt;

use crate::command::Command;
use crate::command::Commands;
use crate::conn::stream::LocalState;
use crate::conn::stream::RemoteState;
use crate::conn::Conn;
use crate::conn::LoopResult;
use crate::handler::StreamHandler;
use crate::handler::TerminateReason;
use crate::headers;
use crate::headers::Headers;
use crate::net::socket::SocketStream;
use crate::req::ServerRequest;
use crate::wire::end_stream::EndStream;
use crate::wire::error_code::ErrorCode;
use crate::wire::frame::split_data;
use crate::wire::frame::ContinuationFlag;
use crate::wire::frame::ContinuationFrame;
use crate::wire::frame::DataFlag;
use crate::wire::frame::DataFrame;
use crate::wire::frame::HeadersFlag;
use crate::wire::frame::HeadersFrame;
use crate::wire::frame::PushPromiseFlag;
use crate::wire::frame::PushPromiseFrame;
use crate::wire::stream_id::StreamId;

impl<H, I> Conn<H, I>
where
    H: StreamHandler,
    I: SocketStream,
{
    /// Execute a handler's command sequence. `push` commands seed further
    /// `(stream, commands)` pairs, processed breadth-first to keep the
    /// executor iterative.
    pub(crate) async fn run_commands(
        &mut self,
        stream_id: StreamId,
        commands: Commands,
    ) -> LoopResult<()> {
        let mut queue: VecDeque<(StreamId, Commands)> = VecDeque::new();
        queue.push_back((stream_id, commands));

        while let Some((stream_id, commands)) = queue.pop_front() {
            for command in commands {
                match command {
                    Command::Response {
                        status,
                        headers,
                        body,
                    } => self.exec_response(stream_id, status, headers, body, false),
                    Command::ErrorResponse {
                        status,
                        headers,
                        body,
                    } => self.exec_response(stream_id, status, headers, body, true),
                    Command::Headers { status, headers } => {
                        self.exec_headers(stream_id, status, headers)
                    }
                    Command::Data { end_stream, data } => {
                        self.exec_data(stream_id, end_stream, data)
                    }
                    Command::SendFile {
                        end_stream,
                        offset,
                        count,
                        path,
                    } => {
                        self.exec_sendfile(stream_id, end_stream, offset, count, &path)
                            .await?
                    }
                    Command::Push {
                        method,
                        scheme,
                        host,
                        port,
                        path,
                        query,
                        headers,
                    } => {
                        if let Some(promised) = self.exec_push(
                            stream_id, method, scheme, host, port, path, query, headers,
                        ) {
                            queue.push_back(promised);
                        }
                    }
                    Command::Flow(n) => {
                        // reserved slot for inbound flow-control credit
                        debug!("flow({}) for stream {} ignored", n, stream_id);
                    }
                    Command::Spawn(child) => self.register_child(stream_id, child),
                    Command::SwitchProtocol(protocol) => {
                        warn!(
                            "switch_protocol({}) is not supported over HTTP/2, ignored",
                            protocol
                        );
                    }
                    Command::InternalError(message) => {
                        // remaining commands for this stream are dropped
                        self.reset_stream(
                            stream_id,
                            ErrorCode::InternalError,
                            TerminateReason::InternalError(message),
                        );
                        break;
                    }
                    Command::Stop => {
                        self.stop_stream(stream_id);
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// HEADERS plus optional body. Only honoured while the stream is
    /// idle; `error_response` makes the no-op silent by design of the
    /// command, a second `response` is a handler bug worth a warning.
    fn exec_response(
        &mut self,
        stream_id: StreamId,
        status: u16,
        headers: Headers,
        body: Bytes,
        error_response: bool,
    ) {
        match self.streams.get_mut(stream_id) {
            Some(stream) if stream.local == LocalState::Idle => {}
            Some(..) => {
                if !error_response {
                    warn!("response for stream {} already under way, ignored", stream_id);
                }
                return;
            }
            None => return,
        }

        let end_stream = EndStream::from_bool(body.is_empty());
        self.queue_headers_block(stream_id, status, &headers, end_stream);
        if !body.is_empty() {
            self.queue_data(stream_id, body, EndStream::Yes);
        }
        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.local = LocalState::Fin;
        }
    }

    /// Start of a streamed response: HEADERS without END_STREAM.
    fn exec_headers(&mut self, stream_id: StreamId, status: u16, headers: Headers) {
        match self.streams.get_mut(stream_id) {
            Some(stream) if stream.local == LocalState::Idle => {}
            Some(..) => {
                warn!("headers for stream {} already under way, ignored", stream_id);
                return;
            }
            None => return,
        }

        self.queue_headers_block(stream_id, status, &headers, EndStream::No);
        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.local = LocalState::Nofin;
        }
    }

    fn exec_data(&mut self, stream_id: StreamId, end_stream: EndStream, data: Bytes) {
        match self.streams.get_mut(stream_id) {
            Some(stream) if stream.local == LocalState::Nofin => {}
            _ => {
                warn!("data for stream {} without headers, ignored", stream_id);
                return;
            }
        }

        self.queue_data(stream_id, data, end_stream);
        if end_stream == EndStream::Yes {
            if let Some(stream) = self.streams.get_mut(stream_id) {
                stream.local = LocalState::Fin;
            }
        }
    }

    /// Stream a file region as DATA frames, flushing chunk by chunk so an
    /// arbitrarily large file never sits in memory.
    async fn exec_sendfile(
        &mut self,
        stream_id: StreamId,
        end_stream: EndStream,
        offset: u64,
        count: u64,
        path: &Path,
    ) -> LoopResult<()> {
        match self.streams.get_mut(stream_id) {
            Some(stream) if stream.local == LocalState::Nofin => {}
            _ => {
                warn!("sendfile for stream {} without headers, ignored", stream_id);
                return Ok(());
            }
        }

        let max_frame_size = self.remote_settings.max_frame_size as u64;

        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                self.sendfile_failed(stream_id, path, e);
                return Ok(());
            }
        };
        if let Err(e) = file.seek(std::io::SeekFrom::Start(offset)).await {
            self.sendfile_failed(stream_id, path, e);
            return Ok(());
        }

        let mut sent = 0u64;
        while sent < count {
            let chunk_len = std::cmp::min(max_frame_size, count - sent) as usize;
            let mut chunk = vec![0u8; chunk_len];
            let n = match file.read(&mut chunk).await {
                Ok(n) => n,
                Err(e) => {
                    self.sendfile_failed(stream_id, path, e);
                    return Ok(());
                }
            };
            if n == 0 {
                break;
            }
            chunk.truncate(n);
            self.queued_write
                .queue_not_goaway(DataFrame::with_data(stream_id, Bytes::from(chunk)));
            sent += n as u64;
            // socket errors, unlike file errors, take the connection down
            self.flush().await?;
        }

        if end_stream == EndStream::Yes {
            let mut frame = DataFrame::new(stream_id);
            frame.set_flag(DataFlag::EndStream);
            self.queued_write.queue_not_goaway(frame);
            if let Some(stream) = self.streams.get_mut(stream_id) {
                stream.local = LocalState::Fin;
            }
        }
        self.flush().await
    }

    fn sendfile_failed(&mut self, stream_id: StreamId, path: &Path, e: std::io::Error) {
        warn!("sendfile {:?} for stream {} failed: {}", path, stream_id, e);
        self.reset_stream(
            stream_id,
            ErrorCode::InternalError,
            TerminateReason::InternalError(e.to_string()),
        );
    }

    /// Emit PUSH_PROMISE for a synthesised request and open the promised
    /// stream through the regular handler path. Returns the promised
    /// stream's first command batch.
    #[allow(clippy::too_many_arguments)]
    fn exec_push(
        &mut self,
        stream_id: StreamId,
        method: String,
        scheme: String,
        host: String,
        port: u16,
        path: String,
        query: String,
        headers: Headers,
    ) -> Option<(StreamId, Commands)> {
        if !self.streams.contains(stream_id) {
            return None;
        }
        if !self.remote_settings.enable_push {
            debug!("peer disabled push, push command ignored");
            return None;
        }

        let promised_stream_id = self.next_push_stream_id;
        self.next_push_stream_id += 2;

        let authority = headers::synth_authority(&scheme, &host, port);
        let full_path = headers::synth_path(&path, &query);

        let mut fields: Vec<(&str, &str)> = vec![
            (":method", &method),
            (":scheme", &scheme),
            (":authority", &authority),
            (":path", &full_path),
        ];
        for header in headers.iter() {
            fields.push((header.name(), header.value()));
        }
        let fragment = self.encoder.encode(fields);

        debug!(
            "push: stream {} promises stream {} for {} {}",
            stream_id, promised_stream_id, method, full_path
        );
        self.queue_push_promise(stream_id, promised_stream_id, fragment);

        let req = ServerRequest {
            peer_addr: self.peer_addr,
            stream_id: promised_stream_id,
            version: "HTTP/2",
            method,
            scheme,
            host,
            port,
            path,
            query,
            headers,
            has_body: false,
            body_length: Some(0),
        };

        // a promised stream is born with the request side closed
        self.new_stream(promised_stream_id, RemoteState::Fin);

        let (commands, state) = self.invoke_init(promised_stream_id, req)?;
        if let Some(stream) = self.streams.get_mut(promised_stream_id) {
            stream.state = Some(state);
        }
        Some((promised_stream_id, commands))
    }

    /// Graceful stream completion: whatever closes our side cleanly given
    /// how far the response got, then terminate.
    pub(crate) fn stop_stream(&mut self, stream_id: StreamId) {
        let local = match self.streams.get_mut(stream_id) {
            Some(stream) => stream.local,
            None => return,
        };

        match local {
            LocalState::Idle => {
                // nothing was sent: an empty 204 closes the stream
                self.queue_headers_block(stream_id, 204, &Headers::new(), EndStream::Yes);
            }
            LocalState::Nofin => {
                let mut frame = DataFrame::new(stream_id);
                frame.set_flag(DataFlag::EndStream);
                self.queued_write.queue_not_goaway(frame);
            }
            LocalState::Fin => {}
        }
        if let Some(stream) = self.streams.get_mut(stream_id) {
            stream.local = LocalState::Fin;
        }

        self.terminate_stream(stream_id, TerminateReason::Normal);
    }

    /// Encode `:status` plus headers and queue the block as one HEADERS
    /// frame, with CONTINUATIONs when it exceeds the peer's frame size.
    fn queue_headers_block(
        &mut self,
        stream_id: StreamId,
        status: u16,
        headers: &Headers,
        end_stream: EndStream,
    ) {
        let status_value = headers::status_value(status);
        let mut fields: Vec<(&str, &str)> = Vec::with_capacity(1 + headers.len());
        fields.push((":status", &status_value));
        for header in headers.iter() {
            fields.push((header.name(), header.value()));
        }
        let fragment = self.encoder.encode(fields);

        let max_frame_size = self.remote_settings.max_frame_size as usize;

        let first_len = std::cmp::min(fragment.len(), max_frame_size);
        let mut frame = HeadersFrame::new(fragment.slice(..first_len), stream_id);
        if end_stream == EndStream::Yes {
            frame.set_flag(HeadersFlag::EndStream);
        }
        if first_len == fragment.len() {
            frame.set_flag(HeadersFlag::EndHeaders);
            self.queued_write.queue_not_goaway(frame);
            return;
        }
        self.queued_write.queue_not_goaway(frame);

        let mut pos = first_len;
        while pos < fragment.len() {
            let end = std::cmp::min(fragment.len(), pos + max_frame_size);
            let mut continuation =
                ContinuationFrame::new(fragment.slice(pos..end), stream_id);
            if end == fragment.len() {
                continuation.set_flag(ContinuationFlag::EndHeaders);
            }
            self.queued_write.queue_not_goaway(continuation);
            pos = end;
        }
    }

    /// Queue a PUSH_PROMISE, spilling an oversized header block into
    /// CONTINUATION frames like [`Self::queue_headers_block`] does. The
    /// promised stream id occupies 4 bytes of the first frame.
    fn queue_push_promise(
        &mut self,
        stream_id: StreamId,
        promised_stream_id: StreamId,
        fragment: Bytes,
    ) {
        let max_frame_size = self.remote_settings.max_frame_size as usize;

        let first_len = std::cmp::min(fragment.len(), max_frame_size - 4);
        let mut frame =
            PushPromiseFrame::new(stream_id, promised_stream_id, fragment.slice(..first_len));
        if first_len == fragment.len() {
            self.queued_write.queue_not_goaway(frame);
            return;
        }
        frame.flags.clear(PushPromiseFlag::EndHeaders);
        self.queued_write.queue_not_goaway(frame);

        let mut pos = first_len;
        while pos < fragment.len() {
            let end = std::cmp::min(fragment.len(), pos + max_frame_size);
            let mut continuation = ContinuationFrame::new(fragment.slice(pos..end), stream_id);
            if end == fragment.len() {
                continuation.set_flag(ContinuationFlag::EndHeaders);
            }
            self.queued_write.queue_not_goaway(continuation);
            pos = end;
        }
    }

    /// Queue a body payload split to the peer's max frame size.
    fn queue_data(&mut self, stream_id: StreamId, data: Bytes, end_stream: EndStream) {
        for frame in split_data(
            stream_id,
            data,
            end_stream,
            self.remote_settings.max_frame_size,
        ) {
            self.queued_write.queue_not_goaway(frame);
        }
    }
}
