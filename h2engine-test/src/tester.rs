//! A synchronous HTTP/2 "client" that speaks raw frames over a blocking
//! TCP socket, for poking the server engine from tests.

#![allow(dead_code)]

use std::io;
use std::io::Read;
use std::io::Write;
use std::net;
use std::net::ToSocketAddrs;
use std::time::Duration;

use bytes::Bytes;

use h2engine::for_test::hpack;
use h2engine::for_test::wire::frame::ContinuationFlag;
use h2engine::for_test::wire::frame::ContinuationFrame;
use h2engine::for_test::wire::frame::DataFlag;
use h2engine::for_test::wire::frame::DataFrame;
use h2engine::for_test::wire::frame::FrameIR;
use h2engine::for_test::wire::frame::GoawayFrame;
use h2engine::for_test::wire::frame::HeadersFlag;
use h2engine::for_test::wire::frame::HeadersFrame;
use h2engine::for_test::wire::frame::HttpFrame;
use h2engine::for_test::wire::frame::HttpSettings;
use h2engine::for_test::wire::frame::PingFrame;
use h2engine::for_test::wire::frame::PushPromiseFrame;
use h2engine::for_test::wire::frame::RawFrame;
use h2engine::for_test::wire::frame::RstStreamFrame;
use h2engine::for_test::wire::frame::SettingsFrame;
use h2engine::for_test::wire::frame::FRAME_HEADER_LEN;
use h2engine::for_test::DEFAULT_SETTINGS;
use h2engine::for_test::PREFACE;
use h2engine::ErrorCode;
use h2engine::StreamId;

use crate::BIND_HOST;

pub struct HttpConnTester {
    tcp: net::TcpStream,
    pub decoder: hpack::Decoder,
    pub encoder: hpack::Encoder,
    /// Last known peer settings
    pub peer_settings: HttpSettings,
    /// Last our settings acknowledged
    pub our_settings_ack: HttpSettings,
    /// Last our settings sent
    pub our_settings_sent: Option<HttpSettings>,
}

impl HttpConnTester {
    pub fn with_tcp(tcp: net::TcpStream) -> HttpConnTester {
        tcp.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        HttpConnTester {
            tcp,
            decoder: hpack::Decoder::new(),
            encoder: hpack::Encoder::new(),
            peer_settings: DEFAULT_SETTINGS,
            our_settings_ack: DEFAULT_SETTINGS,
            our_settings_sent: None,
        }
    }

    pub fn connect(port: u16) -> HttpConnTester {
        let addr = (BIND_HOST, port).to_socket_addrs().unwrap().next().unwrap();
        let tcp = net::TcpStream::connect(addr).expect("connect");
        Self::with_tcp(tcp)
    }

    pub fn send_preface(&mut self) {
        self.tcp.write_all(PREFACE).expect("send preface");
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.tcp.write_all(bytes).expect("send raw");
    }

    pub fn send_frame<F: FrameIR>(&mut self, frame: F) {
        info!("sending {:?}", frame);
        self.tcp
            .write_all(&frame.serialize_into_vec())
            .expect("send_frame");
    }

    pub fn send_headers(&mut self, stream_id: StreamId, fields: &[(&str, &str)], end: bool) {
        let fragment = self.encoder.encode(fields.iter().copied());
        let mut headers_frame = HeadersFrame::new(fragment, stream_id);
        headers_frame.set_flag(HeadersFlag::EndHeaders);
        if end {
            headers_frame.set_flag(HeadersFlag::EndStream);
        }
        self.send_frame(headers_frame);
    }

    pub fn send_get(&mut self, stream_id: StreamId, path: &str) {
        self.send_headers(
            stream_id,
            &[
                (":method", "GET"),
                (":scheme", "http"),
                (":authority", "localhost"),
                (":path", path),
            ],
            true,
        );
    }

    pub fn send_data(&mut self, stream_id: StreamId, data: &[u8], end: bool) {
        let mut data_frame = DataFrame::with_data(stream_id, Bytes::copy_from_slice(data));
        if end {
            data_frame.set_flag(DataFlag::EndStream);
        }
        self.send_frame(data_frame);
    }

    pub fn send_rst(&mut self, stream_id: StreamId, error_code: ErrorCode) {
        self.send_frame(RstStreamFrame::new(stream_id, error_code));
    }

    pub fn send_goaway(&mut self, last_stream_id: StreamId) {
        self.send_frame(GoawayFrame::new(last_stream_id, ErrorCode::NoError));
    }

    pub fn send_ping(&mut self, opaque_data: u64) {
        self.send_frame(PingFrame::new(opaque_data));
    }

    /// A PING round-trip proves the engine is alive and has processed
    /// everything we sent before it.
    pub fn ping_pong(&mut self, opaque_data: u64) {
        self.send_ping(opaque_data);
        let ping = self.recv_frame_ping();
        assert!(ping.is_ack());
        assert_eq!(opaque_data, ping.opaque_data);
    }

    pub fn recv_eof(&mut self) {
        let r = self.tcp.read(&mut [0]);
        match r {
            Ok(0) => {}
            Ok(_) => panic!("expecting EOF, got data"),
            Err(e) => {
                // On Linux it returns ECONNRESET
                if e.kind() != io::ErrorKind::ConnectionReset {
                    panic!("expecting EOF, got error: {:?}", e);
                }
            }
        }
        info!("EOF received");
    }

    pub fn recv_raw_frame(&mut self) -> RawFrame {
        let mut buf = vec![0; FRAME_HEADER_LEN];
        self.tcp.read_exact(&mut buf).expect("read frame header");
        let payload_len =
            ((buf[0] as usize) << 16) | ((buf[1] as usize) << 8) | (buf[2] as usize);
        buf.resize(FRAME_HEADER_LEN + payload_len, 0);
        self.tcp
            .read_exact(&mut buf[FRAME_HEADER_LEN..])
            .expect("read frame payload");
        RawFrame {
            raw_content: Bytes::from(buf),
        }
    }

    fn recv_frame_no_check_ack(&mut self) -> HttpFrame {
        let raw_frame = self.recv_raw_frame();
        let frame = HttpFrame::from_raw(&raw_frame).expect("parse frame");
        debug!("received frame: {:?}", frame);
        frame
    }

    fn recv_special_frame_process_special(&mut self) -> Option<HttpFrame> {
        let frame = self.recv_frame_no_check_ack();
        if let HttpFrame::Settings(ref f) = frame {
            if self.our_settings_sent.is_some() && f.is_ack() {
                self.process_peer_settings_ack(f);
                return None;
            }
        }
        Some(frame)
    }

    pub fn recv_frame(&mut self) -> HttpFrame {
        loop {
            if let Some(frame) = self.recv_special_frame_process_special() {
                return frame;
            }
        }
    }

    pub fn recv_frame_settings(&mut self) -> SettingsFrame {
        match self.recv_frame_no_check_ack() {
            HttpFrame::Settings(settings) => settings,
            f => panic!("expecting SETTINGS, got: {:?}", f),
        }
    }

    pub fn recv_frame_settings_set(&mut self) -> SettingsFrame {
        let settings = self.recv_frame_settings();
        assert!(!settings.is_ack());
        self.peer_settings.apply_from_frame(&settings);
        settings
    }

    fn process_peer_settings_ack(&mut self, frame: &SettingsFrame) {
        assert!(frame.is_ack());
        assert!(self.our_settings_sent.is_some());
        self.our_settings_ack = self.our_settings_sent.take().unwrap();
    }

    pub fn recv_frame_settings_ack(&mut self) -> SettingsFrame {
        assert!(self.our_settings_sent.is_some());
        let settings = self.recv_frame_settings();
        self.process_peer_settings_ack(&settings);
        settings
    }

    pub fn send_settings(&mut self, settings: SettingsFrame) {
        assert!(self.our_settings_sent.is_none());
        let mut new_settings = self.our_settings_ack;
        new_settings.apply_from_frame(&settings);
        self.our_settings_sent = Some(new_settings);
        self.send_frame(settings);
    }

    // Perform handshake, but do not wait for ACK of my SETTINGS.
    // Useful, because ACK may come e.g. after first request HEADERS.
    pub fn settings_xchg_but_ack(&mut self) {
        self.send_settings(SettingsFrame::new());
        self.recv_frame_settings_set();
        self.send_frame(SettingsFrame::new_ack());
    }

    pub fn settings_xchg(&mut self) {
        self.settings_xchg_but_ack();
        self.recv_frame_settings_ack();
    }

    /// Preface plus full settings exchange.
    pub fn handshake(&mut self) {
        self.send_preface();
        self.settings_xchg();
    }

    pub fn recv_rst_frame(&mut self) -> RstStreamFrame {
        match self.recv_frame() {
            HttpFrame::RstStream(rst) => rst,
            f => panic!("expecting RST_STREAM, got: {:?}", f),
        }
    }

    pub fn recv_rst_frame_check(&mut self, stream_id: StreamId, error_code: ErrorCode) {
        let frame = self.recv_rst_frame();
        assert_eq!(stream_id, frame.stream_id);
        assert_eq!(error_code, frame.error_code());
    }

    pub fn recv_goaway_frame(&mut self) -> GoawayFrame {
        match self.recv_frame() {
            HttpFrame::Goaway(goaway) => goaway,
            f => panic!("expecting GOAWAY, got: {:?}", f),
        }
    }

    pub fn recv_goaway_frame_check(&mut self, error_code: ErrorCode) {
        let frame = self.recv_goaway_frame();
        assert_eq!(error_code, frame.error_code());
    }

    pub fn recv_frame_ping(&mut self) -> PingFrame {
        match self.recv_frame() {
            HttpFrame::Ping(ping) => ping,
            f => panic!("expecting PING, got: {:?}", f),
        }
    }

    pub fn recv_frame_push_promise(&mut self) -> (PushPromiseFrame, Vec<(String, String)>) {
        match self.recv_frame() {
            HttpFrame::PushPromise(push_promise) => {
                let fields = self
                    .decoder
                    .decode(&push_promise.header_fragment)
                    .expect("decode push promise");
                (push_promise, fields)
            }
            f => panic!("expecting PUSH_PROMISE, got: {:?}", f),
        }
    }

    fn recv_frame_continuation(&mut self) -> ContinuationFrame {
        match self.recv_frame() {
            HttpFrame::Continuation(continuation) => continuation,
            f => panic!("expecting CONTINUATION, got: {:?}", f),
        }
    }

    pub fn recv_frame_headers_continuation(&mut self) -> (HeadersFrame, Bytes, u32) {
        let headers = match self.recv_frame() {
            HttpFrame::Headers(headers) => headers,
            f => panic!("expecting HEADERS, got: {:?}", f),
        };

        if headers.flags.is_set(HeadersFlag::EndHeaders) {
            let fragment = headers.header_fragment.clone();
            return (headers, fragment, 0);
        }

        let mut fragment = headers.header_fragment.to_vec();
        let mut cont_count = 0;

        loop {
            let continuation = self.recv_frame_continuation();
            assert_eq!(headers.stream_id, continuation.stream_id);
            cont_count += 1;

            fragment.extend_from_slice(&continuation.header_fragment);

            if continuation.flags.is_set(ContinuationFlag::EndHeaders) {
                return (headers, Bytes::from(fragment), cont_count);
            }
        }
    }

    pub fn recv_frame_headers_decode(
        &mut self,
    ) -> (HeadersFrame, Vec<(String, String)>, u32) {
        let (frame, fragment, cont_count) = self.recv_frame_headers_continuation();
        let fields = self.decoder.decode(&fragment).expect("decode headers");
        (frame, fields, cont_count)
    }

    pub fn recv_frame_headers_check(
        &mut self,
        stream_id: StreamId,
        end: bool,
    ) -> Vec<(String, String)> {
        let (frame, fields, _) = self.recv_frame_headers_decode();
        assert_eq!(stream_id, frame.stream_id);
        assert_eq!(end, frame.is_end_of_stream());
        fields
    }

    pub fn recv_frame_data(&mut self) -> DataFrame {
        match self.recv_frame() {
            HttpFrame::Data(data) => data,
            f => panic!("expecting DATA, got: {:?}", f),
        }
    }

    pub fn recv_frame_data_check(&mut self, stream_id: StreamId, end: bool) -> Vec<u8> {
        let data = self.recv_frame_data();
        assert_eq!(stream_id, data.stream_id);
        assert_eq!(end, data.is_end_of_stream());
        data.data.to_vec()
    }

    /// Collect DATA frames for a stream until END_STREAM, asserting each
    /// frame stays within our advertised frame size.
    pub fn recv_frames_data_to_end(&mut self, stream_id: StreamId) -> Vec<u8> {
        let mut collected = Vec::new();
        loop {
            let data = self.recv_frame_data();
            assert_eq!(stream_id, data.stream_id);
            assert!(data.data.len() <= self.our_settings_ack.max_frame_size as usize);
            collected.extend_from_slice(&data.data);
            if data.is_end_of_stream() {
                return collected;
            }
        }
    }

    /// First value of a header field in a decoded field list.
    pub fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
