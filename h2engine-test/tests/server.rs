//! Integration tests driving the server engine over a real socket with
//! raw frames.

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use bytes::Bytes;

use h2engine::Command;
use h2engine::Commands;
use h2engine::DataFin;
use h2engine::EndStream;
use h2engine::ErrorCode;
use h2engine::Headers;
use h2engine::InfoMessage;
use h2engine::ServerConf;
use h2engine::ServerRequest;
use h2engine::StreamHandler;
use h2engine::StreamId;
use h2engine::TerminateReason;

use h2engine_test::init_logger;
use h2engine_test::HttpConnTester;
use h2engine_test::ServerOneConn;

/// Records requests and terminations; responds per a supplied closure.
struct RecordingHandler<F> {
    respond: F,
    requests: Arc<Mutex<Vec<ServerRequest>>>,
    terminations: Arc<Mutex<Vec<(StreamId, TerminateReason)>>>,
}

impl<F> RecordingHandler<F>
where
    F: Fn(&ServerRequest) -> Commands + Send + Sync + 'static,
{
    fn new(respond: F) -> RecordingHandler<F> {
        RecordingHandler {
            respond,
            requests: Default::default(),
            terminations: Default::default(),
        }
    }
}

impl<F> StreamHandler for RecordingHandler<F>
where
    F: Fn(&ServerRequest) -> Commands + Send + Sync + 'static,
{
    type State = ();

    fn init(&self, _stream_id: StreamId, req: ServerRequest) -> h2engine::Result<(Commands, ())> {
        let commands = (self.respond)(&req);
        self.requests.lock().unwrap().push(req);
        Ok((commands, ()))
    }

    fn data(
        &self,
        _stream_id: StreamId,
        _fin: DataFin,
        _data: Bytes,
        _state: &mut (),
    ) -> h2engine::Result<Commands> {
        Ok(Vec::new())
    }

    fn info(
        &self,
        _stream_id: StreamId,
        _message: InfoMessage,
        _state: &mut (),
    ) -> h2engine::Result<Commands> {
        Ok(Vec::new())
    }

    fn terminate(&self, stream_id: StreamId, reason: &TerminateReason, _state: Option<()>) {
        self.terminations
            .lock()
            .unwrap()
            .push((stream_id, reason.clone()));
    }
}

fn response_200_empty(_req: &ServerRequest) -> Commands {
    vec![Command::Response {
        status: 200,
        headers: Headers::new(),
        body: Bytes::new(),
    }]
}

#[test]
fn valid_connection_round_trip() {
    init_logger();

    let handler = RecordingHandler::new(response_200_empty);
    let requests = handler.requests.clone();
    let server = ServerOneConn::new(handler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.send_preface();
    tester.settings_xchg();

    tester.send_headers(
        1,
        &[
            (":method", "GET"),
            (":scheme", "https"),
            (":authority", "x"),
            (":path", "/"),
        ],
        true,
    );

    let fields = tester.recv_frame_headers_check(1, true);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));

    let requests = requests.lock().unwrap();
    assert_eq!(1, requests.len());
    let req = &requests[0];
    assert_eq!("GET", req.method);
    assert_eq!("https", req.scheme);
    assert_eq!("x", req.host);
    assert_eq!(443, req.port);
    assert_eq!("/", req.path);
    assert_eq!("", req.query);
    assert_eq!("HTTP/2", req.version);
    assert!(!req.has_body);
    assert_eq!(Some(0), req.body_length);
}

#[test]
fn response_with_body() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| {
        let mut headers = Headers::new();
        headers.add("content-type", "text/plain");
        vec![Command::Response {
            status: 200,
            headers,
            body: Bytes::from_static(b"hi there"),
        }]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/hello");

    let fields = tester.recv_frame_headers_check(1, false);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));
    assert_eq!(
        Some("text/plain"),
        HttpConnTester::field(&fields, "content-type")
    );
    assert_eq!(b"hi there".to_vec(), tester.recv_frame_data_check(1, true));
}

#[test]
fn invalid_preface_closes_connection() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.send_raw(b"GET / HTTP/1.1\r\n\r\n        ");

    // the engine speaks first: its SETTINGS goes out before it sees the
    // broken preface
    tester.recv_frame_settings_set();
    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}

#[test]
fn preface_timeout_closes_connection() {
    init_logger();

    let conf = ServerConf {
        preface_timeout: Some(200),
        ..ServerConf::new()
    };
    let server = ServerOneConn::with_conf(RecordingHandler::new(response_200_empty), conf);

    let mut tester = HttpConnTester::connect(server.port());
    // send nothing

    tester.recv_frame_settings_set();
    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}

#[test]
fn settings_ack_timeout_closes_connection() {
    init_logger();

    let conf = ServerConf {
        settings_timeout: Some(200),
        ..ServerConf::new()
    };
    let server = ServerOneConn::with_conf(RecordingHandler::new(response_200_empty), conf);

    let mut tester = HttpConnTester::connect(server.port());
    tester.send_preface();
    tester.send_settings(h2engine::for_test::wire::frame::SettingsFrame::new());
    tester.recv_frame_settings_set();
    // our SETTINGS gets acked, the server's never does
    tester.recv_frame_settings_ack();

    tester.recv_goaway_frame_check(ErrorCode::SettingsTimeout);
    tester.recv_eof();
}

#[test]
fn settings_ack_without_pending_is_protocol_error() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    // a second, spurious ack
    tester.send_frame(h2engine::for_test::wire::frame::SettingsFrame::new_ack());

    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}

#[test]
fn push_promise_from_client_is_protocol_error() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    let fragment = tester.encoder.encode(vec![(":method", "GET"), (":path", "/")]);
    tester.send_frame(h2engine::for_test::wire::frame::PushPromiseFrame::new(
        3, 2, fragment,
    ));

    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}

#[test]
fn continuation_interleave_is_protocol_error() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    // HEADERS without END_HEADERS, then DATA on the same stream
    let fragment = tester.encoder.encode(vec![
        (":method", "GET"),
        (":scheme", "http"),
        (":path", "/"),
    ]);
    let mut headers =
        h2engine::for_test::wire::frame::HeadersFrame::new(fragment.slice(..2), 1);
    headers.set_flag(h2engine::for_test::wire::frame::HeadersFlag::EndStream);
    tester.send_frame(headers);
    tester.send_data(1, b"abcd", true);

    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}

#[test]
fn continuation_without_headers_is_protocol_error() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    let mut continuation = h2engine::for_test::wire::frame::ContinuationFrame::new(
        Bytes::from_static(b"\x82"),
        1,
    );
    continuation.set_flag(h2engine::for_test::wire::frame::ContinuationFlag::EndHeaders);
    tester.send_frame(continuation);

    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}

#[test]
fn headers_resumed_by_continuation() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    let fragment = tester.encoder.encode(vec![
        (":method", "GET"),
        (":scheme", "http"),
        (":authority", "localhost"),
        (":path", "/split"),
    ]);
    let split_at = fragment.len() / 2;

    let mut headers = h2engine::for_test::wire::frame::HeadersFrame::new(
        fragment.slice(..split_at),
        1,
    );
    headers.set_flag(h2engine::for_test::wire::frame::HeadersFlag::EndStream);
    tester.send_frame(headers);

    let mut continuation = h2engine::for_test::wire::frame::ContinuationFrame::new(
        fragment.slice(split_at..),
        1,
    );
    continuation.set_flag(h2engine::for_test::wire::frame::ContinuationFlag::EndHeaders);
    tester.send_frame(continuation);

    let fields = tester.recv_frame_headers_check(1, true);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));
}

#[test]
fn peer_reset_terminates_stream_without_outbound_rst() {
    init_logger();

    let handler = RecordingHandler::new(response_200_empty);
    let terminations = handler.terminations.clone();
    let server = ServerOneConn::new(handler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    tester.recv_frame_headers_check(1, true);

    tester.send_rst(1, ErrorCode::Cancel);

    // no RST comes back; the connection answers the ping directly
    tester.ping_pong(42);

    let terminations = terminations.lock().unwrap();
    assert_eq!(1, terminations.len());
    assert_eq!(1, terminations[0].0);
    assert!(matches!(
        terminations[0].1,
        TerminateReason::StreamError(ErrorCode::Cancel)
    ));
    drop(terminations);

    assert_eq!(0, server.dump_state().streams.len());
}

#[test]
fn data_on_finished_stream_is_stream_closed() {
    init_logger();

    let handler = RecordingHandler::new(response_200_empty);
    let terminations = handler.terminations.clone();
    let server = ServerOneConn::new(handler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    tester.recv_frame_headers_check(1, true);

    tester.send_data(1, b"late", false);
    tester.recv_rst_frame_check(1, ErrorCode::StreamClosed);

    // the connection survives
    tester.ping_pong(7);

    let terminations = terminations.lock().unwrap();
    assert_eq!(1, terminations.len());
    assert!(matches!(
        terminations[0].1,
        TerminateReason::StreamError(ErrorCode::StreamClosed)
    ));
}

#[test]
fn data_on_unknown_stream_is_stream_closed() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_data(1, b"who", false);
    tester.recv_rst_frame_check(1, ErrorCode::StreamClosed);
    tester.ping_pong(8);
}

#[test]
fn request_body_delivered_with_length() {
    init_logger();

    struct EchoHandler;

    impl StreamHandler for EchoHandler {
        type State = Vec<u8>;

        fn init(
            &self,
            _stream_id: StreamId,
            req: ServerRequest,
        ) -> h2engine::Result<(Commands, Vec<u8>)> {
            assert!(req.has_body);
            assert_eq!(Some(8), req.body_length);
            Ok((Vec::new(), Vec::new()))
        }

        fn data(
            &self,
            _stream_id: StreamId,
            fin: DataFin,
            data: Bytes,
            state: &mut Vec<u8>,
        ) -> h2engine::Result<Commands> {
            state.extend_from_slice(&data);
            match fin {
                DataFin::Nofin => Ok(Vec::new()),
                DataFin::Fin { body_length } => {
                    assert_eq!(body_length as usize, state.len());
                    Ok(vec![
                        Command::Response {
                            status: 200,
                            headers: Headers::new(),
                            body: Bytes::from(state.clone()),
                        },
                        Command::Stop,
                    ])
                }
            }
        }

        fn info(
            &self,
            _stream_id: StreamId,
            _message: InfoMessage,
            _state: &mut Vec<u8>,
        ) -> h2engine::Result<Commands> {
            Ok(Vec::new())
        }

        fn terminate(
            &self,
            _stream_id: StreamId,
            _reason: &TerminateReason,
            _state: Option<Vec<u8>>,
        ) {
        }
    }

    let server = ServerOneConn::new(EchoHandler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_headers(
        1,
        &[
            (":method", "POST"),
            (":scheme", "http"),
            (":authority", "localhost"),
            (":path", "/echo"),
            ("content-length", "8"),
        ],
        false,
    );
    tester.send_data(1, b"abcd", false);
    tester.send_data(1, b"efgh", true);

    tester.recv_frame_headers_check(1, false);
    assert_eq!(b"abcdefgh".to_vec(), tester.recv_frames_data_to_end(1));

    tester.ping_pong(9);
    assert_eq!(0, server.dump_state().streams.len());
}

#[test]
fn malformed_content_length_resets_stream() {
    init_logger();

    let handler = RecordingHandler::new(response_200_empty);
    let requests = handler.requests.clone();
    let server = ServerOneConn::new(handler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_headers(
        1,
        &[
            (":method", "POST"),
            (":scheme", "http"),
            (":authority", "localhost"),
            (":path", "/"),
            ("content-length", "banana"),
        ],
        false,
    );

    tester.recv_rst_frame_check(1, ErrorCode::ProtocolError);
    tester.ping_pong(10);

    // the handler never saw the request
    assert_eq!(0, requests.lock().unwrap().len());
}

#[test]
fn cookie_crumbs_joined_other_duplicates_comma_joined() {
    init_logger();

    let handler = RecordingHandler::new(response_200_empty);
    let requests = handler.requests.clone();
    let server = ServerOneConn::new(handler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_headers(
        1,
        &[
            (":method", "GET"),
            (":scheme", "http"),
            (":authority", "localhost"),
            (":path", "/"),
            ("cookie", "a=1"),
            ("cookie", "b=2"),
            ("accept", "text/html"),
            ("accept", "text/plain"),
        ],
        true,
    );

    tester.recv_frame_headers_check(1, true);

    let requests = requests.lock().unwrap();
    assert_eq!(Some("a=1; b=2"), requests[0].headers.get("cookie"));
    assert_eq!(
        Some("text/html, text/plain"),
        requests[0].headers.get("accept")
    );
}

#[test]
fn set_cookie_emitted_as_separate_fields() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| {
        let mut headers = Headers::new();
        headers.add("set-cookie", "a=1");
        headers.add("set-cookie", "b=2");
        vec![Command::Response {
            status: 200,
            headers,
            body: Bytes::new(),
        }]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    let fields = tester.recv_frame_headers_check(1, true);

    let set_cookies: Vec<&str> = fields
        .iter()
        .filter(|(n, _)| n == "set-cookie")
        .map(|(_, v)| v.as_str())
        .collect();
    assert_eq!(vec!["a=1", "b=2"], set_cookies);
}

#[test]
fn stop_on_idle_stream_sends_204() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| vec![Command::Stop]));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    let fields = tester.recv_frame_headers_check(1, true);
    assert_eq!(Some("204"), HttpConnTester::field(&fields, ":status"));

    tester.ping_pong(11);
    assert_eq!(0, server.dump_state().streams.len());
}

#[test]
fn stop_after_streaming_sends_empty_fin_data() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| {
        vec![
            Command::Headers {
                status: 200,
                headers: Headers::new(),
            },
            Command::Data {
                end_stream: EndStream::No,
                data: Bytes::from_static(b"partial"),
            },
            Command::Stop,
        ]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    tester.recv_frame_headers_check(1, false);
    assert_eq!(b"partial".to_vec(), tester.recv_frame_data_check(1, false));
    assert!(tester.recv_frame_data_check(1, true).is_empty());

    tester.ping_pong(12);
    assert_eq!(0, server.dump_state().streams.len());
}

#[test]
fn commands_after_stop_are_discarded() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| {
        vec![
            Command::Stop,
            Command::Response {
                status: 500,
                headers: Headers::new(),
                body: Bytes::from_static(b"never"),
            },
        ]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    let fields = tester.recv_frame_headers_check(1, true);
    assert_eq!(Some("204"), HttpConnTester::field(&fields, ":status"));

    // nothing but the ping ack follows
    tester.ping_pong(13);
}

#[test]
fn large_response_body_split_to_frame_size() {
    init_logger();

    let body: Vec<u8> = (0..40_000u32).map(|i| i as u8).collect();
    let body_clone = body.clone();
    let server = ServerOneConn::new(RecordingHandler::new(move |_req| {
        vec![Command::Response {
            status: 200,
            headers: Headers::new(),
            body: Bytes::from(body_clone.clone()),
        }]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/big");
    tester.recv_frame_headers_check(1, false);
    let collected = tester.recv_frames_data_to_end(1);
    assert_eq!(body, collected);
}

#[test]
fn large_response_headers_use_continuation() {
    init_logger();

    let big_value = "v".repeat(20_000);
    let server = ServerOneConn::new(RecordingHandler::new(move |_req| {
        let mut headers = Headers::new();
        headers.add("x-big", big_value.clone());
        vec![Command::Response {
            status: 200,
            headers,
            body: Bytes::new(),
        }]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    let (frame, fields, cont_count) = tester.recv_frame_headers_decode();
    assert_eq!(1, frame.stream_id);
    assert!(cont_count >= 1, "expected CONTINUATION frames");
    assert_eq!(
        Some(20_000),
        HttpConnTester::field(&fields, "x-big").map(|v| v.len())
    );
}

#[test]
fn handler_panic_resets_stream_and_connection_survives() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|req: &ServerRequest| {
        if req.path == "/panic" {
            panic!("requested");
        }
        response_200_empty(req)
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/panic");
    tester.recv_rst_frame_check(1, ErrorCode::InternalError);

    tester.send_get(3, "/fine");
    let fields = tester.recv_frame_headers_check(3, true);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));
}

#[test]
fn handler_internal_error_command_resets_stream() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| {
        vec![
            Command::InternalError("worker gone".to_owned()),
            Command::Response {
                status: 200,
                headers: Headers::new(),
                body: Bytes::new(),
            },
        ]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    tester.recv_rst_frame_check(1, ErrorCode::InternalError);
    tester.ping_pong(14);
}

#[test]
fn push_promise_emitted_and_promised_stream_responds() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|req: &ServerRequest| {
        if req.path == "/style.css" {
            vec![Command::Response {
                status: 200,
                headers: Headers::new(),
                body: Bytes::from_static(b"body{}"),
            }]
        } else {
            let mut push_headers = Headers::new();
            push_headers.add("accept", "text/css");
            vec![
                Command::Push {
                    method: "GET".to_owned(),
                    scheme: "http".to_owned(),
                    host: "localhost".to_owned(),
                    port: 80,
                    path: "/style.css".to_owned(),
                    query: String::new(),
                    headers: push_headers,
                },
                Command::Response {
                    status: 200,
                    headers: Headers::new(),
                    body: Bytes::from_static(b"<html/>"),
                },
            ]
        }
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");

    let (push_promise, fields) = tester.recv_frame_push_promise();
    assert_eq!(1, push_promise.stream_id);
    assert_eq!(2, push_promise.promised_stream_id);
    assert_eq!(Some("GET"), HttpConnTester::field(&fields, ":method"));
    // scheme-default port is omitted from the authority
    assert_eq!(Some("localhost"), HttpConnTester::field(&fields, ":authority"));
    assert_eq!(Some("/style.css"), HttpConnTester::field(&fields, ":path"));

    let fields = tester.recv_frame_headers_check(1, false);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));
    assert_eq!(b"<html/>".to_vec(), tester.recv_frame_data_check(1, true));

    let fields = tester.recv_frame_headers_check(2, false);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));
    assert_eq!(b"body{}".to_vec(), tester.recv_frame_data_check(2, true));
}

#[test]
fn sendfile_streams_file_region() {
    init_logger();

    let content: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    let path = std::env::temp_dir().join(format!("h2engine-sendfile-{}", std::process::id()));
    std::fs::File::create(&path)
        .unwrap()
        .write_all(&content)
        .unwrap();

    let path_for_handler = path.clone();
    let server = ServerOneConn::new(RecordingHandler::new(move |_req| {
        vec![
            Command::Headers {
                status: 200,
                headers: Headers::new(),
            },
            Command::SendFile {
                end_stream: EndStream::Yes,
                offset: 5,
                count: 30_000,
                path: path_for_handler.clone(),
            },
        ]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/file");
    tester.recv_frame_headers_check(1, false);
    let collected = tester.recv_frames_data_to_end(1);
    assert_eq!(&content[5..30_005], &collected[..]);

    std::fs::remove_file(&path).ok();
}

#[test]
fn sendfile_missing_file_resets_stream() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| {
        vec![
            Command::Headers {
                status: 200,
                headers: Headers::new(),
            },
            Command::SendFile {
                end_stream: EndStream::Yes,
                offset: 0,
                count: 1000,
                path: "/nonexistent/h2engine-no-such-file".into(),
            },
        ]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/file");
    tester.recv_frame_headers_check(1, false);
    tester.recv_rst_frame_check(1, ErrorCode::InternalError);
    tester.ping_pong(15);
}

#[test]
fn info_message_reaches_handler() {
    init_logger();

    struct InfoHandler;

    impl StreamHandler for InfoHandler {
        type State = ();

        fn init(
            &self,
            _stream_id: StreamId,
            _req: ServerRequest,
        ) -> h2engine::Result<(Commands, ())> {
            Ok((
                vec![Command::Headers {
                    status: 200,
                    headers: Headers::new(),
                }],
                (),
            ))
        }

        fn data(
            &self,
            _stream_id: StreamId,
            _fin: DataFin,
            _data: Bytes,
            _state: &mut (),
        ) -> h2engine::Result<Commands> {
            Ok(Vec::new())
        }

        fn info(
            &self,
            _stream_id: StreamId,
            message: InfoMessage,
            _state: &mut (),
        ) -> h2engine::Result<Commands> {
            let text = message.downcast::<&str>().unwrap();
            Ok(vec![
                Command::Data {
                    end_stream: EndStream::Yes,
                    data: Bytes::copy_from_slice(text.as_bytes()),
                },
                Command::Stop,
            ])
        }

        fn terminate(&self, _stream_id: StreamId, _reason: &TerminateReason, _state: Option<()>) {
        }
    }

    let server = ServerOneConn::new(InfoHandler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    tester.recv_frame_headers_check(1, false);

    server.stream_message(1, Box::new("deferred"));

    assert_eq!(b"deferred".to_vec(), tester.recv_frame_data_check(1, true));
}

#[test]
fn priority_and_window_update_accepted_without_effect() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    // PRIORITY is parsed but has no effect; the engine never sends one,
    // so craft it by hand: stream 1 depends on stream 0, weight 16
    let mut raw = Vec::new();
    raw.extend_from_slice(&[0, 0, 5, 0x2, 0, 0, 0, 0, 1]);
    raw.extend_from_slice(&[0, 0, 0, 0, 15]);
    tester.send_raw(&raw);

    tester.send_frame(h2engine::for_test::wire::frame::WindowUpdateFrame::for_connection(1000));
    tester.send_frame(h2engine::for_test::wire::frame::WindowUpdateFrame::for_stream(1, 1000));

    tester.ping_pong(16);

    tester.send_get(1, "/");
    let fields = tester.recv_frame_headers_check(1, true);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));
}

#[test]
fn flow_and_switch_protocol_commands_are_inert() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(|_req| {
        vec![
            Command::Flow(65_535),
            Command::SwitchProtocol("websocket".to_owned()),
            Command::Response {
                status: 200,
                headers: Headers::new(),
                body: Bytes::new(),
            },
        ]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    let fields = tester.recv_frame_headers_check(1, true);
    assert_eq!(Some("200"), HttpConnTester::field(&fields, ":status"));
}

#[test]
fn spawned_child_aborted_when_stream_resets() {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;

    init_logger();

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let dropped = Arc::new(AtomicBool::new(false));
    let dropped_for_handler = dropped.clone();

    let server = ServerOneConn::new(RecordingHandler::new(move |_req| {
        let guard = SetOnDrop(dropped_for_handler.clone());
        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        vec![
            Command::Spawn(h2engine::ChildTask::new(handle)),
            Command::Response {
                status: 200,
                headers: Headers::new(),
                body: Bytes::new(),
            },
        ]
    }));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    tester.recv_frame_headers_check(1, true);
    assert!(!dropped.load(Ordering::SeqCst));

    tester.send_rst(1, ErrorCode::Cancel);
    tester.ping_pong(17);

    // aborting the child drops its future, and the guard with it
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !dropped.load(Ordering::SeqCst) {
        assert!(std::time::Instant::now() < deadline, "child not aborted");
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}

#[test]
fn goaway_from_client_stops_connection() {
    init_logger();

    let handler = RecordingHandler::new(response_200_empty);
    let terminations = handler.terminations.clone();
    let server = ServerOneConn::new(handler);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(1, "/");
    tester.recv_frame_headers_check(1, true);

    tester.send_goaway(1);
    tester.recv_eof();

    // the active stream got its terminate notification
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        {
            let terminations = terminations.lock().unwrap();
            if !terminations.is_empty() {
                assert!(matches!(terminations[0].1, TerminateReason::Stop));
                break;
            }
        }
        assert!(std::time::Instant::now() < deadline, "no terminate seen");
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    let _ = server;
}

#[test]
fn idle_timeout_closes_connection() {
    init_logger();

    let conf = ServerConf {
        idle_timeout: Some(300),
        ..ServerConf::new()
    };
    let server = ServerOneConn::with_conf(RecordingHandler::new(response_200_empty), conf);

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    // no further activity
    tester.recv_goaway_frame_check(ErrorCode::InternalError);
    tester.recv_eof();
}

#[test]
fn even_stream_id_from_client_is_protocol_error() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_headers(
        2,
        &[
            (":method", "GET"),
            (":scheme", "http"),
            (":path", "/"),
        ],
        true,
    );

    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}

#[test]
fn non_increasing_stream_id_is_protocol_error() {
    init_logger();

    let server = ServerOneConn::new(RecordingHandler::new(response_200_empty));

    let mut tester = HttpConnTester::connect(server.port());
    tester.handshake();

    tester.send_get(5, "/");
    tester.recv_frame_headers_check(5, true);

    tester.send_get(3, "/");
    tester.recv_goaway_frame_check(ErrorCode::ProtocolError);
    tester.recv_eof();
}
