//! Single connection HTTP/2 server harness: accepts one connection and
//! drives it on a dedicated thread.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use futures::channel::oneshot;
use futures::future;
use futures::future::FutureExt;

use h2engine::InfoMessage;
use h2engine::ServerConf;
use h2engine::ServerConn;
use h2engine::ConnStateSnapshot;
use h2engine::StreamHandler;
use h2engine::StreamId;
use tokio::runtime::Runtime;

use crate::BIND_HOST;

pub struct ServerOneConn {
    port: u16,
    join_handle: Option<thread::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn: Arc<Mutex<Option<ServerConn>>>,
}

impl ServerOneConn {
    pub fn new<H: StreamHandler>(service: H) -> Self {
        ServerOneConn::with_conf(service, ServerConf::new())
    }

    pub fn with_conf<H: StreamHandler>(service: H, conf: ServerConf) -> Self {
        let (port_tx, port_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let conn: Arc<Mutex<Option<ServerConn>>> = Default::default();
        let conn_for_thread = conn.clone();

        let join_handle = thread::Builder::new()
            .name("server_one_conn".to_owned())
            .spawn(move || {
                let lp = Runtime::new().unwrap();

                let listener = lp
                    .block_on(tokio::net::TcpListener::bind(
                        (BIND_HOST, 0).to_socket_addrs().unwrap().next().unwrap(),
                    ))
                    .unwrap();

                let actual_port = listener.local_addr().unwrap().port();
                port_tx.send(actual_port).unwrap();

                let service = Arc::new(service);

                let future = async move {
                    let (socket, peer_addr) = match listener.accept().await {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("accept failed: {}", e);
                            return;
                        }
                    };

                    let (conn, future) =
                        ServerConn::new_plain(socket, peer_addr, conf, service);
                    *conn_for_thread.lock().unwrap() = Some(conn);
                    future.await
                };

                let shutdown_rx = shutdown_rx.then(|_| future::ready(()));

                lp.block_on(future::select(Box::pin(shutdown_rx), Box::pin(future)));
            })
            .expect("spawn");

        ServerOneConn {
            port: port_rx.recv().unwrap(),
            join_handle: Some(join_handle),
            shutdown_tx: Some(shutdown_tx),
            conn,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn dump_state(&self) -> ConnStateSnapshot {
        let guard = self.conn.lock().expect("lock");
        let conn = guard.as_ref().expect("conn not yet accepted");
        futures::executor::block_on(conn.dump_state()).expect("dump_state")
    }

    pub fn stream_message(&self, stream_id: StreamId, message: InfoMessage) {
        let guard = self.conn.lock().expect("lock");
        let conn = guard.as_ref().expect("conn not yet accepted");
        conn.stream_message(stream_id, message).expect("stream_message");
    }
}

impl Drop for ServerOneConn {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take().unwrap().send(()));
        self.join_handle.take().unwrap().join().ok();
    }
}
