//! Test support for `h2engine`: a synchronous raw-frame connection
//! tester and a one-connection server harness.

#[macro_use]
extern crate log;

pub mod server_one_conn;
pub mod tester;

pub use server_one_conn::ServerOneConn;
pub use tester::HttpConnTester;

pub const BIND_HOST: &str = "127.0.0.1";

/// `env_logger` setup shared by the integration tests.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
