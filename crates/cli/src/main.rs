#![forbid(unsafe_code)]

//! Ask whoever listens on `localhost:5555` for their name and greet them.
//!
//! Start a TCP listener on that port (e.g. `nc -l 5555`) before running.

use sockwrap::{ConnError, Connection, Received};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HOST: &str = "localhost";
const PORT: u16 = 5555;
const PROMPT: &str = "What is your name? ";
const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Connect(#[from] ConnError),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // the demo always exits cleanly; failures are only visible with RUST_LOG=debug
    if let Err(e) = run(HOST, PORT) {
        tracing::debug!(error = %e, "greeting failed");
    }
}

fn run(host: &str, port: u16) -> Result<(), CliError> {
    let mut conn = Connection::connect(host, port, false)?;
    greet(&mut conn);
    conn.close();
    Ok(())
}

/// Prompt for a name and answer unless the peer has gone away.
fn greet(conn: &mut Connection) -> Received<String> {
    conn.write(PROMPT);
    let name = conn.read(MAX_NAME_LEN);
    if !name.is_closed() {
        let n = name.data().map_or("", String::as_str);
        conn.write(&format!("Nice to meet you, {n}\n"));
    }
    name
}
