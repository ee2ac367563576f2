//! Thin stream-socket front end (§6.4), behind the `server` feature.
//!
//! Binds a `UnixListener`, spawns one thread per connection (matching §5's threading
//! model), and drives each connection's statements through the same `dsl::parse` +
//! `Executor::execute` boundary the in-process tests use. The wire framing carries no
//! contract beyond "one statement per line, one reply per line" — this is scaffolding
//! to give the crate an actual entry point, not a faithful reproduction of the
//! original's binary protocol.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::dsl;
use crate::error::{ExecError, StatusCode};
use crate::executor::Executor;

/// Bind `socket_path` and serve connections until the process is killed or a client
/// sends `shutdown` (which snapshots and returns `Ok(())`, ending the listen loop).
pub fn serve(config: Config, socket_path: impl AsRef<Path>) -> std::io::Result<()> {
    let socket_path = socket_path.as_ref();
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "listening");

    let catalog = Catalog::open(config).map_err(|e| std::io::Error::other(e.to_string()))?;
    let shared = Arc::new(Mutex::new(catalog));

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || handle_connection(stream, shared));
    }
    Ok(())
}

fn handle_connection(stream: UnixStream, shared: Arc<Mutex<Catalog>>) {
    let reader = BufReader::new(stream.try_clone().expect("clone unix stream"));
    let mut writer = stream;

    // Each connection gets its own context (§3: "intermediates live only inside the
    // client context"). The catalog is a single shared resource (§3: "at most one
    // database exists at a time"), so a connection holds the lock for its whole
    // lifetime rather than per statement: concurrent connections serialize on this
    // mutex instead of a second `Executor` ever seeing a stale placeholder catalog.
    let mut guard = shared.lock().unwrap();
    let catalog = std::mem::replace(&mut *guard, Catalog { config: Config::default(), database: None });
    let mut exec = Executor::new(catalog);

    let mut fatal = false;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "connection read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let (reply, is_fatal) = dispatch(&mut exec, &line);
        let shutting_down = reply.starts_with("OK shutdown");
        if writer.write_all(reply.as_bytes()).is_err() || writer.write_all(b"\n").is_err() {
            break;
        }
        if is_fatal {
            fatal = true;
            break;
        }
        if shutting_down {
            break;
        }
    }

    *guard = exec.catalog;

    // §7: "Fatal errors ... snapshot what is possible and terminate." A poisoned lock
    // or an unrecoverable mapping failure means in-process state can no longer be
    // trusted, so this takes down the whole server rather than just the connection.
    if fatal {
        if let Err(e) = guard.snapshot() {
            error!(error = %e, "best-effort snapshot after fatal error also failed");
        }
        drop(guard);
        error!("fatal error on connection, terminating process");
        std::process::exit(1);
    }
}

fn dispatch(exec: &mut Executor, line: &str) -> (String, bool) {
    let cmd = match dsl::parse(line) {
        Ok(c) => c,
        Err(e) => return (format_error(&e), false),
    };
    match exec.execute(cmd) {
        Ok(StatusCode::OkDone) => ("OK".to_string(), false),
        Ok(StatusCode::OkWaitForResponse) => ("OK".to_string(), false),
        Ok(StatusCode::OkPrint(text)) => (text, false),
        Ok(StatusCode::BatchWait) => ("OK queued".to_string(), false),
        Ok(StatusCode::OkShutdown) => ("OK shutdown".to_string(), false),
        Err(e) => {
            let fatal = e.is_fatal();
            (format_error(&e), fatal)
        }
    }
}

fn format_error(e: &ExecError) -> String {
    format!("ERR {e}")
}
