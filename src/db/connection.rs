//! Owner thread for the SQLite connection.
//!
//! The connection is opened and migrated on the caller's thread, then moved
//! onto a dedicated thread. Async code only reaches it through
//! [`Database::execute`], which ships a closure over a channel and awaits
//! the reply.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

impl Location {
    fn label(&self) -> &Path {
        match self {
            Location::File(path) => path,
            Location::Memory => Path::new(":memory:"),
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = match self {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create database directory {}", parent.display())
                    })?;
                }
                let conn = Connection::open(path)
                    .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    warn!("WAL journal unavailable for {}: {err}", path.display());
                }
                conn
            }
            Location::Memory => {
                Connection::open_in_memory().context("failed to open in-memory SQLite database")?
            }
        };

        // session_labels rows cascade from session_results.
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        Ok(conn)
    }
}

struct Worker {
    requests: mpsc::Sender<Request>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.requests.send(Request::Close).is_err() {
            warn!("database thread exited before close request");
        }
        if let Err(err) = thread.join() {
            error!("database thread panicked: {err:?}");
        }
    }
}

fn serve(mut conn: Connection, inbox: mpsc::Receiver<Request>) {
    for request in inbox {
        match request {
            Request::Run(job) => job(&mut conn),
            Request::Close => break,
        }
    }

    if let Err((_, err)) = conn.close() {
        warn!("failed to close database cleanly: {err}");
    }
    info!("database thread stopped");
}

/// Cloneable SQLite handle. Every clone talks to the same connection thread,
/// which stops when the last clone drops.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<Location>,
}

impl Database {
    /// Open (creating if needed) a file database and bring its schema up to date.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        Self::launch(Location::File(db_path))
    }

    /// Private in-memory database, gone when the last handle drops.
    pub fn in_memory() -> Result<Self> {
        Self::launch(Location::Memory)
    }

    fn launch(location: Location) -> Result<Self> {
        let mut conn = location.open()?;
        run_migrations(&mut conn).context("failed to run database migrations")?;

        let (requests, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("movesafe-db".into())
            .spawn(move || serve(conn, inbox))
            .context("failed to spawn database thread")?;

        info!("database ready at {}", location.label().display());

        Ok(Self {
            worker: Arc::new(Worker {
                requests,
                thread: Some(thread),
            }),
            location: Arc::new(location),
        })
    }

    pub fn path(&self) -> &Path {
        self.location.label()
    }

    /// Run `task` on the connection thread and await its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have stopped waiting.
            let _ = reply.send(task(conn));
        });

        self.worker
            .requests
            .send(Request::Run(job))
            .map_err(|_| anyhow!("database thread is not running"))?;

        response
            .await
            .map_err(|_| anyhow!("database thread dropped the request"))?
    }
}
