//! Worker thread that owns a rusqlite connection.
//!
//! A rusqlite statement borrows its connection, so a cursor that keeps a
//! statement stepping between calls cannot be stored next to the connection.
//! The worker owns the connection on its own thread and keeps each open cursor
//! as a frame on that thread's stack. Fetches on the innermost cursor step its
//! statement in place; a request for an outer cursor first buffers whatever is
//! left of the inner ones so the stack can unwind to it. Other requests are
//! served at any depth, so a connection stays usable while cursors are open.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rusqlite::types::Value;
use rusqlite::{Rows, params_from_iter};
use tracing::debug;

use super::query::{build_result_set, sqlite_extract_value};
use crate::error::DbError;
use crate::results::ResultSet;
use crate::types::SqlValue;

static NEXT_WORKER: AtomicU64 = AtomicU64::new(1);

pub(crate) type CursorId = u64;

type Reply<T> = Sender<Result<T, DbError>>;
type BoxedResponse = Result<Box<dyn Any + Send>, DbError>;
type BoxedCallback = Box<dyn FnOnce(&rusqlite::Connection) -> BoxedResponse + Send>;

/// A cursor the worker has started stepping.
pub(crate) struct OpenedCursor {
    pub(crate) id: CursorId,
    pub(crate) columns: Vec<String>,
}

/// Requests that run to completion at any cursor depth.
enum Request {
    Batch {
        sql: String,
        reply: Reply<()>,
    },
    Execute {
        sql: String,
        params: Vec<Value>,
        cached: bool,
        reply: Reply<u64>,
    },
    Select {
        sql: String,
        params: Vec<Value>,
        cached: bool,
        reply: Reply<ResultSet>,
    },
    Prepare {
        sql: String,
        original: String,
        reply: Reply<()>,
    },
    WithConnection {
        callback: BoxedCallback,
        reply: Sender<BoxedResponse>,
    },
}

enum Command {
    Run(Request),
    OpenCursor {
        sql: String,
        params: Vec<Value>,
        reply: Reply<OpenedCursor>,
    },
    Fetch {
        id: CursorId,
        reply: Reply<Option<Vec<SqlValue>>>,
    },
    CloseCursor {
        id: CursorId,
    },
    Shutdown,
}

/// Client side of a worker. Dropping it stops the thread and closes the
/// connection.
pub(crate) struct SqliteWorker {
    sender: Sender<Command>,
    name: String,
}

impl SqliteWorker {
    pub(crate) fn spawn(conn: rusqlite::Connection) -> Result<Self, DbError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let name = format!(
            "sqlite-worker-{}",
            NEXT_WORKER.fetch_add(1, Ordering::Relaxed)
        );
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut worker = Worker {
                    conn: &conn,
                    receiver,
                    open: Vec::new(),
                    buffered: HashMap::new(),
                    next_cursor: 1,
                };
                worker.serve(None);
                debug!("SQLite worker stopped");
            })
            .map_err(|err| {
                DbError::ConnectionError(format!("failed to spawn SQLite worker thread: {err}"))
            })?;
        Ok(Self { sender, name })
    }

    fn send(&self, command: Command) -> Result<(), DbError> {
        self.sender
            .send(command)
            .map_err(|_| DbError::ConnectionError("SQLite worker closed".into()))
    }

    fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, DbError> {
        let (reply, response) = mpsc::channel();
        self.send(command(reply))?;
        response.recv().map_err(|_| {
            DbError::ConnectionError("SQLite worker dropped a pending request".into())
        })?
    }

    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.request(|reply| {
            Command::Run(Request::Batch {
                sql: sql.to_owned(),
                reply,
            })
        })
    }

    /// `cached` statements go through rusqlite's per-connection cache.
    pub(crate) fn execute(&self, sql: &str, params: Vec<Value>, cached: bool) -> Result<u64, DbError> {
        self.request(|reply| {
            Command::Run(Request::Execute {
                sql: sql.to_owned(),
                params,
                cached,
                reply,
            })
        })
    }

    pub(crate) fn select(
        &self,
        sql: &str,
        params: Vec<Value>,
        cached: bool,
    ) -> Result<ResultSet, DbError> {
        self.request(|reply| {
            Command::Run(Request::Select {
                sql: sql.to_owned(),
                params,
                cached,
                reply,
            })
        })
    }

    /// Compile `sql` into the statement cache. Errors name `original`, the
    /// text before host variables were rewritten.
    pub(crate) fn prepare(&self, sql: &str, original: &str) -> Result<(), DbError> {
        self.request(|reply| {
            Command::Run(Request::Prepare {
                sql: sql.to_owned(),
                original: original.to_owned(),
                reply,
            })
        })
    }

    pub(crate) fn open_cursor(&self, sql: &str, params: Vec<Value>) -> Result<OpenedCursor, DbError> {
        self.request(|reply| Command::OpenCursor {
            sql: sql.to_owned(),
            params,
            reply,
        })
    }

    /// Next row of cursor `id`; `None` once it is exhausted or closed.
    pub(crate) fn fetch(&self, id: CursorId) -> Result<Option<Vec<SqlValue>>, DbError> {
        self.request(|reply| Command::Fetch { id, reply })
    }

    pub(crate) fn close_cursor(&self, id: CursorId) {
        let _ = self.send(Command::CloseCursor { id });
    }

    pub(crate) fn with_connection<F, R>(&self, func: F) -> Result<R, DbError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<R, DbError> + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = mpsc::channel();
        let callback: BoxedCallback =
            Box::new(move |conn| func(conn).map(|value| Box::new(value) as Box<dyn Any + Send>));
        self.send(Command::Run(Request::WithConnection { callback, reply }))?;
        match response.recv() {
            Ok(Ok(payload)) => payload
                .downcast::<R>()
                .map(|boxed| *boxed)
                .map_err(|_| DbError::Other("SQLite worker response downcast failure".into())),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(DbError::ConnectionError(
                "SQLite worker dropped while handling custom callback".into(),
            )),
        }
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

impl fmt::Debug for SqliteWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteWorker")
            .field("name", &self.name)
            .finish()
    }
}

/// How a cursor frame ended.
enum Exit {
    Done,
    Shutdown,
    /// The command targets a cursor further out; the frame buffered its rows.
    Redispatch(Command),
}

/// An open cursor: a statement mid-step on the worker's stack.
struct Frame<'s> {
    id: CursorId,
    rows: Rows<'s>,
    sql: String,
    width: usize,
}

impl Frame<'_> {
    fn step(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
        let sql = &self.sql;
        match self.rows.next().map_err(|e| DbError::sql(sql, e))? {
            Some(row) => (0..self.width)
                .map(|i| sqlite_extract_value(row, i))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            None => Ok(None),
        }
    }
}

struct Worker<'c> {
    conn: &'c rusqlite::Connection,
    receiver: Receiver<Command>,
    /// Ids of the cursor frames currently on the stack, innermost last.
    open: Vec<CursorId>,
    /// Remaining rows of cursors unwound to reach an outer one.
    buffered: HashMap<CursorId, VecDeque<Result<Vec<SqlValue>, DbError>>>,
    next_cursor: CursorId,
}

impl Worker<'_> {
    fn serve(&mut self, mut frame: Option<Frame<'_>>) -> Exit {
        let mut pending = None;
        loop {
            let command = match pending.take() {
                Some(command) => command,
                None => match self.receiver.recv() {
                    Ok(command) => command,
                    Err(_) => return Exit::Shutdown,
                },
            };
            match command {
                Command::Run(request) => self.run(request),
                Command::OpenCursor { sql, params, reply } => {
                    match self.open_cursor(sql, &params, &reply) {
                        Exit::Done => {}
                        Exit::Shutdown => return Exit::Shutdown,
                        Exit::Redispatch(command) => pending = Some(command),
                    }
                }
                Command::Fetch { id, reply } => {
                    if let Some(rest) = self.buffered.get_mut(&id) {
                        let next = rest.pop_front();
                        if rest.is_empty() {
                            self.buffered.remove(&id);
                        }
                        let _ = reply.send(next.transpose());
                    } else if let Some(top) = frame.as_mut().filter(|f| f.id == id) {
                        let next = top.step();
                        let finished = !matches!(next, Ok(Some(_)));
                        let _ = reply.send(next);
                        if finished {
                            return Exit::Done;
                        }
                    } else if self.open.contains(&id) {
                        if let Some(top) = frame.take() {
                            self.buffer(top);
                        }
                        return Exit::Redispatch(Command::Fetch { id, reply });
                    } else {
                        let _ = reply.send(Ok(None));
                    }
                }
                Command::CloseCursor { id } => {
                    if self.buffered.remove(&id).is_some() {
                        continue;
                    }
                    if frame.as_ref().is_some_and(|f| f.id == id) {
                        return Exit::Done;
                    }
                    if self.open.contains(&id) {
                        if let Some(top) = frame.take() {
                            self.buffer(top);
                        }
                        return Exit::Redispatch(Command::CloseCursor { id });
                    }
                }
                Command::Shutdown => return Exit::Shutdown,
            }
        }
    }

    fn open_cursor(&mut self, sql: String, params: &[Value], reply: &Reply<OpenedCursor>) -> Exit {
        let conn = self.conn;
        let mut stmt = match conn.prepare_cached(&sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                let _ = reply.send(Err(DbError::sql(&sql, e)));
                return Exit::Done;
            }
        };
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| (*name).to_string())
            .collect();
        let width = columns.len();
        let rows = match stmt.query(params_from_iter(params.iter())) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = reply.send(Err(DbError::sql(&sql, e)));
                return Exit::Done;
            }
        };

        let id = self.next_cursor;
        self.next_cursor += 1;
        if reply.send(Ok(OpenedCursor { id, columns })).is_err() {
            return Exit::Done;
        }
        debug!(cursor = id, depth = self.open.len() + 1, "opened SQLite cursor");
        self.open.push(id);
        let exit = self.serve(Some(Frame {
            id,
            rows,
            sql,
            width,
        }));
        self.open.pop();
        exit
    }

    fn buffer(&mut self, mut frame: Frame<'_>) {
        let mut rest = VecDeque::new();
        loop {
            match frame.step() {
                Ok(Some(values)) => rest.push_back(Ok(values)),
                Ok(None) => break,
                Err(err) => {
                    rest.push_back(Err(err));
                    break;
                }
            }
        }
        debug!(cursor = frame.id, rows = rest.len(), "buffered inner cursor to reach an outer one");
        if !rest.is_empty() {
            self.buffered.insert(frame.id, rest);
        }
    }

    fn run(&self, request: Request) {
        let conn = self.conn;
        match request {
            Request::Batch { sql, reply } => {
                let _ = reply.send(conn.execute_batch(&sql).map_err(|e| DbError::sql(&sql, e)));
            }
            Request::Execute {
                sql,
                params,
                cached,
                reply,
            } => {
                let changed = if cached {
                    conn.prepare_cached(&sql)
                        .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
                } else {
                    conn.prepare(&sql)
                        .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
                };
                let _ = reply.send(changed.map(|n| n as u64).map_err(|e| DbError::sql(&sql, e)));
            }
            Request::Select {
                sql,
                params,
                cached,
                reply,
            } => {
                let outcome = if cached {
                    conn.prepare_cached(&sql)
                        .map_err(|e| DbError::sql(&sql, e))
                        .and_then(|mut stmt| build_result_set(&mut stmt, &params, &sql))
                } else {
                    conn.prepare(&sql)
                        .map_err(|e| DbError::sql(&sql, e))
                        .and_then(|mut stmt| build_result_set(&mut stmt, &params, &sql))
                };
                let _ = reply.send(outcome);
            }
            Request::Prepare {
                sql,
                original,
                reply,
            } => {
                let outcome = conn
                    .prepare_cached(&sql)
                    .map(drop)
                    .map_err(|e| DbError::sql(&original, e));
                let _ = reply.send(outcome);
            }
            Request::WithConnection { callback, reply } => {
                let _ = reply.send(callback(conn));
            }
        }
    }
}
