//! Loading of product and mesh resources.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use runtime::LoopHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    NotFound(String),
    Io(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(path) => write!(f, "resource not found: {path}"),
            LoadError::Io(msg) => write!(f, "resource read failed: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

pub trait ResourceLoader {
    fn load(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>>;
}

/// Reads resources relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceLoader for FileLoader {
    fn load(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let full = self.root.join(path.trim_start_matches('/'));
        let result = std::fs::read(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(full.display().to_string()),
            _ => LoadError::Io(format!("{}: {e}", full.display())),
        });
        debug!(path = %full.display(), ok = result.is_ok(), "loaded resource");
        future::ready(result).boxed_local()
    }
}

/// In-memory resources served after a virtual latency.
#[derive(Clone)]
pub struct MemoryLoader {
    handle: LoopHandle,
    latency_ms: u64,
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    requests: Rc<Cell<usize>>,
}

impl fmt::Debug for MemoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLoader")
            .field("latency_ms", &self.latency_ms)
            .field("files", &self.files.borrow().len())
            .field("requests", &self.requests.get())
            .finish()
    }
}

impl MemoryLoader {
    pub fn new(handle: LoopHandle, latency_ms: u64) -> Self {
        Self {
            handle,
            latency_ms,
            files: Rc::new(RefCell::new(HashMap::new())),
            requests: Rc::new(Cell::new(0)),
        }
    }

    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(path.into(), bytes.into());
    }

    /// Number of loads requested so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        self.requests.set(self.requests.get() + 1);
        let path = path.to_string();
        let files = Rc::clone(&self.files);
        let sleep = self.handle.sleep(self.latency_ms);
        async move {
            sleep.await;
            files
                .borrow()
                .get(&path)
                .cloned()
                .ok_or(LoadError::NotFound(path))
        }
        .boxed_local()
    }
}
