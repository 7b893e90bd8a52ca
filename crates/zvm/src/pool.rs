//! Process-wide resource pool (§4.1).
//!
//! Every buffer the install pipeline touches is acquired from here instead of
//! allocated ad hoc: acquisition is non-blocking and exhaustion is a typed
//! error (`PoolExhausted`), never a panic or a block. Per the Design Note in
//! §9, the pool lives on an explicit [`Context`] value rather than behind a
//! global/singleton, so tests can build a fresh one pointed at a temp
//! directory.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bumpalo::Bump;

use crate::error::{Result, ZvmError};

/// Matches `PATH_MAX` on the platforms this pool is sized for.
pub const PATH_MAX: usize = 4096;
/// Minimum size of an HTTP operation's response buffer, per §4.1.
pub const HTTP_RESPONSE_BUFFER_MIN: usize = 8 * 1024 * 1024;

const DEFAULT_PATH_BUFFERS: usize = 32;
const DEFAULT_VERSION_ENTRIES: usize = 64;
const DEFAULT_HTTP_OPERATIONS: usize = 8;
const DEFAULT_EXTRACT_OPERATIONS: usize = 4;

/// A fixed-capacity byte buffer that stands in for a path.
pub struct PathBuffer {
    bytes: Vec<u8>,
    len: usize,
}

impl PathBuffer {
    fn new() -> Self {
        Self {
            bytes: vec![0u8; PATH_MAX],
            len: 0,
        }
    }

    /// The writable region of the buffer.
    pub fn slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Finalize the buffer's contents to `written_prefix` bytes.
    pub fn set(&mut self, written_prefix: usize) -> Result<()> {
        if written_prefix > self.bytes.len() {
            return Err(ZvmError::BufferTooSmall {
                needed: written_prefix,
                available: self.bytes.len(),
            });
        }
        self.len = written_prefix;
        Ok(())
    }

    pub fn as_path(&self) -> &Path {
        Path::new(std::str::from_utf8(&self.bytes[..self.len]).unwrap_or(""))
    }

    /// Copy `path`'s textual form into this buffer and return it as an owned
    /// `PathBuf`, bounding archive/store path construction to `PATH_MAX`
    /// instead of an unbounded allocation per entry.
    pub fn write_path(&mut self, path: &Path) -> Result<PathBuf> {
        let text = path.to_string_lossy();
        let bytes = text.as_bytes();
        if bytes.len() > self.bytes.len() {
            return Err(ZvmError::PathTooLong(path.to_path_buf()));
        }
        self.bytes[..bytes.len()].copy_from_slice(bytes);
        self.set(bytes.len())?;
        Ok(self.as_path().to_path_buf())
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

/// A fixed-capacity name buffer for a version string entry.
pub struct VersionEntry {
    bytes: [u8; crate::version::VERSION_ID_MAX_LEN],
    len: usize,
}

impl VersionEntry {
    fn new() -> Self {
        Self {
            bytes: [0u8; crate::version::VERSION_ID_MAX_LEN],
            len: 0,
        }
    }

    pub fn write(&mut self, s: &str) -> Result<()> {
        if s.len() > self.bytes.len() {
            return Err(ZvmError::BufferTooSmall {
                needed: s.len(),
                available: self.bytes.len(),
            });
        }
        self.bytes[..s.len()].copy_from_slice(s.as_bytes());
        self.len = s.len();
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

/// A response buffer reused across one HTTP request/response cycle.
pub struct HttpOperation {
    buf: Vec<u8>,
}

impl HttpOperation {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(HTTP_RESPONSE_BUFFER_MIN),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

/// Two scratch path buffers used while walking an archive during extraction.
pub struct ExtractOperation {
    pub src: PathBuffer,
    pub dst: PathBuffer,
}

impl ExtractOperation {
    pub(crate) fn new() -> Self {
        Self {
            src: PathBuffer::new(),
            dst: PathBuffer::new(),
        }
    }

    fn reset(&mut self) {
        self.src.reset();
        self.dst.reset();
    }
}

/// A free-list backed slab of `T`. Acquisition pops an owned value out;
/// release (on [`Handle`] drop) pushes it back.
struct Slab<T> {
    free: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> Slab<T> {
    fn new(capacity: usize, make: impl Fn() -> T) -> Self {
        Self {
            free: Mutex::new((0..capacity).map(|_| make()).collect()),
            capacity,
        }
    }

    fn acquire(&self) -> Result<T> {
        self.free
            .lock()
            .expect("pool mutex poisoned")
            .pop()
            .ok_or(ZvmError::PoolExhausted {
                capacity: self.capacity,
            })
    }

    fn release(&self, mut value: T, reset: impl FnOnce(&mut T)) {
        reset(&mut value);
        self.free.lock().expect("pool mutex poisoned").push(value);
    }
}

/// Handle macro: each handle owns its buffer and returns it to the slab it
/// came from on drop. The lifetime ties the handle to the [`Context`] that
/// issued it.
macro_rules! handle {
    ($handle:ident, $inner:ty, $slab:ident, $reset:expr) => {
        pub struct $handle<'ctx> {
            value: Option<$inner>,
            slab: &'ctx Slab<$inner>,
        }

        impl<'ctx> $handle<'ctx> {
            fn new(value: $inner, slab: &'ctx Slab<$inner>) -> Self {
                Self {
                    value: Some(value),
                    slab,
                }
            }
        }

        impl std::ops::Deref for $handle<'_> {
            type Target = $inner;
            fn deref(&self) -> &$inner {
                self.value.as_ref().expect("handle used after release")
            }
        }

        impl std::ops::DerefMut for $handle<'_> {
            fn deref_mut(&mut self) -> &mut $inner {
                self.value.as_mut().expect("handle used after release")
            }
        }

        impl Drop for $handle<'_> {
            fn drop(&mut self) {
                if let Some(value) = self.value.take() {
                    self.slab.release(value, $reset);
                }
            }
        }
    };
}

handle!(PathBufferHandle, PathBuffer, slab_path, |b: &mut PathBuffer| b.reset());
handle!(VersionEntryHandle, VersionEntry, slab_version, |v: &mut VersionEntry| v.reset());
handle!(HttpOperationHandle, HttpOperation, slab_http, |h: &mut HttpOperation| h.reset());
handle!(ExtractOperationHandle, ExtractOperation, slab_extract, |e: &mut ExtractOperation| e.reset());

/// Configuration for how many of each resource the pool pre-allocates.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    pub path_buffers: usize,
    pub version_entries: usize,
    pub http_operations: usize,
    pub extract_operations: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            path_buffers: DEFAULT_PATH_BUFFERS,
            version_entries: DEFAULT_VERSION_ENTRIES,
            http_operations: DEFAULT_HTTP_OPERATIONS,
            extract_operations: DEFAULT_EXTRACT_OPERATIONS,
        }
    }
}

struct Pool {
    path: Slab<PathBuffer>,
    version: Slab<VersionEntry>,
    http: Slab<HttpOperation>,
    extract: Slab<ExtractOperation>,
    json: Mutex<Vec<Bump>>,
    json_capacity: usize,
}

impl Pool {
    fn new(cfg: PoolConfig) -> Self {
        Self {
            path: Slab::new(cfg.path_buffers, PathBuffer::new),
            version: Slab::new(cfg.version_entries, VersionEntry::new),
            http: Slab::new(cfg.http_operations, HttpOperation::new),
            extract: Slab::new(cfg.extract_operations, ExtractOperation::new),
            json: Mutex::new((0..cfg.http_operations).map(|_| Bump::new()).collect()),
            json_capacity: cfg.http_operations,
        }
    }
}

/// An arena handle from the JSON allocator, reset when dropped.
pub struct JsonArena<'ctx> {
    bump: Option<Bump>,
    ctx: &'ctx Context,
}

impl std::ops::Deref for JsonArena<'_> {
    type Target = Bump;
    fn deref(&self) -> &Bump {
        self.bump.as_ref().expect("arena used after release")
    }
}

impl Drop for JsonArena<'_> {
    fn drop(&mut self) {
        if let Some(mut bump) = self.bump.take() {
            bump.reset();
            self.ctx.pool.json.lock().expect("pool mutex poisoned").push(bump);
        }
    }
}

/// The process-wide context: resource pool plus resolved home directories.
///
/// Modeled as an explicit value (per the Design Note in §9) rather than a
/// `static`/`Lazy` singleton, so each test can build its own `Context`
/// pointed at an isolated temp directory.
pub struct Context {
    pool: Pool,
    home_dir: Option<PathBuf>,
    zvm_home: PathBuf,
}

impl Context {
    /// Build a context, resolving `$ZVM_HOME` the way §3 describes:
    /// `$ZVM_HOME` env var, else `$XDG_DATA_HOME/.zm`, else platform default.
    pub fn new(cfg: PoolConfig) -> Result<Self> {
        let home_dir = dirs::home_dir();
        let zvm_home = resolve_zvm_home(home_dir.as_deref())?;
        Ok(Self {
            pool: Pool::new(cfg),
            home_dir,
            zvm_home,
        })
    }

    pub fn with_default_pool() -> Result<Self> {
        Self::new(PoolConfig::default())
    }

    /// Build a context rooted at an explicit directory, bypassing
    /// environment resolution entirely. Used by tests.
    pub fn with_home(zvm_home: PathBuf, cfg: PoolConfig) -> Self {
        Self {
            pool: Pool::new(cfg),
            home_dir: dirs::home_dir(),
            zvm_home,
        }
    }

    pub fn get_home_dir(&self) -> Option<&Path> {
        self.home_dir.as_deref()
    }

    pub fn get_zvm_home(&self) -> &Path {
        &self.zvm_home
    }

    pub fn acquire_path_buffer(&self) -> Result<PathBufferHandle<'_>> {
        Ok(PathBufferHandle::new(self.pool.path.acquire()?, &self.pool.path))
    }

    pub fn acquire_version_entry(&self) -> Result<VersionEntryHandle<'_>> {
        Ok(VersionEntryHandle::new(self.pool.version.acquire()?, &self.pool.version))
    }

    pub fn acquire_http_operation(&self) -> Result<HttpOperationHandle<'_>> {
        Ok(HttpOperationHandle::new(self.pool.http.acquire()?, &self.pool.http))
    }

    pub fn acquire_extract_operation(&self) -> Result<ExtractOperationHandle<'_>> {
        Ok(ExtractOperationHandle::new(self.pool.extract.acquire()?, &self.pool.extract))
    }

    /// An arena allocator reset between parses, for `fetch_json` (§4.2/§4.4).
    pub fn json_allocator(&self) -> Result<JsonArena<'_>> {
        let bump = self
            .pool
            .json
            .lock()
            .expect("pool mutex poisoned")
            .pop()
            .ok_or(ZvmError::PoolExhausted {
                capacity: self.pool.json_capacity,
            })?;
        Ok(JsonArena {
            bump: Some(bump),
            ctx: self,
        })
    }
}

fn resolve_zvm_home(home_dir: Option<&Path>) -> Result<PathBuf> {
    if let Ok(explicit) = std::env::var("ZVM_HOME") {
        return Ok(PathBuf::from(explicit));
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join(".zm"));
    }
    if cfg!(windows) {
        if let Ok(profile) = std::env::var("USERPROFILE") {
            return Ok(PathBuf::from(profile).join(".zm"));
        }
    }
    home_dir
        .map(|h| h.join(".local/share/.zm"))
        .ok_or(ZvmError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausting_the_pool_is_a_typed_error_not_a_panic() {
        let ctx = Context::with_home(
            PathBuf::from("/tmp/zvm-test-pool"),
            PoolConfig {
                path_buffers: 1,
                version_entries: 1,
                http_operations: 1,
                extract_operations: 1,
            },
        );
        let first = ctx.acquire_path_buffer().unwrap();
        let second = ctx.acquire_path_buffer();
        assert!(matches!(second, Err(ZvmError::PoolExhausted { capacity: 1 })));
        drop(first);
        assert!(ctx.acquire_path_buffer().is_ok());
    }

    #[test]
    fn path_buffer_set_rejects_overflow() {
        let ctx = Context::with_home(PathBuf::from("/tmp/zvm-test-pool2"), PoolConfig::default());
        let mut buf = ctx.acquire_path_buffer().unwrap();
        assert!(buf.set(PATH_MAX + 1).is_err());
    }

    #[test]
    fn zvm_home_honors_explicit_env_override() {
        std::env::set_var("ZVM_HOME", "/tmp/zvm-explicit-home");
        let ctx = Context::with_default_pool().unwrap();
        assert_eq!(ctx.get_zvm_home(), Path::new("/tmp/zvm-explicit-home"));
        std::env::remove_var("ZVM_HOME");
    }
}
