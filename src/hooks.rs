// src/hooks.rs

//! Plugin hook dispatch
//!
//! Hooks are notified of reconciliation events. A hook never influences the
//! outcome of a run: failures are reported back to the caller for logging.
//!
//! [`HookDirectory`] runs every executable in `<hooks_dir>/<hook name>/`,
//! in lexical order, feeding the event payload as JSON on stdin.

use crate::certificate::ProductCertificate;
use crate::error::{Error, Result};
use serde::Serialize;
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Default directory holding hook handlers
pub const DEFAULT_HOOKS_DIR: &str = "/etc/productid/hooks.d";

/// Default timeout for a single hook handler (30 seconds)
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Hook fired after product certificates were installed
pub const POST_PRODUCT_ID_INSTALL: &str = "post_product_id_install";

/// Environment variable carrying the hook name
const HOOK_ENV: &str = "PRODUCTID_HOOK";

/// Events hooks are notified about
#[derive(Debug, Clone, Copy)]
pub enum HookEvent<'a> {
    /// Newly installed certificates, possibly none
    PostProductIdInstall {
        product_list: &'a [ProductCertificate],
    },
}

impl HookEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PostProductIdInstall { .. } => POST_PRODUCT_ID_INSTALL,
        }
    }

    /// JSON payload handed to hook handlers
    pub fn payload(&self) -> HookPayload<'_> {
        match self {
            Self::PostProductIdInstall { product_list } => HookPayload {
                hook: self.name(),
                product_list: product_list.iter().map(HookProduct::from).collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HookPayload<'a> {
    pub hook: &'static str,
    pub product_list: Vec<HookProduct<'a>>,
}

#[derive(Debug, Serialize)]
pub struct HookProduct<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub version: &'a str,
    pub provided_tags: &'a [String],
    pub path: Option<String>,
}

impl<'a> From<&'a ProductCertificate> for HookProduct<'a> {
    fn from(cert: &'a ProductCertificate) -> Self {
        let product = cert.product();
        Self {
            id: &product.id,
            name: &product.name,
            version: &product.version,
            provided_tags: &product.provided_tags,
            path: cert.path().map(|p| p.display().to_string()),
        }
    }
}

/// Outcome of a hook dispatch
#[derive(Debug, Default)]
pub struct HookResults {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl HookResults {
    /// Check if all handlers succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Receiver of reconciliation events
pub trait PluginHooks {
    fn notify(&self, event: &HookEvent<'_>) -> Result<HookResults>;
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PluginHooks for NoopHooks {
    fn notify(&self, event: &HookEvent<'_>) -> Result<HookResults> {
        debug!("No hooks configured for {}", event.name());
        Ok(HookResults::default())
    }
}

/// Executable hook handlers grouped by hook name under a directory
#[derive(Debug, Clone)]
pub struct HookDirectory {
    root: PathBuf,
    timeout: Duration,
}

impl HookDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executable handlers registered for a hook, in lexical order
    fn handlers(&self, hook: &str) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(hook);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut handlers: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_executable(path))
            .collect();
        handlers.sort();
        Ok(handlers)
    }

    fn run_handler(&self, handler: &Path, hook: &str, payload: &[u8]) -> Result<()> {
        debug!("Executing hook handler {}", handler.display());

        let mut child = Command::new(handler)
            .env(HOOK_ENV, hook)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::HookError(format!("Failed to spawn '{}': {}", handler.display(), e))
            })?;

        // Pipes are serviced off this thread so the timeout bounds the
        // whole exchange, including a handler that never reads its input
        let writer = child.stdin.take().map(|stdin| feed(stdin, payload.to_vec()));
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let Some(status) = child.wait_timeout(self.timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::HookError(format!(
                "Handler '{}' timed out after {} seconds",
                handler.display(),
                self.timeout.as_secs_f32()
            )));
        };

        let name = handler.display();
        if let Some(writer) = writer {
            // A backgrounded grandchild may still hold stdin open
            if writer.is_finished() {
                match writer.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        return Err(Error::HookError(format!(
                            "Failed to pass payload to '{}': {}",
                            name, e
                        )));
                    }
                    Err(_) => {
                        return Err(Error::HookError(format!(
                            "Payload writer for '{}' panicked",
                            name
                        )));
                    }
                }
            }
        }

        for line in String::from_utf8_lossy(&collect(stdout)).lines() {
            debug!("[{}] {}", name, line);
        }
        let stderr = collect(stderr);
        let stderr = String::from_utf8_lossy(&stderr);
        for line in stderr.lines() {
            warn!("[{}] {}", name, line);
        }

        if status.success() {
            Ok(())
        } else {
            Err(Error::HookError(format!(
                "Handler '{}' failed with exit code {}: {}",
                name,
                status.code().unwrap_or(-1),
                stderr.trim()
            )))
        }
    }
}

/// Write the payload to a handler's stdin on a separate thread
fn feed(mut stdin: ChildStdin, payload: Vec<u8>) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || match stdin.write_all(&payload) {
        // Handlers are free to ignore their input
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    })
}

/// Read a handler's output pipe to the end on a separate thread
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

impl PluginHooks for HookDirectory {
    fn notify(&self, event: &HookEvent<'_>) -> Result<HookResults> {
        let hook = event.name();
        let handlers = self.handlers(hook)?;
        if handlers.is_empty() {
            debug!("No handlers for hook {}", hook);
            return Ok(HookResults::default());
        }

        let payload = serde_json::to_vec(&event.payload())
            .map_err(|e| Error::HookError(format!("Failed to encode {} payload: {}", hook, e)))?;

        info!("Running {} handler(s) for {}", handlers.len(), hook);
        let mut results = HookResults::default();
        for handler in handlers {
            match self.run_handler(&handler, hook, &payload) {
                Ok(()) => results.succeeded += 1,
                Err(e) => {
                    warn!("Hook {} failed: {}", hook, e);
                    results.failed += 1;
                    results.errors.push(e.to_string());
                }
            }
        }
        Ok(results)
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
