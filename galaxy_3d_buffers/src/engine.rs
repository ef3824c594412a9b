/// Galaxy3D Engine - process-wide initialization guard and logger slot
///
/// The buffer layer is used from one context thread, but several contexts may
/// initialize it concurrently. The first `initialize()` and the last
/// `shutdown()` are serialized by a mutex-protected reference count.

use std::sync::{Mutex, OnceLock, RwLock};
use std::time::SystemTime;
use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

// ===== INTERNAL STATE =====

/// Number of live `initialize()` calls not yet matched by `shutdown()`
static INIT_COUNT: OnceLock<Mutex<u32>> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn init_count() -> &'static Mutex<u32> {
    INIT_COUNT.get_or_init(|| Mutex::new(0))
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

// ===== PUBLIC API =====

/// Engine lifecycle and logging entry points
///
/// # Example
///
/// ```no_run
/// use galaxy_3d_buffers::galaxy3d::Engine;
///
/// Engine::initialize()?;
/// // create BufferManager instances per GPU context ...
/// Engine::shutdown()?;
/// # Ok::<(), galaxy_3d_buffers::galaxy3d::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Register one user of the buffer layer
    ///
    /// Returns the reference count after the call.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the guard lock is poisoned.
    pub fn initialize() -> Result<u32> {
        let mut count = init_count().lock().map_err(|_| {
            crate::engine_error!("galaxy3d::Engine", "Initialization guard lock poisoned");
            Error::InitializationFailed("Initialization guard lock poisoned".to_string())
        })?;

        *count += 1;
        if *count == 1 {
            crate::engine_info!("galaxy3d::Engine", "Buffer layer initialized");
        }
        Ok(*count)
    }

    /// Release one user of the buffer layer
    ///
    /// The last matching call resets the logger to `DefaultLogger`. Calling
    /// it while not initialized is a no-op that logs a warning.
    ///
    /// Returns the reference count after the call.
    pub fn shutdown() -> Result<u32> {
        let mut count = init_count().lock().map_err(|_| {
            crate::engine_error!("galaxy3d::Engine", "Initialization guard lock poisoned");
            Error::BackendError("Initialization guard lock poisoned".to_string())
        })?;

        match *count {
            0 => {
                crate::engine_warn!("galaxy3d::Engine", "shutdown() called without matching initialize()");
            }
            1 => {
                *count = 0;
                crate::engine_info!("galaxy3d::Engine", "Buffer layer shut down");
                Self::reset_logger();
            }
            _ => *count -= 1,
        }
        Ok(*count)
    }

    /// True while at least one `initialize()` is outstanding
    pub fn is_initialized() -> bool {
        init_count().lock().map(|count| *count > 0).unwrap_or(false)
    }

    /// Current initialization reference count
    pub fn reference_count() -> u32 {
        init_count().lock().map(|count| *count).unwrap_or(0)
    }

    /// Force the reference count back to zero (tests only)
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Ok(mut count) = init_count().lock() {
            *count = 0;
        }
    }

    // ===== LOGGING API =====

    /// Replace the global logger
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Reset the global logger to `DefaultLogger::default()`
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Log without location (used by `engine_info!`, `engine_warn!`, ...)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Log with file:line (used by `engine_error!`)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
