//! Integration tests for Engine logging system
//!
//! These tests verify the logging system and the entries the buffer layer
//! emits through it.
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests


use galaxy_3d_buffers::galaxy3d::buffer::{BufferData, BufferManager, BufferManagerConfig, BufferPool, UpdateStrategy};
use galaxy_3d_buffers::galaxy3d::device::{BufferTarget, DeviceFeatures};
use galaxy_3d_buffers::galaxy3d::log::{Logger, LogEntry, LogSeverity};
use galaxy_3d_buffers::galaxy3d::Engine;
use std::sync::{Arc, Mutex};
use serial_test::serial;
use test_device_utils::{create_memory_device, create_memory_device_with_features};

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOGGER SLOT TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger_receives_every_severity() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let severities = [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ];
    for severity in severities {
        Engine::log(severity, "host::frame", format!("{:?} from the host", severity));
    }

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), severities.len());
    for (entry, severity) in captured.iter().zip(severities) {
        assert_eq!(entry.severity, severity);
        assert_eq!(entry.source, "host::frame");
        assert_eq!(entry.message, format!("{:?} from the host", severity));
        assert!(!entry.has_location());
    }
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_detailed_entry_keeps_location() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log_detailed(
        LogSeverity::Error,
        "host::upload",
        "Mapping failed".to_string(),
        "upload.rs",
        128,
    );

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].file, Some("upload.rs"));
    assert_eq!(captured[0].line, Some(128));
    assert!(captured[0].has_location());
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_reset_detaches_custom_logger() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);
    Engine::log(LogSeverity::Info, "host", "captured".to_string());

    Engine::reset_logger();
    Engine::log(LogSeverity::Info, "host", "printed to the console".to_string());

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "captured");
}

#[test]
#[serial]
fn test_integration_last_shutdown_restores_default_logger() {
    let (test_logger, entries) = TestLogger::new();
    while Engine::reference_count() > 0 {
        Engine::shutdown().unwrap();
    }

    Engine::initialize().unwrap();
    Engine::set_logger(test_logger);
    Engine::shutdown().unwrap();

    let before = entries.lock().unwrap().len();
    Engine::log(LogSeverity::Warn, "host", "after shutdown".to_string());
    assert_eq!(entries.lock().unwrap().len(), before);
}

// ============================================================================
// BUFFER LAYER LOGGING TESTS
// ============================================================================

fn entries_from(entries: &Arc<Mutex<Vec<LogEntry>>>, source: &str) -> Vec<LogEntry> {
    entries.lock().unwrap().iter().filter(|e| e.source == source).cloned().collect()
}

#[test]
#[serial]
fn test_integration_unsupported_strategy_warns() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let device = create_memory_device_with_features(DeviceFeatures::VERTEX_BUFFER_OBJECT);
    let config = BufferManagerConfig {
        update_strategy: Some(UpdateStrategy::RangeMap),
        ..BufferManagerConfig::default()
    };
    let manager = BufferManager::with_config(device, config).unwrap();
    assert_eq!(manager.strategy(), UpdateStrategy::WholeMap);

    let warnings: Vec<_> = entries_from(&entries, "galaxy3d::BufferManager")
        .into_iter()
        .filter(|e| e.severity == LogSeverity::Warn)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Range mapping not supported"));

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_invalid_operation_logs_error_with_location() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let device = create_memory_device();
    let mut manager = BufferManager::new(device).unwrap();
    let buffer = manager.create_buffer(BufferTarget::Generic);
    manager.attach(buffer, BufferData::zeroed(16)).unwrap();
    assert!(manager.use_buffer(buffer).is_err());

    let errors: Vec<_> = entries_from(&entries, "galaxy3d::BufferManager")
        .into_iter()
        .filter(|e| e.severity == LogSeverity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("is not built"));
    assert!(errors[0].file.is_some());
    assert!(errors[0].line.is_some());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_pool_rejects_oversized_request() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let device = create_memory_device();
    let mut pool = BufferPool::new(device.clone());
    assert!(pool.acquire(u64::MAX).is_err());
    assert_eq!(device.lock().unwrap().live_buffers(), 0);

    let errors = entries_from(&entries, "galaxy3d::BufferPool");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, LogSeverity::Error);

    Engine::reset_logger();
}
