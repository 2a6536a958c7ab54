use crate::buffer::c_str;
use crate::error::{ErrorCode, FfiError};
use std::ffi::c_char;
use std::fs::{File, OpenOptions};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{
        self,
        format::{DefaultFields, Format},
    },
    prelude::*,
};

fn level_filter(verbosity: u32) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn log_file_error(path: &str, e: std::io::Error) -> FfiError {
    FfiError::new(ErrorCode::FileIo, format!("Failed to create log file '{path}': {e}"))
}

/// Opens `path` for writing without truncating an existing file.
fn open_log_file(path: &str) -> Result<File, FfiError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .open(path)
        .map_err(|e| log_file_error(path, e))
}

fn file_layer<S>(file: File) -> fmt::Layer<S, DefaultFields, Format, File> {
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
}

/// The log file is truncated only once no other subscriber is installed.
pub(crate) fn setup_logging(verbosity: u32, log_file: Option<&str>) -> Result<(), FfiError> {
    let file = log_file.map(|path| Ok::<_, FfiError>((path, open_log_file(path)?))).transpose()?;
    if tracing::dispatcher::has_been_set() {
        return Err(FfiError::runtime("logging is already initialized".to_string()));
    }
    let file_sink = file
        .map(|(path, file)| {
            file.set_len(0).map_err(|e| log_file_error(path, e))?;
            Ok::<_, FfiError>(file_layer(file))
        })
        .transpose()?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(level_filter(verbosity))
        .with(stderr_layer)
        .with(file_sink)
        .try_init()
        .map_err(|e| FfiError::runtime(format!("logging is already initialized: {e}")))
}

exports! {
    /// Installs the global log subscriber: verbosity 0..=3 selects WARN, INFO,
    /// DEBUG or TRACE on stderr; a non-null `log_file` adds a plain-text file
    /// sink. Only the first successful call takes effect.
    fn initializeLogging(verbosity: u32, log_file: *const c_char) -> bool = false => {
        let log_file = if log_file.is_null() {
            None
        } else {
            Some(c_str(log_file, "log file path")?)
        };
        setup_logging(verbosity, log_file)?;
        tracing::info!(verbosity, "Native logging initialized.");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::ffi::CString;
    use tracing::debug;

    #[test]
    #[serial]
    fn repeated_initialization_is_reported_not_fatal() {
        let _ = initializeLogging(2, std::ptr::null());
        assert!(!initializeLogging(2, std::ptr::null()));
        assert_eq!(crate::error::getLastErrorCode(), 7);
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_is_an_io_error() {
        let directory = CString::new("/").unwrap();
        if cfg!(unix) {
            assert!(!initializeLogging(0, directory.as_ptr()));
            assert_eq!(crate::error::getLastErrorCode(), 3);
        }
    }

    #[test]
    #[serial]
    fn repeated_initialization_leaves_an_existing_log_file_intact() {
        let _ = initializeLogging(1, std::ptr::null());
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("previous.log");
        std::fs::write(&log_path, "earlier run\n").unwrap();
        let path = CString::new(log_path.to_str().unwrap()).unwrap();

        assert!(!initializeLogging(1, path.as_ptr()));
        assert_eq!(crate::error::getLastErrorCode(), 7);
        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "earlier run\n");
    }

    #[test]
    fn file_layer_records_level_and_thread() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("native.log");

        let file = open_log_file(log_path.to_str().unwrap()).unwrap();
        let subscriber = tracing_subscriber::registry().with(file_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            debug!("Message for file-only test.");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Message for file-only test."));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
        assert!(content.contains("helios_native::logging"));
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0), LevelFilter::WARN);
        assert_eq!(level_filter(1), LevelFilter::INFO);
        assert_eq!(level_filter(7), LevelFilter::TRACE);
    }
}
