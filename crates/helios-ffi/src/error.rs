//! Thread-local error state and the single translation point between engine
//! results and the `(sentinel, code, message)` convention of the C surface.

use helios::core::context::ContextError;
use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// Error codes reported through [`getLastErrorCode`]. The discriminants are part
/// of the native contract.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCode {
    #[default]
    Success = 0,
    InvalidParameter = 1,
    UuidNotFound = 2,
    FileIo = 3,
    OutOfMemory = 4,
    DeviceInitialization = 5,
    FeatureUnavailable = 6,
    Runtime = 7,
    Unknown = 99,
}

/// Message recorded when a panic is caught at the boundary.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FfiError {
    pub code: ErrorCode,
    pub message: String,
}

impl FfiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameter, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UuidNotFound, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Runtime, message)
    }

    pub fn null(what: &str) -> Self {
        Self::invalid(format!("{what} pointer is null"))
    }
}

/// Classifies an engine error into the fixed code enumeration.
pub trait ErrorClass: std::fmt::Display {
    fn error_code(&self) -> ErrorCode;
}

impl<E: ErrorClass> From<E> for FfiError {
    fn from(error: E) -> Self {
        FfiError::new(error.error_code(), error.to_string())
    }
}

impl ErrorClass for ContextError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ContextError::UuidNotFound(_) | ContextError::ObjectNotFound(_) => ErrorCode::UuidNotFound,
            ContextError::InvalidArgument(_) => ErrorCode::InvalidParameter,
            ContextError::PrimitiveDataNotFound { .. }
            | ContextError::ObjectDataNotFound { .. }
            | ContextError::GlobalDataNotFound { .. }
            | ContextError::DataTypeMismatch { .. }
            | ContextError::TimeseriesNotFound(_)
            | ContextError::WrongPrimitiveType { .. } => ErrorCode::Runtime,
            ContextError::Io { .. } | ContextError::Parse { .. } | ContextError::Csv { .. } => ErrorCode::FileIo,
            ContextError::Allocation(_) => ErrorCode::OutOfMemory,
        }
    }
}

#[cfg(feature = "radiation")]
impl ErrorClass for helios::plugins::radiation::RadiationError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::radiation::RadiationError as E;
        match self {
            E::BandNotFound(_) | E::SourceNotFound(_) => ErrorCode::UuidNotFound,
            E::BandExists(_) | E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::GeometryNotUpdated => ErrorCode::Runtime,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "photosynthesis")]
impl ErrorClass for helios::plugins::photosynthesis::PhotosynthesisError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::photosynthesis::PhotosynthesisError as E;
        match self {
            E::UnknownSpecies(_) => ErrorCode::UuidNotFound,
            E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::Library(_) => ErrorCode::Runtime,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "stomatalconductance")]
impl ErrorClass for helios::plugins::stomatal::StomatalError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::stomatal::StomatalError as E;
        match self {
            E::UnknownSpecies(_) => ErrorCode::UuidNotFound,
            E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::Library(_) => ErrorCode::Runtime,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "energybalance")]
impl ErrorClass for helios::plugins::energy_balance::EnergyBalanceError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::energy_balance::EnergyBalanceError as E;
        match self {
            E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::NoConvergence(_) => ErrorCode::Runtime,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "plantarchitecture")]
impl ErrorClass for helios::plugins::plant_architecture::PlantArchitectureError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::plant_architecture::PlantArchitectureError as E;
        match self {
            E::UnknownModel(_) | E::PlantNotFound(_) => ErrorCode::UuidNotFound,
            E::NoModelLoaded | E::Library(_) => ErrorCode::Runtime,
            E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::Io { .. } | E::Toml { .. } => ErrorCode::FileIo,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "weberpenntree")]
impl ErrorClass for helios::plugins::weber_penn::WeberPennError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::weber_penn::WeberPennError as E;
        match self {
            E::UnknownTree(_) | E::TreeNotFound(_) => ErrorCode::UuidNotFound,
            E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::Io { .. } | E::Toml { .. } => ErrorCode::FileIo,
            E::Library(_) => ErrorCode::Runtime,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "solarposition")]
impl ErrorClass for helios::plugins::solar_position::SolarPositionError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::solar_position::SolarPositionError as E;
        match self {
            E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::NoSunrise { .. } => ErrorCode::Runtime,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "skyviewfactor")]
impl ErrorClass for helios::plugins::sky_view_factor::SkyViewFactorError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::sky_view_factor::SkyViewFactorError as E;
        match self {
            E::InvalidParameter(_) => ErrorCode::InvalidParameter,
            E::NoResults => ErrorCode::Runtime,
            E::Io { .. } | E::Csv { .. } => ErrorCode::FileIo,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "boundarylayer")]
impl ErrorClass for helios::plugins::boundary_layer::BoundaryLayerError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::boundary_layer::BoundaryLayerError as E;
        match self {
            E::UnknownModel(_) => ErrorCode::InvalidParameter,
            E::Context(e) => e.error_code(),
        }
    }
}

#[cfg(feature = "visualizer")]
impl ErrorClass for helios::plugins::visualizer::VisualizerError {
    fn error_code(&self) -> ErrorCode {
        use helios::plugins::visualizer::VisualizerError as E;
        match self {
            E::MissingParameter(_) | E::InvalidParameter(_) | E::UnknownColormap(_) => {
                ErrorCode::InvalidParameter
            }
            E::NoDisplay => ErrorCode::DeviceInitialization,
            E::Allocation(_) => ErrorCode::OutOfMemory,
            E::Image { .. } => ErrorCode::FileIo,
            E::Context(e) => e.error_code(),
        }
    }
}

#[derive(Debug, Default)]
struct LastError {
    code: ErrorCode,
    message: CString,
}

thread_local! {
    static LAST_ERROR: RefCell<LastError> = RefCell::new(LastError::default());
}

pub(crate) fn record_error(code: ErrorCode, message: &str) {
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = LastError { code, message });
}

pub(crate) fn reset_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = LastError::default());
}

pub(crate) fn last_error_code() -> ErrorCode {
    LAST_ERROR.with(|slot| slot.borrow().code)
}

/// Runs one exported operation: clears the error state, executes `f` without
/// letting a panic unwind into the caller and converts a failure into the
/// recorded `(code, message)` pair plus `sentinel`.
///
/// Runtime-class failures are prefixed with the operation name.
pub(crate) fn guard<T>(op: &str, sentinel: T, f: impl FnOnce() -> Result<T, FfiError>) -> T {
    reset_error();
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(error)) => {
            if error.code == ErrorCode::Runtime {
                record_error(error.code, &format!("{op}: {}", error.message));
            } else {
                record_error(error.code, &error.message);
            }
            tracing::debug!(operation = op, code = error.code as i32, "Call failed.");
            sentinel
        }
        Err(_) => {
            record_error(ErrorCode::Unknown, UNKNOWN_ERROR_MESSAGE);
            tracing::error!(operation = op, "Caught a panic at the native boundary.");
            sentinel
        }
    }
}

/// Entry point of a group that was compiled out. Never touches its arguments.
pub(crate) fn record_unavailable(feature: &str, op: &str) {
    record_error(
        ErrorCode::FeatureUnavailable,
        &format!("{op}: the '{feature}' plugin is not available in this build"),
    );
}

#[unsafe(no_mangle)]
pub extern "C" fn getLastErrorCode() -> i32 {
    last_error_code() as i32
}

/// Returns the message of the last failure on this thread. The pointer stays
/// valid until the next fallible call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn getLastErrorMessage() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().message.as_ptr())
}

#[unsafe(no_mangle)]
pub extern "C" fn clearError() {
    reset_error();
}

/// Copies at most `capacity - 1` bytes of the last message into `buffer` and
/// terminates it. Returns the full message length in bytes.
#[unsafe(no_mangle)]
pub extern "C" fn copyLastErrorMessage(buffer: *mut c_char, capacity: usize) -> usize {
    LAST_ERROR.with(|slot| {
        let slot = slot.borrow();
        let bytes = slot.message.as_bytes();
        if !buffer.is_null() && capacity > 0 {
            let n = bytes.len().min(capacity - 1);
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buffer, n);
                *buffer.add(n) = 0;
            }
        }
        bytes.len()
    })
}

/// Reports whether the named plugin group was compiled into this library.
#[unsafe(no_mangle)]
pub extern "C" fn isPluginAvailable(name: *const c_char) -> bool {
    if name.is_null() {
        return false;
    }
    let name = unsafe { CStr::from_ptr(name) };
    match name.to_str() {
        Ok(name) => crate::available_plugins().contains(&name),
        Err(_) => false,
    }
}
