//! Error codes and result types.

use sealenv_core::EnvError;
use std::cell::RefCell;
use std::ffi::CString;

/// Result code for FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealEnvResult {
    /// Operation succeeded.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Invalid argument.
    InvalidArgument = 2,
    /// File not found.
    NotFound = 3,
    /// A cipher callback rejected a block.
    Corruption = 4,
    /// I/O error.
    IoError = 5,
    /// Null pointer.
    NullPointer = 6,
    /// Invalid configuration.
    InvalidConfig = 7,
}

impl SealEnvResult {
    /// Returns true if the result indicates success.
    pub fn is_ok(self) -> bool {
        self == SealEnvResult::Ok
    }

    /// Returns true if the result indicates an error.
    pub fn is_err(self) -> bool {
        self != SealEnvResult::Ok
    }
}

impl From<&EnvError> for SealEnvResult {
    fn from(error: &EnvError) -> Self {
        if error.is_not_found() {
            return SealEnvResult::NotFound;
        }
        match error {
            EnvError::Corruption { .. } => SealEnvResult::Corruption,
            EnvError::Io(_) => SealEnvResult::IoError,
            EnvError::InvalidConfig { .. } => SealEnvResult::InvalidConfig,
            EnvError::InvalidArgument { .. } | EnvError::ReadPastEnd { .. } => {
                SealEnvResult::InvalidArgument
            }
            _ => SealEnvResult::Error,
        }
    }
}

/// Records `error` as the last error and returns its result code.
pub fn report(error: &EnvError) -> SealEnvResult {
    set_last_error(error.to_string());
    SealEnvResult::from(error)
}

// Thread-local storage for last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let msg = message.into();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Gets the last error message as a C string.
///
/// Returns null if no error is set.
///
/// # Safety
///
/// The returned pointer is valid until the next FFI call on this thread.
#[no_mangle]
pub extern "C" fn sealenv_get_last_error() -> *const std::ffi::c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn sealenv_clear_error() {
    clear_last_error();
}
