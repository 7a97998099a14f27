//! Encrypted file FFI functions.

use crate::env::{path_arg, SealEnvHandle};
use crate::error::{clear_last_error, report, set_last_error, SealEnvResult};
use sealenv_core::{EncryptedFile, RandomAccessFile};
use std::ffi::c_char;

/// Opaque handle to an open encrypted file.
pub struct SealEnvFileHandle {
    file: EncryptedFile,
}

/// Opens (or creates) an encrypted file.
///
/// # Arguments
///
/// * `env` - Environment handle
/// * `path` - File path
/// * `out_file` - Output pointer for the file handle
///
/// # Returns
///
/// `SealEnvResult::Ok` on success, error code otherwise.
///
/// # Safety
///
/// - `env` must be a valid environment handle
/// - `path` must be a valid null-terminated UTF-8 string
/// - `out_file` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn sealenv_file_open(
    env: *const SealEnvHandle,
    path: *const c_char,
    out_file: *mut *mut SealEnvFileHandle,
) -> SealEnvResult {
    clear_last_error();

    if env.is_null() || out_file.is_null() {
        set_last_error("null pointer argument");
        return SealEnvResult::NullPointer;
    }
    let env = &*env;
    let path = match path_arg(path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match env.env.open_file(path) {
        Ok(file) => {
            *out_file = Box::into_raw(Box::new(SealEnvFileHandle { file }));
            SealEnvResult::Ok
        }
        Err(e) => report(&e),
    }
}

/// Reads plaintext at `offset`.
///
/// The number of bytes read is stored in `out_read`; it is less than `len`
/// only at end of file.
///
/// # Safety
///
/// - `file` must be a valid file handle
/// - `buf` must point to `len` writable bytes
/// - `out_read` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn sealenv_file_read_at(
    file: *const SealEnvFileHandle,
    offset: u64,
    buf: *mut u8,
    len: usize,
    out_read: *mut usize,
) -> SealEnvResult {
    clear_last_error();

    if file.is_null() || out_read.is_null() || (buf.is_null() && len > 0) {
        set_last_error("null pointer argument");
        return SealEnvResult::NullPointer;
    }
    let file = &*file;
    let buf: &mut [u8] = if len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(buf, len)
    };

    match file.file.read_at(offset, buf) {
        Ok(read) => {
            *out_read = read;
            SealEnvResult::Ok
        }
        Err(e) => report(&e),
    }
}

/// Writes plaintext at `offset`.
///
/// # Safety
///
/// - `file` must be a valid file handle
/// - `data` must point to `len` readable bytes
#[no_mangle]
pub unsafe extern "C" fn sealenv_file_write_at(
    file: *const SealEnvFileHandle,
    offset: u64,
    data: *const u8,
    len: usize,
) -> SealEnvResult {
    clear_last_error();

    if file.is_null() || (data.is_null() && len > 0) {
        set_last_error("null pointer argument");
        return SealEnvResult::NullPointer;
    }
    let file = &*file;
    let data: &[u8] = if len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data, len)
    };

    match file.file.write_at(offset, data) {
        Ok(()) => SealEnvResult::Ok,
        Err(e) => report(&e),
    }
}

/// Returns the plaintext size of a file in `out_size`.
///
/// # Safety
///
/// `file` and `out_size` must be valid pointers.
#[no_mangle]
pub unsafe extern "C" fn sealenv_file_size(
    file: *const SealEnvFileHandle,
    out_size: *mut u64,
) -> SealEnvResult {
    clear_last_error();

    if file.is_null() || out_size.is_null() {
        set_last_error("null pointer argument");
        return SealEnvResult::NullPointer;
    }

    match (*file).file.size() {
        Ok(size) => {
            *out_size = size;
            SealEnvResult::Ok
        }
        Err(e) => report(&e),
    }
}

/// Syncs a file and its sidecar to stable storage.
///
/// # Safety
///
/// `file` must be a valid file handle.
#[no_mangle]
pub unsafe extern "C" fn sealenv_file_sync(file: *const SealEnvFileHandle) -> SealEnvResult {
    clear_last_error();

    let Some(file) = file.as_ref() else {
        set_last_error("null handle");
        return SealEnvResult::NullPointer;
    };

    match file.file.sync() {
        Ok(()) => SealEnvResult::Ok,
        Err(e) => report(&e),
    }
}

/// Closes a file handle.
///
/// # Safety
///
/// `file` must be null or a handle from `sealenv_file_open` that has not
/// been closed yet.
#[no_mangle]
pub unsafe extern "C" fn sealenv_file_close(file: *mut SealEnvFileHandle) {
    if !file.is_null() {
        drop(Box::from_raw(file));
    }
}
