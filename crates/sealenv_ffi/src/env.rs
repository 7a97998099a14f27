//! Environment FFI functions.

use crate::cipher::{CallbackCipher, DecryptBlockFn, DestroyFn, EncryptBlockFn};
use crate::error::{clear_last_error, report, set_last_error, SealEnvResult};
use sealenv_core::{CipherDescriptor, Env, EnvConfig};
use std::ffi::{c_char, c_void, CStr};
use std::path::Path;
use std::ptr;
use tracing::debug;

/// Opaque handle to an encrypted environment.
pub struct SealEnvHandle {
    pub(crate) env: Env,
}

/// Reads a path argument, recording the problem as the last error.
///
/// # Safety
///
/// `ptr` must be null or a valid null-terminated string.
pub(crate) unsafe fn path_arg<'a>(ptr: *const c_char) -> Result<&'a Path, SealEnvResult> {
    if ptr.is_null() {
        set_last_error("null path argument");
        return Err(SealEnvResult::NullPointer);
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Ok(Path::new(s)),
        Err(_) => {
            set_last_error("invalid UTF-8 in path");
            Err(SealEnvResult::InvalidArgument)
        }
    }
}

unsafe fn create(
    userdata: *mut c_void,
    metadata_size: usize,
    block_size: usize,
    encrypt_block: Option<EncryptBlockFn>,
    decrypt_block: Option<DecryptBlockFn>,
    destroy: Option<DestroyFn>,
    config: EnvConfig,
) -> *mut SealEnvHandle {
    clear_last_error();

    let (Some(encrypt), Some(decrypt)) = (encrypt_block, decrypt_block) else {
        set_last_error("encrypt and decrypt callbacks are required");
        return ptr::null_mut();
    };
    if block_size == 0 {
        set_last_error("block size must be non-zero");
        return ptr::null_mut();
    }
    if let Err(e) = config.validate() {
        set_last_error(e.to_string());
        return ptr::null_mut();
    }

    // From here on the cipher owns userdata; destroy runs when it is dropped.
    let cipher = CallbackCipher::new(userdata, encrypt, decrypt, destroy);
    let env = CipherDescriptor::new(block_size, metadata_size, cipher)
        .and_then(|descriptor| Env::encrypted(descriptor, config));

    match env {
        Ok(env) => {
            debug!(block_size, metadata_size, "created encrypted environment");
            Box::into_raw(Box::new(SealEnvHandle { env }))
        }
        Err(e) => {
            set_last_error(format!("failed to create environment: {e}"));
            ptr::null_mut()
        }
    }
}

/// Creates an encrypted environment from a C callback table.
///
/// The returned handle replaces the caller's default storage environment.
/// Per-block metadata is kept in `<file>.meta` sidecar files.
///
/// # Arguments
///
/// * `userdata` - Opaque pointer passed to every callback
/// * `metadata_size` - Bytes of metadata stored per block
/// * `block_size` - Bytes per encrypted block (non-zero)
/// * `encrypt_block` - Encrypt callback (required)
/// * `decrypt_block` - Decrypt callback (required)
/// * `destroy` - Called once with `userdata` when the environment is gone (optional)
///
/// # Returns
///
/// A new handle, or null on invalid arguments (see `sealenv_get_last_error`).
/// When null is returned because of invalid arguments, `destroy` is not
/// called and the caller still owns `userdata`.
///
/// # Safety
///
/// - The callbacks must be safe to call concurrently from any thread
/// - `userdata` must stay valid until `destroy` is called
#[no_mangle]
pub unsafe extern "C" fn sealenv_create_encrypted_env(
    userdata: *mut c_void,
    metadata_size: usize,
    block_size: usize,
    encrypt_block: Option<EncryptBlockFn>,
    decrypt_block: Option<DecryptBlockFn>,
    destroy: Option<DestroyFn>,
) -> *mut SealEnvHandle {
    create(
        userdata,
        metadata_size,
        block_size,
        encrypt_block,
        decrypt_block,
        destroy,
        EnvConfig::default(),
    )
}

/// Creates an encrypted environment whose sidecars use a custom suffix.
///
/// Identical to `sealenv_create_encrypted_env` except for the sidecar
/// suffix, e.g. `".aead"` to read files written with the legacy layout.
///
/// # Safety
///
/// As for `sealenv_create_encrypted_env`; `sidecar_suffix` must be a valid
/// null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn sealenv_create_encrypted_env_with_suffix(
    userdata: *mut c_void,
    metadata_size: usize,
    block_size: usize,
    encrypt_block: Option<EncryptBlockFn>,
    decrypt_block: Option<DecryptBlockFn>,
    destroy: Option<DestroyFn>,
    sidecar_suffix: *const c_char,
) -> *mut SealEnvHandle {
    clear_last_error();

    if sidecar_suffix.is_null() {
        set_last_error("null suffix argument");
        return ptr::null_mut();
    }
    let Ok(suffix) = CStr::from_ptr(sidecar_suffix).to_str() else {
        set_last_error("invalid UTF-8 in suffix");
        return ptr::null_mut();
    };

    create(
        userdata,
        metadata_size,
        block_size,
        encrypt_block,
        decrypt_block,
        destroy,
        EnvConfig::new().sidecar_suffix(suffix),
    )
}

/// Destroys an environment handle.
///
/// The destroy callback runs once the handle and every file opened from it
/// have been released.
///
/// # Safety
///
/// `handle` must be null or a handle from `sealenv_create_encrypted_env`
/// that has not been destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn sealenv_env_destroy(handle: *mut SealEnvHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Returns the environment's block size, or 0 for a null handle.
///
/// # Safety
///
/// `handle` must be null or a valid handle.
#[no_mangle]
pub unsafe extern "C" fn sealenv_env_block_size(handle: *const SealEnvHandle) -> usize {
    handle.as_ref().map_or(0, |h| h.env.block_size())
}

/// Renames a file together with its sidecar.
///
/// # Safety
///
/// `handle` must be valid; `src` and `dest` must be valid null-terminated
/// UTF-8 strings.
#[no_mangle]
pub unsafe extern "C" fn sealenv_env_rename_file(
    handle: *const SealEnvHandle,
    src: *const c_char,
    dest: *const c_char,
) -> SealEnvResult {
    clear_last_error();

    let Some(handle) = handle.as_ref() else {
        set_last_error("null handle");
        return SealEnvResult::NullPointer;
    };
    let src = match path_arg(src) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let dest = match path_arg(dest) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match handle.env.rename_file(src, dest) {
        Ok(()) => SealEnvResult::Ok,
        Err(e) => report(&e),
    }
}

/// Removes a file and its sidecar.
///
/// # Safety
///
/// `handle` must be valid; `path` must be a valid null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn sealenv_env_remove_file(
    handle: *const SealEnvHandle,
    path: *const c_char,
) -> SealEnvResult {
    clear_last_error();

    let Some(handle) = handle.as_ref() else {
        set_last_error("null handle");
        return SealEnvResult::NullPointer;
    };
    let path = match path_arg(path) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match handle.env.remove_file(path) {
        Ok(()) => SealEnvResult::Ok,
        Err(e) => report(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C" fn noop_encrypt(_: *mut c_void, _: u64, _: *mut u8, _: *mut u8) -> bool {
        true
    }

    unsafe extern "C" fn noop_decrypt(_: *mut c_void, _: u64, _: *mut u8, _: *const u8) -> bool {
        true
    }

    unsafe extern "C" fn count_destroy(userdata: *mut c_void) {
        (*(userdata as *const AtomicUsize)).fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn create_and_destroy_runs_destroy_once() {
        let counter = AtomicUsize::new(0);
        let userdata = &counter as *const AtomicUsize as *mut c_void;

        unsafe {
            let handle = sealenv_create_encrypted_env(
                userdata,
                16,
                4096,
                Some(noop_encrypt),
                Some(noop_decrypt),
                Some(count_destroy),
            );
            assert!(!handle.is_null());
            assert_eq!(sealenv_env_block_size(handle), 4096);
            assert_eq!(counter.load(Ordering::SeqCst), 0);

            sealenv_env_destroy(handle);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_callbacks_rejected_without_destroy() {
        let counter = AtomicUsize::new(0);
        let userdata = &counter as *const AtomicUsize as *mut c_void;

        let handle = unsafe {
            sealenv_create_encrypted_env(
                userdata,
                16,
                4096,
                None,
                Some(noop_decrypt),
                Some(count_destroy),
            )
        };
        assert!(handle.is_null());
        assert!(!crate::error::sealenv_get_last_error().is_null());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_block_size_rejected() {
        let handle = unsafe {
            sealenv_create_encrypted_env(
                ptr::null_mut(),
                16,
                0,
                Some(noop_encrypt),
                Some(noop_decrypt),
                None,
            )
        };
        assert!(handle.is_null());
    }

    #[test]
    fn empty_suffix_rejected() {
        let suffix = CString::new("").unwrap();
        let handle = unsafe {
            sealenv_create_encrypted_env_with_suffix(
                ptr::null_mut(),
                16,
                64,
                Some(noop_encrypt),
                Some(noop_decrypt),
                None,
                suffix.as_ptr(),
            )
        };
        assert!(handle.is_null());
    }

    #[test]
    fn rename_and_remove_through_handle() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.sst");
        let dest = dir.path().join("b.sst");
        std::fs::write(&src, b"data").unwrap();
        std::fs::write(dir.path().join("a.sst.meta"), b"meta").unwrap();

        let src_c = CString::new(src.to_str().unwrap()).unwrap();
        let dest_c = CString::new(dest.to_str().unwrap()).unwrap();

        unsafe {
            let handle = sealenv_create_encrypted_env(
                ptr::null_mut(),
                4,
                64,
                Some(noop_encrypt),
                Some(noop_decrypt),
                None,
            );

            let result = sealenv_env_rename_file(handle, src_c.as_ptr(), dest_c.as_ptr());
            assert_eq!(result, SealEnvResult::Ok);
            assert!(dir.path().join("b.sst.meta").exists());

            let result = sealenv_env_remove_file(handle, dest_c.as_ptr());
            assert_eq!(result, SealEnvResult::Ok);
            assert!(!dest.exists());
            assert!(!dir.path().join("b.sst.meta").exists());

            let result = sealenv_env_remove_file(handle, dest_c.as_ptr());
            assert_eq!(result, SealEnvResult::NotFound);

            let result = sealenv_env_remove_file(handle, ptr::null());
            assert_eq!(result, SealEnvResult::NullPointer);

            sealenv_env_destroy(handle);
        }
    }
}
