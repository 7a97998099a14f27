//! C callback tables adapted to [`BlockCipher`].

use sealenv_core::BlockCipher;
use std::ffi::c_void;

/// Encrypts one block in place.
///
/// `data` points to `block_size` bytes and `metadata` to `metadata_size`
/// bytes, both writable. Returns false on failure.
pub type EncryptBlockFn = unsafe extern "C" fn(
    userdata: *mut c_void,
    block_index: u64,
    data: *mut u8,
    metadata: *mut u8,
) -> bool;

/// Decrypts one block in place.
///
/// `data` points to `block_size` writable bytes and `metadata` to
/// `metadata_size` read-only bytes. Returns false on failure.
pub type DecryptBlockFn = unsafe extern "C" fn(
    userdata: *mut c_void,
    block_index: u64,
    data: *mut u8,
    metadata: *const u8,
) -> bool;

/// Releases `userdata`. Called exactly once.
pub type DestroyFn = unsafe extern "C" fn(userdata: *mut c_void);

/// A cipher implemented by C callbacks sharing one `userdata` pointer.
///
/// Dropping it calls the destroy callback, if any.
pub(crate) struct CallbackCipher {
    userdata: *mut c_void,
    encrypt: EncryptBlockFn,
    decrypt: DecryptBlockFn,
    destroy: Option<DestroyFn>,
}

impl CallbackCipher {
    pub(crate) fn new(
        userdata: *mut c_void,
        encrypt: EncryptBlockFn,
        decrypt: DecryptBlockFn,
        destroy: Option<DestroyFn>,
    ) -> Self {
        Self {
            userdata,
            encrypt,
            decrypt,
            destroy,
        }
    }
}

// Safety: the caller of `sealenv_create_encrypted_env` guarantees that the
// callbacks may be invoked concurrently from any thread with `userdata`.
unsafe impl Send for CallbackCipher {}
unsafe impl Sync for CallbackCipher {}

impl BlockCipher for CallbackCipher {
    fn encrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> bool {
        // Safety: the descriptor hands us buffers of exactly the declared sizes.
        unsafe {
            (self.encrypt)(
                self.userdata,
                block_index,
                data.as_mut_ptr(),
                metadata.as_mut_ptr(),
            )
        }
    }

    fn decrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &[u8]) -> bool {
        // Safety: as above; metadata is passed read-only.
        unsafe { (self.decrypt)(self.userdata, block_index, data.as_mut_ptr(), metadata.as_ptr()) }
    }
}

impl Drop for CallbackCipher {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy.take() {
            // Safety: destroy runs once, after the last block call.
            unsafe { destroy(self.userdata) };
        }
    }
}
