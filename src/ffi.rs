//! C ABI for the socket library's TLS layer.
//!
//! The tree stores opaque `void *` handles (typically `SSL_CTX *`) that stay
//! owned by the caller. Hostnames are NUL-terminated byte strings and need
//! not be UTF-8. Calls on one tree must be serialized by the caller.
//!
//! ```c
//! void *sni_new();
//! void sni_free(void *sni, void (*cb)(void *));
//! int sni_add(void *sni, const char *hostname, void *user);
//! void *sni_remove(void *sni, const char *hostname);
//! void *sni_find(void *sni, const char *hostname);
//! ```

use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr::{self, NonNull};

use crate::{SniError, SniTree};

type Tree = SniTree<NonNull<c_void>>;

/// `sni_add` stored the handle.
pub const SNI_OK: c_int = 0;
/// `sni_add` found the exact hostname already registered; nothing changed.
pub const SNI_EXISTS: c_int = 1;
/// `sni_add` got a null argument or a hostname over the label cap.
pub const SNI_INVALID: c_int = -1;

/// Release callback for [`sni_free`].
pub type SniReleaseCallback = unsafe extern "C" fn(user: *mut c_void);

/// # Safety
/// `sni` must be null or a live pointer returned by [`sni_new`].
unsafe fn tree_ref<'a>(sni: *mut c_void) -> Option<&'a Tree> {
    // SAFETY: guaranteed by the caller.
    unsafe { sni.cast::<Tree>().as_ref() }
}

/// # Safety
/// `sni` must be null or a live pointer returned by [`sni_new`], with no
/// other reference to the tree alive.
unsafe fn tree_mut<'a>(sni: *mut c_void) -> Option<&'a mut Tree> {
    // SAFETY: guaranteed by the caller.
    unsafe { sni.cast::<Tree>().as_mut() }
}

/// # Safety
/// `hostname` must be null or point to a NUL-terminated string.
unsafe fn hostname_bytes<'a>(hostname: *const c_char) -> Option<&'a [u8]> {
    if hostname.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller.
    Some(unsafe { CStr::from_ptr(hostname) }.to_bytes())
}

/// Create an empty tree. Free it with [`sni_free`].
#[no_mangle]
pub extern "C" fn sni_new() -> *mut c_void {
    Box::into_raw(Box::new(Tree::new())).cast()
}

/// Free the tree, calling `cb` once for every handle still registered.
///
/// # Safety
/// `sni` must be null or a pointer returned by [`sni_new`] that has not been
/// freed; it is invalid afterwards. `cb`, if non-null, must be safe to call
/// with each stored handle.
#[no_mangle]
pub unsafe extern "C" fn sni_free(sni: *mut c_void, cb: Option<SniReleaseCallback>) {
    if sni.is_null() {
        return;
    }
    // SAFETY: `sni` came from `Box::into_raw` in `sni_new` and is freed once.
    let tree = unsafe { Box::from_raw(sni.cast::<Tree>()) };
    match cb {
        Some(cb) => tree.destroy(|user| {
            // SAFETY: the caller vouches for `cb` with its own handles.
            unsafe { cb(user.as_ptr()) }
        }),
        None => drop(tree),
    }
}

/// Register `user` under `hostname`.
///
/// Returns [`SNI_OK`], [`SNI_EXISTS`] (the caller keeps ownership of `user`),
/// or [`SNI_INVALID`].
///
/// # Safety
/// `sni` must be null or a live tree from [`sni_new`]; `hostname` must be
/// null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn sni_add(
    sni: *mut c_void,
    hostname: *const c_char,
    user: *mut c_void,
) -> c_int {
    // SAFETY: forwarded caller guarantees.
    let (Some(tree), Some(hostname)) = (unsafe { tree_mut(sni) }, unsafe { hostname_bytes(hostname) })
    else {
        return SNI_INVALID;
    };
    let Some(user) = NonNull::new(user) else {
        return SNI_INVALID;
    };

    match tree.insert(hostname, user) {
        Ok(()) => SNI_OK,
        Err(err) => match err.error() {
            SniError::AlreadyExists => SNI_EXISTS,
            SniError::TooManyLabels { .. } => SNI_INVALID,
        },
    }
}

/// Remove the exact registration for `hostname` and return its handle, or
/// null. `*` is matched literally.
///
/// # Safety
/// As for [`sni_add`].
#[no_mangle]
pub unsafe extern "C" fn sni_remove(sni: *mut c_void, hostname: *const c_char) -> *mut c_void {
    // SAFETY: forwarded caller guarantees.
    let (Some(tree), Some(hostname)) = (unsafe { tree_mut(sni) }, unsafe { hostname_bytes(hostname) })
    else {
        return ptr::null_mut();
    };
    tree.remove(hostname).map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Find the handle serving `hostname`, falling back to `*` labels, or null.
///
/// # Safety
/// As for [`sni_add`].
#[no_mangle]
pub unsafe extern "C" fn sni_find(sni: *mut c_void, hostname: *const c_char) -> *mut c_void {
    // SAFETY: forwarded caller guarantees.
    let (Some(tree), Some(hostname)) = (unsafe { tree_ref(sni) }, unsafe { hostname_bytes(hostname) })
    else {
        return ptr::null_mut();
    };
    tree.find(hostname).map_or(ptr::null_mut(), |user| user.as_ptr())
}
