//! Handle to the CLAP host and its extensions.
//!
//! The host pointer is handed to the factory at plugin creation and stays
//! valid for the instance's whole life. Host extensions are queried once at
//! construction and cached as raw pointers, the same way the host caches
//! ours. The handle is threaded explicitly through construction into every
//! component that needs it; there is no process-wide host state.

use std::ffi::CStr;

use clap_sys::ext::latency::{clap_host_latency, CLAP_EXT_LATENCY};
use clap_sys::ext::params::{clap_host_params, clap_param_rescan_flags, CLAP_EXT_PARAMS};
use clap_sys::ext::thread_check::{clap_host_thread_check, CLAP_EXT_THREAD_CHECK};
use clap_sys::ext::voice_info::{clap_host_voice_info, CLAP_EXT_VOICE_INFO};
use clap_sys::host::clap_host;

/// Cached, copyable handle to the host.
#[derive(Clone, Copy)]
pub struct HostHandle {
    raw: *const clap_host,
    params: *const clap_host_params,
    latency: *const clap_host_latency,
    voice_info: *const clap_host_voice_info,
    thread_check: *const clap_host_thread_check,
}

// SAFETY: The host guarantees its `clap_host` table outlives the plugin
// instance, and `request_callback`/`request_process`/`request_restart` are
// documented thread-safe. The main-thread-only entries (`rescan`, `changed`)
// are only invoked from main-thread contexts by this crate.
unsafe impl Send for HostHandle {}
// SAFETY: See above. The handle itself is immutable after construction.
unsafe impl Sync for HostHandle {}

impl HostHandle {
    /// Wrap and cache a host pointer.
    ///
    /// # Safety
    ///
    /// `raw` must be a valid `clap_host` pointer that outlives the returned
    /// handle. Must be called from the main thread (it calls
    /// `get_extension`).
    pub unsafe fn new(raw: *const clap_host) -> Self {
        // SAFETY: Caller guarantees `raw` is valid; `get_extension` is a
        // main-thread call per the CLAP host contract.
        unsafe {
            Self {
                raw,
                params: Self::extension(raw, CLAP_EXT_PARAMS),
                latency: Self::extension(raw, CLAP_EXT_LATENCY),
                voice_info: Self::extension(raw, CLAP_EXT_VOICE_INFO),
                thread_check: Self::extension(raw, CLAP_EXT_THREAD_CHECK),
            }
        }
    }

    unsafe fn extension<T>(raw: *const clap_host, id: &CStr) -> *const T {
        // SAFETY: Caller guarantees `raw` is valid. A null or absent
        // `get_extension` yields a null extension pointer, which every
        // caller checks.
        unsafe {
            let Some(get_extension) = (*raw).get_extension else {
                return std::ptr::null();
            };
            get_extension(raw, id.as_ptr()) as *const T
        }
    }

    /// The raw host pointer.
    #[inline]
    pub fn raw(&self) -> *const clap_host {
        self.raw
    }

    /// Ask the host to call `clap_plugin.on_main_thread` when convenient.
    /// Callable from any thread.
    pub fn request_callback(&self) {
        // SAFETY: `raw` is valid for the instance's life; request_callback
        // is documented thread-safe.
        unsafe {
            if let Some(request_callback) = (*self.raw).request_callback {
                request_callback(self.raw);
            }
        }
    }

    /// Ask the host to restart (deactivate/reactivate) the plugin.
    pub fn request_restart(&self) {
        // SAFETY: As for `request_callback`.
        unsafe {
            if let Some(request_restart) = (*self.raw).request_restart {
                request_restart(self.raw);
            }
        }
    }

    /// Ask the host to schedule a parameter flush if it is not processing.
    /// Callable from any thread.
    pub fn request_param_flush(&self) {
        // SAFETY: The cached extension pointer is either null or valid for
        // the host's life; request_flush is documented thread-safe.
        unsafe {
            if !self.params.is_null() {
                if let Some(request_flush) = (*self.params).request_flush {
                    request_flush(self.raw);
                }
            }
        }
    }

    /// Tell the host to rescan parameters. Main thread only.
    pub fn rescan_params(&self, flags: clap_param_rescan_flags) {
        // SAFETY: Extension pointer checked; rescan is a main-thread call
        // and this method is only used from main-thread contexts.
        unsafe {
            if !self.params.is_null() {
                if let Some(rescan) = (*self.params).rescan {
                    rescan(self.raw, flags);
                }
            }
        }
    }

    /// Tell the host the latency changed. Main thread only.
    pub fn latency_changed(&self) {
        // SAFETY: Extension pointer checked; main-thread call.
        unsafe {
            if !self.latency.is_null() {
                if let Some(changed) = (*self.latency).changed {
                    changed(self.raw);
                }
            }
        }
    }

    /// Tell the host the voice configuration changed. Main thread only.
    pub fn voice_info_changed(&self) {
        // SAFETY: Extension pointer checked; main-thread call.
        unsafe {
            if !self.voice_info.is_null() {
                if let Some(changed) = (*self.voice_info).changed {
                    changed(self.raw);
                }
            }
        }
    }

    /// Whether the current thread is the host's main thread, if the host can
    /// tell us. Used for debug assertions only.
    pub fn is_main_thread(&self) -> Option<bool> {
        // SAFETY: Extension pointer checked; is_main_thread is callable from
        // any thread.
        unsafe {
            if self.thread_check.is_null() {
                return None;
            }
            (*self.thread_check)
                .is_main_thread
                .map(|f| f(self.raw))
        }
    }
}

impl std::fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHandle")
            .field("raw", &self.raw)
            .field("has_params", &!self.params.is_null())
            .field("has_latency", &!self.latency.is_null())
            .finish()
    }
}
