//! Small helpers for the C ABI boundary.

use std::ffi::c_char;

/// Copy a Rust string into a fixed C char array, truncating on a UTF-8
/// boundary and always NUL-terminating.
pub fn copy_cstr(src: &str, dst: &mut [c_char]) {
    if dst.is_empty() {
        return;
    }
    let max = dst.len() - 1;
    let mut len = src.len().min(max);
    // Back off to a character boundary so we never emit a split code point
    while len > 0 && !src.is_char_boundary(len) {
        len -= 1;
    }
    for (slot, byte) in dst.iter_mut().zip(src.as_bytes()[..len].iter()) {
        *slot = *byte as c_char;
    }
    dst[len] = 0;
}
