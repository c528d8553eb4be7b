//! Plugin whose `Run` reports an error. The harness logs it and keeps polling.

use std::os::raw::c_char;

#[no_mangle]
pub static RUN_SIGNATURE: [u8; 49] = *b"hotswap-run/v1: extern \"C\" fn() -> *const c_char\0";

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn Run() -> *const c_char {
    b"something went wrong\0".as_ptr() as *const c_char
}
