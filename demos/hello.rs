//! Minimal hotswap plugin. Copy it into `./plugins/` and start `hotswap`.

use std::os::raw::c_char;

#[no_mangle]
pub static RUN_SIGNATURE: [u8; 49] = *b"hotswap-run/v1: extern \"C\" fn() -> *const c_char\0";

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn Run() -> *const c_char {
    println!("hello from a freshly built plugin");
    std::ptr::null()
}
