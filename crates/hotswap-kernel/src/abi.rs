//! Plugin entry-point ABI
//!
//! Every plugin source file is compiled on its own with `rustc --crate-type cdylib`,
//! so it cannot depend on this crate. The contract is therefore expressed as two
//! exported symbols that the plugin spells out by hand:
//!
//! ```rust,ignore
//! use std::os::raw::c_char;
//!
//! #[no_mangle]
//! pub static RUN_SIGNATURE: [u8; 49] =
//!     *b"hotswap-run/v1: extern \"C\" fn() -> *const c_char\0";
//!
//! #[no_mangle]
//! #[allow(non_snake_case)]
//! pub extern "C" fn Run() -> *const c_char {
//!     std::ptr::null()
//! }
//! ```
//!
//! `Run` returns null on success. Any other value is a NUL-terminated message
//! owned by the plugin, which the host copies before returning.
//!
//! A C symbol carries no type information, so the loader treats `RUN_SIGNATURE`
//! as the capability declaration for `Run`: a module exporting `Run` without a
//! matching descriptor is rejected before anything is called.

use std::os::raw::c_char;

/// Name of the entry-point symbol
pub const RUN_SYMBOL: &str = "Run";

/// Name of the static describing the entry-point signature
pub const SIGNATURE_SYMBOL: &str = "RUN_SIGNATURE";

/// Current entry-point ABI version
pub const ABI_VERSION: u32 = 1;

/// Signature descriptor a plugin must export alongside `Run` (without the trailing NUL)
pub const RUN_SIGNATURE: &str = "hotswap-run/v1: extern \"C\" fn() -> *const c_char";

/// Host-side type of the `Run` entry point
pub type RunFn = unsafe extern "C" fn() -> *const c_char;

/// Render the `RUN_SIGNATURE` static exactly as a plugin has to declare it
pub fn signature_declaration() -> String {
    let bytes = RUN_SIGNATURE.len() + 1;
    format!(
        "#[no_mangle]\npub static RUN_SIGNATURE: [u8; {bytes}] = *b\"{}\\0\";\n",
        RUN_SIGNATURE.replace('"', "\\\"")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_mentions_version() {
        assert!(RUN_SIGNATURE.starts_with(&format!("hotswap-run/v{}", ABI_VERSION)));
        assert!(!RUN_SIGNATURE.contains('\0'));
    }

    #[test]
    fn test_signature_declaration_length() {
        let decl = signature_declaration();
        assert!(decl.contains("#[no_mangle]"));
        assert!(decl.contains(&format!("[u8; {}]", RUN_SIGNATURE.len() + 1)));
        assert!(decl.contains("\\\"C\\\""));
    }
}
