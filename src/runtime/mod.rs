//! Runtime support library, embedded in the compiler binary
//!
//! Generated C includes `rere_runtime.h` and links against
//! `rere_runtime.c`; both are shipped inside the compiler so `rerec
//! runtime --dir <path>` can materialize them next to the output.

use crate::error::{RerecError, Result};
use std::fs;
use std::path::Path;

/// Runtime ABI version. Bumped when any `rere_*` signature changes;
/// generated code asserts against the matching macro in the header.
pub const ABI_VERSION: u32 = 1;

pub const RUNTIME_HEADER_NAME: &str = "rere_runtime.h";
pub const RUNTIME_SOURCE_NAME: &str = "rere_runtime.c";

pub const RUNTIME_HEADER: &str = include_str!("rere_runtime.h");
pub const RUNTIME_SOURCE: &str = include_str!("rere_runtime.c");

/// Write both runtime files into `dir`, creating it if needed.
/// Existing copies are overwritten so stale runtimes never linger.
pub fn write_to(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| RerecError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for (name, contents) in [
        (RUNTIME_HEADER_NAME, RUNTIME_HEADER),
        (RUNTIME_SOURCE_NAME, RUNTIME_SOURCE),
    ] {
        let path = dir.join(name);
        fs::write(&path, contents).map_err(|source| RerecError::Io { path, source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_declares_every_runtime_symbol() {
        for symbol in [
            "rere_rt_init",
            "rere_rt_shutdown",
            "rere_panic",
            "rere_print",
            "rere_println",
            "rere_print_int",
            "rere_print_float",
            "rere_print_bool",
            "rere_concat",
            "rere_len",
            "rere_str_eq",
            "rere_add_int",
            "rere_sub_int",
            "rere_mul_int",
            "rere_neg_int",
            "rere_div_int",
            "rere_mod_int",
            "rere_alloc",
        ] {
            assert!(
                RUNTIME_HEADER.contains(symbol),
                "header is missing {}",
                symbol
            );
            assert!(
                RUNTIME_SOURCE.contains(symbol),
                "source is missing {}",
                symbol
            );
        }
    }

    #[test]
    fn test_header_pins_abi_version() {
        assert!(RUNTIME_HEADER.contains(&format!("#define RERE_RT_ABI_VERSION {}", ABI_VERSION)));
    }

    #[test]
    fn test_write_to_creates_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("runtime");
        write_to(&target).expect("write_to failed");
        let header = std::fs::read_to_string(target.join(RUNTIME_HEADER_NAME)).unwrap();
        let source = std::fs::read_to_string(target.join(RUNTIME_SOURCE_NAME)).unwrap();
        assert_eq!(header, RUNTIME_HEADER);
        assert_eq!(source, RUNTIME_SOURCE);
    }
}
