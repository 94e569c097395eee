//! File permissions
//!
//! Parses octal mode strings and applies permission bits.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::GatewayError;

/// Highest mode accepted from callers (permission, setuid/setgid and sticky bits)
pub const MAX_MODE: u32 = 0o7777;

/// Parse an octal mode string such as `"644"` or `"0755"`
pub fn parse_mode(raw: &str) -> Result<u32, GatewayError> {
    let digits = raw.trim();
    let invalid = || GatewayError::InvalidInput(format!("invalid mode: {}", raw));

    if digits.is_empty() || digits.len() > 5 || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(invalid());
    }

    let mode = u32::from_str_radix(digits, 8).map_err(|_| invalid())?;
    if mode > MAX_MODE {
        return Err(invalid());
    }
    Ok(mode)
}

/// Set permission bits on `path`
#[cfg(unix)]
pub fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Only the owner-write bit maps onto non-Unix permissions
#[cfg(not(unix))]
pub fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_valid_modes() {
        assert_eq!(parse_mode("644").unwrap(), 0o644);
        assert_eq!(parse_mode("0755").unwrap(), 0o755);
        assert_eq!(parse_mode("7").unwrap(), 0o7);
        assert_eq!(parse_mode("4755").unwrap(), 0o4755);
    }

    #[test]
    fn test_parse_rejects_non_octal() {
        for raw in ["abc", "", "8", "64a", "+644", "-1", "0o644", "17777"] {
            let err = parse_mode(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{raw}");
        }
    }
}
