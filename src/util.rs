//! Small byte-level helpers shared by the catalog, index and btree persistence code.
//!
//! Every on-disk record in this crate is native-endian fixed width (per the persisted
//! layout contract) so these are plain slice helpers, not a generic serialization crate.

use crate::error::{ExecError, ExecResult};

/// Maximum identifier length (§3: "mapping from name (<= 63 bytes) to Result" — applied
/// uniformly to database/table/column names, not just client-context slot names, since
/// they share the same `NAME_FIELD`-byte on-disk record).
pub const MAX_NAME_LEN: usize = 63;

/// Reject a name that won't fit the fixed-width on-disk field, as a recoverable
/// `IncorrectFormat` rather than letting it reach [`set_name`]'s `assert!` at snapshot
/// time (§4.12/§7: bad formats are recoverable, not fatal).
pub fn validate_name(name: &str) -> ExecResult<()> {
    if name.is_empty() || name.as_bytes().len() > MAX_NAME_LEN {
        return Err(ExecError::IncorrectFormat(format!(
            "name '{name}' must be 1..={MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

/// Extract a little-endian u64 from `data` at `off`.
pub fn getu64(data: &[u8], off: usize) -> u64 {
    debug_assert!(off + 8 <= data.len());
    u64::from_le_bytes(data[off..off + 8].try_into().unwrap())
}

/// Extract a little-endian i64 from `data` at `off`.
pub fn geti64(data: &[u8], off: usize) -> i64 {
    i64::from_le_bytes(data[off..off + 8].try_into().unwrap())
}

/// Extract a little-endian i32 from `data` at `off`.
pub fn geti32(data: &[u8], off: usize) -> i32 {
    i32::from_le_bytes(data[off..off + 4].try_into().unwrap())
}

/// Read a fixed-width, nul-padded name field (as used for table/column/database names).
pub fn get_name(data: &[u8], off: usize, len: usize) -> String {
    let raw = &data[off..off + len];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Write `name` into a fixed-width, nul-padded field. Panics if it does not fit.
pub fn set_name(data: &mut [u8], off: usize, len: usize, name: &str) {
    let bytes = name.as_bytes();
    assert!(bytes.len() < len, "name '{name}' too long for {len}-byte field");
    data[off..off + len].fill(0);
    data[off..off + bytes.len()].copy_from_slice(bytes);
}
