use crate::TransferError;

/// Validates the name a file will carry on the remote side.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - Path separators (`/`, `\`)
/// - NUL bytes
/// - `.` and `..`
pub fn validate_display_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }

    if name.contains('\0') {
        return Err(TransferError::InvalidName("NUL byte not allowed".into()));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!("reserved name: {name}")));
    }

    Ok(())
}
