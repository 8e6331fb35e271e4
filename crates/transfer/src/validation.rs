use std::path::{Component, Path};

use crate::ValidationError;
use crate::layout::{MAX_FILENAME_LEN, MAX_ID_LEN};

/// Validates a caller-supplied upload session id.
///
/// The id names a directory under the temp area and the merge staging
/// file, so it must be a single normal path component of at most
/// [`MAX_ID_LEN`] bytes.
pub fn validate_upload_id(id: &str) -> Result<(), ValidationError> {
    check_single_component(id, MAX_ID_LEN).map_err(ValidationError::InvalidId)
}

/// Validates the target name of the final file.
///
/// Rejects:
/// - Empty names and names longer than [`MAX_FILENAME_LEN`] bytes, the
///   longest name whose chunk files still fit on disk
/// - Anything with a directory separator, `..`, a root, or a Windows prefix
/// - NUL bytes
/// - Leading dots (hidden files collide with merge staging names)
pub fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    check_single_component(filename, MAX_FILENAME_LEN).map_err(ValidationError::InvalidFilename)?;
    if filename.starts_with('.') {
        return Err(ValidationError::InvalidFilename(format!(
            "hidden file names not allowed: {filename}"
        )));
    }
    Ok(())
}

fn check_single_component(name: &str, max_len: usize) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty name".into());
    }
    if name.len() > max_len {
        return Err(format!("name longer than {max_len} bytes"));
    }
    if name.contains('\0') {
        return Err("NUL byte not allowed".into());
    }
    // `\` is not a separator on Unix, but a name that is only safe on one
    // platform is not a name we want on disk.
    if name.contains('/') || name.contains('\\') {
        return Err(format!("path separator not allowed: {name}"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(format!("parent directory not allowed: {name}")),
        (Some(Component::CurDir), _) => Err(format!("current directory not allowed: {name}")),
        (Some(Component::Prefix(_)), _) => Err(format!("path prefix not allowed: {name}")),
        (Some(Component::RootDir), _) => Err(format!("absolute path not allowed: {name}")),
        _ => Err(format!("not a single path component: {name}")),
    }
}
