//! Cache file naming.

/// Maps a pipeline file to its file name inside the cache root.
pub type FileNamer = fn(file_name: &str, pipeline_id: &str) -> String;

/// Default cache naming: `{pipeline_id}${file_name}`.
///
/// The same scheme is used by the frontends that link to cached files, so it must not change.
pub fn local_file_name(file_name: &str, pipeline_id: &str) -> String {
    format!("{pipeline_id}${file_name}")
}

/// Whether `name` is a single, non-traversing path component.
///
/// Dots inside a name are fine; only `.` and `..` on their own refer to other directories.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
