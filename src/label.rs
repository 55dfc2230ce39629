use std::path::Path;

/// Captcha samples are named after their solution, e.g. `043213.png`.
/// Returns the stem up to the first dot, or `None` when it is empty.
pub fn label_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next().unwrap_or_default().trim();
    (!stem.is_empty()).then(|| stem.to_string())
}
