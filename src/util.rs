use std::iter::repeat;
use std::path::{Path, PathBuf};

use rand::Rng;

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// `<unix millis>-<random>.<extension>`
pub fn unique_file_name(extension: impl AsRef<str>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        extension.as_ref()
    )
}

/// Trims surrounding whitespace, `None` when nothing is left.
pub fn non_blank(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
