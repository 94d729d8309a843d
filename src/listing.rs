use camino::{Utf8Component, Utf8Path};

use crate::domain::BucketPrefix;
use crate::error::NaipError;

/// Enumerates candidate keys (paths relative to the prefix) in listing order.
pub trait KeyLister {
    fn list_keys(&self, prefix: &BucketPrefix) -> Result<Vec<String>, NaipError>;
}

impl<T: KeyLister + ?Sized> KeyLister for &T {
    fn list_keys(&self, prefix: &BucketPrefix) -> Result<Vec<String>, NaipError> {
        (**self).list_keys(prefix)
    }
}

/// Extracts the candidate key from one listing line.
///
/// The line is split on the prefix URL and accepted only when that yields
/// exactly two parts. Headers and summaries have no occurrence and are
/// dropped; so is a line that contains the prefix more than once. Folder
/// markers and keys that would leave the prefix directory are skipped.
pub fn candidate_key(line: &str, prefix_url: &str) -> Option<String> {
    if prefix_url.is_empty() {
        return None;
    }
    let parts = line.split(prefix_url).collect::<Vec<_>>();
    match parts.as_slice() {
        [_, tail] => {
            let key = tail.trim();
            if key.ends_with('/') || !is_relative_key(key) {
                tracing::debug!(key, "skipping listed key");
                return None;
            }
            Some(key.to_string())
        }
        _ => None,
    }
}

/// Maps full object keys from a native listing onto candidate keys, with the
/// same rule as text listings.
pub fn candidate_keys<'a, I>(prefix: &BucketPrefix, object_keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix_url = prefix.url();
    object_keys
        .into_iter()
        .filter_map(|key| candidate_key(&format!("{}{key}", prefix.bucket_url()), &prefix_url))
        .collect()
}

/// True when `key` is non-empty and made only of plain path segments.
pub fn is_relative_key(key: &str) -> bool {
    !key.is_empty()
        && Utf8Path::new(key)
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(_)))
}

pub fn parse_listing(output: &str, prefix: &BucketPrefix) -> Vec<String> {
    let prefix_url = prefix.url();
    output
        .lines()
        .filter_map(|line| candidate_key(line, &prefix_url))
        .collect()
}
