use std::fs::File;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::domain::{BucketPrefix, SampleCount};
use crate::error::NaipError;
use crate::listing::KeyLister;
use crate::s3::{ObjectFetcher, ObjectRequest};
use crate::store::{Store, ensure_dir_tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadAction {
    Existing,
    Download,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadItem {
    pub key: String,
    pub local_path: String,
    pub action: DownloadAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub bucket: String,
    pub prefix: String,
    pub listed: usize,
    pub started_at: String,
    pub finished_at: String,
    pub items: Vec<DownloadItem>,
}

impl DownloadReport {
    pub fn local_paths(&self) -> Vec<Utf8PathBuf> {
        self.items
            .iter()
            .map(|item| Utf8PathBuf::from(&item.local_path))
            .collect()
    }

    pub fn downloaded(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.action == DownloadAction::Download)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// Pipeline bookkeeping, meant for the log.
    Phase,
    /// Per-tile outcome shown to the user.
    Notice,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn phase(message: String, elapsed: Option<Duration>) -> Self {
        Self {
            kind: ProgressKind::Phase,
            message,
            elapsed,
        }
    }

    pub fn notice(message: String, elapsed: Option<Duration>) -> Self {
        Self {
            kind: ProgressKind::Notice,
            message,
            elapsed,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct Downloader<L: KeyLister, F: ObjectFetcher> {
    store: Store,
    prefix: BucketPrefix,
    count: SampleCount,
    lister: L,
    fetcher: F,
}

impl<L: KeyLister, F: ObjectFetcher> Downloader<L, F> {
    /// Builds the downloader and makes sure `<root>/naip` exists.
    pub fn new(
        store: Store,
        prefix: BucketPrefix,
        count: SampleCount,
        lister: L,
        fetcher: F,
    ) -> Result<Self, NaipError> {
        store.ensure_naip_root()?;
        Ok(Self {
            store,
            prefix,
            count,
            lister,
            fetcher,
        })
    }

    /// List, shuffle, truncate, and fetch whatever is not already on disk.
    pub fn download_naips<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadReport, NaipError> {
        let started_at = iso_timestamp();
        let keys = self.list_naips(sink)?;
        let listed = keys.len();
        let selected = sample_keys(keys, self.count, rng);
        sink.event(ProgressEvent::phase(
            format!("phase=Sample; selected {} of {listed}", selected.len()),
            None,
        ));
        let items = self.download_from_s3(&selected, sink)?;
        Ok(DownloadReport {
            bucket: self.prefix.bucket().to_string(),
            prefix: self.prefix.url(),
            listed,
            started_at,
            finished_at: iso_timestamp(),
            items,
        })
    }

    pub fn list_naips(&self, sink: &dyn ProgressSink) -> Result<Vec<String>, NaipError> {
        sink.event(ProgressEvent::phase(
            format!("phase=List; listing {}", self.prefix),
            None,
        ));
        let start = Instant::now();
        let keys = self.lister.list_keys(&self.prefix)?;
        sink.event(ProgressEvent::phase(
            format!("phase=List; found {} keys", keys.len()),
            Some(start.elapsed()),
        ));
        Ok(keys)
    }

    /// Fetches each key in order. Stops at the first failed fetch; files
    /// written before it stay on disk.
    pub fn download_from_s3(
        &self,
        keys: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<DownloadItem>, NaipError> {
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            let local_path = self.store.local_path(&self.prefix, key)?;
            let action = if self.store.exists(&local_path) {
                tracing::info!(path = %local_path, "already downloaded");
                sink.event(ProgressEvent::notice(
                    format!("NAIP {local_path} already downloaded"),
                    None,
                ));
                DownloadAction::Existing
            } else {
                self.fetch_one(key, &local_path, sink)?;
                DownloadAction::Download
            };
            items.push(DownloadItem {
                key: key.clone(),
                local_path: local_path.to_string(),
                action,
            });
        }
        Ok(items)
    }

    fn fetch_one(
        &self,
        key: &str,
        local_path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<(), NaipError> {
        let parent = local_path
            .parent()
            .ok_or_else(|| NaipError::Filesystem(format!("invalid destination {local_path}")))?;
        ensure_dir_tree(parent)?;

        let request = ObjectRequest {
            bucket: self.prefix.bucket().to_string(),
            key: self.prefix.object_key(key),
            requester_pays: true,
        };
        sink.event(ProgressEvent::phase(
            format!("phase=Download; s3://{}/{}", request.bucket, request.key),
            None,
        ));

        // Opened through std so the tile gets the umask-default mode, not 0600.
        let temp = tempfile::Builder::new()
            .prefix(".naip-fetch")
            .make_in(parent.as_std_path(), |path| {
                File::options().write(true).create_new(true).open(path)
            })
            .map_err(|err| NaipError::Filesystem(err.to_string()))?;
        let start = Instant::now();
        self.fetcher.download_object(&request, temp.path())?;
        temp.persist(local_path.as_std_path())
            .map_err(|err| NaipError::Filesystem(err.to_string()))?;

        let elapsed = start.elapsed();
        tracing::info!(path = %local_path, latency_ms = elapsed.as_millis() as u64, "downloaded");
        sink.event(ProgressEvent::notice(
            format!("NAIP {local_path} downloaded"),
            Some(elapsed),
        ));
        Ok(())
    }
}

/// Uniformly shuffles `keys` and keeps the first `count` of them.
pub fn sample_keys<R: Rng + ?Sized>(
    mut keys: Vec<String>,
    count: SampleCount,
    rng: &mut R,
) -> Vec<String> {
    keys.shuffle(rng);
    let limit = count.limit(keys.len());
    keys.truncate(limit);
    keys
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
