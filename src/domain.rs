use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::NaipError;

pub const DEFAULT_BUCKET: &str = "aws-naip";

/// Which backend enumerates object keys under a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Lister {
    #[default]
    Native,
    S3cmd,
}

impl fmt::Display for Lister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lister::Native => write!(f, "native"),
            Lister::S3cmd => write!(f, "s3cmd"),
        }
    }
}

/// The five path segments that pick one NAIP grid cell out of the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection {
    region: String,
    year: String,
    resolution: String,
    spectrum: String,
    grid: String,
}

impl Selection {
    pub fn new(
        region: &str,
        year: &str,
        resolution: &str,
        spectrum: &str,
        grid: &str,
    ) -> Result<Self, NaipError> {
        Ok(Self {
            region: segment(region)?,
            year: segment(year)?,
            resolution: segment(resolution)?,
            spectrum: segment(spectrum)?,
            grid: segment(grid)?,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn resolution(&self) -> &str {
        &self.resolution
    }

    pub fn spectrum(&self) -> &str {
        &self.spectrum
    }

    pub fn grid(&self) -> &str {
        &self.grid
    }

    /// `region/year/resolution/spectrum/grid/`, every segment followed by one slash.
    pub fn key_prefix(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}/",
            self.region, self.year, self.resolution, self.spectrum, self.grid
        )
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            region: "md".to_string(),
            year: "2013".to_string(),
            resolution: "1m".to_string(),
            spectrum: "rgbir".to_string(),
            grid: "38077".to_string(),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.region, self.year, self.resolution, self.spectrum, self.grid
        )
    }
}

impl FromStr for Selection {
    type Err = NaipError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_matches('/');
        let parts = trimmed.split('/').collect::<Vec<_>>();
        let [region, year, resolution, spectrum, grid] = parts.as_slice() else {
            return Err(NaipError::InvalidSelection(value.to_string()));
        };
        Self::new(region, year, resolution, spectrum, grid)
    }
}

fn segment(value: &str) -> Result<String, NaipError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(NaipError::InvalidSelection(value.to_string()));
    }
    Ok(trimmed.to_string())
}

/// A bucket name plus the key prefix of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPrefix {
    bucket: String,
    key_prefix: String,
}

impl BucketPrefix {
    pub fn new(bucket: &str, selection: &Selection) -> Self {
        Self {
            bucket: bucket.trim().trim_start_matches("s3://").trim_end_matches('/').to_string(),
            key_prefix: selection.key_prefix(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn bucket_url(&self) -> String {
        format!("s3://{}/", self.bucket)
    }

    /// The listing prefix: bucket root followed by the selection segments.
    pub fn url(&self) -> String {
        format!("{}{}", self.bucket_url(), self.key_prefix)
    }

    /// Full object key for a candidate key, without the bucket root.
    pub fn object_key(&self, candidate: &str) -> String {
        format!("{}{}", self.key_prefix, candidate)
    }
}

impl fmt::Display for BucketPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// How many listed keys to download after shuffling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSampleCount", into = "RawSampleCount")]
pub enum SampleCount {
    All,
    Limit(usize),
}

impl SampleCount {
    pub fn limit(&self, len: usize) -> usize {
        match self {
            SampleCount::All => len,
            SampleCount::Limit(n) => (*n).min(len),
        }
    }
}

impl Default for SampleCount {
    fn default() -> Self {
        SampleCount::Limit(1)
    }
}

impl fmt::Display for SampleCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleCount::All => write!(f, "all"),
            SampleCount::Limit(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for SampleCount {
    type Err = NaipError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(SampleCount::All);
        }
        let number = trimmed
            .parse::<i64>()
            .map_err(|_| NaipError::InvalidSampleCount(value.to_string()))?;
        SampleCount::try_from(number)
    }
}

impl TryFrom<i64> for SampleCount {
    type Error = NaipError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(SampleCount::All),
            n if n >= 0 => usize::try_from(n)
                .map(SampleCount::Limit)
                .map_err(|_| NaipError::InvalidSampleCount(value.to_string())),
            _ => Err(NaipError::InvalidSampleCount(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSampleCount {
    Number(i64),
    Text(String),
}

impl TryFrom<RawSampleCount> for SampleCount {
    type Error = NaipError;

    fn try_from(value: RawSampleCount) -> Result<Self, Self::Error> {
        match value {
            RawSampleCount::Number(n) => SampleCount::try_from(n),
            RawSampleCount::Text(text) => text.parse(),
        }
    }
}

impl From<SampleCount> for RawSampleCount {
    fn from(value: SampleCount) -> Self {
        match value {
            SampleCount::All => RawSampleCount::Number(-1),
            SampleCount::Limit(n) => RawSampleCount::Number(n as i64),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_selection_prefix() {
        let prefix = BucketPrefix::new(DEFAULT_BUCKET, &Selection::default());
        assert_eq!(prefix.url(), "s3://aws-naip/md/2013/1m/rgbir/38077/");
        assert_eq!(prefix.key_prefix(), "md/2013/1m/rgbir/38077/");
    }

    #[test]
    fn object_key_strips_bucket_root() {
        let prefix = BucketPrefix::new("s3://aws-naip/", &Selection::default());
        assert_eq!(prefix.bucket(), "aws-naip");
        assert_eq!(
            prefix.object_key("m_3807701_ne_18_1_20130924.tif"),
            "md/2013/1m/rgbir/38077/m_3807701_ne_18_1_20130924.tif"
        );
    }

    #[test]
    fn parse_sample_count() {
        assert_eq!("all".parse::<SampleCount>().unwrap(), SampleCount::All);
        assert_eq!("-1".parse::<SampleCount>().unwrap(), SampleCount::All);
        assert_eq!("3".parse::<SampleCount>().unwrap(), SampleCount::Limit(3));
        let err = "-2".parse::<SampleCount>().unwrap_err();
        assert_matches!(err, NaipError::InvalidSampleCount(_));
    }

    #[test]
    fn sample_count_from_json() {
        let all: SampleCount = serde_json::from_str("-1").unwrap();
        assert_eq!(all, SampleCount::All);
        let text: SampleCount = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(text, SampleCount::All);
        let five: SampleCount = serde_json::from_str("5").unwrap();
        assert_eq!(five, SampleCount::Limit(5));
        assert!(serde_json::from_str::<SampleCount>("\"many\"").is_err());
    }
}
