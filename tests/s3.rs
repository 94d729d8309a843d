use assert_matches::assert_matches;
use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
use aws_sdk_s3::operation::list_objects_v2::{ListObjectsV2Error, ListObjectsV2Output};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::error::{NoSuchBucket, NoSuchKey};
use aws_sdk_s3::types::{Object, RequestPayer};
use aws_smithy_mocks::{RuleMode, mock, mock_client};
use camino::Utf8PathBuf;
use rand::SeedableRng;
use rand::rngs::StdRng;

use naip_fetch::app::Downloader;
use naip_fetch::domain::{BucketPrefix, DEFAULT_BUCKET, SampleCount, Selection};
use naip_fetch::error::NaipError;
use naip_fetch::listing::KeyLister;
use naip_fetch::output::JsonOutput;
use naip_fetch::s3::{ObjectFetcher, ObjectRequest, S3Client};
use naip_fetch::store::Store;

const KEY_PREFIX: &str = "md/2013/1m/rgbir/38077/";

fn object(key: &str) -> Object {
    Object::builder().key(key).build()
}

#[test]
fn listing_follows_continuation_tokens_as_requester() {
    let first_page = mock!(aws_sdk_s3::Client::list_objects_v2)
        .match_requests(|req| {
            req.bucket() == Some(DEFAULT_BUCKET)
                && req.prefix() == Some(KEY_PREFIX)
                && req.request_payer() == Some(&RequestPayer::Requester)
                && req.continuation_token().is_none()
        })
        .then_output(|| {
            ListObjectsV2Output::builder()
                .contents(object(KEY_PREFIX))
                .contents(object(&format!("{KEY_PREFIX}m_3807701_ne_18_1_20130924.tif")))
                .contents(object(&format!("{KEY_PREFIX}../../../escaped.tif")))
                .is_truncated(true)
                .next_continuation_token("page-2")
                .build()
        });
    let second_page = mock!(aws_sdk_s3::Client::list_objects_v2)
        .match_requests(|req| {
            req.request_payer() == Some(&RequestPayer::Requester)
                && req.continuation_token() == Some("page-2")
        })
        .then_output(|| {
            ListObjectsV2Output::builder()
                .contents(object(&format!("{KEY_PREFIX}m_3807701_nw_18_1_20130924.tif")))
                .is_truncated(false)
                .build()
        });
    let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&first_page, &second_page]);

    let prefix = BucketPrefix::new(DEFAULT_BUCKET, &Selection::default());
    let keys = S3Client::with_client(client)
        .unwrap()
        .list_keys(&prefix)
        .unwrap();

    assert_eq!(
        keys,
        vec![
            "m_3807701_ne_18_1_20130924.tif".to_string(),
            "m_3807701_nw_18_1_20130924.tif".to_string(),
        ]
    );
    assert_eq!(first_page.num_calls(), 1);
    assert_eq!(second_page.num_calls(), 1);
}

#[test]
fn listing_failure_is_a_listing_error() {
    let missing = mock!(aws_sdk_s3::Client::list_objects_v2)
        .then_error(|| ListObjectsV2Error::NoSuchBucket(NoSuchBucket::builder().build()));
    let client = mock_client!(aws_sdk_s3, [&missing]);

    let prefix = BucketPrefix::new(DEFAULT_BUCKET, &Selection::default());
    let err = S3Client::with_client(client)
        .unwrap()
        .list_keys(&prefix)
        .unwrap_err();
    assert_matches!(err, NaipError::Listing(_));
}

#[test]
fn get_streams_body_to_destination_as_requester() {
    let key = format!("{KEY_PREFIX}m_3807701_ne_18_1_20130924.tif");
    let expected_key = key.clone();
    let get = mock!(aws_sdk_s3::Client::get_object)
        .match_requests(move |req| {
            req.bucket() == Some(DEFAULT_BUCKET)
                && req.key() == Some(expected_key.as_str())
                && req.request_payer() == Some(&RequestPayer::Requester)
        })
        .then_output(|| {
            GetObjectOutput::builder()
                .body(ByteStream::from_static(b"tile-bytes"))
                .build()
        });
    let client = mock_client!(aws_sdk_s3, [&get]);

    let temp = tempfile::tempdir().unwrap();
    let destination = temp.path().join("tile.tif");
    let request = ObjectRequest {
        bucket: DEFAULT_BUCKET.to_string(),
        key,
        requester_pays: true,
    };
    S3Client::with_client(client)
        .unwrap()
        .download_object(&request, &destination)
        .unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), b"tile-bytes");
    assert_eq!(get.num_calls(), 1);
}

#[test]
fn missing_object_maps_to_not_found() {
    let get = mock!(aws_sdk_s3::Client::get_object)
        .then_error(|| GetObjectError::NoSuchKey(NoSuchKey::builder().build()));
    let client = mock_client!(aws_sdk_s3, [&get]);

    let temp = tempfile::tempdir().unwrap();
    let request = ObjectRequest {
        bucket: DEFAULT_BUCKET.to_string(),
        key: format!("{KEY_PREFIX}gone.tif"),
        requester_pays: true,
    };
    let err = S3Client::with_client(client)
        .unwrap()
        .download_object(&request, &temp.path().join("gone.tif"))
        .unwrap_err();

    assert_matches!(
        err,
        NaipError::ObjectNotFound { bucket, key }
            if bucket == DEFAULT_BUCKET && key == "md/2013/1m/rgbir/38077/gone.tif"
    );
}

#[test]
fn native_client_drives_the_whole_pipeline() {
    let list = mock!(aws_sdk_s3::Client::list_objects_v2)
        .match_requests(|req| req.request_payer() == Some(&RequestPayer::Requester))
        .then_output(|| {
            ListObjectsV2Output::builder()
                .contents(object(&format!("{KEY_PREFIX}m_3807701_ne_18_1_20130924.tif")))
                .build()
        });
    let get = mock!(aws_sdk_s3::Client::get_object)
        .match_requests(|req| req.request_payer() == Some(&RequestPayer::Requester))
        .then_output(|| {
            GetObjectOutput::builder()
                .body(ByteStream::from_static(b"tile"))
                .build()
        });
    let client = mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&list, &get]);
    let s3 = S3Client::with_client(client).unwrap();

    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let downloader = Downloader::new(
        Store::new_with_root(root.clone()),
        BucketPrefix::new(DEFAULT_BUCKET, &Selection::default()),
        SampleCount::Limit(1),
        &s3,
        &s3,
    )
    .unwrap();
    let report = downloader
        .download_naips(&mut StdRng::seed_from_u64(5), &JsonOutput)
        .unwrap();

    let expected = root.join("naip/md/2013/1m/rgbir/38077/m_3807701_ne_18_1_20130924.tif");
    assert_eq!(report.local_paths(), vec![expected.clone()]);
    assert_eq!(std::fs::read(expected.as_std_path()).unwrap(), b"tile");
}
