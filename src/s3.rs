use std::fs::File;
use std::io::Write;
use std::path::Path;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::RequestPayer;
use tokio::runtime::Runtime;

use crate::config::{DEFAULT_AWS_REGION, Environment, ResolvedConfig};
use crate::credentials::AwsCredentials;
use crate::domain::BucketPrefix;
use crate::error::NaipError;
use crate::listing::{KeyLister, candidate_keys};

/// One single-object fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRequest {
    pub bucket: String,
    pub key: String,
    pub requester_pays: bool,
}

pub trait ObjectFetcher {
    fn download_object(&self, request: &ObjectRequest, destination: &Path)
    -> Result<(), NaipError>;
}

impl<T: ObjectFetcher + ?Sized> ObjectFetcher for &T {
    fn download_object(
        &self,
        request: &ObjectRequest,
        destination: &Path,
    ) -> Result<(), NaipError> {
        (**self).download_object(request, destination)
    }
}

#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub credentials: Option<AwsCredentials>,
}

impl S3Settings {
    /// Config file values win over the environment for region and endpoint.
    pub fn resolve(config: &ResolvedConfig, env: &Environment) -> Self {
        Self {
            region: config.aws_region.clone().or_else(|| env.aws_region.clone()),
            endpoint_url: config
                .endpoint_url
                .clone()
                .or_else(|| env.endpoint_url.clone()),
            credentials: env.credentials(),
        }
    }
}

/// Blocking facade over the AWS SDK with requester-pays on every call.
pub struct S3Client {
    client: aws_sdk_s3::Client,
    runtime: Runtime,
}

impl S3Client {
    pub fn new(settings: &S3Settings) -> Result<Self, NaipError> {
        let runtime = build_runtime()?;
        let client = runtime.block_on(build_client(settings));
        Ok(Self { client, runtime })
    }

    /// Wraps an already configured SDK client.
    pub fn with_client(client: aws_sdk_s3::Client) -> Result<Self, NaipError> {
        Ok(Self {
            client,
            runtime: build_runtime()?,
        })
    }

    async fn list_keys_async(&self, prefix: &BucketPrefix) -> Result<Vec<String>, NaipError> {
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(prefix.bucket())
                .prefix(prefix.key_prefix())
                .request_payer(RequestPayer::Requester)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|err| NaipError::Listing(DisplayErrorContext(&err).to_string()))?;

            keys.extend(candidate_keys(
                prefix,
                response.contents().iter().filter_map(|object| object.key()),
            ));

            continuation_token = response.next_continuation_token().map(str::to_string);
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    async fn download_object_async(
        &self,
        request: &ObjectRequest,
        destination: &Path,
    ) -> Result<(), NaipError> {
        let mut builder = self
            .client
            .get_object()
            .bucket(&request.bucket)
            .key(&request.key);
        if request.requester_pays {
            builder = builder.request_payer(RequestPayer::Requester);
        }
        let response = builder.send().await.map_err(|err| {
            if err
                .as_service_error()
                .map(|service| service.is_no_such_key())
                .unwrap_or(false)
            {
                NaipError::ObjectNotFound {
                    bucket: request.bucket.clone(),
                    key: request.key.clone(),
                }
            } else {
                NaipError::S3(DisplayErrorContext(&err).to_string())
            }
        })?;

        let mut file =
            File::create(destination).map_err(|err| NaipError::Filesystem(err.to_string()))?;
        let mut body = response.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|err| NaipError::S3(DisplayErrorContext(&err).to_string()))?
        {
            file.write_all(&chunk)
                .map_err(|err| NaipError::Filesystem(err.to_string()))?;
        }
        file.flush()
            .map_err(|err| NaipError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl KeyLister for S3Client {
    fn list_keys(&self, prefix: &BucketPrefix) -> Result<Vec<String>, NaipError> {
        let keys = self.runtime.block_on(self.list_keys_async(prefix))?;
        tracing::debug!(prefix = %prefix, keys = keys.len(), "native listing complete");
        Ok(keys)
    }
}

impl ObjectFetcher for S3Client {
    fn download_object(
        &self,
        request: &ObjectRequest,
        destination: &Path,
    ) -> Result<(), NaipError> {
        self.runtime
            .block_on(self.download_object_async(request, destination))
    }
}

fn build_runtime() -> Result<Runtime, NaipError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| NaipError::Runtime(err.to_string()))
}

async fn build_client(settings: &S3Settings) -> aws_sdk_s3::Client {
    let region = settings
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
    if let Some(creds) = &settings.credentials {
        loader = loader.credentials_provider(Credentials::new(
            &creds.access_key_id,
            &creds.secret_access_key,
            creds.session_token.clone(),
            None,
            "naip-fetch-env",
        ));
    }
    let shared = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(url) = &settings.endpoint_url {
        builder = builder.endpoint_url(url).force_path_style(true);
    }
    aws_sdk_s3::Client::from_conf(builder.build())
}
