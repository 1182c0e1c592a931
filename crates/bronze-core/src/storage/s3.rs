use std::fmt;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{join_key, Storage, StorageError};
use crate::config::StorageConfig;

impl StorageError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

/// Objects in an S3-compatible bucket, optionally below a root prefix.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    root_prefix: String,
}

impl S3Storage {
    pub async fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .filter(|bucket| !bucket.is_empty())
            .ok_or_else(|| StorageError::Configuration("bucket name cannot be empty".into()))?;

        let region = config.region.unwrap_or_else(|| "us-east-1".to_string());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            root_prefix: config.prefix.unwrap_or_default().trim_matches('/').to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        join_key(&self.root_prefix, key.trim_start_matches('/'))
    }

    fn relative_key<'a>(&self, full: &'a str) -> &'a str {
        if self.root_prefix.is_empty() {
            return full;
        }
        full.strip_prefix(self.root_prefix.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(full)
    }

    fn copy_source(&self, full_key: &str) -> String {
        let encoded: Vec<String> = full_key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.bucket, encoded.join("/"))
    }
}

#[async_trait]
impl Storage for S3Storage {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.root_prefix)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut full_prefix = self.full_key(prefix.trim_matches('/'));
        if !full_prefix.is_empty() {
            full_prefix.push('/');
        }

        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .delimiter("/")
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(StorageError::from_sdk)?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    if !key.ends_with('/') {
                        keys.push(self.relative_key(key).to_string());
                    }
                }
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(service_err) => {
                    let message = service_err.err().to_string();
                    if message.contains("NoSuchKey") {
                        StorageError::NotFound(key.to_string())
                    } else {
                        StorageError::from_sdk(message)
                    }
                }
                other => StorageError::from_sdk(other),
            })?;

        let data = output.body.collect().await.map_err(StorageError::from_sdk)?;
        Ok(data.into_bytes())
    }

    async fn move_object(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.full_key(from);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(&source))
            .key(self.full_key(to))
            .send()
            .await
            .map_err(StorageError::from_sdk)?;

        self.delete(from).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(StorageError::from_sdk)?;
        Ok(())
    }
}
