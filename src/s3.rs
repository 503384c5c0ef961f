#![doc = "S3 adapter: implements the core `ObjectStore` contract with the AWS SDK."]
//
//! Two calls are needed by the engine: a metadata lookup (`HeadObject`) and a
//! single-part upload (`PutObject`). A missing object is not an error here;
//! `head_object_metadata` reports it as `None` so the engine uploads it.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use site_sync_core::contract::{BackendError, ObjectMetadata, ObjectStore, PutObject};

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// With a custom endpoint (MinIO, LocalStack, ...) path-style addressing
    /// is forced.
    pub fn from_sdk_config(sdk_config: &SdkConfig, endpoint_url: Option<&str>) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        if let Some(endpoint_url) = endpoint_url {
            tracing::info!(endpoint_url, "Using custom S3 endpoint");
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, BackendError> {
        let result = self.client.head_object().bucket(bucket).key(key).send().await;

        match result {
            Ok(output) => {
                let user_metadata = output.metadata().cloned().unwrap_or_default();
                tracing::debug!(bucket, key, entries = user_metadata.len(), "HeadObject succeeded");
                Ok(Some(ObjectMetadata { user_metadata }))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    tracing::debug!(bucket, key, "Object does not exist yet");
                    Ok(None)
                } else {
                    tracing::error!(error = ?service_error, bucket, key, "HeadObject failed");
                    Err(Box::new(service_error))
                }
            }
        }
    }

    async fn put_object(&self, request: PutObject) -> Result<(), BackendError> {
        let body = ByteStream::from_path(&request.body).await.map_err(|e| {
            tracing::error!(error = ?e, path = %request.body.display(), "Failed to open upload body");
            e
        })?;

        let metadata: Option<HashMap<String, String>> =
            (!request.metadata.is_empty()).then_some(request.metadata);

        let result = self
            .client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(body)
            .content_length(request.size_bytes as i64)
            .content_md5(&request.content_md5)
            .acl(ObjectCannedAcl::from(request.acl.as_str()))
            .set_content_type(request.content_type)
            .set_metadata(metadata)
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(bucket = %request.bucket, key = %request.key, "Object uploaded");
                Ok(())
            }
            Err(e) => {
                let service_error = e.into_service_error();
                tracing::error!(error = ?service_error, key = %request.key, "PutObject failed");
                Err(Box::new(service_error))
            }
        }
    }
}
