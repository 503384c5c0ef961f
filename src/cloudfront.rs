//! CloudFront adapter for the core `Cdn` contract.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudfront::types::{InvalidationBatch as CloudFrontBatch, Paths};
use aws_sdk_cloudfront::Client;
use site_sync_core::contract::{BackendError, Cdn, InvalidationBatch, InvalidationSummary};

pub struct CloudFrontCdn {
    client: Client,
}

impl CloudFrontCdn {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }
}

#[async_trait]
impl Cdn for CloudFrontCdn {
    /// Every invalidation of the distribution, following pagination markers.
    async fn list_invalidations(
        &self,
        distribution_id: &str,
    ) -> Result<Vec<InvalidationSummary>, BackendError> {
        let mut summaries = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_invalidations()
                .distribution_id(distribution_id)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    let service_error = e.into_service_error();
                    tracing::error!(error = ?service_error, distribution_id, "ListInvalidations failed");
                    service_error
                })?;

            let Some(list) = output.invalidation_list() else {
                break;
            };
            summaries.extend(list.items().iter().map(|item| InvalidationSummary {
                id: item.id().to_string(),
                status: item.status().to_string(),
            }));

            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        tracing::debug!(distribution_id, count = summaries.len(), "Listed invalidations");
        Ok(summaries)
    }

    async fn create_invalidation(&self, batch: InvalidationBatch) -> Result<String, BackendError> {
        let items: Vec<String> = batch.paths.into_iter().collect();
        let paths = Paths::builder()
            .quantity(items.len() as i32)
            .set_items(Some(items))
            .build()?;
        let invalidation_batch = CloudFrontBatch::builder()
            .paths(paths)
            .caller_reference(batch.caller_reference)
            .build()?;

        let output = self
            .client
            .create_invalidation()
            .distribution_id(&batch.distribution_id)
            .invalidation_batch(invalidation_batch)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                tracing::error!(
                    error = ?service_error,
                    distribution_id = %batch.distribution_id,
                    "CreateInvalidation failed"
                );
                service_error
            })?;

        let invalidation = output
            .invalidation()
            .ok_or("CreateInvalidation response did not include an invalidation")?;
        tracing::info!(
            distribution_id = %batch.distribution_id,
            invalidation_id = invalidation.id(),
            status = invalidation.status(),
            "Invalidation submitted"
        );
        Ok(invalidation.id().to_string())
    }
}
