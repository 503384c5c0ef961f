//! Shared AWS SDK configuration for the S3 and CloudFront adapters.

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::{Credentials, Region};
use site_sync_core::RunConfig;
use tracing::info;

/// Load SDK configuration from the default provider chain, overridden by the
/// region and static credentials in `config` when present.
///
/// The custom endpoint is not applied here; it only concerns S3 (see
/// [`crate::s3::S3Store::from_sdk_config`]).
pub async fn load_sdk_config(config: &RunConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = config.region() {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let Some(credentials) = config.credentials() {
        loader = loader.credentials_provider(Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            "site-sync",
        ));
    }

    let sdk_config = loader.load().await;
    info!(
        region = sdk_config.region().map(|r| r.as_ref()).unwrap_or("-"),
        static_credentials = config.credentials().is_some(),
        "AWS SDK configuration loaded"
    );
    sdk_config
}
