use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use site_sync_core::contract::Cdn;
use site_sync_core::invalidation::InvalidationOutcome;
use site_sync_core::progress::{Progress, SilentProgress};
use site_sync_core::{synchronise, SyncOptions, SynchroniseReport};

use crate::aws::load_sdk_config;
use crate::cloudfront::CloudFrontCdn;
use crate::load_config::load_config;
use crate::progress::TerminalProgress;
use crate::s3::S3Store;

/// Incrementally deploy a static site directory to S3 and invalidate CloudFront.
#[derive(Debug, Parser)]
#[clap(
    name = "site-sync",
    version,
    about = "Upload changed files of a static site to S3 and invalidate the CloudFront cache"
)]
pub struct Cli {
    /// Directory holding the built site
    #[clap(value_name = "SOURCE_DIRECTORY")]
    pub source_directory: PathBuf,

    /// Destination bucket
    #[clap(long)]
    pub bucket: Option<String>,

    /// Canned ACL applied to uploaded objects [default: public-read]
    #[clap(long)]
    pub acl: Option<String>,

    /// Maximum number of files hashed or uploaded at once [default: 5]
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Prefix prepended to every object key
    #[clap(long)]
    pub key_prefix: Option<String>,

    /// Skip files whose remote fingerprint matches (default)
    #[clap(long, overrides_with = "no_check_md5")]
    pub check_md5: bool,

    /// Upload every file without comparing fingerprints
    #[clap(long, overrides_with = "check_md5")]
    pub no_check_md5: bool,

    /// Store the fingerprint as object metadata (default)
    #[clap(long, overrides_with = "no_set_md5")]
    pub set_md5: bool,

    /// Do not store the fingerprint as object metadata
    #[clap(long, overrides_with = "set_md5")]
    pub no_set_md5: bool,

    /// Refuse to deploy while the distribution has unfinished invalidations
    #[clap(long)]
    pub check_ongoing_invalidations: bool,

    /// Report what would be uploaded without writing anything
    #[clap(long)]
    pub dry_run: bool,

    /// CloudFront distribution id; invalidation is disabled without it
    #[clap(long)]
    pub distribution: Option<String>,

    /// Invalidate only the uploaded paths instead of `/*`
    #[clap(long)]
    pub granular_invalidation: bool,

    /// AWS region
    #[clap(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint (S3-compatible stores)
    #[clap(long)]
    pub endpoint_url: Option<String>,

    /// Path to a YAML config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Suppress progress output
    #[clap(long, short)]
    pub quiet: bool,
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (_, true) => Some(false),
        (true, false) => Some(true),
        (false, false) => None,
    }
}

fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

impl Cli {
    /// The command-line options layer. Flags that were not given stay unset
    /// so lower-priority layers can supply them.
    pub fn to_options(&self) -> SyncOptions {
        SyncOptions {
            source_directory: Some(self.source_directory.clone()),
            bucket: self.bucket.clone(),
            acl: self.acl.clone(),
            concurrency: self.concurrency,
            key_prefix: self.key_prefix.clone(),
            check_md5: flag_pair(self.check_md5, self.no_check_md5),
            set_md5: flag_pair(self.set_md5, self.no_set_md5),
            check_ongoing_invalidations: flag(self.check_ongoing_invalidations),
            dry_run: flag(self.dry_run),
            distribution_id: self.distribution.clone(),
            granular_invalidation: flag(self.granular_invalidation),
            access_key_id: None,
            secret_access_key: None,
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            quiet: flag(self.quiet),
        }
    }
}

/// CLI entrypoint shared by `main()` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.to_options(), cli.config.as_deref(), std::env::vars())?;

    let sdk_config = load_sdk_config(&config).await;
    let store = S3Store::from_sdk_config(&sdk_config, config.endpoint_url());
    let cdn = config
        .distribution_id()
        .map(|_| CloudFrontCdn::from_sdk_config(&sdk_config));

    let progress: Box<dyn Progress> = if config.quiet() {
        Box::new(SilentProgress)
    } else {
        Box::new(TerminalProgress::stderr())
    };

    let report = synchronise(
        &config,
        &store,
        cdn.as_ref().map(|cdn| cdn as &dyn Cdn),
        progress.as_ref(),
    )
    .await
    .context("Synchronisation failed")?;

    print!("{}", render_report(&report));
    Ok(())
}

/// Summary printed to stdout once a run completes.
pub fn render_report(report: &SynchroniseReport) -> String {
    let mut out = String::new();

    if report.dry_run {
        let _ = writeln!(out, "Dry run, nothing was written.");
        for file in report.files.iter().filter(|f| f.uploaded) {
            let _ = writeln!(out, "  would upload {} => {}", file.relative_path, file.key);
        }
    }

    let _ = writeln!(
        out,
        "Files: {} scanned, {} uploaded, {} unchanged ({} bytes uploaded)",
        report.files.len(),
        report.files_uploaded,
        report.files_skipped,
        report.bytes_uploaded
    );

    let invalidation = match &report.invalidation {
        InvalidationOutcome::NotConfigured => "Invalidation: no distribution configured".to_string(),
        InvalidationOutcome::SkippedDryRun => "Invalidation: skipped (dry run)".to_string(),
        InvalidationOutcome::NothingChanged => "Invalidation: nothing changed".to_string(),
        InvalidationOutcome::Created {
            invalidation_id,
            paths,
            ..
        } => format!(
            "Invalidation: {invalidation_id} created for {} path(s)",
            paths.len()
        ),
    };
    let _ = writeln!(out, "{invalidation}");
    out
}
