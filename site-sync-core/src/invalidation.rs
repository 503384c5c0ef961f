//! CDN invalidation planning and submission.
//!
//! The coordinator moves through
//! `Idle -> [CheckingOngoing] -> Invalidating -> Done`, or straight to `Done`
//! when no distribution is configured, or to `Skipped` for dry runs.

use std::collections::BTreeSet;

use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::contract::{Cdn, InvalidationBatch};
use crate::error::SyncError;

pub const WILDCARD_PATH: &str = "/*";

/// CloudFront's per-batch path limit.
pub const MAX_INVALIDATION_PATHS: usize = 3000;

/// Characters that must be percent-encoded in an invalidation path. `/` is
/// kept as the separator; non-ASCII is always encoded.
const PATH_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'*');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    CheckingOngoing,
    Invalidating,
    Done,
    Skipped,
}

/// What to invalidate once uploads are finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationPlan {
    /// No distribution configured.
    None,
    /// Dry run: nothing is submitted.
    DryRun,
    /// Granular mode and nothing changed.
    Empty,
    Paths(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvalidationOutcome {
    NotConfigured,
    SkippedDryRun,
    NothingChanged,
    Created {
        invalidation_id: String,
        paths: Vec<String>,
        caller_reference: String,
    },
}

/// Decide what to invalidate from the URIs that were actually uploaded.
pub fn plan_invalidation(config: &RunConfig, uploaded_uris: &[String]) -> InvalidationPlan {
    if config.distribution_id().is_none() {
        return InvalidationPlan::None;
    }
    if config.dry_run() {
        return InvalidationPlan::DryRun;
    }
    if !config.granular_invalidation() {
        return InvalidationPlan::Paths(BTreeSet::from([WILDCARD_PATH.to_string()]));
    }
    if uploaded_uris.is_empty() {
        return InvalidationPlan::Empty;
    }
    let paths: BTreeSet<String> = uploaded_uris.iter().map(|uri| invalidation_path(uri)).collect();
    if paths.len() > MAX_INVALIDATION_PATHS {
        warn!(
            paths = paths.len(),
            limit = MAX_INVALIDATION_PATHS,
            "Too many changed paths for one invalidation, using wildcard"
        );
        return InvalidationPlan::Paths(BTreeSet::from([WILDCARD_PATH.to_string()]));
    }
    InvalidationPlan::Paths(paths)
}

/// `/` + the URI, percent-encoded where CloudFront requires it.
pub fn invalidation_path(uri: &str) -> String {
    format!("/{}", utf8_percent_encode(uri, PATH_UNSAFE))
}

/// Unique per batch: millisecond UTC timestamp plus a random suffix.
pub fn caller_reference() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S%3f"), &suffix[..12])
}

pub struct InvalidationCoordinator<'a, C: Cdn + ?Sized> {
    cdn: &'a C,
    distribution_id: Option<&'a str>,
    state: CoordinatorState,
}

impl<'a, C: Cdn + ?Sized> InvalidationCoordinator<'a, C> {
    pub fn new(cdn: &'a C, distribution_id: Option<&'a str>) -> Self {
        Self {
            cdn,
            distribution_id,
            state: CoordinatorState::Idle,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Fail with [`SyncError::DeploymentConflict`] if the distribution has any
    /// invalidation that is not `Completed`. No-op without a distribution.
    pub async fn ensure_no_ongoing(&mut self) -> Result<(), SyncError> {
        let Some(distribution_id) = self.distribution_id else {
            return Ok(());
        };
        self.state = CoordinatorState::CheckingOngoing;
        info!(distribution_id, "Looking for ongoing invalidations");

        let summaries = self
            .cdn
            .list_invalidations(distribution_id)
            .await
            .map_err(|e| SyncError::cdn(distribution_id, e))?;
        let pending: Vec<String> = summaries
            .into_iter()
            .filter(|s| !s.is_completed())
            .map(|s| s.id)
            .collect();

        if !pending.is_empty() {
            warn!(distribution_id, pending = ?pending, "Distribution has ongoing invalidations");
            return Err(SyncError::DeploymentConflict {
                distribution_id: distribution_id.to_string(),
                pending,
            });
        }
        self.state = CoordinatorState::Idle;
        Ok(())
    }

    /// Submit the plan. Exactly one create call for a non-empty path set,
    /// none otherwise.
    pub async fn execute(&mut self, plan: InvalidationPlan) -> Result<InvalidationOutcome, SyncError> {
        let outcome = match (plan, self.distribution_id) {
            (InvalidationPlan::None, _) | (_, None) => {
                self.state = CoordinatorState::Done;
                InvalidationOutcome::NotConfigured
            }
            (InvalidationPlan::DryRun, Some(distribution_id)) => {
                info!(distribution_id, "Dry run, skipping invalidation");
                self.state = CoordinatorState::Skipped;
                InvalidationOutcome::SkippedDryRun
            }
            (InvalidationPlan::Empty, Some(distribution_id)) => {
                info!(distribution_id, "No changed paths, skipping invalidation");
                self.state = CoordinatorState::Done;
                InvalidationOutcome::NothingChanged
            }
            (InvalidationPlan::Paths(paths), Some(distribution_id)) => {
                self.state = CoordinatorState::Invalidating;
                let batch = InvalidationBatch {
                    distribution_id: distribution_id.to_string(),
                    paths,
                    caller_reference: caller_reference(),
                };
                info!(
                    distribution_id,
                    paths = batch.paths.len(),
                    caller_reference = %batch.caller_reference,
                    "Creating invalidation"
                );
                let paths: Vec<String> = batch.paths.iter().cloned().collect();
                let caller_reference = batch.caller_reference.clone();
                let invalidation_id = self
                    .cdn
                    .create_invalidation(batch)
                    .await
                    .map_err(|e| SyncError::cdn(distribution_id, e))?;
                info!(distribution_id, invalidation_id = %invalidation_id, "Invalidation created");
                self.state = CoordinatorState::Done;
                InvalidationOutcome::Created {
                    invalidation_id,
                    paths,
                    caller_reference,
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncOptions;
    use crate::contract::{InvalidationSummary, MockCdn};

    fn config(tweak: impl FnOnce(&mut SyncOptions)) -> RunConfig {
        let mut opts = SyncOptions {
            source_directory: Some("site".into()),
            bucket: Some("bucket".into()),
            distribution_id: Some("E2EXAMPLE".into()),
            ..Default::default()
        };
        tweak(&mut opts);
        RunConfig::from_options(opts).unwrap()
    }

    fn uris(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn wildcard_ignores_changed_set() {
        let plan = plan_invalidation(&config(|_| {}), &[]);
        assert_eq!(plan, InvalidationPlan::Paths(BTreeSet::from(["/*".to_string()])));
    }

    #[test]
    fn granular_prefixes_each_uri() {
        let config = config(|o| o.granular_invalidation = Some(true));
        let plan = plan_invalidation(&config, &uris(&["about", "css/site.css", "about"]));
        assert_eq!(
            plan,
            InvalidationPlan::Paths(BTreeSet::from([
                "/about".to_string(),
                "/css/site.css".to_string()
            ]))
        );
    }

    #[test]
    fn granular_paths_are_percent_encoded() {
        assert_eq!(invalidation_path("blog/my post"), "/blog/my%20post");
        assert_eq!(invalidation_path("50%off"), "/50%25off");
        assert_eq!(invalidation_path("caf\u{e9}"), "/caf%C3%A9");
        assert_eq!(invalidation_path("css/site.css"), "/css/site.css");
        assert_eq!(invalidation_path("a*b"), "/a%2Ab");
    }

    #[test]
    fn oversized_granular_set_falls_back_to_wildcard() {
        let config = config(|o| o.granular_invalidation = Some(true));
        let many: Vec<String> = (0..=MAX_INVALIDATION_PATHS).map(|i| format!("page-{i}")).collect();
        assert_eq!(
            plan_invalidation(&config, &many),
            InvalidationPlan::Paths(BTreeSet::from(["/*".to_string()]))
        );

        let at_limit = &many[..MAX_INVALIDATION_PATHS];
        match plan_invalidation(&config, at_limit) {
            InvalidationPlan::Paths(paths) => assert_eq!(paths.len(), MAX_INVALIDATION_PATHS),
            other => panic!("expected paths, got {other:?}"),
        }
    }

    #[test]
    fn granular_with_nothing_changed_is_empty() {
        let config = config(|o| o.granular_invalidation = Some(true));
        assert_eq!(plan_invalidation(&config, &[]), InvalidationPlan::Empty);
    }

    #[test]
    fn dry_run_and_missing_distribution() {
        let dry = config(|o| o.dry_run = Some(true));
        assert_eq!(plan_invalidation(&dry, &uris(&["a"])), InvalidationPlan::DryRun);

        let none = config(|o| o.distribution_id = None);
        assert_eq!(plan_invalidation(&none, &uris(&["a"])), InvalidationPlan::None);
    }

    #[test]
    fn caller_references_differ() {
        let a = caller_reference();
        let b = caller_reference();
        assert_ne!(a, b);
        assert_eq!(a.len(), 17 + 1 + 12);
    }

    #[tokio::test]
    async fn ongoing_invalidation_is_a_conflict() {
        let mut cdn = MockCdn::new();
        cdn.expect_list_invalidations()
            .withf(|id| id == "E2EXAMPLE")
            .returning(|_| {
                Ok(vec![
                    InvalidationSummary { id: "I1".into(), status: "Completed".into() },
                    InvalidationSummary { id: "I2".into(), status: "InProgress".into() },
                ])
            });

        let mut coordinator = InvalidationCoordinator::new(&cdn, Some("E2EXAMPLE"));
        let err = coordinator.ensure_no_ongoing().await.unwrap_err();
        match err {
            SyncError::DeploymentConflict { pending, .. } => assert_eq!(pending, vec!["I2"]),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(coordinator.state(), CoordinatorState::CheckingOngoing);
    }

    #[tokio::test]
    async fn completed_invalidations_do_not_block() {
        let mut cdn = MockCdn::new();
        cdn.expect_list_invalidations().returning(|_| {
            Ok(vec![InvalidationSummary { id: "I1".into(), status: "Completed".into() }])
        });

        let mut coordinator = InvalidationCoordinator::new(&cdn, Some("E2EXAMPLE"));
        coordinator.ensure_no_ongoing().await.unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn execute_creates_one_batch() {
        let mut cdn = MockCdn::new();
        cdn.expect_create_invalidation()
            .withf(|batch| {
                batch.distribution_id == "E2EXAMPLE"
                    && batch.paths == BTreeSet::from(["/*".to_string()])
                    && !batch.caller_reference.is_empty()
            })
            .times(1)
            .returning(|_| Ok("I9".to_string()));

        let mut coordinator = InvalidationCoordinator::new(&cdn, Some("E2EXAMPLE"));
        let plan = plan_invalidation(&config(|_| {}), &[]);
        let outcome = coordinator.execute(plan).await.unwrap();
        match outcome {
            InvalidationOutcome::Created { invalidation_id, paths, .. } => {
                assert_eq!(invalidation_id, "I9");
                assert_eq!(paths, vec!["/*"]);
            }
            other => panic!("expected created, got {other:?}"),
        }
        assert_eq!(coordinator.state(), CoordinatorState::Done);
    }

    #[tokio::test]
    async fn empty_and_dry_run_plans_make_no_calls() {
        let mut cdn = MockCdn::new();
        cdn.expect_create_invalidation().never();

        let mut coordinator = InvalidationCoordinator::new(&cdn, Some("E2EXAMPLE"));
        assert_eq!(
            coordinator.execute(InvalidationPlan::Empty).await.unwrap(),
            InvalidationOutcome::NothingChanged
        );
        assert_eq!(
            coordinator.execute(InvalidationPlan::DryRun).await.unwrap(),
            InvalidationOutcome::SkippedDryRun
        );
        assert_eq!(coordinator.state(), CoordinatorState::Skipped);
    }

    #[tokio::test]
    async fn create_failure_is_a_cdn_error() {
        let mut cdn = MockCdn::new();
        cdn.expect_create_invalidation()
            .returning(|_| Err("TooManyInvalidationsInProgress".into()));

        let mut coordinator = InvalidationCoordinator::new(&cdn, Some("E2EXAMPLE"));
        let plan = plan_invalidation(&config(|_| {}), &[]);
        let err = coordinator.execute(plan).await.unwrap_err();
        assert!(matches!(err, SyncError::Cdn { .. }), "got {err:?}");
        assert!(err.to_string().contains("TooManyInvalidationsInProgress"));
    }
}
