//! Security posture analysis.
//!
//! Runs a set of independent, read-only backend checks and merges their
//! results into one [`SecurityReport`]. Two orthogonal knobs control a run:
//!
//! - **parallel**: every enabled check runs as its own future and the call
//!   joins all of them; otherwise checks run one by one in
//!   [`PostureCheck::DECLARED_ORDER`].
//! - **fail_fast** (sequential only): the first failing critical check aborts
//!   the run with [`PostureError`]. Otherwise each failure becomes one entry
//!   in the report's `errors` list, or `warnings` for best-effort checks.
//!
//! Results are merged on the calling task after the checks complete, so the
//! report is never shared between concurrent writers.

use crate::vault::{BackendError, HealthStatus, MountEntry, VaultClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default upper bound for a single check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Read-only backend queries used by the posture checks.
#[async_trait]
pub trait PostureBackend: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, BackendError>;
    async fn audit_devices(&self) -> Result<Vec<MountEntry>, BackendError>;
    async fn auth_methods(&self) -> Result<Vec<MountEntry>, BackendError>;
    async fn policies(&self) -> Result<Vec<String>, BackendError>;
    async fn mounts(&self) -> Result<Vec<MountEntry>, BackendError>;
    async fn ui_headers(&self) -> Result<Vec<String>, BackendError>;
}

#[async_trait]
impl PostureBackend for VaultClient {
    async fn health(&self) -> Result<HealthStatus, BackendError> {
        VaultClient::health(self).await
    }

    async fn audit_devices(&self) -> Result<Vec<MountEntry>, BackendError> {
        self.list_audit_devices().await
    }

    async fn auth_methods(&self) -> Result<Vec<MountEntry>, BackendError> {
        self.list_auth_methods().await
    }

    async fn policies(&self) -> Result<Vec<String>, BackendError> {
        self.list_policies().await
    }

    async fn mounts(&self) -> Result<Vec<MountEntry>, BackendError> {
        self.list_mounts().await
    }

    async fn ui_headers(&self) -> Result<Vec<String>, BackendError> {
        self.list_ui_headers().await
    }
}

/// One independent posture check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostureCheck {
    Health,
    Audit,
    AuthMethods,
    Policies,
    Mounts,
    UiConfig,
}

impl PostureCheck {
    /// Order used by sequential runs.
    pub const DECLARED_ORDER: [PostureCheck; 6] = [
        PostureCheck::Health,
        PostureCheck::Audit,
        PostureCheck::AuthMethods,
        PostureCheck::Policies,
        PostureCheck::Mounts,
        PostureCheck::UiConfig,
    ];

    /// Scope name reported in metadata and error strings.
    pub fn name(self) -> &'static str {
        match self {
            PostureCheck::Health => "health",
            PostureCheck::Audit => "audit",
            PostureCheck::AuthMethods => "auth_methods",
            PostureCheck::Policies => "policies",
            PostureCheck::Mounts => "mounts",
            PostureCheck::UiConfig => "ui_config",
        }
    }

    /// Best-effort checks report failures as warnings and never abort a run.
    pub fn is_best_effort(self) -> bool {
        matches!(self, PostureCheck::UiConfig)
    }
}

impl fmt::Display for PostureCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which checks a run executes. Everything is enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScope {
    pub health: bool,
    pub audit: bool,
    pub auth_methods: bool,
    pub policies: bool,
    pub mounts: bool,
    pub ui_config: bool,
}

impl Default for SecurityScope {
    fn default() -> Self {
        Self {
            health: true,
            audit: true,
            auth_methods: true,
            policies: true,
            mounts: true,
            ui_config: true,
        }
    }
}

impl SecurityScope {
    /// A scope with every check disabled.
    pub fn none() -> Self {
        Self {
            health: false,
            audit: false,
            auth_methods: false,
            policies: false,
            mounts: false,
            ui_config: false,
        }
    }

    /// A scope running a single check.
    pub fn only(check: PostureCheck) -> Self {
        let mut scope = Self::none();
        *scope.toggle_mut(check) = true;
        scope
    }

    pub fn includes(&self, check: PostureCheck) -> bool {
        match check {
            PostureCheck::Health => self.health,
            PostureCheck::Audit => self.audit,
            PostureCheck::AuthMethods => self.auth_methods,
            PostureCheck::Policies => self.policies,
            PostureCheck::Mounts => self.mounts,
            PostureCheck::UiConfig => self.ui_config,
        }
    }

    /// Enabled checks in declared order.
    pub fn enabled_checks(&self) -> Vec<PostureCheck> {
        PostureCheck::DECLARED_ORDER
            .into_iter()
            .filter(|check| self.includes(*check))
            .collect()
    }

    fn toggle_mut(&mut self, check: PostureCheck) -> &mut bool {
        match check {
            PostureCheck::Health => &mut self.health,
            PostureCheck::Audit => &mut self.audit,
            PostureCheck::AuthMethods => &mut self.auth_methods,
            PostureCheck::Policies => &mut self.policies,
            PostureCheck::Mounts => &mut self.mounts,
            PostureCheck::UiConfig => &mut self.ui_config,
        }
    }
}

/// Execution policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Run checks concurrently instead of in declared order.
    pub parallel: bool,
    /// Abort on the first critical failure. Ignored when `parallel` is set.
    pub fail_fast: bool,
    /// Upper bound for each check. `None` waits indefinitely.
    pub check_timeout: Option<Duration>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            fail_fast: false,
            check_timeout: Some(DEFAULT_CHECK_TIMEOUT),
        }
    }
}

/// Custom UI header configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfigSummary {
    pub headers: Vec<String>,
}

/// Run metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    pub timestamp: DateTime<Utc>,
    /// Names of the checks that were enabled.
    pub scope: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Consolidated posture report.
///
/// A result field is `Some` iff its check ran and succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityReport {
    pub health: Option<HealthStatus>,
    pub audit_devices: Option<Vec<MountEntry>>,
    pub auth_methods: Option<Vec<MountEntry>>,
    pub policies: Option<Vec<String>>,
    pub mounts: Option<Vec<MountEntry>>,
    pub ui_config: Option<UiConfigSummary>,
    pub metadata: ReportMetadata,
}

impl SecurityReport {
    fn empty(checks: &[PostureCheck]) -> Self {
        Self {
            health: None,
            audit_devices: None,
            auth_methods: None,
            policies: None,
            mounts: None,
            ui_config: None,
            metadata: ReportMetadata {
                timestamp: Utc::now(),
                scope: checks.iter().map(|c| c.name().to_string()).collect(),
                errors: Vec::new(),
                warnings: Vec::new(),
            },
        }
    }

    fn record(&mut self, check: PostureCheck, outcome: Result<CheckOutput, CheckFailure>) {
        match outcome {
            Ok(CheckOutput::Health(health)) => self.health = Some(health),
            Ok(CheckOutput::AuditDevices(devices)) => self.audit_devices = Some(devices),
            Ok(CheckOutput::AuthMethods(methods)) => self.auth_methods = Some(methods),
            Ok(CheckOutput::Policies(policies)) => self.policies = Some(policies),
            Ok(CheckOutput::Mounts(mounts)) => self.mounts = Some(mounts),
            Ok(CheckOutput::UiHeaders(headers)) => {
                self.ui_config = Some(UiConfigSummary { headers })
            }
            Err(failure) => {
                let message = format!("{check}: {failure}");
                if check.is_best_effort() {
                    tracing::warn!(check = check.name(), error = %failure, "best-effort posture check failed");
                    self.metadata.warnings.push(message);
                } else {
                    tracing::warn!(check = check.name(), error = %failure, "posture check failed");
                    self.metadata.errors.push(message);
                }
            }
        }
    }
}

/// Why a single check produced no result.
#[derive(Debug, Error)]
pub enum CheckFailure {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),
}

/// A fail-fast run aborted.
#[derive(Debug, Error)]
pub enum PostureError {
    #[error("{check} check failed: {source}")]
    CheckFailed {
        check: PostureCheck,
        #[source]
        source: CheckFailure,
    },
}

enum CheckOutput {
    Health(HealthStatus),
    AuditDevices(Vec<MountEntry>),
    AuthMethods(Vec<MountEntry>),
    Policies(Vec<String>),
    Mounts(Vec<MountEntry>),
    UiHeaders(Vec<String>),
}

/// Run the enabled checks against `backend` and build the report.
pub async fn analyze(
    backend: &dyn PostureBackend,
    scope: &SecurityScope,
    options: AnalyzeOptions,
) -> Result<SecurityReport, PostureError> {
    let checks = scope.enabled_checks();
    let mut report = SecurityReport::empty(&checks);

    tracing::info!(
        scope = ?report.metadata.scope,
        parallel = options.parallel,
        fail_fast = options.fail_fast,
        "Starting security posture analysis"
    );

    if options.parallel {
        let outcomes = join_all(checks.iter().map(|&check| async move {
            (check, run_check(backend, check, options.check_timeout).await)
        }))
        .await;

        for (check, outcome) in outcomes {
            report.record(check, outcome);
        }
    } else {
        for check in checks {
            let outcome = run_check(backend, check, options.check_timeout).await;
            if options.fail_fast && !check.is_best_effort() {
                if let Err(source) = outcome {
                    tracing::warn!(check = check.name(), error = %source, "posture analysis aborted");
                    return Err(PostureError::CheckFailed { check, source });
                }
            }
            report.record(check, outcome);
        }
    }

    tracing::info!(
        errors = report.metadata.errors.len(),
        warnings = report.metadata.warnings.len(),
        "Security posture analysis complete"
    );
    Ok(report)
}

async fn run_check(
    backend: &dyn PostureBackend,
    check: PostureCheck,
    timeout: Option<Duration>,
) -> Result<CheckOutput, CheckFailure> {
    let query = async {
        let output = match check {
            PostureCheck::Health => CheckOutput::Health(backend.health().await?),
            PostureCheck::Audit => CheckOutput::AuditDevices(backend.audit_devices().await?),
            PostureCheck::AuthMethods => CheckOutput::AuthMethods(backend.auth_methods().await?),
            PostureCheck::Policies => CheckOutput::Policies(backend.policies().await?),
            PostureCheck::Mounts => CheckOutput::Mounts(backend.mounts().await?),
            PostureCheck::UiConfig => CheckOutput::UiHeaders(backend.ui_headers().await?),
        };
        Ok::<_, CheckFailure>(output)
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, query)
            .await
            .map_err(|_| CheckFailure::TimedOut(limit))?,
        None => query.await,
    }
}
