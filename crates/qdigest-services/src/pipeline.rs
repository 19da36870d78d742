//! Pipeline startup and shutdown
//!
//! Sessions are opened in dependency order: source admin, instrumentation
//! setup, source app, destination admin, provisioning, destination app.
//! Whatever was opened is released exactly once, whether startup fails
//! part way, the run finishes, or the run is cancelled.

use std::sync::Arc;

use qdigest_admin::{SchemaProvisioner, SchemaSpec};
use qdigest_connection::{
    BackoffStrategy, ConnectionSupervisor, HealthStatus, ReconnectConfig, SessionGuard,
};
use qdigest_core::{
    Connection, ConnectionError, DatabaseDriver, DigestError, DocumentStore, Session, Settings,
    config::RetrySettings,
};
use qdigest_driver_mongodb::MongoDbDriver;
use qdigest_driver_mysql::MySqlDriver;
use qdigest_monitor::{InstrumentationSetup, PlanSampler};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{Orchestrator, PipelineContext, RunSummary};
use crate::record_writer::RecordWriter;

pub const SOURCE_ADMIN: &str = "source-admin";
pub const SOURCE_APP: &str = "source-app";
pub const DESTINATION_ADMIN: &str = "destination-admin";
pub const DESTINATION_APP: &str = "destination-app";

/// Retry policy for every supervised connect
pub fn reconnect_config(retry: &RetrySettings) -> ReconnectConfig {
    let millis = |d: std::time::Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
    let backoff = if retry.is_exponential() {
        BackoffStrategy::new(millis(retry.backoff), millis(retry.backoff_max))
    } else {
        BackoffStrategy::fixed(millis(retry.backoff))
    };
    ReconnectConfig::new(retry.max_retries, backoff.with_jitter(retry.jitter))
}

/// One driver per session role
pub struct PipelineDrivers<S, D>
where
    S: DatabaseDriver<Session = dyn Connection>,
    D: DatabaseDriver<Session = dyn DocumentStore>,
{
    pub source_admin: S,
    pub source_app: S,
    pub destination_admin: D,
    pub destination_app: D,
}

impl PipelineDrivers<MySqlDriver, MongoDbDriver> {
    /// MySQL and MongoDB drivers for the configured endpoints
    pub fn from_settings(settings: &Settings) -> Self {
        let source = || {
            MySqlDriver::new(settings.source.endpoint.clone())
                .with_socket(settings.source.socket.clone())
        };
        Self {
            source_admin: source(),
            source_app: source(),
            destination_admin: MongoDbDriver::new(settings.destination.admin_endpoint.clone()),
            destination_app: MongoDbDriver::new(settings.destination.app_endpoint.clone()),
        }
    }
}

/// Health of one role, as reported by `qdigest check`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleHealth {
    pub role: &'static str,
    pub driver: &'static str,
    pub status: HealthStatus,
}

/// The guarded sessions of one run
#[derive(Default)]
struct Sessions {
    source_admin: Option<SessionGuard<dyn Connection>>,
    source_app: Option<SessionGuard<dyn Connection>>,
    destination_admin: Option<SessionGuard<dyn DocumentStore>>,
    destination_app: Option<SessionGuard<dyn DocumentStore>>,
}

impl Sessions {
    /// Release in reverse opening order. Failures are logged, never returned.
    async fn release(self) {
        if let Some(guard) = self.destination_app {
            release_guard(guard).await;
        }
        if let Some(guard) = self.destination_admin {
            release_guard(guard).await;
        }
        if let Some(guard) = self.source_app {
            release_guard(guard).await;
        }
        if let Some(guard) = self.source_admin {
            release_guard(guard).await;
        }
    }
}

async fn release_guard<S: Session + ?Sized>(guard: SessionGuard<S>) {
    let role = guard.role();
    if let Err(e) = guard.release().await {
        tracing::warn!(role = role, error = %e, "could not close session");
    }
}

async fn connect_role<D>(
    role: &'static str,
    driver: D,
    retry: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Result<SessionGuard<D::Session>, ConnectionError>
where
    D: DatabaseDriver,
{
    let supervisor = ConnectionSupervisor::new(driver, retry.clone());
    let supervised = supervisor.connect(cancel).await?;
    tracing::info!(
        role = role,
        attempts = supervised.attempts,
        port = supervised.health.port,
        "session ready"
    );
    Ok(SessionGuard::new(role, supervised.session))
}

/// A started pipeline: every session open and the destination provisioned
pub struct Pipeline {
    ctx: PipelineContext,
    orchestrator: Orchestrator,
    sessions: Sessions,
}

impl Pipeline {
    /// Connect every role and prepare both sides
    ///
    /// On failure, sessions opened so far are released before the error is
    /// returned.
    #[tracing::instrument(skip_all, fields(database = %settings.destination.database))]
    pub async fn start<S, D>(
        settings: &Settings,
        drivers: PipelineDrivers<S, D>,
        cancel: &CancellationToken,
    ) -> Result<Self, DigestError>
    where
        S: DatabaseDriver<Session = dyn Connection>,
        D: DatabaseDriver<Session = dyn DocumentStore>,
    {
        let mut sessions = Sessions::default();
        match Self::open(settings, drivers, cancel, &mut sessions).await {
            Ok(ctx) => {
                let writer = RecordWriter::new(
                    settings.destination.database.clone(),
                    settings.destination.collection.clone(),
                );
                let orchestrator = Orchestrator::new(
                    PlanSampler::new(settings.source.schema.clone()),
                    writer,
                    settings.query.clone(),
                    settings.iterations,
                )
                .with_interval(settings.interval);
                Ok(Self {
                    ctx,
                    orchestrator,
                    sessions,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "pipeline startup failed");
                sessions.release().await;
                Err(e)
            }
        }
    }

    async fn open<S, D>(
        settings: &Settings,
        drivers: PipelineDrivers<S, D>,
        cancel: &CancellationToken,
        sessions: &mut Sessions,
    ) -> Result<PipelineContext, DigestError>
    where
        S: DatabaseDriver<Session = dyn Connection>,
        D: DatabaseDriver<Session = dyn DocumentStore>,
    {
        let retry = reconnect_config(&settings.retry);
        let PipelineDrivers {
            source_admin,
            source_app,
            destination_admin,
            destination_app,
        } = drivers;

        let guard = connect_role(SOURCE_ADMIN, source_admin, &retry, cancel).await?;
        let source_admin: Arc<dyn Connection> = Arc::clone(guard.session());
        sessions.source_admin = Some(guard);

        InstrumentationSetup::new(settings.source.schema.clone())
            .with_max_connections(settings.source.max_connections)
            .apply(source_admin.as_ref())
            .await?;

        let guard = connect_role(SOURCE_APP, source_app, &retry, cancel).await?;
        let source_app: Arc<dyn Connection> = Arc::clone(guard.session());
        sessions.source_app = Some(guard);

        let guard = connect_role(DESTINATION_ADMIN, destination_admin, &retry, cancel).await?;
        let destination_admin: Arc<dyn DocumentStore> = Arc::clone(guard.session());
        sessions.destination_admin = Some(guard);

        let spec = SchemaSpec::new(settings.destination.database.clone())
            .with_collection(settings.destination.collection.clone());
        SchemaProvisioner::new(spec)
            .ensure_schema(destination_admin.as_ref(), &settings.destination.principal)
            .await?;

        let guard = connect_role(DESTINATION_APP, destination_app, &retry, cancel).await?;
        let destination: Arc<dyn DocumentStore> = Arc::clone(guard.session());
        sessions.destination_app = Some(guard);

        Ok(PipelineContext::new(source_admin, source_app, destination))
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run the sampling loop until its budget is spent or `cancel` fires
    pub async fn run(&self, cancel: &CancellationToken) -> RunSummary {
        self.orchestrator.run(&self.ctx, cancel).await
    }

    /// Release every session
    pub async fn shutdown(self) {
        tracing::info!("shutting down pipeline");
        self.sessions.release().await;
    }

    /// Start, run and shut down
    pub async fn execute<S, D>(
        settings: &Settings,
        drivers: PipelineDrivers<S, D>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, DigestError>
    where
        S: DatabaseDriver<Session = dyn Connection>,
        D: DatabaseDriver<Session = dyn DocumentStore>,
    {
        let pipeline = Self::start(settings, drivers, cancel).await?;
        let summary = pipeline.run(cancel).await;
        pipeline.shutdown().await;
        Ok(summary)
    }

    /// One unretried connect per role, reporting each outcome
    ///
    /// Opened sessions are closed again before returning.
    pub async fn check<S, D>(settings: &Settings, drivers: PipelineDrivers<S, D>) -> Vec<RoleHealth>
    where
        S: DatabaseDriver<Session = dyn Connection>,
        D: DatabaseDriver<Session = dyn DocumentStore>,
    {
        let retry = reconnect_config(&settings.retry);
        let mut report = Vec::with_capacity(4);
        report.push(probe_role(SOURCE_ADMIN, drivers.source_admin, &retry).await);
        report.push(probe_role(SOURCE_APP, drivers.source_app, &retry).await);
        report.push(probe_role(DESTINATION_ADMIN, drivers.destination_admin, &retry).await);
        report.push(probe_role(DESTINATION_APP, drivers.destination_app, &retry).await);
        report
    }
}

async fn probe_role<D: DatabaseDriver>(
    role: &'static str,
    driver: D,
    retry: &ReconnectConfig,
) -> RoleHealth {
    let supervisor = ConnectionSupervisor::new(driver, retry.clone());
    RoleHealth {
        role,
        driver: supervisor.driver().name(),
        status: supervisor.probe().await,
    }
}
