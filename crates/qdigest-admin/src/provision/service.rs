//! Schema provisioning service implementation

use qdigest_core::{DocumentStore, DriverError, Principal, ProvisioningError};
use serde::{Deserialize, Serialize};

/// Characters MongoDB rejects in database names
const INVALID_DATABASE_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$', '\0'];

/// Where samples are stored
///
/// # Examples
///
/// ```
/// use qdigest_admin::SchemaSpec;
///
/// let spec = SchemaSpec::new("QueryDigest").with_collection("Queries");
/// assert_eq!(spec.database(), "QueryDigest");
/// assert_eq!(spec.collection(), "Queries");
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSpec {
    database: String,
    collection: String,
}

impl SchemaSpec {
    /// Create a spec for `database` with the default `Queries` collection
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: qdigest_core::config::DEFAULT_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Check names before any command is sent
    pub fn validate(&self) -> Result<(), ProvisioningError> {
        if self.database.is_empty() {
            return Err(ProvisioningError::InvalidSpec(
                "database name cannot be empty".to_string(),
            ));
        }
        if let Some(c) = self.database.chars().find(|c| INVALID_DATABASE_CHARS.contains(c)) {
            return Err(ProvisioningError::InvalidSpec(format!(
                "database name {:?} contains {:?}",
                self.database, c
            )));
        }
        if self.collection.is_empty() {
            return Err(ProvisioningError::InvalidSpec(
                "collection name cannot be empty".to_string(),
            ));
        }
        if self.collection.starts_with("system.") || self.collection.contains('$') {
            return Err(ProvisioningError::InvalidSpec(format!(
                "collection name {:?} is reserved",
                self.collection
            )));
        }
        Ok(())
    }
}

/// What one provisioning step found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Created,
    AlreadyPresent,
}

/// Outcome of each step of one `ensure_schema` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub database: StepOutcome,
    pub principal: StepOutcome,
    pub collection: StepOutcome,
}

impl ProvisionReport {
    /// Whether every object already existed
    pub fn was_noop(&self) -> bool {
        self.database == StepOutcome::AlreadyPresent
            && self.principal == StepOutcome::AlreadyPresent
            && self.collection == StepOutcome::AlreadyPresent
    }
}

/// Run a create step, treating "already exists" as success
fn absorb_existing(result: Result<(), DriverError>) -> Result<StepOutcome, DriverError> {
    match result {
        Ok(()) => Ok(StepOutcome::Created),
        Err(e) if e.is_already_exists() => Ok(StepOutcome::AlreadyPresent),
        Err(e) => Err(e),
    }
}

/// Idempotently provisions the destination store
///
/// Two instances provisioning at once may both see an object as absent and
/// both create it; the loser's "already exists" is absorbed.
#[derive(Debug, Clone)]
pub struct SchemaProvisioner {
    spec: SchemaSpec,
}

impl SchemaProvisioner {
    pub fn new(spec: SchemaSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &SchemaSpec {
        &self.spec
    }

    /// Ensure the database, principal, collection and grant exist, in that order
    #[tracing::instrument(
        skip(self, store, principal),
        fields(database = %self.spec.database, collection = %self.spec.collection, user = %principal.username)
    )]
    pub async fn ensure_schema<S>(
        &self,
        store: &S,
        principal: &Principal,
    ) -> Result<ProvisionReport, ProvisioningError>
    where
        S: DocumentStore + ?Sized,
    {
        self.spec.validate()?;
        let database = self.spec.database();
        let collection = self.spec.collection();

        let databases = store
            .list_databases()
            .await
            .map_err(|e| ProvisioningError::ListDatabases(e.to_string()))?;
        let database_outcome = if databases.iter().any(|d| d == database) {
            StepOutcome::AlreadyPresent
        } else {
            absorb_existing(store.create_database(database).await).map_err(|e| {
                ProvisioningError::CreateDatabase {
                    name: database.to_string(),
                    reason: e.to_string(),
                }
            })?
        };
        tracing::debug!(outcome = ?database_outcome, "database");

        let principal_outcome = absorb_existing(store.create_principal(database, principal).await)
            .map_err(|e| ProvisioningError::CreatePrincipal {
                name: principal.username.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(outcome = ?principal_outcome, "principal");

        let collections = store.list_collections(database).await.map_err(|e| {
            ProvisioningError::ListCollections {
                database: database.to_string(),
                reason: e.to_string(),
            }
        })?;
        let collection_outcome = if collections.iter().any(|c| c == collection) {
            StepOutcome::AlreadyPresent
        } else {
            absorb_existing(store.create_collection(database, collection).await).map_err(|e| {
                ProvisioningError::CreateCollection {
                    name: collection.to_string(),
                    reason: e.to_string(),
                }
            })?
        };
        tracing::debug!(outcome = ?collection_outcome, "collection");

        absorb_existing(
            store
                .grant_read_write(database, collection, principal)
                .await,
        )
        .map_err(|e| ProvisioningError::Grant {
            collection: collection.to_string(),
            principal: principal.username.clone(),
            reason: e.to_string(),
        })?;

        let report = ProvisionReport {
            database: database_outcome,
            principal: principal_outcome,
            collection: collection_outcome,
        };
        tracing::info!(noop = report.was_noop(), "destination store provisioned");
        Ok(report)
    }
}
