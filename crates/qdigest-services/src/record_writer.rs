//! Sample record persistence

use qdigest_core::{DocumentStore, SampleRecord, WriteError};

use crate::error::{ServiceError, ServiceResult};

/// Inserts sample records into one collection
///
/// Each write is a single insert. A failed write is not retried or buffered.
#[derive(Debug, Clone)]
pub struct RecordWriter {
    database: String,
    collection: String,
}

impl RecordWriter {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[tracing::instrument(skip(self, store, record), fields(collection = %self.collection, timestamp = record.timestamp))]
    pub async fn write<S>(&self, store: &S, record: &SampleRecord) -> Result<(), WriteError>
    where
        S: DocumentStore + ?Sized,
    {
        let doc = record
            .to_document()
            .map_err(|e| WriteError::Encode(e.to_string()))?;
        store
            .insert_document(&self.database, &self.collection, doc)
            .await
            .map_err(|e| WriteError::Insert(e.to_string()))?;
        tracing::debug!(plan_rows = record.plan.len(), "sample written");
        Ok(())
    }

    /// Every stored sample of the collection, in insertion order
    pub async fn read_back<S>(&self, store: &S) -> ServiceResult<Vec<SampleRecord>>
    where
        S: DocumentStore + ?Sized,
    {
        store
            .find_documents(&self.database, &self.collection)
            .await
            .map_err(|e| ServiceError::ReadBack(e.to_string()))?
            .into_iter()
            .map(|doc| SampleRecord::from_document(doc).map_err(|e| ServiceError::Decode(e.to_string())))
            .collect()
    }
}
