//! Persistence seam for extracted records.
//!
//! The pipeline only needs two operations: commit a record and look for an
//! existing duplicate. Everything else about storage lives behind this
//! trait, outside this crate.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::models::invoice::ExtractedInvoice;

/// Key fields used for duplicate detection.
#[derive(Debug, Clone)]
pub struct DuplicateQuery {
    pub supplier_id: Option<String>,
    pub document_number: Option<String>,
    pub document_date: NaiveDate,
    pub atcud: Option<String>,
}

impl DuplicateQuery {
    pub fn for_invoice(invoice: &ExtractedInvoice) -> Self {
        Self {
            supplier_id: invoice.supplier_id().map(|s| s.to_string()),
            document_number: invoice.document_number.clone(),
            document_date: invoice.document_date,
            atcud: invoice.atcud.clone(),
        }
    }
}

/// Opaque record storage consumed by the batch orchestrator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record and return its identifier.
    async fn save(&self, invoice: &ExtractedInvoice) -> Result<String, StoreError>;

    /// Find an already-persisted duplicate, if any.
    ///
    /// Precedence: an exact ATCUD match first, then the tuple (supplier id,
    /// document number, document date). Equal monetary totals alone are
    /// never a duplicate signal; recurring fixed-amount documents are
    /// legitimate distinct records.
    async fn find_duplicate(&self, query: &DuplicateQuery) -> Result<Option<String>, StoreError>;
}

struct StoredRecord {
    id: String,
    invoice: ExtractedInvoice,
}

/// In-memory reference store, used by tests and the CLI.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, invoice: &ExtractedInvoice) -> Result<String, StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let id = format!("rec-{:06}", records.len() + 1);
        records.push(StoredRecord {
            id: id.clone(),
            invoice: invoice.clone(),
        });
        Ok(id)
    }

    async fn find_duplicate(&self, query: &DuplicateQuery) -> Result<Option<String>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if let Some(atcud) = &query.atcud {
            if let Some(record) = records
                .iter()
                .find(|r| r.invoice.atcud.as_ref() == Some(atcud))
            {
                return Ok(Some(record.id.clone()));
            }
        }

        if let (Some(supplier), Some(number)) = (&query.supplier_id, &query.document_number) {
            if let Some(record) = records.iter().find(|r| {
                r.invoice.supplier_id() == Some(supplier.as_str())
                    && r.invoice.document_number.as_ref() == Some(number)
                    && r.invoice.document_date == query.document_date
            }) {
                return Ok(Some(record.id.clone()));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn invoice(number: &str, atcud: Option<&str>) -> ExtractedInvoice {
        ExtractedInvoice {
            supplier_nif: Some("123456789".to_string()),
            document_number: Some(number.to_string()),
            document_date: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
            atcud: atcud.map(|s| s.to_string()),
            total_amount: Decimal::new(12300, 2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.save(&invoice("FT 1", None)).await.unwrap();
        let b = store.save(&invoice("FT 2", None)).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_by_atcud_takes_precedence() {
        let store = MemoryStore::new();
        let id = store
            .save(&invoice("FT 1", Some("ATCUD-XYZ-1")))
            .await
            .unwrap();

        // Same ATCUD, different document number: still a duplicate.
        let query = DuplicateQuery::for_invoice(&invoice("FT 99", Some("ATCUD-XYZ-1")));
        assert_eq!(store.find_duplicate(&query).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_duplicate_by_tuple() {
        let store = MemoryStore::new();
        let id = store.save(&invoice("FT 1", None)).await.unwrap();

        let query = DuplicateQuery::for_invoice(&invoice("FT 1", None));
        assert_eq!(store.find_duplicate(&query).await.unwrap(), Some(id));

        let other = DuplicateQuery::for_invoice(&invoice("FT 2", None));
        assert_eq!(store.find_duplicate(&other).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_equal_totals_are_not_a_duplicate_signal() {
        // Monthly rent: same supplier, same amount, different number.
        let store = MemoryStore::new();
        store.save(&invoice("Renda 2025/01", None)).await.unwrap();

        let query = DuplicateQuery::for_invoice(&invoice("Renda 2025/02", None));
        assert_eq!(store.find_duplicate(&query).await.unwrap(), None);
    }
}
