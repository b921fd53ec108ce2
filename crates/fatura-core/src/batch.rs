//! Batch orchestration over the single-document pipeline.
//!
//! Runs many documents with a bounded number in flight against the
//! extraction service, retry with exponential backoff per item, and a
//! progress callback fired at every state transition. Per-document
//! failures never abort the batch; each is isolated in its own result
//! entry, and the returned vector always matches input order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use fatura_vision::CompletionBackend;

use crate::error::{InputError, Result};
use crate::input::DocumentFile;
use crate::models::config::FaturaConfig;
use crate::models::invoice::{ItemStatus, QueueItem};
use crate::pipeline::ingest;
use crate::store::{DuplicateQuery, RecordStore};

/// Fired at every item state transition. Must not block: the pipeline
/// invokes it inline and moves on, possibly from several items at once.
pub type ProgressCallback = Arc<dyn Fn(usize, &QueueItem) + Send + Sync>;

/// A callback for callers that do not track progress.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_, _| {})
}

/// Process a batch of documents and return one terminal item per input, in
/// input order.
pub async fn process_batch(
    files: Vec<DocumentFile>,
    backend: Arc<dyn CompletionBackend>,
    store: Option<Arc<dyn RecordStore>>,
    config: Arc<FaturaConfig>,
    on_progress: ProgressCallback,
    cancel: CancellationToken,
) -> Result<Vec<QueueItem>> {
    if files.len() > config.batch.max_items {
        return Err(InputError::TooManyItems {
            count: files.len(),
            limit: config.batch.max_items,
        }
        .into());
    }

    let file_names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();

    // Every item is announced as pending at enqueue time.
    for (id, file) in files.iter().enumerate() {
        on_progress(id, &QueueItem::pending(id, &file.name));
    }

    let semaphore = Arc::new(Semaphore::new(config.batch.max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (id, file) in files.into_iter().enumerate() {
        let backend = Arc::clone(&backend);
        let store = store.clone();
        let config = Arc::clone(&config);
        let on_progress = Arc::clone(&on_progress);
        let cancel = cancel.clone();
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let mut item = QueueItem::pending(id, &file.name);
                    finish_error(&mut item, "pool de trabalho encerrado", &on_progress);
                    return (id, item);
                }
            };

            let item = process_item(
                id,
                file,
                backend.as_ref(),
                store.as_deref(),
                &config,
                &on_progress,
                &cancel,
            )
            .await;

            // Pacing before the permit frees the next start, to stay under
            // the service's implicit rate limit.
            if config.batch.pacing_delay_ms > 0 && !cancel.is_cancelled() {
                tokio::time::sleep(Duration::from_millis(config.batch.pacing_delay_ms)).await;
            }
            drop(permit);

            (id, item)
        });
    }

    let mut results: Vec<Option<QueueItem>> = file_names.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, item)) => results[id] = Some(item),
            Err(e) => error!(error = %e, "batch worker task failed"),
        }
    }

    Ok(results
        .into_iter()
        .enumerate()
        .map(|(id, slot)| {
            slot.unwrap_or_else(|| {
                let mut item = QueueItem::pending(id, &file_names[id]);
                item.status = ItemStatus::Error;
                item.error = Some("Falha interna no processamento".to_string());
                item
            })
        })
        .collect())
}

/// Run one item to a terminal state, retrying transient failures.
async fn process_item(
    id: usize,
    file: DocumentFile,
    backend: &dyn CompletionBackend,
    store: Option<&dyn RecordStore>,
    config: &FaturaConfig,
    on_progress: &ProgressCallback,
    cancel: &CancellationToken,
) -> QueueItem {
    let mut item = QueueItem::pending(id, &file.name);

    if cancel.is_cancelled() {
        finish_error(&mut item, "Processamento cancelado", on_progress);
        return item;
    }

    item.status = ItemStatus::Processing;
    item.progress = 20;
    on_progress(id, &item);

    let mut attempt: u32 = 0;
    let outcome = loop {
        match ingest(&file, backend, config).await {
            Ok(outcome) => break outcome,
            Err(e) => {
                if !e.is_retryable() || attempt >= config.batch.max_retries {
                    warn!(file = %file.name, error = %e, attempt, "item failed terminally");
                    finish_error(&mut item, &e.to_string(), on_progress);
                    return item;
                }

                attempt += 1;
                let delay = config
                    .batch
                    .base_delay_ms
                    .saturating_mul(1u64 << (attempt - 1));
                debug!(file = %file.name, attempt, delay_ms = delay, "retrying after error");

                tokio::select! {
                    _ = cancel.cancelled() => {
                        finish_error(&mut item, "Processamento cancelado", on_progress);
                        return item;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                }
            }
        }
    };

    item.progress = 80;
    item.invoice = Some(outcome.invoice.clone());
    item.checks = Some(outcome.checks);
    item.corrections = outcome.corrections;
    item.warnings = outcome.warnings;
    on_progress(id, &item);

    // Confidence gate: a low-trust record is reported, not committed. The
    // human in the loop decides.
    if let Some(store) = store {
        if outcome.invoice.confidence < config.batch.confidence_gate {
            item.warnings.push(format!(
                "Confiança {} abaixo do limiar {}; registo não gravado automaticamente",
                outcome.invoice.confidence, config.batch.confidence_gate
            ));
        } else {
            commit(&outcome.invoice, store, &mut item).await;
        }
    }

    item.status = ItemStatus::Completed;
    item.progress = 100;
    on_progress(id, &item);
    item
}

/// Persist a record unless a duplicate already exists.
async fn commit(
    invoice: &crate::models::invoice::ExtractedInvoice,
    store: &dyn RecordStore,
    item: &mut QueueItem,
) {
    match store.find_duplicate(&DuplicateQuery::for_invoice(invoice)).await {
        Ok(Some(existing)) => {
            item.warnings.push(format!(
                "Documento duplicado do registo {existing}; não gravado novamente"
            ));
            item.record_id = Some(existing);
        }
        Ok(None) => match store.save(invoice).await {
            Ok(record_id) => item.record_id = Some(record_id),
            Err(e) => item
                .warnings
                .push(format!("Falha ao gravar o registo: {e}")),
        },
        Err(e) => item
            .warnings
            .push(format!("Falha na verificação de duplicados: {e}")),
    }
}

fn finish_error(item: &mut QueueItem, message: &str, on_progress: &ProgressCallback) {
    item.status = ItemStatus::Error;
    item.error = Some(message.to_string());
    item.progress = 100;
    on_progress(item.id, item);
}
