// SPDX-License-Identifier: PMPL-1.0-or-later
//! History Recorder.
//!
//! Writes one audit record per mutation attempt. A failed write is logged and
//! dropped: it never fails, retries or rolls back the mutation it describes.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use rolegate_model::{AuditRecord, HistoryFilter};
use rolegate_store::HistoryRepository;

use crate::error::AuthzError;

/// Upper bound on `page_size` unless configured otherwise.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// One page of history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub records: Vec<AuditRecord>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Clone)]
pub struct HistoryRecorder {
    repo: Arc<dyn HistoryRepository>,
    max_page_size: u32,
}

impl HistoryRecorder {
    pub fn new(repo: Arc<dyn HistoryRepository>) -> Self {
        Self {
            repo,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub async fn record(&self, record: AuditRecord) {
        let operation = record.operation.clone();
        match self.repo.create_history(record).await {
            Ok(()) => debug!(operation = %operation, "Audit record written"),
            Err(e) => warn!(operation = %operation, error = %e, "Audit record dropped"),
        }
    }

    /// Page through history. Page numbers below 1 are rejected; page sizes
    /// are clamped to `1..=max_page_size`.
    pub async fn find_history(&self, mut filter: HistoryFilter) -> Result<HistoryPage, AuthzError> {
        if filter.page == 0 {
            return Err(AuthzError::validation("page must be at least 1"));
        }
        filter.page_size = filter.page_size.clamp(1, self.max_page_size);

        let (records, total) = self.repo.find_history(&filter).await?;
        Ok(HistoryPage {
            records,
            total,
            page: filter.page,
            page_size: filter.page_size,
        })
    }
}
