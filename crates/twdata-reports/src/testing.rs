//! In-memory report source for tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use twdata_core::{
    BuySellVolume, DataError, Record, Report, ReportKind, ReportRequest, ReportSource, Result,
    VolumeField,
};

/// Serves canned reports. Days without one report no data.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    reports: HashMap<NaiveDate, Report>,
    mismatched: HashSet<NaiveDate>,
    loads: Mutex<Vec<NaiveDate>>,
    evictions: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_total(
        mut self,
        day: NaiveDate,
        code: &str,
        field: VolumeField,
        total: i64,
    ) -> Self {
        let report = self
            .reports
            .entry(day)
            .or_insert_with(|| Report::new(ReportKind::TwseForeign, day));
        let mut record = report
            .get(code)
            .cloned()
            .unwrap_or_else(|| Record::new(code, code));
        record
            .volumes
            .insert(field, BuySellVolume::new(total.max(0), (-total).max(0), total));
        report.insert(record);
        self
    }

    /// A day whose report exists but holds no rows for any code.
    pub(crate) fn with_empty(mut self, day: NaiveDate) -> Self {
        self.reports
            .entry(day)
            .or_insert_with(|| Report::new(ReportKind::TwseForeign, day));
        self
    }

    pub(crate) fn with_mismatch(mut self, day: NaiveDate) -> Self {
        self.mismatched.insert(day);
        self
    }

    pub(crate) fn loads(&self) -> Vec<NaiveDate> {
        self.loads.lock().unwrap().clone()
    }

    pub(crate) fn evictions(&self) -> usize {
        self.evictions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn load(&self, request: &ReportRequest) -> Result<Report> {
        self.loads.lock().unwrap().push(request.day);
        if self.mismatched.contains(&request.day) {
            return Err(DataError::FormatMismatch {
                kind: request.kind,
                reason: "unexpected header".into(),
            });
        }
        match self.reports.get(&request.day) {
            Some(report) => {
                let mut report = report.clone();
                report.kind = request.kind;
                Ok(report)
            }
            None => Err(DataError::NoDataForDay {
                kind: request.kind,
                day: request.day,
            }),
        }
    }

    async fn evict(&self, _request: &ReportRequest) -> Result<bool> {
        self.evictions.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
