//! Income, time and case reports

use chrono::NaiveDate;
use serde_json::Value;

use super::types::IncomeReport;
use super::Backend;
use crate::error::{Error, Result};
use crate::gateway::ApiRequest;
use crate::sourced::Sourced;

/// Inclusive reporting period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::config(format!(
                "report range ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    fn to_query(self) -> [(&'static str, String); 2] {
        [
            ("start_date", self.start.format("%Y-%m-%d").to_string()),
            ("end_date", self.end.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Client for `/reports`. Demo reports ignore the date range.
#[derive(Clone)]
pub struct Reports {
    backend: Backend,
}

impl Reports {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn income(&self, range: DateRange) -> Result<Sourced<IncomeReport>> {
        let request = ApiRequest::get("/reports/income").query(range.to_query());
        self.backend
            .fetch(request, |demo| Ok(demo.income_report()))
            .await
    }

    pub async fn time(&self, range: DateRange) -> Result<Sourced<Value>> {
        let request = ApiRequest::get("/reports/time").query(range.to_query());
        self.backend
            .fetch(request, |demo| Ok(demo.time_report()))
            .await
    }

    pub async fn cases(&self, range: DateRange) -> Result<Sourced<Value>> {
        let request = ApiRequest::get("/reports/cases").query(range.to_query());
        self.backend
            .fetch(request, |demo| Ok(demo.cases_report()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_query() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap();
        assert_eq!(
            range.to_query(),
            [
                ("start_date", "2024-01-01".to_string()),
                ("end_date", "2024-03-31".to_string())
            ]
        );
    }

    #[test]
    fn test_range_rejects_reversed_dates() {
        let result = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(result.is_err());
    }
}
