//! Filter engine.
//!
//! A filter is a conjunction of three optional predicates. Each one is
//! "keep all" when absent:
//!
//! - date range: inclusive, applied only when both bounds are given;
//! - categories: empty set keeps every category;
//! - vehicle ids: empty set keeps every vehicle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{FuelCategory, Record};

/// Filter parameters as supplied by the CLI or the HTTP API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub categories: BTreeSet<FuelCategory>,
    #[serde(default)]
    pub vehicle_ids: BTreeSet<String>,
}

impl FilterParams {
    pub fn with_date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    pub fn with_categories<I: IntoIterator<Item = FuelCategory>>(mut self, categories: I) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_vehicles<I, S>(mut self, vehicles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vehicle_ids = vehicles.into_iter().map(Into::into).collect();
        self
    }

    /// Effective date range. A half-open range disables date filtering.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }

    /// True when exactly one date bound was supplied (and is being ignored).
    pub fn has_half_open_range(&self) -> bool {
        self.date_from.is_some() != self.date_to.is_some()
    }

    /// True when no predicate restricts anything.
    pub fn is_empty(&self) -> bool {
        self.date_range().is_none() && self.categories.is_empty() && self.vehicle_ids.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        in_date_range(record, self.date_range())
            && in_categories(record, &self.categories)
            && in_vehicles(record, &self.vehicle_ids)
    }
}

/// Apply every predicate of `params`. Returns a new vector.
pub fn filter(records: &[Record], params: &FilterParams) -> Vec<Record> {
    records.iter().filter(|r| params.matches(r)).cloned().collect()
}

pub fn filter_by_date_range(records: &[Record], range: Option<(NaiveDate, NaiveDate)>) -> Vec<Record> {
    records.iter().filter(|r| in_date_range(r, range)).cloned().collect()
}

pub fn filter_by_categories(records: &[Record], categories: &BTreeSet<FuelCategory>) -> Vec<Record> {
    records.iter().filter(|r| in_categories(r, categories)).cloned().collect()
}

pub fn filter_by_vehicles(records: &[Record], vehicle_ids: &BTreeSet<String>) -> Vec<Record> {
    records.iter().filter(|r| in_vehicles(r, vehicle_ids)).cloned().collect()
}

fn in_date_range(record: &Record, range: Option<(NaiveDate, NaiveDate)>) -> bool {
    match range {
        Some((from, to)) => from <= record.date && record.date <= to,
        None => true,
    }
}

fn in_categories(record: &Record, categories: &BTreeSet<FuelCategory>) -> bool {
    categories.is_empty() || categories.contains(&record.fuel_category)
}

fn in_vehicles(record: &Record, vehicle_ids: &BTreeSet<String>) -> bool {
    vehicle_ids.is_empty() || vehicle_ids.contains(&record.vehicle_id)
}
