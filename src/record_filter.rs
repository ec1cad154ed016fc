//! Record Filter - computes the rows matching a lookup
//!
//! A row matches when its identifier (compared as a string), its admission
//! date (compared as a calendar date) and, if both a track column and an
//! allow-list are configured, its track category all agree with the query.

use crate::column_resolver::FieldMapping;
use crate::dataset::{Dataset, Record};
use crate::error::{CardError, Result};
use crate::fields::Field;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Textual layout users type admission dates in.
pub const ADMISSION_INPUT_FORMAT: &str = "%d/%m/%Y";

/// Parse a user-typed admission date (`DD/MM/YYYY`).
pub fn parse_admission_input(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CardError::InvalidInput("Admission date is required".to_string()));
    }
    NaiveDate::parse_from_str(trimmed, ADMISSION_INPUT_FORMAT).map_err(|_| {
        CardError::InvalidInput(format!(
            "Invalid admission date '{}'. Use DD/MM/YYYY",
            trimmed
        ))
    })
}

/// One lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    identifier: String,
    admission_date: NaiveDate,
}

impl Query {
    pub fn new(identifier: impl Into<String>, admission_date: NaiveDate) -> Self {
        Self { identifier: identifier.into(), admission_date }
    }

    /// Validate raw user input. Rejected input never reaches the filter.
    pub fn parse(identifier: &str, admission: &str) -> Result<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(CardError::InvalidInput("RE is required".to_string()));
        }
        let admission_date = parse_admission_input(admission)?;
        Ok(Self::new(identifier, admission_date))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn admission_date(&self) -> NaiveDate {
        self.admission_date
    }
}

/// Track categories whose records may be shown; membership is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackAllowList(BTreeSet<String>);

impl TrackAllowList {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(categories.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, category: &str) -> bool {
        self.0.contains(category)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Rows of a dataset that satisfied a query, in dataset order.
#[derive(Debug, Clone)]
pub struct MatchSet<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> MatchSet<'a> {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.indices.iter().filter_map(|&i| self.dataset.row(i))
    }

    pub fn first(&self) -> Option<&'a Record> {
        self.indices.first().and_then(|&i| self.dataset.row(i))
    }
}

/// A field mapping bound to the column positions of one dataset.
///
/// Binding happens once; [`RecordFilter::apply`] must then be given the same
/// dataset (or one with the same column layout).
#[derive(Debug, Clone)]
pub struct RecordFilter {
    identifier_col: usize,
    admission_col: usize,
    track: Option<(usize, TrackAllowList)>,
}

impl RecordFilter {
    /// Bind `mapping` to `dataset`.
    ///
    /// The track predicate is active only when TRACK is mapped and an
    /// allow-list is given.
    pub fn new(
        dataset: &Dataset,
        mapping: &FieldMapping,
        allow_list: Option<&TrackAllowList>,
    ) -> Result<Self> {
        let identifier_col = bound_column(dataset, mapping, Field::Identifier)?;
        let admission_col = bound_column(dataset, mapping, Field::AdmissionDate)?;

        let track = match (mapping.is_mapped(Field::Track), allow_list) {
            (true, Some(list)) => Some((bound_column(dataset, mapping, Field::Track)?, list.clone())),
            _ => None,
        };

        Ok(Self { identifier_col, admission_col, track })
    }

    /// The allow-list in effect, if the track predicate is active.
    pub fn allow_list(&self) -> Option<&TrackAllowList> {
        self.track.as_ref().map(|(_, list)| list)
    }

    /// Whether `record` belongs to the match set of `query`.
    pub fn matches(&self, record: &Record, query: &Query) -> bool {
        self.evaluate(record, query) == Some(true)
    }

    /// `None` when the admission cell does not normalise to a date; such a
    /// row can never match. The date is normalised once per row.
    fn evaluate(&self, record: &Record, query: &Query) -> Option<bool> {
        let admission = record.get(self.admission_col).and_then(|v| v.to_date())?;
        if admission != query.admission_date() {
            return Some(false);
        }

        let identifier = record.get(self.identifier_col).and_then(|v| v.as_key());
        if identifier.as_deref() != Some(query.identifier()) {
            return Some(false);
        }

        Some(match &self.track {
            Some((col, allow_list)) => record
                .get(*col)
                .and_then(|v| v.as_key())
                .map_or(false, |category| allow_list.contains(&category)),
            None => true,
        })
    }

    /// Evaluate `query` against every row of `dataset`.
    pub fn apply<'a>(&self, dataset: &'a Dataset, query: &Query) -> MatchSet<'a> {
        let mut unparseable = 0usize;
        let mut indices = Vec::new();

        for (i, record) in dataset.rows().iter().enumerate() {
            match self.evaluate(record, query) {
                Some(true) => indices.push(i),
                Some(false) => {}
                None => unparseable += 1,
            }
        }

        if unparseable > 0 {
            debug!(unparseable, "Rows skipped because their admission date is not a date");
        }
        debug!(matched = indices.len(), scanned = dataset.len(), "Filter applied");

        MatchSet { dataset, indices }
    }
}

fn bound_column(dataset: &Dataset, mapping: &FieldMapping, field: Field) -> Result<usize> {
    let label = mapping.require(field)?;
    dataset.column_index(label).ok_or_else(|| {
        CardError::Config(format!(
            "Column '{}' mapped to {} is not present in the dataset",
            label, field
        ))
    })
}

/// One-shot form of [`RecordFilter::new`] followed by [`RecordFilter::apply`].
pub fn filter_records<'a>(
    dataset: &'a Dataset,
    mapping: &FieldMapping,
    query: &Query,
    allow_list: Option<&TrackAllowList>,
) -> Result<MatchSet<'a>> {
    Ok(RecordFilter::new(dataset, mapping, allow_list)?.apply(dataset, query))
}
