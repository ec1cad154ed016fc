//! Lookup session
//!
//! A [`Session`] owns the dataset snapshot and the field mapping for the
//! lifetime of the process. Both are built once, before the first query;
//! a missing mandatory column stops the session right there.

use crate::column_resolver::{ColumnResolver, FieldMapping};
use crate::config::CardConfig;
use crate::dataset::{Dataset, Record};
use crate::error::Result;
use crate::fields::Field;
use crate::record_filter::{MatchSet, Query, RecordFilter, TrackAllowList, ADMISSION_INPUT_FORMAT};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// A training listed on the card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingEntry {
    pub training: String,
    /// `DD/MM/YYYY`, or the raw cell when it is not a date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardBody {
    /// One entry per matching row
    Trainings {
        has_due_dates: bool,
        entries: Vec<TrainingEntry>,
    },
    /// Every column of every matching row, when no training column is known
    Records {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingCard {
    pub identifier: String,
    pub admission_date: NaiveDate,
    pub name: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub unit: Option<String>,
    pub body: CardBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found(TrainingCard),
    NotFound {
        identifier: String,
        admission_date: NaiveDate,
    },
}

pub struct Session {
    dataset: Dataset,
    mapping: FieldMapping,
    filter: RecordFilter,
}

impl Session {
    /// Load the configured dataset and resolve its columns.
    pub fn open(config: &CardConfig) -> Result<Self> {
        let path = config.dataset_path()?;
        let dataset = Dataset::load(&path, &config.load_options())?;
        Self::from_dataset(dataset, &config.resolver(), config.allow_list())
    }

    pub fn from_dataset(
        dataset: Dataset,
        resolver: &ColumnResolver,
        allow_list: Option<TrackAllowList>,
    ) -> Result<Self> {
        let mapping = resolver.resolve_required(dataset.columns())?;
        for (field, column) in mapping.iter() {
            info!("Resolved {} -> '{}'", field, column);
        }
        if allow_list.is_some() && !mapping.is_mapped(Field::Track) {
            warn!("Track allow-list configured but no track column found; track filter disabled");
        }

        // Bound once: a mapping that does not fit the dataset fails here, not on the first query.
        let filter = RecordFilter::new(&dataset, &mapping, allow_list.as_ref())?;

        Ok(Self { dataset, mapping, filter })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// The allow-list in effect; `None` when the track predicate is off.
    pub fn allow_list(&self) -> Option<&TrackAllowList> {
        self.filter.allow_list()
    }

    /// Rows matching an already validated query.
    pub fn query(&self, query: &Query) -> MatchSet<'_> {
        self.filter.apply(&self.dataset, query)
    }

    /// Validate raw input, run the query and assemble the card.
    pub fn lookup(&self, identifier: &str, admission: &str) -> Result<LookupOutcome> {
        let query_id = Uuid::new_v4();
        let span = info_span!("lookup", %query_id);
        let _guard = span.enter();

        let query = Query::parse(identifier, admission)?;
        let matches = self.query(&query);
        info!(matched = matches.len(), "Lookup finished");

        if matches.is_empty() {
            return Ok(LookupOutcome::NotFound {
                identifier: query.identifier().to_string(),
                admission_date: query.admission_date(),
            });
        }

        Ok(LookupOutcome::Found(self.build_card(&query, &matches)))
    }

    fn text(&self, record: &Record, field: Field) -> Option<String> {
        let column = self.mapping.get(field)?;
        let index = self.dataset.column_index(column)?;
        record.get(index).map(|v| v.display())
    }

    fn build_card(&self, query: &Query, matches: &MatchSet<'_>) -> TrainingCard {
        let first = matches.first();
        let describe = |field: Field| first.and_then(|r| self.text(r, field));

        let body = if self.mapping.is_mapped(Field::Training) {
            let has_due_dates = self.mapping.is_mapped(Field::DueDate);
            let entries = matches
                .records()
                .map(|record| TrainingEntry {
                    training: self.text(record, Field::Training).unwrap_or_default(),
                    due_date: if has_due_dates { self.due_date(record) } else { None },
                })
                .collect();
            CardBody::Trainings { has_due_dates, entries }
        } else {
            CardBody::Records {
                columns: self.dataset.columns().to_vec(),
                rows: matches
                    .records()
                    .map(|record| record.cells().iter().map(|v| v.display()).collect())
                    .collect(),
            }
        };

        TrainingCard {
            identifier: query.identifier().to_string(),
            admission_date: query.admission_date(),
            name: describe(Field::Name).unwrap_or_default(),
            role: describe(Field::Role),
            department: describe(Field::Department),
            unit: describe(Field::Unit),
            body,
        }
    }

    fn due_date(&self, record: &Record) -> Option<String> {
        let column = self.mapping.get(Field::DueDate)?;
        let value = record.get(self.dataset.column_index(column)?)?;
        if value.is_null() {
            return None;
        }
        Some(
            value
                .to_date()
                .map(|d| d.format(ADMISSION_INPUT_FORMAT).to_string())
                .unwrap_or_else(|| value.display()),
        )
    }
}
