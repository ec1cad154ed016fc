//! Column Resolver - maps semantic fields onto the labels a dataset actually uses
//!
//! Producers rename columns between exports ("RE" in one version,
//! "COD_FUNCIONARIO" in the next). Each field therefore carries an ordered
//! list of acceptable labels, and resolution picks the first one that the
//! dataset contains. Resolution is exact and deterministic: first match
//! wins, never best match.
//!
//! Deployments that pin their schema use the fixed mode instead, where each
//! field has exactly one label and every configured field is required.

use crate::error::{CardError, MissingField, Result};
use crate::fields::Field;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Minimum Jaro-Winkler similarity for a column to be suggested in errors.
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Prioritised labels per field; earlier entries win.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AliasTable {
    aliases: BTreeMap<Field, Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels seen across the known exports of the training-records sheet.
    pub fn standard() -> Self {
        Self::new()
            .with_aliases(
                Field::Identifier,
                &["COD_FUNCIONARIO", "RE", "Cod", "cod_funcionario", "cod"],
            )
            .with_aliases(
                Field::AdmissionDate,
                &["DATA_ADMISSAO", "Admissao", "admissao", "DataAdmissao", "DATA_ADM"],
            )
            .with_aliases(Field::Name, &["NOME", "Nome", "nome"])
            .with_aliases(Field::Role, &["CARGO", "Cargo", "cargo"])
            .with_aliases(
                Field::Department,
                &["DEPARTAMENTO", "Departamento", "departamento", "SETOR", "Setor"],
            )
            .with_aliases(Field::Unit, &["UNIDADE", "Unidade", "unidade"])
            .with_aliases(
                Field::Training,
                &["TREINAMENTO_&_DATA", "TREINAMENTO", "DESCRICAO", "CURSO", "Treinamento"],
            )
            .with_aliases(Field::Track, &["TRILHA", "Trilha", "trilha"])
            .with_aliases(
                Field::DueDate,
                &["DATA_VENCIMENTO", "VENCIMENTO", "DataVencimento", "Data Vencimento"],
            )
    }

    /// Replace the alias list of `field`.
    pub fn with_aliases(mut self, field: Field, aliases: &[&str]) -> Self {
        self.set_aliases(field, aliases.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn set_aliases(&mut self, field: Field, aliases: Vec<String>) {
        if aliases.is_empty() {
            self.aliases.remove(&field);
        } else {
            self.aliases.insert(field, aliases);
        }
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.aliases.keys().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Try each field's aliases in order; only IDENTIFIER, ADMISSION_DATE and NAME are required.
    #[default]
    Aliased,
    /// One label per field; every configured field is required.
    Fixed,
}

/// Resolved association between fields and dataset column labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FieldMapping {
    columns: BTreeMap<Field, String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, label: impl Into<String>) -> Self {
        self.columns.insert(field, label.into());
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Label for a field the caller cannot proceed without.
    pub fn require(&self, field: Field) -> Result<&str> {
        self.get(field).ok_or_else(|| {
            CardError::Config(format!("Field {} is not mapped to any column", field))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.columns.iter().map(|(f, c)| (*f, c.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct ColumnResolver {
    table: AliasTable,
    mode: ResolutionMode,
}

impl ColumnResolver {
    pub fn aliased(table: AliasTable) -> Self {
        Self { table, mode: ResolutionMode::Aliased }
    }

    /// Resolver for a static field -> label table.
    pub fn fixed(columns: BTreeMap<Field, String>) -> Self {
        let mut table = AliasTable::new();
        for (field, label) in columns {
            table.set_aliases(field, vec![label]);
        }
        Self { table, mode: ResolutionMode::Fixed }
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn table(&self) -> &AliasTable {
        &self.table
    }

    /// Fields whose absence aborts the session.
    pub fn required_fields(&self) -> Vec<Field> {
        match self.mode {
            ResolutionMode::Aliased => Field::MANDATORY.to_vec(),
            ResolutionMode::Fixed => {
                let mut fields: Vec<Field> = self.table.fields().collect();
                for field in Field::MANDATORY {
                    if !fields.contains(&field) {
                        fields.push(field);
                    }
                }
                fields.sort();
                fields
            }
        }
    }

    /// Map every field to the first of its aliases present in `columns`.
    ///
    /// Never fails; fields with no matching alias are simply left unmapped.
    pub fn resolve<S: AsRef<str>>(&self, columns: &[S]) -> FieldMapping {
        let available: HashSet<&str> = columns.iter().map(|c| c.as_ref()).collect();
        let mut mapping = FieldMapping::new();

        for field in Field::ALL {
            if let Some(label) = self
                .table
                .aliases(field)
                .iter()
                .find(|alias| available.contains(alias.as_str()))
            {
                mapping.columns.insert(field, label.clone());
            }
        }

        mapping
    }

    /// Resolve and fail fast when a required field is left unmapped.
    pub fn resolve_required<S: AsRef<str>>(&self, columns: &[S]) -> Result<FieldMapping> {
        let mapping = self.resolve(columns);

        let missing: Vec<MissingField> = self
            .required_fields()
            .into_iter()
            .filter(|field| !mapping.is_mapped(*field))
            .map(|field| {
                let searched = self.table.aliases(field).to_vec();
                let suggestion = closest_column(&searched, columns);
                MissingField { field, searched, suggestion }
            })
            .collect();

        if missing.is_empty() {
            Ok(mapping)
        } else {
            Err(CardError::MissingColumns(missing))
        }
    }
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self::aliased(AliasTable::standard())
    }
}

/// Dataset column most similar to any of the searched aliases, ignoring case.
fn closest_column<S: AsRef<str>>(searched: &[String], columns: &[S]) -> Option<String> {
    let mut best: Option<(f64, &str)> = None;

    for column in columns {
        let column = column.as_ref();
        let folded = column.to_lowercase();
        for alias in searched {
            let score = strsim::jaro_winkler(&folded, &alias.to_lowercase());
            if score >= SUGGESTION_THRESHOLD && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, column));
            }
        }
    }

    best.map(|(_, column)| column.to_string())
}
