//! Semantic fields a training card needs from the dataset.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A semantic field, independent of how a given dataset version labels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Identifier,
    AdmissionDate,
    Name,
    Role,
    Department,
    Unit,
    Training,
    Track,
    DueDate,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Identifier,
        Field::AdmissionDate,
        Field::Name,
        Field::Role,
        Field::Department,
        Field::Unit,
        Field::Training,
        Field::Track,
        Field::DueDate,
    ];

    /// Fields without which no lookup can run.
    pub const MANDATORY: [Field; 3] = [Field::Identifier, Field::AdmissionDate, Field::Name];

    pub fn is_mandatory(self) -> bool {
        Self::MANDATORY.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Identifier => "IDENTIFIER",
            Field::AdmissionDate => "ADMISSION_DATE",
            Field::Name => "NAME",
            Field::Role => "ROLE",
            Field::Department => "DEPARTMENT",
            Field::Unit => "UNIT",
            Field::Training => "TRAINING",
            Field::Track => "TRACK",
            Field::DueDate => "DUE_DATE",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandatory_fields() {
        let mandatory: Vec<Field> = Field::ALL.iter().copied().filter(|f| f.is_mandatory()).collect();
        assert_eq!(mandatory, vec![Field::Identifier, Field::AdmissionDate, Field::Name]);
    }

    #[test]
    fn test_serde_names_are_snake_case() {
        let json = serde_json::to_string(&Field::AdmissionDate).unwrap();
        assert_eq!(json, "\"admission_date\"");
        let field: Field = serde_json::from_str("\"due_date\"").unwrap();
        assert_eq!(field, Field::DueDate);
    }
}
