// ABOUTME: Kanban board types and their fixed column tables
// ABOUTME: Static lookup of legal columns, draft stages and evidence gates

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KanbanType {
    Order,
    Receive,
}

/// Workflow stage a product occupies.
///
/// JSON uses the board labels ("New Request"), SQL stores snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum Column {
    #[serde(rename = "New Request", alias = "new_request")]
    NewRequest,
    #[serde(rename = "In Review", alias = "in_review")]
    InReview,
    #[serde(rename = "Purchased", alias = "purchased")]
    Purchased,
    #[serde(rename = "Received", alias = "received")]
    Received,
    #[serde(rename = "Stored", alias = "stored")]
    Stored,
}

const ORDER_COLUMNS: &[Column] = &[Column::NewRequest, Column::InReview, Column::Purchased];
const RECEIVE_COLUMNS: &[Column] = &[Column::Purchased, Column::Received, Column::Stored];

impl KanbanType {
    /// Ordered columns of this board type
    pub fn columns(self) -> &'static [Column] {
        match self {
            KanbanType::Order => ORDER_COLUMNS,
            KanbanType::Receive => RECEIVE_COLUMNS,
        }
    }

    pub fn allows(self, column: Column) -> bool {
        self.columns().contains(&column)
    }

    /// Column new products land in when none is given
    pub fn initial_column(self) -> Column {
        self.columns()[0]
    }

    /// Draft flag a product carries in `column` of this board type
    pub fn is_draft_column(self, column: Column) -> bool {
        self == KanbanType::Order && column.is_pre_purchase()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KanbanType::Order => "order",
            KanbanType::Receive => "receive",
        }
    }
}

impl fmt::Display for KanbanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Column {
    pub fn label(self) -> &'static str {
        match self {
            Column::NewRequest => "New Request",
            Column::InReview => "In Review",
            Column::Purchased => "Purchased",
            Column::Received => "Received",
            Column::Stored => "Stored",
        }
    }

    /// Stored form, as written by the sqlx encoding
    pub fn as_str(self) -> &'static str {
        match self {
            Column::NewRequest => "new_request",
            Column::InReview => "in_review",
            Column::Purchased => "purchased",
            Column::Received => "received",
            Column::Stored => "stored",
        }
    }

    /// Order-board stages before anything is bought
    pub fn is_pre_purchase(self) -> bool {
        matches!(self, Column::NewRequest | Column::InReview)
    }

    /// Entering this column on a receive board needs photo/proof evidence
    pub fn requires_evidence(self) -> bool {
        matches!(self, Column::Received)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Column {
    type Err = String;

    /// Accepts labels ("In Review"), snake_case and kebab-case, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "newrequest" => Ok(Column::NewRequest),
            "inreview" => Ok(Column::InReview),
            "purchased" => Ok(Column::Purchased),
            "received" => Ok(Column::Received),
            "stored" => Ok(Column::Stored),
            _ => Err(format!("Unknown column: {}", s)),
        }
    }
}
