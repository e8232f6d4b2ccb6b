use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

pub const PAID: &str = "TRUE";
pub const UNPAID: &str = "FALSE";
pub const PRESENT: &str = "P";

/// Paid state of a payment cell. Only a trimmed, case-insensitive `TRUE` counts.
pub fn decode_paid(cell: &str) -> bool {
    cell.trim().eq_ignore_ascii_case(PAID)
}

pub fn encode_paid(paid: bool) -> &'static str {
    if paid { PAID } else { UNPAID }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub fn decode(cell: &str) -> Self {
        if cell.trim().eq_ignore_ascii_case(PRESENT) {
            Presence::Present
        } else {
            Presence::Absent
        }
    }

    pub fn from_flag(present: bool) -> Self {
        if present {
            Presence::Present
        } else {
            Presence::Absent
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Presence::Present => PRESENT,
            Presence::Absent => "",
        }
    }

    pub fn is_present(self) -> bool {
        self == Presence::Present
    }
}

// Keeps the existing UI contract: history entries are the raw "P"/"" codes.
impl Serialize for Presence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRecord {
    pub id: String,
    pub name: String,
    pub position: String,
    /// Keyed by month label. Header order lives in [`PaymentSheet::months`].
    pub payments: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSheet {
    pub months: Vec<String>,
    pub players: Vec<PaymentRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub history: Vec<Presence>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub dates: Vec<String>,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerDetail {
    pub name: String,
    pub total: usize,
    /// Attended dates, reverse lexical order.
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub date: String,
    pub column_created: bool,
    pub rows_written: usize,
}
