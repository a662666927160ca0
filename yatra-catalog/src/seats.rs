use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::availability::SeatAvailabilitySnapshot;

/// 2 + 2 seating: columns 1-2 left of the aisle, 3-4 right of it
pub const SEATS_PER_ROW: u32 = 4;
const MAX_ROWS: u32 = 26;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatError {
    #[error("Invalid seat identifier: {0}")]
    InvalidSeatId(String),
}

/// Seat key shared with the backend, e.g. "A1" or "J4"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId {
    row: u8,
    column: u8,
}

impl SeatId {
    pub fn new(row: u8, column: u8) -> Result<Self, SeatError> {
        if u32::from(row) >= MAX_ROWS || column == 0 || u32::from(column) > SEATS_PER_ROW {
            return Err(SeatError::InvalidSeatId(format!("row {} column {}", row, column)));
        }
        Ok(Self { row, column })
    }

    pub fn row_letter(&self) -> char {
        char::from(b'A' + self.row)
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    /// 1-based position in boarding order; a seat exists on a bus iff this is <= total seats
    pub fn position(&self) -> u32 {
        u32::from(self.row) * SEATS_PER_ROW + u32::from(self.column)
    }

    pub fn is_window(&self) -> bool {
        self.column == 1 || u32::from(self.column) == SEATS_PER_ROW
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.column)
    }
}

impl FromStr for SeatId {
    type Err = SeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars
            .next()
            .filter(char::is_ascii_alphabetic)
            .ok_or_else(|| SeatError::InvalidSeatId(s.to_string()))?
            .to_ascii_uppercase();
        // Canonical digits only: no sign, no leading zero
        let digits = chars.as_str();
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || digits.starts_with('0')
        {
            return Err(SeatError::InvalidSeatId(s.to_string()));
        }
        let column: u8 = digits
            .parse()
            .map_err(|_| SeatError::InvalidSeatId(s.to_string()))?;

        SeatId::new(letter as u8 - b'A', column).map_err(|_| SeatError::InvalidSeatId(s.to_string()))
    }
}

impl TryFrom<String> for SeatId {
    type Error = SeatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatId> for String {
    fn from(seat: SeatId) -> Self {
        seat.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatRow {
    pub label: char,
    pub left: Vec<SeatId>,
    pub right: Vec<SeatId>,
}

/// Deterministic seat plan derived from the bus capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatLayout {
    total_seats: u32,
    rows: Vec<SeatRow>,
}

impl SeatLayout {
    /// Rows A, B, ... of four seats each; the last row may be partial
    pub fn generate(total_seats: u32) -> Self {
        let total_seats = total_seats.min(MAX_ROWS * SEATS_PER_ROW);
        let row_count = total_seats.div_ceil(SEATS_PER_ROW);

        let rows = (0..row_count)
            .map(|row| {
                let seats_in = |columns: std::ops::RangeInclusive<u8>| -> Vec<SeatId> {
                    columns
                        .filter_map(|column| SeatId::new(row as u8, column).ok())
                        .filter(|seat| seat.position() <= total_seats)
                        .collect()
                };

                SeatRow {
                    label: char::from(b'A' + row as u8),
                    left: seats_in(1..=2),
                    right: seats_in(3..=4),
                }
            })
            .collect();

        Self { total_seats, rows }
    }

    pub fn total_seats(&self) -> u32 {
        self.total_seats
    }

    pub fn rows(&self) -> &[SeatRow] {
        &self.rows
    }

    pub fn contains(&self, seat: &SeatId) -> bool {
        seat.position() <= self.total_seats
    }

    pub fn seats(&self) -> impl Iterator<Item = SeatId> + '_ {
        self.rows
            .iter()
            .flat_map(|row| row.left.iter().chain(row.right.iter()).copied())
    }

    /// Seat statuses for rendering; booked wins over selected, selected over locked
    pub fn render(
        &self,
        snapshot: Option<&SeatAvailabilitySnapshot>,
        selected: &BTreeSet<SeatId>,
    ) -> SeatMap {
        let status_of = |seat: &SeatId| {
            if snapshot.is_some_and(|s| s.is_booked(seat)) {
                SeatStatus::Booked
            } else if selected.contains(seat) {
                SeatStatus::Selected
            } else if snapshot.is_some_and(|s| s.is_locked(seat)) {
                SeatStatus::Locked
            } else {
                SeatStatus::Available
            }
        };

        let rows = self
            .rows
            .iter()
            .map(|row| SeatMapRow {
                label: row.label,
                left: row.left.iter().map(|s| (*s, status_of(s))).collect(),
                right: row.right.iter().map(|s| (*s, status_of(s))).collect(),
            })
            .collect();

        SeatMap { rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Available,
    Selected,
    Booked,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatMapRow {
    pub label: char,
    pub left: Vec<(SeatId, SeatStatus)>,
    pub right: Vec<(SeatId, SeatStatus)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatMap {
    pub rows: Vec<SeatMapRow>,
}

impl SeatMap {
    pub fn status(&self, seat: &SeatId) -> Option<SeatStatus> {
        self.rows
            .iter()
            .flat_map(|row| row.left.iter().chain(row.right.iter()))
            .find(|(id, _)| id == seat)
            .map(|(_, status)| *status)
    }

    pub fn count(&self, status: SeatStatus) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.left.iter().chain(row.right.iter()))
            .filter(|(_, s)| *s == status)
            .count()
    }

    /// Seats a customer could still pick (available or already theirs)
    pub fn available_count(&self) -> usize {
        self.count(SeatStatus::Available) + self.count(SeatStatus::Selected)
    }

    /// One line per row, `[A1][A2]  [A3][A4]` with `xx` for booked and `**` for selected
    pub fn to_ascii(&self) -> String {
        let cell = |(seat, status): &(SeatId, SeatStatus)| match status {
            SeatStatus::Available => format!("[{:>2}]", seat.to_string()),
            SeatStatus::Selected => "[**]".to_string(),
            SeatStatus::Booked => "[xx]".to_string(),
            SeatStatus::Locked => "[--]".to_string(),
        };

        self.rows
            .iter()
            .map(|row| {
                let left: String = row.left.iter().map(cell).collect();
                let right: String = row.right.iter().map(cell).collect();
                format!("{}  {:<8}  {}", row.label, left, right)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
