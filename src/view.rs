// View projections: the roster and clash records are the source of truth, rows are regenerated from them

use std::fmt::Write as _;

use serde::Serialize;

use crate::clash_api::ClashRecord;
use crate::clash_query::TIME_FORMAT;
use crate::roster::ItemRoster;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterRow {
    pub presentation_id: usize,
    pub row_id: String,
    pub name: String,
    pub input_name: String,
    pub quantity: u32,
    pub max_quantity: u32,
}

pub fn roster_rows(roster: &ItemRoster) -> Vec<RosterRow> {
    let prefix = roster.kind().view_prefix();
    roster
        .entries()
        .iter()
        .map(|entry| RosterRow {
            presentation_id: entry.presentation_id,
            row_id: format!("{}_{}_id", prefix, entry.item_id),
            name: entry.name.clone(),
            input_name: roster.quantity_key(&entry.item_id),
            quantity: entry.quantity,
            max_quantity: entry.max_quantity,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRow {
    pub equipment_name: String,
    pub booking_id: u64,
    pub booking_user: String,
    pub booking_activity: String,
    pub window: String,
    pub you_quantity: u32,
    pub clash_quantity: u32,
    pub total_quantity: u32,
    pub net_quantity: i64,
    pub shortfall: bool,
}

impl From<&ClashRecord> for ReviewRow {
    fn from(record: &ClashRecord) -> Self {
        Self {
            equipment_name: record.equipment_name.clone(),
            booking_id: record.booking_id,
            booking_user: record.booking_user.clone(),
            booking_activity: record.booking_activity.clone(),
            window: format!(
                "{} - {}",
                record.booking_starts.format(TIME_FORMAT),
                record.booking_ends.format(TIME_FORMAT)
            ),
            you_quantity: record.you_quantity,
            clash_quantity: record.clash_quantity,
            total_quantity: record.total_quantity,
            net_quantity: record.net_quantity,
            shortfall: record.net_quantity < 0,
        }
    }
}

// Review surface shown while the user decides whether to book anyway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClashReview {
    pub rows: Vec<ReviewRow>,
}

impl ClashReview {
    pub fn from_records(records: &[ClashRecord]) -> Self {
        Self {
            rows: records.iter().map(ReviewRow::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        const HEADERS: [&str; 8] = [
            "Equipment", "Booking", "User", "Activity", "Time", "You", "Clash", "Net",
        ];

        let cells: Vec<[String; 8]> = self
            .rows
            .iter()
            .map(|row| {
                [
                    row.equipment_name.clone(),
                    format!("#{}", row.booking_id),
                    row.booking_user.clone(),
                    row.booking_activity.clone(),
                    row.window.clone(),
                    row.you_quantity.to_string(),
                    row.clash_quantity.to_string(),
                    row.net_quantity.to_string(),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(|h| h.chars().count());
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        write_line(&mut out, HEADERS.iter().map(|h| h.to_string()), &widths);
        for row in cells {
            write_line(&mut out, row.into_iter(), &widths);
        }
        out
    }
}

fn write_line(out: &mut String, cells: impl Iterator<Item = String>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}
