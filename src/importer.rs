//! CSV timetable import.
//!
//! An uploaded timetable has one row per weekday and one column per numbered
//! period:
//!
//! ```text
//! Days,1 (9-10 am),2 (10-11 am),3 (11-12)
//! Monday,Data Structures (101),,Seminar (Annex-B)
//! ```
//!
//! Each non-empty cell becomes a [`ParsedScheduleSlot`]. Rows and columns that
//! cannot be interpreted are skipped; cells naming an unknown room are kept but
//! flagged invalid so the operator can see why they will not be imported.

use std::collections::{BTreeMap, HashMap};
use std::io;

use chrono::{NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::models::{Branch, Classroom, ImportSummary, ParsedScheduleSlot, TimetableRecord};

pub const DAYS_COLUMN: &str = "Days";
pub const DEFAULT_CLASS_NAME: &str = "Default Class";
pub const NO_ROOM: &str = "No Room";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to parse CSV: {0}")]
    Decode(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

static DAYS: Lazy<HashMap<&'static str, Weekday>> = Lazy::new(|| {
    HashMap::from([
        ("sunday", Weekday::Sun),
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
    ])
});

// Period n runs from (8 + n):00 to (9 + n):00.
static TIME_SLOTS: Lazy<BTreeMap<u32, TimeSlot>> = Lazy::new(|| {
    (1..=8)
        .map(|n| {
            let hour = |h| NaiveTime::from_hms_opt(h, 0, 0).expect("slot hour in range");
            (
                n,
                TimeSlot {
                    start: hour(8 + n),
                    end: hour(9 + n),
                },
            )
        })
        .collect()
});

// ASCII digits only; `\d` would also accept other Unicode digits.
static SLOT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)").expect("regex compiles"));
static ROOM_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]+)\)").expect("regex compiles"));

/// Maps a weekday name to its index, Sunday = 0.
pub fn resolve_day(label: &str) -> Option<u32> {
    DAYS.get(label.trim().to_lowercase().as_str())
        .map(|day| day.num_days_from_sunday())
}

/// Looks up the period a column header refers to, e.g. `"3 (11-12)"`.
/// Zero-padded numbers such as `"01"` name no period.
pub fn resolve_time_slot(header: &str) -> Option<TimeSlot> {
    let caps = SLOT_HEADER.captures(header)?;
    let digits = &caps[1];
    if digits.starts_with('0') {
        return None;
    }
    let number = digits.parse::<u32>().ok()?;
    TIME_SLOTS.get(&number).copied()
}

/// Splits `"Subject (Room)"` into `(subject, room)`. The room is the first
/// parenthesized segment; every parenthesized segment is removed from the
/// subject.
fn split_cell(cell: &str) -> (String, String) {
    let room = ROOM_SEGMENT
        .captures(cell)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default();
    let subject = ROOM_SEGMENT.replace_all(cell, "").trim().to_string();
    (subject, room)
}

/// Case-insensitive lookup from room number to classroom id.
#[derive(Debug, Clone, Default)]
pub struct RoomDirectory {
    by_number: HashMap<String, String>,
}

impl RoomDirectory {
    pub fn new(classrooms: &[Classroom]) -> Self {
        let by_number = classrooms
            .iter()
            .map(|c| (c.room_number.trim().to_lowercase(), c.id.clone()))
            .collect();
        Self { by_number }
    }

    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.by_number
            .get(&label.trim().to_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTimetable {
    pub slots: Vec<ParsedScheduleSlot>,
    pub summary: ImportSummary,
}

/// Parses a timetable CSV against a snapshot of the room directory.
///
/// Fields are decoded lossily, so stray non-UTF-8 bytes only affect the cell
/// they sit in. Only a reader failure aborts the parse; everything else
/// degrades to skipped cells or slots carrying diagnostics.
pub fn parse<R: io::Read>(
    input: R,
    classrooms: &[Classroom],
) -> Result<ParsedTimetable, ImportError> {
    let directory = RoomDirectory::new(classrooms);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = decode_fields(reader.byte_headers()?);
    let day_column = headers.iter().position(|h| h == DAYS_COLUMN);

    let mut slots = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let line = record.position().map(|p| p.line());
        let record = decode_fields(&record);
        let Some(day_of_week) = day_column
            .and_then(|idx| record.get(idx))
            .and_then(|label| resolve_day(label))
        else {
            debug!(?line, "skipping row without a known day");
            continue;
        };

        for (idx, header) in headers.iter().enumerate() {
            if Some(idx) == day_column {
                continue;
            }
            let Some(cell) = record.get(idx).map(|field| field.trim()) else {
                continue;
            };
            if cell.is_empty() {
                continue;
            }
            let Some(time_slot) = resolve_time_slot(header) else {
                continue;
            };
            let (subject, room) = split_cell(cell);
            if subject.is_empty() {
                continue;
            }

            let classroom_id = directory.resolve(&room).map(str::to_string);
            let mut errors = Vec::new();
            if classroom_id.is_none() && !room.is_empty() {
                errors.push(format!("Unknown room: {room}"));
            }

            slots.push(ParsedScheduleSlot {
                day_of_week,
                start_time: time_slot.start,
                end_time: time_slot.end,
                room: if room.is_empty() { NO_ROOM.to_string() } else { room },
                class_name: DEFAULT_CLASS_NAME.to_string(),
                subject,
                valid: errors.is_empty() && classroom_id.is_some(),
                classroom_id,
                errors,
            });
        }
    }

    let summary = ImportSummary {
        total: slots.len(),
        valid: slots.iter().filter(|s| s.valid).count(),
    };
    Ok(ParsedTimetable { slots, summary })
}

fn decode_fields(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Shapes the importable subset of `slots` into `timetable` rows.
pub fn build_import_batch(slots: &[ParsedScheduleSlot], branch: Branch) -> Vec<TimetableRecord> {
    slots
        .iter()
        .filter(|slot| slot.valid)
        .filter_map(|slot| {
            let classroom_id = slot.classroom_id.clone()?;
            Some(TimetableRecord {
                day_of_week: slot.day_of_week,
                start_time: slot.start_time.format("%H:%M:%S").to_string(),
                end_time: slot.end_time.format("%H:%M:%S").to_string(),
                classroom_id,
                branch,
                class_name: slot.class_name.clone(),
                subject: slot.subject.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooms() -> Vec<Classroom> {
        vec![
            Classroom {
                id: "room-101".into(),
                room_number: "101".into(),
                building: "Main".into(),
            },
            Classroom {
                id: "room-lab".into(),
                room_number: " Lab-2 ".into(),
                building: "Annex".into(),
            },
        ]
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_resolve_day() {
        assert_eq!(resolve_day(" Monday "), Some(1));
        assert_eq!(resolve_day("monday"), Some(1));
        assert_eq!(resolve_day("MONDAY"), Some(1));
        assert_eq!(resolve_day("Sunday"), Some(0));
        assert_eq!(resolve_day("saturday"), Some(6));
        assert_eq!(resolve_day("Mon"), None);
        assert_eq!(resolve_day(""), None);
    }

    #[test]
    fn test_resolve_time_slot() {
        let slot = resolve_time_slot("3 (11-12)").unwrap();
        assert_eq!(slot.start, hm(11, 0));
        assert_eq!(slot.end, hm(12, 0));
        assert_eq!(resolve_time_slot("1").unwrap().start, hm(9, 0));
        assert_eq!(resolve_time_slot("8 (4-5 pm)").unwrap().end, hm(17, 0));
        assert!(resolve_time_slot("9 (5-6 pm)").is_none());
        assert!(resolve_time_slot("0").is_none());
        assert!(resolve_time_slot("Lunch").is_none());
        assert!(resolve_time_slot(" 2").is_none());
        assert!(resolve_time_slot("01 (9-10 am)").is_none());
        assert!(resolve_time_slot("\u{0663} (11-12)").is_none());
        assert!(resolve_time_slot("99999999999999999999").is_none());
    }

    #[test]
    fn test_split_cell() {
        assert_eq!(
            split_cell("Data Structures (101)"),
            ("Data Structures".to_string(), "101".to_string())
        );
        assert_eq!(split_cell("Library"), ("Library".to_string(), String::new()));
        assert_eq!(
            split_cell("Physics ( Lab-2 ) (extra)"),
            ("Physics".to_string(), "Lab-2".to_string())
        );
        assert_eq!(split_cell("(101)"), (String::new(), "101".to_string()));
    }

    #[test]
    fn test_room_directory_is_case_insensitive() {
        let dir = RoomDirectory::new(&rooms());
        assert_eq!(dir.resolve("lab-2"), Some("room-lab"));
        assert_eq!(dir.resolve(" LAB-2"), Some("room-lab"));
        assert_eq!(dir.resolve("102"), None);
    }

    #[test]
    fn test_parse_valid_cell() {
        let csv = "Days,1 (9-10 am),2 (10-11 am)\nMonday,Data Structures (101),\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        assert_eq!(parsed.slots.len(), 1);
        let slot = &parsed.slots[0];
        assert_eq!(slot.day_of_week, 1);
        assert_eq!(slot.subject, "Data Structures");
        assert_eq!(slot.room, "101");
        assert_eq!(slot.classroom_id.as_deref(), Some("room-101"));
        assert_eq!(slot.class_name, DEFAULT_CLASS_NAME);
        assert_eq!(slot.start_time, hm(9, 0));
        assert!(slot.valid);
        assert!(slot.errors.is_empty());
        assert_eq!(parsed.summary, ImportSummary { total: 1, valid: 1 });
    }

    #[test]
    fn test_parse_unknown_room_is_flagged() {
        let csv = "Days,3 (11-12)\ntuesday,Seminar (Annex-B)\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        let slot = &parsed.slots[0];
        assert_eq!(slot.errors, vec!["Unknown room: Annex-B".to_string()]);
        assert!(!slot.valid);
        assert!(slot.classroom_id.is_none());
        assert_eq!(slot.start_time, hm(11, 0));
        assert_eq!(parsed.summary, ImportSummary { total: 1, valid: 0 });
    }

    #[test]
    fn test_parse_missing_room_is_invalid_without_error() {
        let csv = "Days,1\nFriday,Library\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        let slot = &parsed.slots[0];
        assert_eq!(slot.room, NO_ROOM);
        assert!(slot.errors.is_empty());
        assert!(!slot.valid);
    }

    #[test]
    fn test_parse_skips_rows_and_columns() {
        let csv = "\
Days,Notes,1 (9-10),9 (5-6),2 (10-11),3 (11-12)
Holiday,x,Maths (101),Maths (101),Maths (101),Maths (101)
Wednesday,ignored,  ,Late (101),(101),Chemistry (Lab-2)

 THURSDAY ,,Biology,,,
";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        let subjects: Vec<_> = parsed.slots.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Chemistry", "Biology"]);
        assert_eq!(parsed.slots[0].day_of_week, 3);
        assert_eq!(parsed.slots[0].classroom_id.as_deref(), Some("room-lab"));
        assert_eq!(parsed.slots[1].day_of_week, 4);
    }

    #[test]
    fn test_parse_keeps_row_order() {
        let csv = "Days,2,1\nMonday,B (101),A (101)\nSunday,C (101),\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        let order: Vec<_> = parsed
            .slots
            .iter()
            .map(|s| (s.day_of_week, s.subject.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "B"), (1, "A"), (0, "C")]);
    }

    #[test]
    fn test_parse_without_days_column_yields_nothing() {
        let csv = "Day,1\nMonday,Maths (101)\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        assert!(parsed.slots.is_empty());
        assert_eq!(parsed.summary, ImportSummary::default());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let csv = "Days,1,2\nMonday,Maths (101),Seminar (Annex-B)\nTuesday,Art,\n";
        let first = parse(csv.as_bytes(), &rooms()).unwrap();
        let second = parse(csv.as_bytes(), &rooms()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_tolerates_invalid_utf8() {
        let bytes: &[u8] = b"Days,1 (9-10 am)\nMonday,Maths (101)\nNotes,Caf\xe9\nTuesday,Art\xff (101)\n";
        let parsed = parse(bytes, &rooms()).unwrap();
        assert_eq!(parsed.summary, ImportSummary { total: 2, valid: 2 });
        assert_eq!(parsed.slots[0].subject, "Maths");
        assert_eq!(parsed.slots[1].subject, "Art\u{FFFD}");
        assert_eq!(parsed.slots[1].classroom_id.as_deref(), Some("room-101"));
    }

    #[test]
    fn test_parse_skips_zero_padded_slot_headers() {
        let csv = "Days,01 (9-10 am),2 (10-11 am)\nMonday,Maths (101),Physics (101)\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        assert_eq!(parsed.slots.len(), 1);
        assert_eq!(parsed.slots[0].subject, "Physics");
    }

    #[test]
    fn test_validity_invariant_holds() {
        let csv = "Days,1,2,3\nMonday,A (101),B (Nowhere),C\nTuesday,D (lab-2),E,F (101)\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        for slot in &parsed.slots {
            assert_eq!(
                slot.valid,
                slot.errors.is_empty() && slot.classroom_id.is_some()
            );
        }
    }

    #[test]
    fn test_build_import_batch() {
        let csv = "Days,1,2,3\nMonday,A (101),B (Nowhere),C\nTuesday,D (lab-2),,\n";
        let parsed = parse(csv.as_bytes(), &rooms()).unwrap();
        let batch = build_import_batch(&parsed.slots, Branch::Ece);
        assert_eq!(batch.len(), parsed.summary.valid);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].start_time, "09:00:00");
        assert_eq!(batch[0].end_time, "10:00:00");
        assert_eq!(batch[0].classroom_id, "room-101");
        assert_eq!(batch[0].branch, Branch::Ece);
        assert_eq!(batch[1].day_of_week, 2);
        assert_eq!(batch[1].subject, "D");
    }

    #[test]
    fn test_build_import_batch_skips_valid_flag_without_room() {
        let slot = ParsedScheduleSlot {
            day_of_week: 1,
            start_time: hm(9, 0),
            end_time: hm(10, 0),
            room: NO_ROOM.into(),
            class_name: DEFAULT_CLASS_NAME.into(),
            subject: "Orphan".into(),
            classroom_id: None,
            valid: true,
            errors: vec![],
        };
        assert!(build_import_batch(&[slot], Branch::It).is_empty());
    }
}
