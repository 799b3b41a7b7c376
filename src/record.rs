use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

pub const START: &str = "start";
pub const END: &str = "end";
pub const ENTRY_DATE: &str = "Enter a date";
pub const COUNTRY: &str = "Country";
pub const EVENT: &str = "Event";
pub const OBLAST: &str = "Oblast";
pub const CASUALTIES: &str = "Casualties";
pub const INJURED: &str = "Injured";
pub const CAPTURED: &str = "Captured";
pub const CIVILIAN_CASUALTIES: &str = "Civilian Casualties";
pub const NEW_RECRUITS: &str = "New Recruits";
pub const COMBAT_INTENSITY: &str = "Combat Intensity";
pub const TERRITORY_STATUS: &str = "Territory Status";
pub const PERCENTAGE_OCCUPIED: &str = "Percentage Occupied";
pub const AREA_OCCUPIED: &str = "Area Occupied";
pub const TOTAL_SOLDIERS_CASUALTIES: &str = "Total_soldiers_casualties";

/// Labels the CSV header must provide, in table-column order.
pub const SOURCE_COLUMNS: [&str; 15] = [
    START,
    END,
    ENTRY_DATE,
    COUNTRY,
    EVENT,
    OBLAST,
    CASUALTIES,
    INJURED,
    CAPTURED,
    CIVILIAN_CASUALTIES,
    NEW_RECRUITS,
    COMBAT_INTENSITY,
    TERRITORY_STATUS,
    PERCENTAGE_OCCUPIED,
    AREA_OCCUPIED,
];

/// Every persisted column (without the surrogate key) and its SQL type.
pub const TABLE_COLUMNS: [(&str, &str); 16] = [
    (START, "TIMESTAMP"),
    (END, "TIMESTAMP"),
    (ENTRY_DATE, "DATE"),
    (COUNTRY, "TEXT"),
    (EVENT, "TEXT"),
    (OBLAST, "TEXT"),
    (CASUALTIES, "INTEGER"),
    (INJURED, "INTEGER"),
    (CAPTURED, "INTEGER"),
    (CIVILIAN_CASUALTIES, "INTEGER"),
    (NEW_RECRUITS, "INTEGER"),
    (COMBAT_INTENSITY, "FLOAT"),
    (TERRITORY_STATUS, "TEXT"),
    (PERCENTAGE_OCCUPIED, "FLOAT"),
    (AREA_OCCUPIED, "FLOAT"),
    (TOTAL_SOLDIERS_CASUALTIES, "INTEGER"),
];

/// One conflict event. Numeric fields are already defaulted to zero,
/// so only text and temporal fields can be absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub entry_date: Option<NaiveDate>,
    pub country: Option<String>,
    pub event: Option<String>,
    pub oblast: Option<String>,
    pub casualties: i32,
    pub injured: i32,
    pub captured: i32,
    pub civilian_casualties: i32,
    pub new_recruits: i32,
    pub combat_intensity: f64,
    pub territory_status: Option<String>,
    pub percentage_occupied: f64,
    pub area_occupied: f64,
    pub total_soldiers_casualties: i32,
}

impl Record {
    pub fn soldier_losses(casualties: i32, injured: i32, captured: i32) -> Option<i32> {
        casualties.checked_add(injured)?.checked_add(captured)
    }
}
