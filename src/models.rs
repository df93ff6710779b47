use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Department a timetable, occupancy or room request belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    Cse,
    Ece,
    It,
    Mech,
    Civil,
    Eee,
}

/// Room directory entry as stored in the `classrooms` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Classroom {
    pub id: String,
    pub room_number: String,
    pub building: String,
}

/// One cell of an uploaded timetable after parsing and room resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ParsedScheduleSlot {
    /// Sunday = 0 ... Saturday = 6
    pub day_of_week: u32,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "09:00")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "10:00")]
    pub end_time: NaiveTime,
    pub room: String,
    pub class_name: String,
    pub subject: String,
    pub classroom_id: Option<String>,
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
pub struct ImportSummary {
    pub total: usize,
    pub valid: usize,
}

/// Row shape of the external `timetable` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TimetableRecord {
    pub day_of_week: u32,
    #[schema(example = "09:00:00")]
    pub start_time: String,
    #[schema(example = "10:00:00")]
    pub end_time: String,
    pub classroom_id: String,
    pub branch: Branch,
    pub class_name: String,
    pub subject: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyStatus {
    Vacant,
    Occupied,
    Reserved,
}

/// Status form submitted by a class representative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct OccupancyUpdate {
    pub status: OccupancyStatus,
    pub branch: Branch,
    pub occupied_by: String,
    #[serde(default)]
    pub class_name: String,
    pub subject: Option<String>,
    pub purpose: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Row shape of the external `classroom_occupancy` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct NewOccupancy {
    pub classroom_id: String,
    pub branch: Branch,
    pub class_name: String,
    pub subject: Option<String>,
    pub occupied_by: String,
    pub status: OccupancyStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct NewRoomRequest {
    pub requester_id: String,
    pub requester_name: String,
    pub requester_branch: Branch,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RoomRequest {
    pub id: String,
    pub requester_id: String,
    pub requester_name: String,
    pub requester_branch: Branch,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// `HH:MM` (de)serialization for slot times.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(D::Error::custom)
    }
}
