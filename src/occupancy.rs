use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::backend::{BackendClient, BackendError};
use crate::models::{NewOccupancy, OccupancyStatus, OccupancyUpdate};

#[derive(Debug, Error)]
pub enum OccupancyError {
    #[error("Class name is required")]
    MissingClassName,
    #[error("Start and end time are required")]
    MissingTimes,
    #[error("End time must be after start time")]
    EndBeforeStart,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Checks the form and shapes the row to insert. `None` means the room is
/// being marked vacant and nothing is inserted.
pub fn prepare(
    classroom_id: &str,
    update: OccupancyUpdate,
) -> Result<Option<NewOccupancy>, OccupancyError> {
    if update.status == OccupancyStatus::Vacant {
        return Ok(None);
    }
    let class_name = update.class_name.trim().to_string();
    if class_name.is_empty() {
        return Err(OccupancyError::MissingClassName);
    }
    let (Some(start_time), Some(end_time)) = (update.start_time, update.end_time) else {
        return Err(OccupancyError::MissingTimes);
    };
    if end_time <= start_time {
        return Err(OccupancyError::EndBeforeStart);
    }

    Ok(Some(NewOccupancy {
        classroom_id: classroom_id.to_string(),
        branch: update.branch,
        class_name,
        subject: non_empty(update.subject),
        occupied_by: update.occupied_by,
        status: update.status,
        start_time,
        end_time,
        purpose: non_empty(update.purpose),
    }))
}

/// Ends whatever currently holds the room, then records the new status.
pub async fn apply_status_update(
    backend: &BackendClient,
    classroom_id: &str,
    update: OccupancyUpdate,
    now: DateTime<Utc>,
) -> Result<OccupancyStatus, OccupancyError> {
    let status = update.status;
    let row = prepare(classroom_id, update)?;

    backend.end_active_occupancy(classroom_id, now).await?;
    if let Some(row) = row {
        backend.insert_occupancy(&row).await?;
    }
    info!(classroom_id, ?status, "classroom status updated");
    Ok(status)
}
