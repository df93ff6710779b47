use thiserror::Error;
use tracing::info;

use crate::backend::{BackendClient, BackendError};
use crate::models::{NewRoomRequest, RoomRequest};

pub const RECENT_REQUESTS_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Please enter a message")]
    EmptyMessage,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub async fn submit(backend: &BackendClient, mut request: NewRoomRequest) -> Result<(), RequestError> {
    request.message = request.message.trim().to_string();
    if request.message.is_empty() {
        return Err(RequestError::EmptyMessage);
    }
    backend.insert_room_request(&request).await?;
    info!(requester = %request.requester_id, "room request posted");
    Ok(())
}

/// Latest requests, hiding the ones `viewer_id` posted.
pub async fn recent_for(
    backend: &BackendClient,
    viewer_id: Option<&str>,
) -> Result<Vec<RoomRequest>, RequestError> {
    let requests = backend.recent_room_requests(RECENT_REQUESTS_LIMIT).await?;
    Ok(exclude_own(requests, viewer_id))
}

fn exclude_own(requests: Vec<RoomRequest>, viewer_id: Option<&str>) -> Vec<RoomRequest> {
    requests
        .into_iter()
        .filter(|r| Some(r.requester_id.as_str()) != viewer_id)
        .collect()
}
