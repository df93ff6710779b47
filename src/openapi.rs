use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{ImportResult, StatusResult};
use crate::models::{
    Branch, Classroom, ImportSummary, NewRoomRequest, OccupancyStatus, OccupancyUpdate,
    ParsedScheduleSlot, RoomRequest,
};
use crate::session::ImportSession;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::list_classrooms,
        crate::handlers::update_classroom_status,
        crate::handlers::create_import,
        crate::handlers::get_import,
        crate::handlers::submit_import,
        crate::handlers::discard_import,
        crate::handlers::create_room_request,
        crate::handlers::list_room_requests
    ),
    components(schemas(
        Branch,
        Classroom,
        ParsedScheduleSlot,
        ImportSummary,
        ImportSession,
        ImportResult,
        OccupancyStatus,
        OccupancyUpdate,
        StatusResult,
        NewRoomRequest,
        RoomRequest
    )),
    tags(
        (name = "classrooms", description = "Room directory and live occupancy"),
        (name = "imports", description = "CSV timetable import"),
        (name = "room-requests", description = "Requests for a free classroom")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;
