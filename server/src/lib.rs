#[macro_use]
extern crate rocket;

pub mod activityapi;
pub mod auth;
pub mod bulkapi;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod locationapi;
pub mod maintenanceapi;
pub mod pdf;
pub mod personapi;
pub mod reportapi;
pub mod schoolapi;
pub mod serviceapi;
pub mod supervisionapi;

use crate::activityapi::{get_activity_api_routes, get_participation_api_routes};
use crate::auth::get_auth_api_routes;
use crate::bulkapi::get_bulk_api_routes;
use crate::config::Config;
use crate::cors::{get_preflight_routes, Cors};
use crate::error::{ApiError, ErrorBody};
use crate::locationapi::get_location_api_routes;
use crate::maintenanceapi::{get_company_api_routes, get_maintenance_api_routes, get_search_api_routes};
use crate::personapi::{get_person_api_routes, get_profile_api_routes};
use crate::reportapi::get_report_api_routes;
use crate::schoolapi::{get_affiliation_api_routes, get_school_api_routes};
use crate::serviceapi::get_service_api_routes;
use crate::supervisionapi::get_supervision_api_routes;
use cmms_common::{
    ACTIVITY_API_ROOT, AFFILIATION_API_ROOT, API_ROOT, AUTH_API_ROOT, COMPANY_API_ROOT, IMPORT_API_ROOT,
    LOCATION_API_ROOT, MAINTENANCE_API_ROOT, PARTICIPATION_API_ROOT, PERSON_API_ROOT, PROFILE_API_ROOT,
    REPORT_API_ROOT, SCHOOL_API_ROOT, SEARCH_API_ROOT, SUPERVISION_API_ROOT,
};
use diesel::PgConnection;
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use std::sync::Mutex;

#[catch(401)]
fn unauthorized() -> Json<ErrorBody> {
    Json(ErrorBody::new(&ApiError::Unauthorized.to_string()))
}

/// Gives errors raised before a handler runs, like unknown paths or bodies
/// that don't parse, the same `{"error": ...}` shape as handler errors.
#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> (Status, Json<ErrorBody>) {
    (status, Json(ErrorBody::new(status.reason().unwrap_or("Unknown error"))))
}

/// Assembles the server around an open database connection. Rocket itself is
/// configured from the same figment as [Config].
pub fn build_rocket(figment: Figment, config: Config, connection: PgConnection) -> Rocket<Build> {
    let client_path = config.client_path.to_owned();
    let cors_origin = config.cors_origin.to_owned();

    let mut rocket = rocket::custom(figment)
        .manage(config)
        .manage(Mutex::new(connection))
        .register("/", catchers![unauthorized, default_catcher])
        .mount(API_ROOT, get_service_api_routes())
        .mount(AUTH_API_ROOT, get_auth_api_routes())
        .mount(PERSON_API_ROOT, get_person_api_routes())
        .mount(PROFILE_API_ROOT, get_profile_api_routes())
        .mount(SCHOOL_API_ROOT, get_school_api_routes())
        .mount(AFFILIATION_API_ROOT, get_affiliation_api_routes())
        .mount(LOCATION_API_ROOT, get_location_api_routes())
        .mount(ACTIVITY_API_ROOT, get_activity_api_routes())
        .mount(PARTICIPATION_API_ROOT, get_participation_api_routes())
        .mount(MAINTENANCE_API_ROOT, get_maintenance_api_routes())
        .mount(COMPANY_API_ROOT, get_company_api_routes())
        .mount(SEARCH_API_ROOT, get_search_api_routes())
        .mount(SUPERVISION_API_ROOT, get_supervision_api_routes())
        .mount(REPORT_API_ROOT, get_report_api_routes())
        .mount(IMPORT_API_ROOT, get_bulk_api_routes());

    if let Some(client_path) = client_path {
        rocket = rocket.mount("/", FileServer::from(client_path));
    }

    if let Some(origin) = cors_origin {
        rocket = rocket.attach(Cors { origin }).mount("/", get_preflight_routes());
    }

    rocket
}
