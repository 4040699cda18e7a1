pub mod activities;
pub mod bulk;
pub mod fields;
pub mod locations;
pub mod maintenance;
pub mod people;
pub mod reports;
pub mod roles;
#[cfg(feature = "server")]
pub mod schema;
pub mod schools;
pub mod supervision;
pub mod yuri;

use serde::{Deserialize, Serialize};

pub const API_ROOT: &str = "/api";
pub const PERSON_API_ROOT: &str = "/api/persons";
pub const PROFILE_API_ROOT: &str = "/api/profiles";
pub const SCHOOL_API_ROOT: &str = "/api/schools";
pub const LOCATION_API_ROOT: &str = "/api/locations";
pub const ACTIVITY_API_ROOT: &str = "/api/activities";
pub const MAINTENANCE_API_ROOT: &str = "/api/maintenance";
pub const PARTICIPATION_API_ROOT: &str = "/api/participations";
pub const AFFILIATION_API_ROOT: &str = "/api/affiliations";
pub const COMPANY_API_ROOT: &str = "/api/external-companies";
pub const SUPERVISION_API_ROOT: &str = "/api/building-supervision";
pub const SEARCH_API_ROOT: &str = "/api/search";
pub const REPORT_API_ROOT: &str = "/api/reports";
pub const IMPORT_API_ROOT: &str = "/api/import";
pub const AUTH_API_ROOT: &str = "/api/auth";

/// The request header carrying the caller's role when roles are enforced
pub const ROLE_HEADER: &str = "X-Cmms-Role";

/// The status given to a new profile when the request doesn't specify one
pub const DEFAULT_PROFILE_STATUS: &str = "Current";

/// The key of a newly created row, either a natural text key or a serial id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Serial(i32),
    Text(String),
}

impl From<i32> for RecordId {
    fn from(value: i32) -> Self {
        RecordId::Serial(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_owned())
    }
}

/// The body of every successful write response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,

    /// The key of the affected row, only sent when a row was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
}

impl Message {
    pub fn new(message: &str) -> Self {
        Self { message: message.to_owned(), id: None }
    }

    pub fn created<I: Into<RecordId>>(message: &str, id: I) -> Self {
        Self { message: message.to_owned(), id: Some(id.into()) }
    }
}

/// Wraps list responses which are sent as `{"data": [...]}` instead of a bare
/// array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
}

impl<T> DataResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}
