use cmms_common::fields::ValidationError;
use diesel::result::Error as DieselError;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every way a request can fail after reaching a handler. Responds with the
/// matching status and a `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("A valid role is required")]
    Unauthorized,

    #[error("Your role does not allow this")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    /// Rejected by the database, usually a constraint violation
    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Database(_) => Status::BadRequest,
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Forbidden => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    /// Names the missing entity in a not found error
    pub fn naming(self, entity: &'static str) -> Self {
        match self {
            ApiError::NotFound(_) => ApiError::NotFound(entity),
            other => other,
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ApiError::NotFound("Record"),
            DieselError::DatabaseError(_, info) => ApiError::Database(info.message().to_owned()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// The body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: &str) -> Self {
        ErrorBody { error: message.to_owned() }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();

        if status == Status::InternalServerError {
            error!("Internal error handling {} {}: {}", request.method(), request.uri(), self);
        } else {
            warn!("Rejected {} {}: {}", request.method(), request.uri(), self);
        }

        (status, Json(ErrorBody::new(&self.to_string()))).respond_to(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorKind;

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = ApiError::from(ValidationError::MissingField("name"));
        assert_eq!(err.status(), Status::BadRequest);
        assert_eq!(err.to_string(), "Missing required field: name");

        let err = ApiError::from(ValidationError::NoFields);
        assert_eq!(err.to_string(), "No fields to update");
    }

    #[test]
    fn diesel_errors_map_to_statuses() {
        assert_eq!(ApiError::from(DieselError::NotFound).status(), Status::NotFound);
        assert_eq!(ApiError::from(DieselError::RollbackTransaction).status(), Status::InternalServerError);

        let constraint = DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new("insert or update violates foreign key constraint".to_owned()),
        );
        let err = ApiError::from(constraint);
        assert_eq!(err.status(), Status::BadRequest);
        assert!(err.to_string().contains("foreign key"));
    }

    #[test]
    fn other_statuses() {
        assert_eq!(ApiError::Conflict("exists".to_owned()).status(), Status::Conflict);
        assert_eq!(ApiError::Forbidden.status(), Status::Forbidden);
        assert_eq!(ApiError::Unauthorized.status(), Status::Unauthorized);
        assert_eq!(ApiError::from(DieselError::NotFound).naming("Person").to_string(), "Person not found");
        assert_eq!(ApiError::Forbidden.naming("Person").status(), Status::Forbidden);
    }
}
