use crate::config::Config;
use crate::error::ApiError;
use cmms_common::roles::{Permission, RoleInfo, Roles};
use cmms_common::ROLE_HEADER;
use rocket::http::Status;
use rocket::outcome::Outcome::{Error, Success};
use rocket::request::{FromRequest, Outcome};
use rocket::serde::json::Json;
use rocket::{Request, Route};

/// A [Request Guard](FromRequest) which identifies the role a request is made
/// with.
///
/// ***Always resolves to Admin if roles are not enforced.***
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub role: Roles,
}

impl Requester {
    /// Whether the role grants the given permission
    pub fn can(&self, permission: Permission) -> bool {
        self.role.can(permission)
    }

    /// Fails with 403 unless the role grants the given permission
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if !self.can(permission) {
            return Err(ApiError::Forbidden);
        }

        Ok(())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Requester {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Requester, ApiError> {
        let enforce_roles = request.rocket().state::<Config>().is_some_and(|config| config.enforce_roles);

        if !enforce_roles {
            return Success(Requester { role: Roles::Admin });
        }

        match request.headers().get_one(ROLE_HEADER).map(str::parse::<Roles>) {
            Some(Ok(role)) => Success(Requester { role }),
            _ => Error((Status::Unauthorized, ApiError::Unauthorized)),
        }
    }
}

/// Returns a list of all auth api routes
pub fn get_auth_api_routes() -> Vec<Route> {
    routes![api_auth_role]
}

/// Returns the caller's role along with everything it may do.
/// - If roles are enforced and the role header is missing or unknown, returns
///   status 401
#[get("/")]
async fn api_auth_role(requester: Requester) -> Json<RoleInfo> {
    Json(RoleInfo::from(requester.role))
}
