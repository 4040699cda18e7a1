use cmms_common::ROLE_HEADER;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::{Request, Response, Route};

/// Adds CORS headers to every response for the configured origin.
pub struct Cors {
    pub origin: String,
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info { name: "CORS headers", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", self.origin.to_owned()));
        response.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"));
        response.set_header(Header::new("Access-Control-Allow-Headers", format!("Content-Type, {}", ROLE_HEADER)));
        response.set_header(Header::new("Access-Control-Max-Age", "3600"));
    }
}

/// Answers preflight requests for any path, only mounted alongside [Cors]
pub fn get_preflight_routes() -> Vec<Route> {
    routes![preflight]
}

#[options("/<_..>")]
async fn preflight() -> Status {
    Status::NoContent
}
