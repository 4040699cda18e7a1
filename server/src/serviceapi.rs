use crate::auth::Requester;
use crate::config::Config;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use cmms_common::roles::Permission;
use diesel::sql_types::Text;
use diesel::{sql_query, QueryableByName, RunQueryDsl};
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::ops::DerefMut;

pub fn get_service_api_routes() -> Vec<Route> {
    routes![api_root, api_health, api_query]
}

/// /api root path just to verify the backend is online
#[get("/")]
async fn api_root() -> &'static str {
    "   _________________________
  |  _____________________  |
  | |                     | |
  | |   CMMS  api online  | |
  | |_____________________| |
  |_________________________|
      _[_______]_    ||
     [___________]   ||  maintenance
                    _||_ in progress
"
}

#[get("/health")]
async fn api_health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// The body of a query console request.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(QueryableByName)]
struct JsonRows {
    #[diesel(sql_type = Text)]
    rows: String,
}

/// Whether the statement reads rows instead of changing them
fn returns_rows(query: &str) -> bool {
    let first = query.split_whitespace().next().unwrap_or_default();
    first.eq_ignore_ascii_case("select") || first.eq_ignore_ascii_case("with")
}

/// Wraps a reading statement so PostgreSQL hands back all of its rows as one
/// JSON array.
fn as_json_rows(query: &str) -> String {
    let query = query.trim().trim_end_matches(';');
    format!("SELECT COALESCE(json_agg(q), '[]'::json)::text AS rows FROM ({}) q", query)
}

/// Runs raw SQL for administrators. Reading statements return their rows,
/// anything else returns how many rows it touched.
/// - If the console is disabled in the config, returns status 403
/// - If the query is blank or rejected by the database, returns status 400
#[post("/query", data = "<request>")]
async fn api_query(
    requester: Requester,
    config: &State<Config>,
    db_connection: &State<DbConnection>,
    request: Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    requester.require(Permission::DevConsole)?;

    if !config.query_console {
        return Err(ApiError::Forbidden);
    }

    let query = request.into_inner().query.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_owned()));
    }

    warn!("Running console query {:?}", query);
    let mut db_connection = db::lock(db_connection)?;

    if returns_rows(query) {
        let found: Vec<JsonRows> = sql_query(as_json_rows(query))
            .load(db_connection.deref_mut())
            .inspect_err(|e| error!("Unable to run console query {:?}: {:?}", query, e))?;

        let rows = match found.into_iter().next() {
            Some(found) => serde_json::from_str(&found.rows).map_err(|e| ApiError::Internal(e.to_string()))?,
            None => Value::Array(Vec::new()),
        };

        return Ok(Json(rows));
    }

    let rows_affected = sql_query(query)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to run console query {:?}: {:?}", query, e))?;

    Ok(Json(json!({ "message": "Query executed successfully", "rows_affected": rows_affected })))
}
