use crate::auth::Requester;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use cmms_common::bulk::{BulkImportRequest, BulkRecords};
use cmms_common::roles::Permission;
use cmms_common::schema::{activities, external_companies, locations, maintenance_tasks, persons, schools};
use cmms_common::{Message, IMPORT_API_ROOT};
use diesel::{Connection, PgConnection, QueryResult, RunQueryDsl};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};

/// Returns a list of all bulk api routes
pub fn get_bulk_api_routes() -> Vec<Route> {
    routes![api_bulk_import]
}

/// Inserts every record in one statement. Returns how many rows went in.
fn insert_records(conn: &mut PgConnection, records: &BulkRecords) -> QueryResult<usize> {
    match records {
        BulkRecords::Persons(rows) => diesel::insert_into(persons::table).values(rows).execute(conn),
        BulkRecords::Schools(rows) => diesel::insert_into(schools::table).values(rows).execute(conn),
        BulkRecords::Locations(rows) => diesel::insert_into(locations::table).values(rows).execute(conn),
        BulkRecords::Activities(rows) => diesel::insert_into(activities::table).values(rows).execute(conn),
        BulkRecords::Maintenance(rows) => diesel::insert_into(maintenance_tasks::table).values(rows).execute(conn),
        BulkRecords::ExternalCompanies(rows) => {
            diesel::insert_into(external_companies::table).values(rows).execute(conn)
        }
    }
}

/// Imports a list of records of one entity type. Every item is validated
/// before anything is written, and either all of them are inserted or none.
/// - If the entity is missing or unsupported, returns status 400
/// - If items is missing, not a list, or empty, returns status 400
/// - If any item is invalid, returns status 400 naming its index
#[post("/", data = "<request>")]
async fn api_bulk_import(
    requester: Requester,
    db_connection: &State<DbConnection>,
    request: Json<BulkImportRequest>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let records = request.into_inner().into_records()?;
    let entity = records.entity();

    let mut db_connection = db::lock(db_connection)?;
    let imported = db_connection
        .transaction(|conn| insert_records(conn, &records))
        .inspect_err(|e| error!("Unable to import {} {}: {:?}", records.len(), entity, e))?;

    info!("Imported {} items into {}", imported, entity);
    Ok(Created::new(IMPORT_API_ROOT).body(Json(Message::new(&format!("Imported {} items into {}", imported, entity)))))
}
