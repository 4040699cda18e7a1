use crate::auth::Requester;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use cmms_common::maintenance::{
    ExternalCompany, ExternalCompanyInput, ExternalCompanyUpdate, Maintenance, MaintenanceInput, MaintenanceListing,
    MaintenanceUpdate, SafetyQuery, SafetyRecord, WindowEnd, CLEANING,
};
use cmms_common::roles::Permission;
use cmms_common::schema::{external_companies, locations, maintenance_tasks};
use cmms_common::{yuri, Message, COMPANY_API_ROOT, MAINTENANCE_API_ROOT};
use diesel::{
    Connection, ExpressionMethods, NullableExpressionMethods, PgConnection, QueryDsl, QueryResult, RunQueryDsl,
    SelectableHelper,
};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::ops::DerefMut;

pub fn get_maintenance_api_routes() -> Vec<Route> {
    routes![api_maintenance_fetch, api_maintenance_create, api_maintenance_update, api_maintenance_delete]
}

pub fn get_company_api_routes() -> Vec<Route> {
    routes![api_company_fetch, api_company_create, api_company_update, api_company_delete]
}

pub fn get_search_api_routes() -> Vec<Route> {
    routes![api_safety_search]
}

/// Lists maintenance tasks with their location and contractor.
#[get("/")]
async fn api_maintenance_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<MaintenanceListing>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let rows: Vec<(Maintenance, String, Option<String>, Option<String>, Option<String>)> = maintenance_tasks::table
        .inner_join(locations::table)
        .left_join(external_companies::table)
        .select((
            Maintenance::as_select(),
            locations::building,
            locations::room,
            locations::campus,
            external_companies::name.nullable(),
        ))
        .order(maintenance_tasks::maintenance_id)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load maintenance tasks: {:?}", e))?;

    Ok(Json(
        rows.into_iter()
            .map(|(maintenance, building, room, campus, company_name)| MaintenanceListing {
                maintenance,
                building,
                room,
                campus,
                company_name,
            })
            .collect(),
    ))
}

#[post("/", data = "<task>")]
async fn api_maintenance_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    task: Json<MaintenanceInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let task = task.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let id: i32 = diesel::insert_into(maintenance_tasks::table)
        .values(&task)
        .returning(maintenance_tasks::maintenance_id)
        .get_result(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new maintenance task {:?}: {:?}", task, e))?;

    Ok(Created::new(yuri!(MAINTENANCE_API_ROOT, &id.to_string()))
        .body(Json(Message::created("Maintenance task created", id))))
}

#[put("/<id>", data = "<update>")]
async fn api_maintenance_update(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: i32,
    update: Json<MaintenanceUpdate>,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Update)?;

    let changes = update.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let updated = diesel::update(maintenance_tasks::table.find(id))
        .set(&changes)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to update maintenance task {:?} with {:?}: {:?}", id, changes, e))?;

    if updated == 0 {
        return Err(ApiError::NotFound("Maintenance task"));
    }

    Ok(Json(Message::new("Maintenance task updated")))
}

#[delete("/<id>")]
async fn api_maintenance_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: i32,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = diesel::delete(maintenance_tasks::table.find(id))
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to delete maintenance task {:?}: {:?}", id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Maintenance task"));
    }

    Ok(Json(Message::new("Maintenance task deleted")))
}

#[get("/")]
async fn api_company_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<ExternalCompany>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let found = external_companies::table
        .select(ExternalCompany::as_select())
        .order(external_companies::company_id)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load external companies: {:?}", e))?;

    Ok(Json(found))
}

#[post("/", data = "<company>")]
async fn api_company_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    company: Json<ExternalCompanyInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let company = company.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let id: i32 = diesel::insert_into(external_companies::table)
        .values(&company)
        .returning(external_companies::company_id)
        .get_result(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new external company {:?}: {:?}", company, e))?;

    Ok(Created::new(yuri!(COMPANY_API_ROOT, &id.to_string()))
        .body(Json(Message::created("External Company created", id))))
}

#[put("/<id>", data = "<update>")]
async fn api_company_update(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: i32,
    update: Json<ExternalCompanyUpdate>,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Update)?;

    let changes = update.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let updated = diesel::update(external_companies::table.find(id))
        .set(&changes)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to update external company {:?} with {:?}: {:?}", id, changes, e))?;

    if updated == 0 {
        return Err(ApiError::NotFound("External Company"));
    }

    Ok(Json(Message::new("External Company updated")))
}

/// Deletes a company. Tasks it was contracted for stay, without a contractor.
#[delete("/<id>")]
async fn api_company_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: i32,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = db_connection
        .transaction(|conn| delete_company(conn, id))
        .inspect_err(|e| error!("Unable to delete external company {:?}: {:?}", id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("External Company"));
    }

    Ok(Json(Message::new("External Company deleted")))
}

fn delete_company(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
    diesel::update(maintenance_tasks::table.filter(maintenance_tasks::contracted_company_id.eq(id)))
        .set(maintenance_tasks::contracted_company_id.eq(None::<i32>))
        .execute(conn)?;

    diesel::delete(external_companies::table.find(id)).execute(conn)
}

type SafetyRow = (Maintenance, String, Option<String>, Option<String>, Option<String>, Option<String>);

/// Finds cleaning tasks by building and time window so people know when to
/// stay clear. Tasks using active chemicals carry a warning.
#[get("/safety?<query..>")]
async fn api_safety_search(
    requester: Requester,
    db_connection: &State<DbConnection>,
    query: SafetyQuery,
) -> Result<Json<Vec<SafetyRecord>>, ApiError> {
    requester.require(Permission::SafetySearch)?;

    let (start, end) = query.window()?;

    let mut sql_query = maintenance_tasks::table
        .inner_join(locations::table)
        .left_join(external_companies::table)
        .select((
            Maintenance::as_select(),
            locations::building,
            locations::room,
            locations::floor,
            locations::campus,
            external_companies::name.nullable(),
        ))
        .filter(maintenance_tasks::kind.eq(CLEANING))
        .order((maintenance_tasks::scheduled_time, maintenance_tasks::maintenance_id))
        .into_boxed();

    if let Some(building) = query.building() {
        sql_query = sql_query.filter(locations::building.eq(building));
    }

    if let Some(start) = start {
        sql_query = sql_query.filter(maintenance_tasks::scheduled_time.ge(start));
    }

    match end {
        Some(WindowEnd::Through(end)) => sql_query = sql_query.filter(maintenance_tasks::scheduled_time.le(end)),
        Some(WindowEnd::Before(end)) => sql_query = sql_query.filter(maintenance_tasks::scheduled_time.lt(end)),
        None => {}
    }

    let mut db_connection = db::lock(db_connection)?;
    let rows: Vec<SafetyRow> = sql_query
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load SQL result for query {:?}: {:?}", query, e))?;

    Ok(Json(
        rows.into_iter()
            .map(|(maintenance, building, room, floor, campus, company_name)| {
                SafetyRecord::new(maintenance, building, room, floor, campus, company_name)
            })
            .collect(),
    ))
}
