use crate::auth::Requester;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use cmms_common::roles::Permission;
use cmms_common::schema::{affiliations, locations, persons, schools};
use cmms_common::schools::{Affiliation, AffiliationInput, AffiliationListing, School, SchoolInput, SchoolUpdate};
use cmms_common::{yuri, Message, AFFILIATION_API_ROOT, SCHOOL_API_ROOT};
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, QueryResult, RunQueryDsl, SelectableHelper};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::ops::DerefMut;

pub fn get_school_api_routes() -> Vec<Route> {
    routes![api_school_fetch, api_school_create, api_school_update, api_school_delete]
}

pub fn get_affiliation_api_routes() -> Vec<Route> {
    routes![api_affiliation_fetch, api_affiliation_create, api_affiliation_delete]
}

#[get("/")]
async fn api_school_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<School>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let found = schools::table
        .select(School::as_select())
        .order(schools::department)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load schools: {:?}", e))?;

    Ok(Json(found))
}

#[post("/", data = "<school>")]
async fn api_school_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    school: Json<SchoolInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let school = school.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    diesel::insert_into(schools::table)
        .values(&school)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new school {:?}: {:?}", school, e))?;

    Ok(Created::new(yuri!(SCHOOL_API_ROOT, &school.department))
        .body(Json(Message::created("Department created", school.department))))
}

#[put("/<department>", data = "<update>")]
async fn api_school_update(
    requester: Requester,
    db_connection: &State<DbConnection>,
    department: &str,
    update: Json<SchoolUpdate>,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Update)?;

    let changes = update.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let updated = diesel::update(schools::table.find(department))
        .set(&changes)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to update school {:?} with {:?}: {:?}", department, changes, e))?;

    if updated == 0 {
        return Err(ApiError::NotFound("Department"));
    }

    Ok(Json(Message::new("Department updated")))
}

/// Deletes a school. Its affiliations are removed and its locations are kept
/// without an owning department.
#[delete("/<department>")]
async fn api_school_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    department: &str,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = db_connection
        .transaction(|conn| delete_school(conn, department))
        .inspect_err(|e| error!("Unable to delete school {:?}: {:?}", department, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Department"));
    }

    Ok(Json(Message::new("Department deleted")))
}

fn delete_school(conn: &mut PgConnection, department: &str) -> QueryResult<usize> {
    diesel::delete(affiliations::table.filter(affiliations::department.eq(department))).execute(conn)?;
    diesel::update(locations::table.filter(locations::department.eq(department)))
        .set(locations::department.eq(None::<String>))
        .execute(conn)?;

    diesel::delete(schools::table.find(department)).execute(conn)
}

#[get("/")]
async fn api_affiliation_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<AffiliationListing>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let rows: Vec<(Affiliation, String, String)> = affiliations::table
        .inner_join(persons::table)
        .inner_join(schools::table)
        .select((Affiliation::as_select(), persons::name, schools::school_name))
        .order((affiliations::personal_id, affiliations::department))
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load affiliations: {:?}", e))?;

    Ok(Json(
        rows.into_iter()
            .map(|(affiliation, person_name, school_name)| AffiliationListing { affiliation, person_name, school_name })
            .collect(),
    ))
}

#[post("/", data = "<affiliation>")]
async fn api_affiliation_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    affiliation: Json<AffiliationInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let affiliation = affiliation.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    diesel::insert_into(affiliations::table)
        .values(&affiliation)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new affiliation {:?}: {:?}", affiliation, e))?;

    let uri = yuri!(AFFILIATION_API_ROOT, &affiliation.personal_id, &affiliation.department);
    Ok(Created::new(uri).body(Json(Message::new("Affiliation added"))))
}

#[delete("/<personal_id>/<department>")]
async fn api_affiliation_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    personal_id: &str,
    department: &str,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = diesel::delete(affiliations::table.find((personal_id, department)))
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to delete affiliation {:?}/{:?}: {:?}", personal_id, department, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Affiliation"));
    }

    Ok(Json(Message::new("Affiliation removed")))
}
