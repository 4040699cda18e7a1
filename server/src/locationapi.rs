use crate::auth::Requester;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use cmms_common::locations::{Location, LocationInput, LocationListing, LocationUpdate};
use cmms_common::roles::Permission;
use cmms_common::schema::{activities, locations, maintenance_tasks, schools};
use cmms_common::{yuri, Message, LOCATION_API_ROOT};
use diesel::{
    Connection, ExpressionMethods, NullableExpressionMethods, PgConnection, QueryDsl, RunQueryDsl, SelectableHelper,
};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::ops::DerefMut;

pub fn get_location_api_routes() -> Vec<Route> {
    routes![api_location_fetch, api_location_buildings, api_location_create, api_location_update, api_location_delete]
}

/// Lists every location with the name and faculty of its department.
#[get("/")]
async fn api_location_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<LocationListing>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let rows: Vec<(Location, Option<String>, Option<String>)> = locations::table
        .left_join(schools::table)
        .select((Location::as_select(), schools::school_name.nullable(), schools::faculty.nullable()))
        .order(locations::location_id)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load locations: {:?}", e))?;

    Ok(Json(
        rows.into_iter()
            .map(|(location, dept_name, faculty)| LocationListing { location, dept_name, faculty })
            .collect(),
    ))
}

/// Every distinct building name, used to fill the building pickers.
#[get("/buildings")]
async fn api_location_buildings(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<String>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let buildings = locations::table
        .select(locations::building)
        .distinct()
        .order(locations::building)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load buildings: {:?}", e))?;

    Ok(Json(buildings))
}

#[post("/", data = "<location>")]
async fn api_location_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    location: Json<LocationInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let location = location.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let id: i32 = diesel::insert_into(locations::table)
        .values(&location)
        .returning(locations::location_id)
        .get_result(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new location {:?}: {:?}", location, e))?;

    Ok(Created::new(yuri!(LOCATION_API_ROOT, &id.to_string())).body(Json(Message::created("Location created", id))))
}

#[put("/<id>", data = "<update>")]
async fn api_location_update(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: i32,
    update: Json<LocationUpdate>,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Update)?;

    let changes = update.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let updated = diesel::update(locations::table.find(id))
        .set(&changes)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to update location {:?} with {:?}: {:?}", id, changes, e))?;

    if updated == 0 {
        return Err(ApiError::NotFound("Location"));
    }

    Ok(Json(Message::new("Location updated")))
}

/// Deletes a location unless maintenance is still scheduled there. Activities
/// held at the location are kept without one.
#[delete("/<id>")]
async fn api_location_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: i32,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = db_connection
        .transaction(|conn| delete_location(conn, id))
        .inspect_err(|e| error!("Unable to delete location {:?}: {:?}", id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Location"));
    }

    Ok(Json(Message::new("Location deleted")))
}

fn delete_location(conn: &mut PgConnection, id: i32) -> Result<usize, ApiError> {
    let tasks: i64 =
        maintenance_tasks::table.filter(maintenance_tasks::location_id.eq(id)).count().get_result(conn)?;

    if tasks > 0 {
        return Err(ApiError::BadRequest(format!("Cannot delete location with {} maintenance task(s)", tasks)));
    }

    diesel::update(activities::table.filter(activities::location_id.eq(id)))
        .set(activities::location_id.eq(None::<i32>))
        .execute(conn)?;

    Ok(diesel::delete(locations::table.find(id)).execute(conn)?)
}
