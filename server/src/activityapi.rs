use crate::auth::Requester;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use chrono::NaiveDateTime;
use cmms_common::activities::{
    Activity, ActivityInput, ActivityListing, ActivityUpdate, Participation, ParticipationInput, ParticipationListing,
};
use cmms_common::roles::Permission;
use cmms_common::schema::{activities, locations, participations, persons};
use cmms_common::{yuri, Message, ACTIVITY_API_ROOT, PARTICIPATION_API_ROOT};
use diesel::{
    Connection, ExpressionMethods, NullableExpressionMethods, PgConnection, QueryDsl, QueryResult, RunQueryDsl,
    SelectableHelper,
};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::ops::DerefMut;

pub fn get_activity_api_routes() -> Vec<Route> {
    routes![api_activity_fetch, api_activity_create, api_activity_update, api_activity_delete]
}

pub fn get_participation_api_routes() -> Vec<Route> {
    routes![api_participation_fetch, api_participation_create, api_participation_delete]
}

/// Lists activities with their organiser's name and where they're held.
#[get("/")]
async fn api_activity_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<ActivityListing>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let rows: Vec<(Activity, String, Option<String>, Option<String>, Option<String>)> = activities::table
        .inner_join(persons::table)
        .left_join(locations::table)
        .select((
            Activity::as_select(),
            persons::name,
            locations::building.nullable(),
            locations::room.nullable(),
            locations::floor.nullable(),
        ))
        .order(activities::activity_id)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load activities: {:?}", e))?;

    Ok(Json(
        rows.into_iter()
            .map(|(activity, organiser_name, building, room, floor)| ActivityListing {
                activity,
                organiser_name,
                building,
                room,
                floor,
            })
            .collect(),
    ))
}

#[post("/", data = "<activity>")]
async fn api_activity_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    activity: Json<ActivityInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let activity = activity.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    diesel::insert_into(activities::table)
        .values(&activity)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new activity {:?}: {:?}", activity, e))?;

    Ok(Created::new(yuri!(ACTIVITY_API_ROOT, &activity.activity_id))
        .body(Json(Message::created("Activity created", activity.activity_id))))
}

#[put("/<id>", data = "<update>")]
async fn api_activity_update(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: &str,
    update: Json<ActivityUpdate>,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Update)?;

    let changes = update.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let updated = diesel::update(activities::table.find(id))
        .set(&changes)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to update activity {:?} with {:?}: {:?}", id, changes, e))?;

    if updated == 0 {
        return Err(ApiError::NotFound("Activity"));
    }

    Ok(Json(Message::new("Activity updated")))
}

/// Deletes an activity along with everyone's participation in it.
#[delete("/<id>")]
async fn api_activity_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: &str,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = db_connection
        .transaction(|conn| delete_activity(conn, id))
        .inspect_err(|e| error!("Unable to delete activity {:?}: {:?}", id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Activity"));
    }

    Ok(Json(Message::new("Activity deleted")))
}

fn delete_activity(conn: &mut PgConnection, id: &str) -> QueryResult<usize> {
    diesel::delete(participations::table.filter(participations::activity_id.eq(id))).execute(conn)?;
    diesel::delete(activities::table.find(id)).execute(conn)
}

type ParticipationRow =
    (Participation, String, Option<String>, Option<NaiveDateTime>, Option<String>, Option<String>);

/// Lists who takes part in what, with the activity's details.
#[get("/")]
async fn api_participation_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<ParticipationListing>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let rows: Vec<ParticipationRow> = participations::table
        .inner_join(persons::table)
        .inner_join(activities::table.left_join(locations::table))
        .select((
            Participation::as_select(),
            persons::name,
            activities::kind,
            activities::time,
            locations::building.nullable(),
            locations::room.nullable(),
        ))
        .order((participations::activity_id, participations::personal_id))
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load participations: {:?}", e))?;

    Ok(Json(
        rows.into_iter()
            .map(|(participation, person_name, activity_type, activity_time, building, room)| ParticipationListing {
                participation,
                person_name,
                activity_type,
                activity_time,
                building,
                room,
            })
            .collect(),
    ))
}

#[post("/", data = "<participation>")]
async fn api_participation_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    participation: Json<ParticipationInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let participation = participation.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    diesel::insert_into(participations::table)
        .values(&participation)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new participation {:?}: {:?}", participation, e))?;

    let uri = yuri!(PARTICIPATION_API_ROOT, &participation.personal_id, &participation.activity_id);
    Ok(Created::new(uri).body(Json(Message::new("Participation added"))))
}

#[delete("/<personal_id>/<activity_id>")]
async fn api_participation_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    personal_id: &str,
    activity_id: &str,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = diesel::delete(participations::table.find((personal_id, activity_id)))
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to delete participation {:?}/{:?}: {:?}", personal_id, activity_id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Participation"));
    }

    Ok(Json(Message::new("Participation removed")))
}
