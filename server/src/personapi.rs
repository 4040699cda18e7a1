use crate::auth::Requester;
use crate::config::Config;
use crate::db::{self, DbConnection};
use crate::error::ApiError;
use cmms_common::people::{
    check_role_capacity, role_limit, Person, PersonInput, PersonQuery, PersonUpdate, Profile, ProfileInput,
    ProfileListing, ProfileUpdate,
};
use cmms_common::roles::Permission;
use cmms_common::schema::{activities, affiliations, building_supervisions, participations, persons, profiles};
use cmms_common::{yuri, Message, PERSON_API_ROOT, PROFILE_API_ROOT};
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, QueryResult, RunQueryDsl, SelectableHelper};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{Route, State};
use std::ops::DerefMut;

pub fn get_person_api_routes() -> Vec<Route> {
    routes![api_person_fetch, api_person_get, api_person_create, api_person_update, api_person_delete]
}

pub fn get_profile_api_routes() -> Vec<Route> {
    routes![api_profile_fetch, api_profile_create, api_profile_update, api_profile_delete]
}

/// Lists persons, optionally searching by name.
#[get("/?<query..>")]
async fn api_person_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
    query: PersonQuery,
) -> Result<Json<Vec<Person>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let found = query
        .to_db_select()
        .select(Person::as_select())
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load SQL result for query {:?}: {:?}", query, e))?;

    Ok(Json(found))
}

#[get("/<id>")]
async fn api_person_get(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: &str,
) -> Result<Json<Person>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let person = persons::table
        .find(id)
        .select(Person::as_select())
        .first(db_connection.deref_mut())
        .map_err(|e| ApiError::from(e).naming("Person"))?;

    Ok(Json(person))
}

#[post("/", data = "<person>")]
async fn api_person_create(
    requester: Requester,
    db_connection: &State<DbConnection>,
    person: Json<PersonInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let person = person.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    diesel::insert_into(persons::table)
        .values(&person)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to save new person {:?}: {:?}", person, e))?;

    Ok(Created::new(yuri!(PERSON_API_ROOT, &person.personal_id))
        .body(Json(Message::created("Person created", person.personal_id))))
}

#[put("/<id>", data = "<update>")]
async fn api_person_update(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: &str,
    update: Json<PersonUpdate>,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Update)?;

    let changes = update.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let updated = diesel::update(persons::table.find(id))
        .set(&changes)
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to update person {:?} with {:?}: {:?}", id, changes, e))?;

    if updated == 0 {
        return Err(ApiError::NotFound("Person"));
    }

    Ok(Json(Message::new("Person updated")))
}

/// Deletes a person along with everything which can't exist without them. The
/// activities they organise go too, and anyone they supervise is left without
/// a supervisor.
#[delete("/<id>")]
async fn api_person_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: &str,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = db_connection
        .transaction(|conn| delete_person(conn, id))
        .inspect_err(|e| error!("Unable to delete person {:?}: {:?}", id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Person"));
    }

    Ok(Json(Message::new("Person deleted")))
}

fn delete_person(conn: &mut PgConnection, id: &str) -> QueryResult<usize> {
    diesel::delete(participations::table.filter(participations::personal_id.eq(id))).execute(conn)?;
    diesel::delete(affiliations::table.filter(affiliations::personal_id.eq(id))).execute(conn)?;
    diesel::delete(profiles::table.filter(profiles::personal_id.eq(id))).execute(conn)?;
    diesel::delete(building_supervisions::table.filter(building_supervisions::personal_id.eq(id))).execute(conn)?;

    // Activities they organise, and the participations in those
    let organised = activities::table.filter(activities::organiser_id.eq(id)).select(activities::activity_id);
    diesel::delete(participations::table.filter(participations::activity_id.eq_any(organised))).execute(conn)?;
    diesel::delete(activities::table.filter(activities::organiser_id.eq(id))).execute(conn)?;

    diesel::update(persons::table.filter(persons::supervisor_id.eq(id)))
        .set(persons::supervisor_id.eq(None::<String>))
        .execute(conn)?;

    diesel::delete(persons::table.find(id)).execute(conn)
}

/// Lists every profile with the name of the person it belongs to.
#[get("/")]
async fn api_profile_fetch(
    requester: Requester,
    db_connection: &State<DbConnection>,
) -> Result<Json<Vec<ProfileListing>>, ApiError> {
    requester.require(Permission::ViewEntities)?;

    let mut db_connection = db::lock(db_connection)?;
    let rows: Vec<(Profile, String)> = profiles::table
        .inner_join(persons::table)
        .select((Profile::as_select(), persons::name))
        .order(profiles::personal_id)
        .load(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to load profiles: {:?}", e))?;

    Ok(Json(rows.into_iter().map(|(profile, name)| ProfileListing { profile, name }).collect()))
}

/// Counts the profiles holding a job role, leaving out the given person.
fn count_in_role(conn: &mut PgConnection, job_role: &str, except: Option<&str>) -> QueryResult<i64> {
    let mut query = profiles::table.filter(profiles::job_role.eq(job_role)).into_boxed();

    if let Some(except) = except {
        query = query.filter(profiles::personal_id.ne(except));
    }

    query.count().get_result(conn)
}

#[post("/", data = "<profile>")]
async fn api_profile_create(
    requester: Requester,
    config: &State<Config>,
    db_connection: &State<DbConnection>,
    profile: Json<ProfileInput>,
) -> Result<Created<Json<Message>>, ApiError> {
    requester.require(Permission::Create)?;

    let profile = profile.into_inner().validate()?;
    let limit = role_limit(&config.role_limits, &profile.job_role);
    let mut db_connection = db::lock(db_connection)?;

    db_connection
        .transaction::<_, ApiError, _>(|conn| {
            if let Some(limit) = limit {
                check_role_capacity(&profile.job_role, limit, count_in_role(conn, &profile.job_role, None)?)?;
            }

            diesel::insert_into(profiles::table).values(&profile).execute(conn)?;
            Ok(())
        })
        .inspect_err(|e| error!("Unable to save new profile {:?}: {:?}", profile, e))?;

    Ok(Created::new(yuri!(PROFILE_API_ROOT, &profile.personal_id))
        .body(Json(Message::created("Profile created", profile.personal_id))))
}

/// Updates a profile. Moving it into a limited job role is subject to the same
/// capacity check as creating one.
#[put("/<id>", data = "<update>")]
async fn api_profile_update(
    requester: Requester,
    config: &State<Config>,
    db_connection: &State<DbConnection>,
    id: &str,
    update: Json<ProfileUpdate>,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Update)?;

    let changes = update.into_inner().validate()?;
    let mut db_connection = db::lock(db_connection)?;

    let updated = db_connection
        .transaction::<_, ApiError, _>(|conn| {
            if let Some(job_role) = changes.job_role.as_deref() {
                if let Some(limit) = role_limit(&config.role_limits, job_role) {
                    check_role_capacity(job_role, limit, count_in_role(conn, job_role, Some(id))?)?;
                }
            }

            Ok(diesel::update(profiles::table.find(id)).set(&changes).execute(conn)?)
        })
        .inspect_err(|e| error!("Unable to update profile {:?} with {:?}: {:?}", id, changes, e))?;

    if updated == 0 {
        return Err(ApiError::NotFound("Profile"));
    }

    Ok(Json(Message::new("Profile updated")))
}

#[delete("/<id>")]
async fn api_profile_delete(
    requester: Requester,
    db_connection: &State<DbConnection>,
    id: &str,
) -> Result<Json<Message>, ApiError> {
    requester.require(Permission::Delete)?;

    let mut db_connection = db::lock(db_connection)?;
    let deleted = diesel::delete(profiles::table.find(id))
        .execute(db_connection.deref_mut())
        .inspect_err(|e| error!("Unable to delete profile {:?}: {:?}", id, e))?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Profile"));
    }

    Ok(Json(Message::new("Profile deleted")))
}
