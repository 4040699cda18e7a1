//! End to end tests against a real PostgreSQL database. They only run when
//! `CMMS_TEST_DATABASE_URL` points at a database the tests may write to.

use cmms_common::people::Person;
use cmms_common::{Message, RecordId, ROLE_HEADER};
use cmms_server::build_rocket;
use cmms_server::config::{Config, Database};
use cmms_server::db;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

fn client_with(configure: impl FnOnce(&mut Config)) -> Option<Client> {
    let uri = std::env::var("CMMS_TEST_DATABASE_URL").ok()?;

    let mut config = Config { database: Database { uri: Some(uri), ..Default::default() }, ..Default::default() };
    configure(&mut config);

    let connection = db::establish(&config.database).expect("test database should be reachable");
    let figment = rocket::Config::figment().merge(("log_level", "off"));
    Some(Client::tracked(build_rocket(figment, config, connection)).expect("valid rocket instance"))
}

fn client() -> Option<Client> {
    client_with(|_| {})
}

/// A key no other test run will have used
fn unique(prefix: &str) -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("{}{}", prefix, nanos)
}

fn post<'c>(client: &'c Client, path: &str, body: Value) -> LocalResponse<'c> {
    client.post(path.to_owned()).header(ContentType::JSON).body(body.to_string()).dispatch()
}

/// Creates a row with a serial key and hands back that key
fn create_serial(client: &Client, path: &str, body: Value) -> i32 {
    let response = post(client, path, body);
    assert_eq!(response.status(), Status::Created);

    match response.into_json::<Message>().unwrap().id {
        Some(RecordId::Serial(id)) => id,
        other => panic!("expected a serial id, got {:?}", other),
    }
}

fn create_person(client: &Client, id: &str, name: &str) {
    assert_eq!(post(client, "/api/persons", json!({ "personal_id": id, "name": name })).status(), Status::Created);
}

fn list(client: &Client, path: &str) -> Vec<Value> {
    match client.get(path.to_owned()).dispatch().into_json::<Value>() {
        Some(Value::Array(rows)) => rows,
        other => panic!("expected a list from {}, got {:?}", path, other),
    }
}

#[test]
fn health_check() {
    let Some(client) = client() else { return };

    let response = client.get("/api/health").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_json::<Value>().unwrap(), json!({ "status": "healthy" }));
}

#[test]
fn unknown_paths_get_json_errors() {
    let Some(client) = client() else { return };

    let response = client.get("/api/nothing-here").dispatch();
    assert_eq!(response.status(), Status::NotFound);
    assert!(response.into_json::<Value>().unwrap()["error"].is_string());
}

#[test]
fn person_lifecycle() {
    let Some(client) = client() else { return };
    let id = unique("T");

    let response = client
        .post("/api/persons")
        .header(ContentType::JSON)
        .body(json!({ "personal_id": id, "name": "Test Person", "age": "41" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Created);
    let message: Message = response.into_json().unwrap();
    assert_eq!(message.message, "Person created");
    assert_eq!(message.id, Some(RecordId::Text(id.to_owned())));

    let person: Person = client.get(format!("/api/persons/{}", id)).dispatch().into_json().unwrap();
    assert_eq!(person.name, "Test Person");
    assert_eq!(person.age, Some(41));

    let response = client
        .put(format!("/api/persons/{}", id))
        .header(ContentType::JSON)
        .body(json!({ "name": "Renamed Person" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = client.put(format!("/api/persons/{}", id)).header(ContentType::JSON).body("{}").dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    assert_eq!(client.delete(format!("/api/persons/{}", id)).dispatch().status(), Status::Ok);
    assert_eq!(client.get(format!("/api/persons/{}", id)).dispatch().status(), Status::NotFound);
    assert_eq!(client.delete(format!("/api/persons/{}", id)).dispatch().status(), Status::NotFound);
}

#[test]
fn missing_fields_are_rejected() {
    let Some(client) = client() else { return };

    let response = client
        .post("/api/persons")
        .header(ContentType::JSON)
        .body(json!({ "name": "No Id" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(response.into_json::<Value>().unwrap()["error"], "Missing required field: personal_id");
}

#[test]
fn roles_are_enforced() {
    let Some(client) = client_with(|config| config.enforce_roles = true) else { return };

    assert_eq!(client.get("/api/persons").dispatch().status(), Status::Unauthorized);

    let staff = Header::new(ROLE_HEADER, "Staff");
    assert_eq!(client.get("/api/persons").header(staff.clone()).dispatch().status(), Status::Ok);
    assert_eq!(client.get("/api/reports/overview").header(staff.clone()).dispatch().status(), Status::Forbidden);

    let response = client
        .post("/api/persons")
        .header(staff)
        .header(ContentType::JSON)
        .body(json!({ "personal_id": unique("S"), "name": "Nope" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let role: Value = client.get("/api/auth").header(Header::new(ROLE_HEADER, "executive")).dispatch().into_json().unwrap();
    assert_eq!(role["role"], "Executive");
}

#[test]
fn duplicate_supervision_conflicts() {
    let Some(client) = client() else { return };
    let id = unique("M");
    let building = unique("Block ");

    client
        .post("/api/persons")
        .header(ContentType::JSON)
        .body(json!({ "personal_id": id, "name": "Test Manager" }).to_string())
        .dispatch();

    let assign = || {
        client
            .post("/api/building-supervision")
            .header(ContentType::JSON)
            .body(json!({ "personal_id": id, "building": building }).to_string())
            .dispatch()
            .status()
    };
    assert_eq!(assign(), Status::Created);
    assert_eq!(assign(), Status::Conflict);

    let listed: Value = client.get(format!("/api/building-supervision/by-manager/{}", id)).dispatch().into_json().unwrap();
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(listed["data"][0]["manager_name"], "Test Manager");

    // removing the person takes their supervisions with them
    assert_eq!(client.delete(format!("/api/persons/{}", id)).dispatch().status(), Status::Ok);
}

#[test]
fn bulk_import_rejects_bad_items() {
    let Some(client) = client() else { return };

    let response = client
        .post("/api/import")
        .header(ContentType::JSON)
        .body(json!({ "entity": "persons", "items": "P001" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(response.into_json::<Value>().unwrap()["error"], "items must be a list");

    let response = client
        .post("/api/import")
        .header(ContentType::JSON)
        .body(json!({ "entity": "invoices", "items": [{}] }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(response.into_json::<Value>().unwrap()["error"], "Unsupported entity: invoices");
}

#[test]
fn bulk_import_is_all_or_nothing() {
    let Some(client) = client() else { return };
    let first = unique("B");
    let second = unique("C");

    let response = client
        .post("/api/import")
        .header(ContentType::JSON)
        .body(
            json!({
                "entity": "persons",
                "items": [
                    { "personal_id": first, "name": "First" },
                    { "personal_id": second, "name": "Second", "supervisor_id": "nobody-has-this-id" }
                ]
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(client.get(format!("/api/persons/{}", first)).dispatch().status(), Status::NotFound);

    let response = client
        .post("/api/import")
        .header(ContentType::JSON)
        .body(json!({ "entity": "persons", "items": [{ "personal_id": first, "name": "First" }] }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Created);
    assert_eq!(response.into_json::<Value>().unwrap()["message"], "Imported 1 items into persons");

    client.delete(format!("/api/persons/{}", first)).dispatch();
}

#[test]
fn pdf_report() {
    let Some(client) = client() else { return };

    let response = client
        .post("/api/reports/generate-pdf")
        .header(ContentType::JSON)
        .body(json!({ "sections": [] }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .post("/api/reports/generate-pdf")
        .header(ContentType::JSON)
        .body(json!({ "sections": ["executive_summary", "safety"] }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::PDF));

    let disposition = response.headers().get_one("Content-Disposition").unwrap().to_owned();
    assert!(disposition.starts_with("attachment; filename=\"CMMS_Report_"));
    assert!(response.into_bytes().unwrap().starts_with(b"%PDF"));
}

#[test]
fn query_console_is_off_by_default() {
    let Some(client) = client() else { return };

    let response = client
        .post("/api/query")
        .header(ContentType::JSON)
        .body(json!({ "query": "SELECT 1" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);
}

#[test]
fn query_console_returns_rows() {
    let Some(client) = client_with(|config| config.query_console = true) else { return };

    let rows: Value = client
        .post("/api/query")
        .header(ContentType::JSON)
        .body(json!({ "query": "SELECT 1 AS one;" }).to_string())
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(rows, json!([{ "one": 1 }]));

    let response = client.post("/api/query").header(ContentType::JSON).body(json!({ "query": " " }).to_string()).dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn profiles_respect_role_limits() {
    let role = unique("Limited Role ");
    let limited = role.to_owned();
    let Some(client) = client_with(move |config| {
        config.role_limits.insert(limited, 2);
    }) else {
        return;
    };

    let people = [unique("L1-"), unique("L2-"), unique("L3-")];
    for id in &people {
        create_person(&client, id, "Limited Person");
    }

    for id in &people[..2] {
        let response = post(&client, "/api/profiles", json!({ "personal_id": id, "job_role": role }));
        assert_eq!(response.status(), Status::Created);
    }

    let response = post(&client, "/api/profiles", json!({ "personal_id": people[2], "job_role": role }));
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(
        response.into_json::<Value>().unwrap()["error"],
        format!("Limit reached for role '{}' (max 2)", role)
    );

    // a profile already in the role does not count against itself
    let response = client
        .put(format!("/api/profiles/{}", people[0]))
        .header(ContentType::JSON)
        .body(json!({ "job_role": role, "status": "On Leave" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = post(&client, "/api/profiles", json!({ "personal_id": people[2], "job_role": "Unlimited Role" }));
    assert_eq!(response.status(), Status::Created);
    let response = client
        .put(format!("/api/profiles/{}", people[2]))
        .header(ContentType::JSON)
        .body(json!({ "job_role": role }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    for id in &people {
        client.delete(format!("/api/persons/{}", id)).dispatch();
    }
}

#[test]
fn deleting_a_person_cleans_up_after_them() {
    let Some(client) = client() else { return };
    let organiser = unique("O");
    let attendee = unique("A");
    let supervisee = unique("S");
    let activity = unique("ACT");

    create_person(&client, &organiser, "Organiser");
    create_person(&client, &attendee, "Attendee");
    let response = post(
        &client,
        "/api/persons",
        json!({ "personal_id": supervisee, "name": "Supervisee", "supervisor_id": organiser }),
    );
    assert_eq!(response.status(), Status::Created);

    let response = post(&client, "/api/activities", json!({ "activity_id": activity, "organiser_id": organiser }));
    assert_eq!(response.status(), Status::Created);
    let response = post(&client, "/api/participations", json!({ "personal_id": attendee, "activity_id": activity }));
    assert_eq!(response.status(), Status::Created);

    assert_eq!(client.delete(format!("/api/persons/{}", organiser)).dispatch().status(), Status::Ok);

    assert!(!list(&client, "/api/activities").iter().any(|row| row["activity_id"] == activity));
    assert!(!list(&client, "/api/participations").iter().any(|row| row["activity_id"] == activity));

    let person: Person = client.get(format!("/api/persons/{}", supervisee)).dispatch().into_json().unwrap();
    assert_eq!(person.supervisor_id, None);

    client.delete(format!("/api/persons/{}", attendee)).dispatch();
    client.delete(format!("/api/persons/{}", supervisee)).dispatch();
}

#[test]
fn locations_with_maintenance_cannot_be_deleted() {
    let Some(client) = client() else { return };

    let location = create_serial(&client, "/api/locations", json!({ "building": unique("Block "), "room": "101" }));
    let task = create_serial(&client, "/api/maintenance", json!({ "type": "Repair", "location_id": location }));

    let response = client.delete(format!("/api/locations/{}", location)).dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(response.into_json::<Value>().unwrap()["error"], "Cannot delete location with 1 maintenance task(s)");

    assert_eq!(client.delete(format!("/api/maintenance/{}", task)).dispatch().status(), Status::Ok);
    assert_eq!(client.delete(format!("/api/locations/{}", location)).dispatch().status(), Status::Ok);
    assert_eq!(client.delete(format!("/api/locations/{}", location)).dispatch().status(), Status::NotFound);
    assert_eq!(client.delete(format!("/api/locations/{}", i32::MAX)).dispatch().status(), Status::NotFound);
}

#[test]
fn deleting_a_school_detaches_its_people_and_rooms() {
    let Some(client) = client() else { return };
    let department = unique("D");
    let member = unique("F");

    let response = post(&client, "/api/schools", json!({ "department": department, "school_name": "Test School" }));
    assert_eq!(response.status(), Status::Created);
    create_person(&client, &member, "Faculty Member");
    let response = post(&client, "/api/affiliations", json!({ "personal_id": member, "department": department }));
    assert_eq!(response.status(), Status::Created);
    let location = create_serial(
        &client,
        "/api/locations",
        json!({ "building": unique("Block "), "department": department }),
    );

    assert_eq!(client.delete(format!("/api/schools/{}", department)).dispatch().status(), Status::Ok);

    assert!(!list(&client, "/api/affiliations").iter().any(|row| row["department"] == department));
    let locations = list(&client, "/api/locations");
    let room = locations.iter().find(|row| row["location_id"] == location).expect("location survives its school");
    assert!(room["department"].is_null());

    client.delete(format!("/api/locations/{}", location)).dispatch();
    client.delete(format!("/api/persons/{}", member)).dispatch();
}

#[test]
fn deleting_an_activity_removes_its_participations() {
    let Some(client) = client() else { return };
    let organiser = unique("O");
    let activity = unique("ACT");

    create_person(&client, &organiser, "Organiser");
    let response = post(&client, "/api/activities", json!({ "activity_id": activity, "organiser_id": organiser }));
    assert_eq!(response.status(), Status::Created);
    let response = post(&client, "/api/participations", json!({ "personal_id": organiser, "activity_id": activity }));
    assert_eq!(response.status(), Status::Created);

    assert_eq!(client.delete(format!("/api/activities/{}", activity)).dispatch().status(), Status::Ok);
    assert!(!list(&client, "/api/participations").iter().any(|row| row["activity_id"] == activity));
    assert_eq!(client.delete(format!("/api/activities/{}", activity)).dispatch().status(), Status::NotFound);

    client.delete(format!("/api/persons/{}", organiser)).dispatch();
}

#[test]
fn deleting_a_company_unassigns_its_tasks() {
    let Some(client) = client() else { return };

    let company = create_serial(&client, "/api/external-companies", json!({ "name": unique("Contractor ") }));
    let location = create_serial(&client, "/api/locations", json!({ "building": unique("Block ") }));
    let task = create_serial(
        &client,
        "/api/maintenance",
        json!({ "type": "Repair", "location_id": location, "contracted_company_id": company }),
    );

    assert_eq!(client.delete(format!("/api/external-companies/{}", company)).dispatch().status(), Status::Ok);

    let tasks = list(&client, "/api/maintenance");
    let row = tasks.iter().find(|row| row["maintenance_id"] == task).expect("task survives its contractor");
    assert!(row["contracted_company_id"].is_null());

    client.delete(format!("/api/maintenance/{}", task)).dispatch();
    client.delete(format!("/api/locations/{}", location)).dispatch();
}

#[test]
fn safety_search_covers_whole_end_day() {
    let Some(client) = client_with(|config| config.query_console = true) else { return };
    let building = unique("SafetyBlock");

    let location = create_serial(&client, "/api/locations", json!({ "building": building, "room": "G01" }));
    let task = |kind: &str, chemical: bool, time: &str| {
        create_serial(
            &client,
            "/api/maintenance",
            json!({ "type": kind, "location_id": location, "active_chemical": chemical, "scheduled_time": time }),
        )
    };
    let morning = task("Cleaning", false, "2031-05-10 09:00");
    let late = task("Cleaning", true, "2031-05-10 23:59");
    let next_day = task("Cleaning", true, "2031-05-11 00:00");
    let repair = task("Repair", false, "2031-05-10 12:00");

    // forms cannot send fractional seconds, so push one task to the last instant of the day directly
    let response = post(
        &client,
        "/api/query",
        json!({
            "query": format!(
                "UPDATE maintenance_tasks SET scheduled_time = '2031-05-10 23:59:59.5' WHERE maintenance_id = {}",
                late
            )
        }),
    );
    assert_eq!(response.status(), Status::Ok);

    let found = list(
        &client,
        &format!("/api/search/safety?building={}&start_time=2031-05-10&end_time=2031-05-10", building),
    );
    let ids: Vec<Option<i64>> = found.iter().map(|row| row["maintenance_id"].as_i64()).collect();
    assert_eq!(ids, vec![Some(i64::from(morning)), Some(i64::from(late))]);

    assert!(found[0].get("warning").is_none());
    assert!(found[1]["warning"].as_str().is_some_and(|warning| warning.contains("Hazardous")));

    let found = list(&client, &format!("/api/search/safety?building={}", building));
    assert_eq!(found.len(), 3);

    let response = client
        .get(format!("/api/search/safety?building={}&start_time=2031-05-11&end_time=2031-05-10", building))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    for id in [morning, late, next_day, repair] {
        client.delete(format!("/api/maintenance/{}", id)).dispatch();
    }
    client.delete(format!("/api/locations/{}", location)).dispatch();
}

#[test]
fn manager_buildings_count_shared_buildings_once() {
    let Some(client) = client() else { return };
    let building = unique("Shared Block ");
    let managers = [unique("M1-"), unique("M2-")];

    let location = create_serial(&client, "/api/locations", json!({ "building": building }));
    let task = create_serial(
        &client,
        "/api/maintenance",
        json!({ "type": "Cleaning", "location_id": location, "active_chemical": true }),
    );
    for id in &managers {
        create_person(&client, id, "Shared Manager");
        let response = post(&client, "/api/building-supervision", json!({ "personal_id": id, "building": building }));
        assert_eq!(response.status(), Status::Created);
    }

    let report: Value = client.get("/api/reports/manager-buildings").dispatch().into_json().unwrap();
    let data = report["data"].as_array().expect("report data is a list");

    for id in &managers {
        let manager = data.iter().find(|row| row["personal_id"] == id.as_str()).expect("manager is listed");
        assert_eq!(manager["buildings"][0]["building"], building.as_str());
        assert_eq!(manager["buildings"][0]["maintenance_count"], 1);
        assert_eq!(manager["buildings"][0]["chemical_maintenance_count"], 1);
    }

    // the totals are built from distinct buildings across the whole report
    let mut distinct = std::collections::BTreeMap::new();
    for manager in data {
        for supervised in manager["buildings"].as_array().into_iter().flatten() {
            distinct.insert(
                supervised["building"].to_string(),
                supervised["maintenance_count"].as_i64().unwrap_or_default(),
            );
        }
    }
    assert_eq!(report["summary"]["total_managers"], data.len());
    assert_eq!(report["summary"]["total_buildings"], distinct.len());
    assert_eq!(report["summary"]["total_maintenance"], distinct.values().sum::<i64>());

    for id in &managers {
        client.delete(format!("/api/persons/{}", id)).dispatch();
    }
    client.delete(format!("/api/maintenance/{}", task)).dispatch();
    client.delete(format!("/api/locations/{}", location)).dispatch();
}

#[test]
fn summary_reports_include_new_rows() {
    let Some(client) = client() else { return };
    let building = unique("Report Block ");
    let department = unique("RD");
    let organiser = unique("RO");
    let activity = unique("RACT");

    let location = create_serial(&client, "/api/locations", json!({ "building": building }));
    let task = create_serial(
        &client,
        "/api/maintenance",
        json!({ "type": "Inspection", "frequency": "Monthly", "location_id": location }),
    );
    let response = post(&client, "/api/schools", json!({ "department": department, "school_name": "Report School" }));
    assert_eq!(response.status(), Status::Created);
    create_person(&client, &organiser, "Report Organiser");
    let response = post(&client, "/api/profiles", json!({ "personal_id": organiser, "job_role": "Report Role" }));
    assert_eq!(response.status(), Status::Created);
    let response = post(&client, "/api/activities", json!({ "activity_id": activity, "organiser_id": organiser }));
    assert_eq!(response.status(), Status::Created);

    let maintenance = list(&client, "/api/reports/maintenance-summary");
    assert!(maintenance.iter().any(|row| row["building"] == building.as_str() && row["count"] == 1));

    let people = list(&client, "/api/reports/people-summary");
    assert!(people.iter().any(|row| row["job_role"] == "Report Role" && row["count"].as_i64() >= Some(1)));

    let activities = list(&client, "/api/reports/activities-summary");
    assert!(activities.iter().any(|row| row["organiser_name"] == "Report Organiser"));

    let schools = list(&client, "/api/reports/school-stats");
    let school = schools.iter().find(|row| row["department"] == department.as_str()).expect("school is listed");
    assert_eq!(school["affiliated_people"], 0);
    assert_eq!(school["locations_count"], 0);

    let frequency = list(&client, "/api/reports/maintenance-frequency");
    assert!(frequency.iter().any(|row| row["frequency"] == "Monthly" && row["type"] == "Inspection"));

    let overview: Value = client.get("/api/reports/overview").dispatch().into_json().unwrap();
    for total in ["total_persons", "total_schools", "total_activities", "total_maintenance"] {
        assert!(overview[total].as_i64() >= Some(1), "{} should count the new rows", total);
    }

    client.delete(format!("/api/persons/{}", organiser)).dispatch();
    client.delete(format!("/api/schools/{}", department)).dispatch();
    client.delete(format!("/api/maintenance/{}", task)).dispatch();
    client.delete(format!("/api/locations/{}", location)).dispatch();
}
