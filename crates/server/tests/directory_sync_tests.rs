//! Directory reconciliation tests against a mocked remote API.
//!
//! Covers the pull direction (create/update/delete of the local mirror),
//! the push direction (RSVP field mapping), pagination and the
//! fire-and-forget sync worker.

use rsvp_reminder_service::{
    config::DirectoryConfig,
    directory::{DirectoryClient, PullStats, pull_directory, push_rsvp, spawn_sync_worker},
    entity::{guest, reminder_history, rsvp},
    error::SyncError,
    schedule::Stage,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, Set, Statement,
};
use time::{OffsetDateTime, macros::datetime};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIRECTORY_PATH: &str = "/v0/appTEST/Guests";

/// Create a test database with the engine's schema.
async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE guest (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT NULL,
            email TEXT NULL,
            token TEXT NOT NULL UNIQUE,
            language_preference TEXT NULL,
            has_plus_one BOOLEAN NOT NULL DEFAULT 0,
            plus_one_used BOOLEAN NOT NULL DEFAULT 0,
            is_family BOOLEAN NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create guest table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE rsvp (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guest_id INTEGER NOT NULL,
            is_attending BOOLEAN NOT NULL DEFAULT 0,
            is_cancelled BOOLEAN NOT NULL DEFAULT 0,
            adults_count INTEGER NOT NULL DEFAULT 1,
            children_count INTEGER NOT NULL DEFAULT 0,
            plus_one_name TEXT NULL,
            hotel_name TEXT NULL,
            transport_to_church BOOLEAN NOT NULL DEFAULT 0,
            transport_to_reception BOOLEAN NOT NULL DEFAULT 0,
            transport_to_hotel BOOLEAN NOT NULL DEFAULT 0,
            dietary_notes TEXT NULL,
            created_at TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            cancellation_date TEXT NULL
        );"#,
    ))
    .await
    .expect("create rsvp table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE reminder_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guest_id INTEGER NOT NULL,
            reminder_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            sent_to TEXT NULL,
            subject TEXT NULL,
            scheduled_for TEXT NULL,
            sent_at TEXT NULL,
            error_message TEXT NULL,
            sent_by TEXT NULL,
            notes TEXT NULL,
            created_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create reminder_history table");

    db
}

fn directory_client(base_url: &str) -> DirectoryClient {
    DirectoryClient::new(
        reqwest::Client::new(),
        DirectoryConfig {
            api_key: "keyTEST".into(),
            base_id: "appTEST".into(),
            table: "Guests".into(),
            api_base_url: base_url.trim_end_matches('/').into(),
        },
    )
}

async fn insert_guest(
    db: &DatabaseConnection,
    name: &str,
    phone: Option<&str>,
    token: &str,
) -> guest::Model {
    guest::ActiveModel {
        name: Set(name.to_owned()),
        phone: Set(phone.map(str::to_owned)),
        email: Set(None),
        token: Set(token.to_owned()),
        language_preference: Set(Some("es".to_owned())),
        has_plus_one: Set(false),
        plus_one_used: Set(false),
        is_family: Set(false),
        created_at: Set(OffsetDateTime::now_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert guest")
}

async fn insert_rsvp(db: &DatabaseConnection, guest_id: i32, attending: bool) -> rsvp::Model {
    let now = OffsetDateTime::now_utc();
    rsvp::ActiveModel {
        guest_id: Set(guest_id),
        is_attending: Set(attending),
        is_cancelled: Set(false),
        adults_count: Set(1),
        children_count: Set(0),
        plus_one_name: Set(None),
        hotel_name: Set(None),
        transport_to_church: Set(false),
        transport_to_reception: Set(false),
        transport_to_hotel: Set(false),
        dietary_notes: Set(None),
        created_at: Set(now),
        last_updated: Set(now),
        cancellation_date: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert rsvp")
}

#[tokio::test]
async fn pull_creates_updates_and_deletes() {
    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                {
                    "id": "recX",
                    "fields": {
                        "Name": "Xavier Soler",
                        "Phone": "+34611111111",
                        "Token": "tok-x",
                        "Language": "en",
                        "Status": "Attending",
                        "RSVP Date": "2026-04-06",
                        "Adults Count": 2,
                        "Children Count": 1,
                        "Hotel": "Hotel Mar",
                        "Transport Church": true
                    }
                },
                {
                    "id": "recZ",
                    "fields": {
                        "Name": "Zoe",
                        "Phone": "+34644444444",
                        "Status": "Pending"
                    }
                },
                {
                    "id": "recN",
                    "fields": {
                        "Name": "Nuria",
                        "Phone": "+34633333333",
                        "Status": "Pending"
                    }
                }
            ]
        })))
        .mount(&remote)
        .await;

    let db = create_test_db().await;
    let xavier = insert_guest(&db, "Xavier", Some("+34611111111"), "tok-x").await;
    let gone = insert_guest(&db, "Yolanda", Some("+34622222222"), "tok-y").await;
    insert_rsvp(&db, gone.id, true).await;
    let zoe = insert_guest(&db, "Zoe Vidal", Some("+34644444444"), "tok-z").await;

    // Ledger rows must survive local deletion.
    let now = OffsetDateTime::now_utc();
    reminder_history::ActiveModel {
        guest_id: Set(gone.id),
        reminder_type: Set("initial".to_owned()),
        status: Set("sent".to_owned()),
        sent_to: Set(Some("+34622222222".to_owned())),
        subject: Set(None),
        scheduled_for: Set(Some(now)),
        sent_at: Set(Some(now)),
        error_message: Set(None),
        sent_by: Set(Some("scheduler".to_owned())),
        notes: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let client = directory_client(&remote.uri());
    let stats = pull_directory(&db, &client).await.expect("pull");
    assert_eq!(
        stats,
        PullStats {
            created: 1,
            updated: 2,
            deleted: 1
        }
    );

    // Token match: identity fields follow the remote row and the RSVP
    // state is mirrored locally.
    let updated = guest::Entity::find_by_id(xavier.id)
        .one(&db)
        .await
        .unwrap()
        .expect("xavier still present");
    assert_eq!(updated.name, "Xavier Soler");
    assert_eq!(updated.language_preference.as_deref(), Some("en"));
    let response = rsvp::Entity::find()
        .filter(rsvp::Column::GuestId.eq(xavier.id))
        .one(&db)
        .await
        .unwrap()
        .expect("rsvp mirrored");
    assert!(response.is_attending);
    assert!(!response.is_cancelled);
    assert_eq!(response.adults_count, 2);
    assert_eq!(response.children_count, 1);
    assert_eq!(response.hotel_name.as_deref(), Some("Hotel Mar"));
    assert!(response.transport_to_church);
    assert_eq!(response.created_at, datetime!(2026-04-06 00:00 UTC));

    // Phone match: the token-less remote row found Zoe and kept her token.
    let zoe_after = guest::Entity::find_by_id(zoe.id)
        .one(&db)
        .await
        .unwrap()
        .expect("zoe still present");
    assert_eq!(zoe_after.name, "Zoe");
    assert_eq!(zoe_after.token, "tok-z");

    // Unmatched remote row became a local guest with a generated token.
    let nuria = guest::Entity::find()
        .filter(guest::Column::Name.eq("Nuria"))
        .one(&db)
        .await
        .unwrap()
        .expect("nuria created");
    assert_eq!(nuria.token.len(), 32);

    // Unmatched local guest is gone, along with her RSVP but not her ledger.
    assert!(
        guest::Entity::find_by_id(gone.id)
            .one(&db)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        rsvp::Entity::find()
            .filter(rsvp::Column::GuestId.eq(gone.id))
            .one(&db)
            .await
            .unwrap()
            .is_none()
    );
    let ledger = reminder_history::Entity::find()
        .filter(reminder_history::Column::GuestId.eq(gone.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn pull_follows_offset_pagination() {
    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .and(query_param("offset", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                {"id": "rec2", "fields": {"Name": "Pia", "Token": "tok-p2", "Status": "Pending"}}
            ]
        })))
        .with_priority(1)
        .mount(&remote)
        .await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                {"id": "rec1", "fields": {"Name": "Pol", "Token": "tok-p1", "Status": "Pending"}}
            ],
            "offset": "page2"
        })))
        .mount(&remote)
        .await;

    let db = create_test_db().await;
    let client = directory_client(&remote.uri());
    let stats = pull_directory(&db, &client).await.expect("pull");

    assert_eq!(stats.created, 2);
    assert_eq!(guest::Entity::find().all(&db).await.unwrap().len(), 2);
    assert_eq!(remote.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn push_maps_rsvp_fields_onto_the_remote_record() {
    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .and(query_param("filterByFormula", "{Token} = 'tok-ana'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                {"id": "recANA", "fields": {"Name": "Ana", "Token": "tok-ana", "Status": "Pending"}}
            ]
        })))
        .mount(&remote)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DIRECTORY_PATH}/recANA")))
        .and(body_partial_json(serde_json::json!({
            "fields": {
                "Status": "Attending",
                "RSVP Date": "2026-04-06",
                "Adults Count": 2,
                "Children Count": 1,
                "Hotel": "Hotel Sol",
                "Dietary Notes": "vegan",
                "Transport Church": true,
                "Transport Reception": false,
                "Transport Hotel": true
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&remote)
        .await;

    let db = create_test_db().await;
    let ana = insert_guest(&db, "Ana", Some("+34612345678"), "tok-ana").await;
    let when = datetime!(2026-04-06 10:30 UTC);
    rsvp::ActiveModel {
        guest_id: Set(ana.id),
        is_attending: Set(true),
        is_cancelled: Set(false),
        adults_count: Set(2),
        children_count: Set(1),
        plus_one_name: Set(None),
        hotel_name: Set(Some("Hotel Sol".to_owned())),
        transport_to_church: Set(true),
        transport_to_reception: Set(false),
        transport_to_hotel: Set(true),
        dietary_notes: Set(Some("vegan".to_owned())),
        created_at: Set(when),
        last_updated: Set(when),
        cancellation_date: Set(None),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let client = directory_client(&remote.uri());
    push_rsvp(&db, &client, "tok-ana").await.expect("push");

    remote.verify().await;
}

#[tokio::test]
async fn push_without_a_matching_remote_row_is_an_error() {
    let remote = MockServer::start().await;
    // Both the token and the phone lookup come back empty.
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "records": [] })),
        )
        .mount(&remote)
        .await;

    let db = create_test_db().await;
    let ana = insert_guest(&db, "Ana", Some("+34612345678"), "tok-ana").await;
    insert_rsvp(&db, ana.id, true).await;

    let client = directory_client(&remote.uri());
    let err = push_rsvp(&db, &client, "tok-ana").await.expect_err("no remote row");
    assert!(matches!(err, SyncError::MissingRemote(ref name) if name == "Ana"));

    // Unknown local tokens fail before any directory call.
    let err = push_rsvp(&db, &client, "tok-ghost").await.expect_err("no local guest");
    assert!(matches!(err, SyncError::MissingLocal(_)));
}

#[tokio::test]
async fn manual_stage_has_no_remote_marker() {
    let remote = MockServer::start().await;

    let client = directory_client(&remote.uri());
    client
        .mark_reminder_sent("rec001", Stage::Manual, OffsetDateTime::now_utc())
        .await
        .expect("no-op");

    assert!(remote.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_worker_survives_failed_jobs() {
    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .and(query_param("filterByFormula", "{Token} = 'tok-ana'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                {"id": "recANA", "fields": {"Name": "Ana", "Token": "tok-ana", "Status": "Pending"}}
            ]
        })))
        .with_priority(1)
        .mount(&remote)
        .await;
    // Any other lookup finds nothing.
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "records": [] })),
        )
        .mount(&remote)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DIRECTORY_PATH}/recANA")))
        .and(body_string_contains("Reminder 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&remote)
        .await;

    let db = create_test_db().await;
    let handle = spawn_sync_worker(db, directory_client(&remote.uri()));

    // The first job fails (unknown token); the worker logs it and moves on.
    handle.mark_reminder_sent("tok-ghost", Stage::Initial);
    handle.mark_reminder_sent("tok-ana", Stage::Initial);

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    remote.verify().await;
}
