use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

use visitbook::calendar::SlotCalendar;
use visitbook::engine::Engine;
use visitbook::identity::{AccountDirectory, IdentityProvider};
use visitbook::model::{Account, AccountId, Role};
use visitbook::service::ReservationService;
use visitbook::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("visitbook_wire_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let engine = Arc::new(Engine::new(dir.join("reservations.wal")).unwrap());

    let accounts = AccountDirectory::new();
    for (id, first, role, token) in [
        (1, "Anna", Role::User, "anna-token"),
        (2, "Jan", Role::User, "jan-token"),
        (3, "Ewa", Role::Admin, "admin-token"),
    ] {
        let account = Account {
            id: AccountId(id),
            first_name: first.into(),
            last_name: "Tester".into(),
            email: format!("{}@example.com", first.to_lowercase()),
        };
        accounts.insert(account, role, token).unwrap();
    }
    let accounts = Arc::new(accounts);
    let identities: Arc<dyn IdentityProvider> = accounts.clone();
    let service = Arc::new(ReservationService::new(engine, accounts, SlotCalendar::default()));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let service = service.clone();
            let identities = identities.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, service, identities).await;
            });
        }
    });

    addr
}

async fn connect(addr: SocketAddr) -> Framed<TcpStream, LinesCodec> {
    let socket = TcpStream::connect(addr).await.unwrap();
    Framed::new(socket, LinesCodec::new())
}

async fn call(conn: &mut Framed<TcpStream, LinesCodec>, request: Value) -> Value {
    conn.send(request.to_string()).await.unwrap();
    let line = conn.next().await.unwrap().unwrap();
    serde_json::from_str(&line).unwrap()
}

fn book(token: &str, time: &str, guests: u32) -> Value {
    json!({
        "op": "book",
        "token": token,
        "date": "2024-09-01",
        "time": time,
        "numberOfGuests": guests,
    })
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn book_then_slot_shows_taken() {
    let addr = start_test_server().await;
    let mut conn = connect(addr).await;

    let slots = call(&mut conn, json!({"op": "availableSlots", "date": "2024-09-01"})).await;
    let slots = slots["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 6);
    assert!(slots.iter().all(|s| s["available"] == true));

    let booked = call(&mut conn, book("anna-token", "11:00", 2)).await;
    assert!(booked["booked"]["id"].is_string());

    let slots = call(&mut conn, json!({"op": "availableSlots", "date": "2024-09-01"})).await;
    let flags: Vec<(String, bool)> = slots["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| (s["time"].as_str().unwrap().to_string(), s["available"].as_bool().unwrap()))
        .collect();
    assert_eq!(flags[1], ("11:00:00".to_string(), false));
    assert_eq!(flags.iter().filter(|(_, free)| *free).count(), 5);

    let again = call(&mut conn, book("jan-token", "11:00", 4)).await;
    assert_eq!(again["error"]["code"], "slot_taken");
}

#[tokio::test]
async fn auth_errors() {
    let addr = start_test_server().await;
    let mut conn = connect(addr).await;

    let anonymous = call(
        &mut conn,
        json!({"op": "book", "date": "2024-09-01", "time": "10:00", "numberOfGuests": 1}),
    )
    .await;
    assert_eq!(anonymous["error"]["code"], "unauthenticated");

    let forged = call(&mut conn, book("forged", "10:00", 1)).await;
    assert_eq!(forged["error"]["code"], "unauthenticated");

    let by_date = call(
        &mut conn,
        json!({"op": "byDate", "token": "anna-token", "date": "2024-09-01"}),
    )
    .await;
    assert_eq!(by_date["error"]["code"], "forbidden");
}

#[tokio::test]
async fn admin_lists_day_and_user_lists_own() {
    let addr = start_test_server().await;
    let mut conn = connect(addr).await;

    call(&mut conn, book("jan-token", "14:00", 3)).await;
    call(&mut conn, book("anna-token", "10:00", 1)).await;

    let listed = call(
        &mut conn,
        json!({"op": "byDate", "token": "admin-token", "date": "2024-09-01"}),
    )
    .await;
    let rows = listed["reservations"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["visitTime"], "10:00:00");
    assert_eq!(rows[0]["firstName"], "Anna");
    assert_eq!(rows[0]["userEmail"], "anna@example.com");
    assert_eq!(rows[1]["visitTime"], "14:00:00");
    assert_eq!(rows[1]["numberOfGuests"], 3);

    let mine = call(&mut conn, json!({"op": "mine", "token": "jan-token"})).await;
    let mine = mine["reservations"].as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["firstName"], "Jan");
}

#[tokio::test]
async fn malformed_requests_keep_connection_open() {
    let addr = start_test_server().await;
    let mut conn = connect(addr).await;

    let garbage = call(&mut conn, json!({"op": "teleport"})).await;
    assert_eq!(garbage["error"]["code"], "bad_request");

    conn.send("not json".to_string()).await.unwrap();
    let line = conn.next().await.unwrap().unwrap();
    let parsed: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["error"]["code"], "bad_request");

    let off_grid = call(&mut conn, book("anna-token", "11:30", 2)).await;
    assert_eq!(off_grid["error"]["code"], "invalid_slot");

    let empty_party = call(&mut conn, book("anna-token", "11:00", 0)).await;
    assert_eq!(empty_party["error"]["code"], "invalid_party_size");

    let slots = call(&mut conn, json!({"op": "availableSlots", "date": "2024-09-01"})).await;
    assert_eq!(slots["slots"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn concurrent_connections_single_winner() {
    let addr = start_test_server().await;

    let k = 16;
    let mut handles = Vec::new();
    for i in 0..k {
        let token = if i % 2 == 0 { "anna-token" } else { "jan-token" };
        handles.push(tokio::spawn(async move {
            let mut conn = connect(addr).await;
            call(&mut conn, book(token, "13:00", 1)).await
        }));
    }

    let mut ok = 0;
    let mut taken = 0;
    for h in handles {
        let resp = h.await.unwrap();
        if resp.get("booked").is_some() {
            ok += 1;
        } else if resp["error"]["code"] == "slot_taken" {
            taken += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(taken, k - 1);
}
