use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mafia_server::{app, utils::test_setup::test_state};
use serde_json::{json, Value};
use tower::ServiceExt;

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

async fn register_three(app: &Router) {
    for (id, name) in [("1", "Ann"), ("2", "Bob"), ("3", "Cid")] {
        let (status, body) = call(
            app,
            post(
                "/api/game/v1/register",
                json!({"player_id": id, "display_name": name}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }
}

#[tokio::test]
async fn test_register_and_view_state() {
    let app = app::create_app(test_state(false));
    register_three(&app).await;

    let (status, body) = call(&app, get("/api/game/v1/state")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "Lobby");
    assert_eq!(body["players"].as_array().unwrap().len(), 3);
    // roles never leak into the public view
    assert!(!body.to_string().contains("role"));

    let (status, body) = call(&app, get("/api/players/2/venue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["venue_id"], "v1");

    let (status, _) = call(&app, get("/api/players/99/venue")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_with_too_few_players() {
    let app = app::create_app(test_state(false));
    let (status, _) = call(
        &app,
        post(
            "/api/game/v2/register",
            json!({"player_id": "1", "display_name": "Ann"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, post("/api/game/v2/start", json!({"requester_id": "1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"]["InsufficientPlayers"]["min"], 3);
}

#[tokio::test]
async fn test_game_flow_over_http() {
    let app = app::create_app(test_state(false));
    register_three(&app).await;

    let (status, body) = call(&app, post("/api/game/v1/start", json!({"requester_id": "1"}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["message"].as_str().unwrap().contains("Ann"));

    let (status, body) = call(&app, get("/api/game/v1/role/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["message"].as_str().unwrap().is_empty());

    // voting is closed at night
    let (status, _) = call(
        &app,
        post(
            "/api/game/v1/vote",
            json!({"voter_id": "1", "target_id": "2"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, post("/api/game/v1/phase/next", json!({"requester_id": "1"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, get("/api/game/v1/state")).await;
    assert_eq!(body["phase"], "Day");

    let (status, body) = call(&app, post("/api/game/v1/end", json!({"requester_id": "1"}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = call(&app, get("/api/game/v1/state")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, get("/api/game/v1/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["force_ended"], true);

    let (status, body) = call(&app, get("/api/profile/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["games_played"], 1);
}

#[tokio::test]
async fn test_malformed_night_action() {
    let app = app::create_app(test_state(false));
    register_three(&app).await;
    call(&app, post("/api/game/v1/start", json!({"requester_id": "1"}))).await;

    let (status, _) = call(
        &app,
        post(
            "/api/game/v1/night-action",
            json!({"actor_id": "1", "target_id": "2", "kind": "fly"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_profile_of_new_player() {
    let app = app::create_app(test_state(false));
    let (status, body) = call(&app, get("/api/profile/nobody")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["games_played"], 0);
    assert_eq!(body["win_rate"], 0.0);
}
