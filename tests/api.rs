use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use macromate::{app::build_app, auth::jwt::JwtKeys, state::AppState};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    let app = build_app(AppState::fake());
    for (method, uri) in [
        ("GET", "/repas"),
        ("GET", "/repas/stats"),
        ("GET", "/food?name=nut"),
        ("GET", "/history/code"),
        ("POST", "/group/send"),
        ("GET", "/auth/users"),
    ] {
        let (status, body) = send(&app, json_request(method, uri, None, json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(body["message"], "Token not found");
    }
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = build_app(AppState::fake());
    let (status, body) = send(&app, json_request("GET", "/repas", Some("not.a.jwt"), json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let state = AppState::fake();
    let refresh = JwtKeys::from_ref(&state).sign_refresh(Uuid::new_v4()).unwrap();
    let app = build_app(state);
    let (status, _) = send(&app, json_request("GET", "/repas/stats", Some(&refresh), json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_cookie_is_accepted_as_credential_source() {
    let state = AppState::fake();
    let keys = JwtKeys::from_ref(&state);
    let refresh = keys.sign_refresh(Uuid::new_v4()).unwrap();
    let app = build_app(state);
    let req = Request::get("/repas")
        .header(header::COOKIE, format!("jwt={refresh}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn register_login_log_meal_and_read_stats(pool: PgPool) {
    let food_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO foods (id, code, product_name, allergens, sugars_100g, fat_100g,
                           saturated_fat_100g, carbohydrates_100g, fiber_100g, proteins_100g, salt_100g)
        VALUES ($1, '3017620422003', 'Nutella', 'en:milk,en:nuts', 56.3, 30.9, 10.6, 57.5, 0, 6.3, 0.107)
        "#,
    )
    .bind(food_id)
    .execute(&pool)
    .await
    .unwrap();

    let app = build_app(AppState::fake_with_pool(pool));

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({"name": "Ada", "email": "Ada@Example.com", "password": "secret1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exist");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({"email": "ada@example.com", "password": "secret1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/repas",
            Some(&token),
            json!({"foodId": food_id, "mealKind": "breakfast", "quantity": 50.0, "date": "2024-03-10T08:00:00Z"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["mealKind"], "breakfast");

    let (status, totals) = send(
        &app,
        json_request("GET", "/repas/stats?date=2024-03-10", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((totals["sugar"].as_f64().unwrap() - 28.15).abs() < 1e-9);
    assert!((totals["protein"].as_f64().unwrap() - 3.15).abs() < 1e-9);
    assert!((totals["fat"].as_f64().unwrap() - 15.45).abs() < 1e-9);

    let (status, totals) = send(
        &app,
        json_request("GET", "/repas/stats?date=2024-03-12", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(totals["sugar"].as_f64().unwrap(), 0.0);

    let (status, listed) = send(&app, json_request("GET", "/repas", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["food"]["product_name"], "Nutella");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn code_lookup_is_recorded_in_history(pool: PgPool) {
    let food_id = Uuid::new_v4();
    sqlx::query("INSERT INTO foods (id, code, product_name) VALUES ($1, '123', 'Oat milk')")
        .bind(food_id)
        .execute(&pool)
        .await
        .unwrap();

    let app = build_app(AppState::fake_with_pool(pool));
    send(
        &app,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({"name": "Bo", "email": "bo@example.com", "password": "secret1"}),
        ),
    )
    .await;
    let (_, body) = send(
        &app,
        json_request("POST", "/auth/login", None, json!({"email": "bo@example.com", "password": "secret1"})),
    )
    .await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, json_request("GET", "/history/code", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, food) = send(&app, json_request("GET", "/food/code?code=123", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(food["product_name"], "Oat milk");

    let (status, history) = send(&app, json_request("GET", "/history/code", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["product_name"], "Oat milk");
    assert_eq!(history[0]["value_id"], food_id.to_string());
}

/// Registers and logs in, returning the new user's id and access token.
async fn sign_up(app: &Router, name: &str, role: Option<&str>) -> (String, String) {
    let email = format!("{}@example.com", name.to_lowercase());
    let mut body = json!({"name": name, "email": email, "password": "secret1"});
    if let Some(role) = role {
        body["role"] = json!(role);
    }
    let (status, _) = send(app, json_request("POST", "/auth/register", None, body)).await;
    assert_eq!(status, StatusCode::CREATED, "register {name}");

    let (status, body) = send(
        app,
        json_request("POST", "/auth/login", None, json!({"email": email, "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login {name}");
    (
        body["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn group_management_is_limited_to_coach_and_admin(pool: PgPool) {
    let app = build_app(AppState::fake_with_pool(pool.clone()));
    let (coach, coach_token) = sign_up(&app, "Coach", Some("coach")).await;
    let (member, member_token) = sign_up(&app, "Mia", None).await;
    let (other, other_token) = sign_up(&app, "Otto", None).await;
    let (boss, boss_token) = sign_up(&app, "Boss", None).await;

    let (status, body) = send(
        &app,
        json_request("POST", "/group", Some(&coach_token), json!({"groupName": "Cut", "coach": member})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "The selected user is not a coach");

    let (status, group) = send(
        &app,
        json_request("POST", "/group", Some(&coach_token), json!({"groupName": "Cut", "coach": coach})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let gid = group["id"].as_str().unwrap().to_string();
    let members_uri = format!("/group/{gid}/members");
    let remove_uri = format!("/group/remove/{gid}");

    let (status, _) = send(
        &app,
        json_request("POST", &members_uri, Some(&other_token), json!({"members": [other]})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        json_request("POST", &members_uri, Some(&coach_token), json!({"members": [member, other]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group"]["members"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        json_request("POST", &members_uri, Some(&coach_token), json!({"members": [member]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "All members are already in the group");

    // A member may leave but not evict someone else.
    let (status, _) = send(
        &app,
        json_request("DELETE", &remove_uri, Some(&other_token), json!({"userId": member})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &app,
        json_request("DELETE", &remove_uri, Some(&other_token), json!({"userId": other})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        json_request("DELETE", &remove_uri, Some(&other_token), json!({"userId": other})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, json_request("GET", &format!("/group/{gid}"), Some(&other_token), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1::uuid")
        .bind(&boss)
        .execute(&pool)
        .await
        .unwrap();
    let (status, _) = send(
        &app,
        json_request("POST", &members_uri, Some(&boss_token), json!({"members": [other]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request("POST", "/group/send", Some(&member_token), json!({"groupId": gid, "content": "hi all"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, json_request("DELETE", &format!("/group/{gid}"), Some(&member_token), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, json_request("DELETE", &format!("/group/{gid}"), Some(&coach_token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let left: i64 = sqlx::query_scalar("SELECT count(*) FROM chat_messages WHERE group_id = $1::uuid")
        .bind(&gid)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(left, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn direct_messages_are_private_and_sender_owned(pool: PgPool) {
    let app = build_app(AppState::fake_with_pool(pool));
    let (ann, ann_token) = sign_up(&app, "Ann", None).await;
    let (ben, ben_token) = sign_up(&app, "Ben", None).await;
    let (_cy, cy_token) = sign_up(&app, "Cy", None).await;

    let (status, msg) = send(
        &app,
        json_request("POST", "/chat/send", Some(&ann_token), json!({"receiver": ben, "content": "lunch?"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = msg["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request("POST", "/chat/send", Some(&cy_token), json!({"sender": ann, "receiver": ben, "content": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        json_request("PUT", &format!("/chat/edit/{id}"), Some(&ben_token), json!({"content": "no"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You can only modify your own messages");
    let (status, _) = send(&app, json_request("DELETE", &format!("/chat/delete/{id}"), Some(&cy_token), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, edited) = send(
        &app,
        json_request("PUT", &format!("/chat/edit/{id}"), Some(&ann_token), json!({"content": "dinner?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"], "dinner?");

    let conversation = format!("/chat/conversation/{ann}/{ben}");
    let (status, _) = send(&app, json_request("GET", &conversation, Some(&cy_token), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, listed) = send(&app, json_request("GET", &conversation, Some(&ben_token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, json_request("DELETE", &format!("/chat/delete/{id}"), Some(&ann_token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, listed) = send(&app, json_request("GET", &conversation, Some(&ben_token), json!({}))).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_member_changes_are_all_applied(pool: PgPool) {
    use macromate::groups::repo;

    let coach = Uuid::new_v4();
    let (x, y, z) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let group = repo::create(&pool, coach, "Bulk").await.unwrap();

    let (xz, yz) = ([x, z], [y, z]);
    let (a, b) = tokio::join!(
        repo::add_members(&pool, group.id, &xz),
        repo::add_members(&pool, group.id, &yz),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    let group = repo::find(&pool, group.id).await.unwrap().unwrap();
    let mut members = group.members.clone();
    members.sort();
    let mut expected = vec![x, y, z];
    expected.sort();
    assert_eq!(members, expected);

    let (a, b) = tokio::join!(
        repo::remove_member(&pool, group.id, x),
        repo::remove_member(&pool, group.id, y),
    );
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());
    assert!(repo::remove_member(&pool, group.id, x).await.unwrap().is_none());

    let group = repo::find(&pool, group.id).await.unwrap().unwrap();
    assert_eq!(group.members, vec![z]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_email_insert_is_a_unique_violation(pool: PgPool) {
    use macromate::auth::repo_types::{NewUser, User};
    use macromate::error::is_unique_violation;

    let new = || NewUser {
        name: "Dup",
        email: "dup@example.com",
        password_hash: Some("hash"),
        provider: None,
        provider_id: None,
        role: "user",
        avatar: None,
    };
    User::create(&pool, new()).await.unwrap();
    let err = User::create(&pool, new()).await.unwrap_err();
    assert!(is_unique_violation(&err));
}
