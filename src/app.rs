use std::net::SocketAddr;

use axum::{
    http::{Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, todos};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(todos::router())
        .route("/health", get(|| async { "ok" }))
        .fallback(unknown_route)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

async fn unknown_route(method: Method, uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status_code": 404,
            "error": format!("{} {} is not a valid resource path.", method, uri.path()),
        })),
    )
}

pub async fn serve(app: Router, bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr.parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, Response},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::storage::{testing::BrokenTokenStore, MemoryStore};

    fn app_with_users(users: BrokenTokenStore) -> Router {
        let state = AppState::from_parts(
            Arc::new(AppState::test_config()),
            Arc::new(users),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        build_app(state)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header("x-auth", t);
        }
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(req.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(res: Response<Body>) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_bytes(res: Response<Body>) -> Vec<u8> {
        to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    /// Registers a user and returns (token, user id).
    async fn register(app: &Router, email: &str, password: &str) -> (String, String) {
        let res = send(
            app,
            "POST",
            "/users",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let token = res.headers()["x-auth"].to_str().unwrap().to_string();
        let body = json_body(res).await;
        assert_eq!(body["token"], token.as_str());
        (token, body["user"]["id"].as_str().unwrap().to_string())
    }

    async fn create_todo(app: &Router, token: &str, text: &str) -> Value {
        let res = send(app, "POST", "/todos", Some(token), Some(json!({ "text": text }))).await;
        assert_eq!(res.status(), StatusCode::OK);
        json_body(res).await
    }

    #[tokio::test]
    async fn health() {
        let app = build_app(AppState::fake());
        let res = send(&app, "GET", "/health", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_bytes(res).await, b"ok");
    }

    #[tokio::test]
    async fn register_returns_public_user_only() {
        let app = build_app(AppState::fake());
        let res = send(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({ "email": "test3@noreply.com", "password": "test3pass" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-auth"));
        let body = json_body(res).await;
        let user = body["user"].as_object().unwrap();
        assert_eq!(user.len(), 2);
        assert_eq!(user["email"], "test3@noreply.com");
        assert!(user.get("password_hash").is_none());
        assert!(user.get("tokens").is_none());
    }

    #[tokio::test]
    async fn register_rejects_invalid_and_duplicate() {
        let app = build_app(AppState::fake());
        let res = send(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({ "email": "invalidemail.com", "password": "test3pass" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await["error"],
            "invalidemail.com is not a valid email"
        );

        let res = send(&app, "POST", "/users", None, Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        register(&app, "test1@example.com", "test1pass").await;
        let res = send(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({ "email": "test1@example.com", "password": "test3pass" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_and_me() {
        let app = build_app(AppState::fake());
        let (_, id) = register(&app, "test2@example.com", "test2pass").await;

        let res = send(
            &app,
            "POST",
            "/users/login",
            None,
            Some(json!({ "email": "test2@example.com", "password": "test2pass" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let token = res.headers()["x-auth"].to_str().unwrap().to_string();
        assert_eq!(json_body(res).await["user"]["id"], id.as_str());

        let res = send(&app, "GET", "/users/me", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["user"]["id"], id.as_str());
        assert_eq!(body["user"]["email"], "test2@example.com");

        // Authorization: Bearer works as well
        let req = Request::builder()
            .uri("/users/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_login_is_401_with_empty_body() {
        let app = build_app(AppState::fake());
        register(&app, "test2@example.com", "test2pass").await;

        for (email, password) in [("test2@example.com", "badpass"), ("nobody@example.com", "test2pass")] {
            let res = send(
                &app,
                "POST",
                "/users/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert!(res.headers().get("x-auth").is_none());
            assert!(body_bytes(res).await.is_empty());
        }
    }

    #[tokio::test]
    async fn unauthenticated_me_is_401_with_empty_body() {
        let app = build_app(AppState::fake());
        let res = send(&app, "GET", "/users/me", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(res).await.is_empty());

        let res = send(&app, "GET", "/users/me", Some("garbage"), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_revokes_only_that_token() {
        let app = build_app(AppState::fake());
        let (t1, _) = register(&app, "test1@example.com", "test1pass").await;
        let res = send(
            &app,
            "POST",
            "/users/login",
            None,
            Some(json!({ "email": "test1@example.com", "password": "test1pass" })),
        )
        .await;
        let t2 = res.headers()["x-auth"].to_str().unwrap().to_string();

        let res = send(&app, "DELETE", "/users/me/token", Some(&t1), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_bytes(res).await.is_empty());

        let res = send(&app, "GET", "/users/me", Some(&t1), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = send(&app, "GET", "/users/me", Some(&t2), None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn change_password_over_http() {
        let app = build_app(AppState::fake());
        let (token, _) = register(&app, "test1@example.com", "test1pass").await;

        let res = send(
            &app,
            "PATCH",
            "/users/me/password",
            Some(&token),
            Some(json!({ "current_password": "nope", "new_password": "newpass1" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(
            &app,
            "PATCH",
            "/users/me/password",
            Some(&token),
            Some(json!({ "current_password": "test1pass", "new_password": "newpass1" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(
            &app,
            "POST",
            "/users/login",
            None,
            Some(json!({ "email": "test1@example.com", "password": "newpass1" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn todo_crud() {
        let app = build_app(AppState::fake());
        let (token, user_id) = register(&app, "a@x.com", "secret1").await;

        let todo = create_todo(&app, &token, "Test todo text").await;
        assert_eq!(todo["text"], "Test todo text");
        assert_eq!(todo["completed"], false);
        assert!(todo["completed_at"].is_null());
        assert_eq!(todo["creator_id"], user_id.as_str());
        let id = todo["id"].as_str().unwrap().to_string();

        let res = send(&app, "POST", "/todos", Some(&token), Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = send(&app, "GET", "/todos", Some(&token), None).await;
        assert_eq!(json_body(res).await["todos"].as_array().unwrap().len(), 1);

        let res = send(&app, "GET", &format!("/todos/{id}"), Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["todo"]["text"], "Test todo text");

        let res = send(
            &app,
            "PATCH",
            &format!("/todos/{id}"),
            Some(&token),
            Some(json!({ "text": "Updated text", "completed": true })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let patched = json_body(res).await;
        assert_eq!(patched["todo"]["text"], "Updated text");
        assert_eq!(patched["todo"]["completed"], true);
        assert!(patched["todo"]["completed_at"].is_i64());

        let res = send(
            &app,
            "PATCH",
            &format!("/todos/{id}"),
            Some(&token),
            Some(json!({ "completed": "yes" })),
        )
        .await;
        let cleared = json_body(res).await;
        assert_eq!(cleared["todo"]["text"], "Updated text");
        assert_eq!(cleared["todo"]["completed"], false);
        assert!(cleared["todo"]["completed_at"].is_null());

        let res = send(&app, "DELETE", &format!("/todos/{id}"), Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["todo"]["id"], id.as_str());

        let res = send(&app, "DELETE", &format!("/todos/{id}"), Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_or_unknown_todo_id_is_404() {
        let app = build_app(AppState::fake());
        let (token, _) = register(&app, "a@x.com", "secret1").await;

        for method in ["GET", "DELETE", "PATCH"] {
            let body = (method == "PATCH").then(|| json!({ "completed": true }));
            let res = send(&app, method, "/todos/invalidid123", Some(&token), body.clone()).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND);

            let uri = format!("/todos/{}", uuid::Uuid::new_v4());
            let res = send(&app, method, &uri, Some(&token), body).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn other_users_todo_is_not_found() {
        let app = build_app(AppState::fake());
        let (t1, _) = register(&app, "a@x.com", "secret1").await;
        let res = send(
            &app,
            "POST",
            "/users/login",
            None,
            Some(json!({ "email": "a@x.com", "password": "secret1" })),
        )
        .await;
        let t1_login = res.headers()["x-auth"].to_str().unwrap().to_string();
        assert_ne!(t1, t1_login);

        let todo = create_todo(&app, &t1_login, "private").await;
        let id = todo["id"].as_str().unwrap();
        let (t2, _) = register(&app, "b@x.com", "secret2").await;

        let res = send(&app, "GET", &format!("/todos/{id}"), Some(&t2), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = send(
            &app,
            "PATCH",
            &format!("/todos/{id}"),
            Some(&t2),
            Some(json!({ "text": "mine now" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = send(&app, "DELETE", &format!("/todos/{id}"), Some(&t2), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = send(&app, "GET", "/todos", Some(&t2), None).await;
        assert!(json_body(res).await["todos"].as_array().unwrap().is_empty());

        // still intact for its owner
        let res = send(&app, "GET", &format!("/todos/{id}"), Some(&t1), None).await;
        assert_eq!(json_body(res).await["todo"]["text"], "private");
    }

    #[tokio::test]
    async fn todos_require_authentication() {
        let app = build_app(AppState::fake());
        let res = send(&app, "GET", "/todos", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(res).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_route_is_404_with_path() {
        let app = build_app(AppState::fake());
        let res = send(&app, "GET", "/nope", None, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = json_body(res).await;
        assert_eq!(body["status_code"], 404);
        assert_eq!(body["error"], "GET /nope is not a valid resource path.");
    }

    #[tokio::test]
    async fn mistyped_or_unlabelled_bodies_are_400_json() {
        let app = build_app(AppState::fake());
        let res = send(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({ "email": 5, "password": "secret1" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(res).await["error"].is_string());

        let req = Request::builder()
            .method("POST")
            .uri("/users/login")
            .body(Body::from(r#"{"email":"a@x.com","password":"secret1"}"#))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(res).await["error"].is_string());

        let (token, _) = register(&app, "a@x.com", "secret1").await;
        let res = send(&app, "POST", "/todos", Some(&token), Some(json!({ "text": 5 }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(res).await["error"].is_string());

        let todo = create_todo(&app, &token, "first").await;
        let uri = format!("/todos/{}", todo["id"].as_str().unwrap());
        let res = send(&app, "PATCH", &uri, Some(&token), Some(json!({ "text": true }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = send(
            &app,
            "PATCH",
            "/users/me/password",
            Some(&token),
            Some(json!({ "current_password": "secret1" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_store_failure_is_400_with_empty_body() {
        let app = app_with_users(BrokenTokenStore::failing_remove());
        let (token, _) = register(&app, "a@x.com", "secret1").await;

        let res = send(&app, "DELETE", "/users/me/token", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_bytes(res).await.is_empty());

        let res = send(&app, "GET", "/users/me", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn token_lookup_failure_is_401_with_empty_body() {
        let app = app_with_users(BrokenTokenStore::failing_lookup());
        let (token, _) = register(&app, "a@x.com", "secret1").await;

        let res = send(&app, "GET", "/users/me", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(res).await.is_empty());
    }
}
