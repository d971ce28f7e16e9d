use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use db::DBService;
use serde_json::{Value, json};
use services::services::{
    mailer::MemoryMailer,
    oauth::{OAuthClient, OAuthConfig},
};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{config::Config, middleware::rate_limit::client_key, routes, state::AppState};

struct TestApp {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

async fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::for_tests(dir.path().join("uploads"));
    configure(&mut config);

    let db = DBService::new_in_memory().await.unwrap();
    let oauth = config
        .oauth
        .clone()
        .map(|oauth| Arc::new(OAuthClient::new(oauth).unwrap()));
    let state = AppState::from_parts(db, &config, Arc::new(MemoryMailer::default()), oauth);
    state.projects.images().ensure_dir().await.unwrap();
    TestApp {
        app: routes::router(state.clone(), &config),
        state,
        _dir: dir,
    }
}

async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

/// An app with OAuth enabled against a provider that is never contacted
async fn oauth_test_app() -> TestApp {
    test_app_with(|config| {
        config.oauth = Some(OAuthConfig {
            provider: "github".to_string(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            auth_url: "http://127.0.0.1:9/authorize".to_string(),
            token_url: "http://127.0.0.1:9/token".to_string(),
            userinfo_url: "http://127.0.0.1:9/userinfo".to_string(),
            redirect_url: "http://localhost:3000/api/auth/oauth/callback".to_string(),
            scopes: vec!["read:user".to_string()],
        })
    })
    .await
}

fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        self.send(request.unwrap()).await
    }

    /// Register `username` and return its session token
    async fn register(&self, username: &str) -> String {
        let (status, _, body) = self
            .json(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "password": "correct horse",
                    "full_name": format!("{username} Example"),
                    "email": format!("{username}@example.com"),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn create_project(&self, token: &str, title: &str) -> String {
        let (status, _, body) = self
            .json(
                Method::POST,
                "/api/projects",
                Some(token),
                Some(json!({ "title": title, "category": "game_jam" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

fn multipart_upload(uri: &str, token: &str, files: &[(&str, &[u8])]) -> Request<Body> {
    let boundary = "collab-test-boundary";
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, _, body) = app.json(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], true);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = test_app().await;
    let (status, headers, body) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "ada",
                "password": "correct horse",
                "full_name": "Ada Lovelace",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "ada");
    assert!(body["data"]["user"].get("password_hash").is_none());
    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let (status, _, body) = app
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "ada", "password": "another pass", "full_name": "Imposter" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _, body) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ada", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid username or password.");

    let (status, _, body) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ada", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _, body) = app.json(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["full_name"], "Ada Lovelace");

    // the cookie works as well as the bearer header
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("session={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_need_a_session() {
    let app = test_app().await;
    let (status, _, _) = app.json(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = app
        .json(
            Method::POST,
            "/api/projects",
            Some("not-a-token"),
            Some(json!({ "title": "Sneaky" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_project_lifecycle() {
    let app = test_app().await;
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let id = app.create_project(&ada, "Robot Arm").await;

    let (status, _, body) = app
        .json(Method::GET, &format!("/api/projects/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Robot Arm");
    assert_eq!(body["data"]["owner"], "ada");
    assert_eq!(body["data"]["category"], "game_jam");
    assert_eq!(body["data"]["description"], "No description");

    let (status, _, _) = app
        .json(
            Method::PATCH,
            &format!("/api/projects/{id}"),
            Some(&bob),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .json(
            Method::PATCH,
            &format!("/api/projects/{id}"),
            Some(&ada),
            Some(json!({ "description": "Six axes", "deadline": "2030-01-01T00:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "Six axes");
    assert_eq!(body["data"]["title"], "Robot Arm");

    let (status, _, _) = app
        .json(Method::DELETE, &format!("/api/projects/{id}"), Some(&ada), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = app
        .json(Method::GET, &format!("/api/projects/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_browse_pagination() {
    let app = test_app().await;
    let ada = app.register("ada").await;
    for i in 0..12 {
        app.create_project(&ada, &format!("Project {i}")).await;
    }

    let (status, _, body) = app
        .json(Method::GET, "/api/projects?page=3&per_page=5", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["total"], 12);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["has_next"], false);
    assert_eq!(page["has_prev"], true);
    // newest first, so the last page holds the oldest projects
    assert_eq!(page["items"][1]["title"], "Project 0");

    let (_, _, body) = app
        .json(Method::GET, "/api/projects?page=9", None, None)
        .await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["total"], 12);

    let (_, _, body) = app
        .json(Method::GET, "/api/projects?category=hackathon", None, None)
        .await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_search() {
    let app = test_app().await;
    let ada = app.register("ada").await;
    app.create_project(&ada, "Rocket League Clone").await;
    app.create_project(&ada, "Pocket Garden").await;

    let (_, _, body) = app
        .json(Method::GET, "/api/search?q=OCKET", None, None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, _, body) = app.json(Method::GET, "/api/search?q=garden", None, None).await;
    assert_eq!(body["data"][0]["title"], "Pocket Garden");
    assert_eq!(body["data"][0]["owner"], "ada");

    let (status, _, body) = app.json(Method::GET, "/api/search?q=", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_collaborators_and_milestones() {
    let app = test_app().await;
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let eve = app.register("eve").await;
    let id = app.create_project(&ada, "Team effort").await;

    let (status, _, body) = app
        .json(
            Method::POST,
            &format!("/api/projects/{id}/collaborators"),
            Some(&ada),
            Some(json!({ "username": "bob" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let bob_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _, _) = app
        .json(
            Method::POST,
            &format!("/api/projects/{id}/collaborators"),
            Some(&ada),
            Some(json!({ "username": "bob" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = app
        .json(
            Method::POST,
            &format!("/api/projects/{id}/collaborators"),
            Some(&ada),
            Some(json!({ "username": "nobody" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = app
        .json(
            Method::POST,
            &format!("/api/projects/{id}/milestones"),
            Some(&bob),
            Some(json!({ "title": "Prototype" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let milestone_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _, _) = app
        .json(
            Method::POST,
            &format!("/api/projects/{id}/milestones"),
            Some(&eve),
            Some(json!({ "title": "Chaos" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .json(
            Method::PATCH,
            &format!("/api/projects/{id}/milestones/{milestone_id}"),
            Some(&ada),
            Some(json!({ "completed": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);

    let (_, _, body) = app
        .json(Method::GET, &format!("/api/projects/{id}"), None, None)
        .await;
    assert_eq!(body["data"]["collaborators"][0]["username"], "bob");
    assert_eq!(body["data"]["milestones"][0]["title"], "Prototype");

    // collaborators may leave a project themselves
    let (status, _, _) = app
        .json(
            Method::DELETE,
            &format!("/api/projects/{id}/collaborators/{bob_id}"),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = app
        .json(Method::GET, &format!("/api/projects/{id}/collaborators"), None, None)
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_image_upload_and_serving() {
    let app = test_app().await;
    let ada = app.register("ada").await;
    let id = app.create_project(&ada, "Gallery").await;

    let request = multipart_upload(
        &format!("/api/projects/{id}/images"),
        &ada,
        &[("my cat.png", &b"\x89PNG fake"[..]), ("virus.exe", &b"MZ"[..])],
    );
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["rejected"], json!(["virus.exe"]));
    let stored = body["data"]["saved"][0]["filename"].as_str().unwrap().to_string();
    assert!(stored.ends_with("_my_cat.png"));

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/{stored}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG fake");

    let (_, _, body) = app
        .json(Method::GET, &format!("/api/projects/{id}"), None, None)
        .await;
    assert_eq!(body["data"]["images"], json!([stored]));
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let app = test_app_with(|config| config.max_upload_bytes = 1024).await;
    let ada = app.register("ada").await;
    let id = app.create_project(&ada, "Big").await;

    let big = vec![0u8; 8 * 1024];
    let request = multipart_upload(&format!("/api/projects/{id}/images"), &ada, &[("big.png", &big[..])]);
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = test_app_with(|config| config.rate_limit_per_minute = 2).await;
    let attempt = json!({ "username": "ghost", "password": "whatever1" });
    let forwarded = |body: &Value| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    for _ in 0..2 {
        let (status, _, _) = app.send(forwarded(&attempt)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, headers, _) = app.send(forwarded(&attempt)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key(header::RETRY_AFTER));

    // reads are never limited
    for _ in 0..3 {
        let (status, _, _) = app.json(Method::GET, "/api/projects", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_client_key_prefers_session_user() {
    let app = test_app().await;
    let token = app.register("ada").await;
    let claims = app.state.auth.verify_session(&token).unwrap();

    let mut headers = HeaderMap::new();
    assert_eq!(client_key(&app.state, &headers, None), "anonymous");

    headers.insert("x-forwarded-for", "198.51.100.4".parse().unwrap());
    assert_eq!(client_key(&app.state, &headers, None), "ip:198.51.100.4");

    headers.insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
    assert_eq!(
        client_key(&app.state, &headers, None),
        format!("user:{}", claims.sub)
    );
}

#[tokio::test]
async fn test_oauth_disabled() {
    let app = test_app().await;
    let (status, _, _) = app
        .json(Method::GET, "/api/auth/oauth/login", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oauth_login_sets_short_lived_state_cookie() {
    let app = oauth_test_app().await;
    let (status, headers, _) = app
        .send(get_with_cookie("/api/auth/oauth/login", None))
        .await;
    assert!(status.is_redirection());

    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("http://127.0.0.1:9/authorize?"));

    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("oauth_state="));
    assert!(cookie.contains("Max-Age=600"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/api/auth/oauth"));

    let state = cookie["oauth_state=".len()..].split(';').next().unwrap();
    assert!(location.contains(&format!("state={state}")));
}

#[tokio::test]
async fn test_oauth_callback_rejects_bad_requests() {
    let app = oauth_test_app().await;
    let cases = [
        // no state cookie at all
        ("/api/auth/oauth/callback?code=abc&state=xyz", None),
        // state does not match the cookie
        (
            "/api/auth/oauth/callback?code=abc&state=xyz",
            Some("oauth_state=something-else"),
        ),
        // state missing from the query
        ("/api/auth/oauth/callback?code=abc", Some("oauth_state=xyz")),
        // provider refused
        (
            "/api/auth/oauth/callback?error=access_denied&state=xyz",
            Some("oauth_state=xyz"),
        ),
        // matching state but no code
        ("/api/auth/oauth/callback?state=xyz", Some("oauth_state=xyz")),
    ];

    for (uri, cookie) in cases {
        let (status, headers, body) = app.send(get_with_cookie(uri, cookie)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
        assert_eq!(body["success"], false, "{uri}");
        assert!(body["message"].is_string(), "{uri}");
        assert!(headers.get(header::SET_COOKIE).is_none(), "{uri}");
    }
}

#[tokio::test]
async fn test_malformed_requests_use_the_error_envelope() {
    let app = test_app().await;
    let token = app.register("ada").await;

    let broken_json = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .unwrap();
    let (status, _, body) = app.send(broken_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    let no_content_type = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _, body) = app.send(no_content_type).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["success"], false);

    let (status, _, body) = app
        .json(
            Method::POST,
            "/api/projects",
            Some(&token),
            Some(json!({ "category": "game_jam" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let (status, _, body) = app
        .json(Method::GET, "/api/projects/not-a-uuid", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    let (status, _, body) = app
        .json(Method::GET, "/api/projects?page=first", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
