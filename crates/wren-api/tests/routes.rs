//! Full-router tests: requests go through the session middleware, CSRF
//! checks and handlers exactly as they would over the wire.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use wren_api::{AppState, AppStateInner, SessionContext, SessionStore};
use wren_db::Database;

struct TestClient {
    router: Router,
    state: AppState,
    cookie: Option<String>,
}

impl TestClient {
    fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().expect("in-memory db"),
            sessions: SessionStore::new(),
        });
        Self {
            router: wren_api::router(state.clone()),
            state,
            cookie: None,
        }
    }

    /// A second browser against the same server.
    fn another(&self) -> Self {
        Self {
            router: self.router.clone(),
            state: self.state.clone(),
            cookie: None,
        }
    }

    async fn request(&mut self, method: &str, path: &str, body: Option<String>) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(path.to_string());
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie.clone());
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let res = self.router.clone().oneshot(req).await.expect("response");

        if let Some(set_cookie) = res.headers().get(header::SET_COOKIE) {
            let raw = set_cookie.to_str().expect("cookie header");
            self.cookie = raw.split(';').next().map(str::to_string);
        }
        res
    }

    async fn get(&mut self, path: impl AsRef<str>) -> axum::response::Response {
        self.request("GET", path.as_ref(), None).await
    }

    async fn post(&mut self, path: impl AsRef<str>, body: impl Into<String>) -> axum::response::Response {
        self.request("POST", path.as_ref(), Some(body.into())).await
    }

    /// The session's anti-forgery token, read server-side the way the
    /// rendered forms embed it.
    fn csrf(&self) -> String {
        let cookie = self.cookie.as_ref().expect("no session cookie yet");
        let token = cookie.split('=').nth(1).expect("cookie value");
        SessionContext::new(self.state.sessions.clone(), token.to_string()).csrf_token()
    }

    async fn signup(&mut self, username: &str) {
        // establish a session first so the form's CSRF token exists
        self.get("/signup").await;
        let csrf = self.csrf();
        let body = format!(
            "username={username}&email={username}%40example.com&password=password6&image_url=&csrf_token={csrf}"
        );
        let res = self.post("/signup", body).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER, "signup for {username}");
    }

    fn user_id(&self, username: &str) -> i64 {
        self.state
            .db
            .get_user_by_username(username)
            .expect("db")
            .expect("user exists")
            .id
    }
}

async fn body_text(res: axum::response::Response) -> String {
    let bytes = res.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn location(res: &axum::response::Response) -> &str {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn signup_logs_in_and_duplicate_username_re_renders() {
    let mut client = TestClient::new();
    client.signup("u1").await;

    // logged in: home shows the feed nav with the username
    let home = body_text(client.get("/").await).await;
    assert!(home.contains("@u1"));

    // duplicate username (different email) re-renders with the message
    client.get("/signup").await;
    let csrf = client.csrf();
    let res = client
        .post(
            "/signup",
            format!("username=u1&email=other%40example.com&password=password6&image_url=&csrf_token={csrf}"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Username already taken"));

    // exactly one row for that username
    let hits = client.state.db.list_users(Some("u1")).unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let mut client = TestClient::new();
    client.signup("u1").await;

    let mut anon = client.another();
    anon.get("/login").await;
    let csrf = anon.csrf();

    // Both failures produce the same status and the same flash; the only
    // difference in the bodies is the echoed username the user typed.
    let wrong_password = anon
        .post("/login", format!("username=u1&password=wrongpass&csrf_token={csrf}"))
        .await;
    assert_eq!(wrong_password.status(), StatusCode::OK);
    let wrong_password = body_text(wrong_password).await;

    let unknown_user = anon
        .post("/login", format!("username=nobody&password=wrongpass&csrf_token={csrf}"))
        .await;
    assert_eq!(unknown_user.status(), StatusCode::OK);
    let unknown_user = body_text(unknown_user).await;

    assert!(wrong_password.contains("Invalid credentials."));
    assert!(unknown_user.contains("Invalid credentials."));
    assert_eq!(
        wrong_password.replace("value=\"u1\"", "value=\"\""),
        unknown_user.replace("value=\"nobody\"", "value=\"\"")
    );
}

#[tokio::test]
async fn login_then_logout() {
    let mut client = TestClient::new();
    client.signup("u1").await;

    let csrf = client.csrf();
    let res = client.post("/logout", format!("csrf_token={csrf}")).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login");

    // back in: the login flow greets the user
    client.get("/login").await;
    let csrf = client.csrf();
    let res = client
        .post("/login", format!("username=u1&password=password6&csrf_token={csrf}"))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let home = body_text(client.get("/").await).await;
    assert!(home.contains("Hello, u1!"));
}

#[tokio::test]
async fn anonymous_requests_are_redirected_with_flash() {
    let mut client = TestClient::new();

    let res = client.get("/users").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    let landing = body_text(client.get("/").await).await;
    assert!(landing.contains("Access unauthorized."));
    assert!(landing.contains("Sign up"));
}

#[tokio::test]
async fn csrf_mismatch_is_treated_like_missing_auth() {
    let mut client = TestClient::new();
    client.signup("u1").await;

    let res = client
        .post("/messages/new", "text=hi&csrf_token=forged".to_string())
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    let u1 = client.user_id("u1");
    assert!(client.state.db.messages_of_user(u1).unwrap().is_empty());
}

#[tokio::test]
async fn post_message_appears_in_home_feed() {
    let mut client = TestClient::new();
    client.signup("u1").await;
    let csrf = client.csrf();

    let res = client
        .post("/messages/new", format!("text=hello+world&csrf_token={csrf}"))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let u1 = client.user_id("u1");
    assert_eq!(location(&res), format!("/users/{u1}"));

    let home = body_text(client.get("/").await).await;
    assert!(home.contains("hello world"));
}

#[tokio::test]
async fn empty_message_is_rejected_without_a_row() {
    let mut client = TestClient::new();
    client.signup("u1").await;
    let csrf = client.csrf();

    let res = client.post("/messages/new", format!("text=&csrf_token={csrf}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("This field is required."));

    let u1 = client.user_id("u1");
    assert!(client.state.db.messages_of_user(u1).unwrap().is_empty());
}

#[tokio::test]
async fn self_like_is_forbidden() {
    let mut client = TestClient::new();
    client.signup("u1").await;
    let csrf = client.csrf();
    client
        .post("/messages/new", format!("text=mine&csrf_token={csrf}"))
        .await;

    let u1 = client.user_id("u1");
    let message_id = client.state.db.messages_of_user(u1).unwrap()[0].id;

    let res = client
        .post(
            format!("/messages/{message_id}/like"),
            format!("csrf_token={csrf}&came_from=/"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(!client.state.db.has_liked(u1, message_id).unwrap());
}

#[tokio::test]
async fn like_toggle_roundtrip_and_came_from_redirect() {
    let mut u1 = TestClient::new();
    u1.signup("u1").await;
    let csrf1 = u1.csrf();
    u1.post("/messages/new", format!("text=like+me&csrf_token={csrf1}"))
        .await;
    let u1_id = u1.user_id("u1");
    let message_id = u1.state.db.messages_of_user(u1_id).unwrap()[0].id;

    let mut u2 = u1.another();
    u2.signup("u2").await;
    let u2_id = u2.user_id("u2");
    let csrf2 = u2.csrf();

    let res = u2
        .post(
            format!("/messages/{message_id}/like"),
            format!("csrf_token={csrf2}&came_from=/users/{u1_id}"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/users/{u1_id}"));
    assert!(u2.state.db.has_liked(u2_id, message_id).unwrap());

    // second toggle removes the like; a hostile came_from falls back home
    let res = u2
        .post(
            format!("/messages/{message_id}/like"),
            format!("csrf_token={csrf2}&came_from=https://evil.example"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    assert!(!u2.state.db.has_liked(u2_id, message_id).unwrap());
}

#[tokio::test]
async fn follow_then_feed_then_unfollow() {
    let mut u1 = TestClient::new();
    u1.signup("u1").await;
    let mut u2 = u1.another();
    u2.signup("u2").await;
    let csrf2 = u2.csrf();
    u2.post("/messages/new", format!("text=from+u2&csrf_token={csrf2}"))
        .await;

    let u1_id = u1.user_id("u1");
    let u2_id = u1.user_id("u2");
    let csrf1 = u1.csrf();

    let res = u1
        .post(format!("/users/follow/{u2_id}"), format!("csrf_token={csrf1}"))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/users/{u1_id}/following"));
    assert!(u1.state.db.is_following(u1_id, u2_id).unwrap());
    assert!(u1.state.db.is_followed_by(u2_id, u1_id).unwrap());

    // followed user's messages show up in the home feed
    let home = body_text(u1.get("/").await).await;
    assert!(home.contains("from u2"));

    let following = body_text(u1.get(&format!("/users/{u1_id}/following")).await).await;
    assert!(following.contains("@u2"));

    u1.post(format!("/users/stop-following/{u2_id}"), format!("csrf_token={csrf1}"))
        .await;
    assert!(!u1.state.db.is_following(u1_id, u2_id).unwrap());

    let home = body_text(u1.get("/").await).await;
    assert!(!home.contains("from u2"));
}

#[tokio::test]
async fn message_lifecycle_owner_only_delete() {
    // u1 signs up and posts
    let mut u1 = TestClient::new();
    u1.signup("u1").await;
    let csrf1 = u1.csrf();
    u1.post("/messages/new", format!("text=m1-text&csrf_token={csrf1}"))
        .await;
    let u1_id = u1.user_id("u1");
    let message_id = u1.state.db.messages_of_user(u1_id).unwrap()[0].id;

    // anonymous view is rejected and redirected
    let mut anon = u1.another();
    let res = anon.get(&format!("/messages/{message_id}")).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    // u1 can view it
    let res = u1.get(&format!("/messages/{message_id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("m1-text"));

    // u2 (non-owner) cannot delete it
    let mut u2 = u1.another();
    u2.signup("u2").await;
    let csrf2 = u2.csrf();
    let res = u2
        .post(format!("/messages/{message_id}/delete"), format!("csrf_token={csrf2}"))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    assert!(u2.state.db.get_message(message_id).unwrap().is_some());

    // u1 deletes it
    let res = u1
        .post(format!("/messages/{message_id}/delete"), format!("csrf_token={csrf1}"))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/users/{u1_id}"));
    assert!(u1.state.db.get_message(message_id).unwrap().is_none());
}

#[tokio::test]
async fn account_deletion_cascades_and_logs_out() {
    let mut u1 = TestClient::new();
    u1.signup("u1").await;
    let csrf1 = u1.csrf();
    u1.post("/messages/new", format!("text=will+vanish&csrf_token={csrf1}"))
        .await;
    let u1_id = u1.user_id("u1");
    let message_id = u1.state.db.messages_of_user(u1_id).unwrap()[0].id;

    let mut u2 = u1.another();
    u2.signup("u2").await;
    let u2_id = u2.user_id("u2");
    let csrf2 = u2.csrf();
    u2.post(format!("/users/follow/{u1_id}"), format!("csrf_token={csrf2}"))
        .await;
    u2.post(
        format!("/messages/{message_id}/like"),
        format!("csrf_token={csrf2}&came_from=/"),
    )
    .await;

    let res = u1.post("/users/delete", format!("csrf_token={csrf1}")).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/signup");

    let db = &u1.state.db;
    assert!(db.get_user_by_username("u1").unwrap().is_none());
    assert!(db.get_message(message_id).unwrap().is_none());
    assert!(!db.is_following(u2_id, u1_id).unwrap());
    assert!(db.liked_message_ids(u2_id).unwrap().is_empty());

    // the old session is anonymous now
    let res = u1.get("/users").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
}

#[tokio::test]
async fn profile_edit_requires_current_password() {
    let mut client = TestClient::new();
    client.signup("u1").await;
    let csrf = client.csrf();
    let u1_id = client.user_id("u1");

    // wrong password: nothing changes
    let res = client
        .post(
            "/users/profile",
            format!(
                "username=renamed&email=u1%40example.com&image_url=&header_image_url=&bio=&location=&password=wrongpass&csrf_token={csrf}"
            ),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Wrong password, please try again."));
    assert_eq!(client.state.db.get_user_by_id(u1_id).unwrap().unwrap().username, "u1");

    // correct password: applied and redirected to the profile
    let res = client
        .post(
            "/users/profile",
            format!(
                "username=renamed&email=u1%40example.com&image_url=&header_image_url=&bio=hi&location=here&password=password6&csrf_token={csrf}"
            ),
        )
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/users/{u1_id}"));

    let row = client.state.db.get_user_by_id(u1_id).unwrap().unwrap();
    assert_eq!(row.username, "renamed");
    assert_eq!(row.bio, "hi");
    assert_eq!(row.location, "here");
}

#[tokio::test]
async fn profile_edit_duplicate_username_rolls_back() {
    let mut u1 = TestClient::new();
    u1.signup("u1").await;
    let mut u2 = u1.another();
    u2.signup("u2").await;

    let csrf = u1.csrf();
    let u1_id = u1.user_id("u1");
    let res = u1
        .post(
            "/users/profile",
            format!(
                "username=u2&email=u1%40example.com&image_url=&header_image_url=&bio=&location=&password=password6&csrf_token={csrf}"
            ),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Username already taken"));
    assert_eq!(u1.state.db.get_user_by_id(u1_id).unwrap().unwrap().username, "u1");
}

#[tokio::test]
async fn user_search_filters_by_substring() {
    let mut client = TestClient::new();
    client.signup("warbler").await;
    let mut other = client.another();
    other.signup("sparrow").await;

    let page = body_text(client.get("/users?q=warb").await).await;
    assert!(page.contains("@warbler"));
    assert!(!page.contains("@sparrow"));

    let page = body_text(client.get("/users").await).await;
    assert!(page.contains("@warbler"));
    assert!(page.contains("@sparrow"));
}

#[tokio::test]
async fn unknown_routes_and_ids_return_not_found() {
    let mut client = TestClient::new();
    client.signup("u1").await;

    let res = client.get("/definitely/not/a/route").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get("/users/9999").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get("/messages/9999").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_are_marked_no_store() {
    let mut client = TestClient::new();
    let res = client.get("/").await;
    assert_eq!(
        res.headers().get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok()),
        Some("no-store")
    );
}
