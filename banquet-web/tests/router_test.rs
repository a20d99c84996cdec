use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::{async_trait, Router};
use banquet_core::auth::hash_password;
use banquet_core::storage::{ImageKind, ImageUpload, LibsqlStorage, Storage};
use banquet_core::{
    BanquetError, CallRequest, ContactMessage, ListingDetail, ListingQuery, NewCallRequest, NewContactMessage,
    NewListing, NewUser, User,
};
use banquet_web::error::APOLOGY;
use banquet_web::state::open_storage;
use banquet_web::{app_router, AppState, Config};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R'];
const BOUNDARY: &str = "banquet-test-boundary";
const FORM: &str = "application/x-www-form-urlencoded";

struct TestApp {
    app: Router,
    storage: Arc<LibsqlStorage>,
    dir: TempDir,
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        database_url: dir.path().join("test.db").to_string_lossy().into_owned(),
        media_root: dir.path().join("media"),
        static_root: dir.path().join("static"),
        log_dir: dir.path().join("logs"),
        allowed_hosts: vec!["localhost".to_string()],
        max_upload_bytes: 1024,
        ..Config::default()
    }
}

async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let storage = Arc::new(open_storage(&config).await.unwrap());
    let state = AppState::new(storage.clone(), config);
    TestApp {
        app: app_router(state),
        storage,
        dir,
    }
}

/// Storage that fails every call while `down` is set, and otherwise
/// forwards to a real database.
struct Unavailable {
    inner: LibsqlStorage,
    down: AtomicBool,
}

impl Unavailable {
    fn check(&self) -> banquet_core::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BanquetError::Database {
                message: "database is unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for Unavailable {
    async fn create_user(&self, user: &NewUser) -> banquet_core::Result<User> {
        self.check()?;
        self.inner.create_user(user).await
    }
    async fn create_account(
        &self,
        user: &NewUser,
        listing: Option<&NewListing>,
    ) -> banquet_core::Result<(User, Option<ListingDetail>)> {
        self.check()?;
        self.inner.create_account(user, listing).await
    }
    async fn get_user_by_id(&self, user_id: i64) -> banquet_core::Result<Option<User>> {
        self.check()?;
        self.inner.get_user_by_id(user_id).await
    }
    async fn get_user_by_username(&self, username: &str) -> banquet_core::Result<Option<User>> {
        self.check()?;
        self.inner.get_user_by_username(username).await
    }
    async fn create_listing(
        &self,
        listing: &NewListing,
        images: &[ImageUpload],
    ) -> banquet_core::Result<ListingDetail> {
        self.check()?;
        self.inner.create_listing(listing, images).await
    }
    async fn get_listing(&self, listing_id: i64) -> banquet_core::Result<Option<ListingDetail>> {
        self.check()?;
        self.inner.get_listing(listing_id).await
    }
    async fn list_listings(&self, query: &ListingQuery) -> banquet_core::Result<Vec<ListingDetail>> {
        self.check()?;
        self.inner.list_listings(query).await
    }
    async fn delete_listing(&self, listing_id: i64) -> banquet_core::Result<bool> {
        self.check()?;
        self.inner.delete_listing(listing_id).await
    }
    async fn create_call_request(&self, call: &NewCallRequest) -> banquet_core::Result<CallRequest> {
        self.check()?;
        self.inner.create_call_request(call).await
    }
    async fn list_call_requests(&self) -> banquet_core::Result<Vec<CallRequest>> {
        self.check()?;
        self.inner.list_call_requests().await
    }
    async fn create_contact_message(&self, message: &NewContactMessage) -> banquet_core::Result<ContactMessage> {
        self.check()?;
        self.inner.create_contact_message(message).await
    }
    async fn list_contact_messages(&self) -> banquet_core::Result<Vec<ContactMessage>> {
        self.check()?;
        self.inner.list_contact_messages().await
    }
    async fn clear_all_data(&self) -> banquet_core::Result<()> {
        self.check()?;
        self.inner.clear_all_data().await
    }
}

async fn unavailable_app() -> (Router, Arc<Unavailable>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    let storage = Arc::new(Unavailable {
        inner: open_storage(&config).await.unwrap(),
        down: AtomicBool::new(true),
    });
    let app = app_router(AppState::new(storage.clone(), config));
    (app, storage, dir)
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    async fn listing_count(&self) -> usize {
        self.storage.list_listings(&ListingQuery::default()).await.unwrap().len()
    }

    async fn user(&self, username: &str, password: &str) -> User {
        self.storage
            .create_user(&NewUser {
                username: username.to_string(),
                password_hash: hash_password(password).unwrap(),
                first_name: "Meera".to_string(),
                last_name: "Joshi".to_string(),
                email: format!("{username}@example.com"),
            })
            .await
            .unwrap()
    }

    /// Log in through the HTTP surface and return the session cookie pair.
    async fn login(&self, username: &str, password: &str) -> String {
        let res = self
            .send(form_post("/login", &format!("username={username}&password={password}")))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        session_cookie(&res)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(HOST, "localhost")
        .body(Body::empty())
        .unwrap()
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(HOST, "localhost")
        .header(CONTENT_TYPE, FORM)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn ajax_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(HOST, "localhost")
        .header(CONTENT_TYPE, FORM)
        .header("X-Requested-With", "XMLHttpRequest")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn register_post(body: Vec<u8>, cookie: Option<&str>, json: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/register-banquet")
        .header(HOST, "localhost")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    if json {
        builder = builder.header("Accept", "application/json");
    }
    builder.body(Body::from(body)).unwrap()
}

fn session_cookie(res: &Response<Body>) -> String {
    res.headers()
        .get(SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn location(res: &Response<Body>) -> &str {
    res.headers().get(LOCATION).unwrap().to_str().unwrap()
}

async fn body_text(res: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(res: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const LISTING_FIELDS: &[(&str, &str)] = &[
    ("banquet_name", "Shagun Vatika"),
    ("email", "shagun@example.com"),
    ("phone", "9876500000"),
    ("capacity", "450"),
    ("location", "Kakadeo"),
    ("services", "Wedding"),
];

#[tokio::test]
async fn test_health_and_host_check() {
    let t = test_app().await;

    let res = t.send(get("/health")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "ok");

    let req = Request::builder()
        .uri("/health")
        .header(HOST, "attacker.example")
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::BAD_REQUEST);

    for host in ["[::1", "["] {
        let req = Request::builder()
            .uri("/health")
            .header(HOST, host)
            .body(Body::empty())
            .unwrap();
        assert_eq!(t.send(req).await.status(), StatusCode::BAD_REQUEST, "host {host:?}");
    }
}

#[tokio::test]
async fn test_landing_filters_and_ignored_guests() {
    let t = test_app().await;
    let owner = t.user("owner", "Banquet#2026").await;
    for (name, location, capacity) in [("Royal Palace", "Swaroop Nagar", 300), ("Moti Mahal", "Kakadeo", 120)] {
        t.storage
            .create_listing(
                &NewListing {
                    owner_id: owner.id,
                    owner_name: owner.display_name(),
                    name: name.to_string(),
                    email: "hall@example.com".to_string(),
                    phone: "9000000000".to_string(),
                    capacity,
                    location: location.to_string(),
                    google_link: None,
                    services: Some("Wedding".to_string()),
                    price: None,
                },
                &[],
            )
            .await
            .unwrap();
    }

    let res = t.send(get("/")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("Royal Palace") && html.contains("Moti Mahal"));

    let html = body_text(t.send(get("/?area=swaroop+nagar&guests=200")).await).await;
    assert!(html.contains("Royal Palace"));
    assert!(!html.contains("Moti Mahal"));

    let html = body_text(t.send(get("/?guests=lots&location=kaka")).await).await;
    assert!(html.contains("Moti Mahal"));
    assert!(!html.contains("Royal Palace"));
    assert!(html.contains("the guest filter was ignored"));
}

#[tokio::test]
async fn test_anonymous_registration_never_creates_rows() {
    let t = test_app().await;
    let body = multipart(LISTING_FIELDS, &[("hall.png", PNG)]);

    let res = t.send(register_post(body, None, false)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login?next=/register-banquet");

    let res = t.send(get("/register-banquet")).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    assert_eq!(t.listing_count().await, 0);
}

#[tokio::test]
async fn test_registration_with_images() {
    let t = test_app().await;
    t.user("meera", "Banquet#2026").await;
    let cookie = t.login("meera", "Banquet%232026").await;

    let body = multipart(LISTING_FIELDS, &[("front.png", PNG), ("hall.png", PNG)]);
    let res = t.send(register_post(body, Some(&cookie), false)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let listings = t.storage.list_listings(&ListingQuery::default()).await.unwrap();
    assert_eq!(listings.len(), 1);
    let detail = &listings[0];
    assert_eq!(location(&res), format!("/banquet/{}", detail.listing.id));
    assert_eq!(detail.listing.owner_name, "Meera Joshi");
    assert_eq!(detail.images.len(), 2);
    for image in &detail.images {
        assert!(t.dir.path().join("media").join(&image.image_key).exists());
    }

    let html = body_text(t.send(get(&format!("/banquet/{}", detail.listing.id))).await).await;
    assert!(html.contains("Shagun Vatika"));
    assert!(html.contains(&format!("/media/{}", detail.images[0].image_key)));
}

#[tokio::test]
async fn test_registration_rejects_bad_input() {
    let t = test_app().await;
    t.user("meera", "Banquet#2026").await;
    let cookie = t.login("meera", "Banquet%232026").await;

    let mut fields = LISTING_FIELDS.to_vec();
    fields[3] = ("capacity", "-1");
    let res = t
        .send(register_post(multipart(&fields, &[("hall.png", PNG)]), Some(&cookie), true))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"]["capacity"][0], "Ensure this value is greater than or equal to 0.");

    let res = t
        .send(register_post(
            multipart(LISTING_FIELDS, &[("notes.txt", &b"plain text"[..])]),
            Some(&cookie),
            true,
        ))
        .await;
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert!(json["errors"]["images"].is_array());

    let oversized = [PNG, &[0u8; 2048][..]].concat();
    let res = t
        .send(register_post(
            multipart(LISTING_FIELDS, &[("huge.png", oversized.as_slice())]),
            Some(&cookie),
            true,
        ))
        .await;
    assert_eq!(body_json(res).await["success"], false);

    assert_eq!(t.listing_count().await, 0);

    fields[3] = ("capacity", "0");
    let res = t.send(register_post(multipart(&fields, &[]), Some(&cookie), true)).await;
    assert_eq!(body_json(res).await["success"], true);
    assert_eq!(t.listing_count().await, 1);
}

#[tokio::test]
async fn test_schedule_call_json() {
    let t = test_app().await;

    let res = t
        .send(ajax_post(
            "/schedule-call",
            "name=Ira&email=ira%40example.com&phone=9999999999&date=2026-11-02\
             &time_slot=10%3A00+AM+-+10%3A30+AM&reason=Consultation",
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);
    assert_eq!(
        json["message"],
        "Your call has been scheduled for 2026-11-02 at 10:00 AM - 10:30 AM."
    );

    let res = t
        .send(ajax_post("/schedule-call", "name=Ira&email=ira%40example.com&phone=1&reason=Gossip"))
        .await;
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"]["date"][0], "This field is required.");
    assert!(json["errors"]["reason"].is_array());

    assert_eq!(t.storage.list_call_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_contact_message_length() {
    let t = test_app().await;
    let base = "full_name=Kabir&email=kabir%40example.com&subject=Booking";

    let res = t
        .send(ajax_post("/contact", &format!("{base}&message={}", "a".repeat(501))))
        .await;
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(
        json["errors"]["message"][0],
        "Ensure this value has at most 500 characters (it has 501)."
    );

    let res = t
        .send(ajax_post("/contact", &format!("{base}&message={}", "a".repeat(500))))
        .await;
    assert_eq!(body_json(res).await["success"], true);

    let res = t
        .send(form_post("/contact", &format!("{base}&message=Hello")))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&res);
    let req = Request::builder()
        .uri("/contact")
        .header(HOST, "localhost")
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let html = body_text(t.send(req).await).await;
    assert!(html.contains("Thank you for contacting us!"));

    assert_eq!(t.storage.list_contact_messages().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_signup_login_logout() {
    let t = test_app().await;

    let res = t
        .send(form_post(
            "/signup",
            "username=asha&first_name=Asha&last_name=Verma&email=asha%40example.com\
             &password1=Mandap%2399&password2=Mandap%2399\
             &venue_name=Asha+Greens&venue_address=Civil+Lines&venue_capacity=200&venue_price=50000",
        ))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    let cookie = session_cookie(&res);

    let listings = t.storage.list_listings(&ListingQuery::default()).await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].listing.owner_name, "Asha Verma");
    assert_eq!(listings[0].listing.price, Some(50000));

    let req = Request::builder()
        .uri("/register-banquet")
        .header(HOST, "localhost")
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::OK);

    let req = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(HOST, "localhost")
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::SEE_OTHER);

    let req = Request::builder()
        .uri("/register-banquet")
        .header(HOST, "localhost")
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_signup_rejections() {
    let t = test_app().await;
    t.user("asha", "Banquet#2026").await;

    let res = t
        .send(ajax_post(
            "/signup",
            "username=asha&first_name=A&last_name=V&email=a%40example.com&password1=Mandap%2399&password2=Mandap%2399",
        ))
        .await;
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"]["username"][0], "A user with that username already exists.");

    let res = t
        .send(ajax_post(
            "/signup",
            "username=ravi&first_name=R&last_name=K&email=r%40example.com&password1=Mandap%2399&password2=Mandap%2398",
        ))
        .await;
    let json = body_json(res).await;
    assert_eq!(json["errors"]["password2"][0], "The two password fields didn't match.");

    let res = t.send(form_post("/signup", "username=ravi")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("This field is required."));
}

#[tokio::test]
async fn test_login_next_stays_on_site() {
    let t = test_app().await;
    t.user("meera", "Banquet#2026").await;

    let res = t
        .send(form_post(
            "/login",
            "username=meera&password=Banquet%232026&next=%2Fregister-banquet",
        ))
        .await;
    assert_eq!(location(&res), "/register-banquet");

    let res = t
        .send(form_post(
            "/login",
            "username=meera&password=Banquet%232026&next=https%3A%2F%2Fevil.example%2F",
        ))
        .await;
    assert_eq!(location(&res), "/");

    let res = t
        .send(form_post("/login?next=%2F%2Fevil.example", "username=meera&password=Banquet%232026"))
        .await;
    assert_eq!(location(&res), "/");

    for next in ["%2F%09%2Fevil.example", "%2F%0A%2Fevil.example", "%2F%5Cevil.example"] {
        let res = t
            .send(form_post(
                "/login",
                &format!("username=meera&password=Banquet%232026&next={next}"),
            ))
            .await;
        assert_eq!(location(&res), "/", "next {next}");
    }

    let res = t
        .send(ajax_post("/login", "username=meera&password=wrong-password"))
        .await;
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert!(json["errors"]["__all__"].is_array());
}

#[tokio::test]
async fn test_unknown_pages_are_not_found() {
    let t = test_app().await;
    assert_eq!(t.send(get("/banquet/999")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(t.send(get("/banquet/not-a-number")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(t.send(get("/no-such-page")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_failure_renders_apology_page() {
    let (app, _storage, _dir) = unavailable_app().await;

    for uri in ["/", "/banquet", "/banquet/1"] {
        let res = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR, "uri {uri}");
        let html = body_text(res).await;
        assert!(html.contains("Something went wrong"));
        assert!(html.contains(APOLOGY));
    }
}

#[tokio::test]
async fn test_storage_failure_apology_as_json() {
    let (app, _storage, _dir) = unavailable_app().await;

    let req = Request::builder()
        .uri("/")
        .header(HOST, "localhost")
        .header("Accept", "application/json")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(res).await,
        serde_json::json!({ "success": false, "message": APOLOGY })
    );

    let res = app
        .clone()
        .oneshot(ajax_post(
            "/contact",
            "full_name=Kabir&email=kabir%40example.com&subject=Booking&message=Hello",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], APOLOGY);
}

#[tokio::test]
async fn test_failed_signup_leaves_no_account() {
    let (app, storage, _dir) = unavailable_app().await;
    let body = "username=asha&first_name=Asha&last_name=Verma&email=asha%40example.com\
                &password1=Mandap%2399&password2=Mandap%2399\
                &venue_name=Asha+Greens&venue_address=Civil+Lines&venue_capacity=200";

    let res = app.clone().oneshot(ajax_post("/signup", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await["message"], APOLOGY);
    assert!(nothing_stored(&storage).await);

    storage.down.store(false, Ordering::SeqCst);
    let res = app.clone().oneshot(ajax_post("/signup", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["success"], true);

    let user = storage.inner.get_user_by_username("asha").await.unwrap().unwrap();
    let listings = storage.inner.list_listings(&ListingQuery::default()).await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].listing.owner_id, user.id);
}

async fn nothing_stored(storage: &Unavailable) -> bool {
    storage.inner.get_user_by_username("asha").await.unwrap().is_none()
        && storage.inner.list_listings(&ListingQuery::default()).await.unwrap().is_empty()
}

#[test]
fn test_fixture_image_is_sniffed_as_png() {
    let upload = ImageUpload::from_bytes("hall.png", PNG.to_vec(), 1024).unwrap();
    assert_eq!(upload.kind, ImageKind::Png);
}
