#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::{to_bytes, MessageBody};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use tasklane::auth::hash_password;
use tasklane::config::Config;
use tasklane::mail::{BrevoClient, MailNotifier};
use tasklane::models::{NewUser, Role, User};
use tasklane::routes;
use tasklane::state::AppState;
use tasklane::store::{MemoryStore, UserStore};
use tasklane::uploads::LocalUploader;

pub const PASSWORD: &str = "secret1";

pub fn config(extra: &[(&str, &str)]) -> Config {
    let extra: Vec<(String, String)> = extra
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(move |key| {
        if let Some((_, value)) = extra.iter().find(|(k, _)| k == key) {
            return Some(value.clone());
        }
        match key {
            "DATABASE_URL" => Some("memory://".into()),
            "JWT_SECRET" => Some("integration-secret".into()),
            "BCRYPT_COST" => Some("4".into()),
            _ => None,
        }
    })
    .unwrap()
}

/// State over a fresh `MemoryStore`, returned alongside it for direct inspection.
pub fn state_with(config: &Config) -> (Arc<MemoryStore>, web::Data<AppState>) {
    let store = Arc::new(MemoryStore::new());
    let client = config
        .mail
        .as_ref()
        .map(|mail| BrevoClient::new(mail).unwrap());
    let mailer = MailNotifier::new(store.clone(), client);
    let uploads = std::env::temp_dir().join(format!("tasklane-it-{}", uuid::Uuid::new_v4()));
    let state = AppState::new(
        config,
        store.clone(),
        mailer,
        Arc::new(LocalUploader::new(uploads)),
    );
    (store, web::Data::new(state))
}

pub fn state() -> (Arc<MemoryStore>, web::Data<AppState>) {
    state_with(&config(&[]))
}

pub async fn init_app(
    state: web::Data<AppState>,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(state)
            .wrap(Logger::default())
            .configure(routes::config),
    )
    .await
}

/// Calls `app` and returns the status and JSON body, rendering middleware errors
/// the way the server would.
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            let bytes = test::read_body(resp).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let bytes = to_bytes(resp.into_body()).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request {
    let mut req = match method {
        "GET" => test::TestRequest::get(),
        "PATCH" => test::TestRequest::patch(),
        "DELETE" => test::TestRequest::delete(),
        _ => test::TestRequest::post(),
    }
    .uri(uri);
    if let Some(token) = token {
        req = req.insert_header((header::AUTHORIZATION, format!("Bearer {}", token)));
    }
    if let Some(body) = body {
        req = req.set_json(body);
    }
    req.to_request()
}

pub fn signup_body(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
        "password_confirmation": PASSWORD
    })
}

/// Signs `email` up, logs in and returns the user's id and access token.
pub async fn signup_and_login<S, B>(app: &S, name: &str, email: &str) -> (i64, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = send(app, request("POST", "/create", None, Some(signup_body(name, email)))).await;
    assert_eq!(status, StatusCode::OK, "signup failed: {}", body);
    login(app, email).await
}

pub async fn login<S, B>(app: &S, email: &str) -> (i64, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = send(
        app,
        request(
            "POST",
            "/login",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    (
        body["data"]["user"]["id"].as_i64().unwrap(),
        body["data"]["access_token"].as_str().unwrap().to_string(),
    )
}

/// Writes an Admin straight to the store, skipping the configured bootstrap.
pub async fn insert_admin(store: &MemoryStore, email: &str) -> User {
    store
        .insert_user(NewUser {
            name: "Root".into(),
            email: email.into(),
            password: hash_password(PASSWORD, 4).unwrap(),
            role: Role::Admin,
        })
        .await
        .unwrap()
}

pub async fn create_category<S, B>(app: &S, admin_token: &str, name: &str) -> i64
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = send(
        app,
        request(
            "POST",
            "/category/create",
            Some(admin_token),
            Some(json!({ "name": name, "action": "POST" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "category create failed: {}", body);
    body["data"]["id"].as_i64().unwrap()
}
