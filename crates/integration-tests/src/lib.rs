//! Integration test support for the Shopfront client.
//!
//! [`FakeApi`] is an in-process stand-in for the commerce REST API, served by
//! axum on an ephemeral port. It keeps accounts, tokens, the catalog and
//! placed orders in memory, records every request (including its
//! `Authorization` header) and can be told to fail specific endpoints.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let fake = FakeApi::start().await;
//! fake.add_user("kim@shop.com", "hunter2", "Kim");
//!
//! let api = ApiClient::new(&fake.config())?;
//! let user = api.login(&Email::parse("kim@shop.com")?, &"hunter2".into()).await?;
//! assert_eq!(fake.requests_to("/auth/login").len(), 1);
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use shopfront_client::ClientConfig;
use shopfront_core::{Category, CategoryId, Email, Product, Role, User, UserId};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Path prefix the fake API is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// The code every verification email "contains".
pub const VERIFICATION_CODE: &str = "123456";

/// One request as the fake API saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    /// Path below [`API_PREFIX`], e.g. `/auth/login`.
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    verification_codes: HashMap<String, String>,
    signup_tokens: HashMap<String, String>,
    products: Vec<Product>,
    categories: Vec<Category>,
    orders: Vec<Value>,
    requests: Vec<RecordedRequest>,
    next_id: u64,
    rotate_refresh_tokens: bool,
    fail_refresh: bool,
    fail_logout: bool,
    fail_orders: bool,
    latency: Duration,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_access_token(&mut self, email: &str) -> String {
        let token = format!("access-{}", self.next_id());
        self.access_tokens.insert(token.clone(), email.to_string());
        token
    }

    fn issue_refresh_token(&mut self, email: &str) -> String {
        let token = format!("refresh-{}", self.next_id());
        self.refresh_tokens.insert(token.clone(), email.to_string());
        token
    }

    /// The account behind the request's bearer token, if it is live.
    fn bearer_account(&self, headers: &HeaderMap) -> Option<&Account> {
        let token = headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        let email = self.access_tokens.get(token)?;
        self.accounts.get(email)
    }
}

type Shared = Arc<Mutex<Inner>>;

fn lock(state: &Shared) -> MutexGuard<'_, Inner> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process fake of the commerce API.
///
/// The server task is aborted when the value is dropped.
pub struct FakeApi {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeApi {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake API listener");
        let addr = listener
            .local_addr()
            .expect("Failed to read fake API address");

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake API server stopped");
            }
        });
        tracing::debug!(%addr, "Fake API listening");

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL the client should be configured with.
    ///
    /// # Panics
    ///
    /// Never in practice: the address always forms a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}{API_PREFIX}", self.addr)).expect("valid fake API URL")
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url()).with_http_timeout(Duration::from_secs(5))
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Register an account directly.
    ///
    /// # Panics
    ///
    /// Panics if `email` is not a valid address.
    pub fn add_user(&self, email: &str, password: &str, name: &str) -> User {
        self.add_account(email, password, name, Role::User)
    }

    /// Register an admin account directly.
    ///
    /// # Panics
    ///
    /// Panics if `email` is not a valid address.
    pub fn add_admin(&self, email: &str, password: &str, name: &str) -> User {
        self.add_account(email, password, name, Role::Admin)
    }

    fn add_account(&self, email: &str, password: &str, name: &str, role: Role) -> User {
        let email = Email::parse(email).expect("valid seed email");
        let mut inner = lock(&self.state);
        let user = User {
            id: UserId::new(format!("u-{}", inner.next_id())),
            email: email.clone(),
            username: email.local_part().to_string(),
            name: name.to_string(),
            phone: String::new(),
            role,
        };
        inner.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Add a product to the catalog.
    ///
    /// # Panics
    ///
    /// Panics if the fields do not form a valid product.
    pub fn add_product(&self, id: &str, name: &str, price: u32, sale: u8) -> Product {
        self.add_product_in(id, name, price, sale, None)
    }

    /// Add a product filed under `category`.
    ///
    /// # Panics
    ///
    /// Panics if the fields do not form a valid product.
    pub fn add_product_in(
        &self,
        id: &str,
        name: &str,
        price: u32,
        sale: u8,
        category: Option<&Category>,
    ) -> Product {
        let product: Product = serde_json::from_value(json!({
            "id": id,
            "productId": format!("SKU-{id}"),
            "name": name,
            "price": price,
            "sale": sale,
            "count": 10,
            "category": category,
        }))
        .expect("valid seed product");
        lock(&self.state).products.push(product.clone());
        product
    }

    /// Add a category.
    pub fn add_category(&self, id: &str, name: &str, parent: Option<&Category>) -> Category {
        let category = Category {
            id: CategoryId::new(id),
            name: name.to_string(),
            parent_category: parent.cloned().map(Box::new),
        };
        lock(&self.state).categories.push(category.clone());
        category
    }

    /// Issue a refresh token for an existing account, as an earlier login
    /// would have.
    pub fn issue_refresh_token(&self, email: &str) -> String {
        lock(&self.state).issue_refresh_token(email)
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Answer `POST /auth/refresh` with a new refresh token each time.
    pub fn set_rotate_refresh_tokens(&self, rotate: bool) {
        lock(&self.state).rotate_refresh_tokens = rotate;
    }

    /// Refuse every refresh with 401.
    pub fn set_fail_refresh(&self, fail: bool) {
        lock(&self.state).fail_refresh = fail;
    }

    /// Answer `POST /auth/logout` with 500.
    pub fn set_fail_logout(&self, fail: bool) {
        lock(&self.state).fail_logout = fail;
    }

    /// Answer `POST /orders` with 500.
    pub fn set_fail_orders(&self, fail: bool) {
        lock(&self.state).fail_orders = fail;
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests received for `path` (below [`API_PREFIX`]).
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    /// Order bodies received by `POST /orders`.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        lock(&self.state).orders.clone()
    }

    /// Whether `token` is still accepted as a refresh token.
    #[must_use]
    pub fn refresh_token_is_live(&self, token: &str) -> bool {
        lock(&self.state).refresh_tokens.contains_key(token)
    }

    /// Whether an account exists for `email`.
    #[must_use]
    pub fn has_account(&self, email: &str) -> bool {
        lock(&self.state).accounts.contains_key(email)
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/check-email", post(check_email))
        .route("/auth/signup", post(signup))
        .route("/email-verifications/send", post(send_verification))
        .route("/email-verifications/verify", post(verify_email))
        .route("/users", get(get_user).put(update_user))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product).delete(delete_product))
        .route("/categories", get(list_categories))
        .route("/orders", post(create_order));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let uri = request.uri();
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: uri
            .path()
            .strip_prefix(API_PREFIX)
            .unwrap_or(uri.path())
            .to_string(),
        query: uri.query().map(str::to_string),
        authorization: request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let latency = {
        let mut inner = lock(&state);
        inner.requests.push(recorded);
        inner.latency
    };
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    next.run(request).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<Credentials>) -> Response {
    let mut inner = lock(&state);
    let Some(account) = inner.accounts.get(&body.email).cloned() else {
        return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
    };
    if account.password != body.password {
        return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }

    let access_token = inner.issue_access_token(&body.email);
    let refresh_token = inner.issue_refresh_token(&body.email);
    Json(json!({
        "accessToken": access_token,
        "refreshToken": refresh_token,
        "user": account.user,
    }))
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(State(state): State<Shared>, Json(body): Json<RefreshBody>) -> Response {
    let mut inner = lock(&state);
    if inner.fail_refresh {
        return error(StatusCode::UNAUTHORIZED, "Refresh token expired");
    }
    let Some(email) = inner.refresh_tokens.get(&body.refresh_token).cloned() else {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    };
    let Some(user) = inner.accounts.get(&email).map(|a| a.user.clone()) else {
        return error(StatusCode::UNAUTHORIZED, "Unknown account");
    };

    let access_token = inner.issue_access_token(&email);
    if inner.rotate_refresh_tokens {
        inner.refresh_tokens.remove(&body.refresh_token);
        let refresh_token = inner.issue_refresh_token(&email);
        return Json(json!({
            "accessToken": access_token,
            "refreshToken": refresh_token,
            "user": user,
        }))
        .into_response();
    }
    Json(json!({ "accessToken": access_token, "user": user })).into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut inner = lock(&state);
    if inner.fail_logout {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Logout unavailable");
    }
    if let Some(email) = inner.bearer_account(&headers).map(|a| a.user.email.to_string()) {
        inner.access_tokens.retain(|_, owner| *owner != email);
        inner.refresh_tokens.retain(|_, owner| *owner != email);
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct EmailBody {
    email: String,
}

async fn check_email(State(state): State<Shared>, Json(body): Json<EmailBody>) -> Response {
    let available = !lock(&state).accounts.contains_key(&body.email);
    Json(json!({ "isAvailable": available })).into_response()
}

async fn send_verification(State(state): State<Shared>, Json(body): Json<EmailBody>) -> Response {
    if Email::parse(&body.email).is_err() {
        return error(StatusCode::BAD_REQUEST, "Invalid email");
    }
    lock(&state)
        .verification_codes
        .insert(body.email, VERIFICATION_CODE.to_string());
    StatusCode::OK.into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody {
    email: String,
    auth_num: String,
}

async fn verify_email(State(state): State<Shared>, Json(body): Json<VerifyBody>) -> Response {
    let mut inner = lock(&state);
    if inner.verification_codes.get(&body.email) != Some(&body.auth_num) {
        return error(StatusCode::BAD_REQUEST, "Invalid verification code");
    }
    inner.verification_codes.remove(&body.email);
    let token = format!("signup-{}", inner.next_id());
    inner.signup_tokens.insert(token.clone(), body.email);
    Json(json!({ "token": token })).into_response()
}

#[derive(Deserialize)]
struct TokenQuery {
    token: String,
}

#[derive(Deserialize)]
struct SignUpBody {
    email: String,
    password: String,
    name: String,
    phone: String,
}

async fn signup(
    State(state): State<Shared>,
    Query(query): Query<TokenQuery>,
    Json(body): Json<SignUpBody>,
) -> Response {
    let mut inner = lock(&state);
    if inner.signup_tokens.get(&query.token) != Some(&body.email) {
        return error(StatusCode::BAD_REQUEST, "Email not verified");
    }
    if inner.accounts.contains_key(&body.email) {
        return error(StatusCode::CONFLICT, "Email already registered");
    }
    let Ok(email) = Email::parse(&body.email) else {
        return error(StatusCode::BAD_REQUEST, "Invalid email");
    };

    inner.signup_tokens.remove(&query.token);
    let user = User {
        id: UserId::new(format!("u-{}", inner.next_id())),
        username: email.local_part().to_string(),
        email,
        name: body.name,
        phone: body.phone,
        role: Role::User,
    };
    inner.accounts.insert(
        body.email,
        Account {
            password: body.password,
            user: user.clone(),
        },
    );
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn get_user(State(state): State<Shared>, Query(query): Query<EmailBody>) -> Response {
    match lock(&state).accounts.get(&query.email) {
        Some(account) => Json(account.user.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "User not found"),
    }
}

#[derive(Deserialize)]
struct ProfileBody {
    username: Option<String>,
    name: Option<String>,
    phone: Option<String>,
}

async fn update_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Response {
    let mut inner = lock(&state);
    let Some(email) = inner
        .bearer_account(&headers)
        .map(|a| a.user.email.to_string())
    else {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    let Some(account) = inner.accounts.get_mut(&email) else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };
    if let Some(username) = body.username {
        account.user.username = username;
    }
    if let Some(name) = body.name {
        account.user.name = name;
    }
    if let Some(phone) = body.phone {
        account.user.phone = phone;
    }
    Json(account.user.clone()).into_response()
}

#[derive(Deserialize)]
struct ProductsQuery {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
    search: Option<String>,
    category: Option<String>,
}

const fn default_size() -> usize {
    20
}

async fn list_products(State(state): State<Shared>, Query(query): Query<ProductsQuery>) -> Response {
    let inner = lock(&state);
    let search = query.search.map(|s| s.to_lowercase());
    let page: Vec<&Product> = inner
        .products
        .iter()
        .filter(|p| {
            search
                .as_deref()
                .is_none_or(|s| p.name.to_lowercase().contains(s))
        })
        .filter(|p| {
            query.category.as_deref().is_none_or(|c| {
                p.category
                    .as_ref()
                    .is_some_and(|category| category.id.as_str() == c)
            })
        })
        .skip(query.page.saturating_mul(query.size))
        .take(query.size)
        .collect();
    Json(page).into_response()
}

async fn get_product(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    match lock(&state).products.iter().find(|p| p.id.as_str() == id) {
        Some(product) => Json(product).into_response(),
        None => error(StatusCode::NOT_FOUND, "Product not found"),
    }
}

async fn create_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    let mut inner = lock(&state);
    if !inner.bearer_account(&headers).is_some_and(|a| a.user.is_admin()) {
        return error(StatusCode::FORBIDDEN, "Admin role required");
    }
    let id = format!("p-{}", inner.next_id());
    if let Some(fields) = body.as_object_mut() {
        fields.insert("id".to_string(), json!(id));
        fields.insert("productId".to_string(), json!(format!("SKU-{id}")));
    }
    let Ok(product) = serde_json::from_value::<Product>(body) else {
        return error(StatusCode::BAD_REQUEST, "Invalid product");
    };
    inner.products.push(product.clone());
    (StatusCode::CREATED, Json(product)).into_response()
}

async fn delete_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut inner = lock(&state);
    if !inner.bearer_account(&headers).is_some_and(|a| a.user.is_admin()) {
        return error(StatusCode::FORBIDDEN, "Admin role required");
    }
    let before = inner.products.len();
    inner.products.retain(|p| p.id.as_str() != id);
    if inner.products.len() == before {
        return error(StatusCode::NOT_FOUND, "Product not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_categories(State(state): State<Shared>) -> Response {
    Json(lock(&state).categories.clone()).into_response()
}

async fn create_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut inner = lock(&state);
    if inner.bearer_account(&headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    if inner.fail_orders {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Order service unavailable");
    }
    let order_id = format!("o-{}", inner.next_id());
    inner.orders.push(body);
    (
        StatusCode::CREATED,
        Json(json!({ "orderId": order_id, "status": "PLACED" })),
    )
        .into_response()
}
