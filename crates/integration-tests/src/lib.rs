//! Integration test support for Market.
//!
//! [`MockApi`] is an in-process stand-in for the Market REST API, built on
//! axum and bound to an ephemeral port. Tests point a real
//! [`market_storefront::Storefront`] at it and drive the whole client stack
//! (reqwest, JSON bodies, bearer tokens) without any external service.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p market-integration-tests
//! ```
//!
//! # Seed data
//!
//! - Users: a customer ([`CUSTOMER_EMAIL`]) and an admin ([`ADMIN_EMAIL`])
//! - Categories 1 "Dried Fruit" and 2 "Tea"
//! - Products 1-4, product 2 out of stock
//!
//! Card payments follow a script of statuses, one per status check
//! (default: pending, then completed).

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use market_core::{
    AddressId, CategoryId, OrderId, OrderStatus, Page, PaymentId, PaymentMethod, PaymentStatus,
    Price, ProductId, Role, UserId,
};
use market_storefront::api::{Address, Category, Order, OrderItem, Payment, Product};
use market_storefront::auth::Identity;
use market_storefront::config::PaymentPollConfig;
use market_storefront::storage::{KeyValueStore, MemoryStore, StorageError};
use market_storefront::validation::LoginForm;
use market_storefront::{AppError, Storefront, StorefrontConfig};

pub const CUSTOMER_EMAIL: &str = "shopper@example.com";
pub const CUSTOMER_PASSWORD: &str = "hunter22";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct-horse";

// =============================================================================
// State
// =============================================================================

/// A request as seen by the mock, for assertions on what the client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub request_id: Option<String>,
    pub bearer: bool,
}

#[derive(Debug, Clone)]
struct MockUser {
    id: UserId,
    email: String,
    password: String,
    role: Role,
}

#[derive(Debug, Clone)]
struct StoredAddress {
    owner: UserId,
    address: Address,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    owner: UserId,
    order: Order,
}

#[derive(Debug, Clone)]
struct StoredPayment {
    owner: UserId,
    payment: Payment,
    script: VecDeque<PaymentStatus>,
}

struct Db {
    users: Vec<MockUser>,
    tokens: HashMap<String, UserId>,
    token_ttl_secs: i64,
    products: Vec<Product>,
    categories: Vec<Category>,
    addresses: Vec<StoredAddress>,
    orders: Vec<StoredOrder>,
    payments: Vec<StoredPayment>,
    payment_script: Vec<PaymentStatus>,
    delays: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
    next_id: i32,
}

impl Db {
    fn seeded() -> Self {
        let product = |id, name: &str, cents, stock, category| Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: None,
            price: Price::from_cents(cents),
            stock,
            image_url: Some(format!("/images/{id}.png")),
            category_id: Some(CategoryId::new(category)),
        };

        Self {
            users: vec![
                MockUser {
                    id: UserId::new(1),
                    email: CUSTOMER_EMAIL.to_string(),
                    password: CUSTOMER_PASSWORD.to_string(),
                    role: Role::Customer,
                },
                MockUser {
                    id: UserId::new(2),
                    email: ADMIN_EMAIL.to_string(),
                    password: ADMIN_PASSWORD.to_string(),
                    role: Role::Admin,
                },
            ],
            tokens: HashMap::new(),
            token_ttl_secs: 3600,
            products: vec![
                product(1, "Dried Mango", 899, 40, 1),
                product(2, "Pineapple Rings", 650, 0, 1),
                product(3, "Green Tea", 1200, 10, 2),
                product(4, "Chai", 925, 5, 2),
            ],
            categories: vec![
                Category {
                    id: CategoryId::new(1),
                    name: "Dried Fruit".to_string(),
                    description: None,
                },
                Category {
                    id: CategoryId::new(2),
                    name: "Tea".to_string(),
                    description: None,
                },
            ],
            addresses: Vec::new(),
            orders: Vec::new(),
            payments: Vec::new(),
            payment_script: vec![PaymentStatus::Pending, PaymentStatus::Completed],
            delays: HashMap::new(),
            requests: Vec::new(),
            next_id: 100,
        }
    }

    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_token(&mut self, user: &MockUser) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = serde_json::json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "role": user.role,
            "exp": chrono::Utc::now().timestamp() + self.token_ttl_secs,
            "jti": uuid::Uuid::new_v4().to_string(),
        });
        let token = format!(
            "{header}.{}.mock-signature",
            URL_SAFE_NO_PAD.encode(payload.to_string())
        );
        self.tokens.insert(token.clone(), user.id);
        token
    }
}

/// Handle to the mock's data, shared with the running server.
#[derive(Clone)]
pub struct MockState {
    db: Arc<Mutex<Db>>,
}

impl MockState {
    fn db(&self) -> MutexGuard<'_, Db> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Statuses reported by successive checks of the next payments created.
    /// The last status repeats once the script runs out.
    pub fn set_payment_script(&self, statuses: impl IntoIterator<Item = PaymentStatus>) {
        self.db().payment_script = statuses.into_iter().collect();
    }

    /// Lifetime of tokens issued from now on.
    pub fn set_token_ttl_secs(&self, secs: i64) {
        self.db().token_ttl_secs = secs;
    }

    /// Hold the next request to `path_and_query` (e.g., `/api/products?page=1&limit=10`)
    /// for `delay` before answering it.
    pub fn delay_once(&self, path_and_query: &str, delay: Duration) {
        self.db().delays.insert(path_and_query.to_string(), delay);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.db().requests.clone()
    }

    /// Number of requests received for `method` and `path` (without query).
    #[must_use]
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.db()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.db().products.iter().find(|p| p.id == id).cloned()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.db().orders.iter().map(|o| o.order.clone()).collect()
    }
}

// =============================================================================
// Server
// =============================================================================

/// A running mock API. The server stops when this is dropped.
pub struct MockApi {
    base_url: Url,
    state: MockState,
    server: JoinHandle<()>,
}

impl MockApi {
    /// Start a seeded mock API on an ephemeral local port.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = MockState {
            db: Arc::new(Mutex::new(Db::seeded())),
        };

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}/api"))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            base_url,
            state,
            server,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn state(&self) -> &MockState {
        &self.state
    }

    /// Storefront configuration pointing at this mock, with payment polling
    /// shortened to keep tests fast.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig {
            payment_poll: PaymentPollConfig {
                interval: Duration::from_millis(20),
                timeout: Duration::from_millis(500),
            },
            ..StorefrontConfig::for_api(self.base_url.clone())
        }
    }
}

/// A fresh storefront session against `api`, stored in memory.
///
/// # Errors
///
/// Returns an error if the storage slots cannot be bound.
pub fn storefront(api: &MockApi) -> Result<Storefront, StorageError> {
    storefront_with_store(api, Arc::new(MemoryStore::new()))
}

/// A storefront session against `api` on top of `store`.
///
/// # Errors
///
/// Returns an error if the storage slots cannot be bound.
pub fn storefront_with_store(
    api: &MockApi,
    store: Arc<dyn KeyValueStore>,
) -> Result<Storefront, StorageError> {
    Storefront::with_store(api.config(), store)
}

/// Sign `storefront` in through the login form.
///
/// # Errors
///
/// Returns the validation or sign-in error.
pub async fn sign_in(
    storefront: &Storefront,
    email: &str,
    password: &str,
    remember_me: bool,
) -> Result<Identity, AppError> {
    let form = LoginForm {
        email: email.to_string(),
        password: password.to_string(),
        remember_me,
    };
    let credentials = form.validate()?;
    Ok(storefront.auth().login(&credentials, form.remember_me).await?)
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: MockState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            axum::routing::put(update_category).delete(delete_category),
        )
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/{id}",
            axum::routing::put(update_address).delete(delete_address),
        )
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/admin/orders", get(list_all_orders))
        .route("/payments", post(initiate_payment))
        .route("/payments/{id}", get(get_payment));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

/// Record every request, then apply any one-shot delay registered for it.
async fn record(State(state): State<MockState>, request: Request, next: Next) -> Response {
    let uri = request.uri();
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        request_id: request
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        bearer: request.headers().contains_key(header::AUTHORIZATION),
    };

    let delay = {
        let mut db = state.db();
        db.requests.push(recorded);
        db.delays.remove(&path_and_query)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    next.run(request).await
}

// =============================================================================
// Errors & helpers
// =============================================================================

/// Error response in the API's `{"detail": ...}` shape.
struct MockError {
    status: StatusCode,
    detail: serde_json::Value,
}

impl MockError {
    fn new(status: StatusCode, detail: &str) -> Self {
        Self {
            status,
            detail: serde_json::Value::String(detail.to_string()),
        }
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, &format!("{what} not found"))
    }

    /// Field validation failure: `{"detail": [{"loc": [...], "msg": ...}]}`.
    fn invalid(field: &str, msg: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: serde_json::json!([{"loc": ["body", field], "msg": msg}]),
        }
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({"detail": self.detail}))).into_response()
    }
}

type MockResult<T> = Result<T, MockError>;

fn authenticate(state: &MockState, headers: &HeaderMap) -> MockResult<MockUser> {
    let unauthorized = || MockError::new(StatusCode::UNAUTHORIZED, "Not authenticated");
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;

    let db = state.db();
    let user_id = db.tokens.get(token).copied().ok_or_else(unauthorized)?;
    db.users
        .iter()
        .find(|u| u.id == user_id)
        .cloned()
        .ok_or_else(unauthorized)
}

fn authenticate_admin(state: &MockState, headers: &HeaderMap) -> MockResult<MockUser> {
    let user = authenticate(state, headers)?;
    if user.role == Role::Admin {
        Ok(user)
    } else {
        Err(MockError::new(StatusCode::FORBIDDEN, "Admin access required"))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
    category_id: Option<i32>,
}

impl ListQuery {
    fn matches(&self, text: &str) -> bool {
        self.search
            .as_deref()
            .is_none_or(|search| text.to_lowercase().contains(&search.to_lowercase()))
    }

    fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(10).clamp(1, 100);
        let total = u64::try_from(items.len()).unwrap_or(u64::MAX);
        let per_page = usize::try_from(limit).unwrap_or(usize::MAX);
        let skip = usize::try_from(page - 1)
            .unwrap_or(usize::MAX)
            .saturating_mul(per_page);
        let items = items.into_iter().skip(skip).take(per_page).collect();
        Page::new(items, total, page, limit)
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(
    State(state): State<MockState>,
    Json(body): Json<LoginBody>,
) -> MockResult<Json<serde_json::Value>> {
    let mut db = state.db();
    let user = db
        .users
        .iter()
        .find(|u| u.email == body.email && u.password == body.password)
        .cloned()
        .ok_or_else(|| MockError::new(StatusCode::UNAUTHORIZED, "Incorrect email or password"))?;
    let token = db.issue_token(&user);
    Ok(Json(serde_json::json!({
        "access_token": token,
        "token_type": "bearer",
    })))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Deserialize)]
struct ProductBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    price: Price,
    stock: u32,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    category_id: Option<CategoryId>,
}

impl ProductBody {
    fn into_product(self, id: ProductId) -> MockResult<Product> {
        if !self.price.is_positive() {
            return Err(MockError::invalid("price", "Price must be greater than 0"));
        }
        Ok(Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            image_url: self.image_url,
            category_id: self.category_id,
        })
    }
}

async fn list_products(
    State(state): State<MockState>,
    Query(query): Query<ListQuery>,
) -> Json<Page<Product>> {
    let products = state
        .db()
        .products
        .iter()
        .filter(|p| {
            query
                .category_id
                .is_none_or(|category| p.category_id == Some(CategoryId::new(category)))
        })
        .filter(|p| query.matches(&p.name))
        .cloned()
        .collect();
    Json(query.paginate(products))
}

async fn get_product(
    State(state): State<MockState>,
    Path(id): Path<i32>,
) -> MockResult<Json<Product>> {
    state
        .product(ProductId::new(id))
        .map(Json)
        .ok_or_else(|| MockError::not_found("Product"))
}

async fn create_product(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<ProductBody>,
) -> MockResult<(StatusCode, Json<Product>)> {
    authenticate_admin(&state, &headers)?;
    let mut db = state.db();
    let product = body.into_product(ProductId::new(db.next_id()))?;
    db.products.push(product.clone());
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<ProductBody>,
) -> MockResult<Json<Product>> {
    authenticate_admin(&state, &headers)?;
    let product = body.into_product(ProductId::new(id))?;
    let mut db = state.db();
    let row = db
        .products
        .iter_mut()
        .find(|p| p.id == product.id)
        .ok_or_else(|| MockError::not_found("Product"))?;
    *row = product.clone();
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> MockResult<StatusCode> {
    authenticate_admin(&state, &headers)?;
    let mut db = state.db();
    let before = db.products.len();
    db.products.retain(|p| p.id != ProductId::new(id));
    if db.products.len() == before {
        return Err(MockError::not_found("Product"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct CategoryBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

async fn list_categories(
    State(state): State<MockState>,
    Query(query): Query<ListQuery>,
) -> Json<Page<Category>> {
    let categories = state
        .db()
        .categories
        .iter()
        .filter(|c| query.matches(&c.name))
        .cloned()
        .collect();
    Json(query.paginate(categories))
}

async fn create_category(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<CategoryBody>,
) -> MockResult<(StatusCode, Json<Category>)> {
    authenticate_admin(&state, &headers)?;
    let mut db = state.db();
    if db.categories.iter().any(|c| c.name == body.name) {
        return Err(MockError::new(
            StatusCode::CONFLICT,
            "Category already exists",
        ));
    }
    let category = Category {
        id: CategoryId::new(db.next_id()),
        name: body.name,
        description: body.description,
    };
    db.categories.push(category.clone());
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<CategoryBody>,
) -> MockResult<Json<Category>> {
    authenticate_admin(&state, &headers)?;
    let mut db = state.db();
    let row = db
        .categories
        .iter_mut()
        .find(|c| c.id == CategoryId::new(id))
        .ok_or_else(|| MockError::not_found("Category"))?;
    row.name = body.name;
    row.description = body.description;
    Ok(Json(row.clone()))
}

async fn delete_category(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> MockResult<StatusCode> {
    authenticate_admin(&state, &headers)?;
    let mut db = state.db();
    let before = db.categories.len();
    db.categories.retain(|c| c.id != CategoryId::new(id));
    if db.categories.len() == before {
        return Err(MockError::not_found("Category"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Addresses
// =============================================================================

#[derive(Deserialize)]
struct AddressBody {
    recipient_name: String,
    street: String,
    city: String,
    #[serde(default)]
    state: Option<String>,
    postal_code: String,
    country: String,
    phone: String,
    #[serde(default)]
    is_default: bool,
}

impl AddressBody {
    fn into_address(self, id: AddressId) -> Address {
        Address {
            id,
            recipient_name: self.recipient_name,
            street: self.street,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
            is_default: self.is_default,
        }
    }
}

fn store_address(db: &mut Db, owner: UserId, address: Address) {
    let first = !db.addresses.iter().any(|a| a.owner == owner);
    let is_default = address.is_default || first;
    if is_default {
        for stored in db.addresses.iter_mut().filter(|a| a.owner == owner) {
            stored.address.is_default = false;
        }
    }
    let address = Address {
        is_default,
        ..address
    };
    match db
        .addresses
        .iter_mut()
        .find(|a| a.owner == owner && a.address.id == address.id)
    {
        Some(stored) => stored.address = address,
        None => db.addresses.push(StoredAddress { owner, address }),
    }
}

async fn list_addresses(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> MockResult<Json<Page<Address>>> {
    let user = authenticate(&state, &headers)?;
    let addresses = state
        .db()
        .addresses
        .iter()
        .filter(|a| a.owner == user.id)
        .map(|a| a.address.clone())
        .collect();
    Ok(Json(query.paginate(addresses)))
}

async fn create_address(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<AddressBody>,
) -> MockResult<(StatusCode, Json<Address>)> {
    let user = authenticate(&state, &headers)?;
    if body.recipient_name.trim().is_empty() {
        return Err(MockError::invalid("recipient_name", "Recipient name is required"));
    }
    let mut db = state.db();
    let id = AddressId::new(db.next_id());
    store_address(&mut db, user.id, body.into_address(id));
    let address = db
        .addresses
        .iter()
        .find(|a| a.address.id == id)
        .map(|a| a.address.clone())
        .ok_or_else(|| MockError::not_found("Address"))?;
    Ok((StatusCode::CREATED, Json(address)))
}

async fn update_address(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<AddressBody>,
) -> MockResult<Json<Address>> {
    let user = authenticate(&state, &headers)?;
    let id = AddressId::new(id);
    let mut db = state.db();
    if !db.addresses.iter().any(|a| a.owner == user.id && a.address.id == id) {
        return Err(MockError::not_found("Address"));
    }
    store_address(&mut db, user.id, body.into_address(id));
    db.addresses
        .iter()
        .find(|a| a.address.id == id)
        .map(|a| Json(a.address.clone()))
        .ok_or_else(|| MockError::not_found("Address"))
}

async fn delete_address(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> MockResult<StatusCode> {
    let user = authenticate(&state, &headers)?;
    let mut db = state.db();
    let before = db.addresses.len();
    db.addresses
        .retain(|a| !(a.owner == user.id && a.address.id == AddressId::new(id)));
    if db.addresses.len() == before {
        return Err(MockError::not_found("Address"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Deserialize)]
struct OrderBody {
    address_id: AddressId,
    payment_method: PaymentMethod,
    items: Vec<OrderLineBody>,
}

#[derive(Deserialize)]
struct OrderLineBody {
    product_id: ProductId,
    quantity: u32,
}

async fn create_order(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<OrderBody>,
) -> MockResult<(StatusCode, Json<Order>)> {
    let user = authenticate(&state, &headers)?;
    if body.items.is_empty() {
        return Err(MockError::new(StatusCode::BAD_REQUEST, "Order has no items"));
    }

    let mut db = state.db();
    if !db
        .addresses
        .iter()
        .any(|a| a.owner == user.id && a.address.id == body.address_id)
    {
        return Err(MockError::not_found("Address"));
    }

    // Check every line before touching stock.
    let mut items = Vec::with_capacity(body.items.len());
    for line in &body.items {
        let product = db
            .products
            .iter()
            .find(|p| p.id == line.product_id)
            .ok_or_else(|| MockError::not_found("Product"))?;
        if line.quantity == 0 || product.stock < line.quantity {
            return Err(MockError::new(
                StatusCode::BAD_REQUEST,
                &format!("Insufficient stock for {}", product.name),
            ));
        }
        items.push(OrderItem {
            product_id: product.id,
            name: Some(product.name.clone()),
            price: product.price,
            quantity: line.quantity,
        });
    }
    for item in &items {
        if let Some(product) = db.products.iter_mut().find(|p| p.id == item.product_id) {
            product.stock -= item.quantity;
        }
    }

    let order = Order {
        id: OrderId::new(db.next_id()),
        status: OrderStatus::Pending,
        total: items.iter().map(|item| item.price * item.quantity).sum(),
        payment_method: body.payment_method,
        address_id: Some(body.address_id),
        items,
        created_at: Some(chrono::Utc::now()),
    };
    db.orders.push(StoredOrder {
        owner: user.id,
        order: order.clone(),
    });
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> MockResult<Json<Page<Order>>> {
    let user = authenticate(&state, &headers)?;
    let orders = state
        .db()
        .orders
        .iter()
        .rev()
        .filter(|o| o.owner == user.id)
        .map(|o| o.order.clone())
        .collect();
    Ok(Json(query.paginate(orders)))
}

async fn list_all_orders(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> MockResult<Json<Page<Order>>> {
    authenticate_admin(&state, &headers)?;
    let orders = state
        .db()
        .orders
        .iter()
        .rev()
        .filter(|o| query.matches(o.order.status.as_str()))
        .map(|o| o.order.clone())
        .collect();
    Ok(Json(query.paginate(orders)))
}

#[derive(Deserialize)]
struct StatusBody {
    status: OrderStatus,
}

async fn update_order_status(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(body): Json<StatusBody>,
) -> MockResult<Json<Order>> {
    authenticate_admin(&state, &headers)?;
    let mut db = state.db();
    let stored = db
        .orders
        .iter_mut()
        .find(|o| o.order.id == OrderId::new(id))
        .ok_or_else(|| MockError::not_found("Order"))?;
    if stored.order.status.is_final() {
        return Err(MockError::new(
            StatusCode::BAD_REQUEST,
            &format!("Order is already {}", stored.order.status),
        ));
    }
    stored.order.status = body.status;
    Ok(Json(stored.order.clone()))
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Deserialize)]
struct PaymentBody {
    order_id: OrderId,
}

async fn initiate_payment(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<PaymentBody>,
) -> MockResult<(StatusCode, Json<Payment>)> {
    let user = authenticate(&state, &headers)?;
    let mut db = state.db();
    let order = db
        .orders
        .iter()
        .find(|o| o.owner == user.id && o.order.id == body.order_id)
        .map(|o| o.order.clone())
        .ok_or_else(|| MockError::not_found("Order"))?;
    if !order.payment_method.requires_online_payment() {
        return Err(MockError::new(
            StatusCode::BAD_REQUEST,
            "Order is not paid online",
        ));
    }

    let id = PaymentId::new(db.next_id());
    let payment = Payment {
        id,
        order_id: order.id,
        status: PaymentStatus::Pending,
        checkout_url: Some(format!("https://pay.example/checkout/{id}")),
    };
    let script = db.payment_script.iter().copied().collect();
    db.payments.push(StoredPayment {
        owner: user.id,
        payment: payment.clone(),
        script,
    });
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn get_payment(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> MockResult<Json<Payment>> {
    let user = authenticate(&state, &headers)?;
    let mut db = state.db();
    let stored = db
        .payments
        .iter_mut()
        .find(|p| p.owner == user.id && p.payment.id == PaymentId::new(id))
        .ok_or_else(|| MockError::not_found("Payment"))?;

    // Advance the script, keeping its last status once exhausted.
    let next = if stored.script.len() > 1 {
        stored.script.pop_front()
    } else {
        stored.script.front().copied()
    };
    if let Some(status) = next {
        stored.payment.status = status;
    }
    let payment = stored.payment.clone();

    if payment.status == PaymentStatus::Completed {
        if let Some(order) = db.orders.iter_mut().find(|o| o.order.id == payment.order_id) {
            order.order.status = OrderStatus::Paid;
        }
    }
    Ok(Json(payment))
}
