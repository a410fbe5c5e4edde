//! JSON-over-HTTP boundary. Handlers only marshal requests into service calls.

use {
    crate::{
        config::HttpConfig,
        metrics::{
            LOGINS_FAILED_TOTAL, TRANSACTIONS_CREATED_TOTAL, USERS_REGISTERED_TOTAL,
            handler::render,
        },
        models::{Transaction, TransactionPatch, User, UserKind, UserKindTag},
        repository::error::RepositoryError,
        services::AppServices,
    },
    axum::{
        Json, Router,
        extract::{FromRequest, Path, Request, State, rejection::JsonRejection},
        http::{StatusCode, header},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    rand::Rng,
    serde::{Deserialize, Serialize},
    serde_json::json,
    std::sync::Arc,
    thiserror::Error,
    tokio::{net::TcpListener, sync::broadcast},
    tracing::{error, info, warn},
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::InvalidBody(rejection) => (rejection.status(), self.to_string()),
            ApiError::Repository(RepositoryError::Model(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            ApiError::Repository(e) => {
                error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal storage error".to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

/// `Json` extractor whose rejections are answered with the same
/// `{success, message}` body as every other error.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// User as exposed over HTTP: never carries the password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicUser<'a> {
    id: Option<u64>,
    name: &'a str,
    email: &'a str,
    profile_image: &'a str,
    #[serde(flatten)]
    kind: &'a UserKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance: Option<f64>,
}

impl<'a> PublicUser<'a> {
    fn new(user: &'a User, balance: Option<f64>) -> Self {
        PublicUser {
            id: user.id,
            name: &user.name,
            email: &user.email,
            profile_image: &user.profile_image,
            kind: &user.kind,
            balance,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(rename = "type")]
    pub kind: UserKindTag,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub confirm_password: Option<String>,
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
}

impl RegisterRequest {
    fn into_user(self, profile_image: String) -> Result<User, ApiError> {
        if self.name.is_empty() || self.email.is_empty() || self.password.is_empty() {
            return Err(ApiError::BadRequest("Name, email and password are required"));
        }
        if self
            .confirm_password
            .as_ref()
            .is_some_and(|confirm| *confirm != self.password)
        {
            return Err(ApiError::BadRequest("Passwords do not match"));
        }

        let document = |value: Option<String>| value.filter(|document| !document.is_empty());

        match self.kind {
            UserKindTag::Natural => {
                let cpf = document(self.cpf).ok_or(ApiError::BadRequest("CPF is required"))?;
                Ok(User::natural(
                    self.name,
                    self.email,
                    self.password,
                    cpf,
                    profile_image,
                ))
            }
            UserKindTag::Legal => {
                let cnpj = document(self.cnpj).ok_or(ApiError::BadRequest("CNPJ is required"))?;
                Ok(User::legal(
                    self.name,
                    self.email,
                    self.password,
                    cnpj,
                    profile_image,
                ))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/users/{id}", get(get_user))
        .route("/api/users/{id}/transactions", get(list_user_transactions))
        .route(
            "/api/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/api/transactions/{id}",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route("/metrics", get(metrics))
        .with_state(services)
}

async fn register(
    State(services): State<Arc<AppServices>>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile_image = format!("/profile-{}.png", rand::rng().random_range(1..=6));
    let user = body.into_user(profile_image)?;

    let user_id = services.users.save(user)?;
    USERS_REGISTERED_TOTAL.inc();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "userId": user_id,
            "message": "User created successfully",
        })),
    ))
}

async fn login(
    State(services): State<Arc<AppServices>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.email.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required"));
    }

    let Some(user) = services.users.validate_login(&body.email, &body.password)? else {
        LOGINS_FAILED_TOTAL.inc();
        warn!("Rejected login attempt for {}", body.email);
        return Err(ApiError::InvalidCredentials);
    };

    Ok(Json(json!({
        "success": true,
        "user": PublicUser::new(&user, None),
        "message": "Logged in successfully",
    })))
}

async fn get_user(
    State(services): State<Arc<AppServices>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let found = services
        .users
        .get_user_with_balance(id)?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(json!(PublicUser::new(&found.user, Some(found.balance)))))
}

async fn list_user_transactions(
    State(services): State<Arc<AppServices>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = services.transactions.get_by_user_id(id)?;
    Ok(Json(json!({ "transactions": transactions })))
}

async fn list_transactions(
    State(services): State<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = services.transactions.get_all()?;
    Ok(Json(json!({ "transactions": transactions })))
}

async fn create_transaction(
    State(services): State<Arc<AppServices>>,
    ApiJson(transaction): ApiJson<Transaction>,
) -> Result<impl IntoResponse, ApiError> {
    let id = services.transactions.save(transaction)?;
    TRANSACTIONS_CREATED_TOTAL.inc();

    let stored = services
        .transactions
        .get_by_id(id)?
        .ok_or(ApiError::NotFound("Transaction"))?;

    Ok((StatusCode::CREATED, Json(stored)))
}

async fn get_transaction(
    State(services): State<Arc<AppServices>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = services
        .transactions
        .get_by_id(id)?
        .ok_or(ApiError::NotFound("Transaction"))?;

    Ok(Json(transaction))
}

async fn update_transaction(
    State(services): State<Arc<AppServices>>,
    Path(id): Path<u64>,
    ApiJson(patch): ApiJson<TransactionPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = services
        .transactions
        .update(id, patch)?
        .ok_or(ApiError::NotFound("Transaction"))?;

    Ok(Json(transaction))
}

async fn delete_transaction(
    State(services): State<Arc<AppServices>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = services
        .transactions
        .delete(id)?
        .ok_or(ApiError::NotFound("Transaction"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Transaction deleted successfully",
        "transaction": transaction,
    })))
}

async fn metrics() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], render())
}

/// Serves until a shutdown signal arrives. Failing to bind or to serve is
/// returned so the caller can stop the process.
pub async fn start_http_service(
    config: HttpConfig,
    services: Arc<AppServices>,
    mut shutdown_receiver: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let address = format!("{}:{}", config.address, config.port);
    let listener = TcpListener::bind(&address).await.inspect_err(|e| {
        error!("Failed to bind HTTP server to {}: {}", address, e);
    })?;

    let shutdown = async move {
        shutdown_receiver.recv().await.ok();
        info!("HTTP server is shutting down...");
    };

    info!("Initializing HTTP server at {}", address);

    axum::serve(listener, router(services))
        .with_graceful_shutdown(shutdown)
        .await
        .inspect_err(|e| error!("Error in HTTP server: {}", e))
}
