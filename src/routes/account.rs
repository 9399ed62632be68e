use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_email::Email;

use crate::db::account::{AccountRepository, InsertOutcome, NewAccount, Role};
use crate::db::utils::format_registration_date;
use crate::error::ApiError;
use crate::referral::{self, MAX_ALLOCATION_ATTEMPTS};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    /// The shared onboarding gate code, not the personal code the account
    /// will receive.
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub personal_referral: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: SessionIdentity,
}

#[derive(Debug, Serialize)]
pub struct SessionIdentity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug)]
pub struct RegisteredAccount {
    pub id: i64,
    pub personal_referral: String,
}

/// Identity slice of the profile view. The ledger half is composed in by
/// the profile route.
#[derive(Debug)]
pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub registration_date: String,
    pub referral_code: Option<String>,
}

// Account service
pub struct AccountService {
    pub repo: AccountRepository,
    onboarding_gate: String,
}

impl AccountService {
    pub fn new(repo: AccountRepository, onboarding_gate: String) -> Self {
        Self {
            repo,
            onboarding_gate,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisteredAccount, ApiError> {
        let (Some(username), Some(email), Some(password), Some(gate)) =
            (req.username, req.email, req.password, req.referral_code)
        else {
            return Err(ApiError::validation(
                "Todos los campos son obligatorios, incluyendo el código de referido.",
            ));
        };
        if username.trim().is_empty() || password.is_empty() || gate.trim().is_empty() {
            return Err(ApiError::validation(
                "Todos los campos son obligatorios, incluyendo el código de referido.",
            ));
        }

        let email: Email = email
            .parse()
            .map_err(|_err| ApiError::validation("El correo electrónico no es válido."))?;

        if gate != self.onboarding_gate {
            tracing::warn!("registration rejected by gate code for email: {}", email);
            return Err(ApiError::InvalidReferralGate);
        }

        // Check if user already exists
        if self.repo.identity_exists(&username, email.as_str()).await? {
            return Err(ApiError::Conflict);
        }

        // Hash password
        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(ApiError::Hashing)?
            .to_string();

        let account = self
            .create_with_referral(
                &username,
                email.as_str(),
                req.phone.as_deref(),
                &password_hash,
                || referral::generate_code(&mut rand::thread_rng()),
            )
            .await?;
        tracing::info!("account created for email: {}", email);
        Ok(account)
    }

    /// Inserts the row under a freshly drawn referral code, retrying on
    /// code collisions. The unique index is what actually guarantees
    /// uniqueness; the loop only picks new candidates.
    async fn create_with_referral(
        &self,
        username: &str,
        email: &str,
        phone: Option<&str>,
        password_hash: &str,
        mut next_code: impl FnMut() -> String,
    ) -> Result<RegisteredAccount, ApiError> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let code = next_code();
            let outcome = self
                .repo
                .insert(&NewAccount {
                    username,
                    email,
                    phone,
                    password_hash,
                    referral_code: &code,
                    role: Role::Usuario,
                })
                .await?;
            match outcome {
                InsertOutcome::Created(id) => {
                    return Ok(RegisteredAccount {
                        id,
                        personal_referral: code,
                    })
                }
                InsertOutcome::ReferralTaken => {
                    tracing::warn!("referral code {} already taken, drawing again", code);
                }
                InsertOutcome::IdentityTaken => return Err(ApiError::Conflict),
            }
        }
        Err(ApiError::AllocationExhausted(MAX_ALLOCATION_ATTEMPTS))
    }

    pub async fn authenticate(&self, req: LoginRequest) -> Result<SessionIdentity, ApiError> {
        let (Some(email), Some(password)) = (req.email, req.password) else {
            return Err(ApiError::validation(
                "Correo electrónico y contraseña son requeridos.",
            ));
        };
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::validation(
                "Correo electrónico y contraseña son requeridos.",
            ));
        }

        // Find user
        let Some(row) = self.repo.find_by_email(&email).await? else {
            tracing::warn!("login rejected for email: {}", email);
            return Err(ApiError::InvalidCredentials);
        };

        // Verify password
        let parsed_hash = match PasswordHash::new(&row.password_hash) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::error!("stored hash unreadable for account {}: {}", row.id, err);
                return Err(ApiError::InvalidCredentials);
            }
        };
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("login rejected for email: {}", email);
            return Err(ApiError::InvalidCredentials);
        }
        tracing::info!("login accepted for account {}", row.id);

        Ok(SessionIdentity {
            id: row.id,
            username: row.username,
            email: row.email,
        })
    }

    pub async fn get_profile(&self, account_id: i64) -> Result<ProfileView, ApiError> {
        let row = self
            .repo
            .find_by_id(account_id)
            .await?
            .ok_or(ApiError::AccountNotFound)?;

        let role = Role::parse(&row.role).ok_or_else(|| {
            ApiError::CorruptAccount(account_id, format!("unknown role: {}", row.role))
        })?;
        let registered_at = row.created_at.unwrap_or_else(|| Utc::now().naive_utc());

        Ok(ProfileView {
            username: row.username,
            email: row.email,
            phone: row.phone,
            role,
            registration_date: format_registration_date(registered_at),
            referral_code: row.referral_code,
        })
    }
}

// Route for handling new user registration
pub async fn register_handler(
    State(service): State<Arc<AccountService>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = service.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registro exitoso. Ya puedes iniciar sesión.".to_string(),
            personal_referral: account.personal_referral,
        }),
    ))
}

// Route for handling user login
pub async fn login_handler(
    State(service): State<Arc<AccountService>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = service.authenticate(req).await?;
    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            message: "Login successful.".to_string(),
            user,
        }),
    ))
}

pub fn account_routes(service: Arc<AccountService>) -> Router {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .with_state(service)
}
