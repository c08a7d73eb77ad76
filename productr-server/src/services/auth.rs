//! Password and OTP authentication.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::middleware::auth::create_token;
use crate::models::user::{NewUser, SignupRequest, User, UserPatch};
use crate::services::mailer::OtpMailer;
use crate::services::otp::{IssuedOtp, OtpError, OtpLedger};
use crate::services::password::PasswordHasher;
use crate::store::{Store, StoreError, UserFilter};
use crate::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Profile given to accounts created by OTP verification.
const PROVISIONED_FIRST_NAME: &str = "User";
const PROVISIONED_LAST_NAME: &str = "";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    /// Unknown email or wrong password; deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Otp(#[from] OtpError),

    /// OTP was valid but no account exists and auto-provisioning is off.
    #[error("no account registered for this email")]
    NoAccount,

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing error: {0}")]
    PasswordHash(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// A freshly issued token and the user it was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Trim and lowercase an email, rejecting anything that does not look like
/// `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::Validation("Please provide a valid email".to_string()))
    }
}

pub struct AuthService<'a> {
    store: &'a Store,
    hasher: &'a PasswordHasher,
    otp: &'a OtpLedger,
    mailer: &'a Arc<dyn OtpMailer>,
    jwt_secret: &'a str,
    auto_provision: bool,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            store: &state.store,
            hasher: &state.hasher,
            otp: &state.otp,
            mailer: &state.mailer,
            jwt_secret: &state.jwt_secret,
            auto_provision: state.policies.otp_auto_provision,
        }
    }

    fn session(&self, user: User) -> Result<Session, AuthError> {
        let token = create_token(&user.id, self.jwt_secret)?;
        Ok(Session { token, user })
    }

    // =========================================================================
    // Password authentication
    // =========================================================================

    #[instrument(name = "auth::signup", skip(self, req), fields(email = %req.email))]
    pub async fn signup(&self, req: SignupRequest) -> Result<Session, AuthError> {
        let email = normalize_email(&req.email)?;
        if req.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let first_name = req.first_name.trim();
        let last_name = req.last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AuthError::Validation(
                "First name and last name are required".to_string(),
            ));
        }

        // Skip the hashing cost for the common duplicate case. The insert
        // below still enforces uniqueness atomically.
        if self
            .store
            .users()
            .find_one(&UserFilter::Email(email.clone()))
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = self.hasher.hash(&req.password).await?;
        let user = self
            .store
            .users()
            .insert(NewUser {
                email,
                password_hash: Some(password_hash),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                phone_number: req.phone_number.filter(|p| !p.trim().is_empty()),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Store(other),
            })?;

        info!(user_id = %user.id, "User signed up");
        self.session(user)
    }

    #[instrument(name = "auth::login", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Please provide email and password".to_string(),
            ));
        }
        let email = normalize_email(email)?;

        let user = self
            .store
            .users()
            .find_one(&UserFilter::Email(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // OTP-provisioned accounts have no password to log in with.
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.is_active || !self.hasher.verify(hash, password).await? {
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "User logged in");
        self.session(user)
    }

    pub async fn profile(&self, user_id: &str) -> Result<User, AuthError> {
        self.store
            .users()
            .find_one(&UserFilter::Id(user_id.to_string()))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    #[instrument(name = "auth::update_profile", skip(self, patch))]
    pub async fn update_profile(&self, user_id: &str, patch: UserPatch) -> Result<User, AuthError> {
        self.store
            .users()
            .update_by_id(user_id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // OTP authentication
    // =========================================================================

    /// Issue a code for `email` and hand it to the mailer in the background.
    #[instrument(name = "auth::request_otp", skip(self))]
    pub fn request_otp(&self, email: &str) -> Result<IssuedOtp, AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        let email = normalize_email(email)?;
        let issued = self.otp.issue(&email);
        info!(email = %email, expires_at = %issued.expires_at, "OTP issued");

        let mailer = Arc::clone(self.mailer);
        let code = issued.code.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_otp(&email, &code).await {
                warn!(email = %email, error = %e, "OTP delivery failed");
            }
        });

        Ok(issued)
    }

    /// Consume the pending code and log the owner in, creating the account
    /// first when auto-provisioning is on.
    #[instrument(name = "auth::verify_otp", skip(self, code))]
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<Session, AuthError> {
        if email.trim().is_empty() || code.trim().is_empty() {
            return Err(AuthError::Validation(
                "Email and OTP are required".to_string(),
            ));
        }
        let email = normalize_email(email)?;
        self.otp.verify(&email, code.trim())?;

        let user = match self
            .store
            .users()
            .find_one(&UserFilter::Email(email.clone()))
            .await?
        {
            Some(user) => user,
            None if self.auto_provision => self.provision(email).await?,
            None => return Err(AuthError::NoAccount),
        };

        info!(user_id = %user.id, "OTP verified");
        self.session(user)
    }

    /// The `AutoProvisionOnVerify` transition.
    async fn provision(&self, email: String) -> Result<User, AuthError> {
        let inserted = self
            .store
            .users()
            .insert(NewUser {
                email: email.clone(),
                password_hash: None,
                first_name: PROVISIONED_FIRST_NAME.to_string(),
                last_name: PROVISIONED_LAST_NAME.to_string(),
                phone_number: None,
            })
            .await;

        match inserted {
            Ok(user) => {
                info!(user_id = %user.id, "Provisioned user from OTP verification");
                Ok(user)
            }
            // Lost a race with a concurrent signup for the same email.
            Err(StoreError::Conflict(_)) => self
                .store
                .users()
                .find_one(&UserFilter::Email(email))
                .await?
                .ok_or(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::validate_token;
    use crate::Policies;

    fn state(auto_provision: bool) -> AppState {
        AppState::for_tests(Policies {
            otp_auto_provision: auto_provision,
            ..Policies::default()
        })
    }

    fn signup_req(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            phone_number: None,
        }
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  A@X.com ").unwrap(), "a@x.com");
        for bad in ["", "ax.com", "a@", "@x.com", "a@x", "a@@x.com", "a b@x.com", "a@x."] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[tokio::test]
    async fn signup_then_login_yields_same_user() {
        let state = state(true);
        let auth = AuthService::new(&state);

        let signed_up = auth.signup(signup_req("a@x.com", "secret1")).await.unwrap();
        let logged_in = auth.login("A@x.com", "secret1").await.unwrap();

        assert_eq!(signed_up.user.id, logged_in.user.id);
        let claims = validate_token(&logged_in.token, &state.jwt_secret).unwrap();
        assert_eq!(claims.sub, signed_up.user.id);
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let state = state(true);
        let auth = AuthService::new(&state);
        auth.signup(signup_req("a@x.com", "secret1")).await.unwrap();

        let err = auth.signup(signup_req("A@X.COM", "secret2")).await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_any_write() {
        let state = state(true);
        let auth = AuthService::new(&state);

        let err = auth.signup(signup_req("a@x.com", "12345")).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(state.store.users().count(&UserFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let state = state(true);
        let auth = AuthService::new(&state);
        auth.signup(signup_req("a@x.com", "secret1")).await.unwrap();

        let wrong = auth.login("a@x.com", "wrong").await.unwrap_err();
        let unknown = auth.login("nobody@x.com", "secret1").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn otp_login_provisions_account_once() {
        let state = state(true);
        let auth = AuthService::new(&state);

        let issued = auth.request_otp("b@x.com").unwrap();
        assert_eq!(issued.code, "111111");
        assert!(matches!(
            auth.verify_otp("b@x.com", "000000").await.unwrap_err(),
            AuthError::Otp(OtpError::Invalid)
        ));

        let first = auth.verify_otp("b@x.com", "111111").await.unwrap();
        assert_eq!(first.user.first_name, "User");
        assert!(first.user.password_hash.is_none());
        assert!(matches!(
            auth.verify_otp("b@x.com", "111111").await.unwrap_err(),
            AuthError::Otp(OtpError::NotFound)
        ));

        auth.request_otp("b@x.com").unwrap();
        let second = auth.verify_otp("b@x.com", "111111").await.unwrap();
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(state.store.users().count(&UserFilter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn otp_without_auto_provision_requires_existing_account() {
        let state = state(false);
        let auth = AuthService::new(&state);

        auth.request_otp("b@x.com").unwrap();
        let err = auth.verify_otp("b@x.com", "111111").await.unwrap_err();
        assert!(matches!(err, AuthError::NoAccount));
        assert_eq!(state.store.users().count(&UserFilter::All).await.unwrap(), 0);

        auth.signup(signup_req("b@x.com", "secret1")).await.unwrap();
        auth.request_otp("b@x.com").unwrap();
        assert!(auth.verify_otp("b@x.com", "111111").await.is_ok());
    }

    #[tokio::test]
    async fn profile_update_is_partial() {
        let state = state(true);
        let auth = AuthService::new(&state);
        let session = auth.signup(signup_req("a@x.com", "secret1")).await.unwrap();

        let updated = auth
            .update_profile(
                &session.user.id,
                UserPatch {
                    last_name: Some("Smith".into()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "A");
        assert_eq!(updated.last_name, "Smith");

        assert!(matches!(
            auth.profile("missing").await.unwrap_err(),
            AuthError::UserNotFound
        ));
    }
}
