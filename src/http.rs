use {
    base64::engine::{
        Engine as _,
        general_purpose::STANDARD as BASE64,
    },
    rocket::{
        Rocket,
        config::{
            LogLevel,
            SecretKey,
        },
        response::{
            self,
            Responder,
        },
    },
    rocket_oauth2::{
        OAuth2,
        OAuthConfig,
        StaticProvider,
    },
    crate::{
        api,
        auth,
        config::ConfigIdentityProvider,
        funding,
        money,
        payout::{
            self,
            PaymentProvider,
        },
        prelude::*,
        pubg::StatsProvider,
        settlement,
        store,
        tournament,
        user,
    },
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Base64(#[from] base64::DecodeError),
    #[error("secret key must be at least 64 bytes, got {0}")]
    SecretKeyLength(usize),
}

#[derive(rocket::Responder)]
pub(crate) enum StatusOrError<E> {
    Status(Status),
    Err(E),
}

impl From<store::Error> for StatusOrError<InternalError> {
    fn from(e: store::Error) -> Self {
        Self::Err(e.into())
    }
}

impl From<money::Overflow> for StatusOrError<InternalError> {
    fn from(e: money::Overflow) -> Self {
        Self::Err(e.into())
    }
}

/// A failure the user can't do anything about. Logged, then reported as a bare 500.
#[derive(Debug, thiserror::Error)]
pub(crate) enum InternalError {
    #[error(transparent)] Hash(#[from] argon2::password_hash::Error),
    #[error(transparent)] Money(#[from] money::Overflow),
    #[error(transparent)] OAuth(#[from] rocket_oauth2::Error),
    #[error(transparent)] Store(#[from] store::Error),
}

impl<'r> Responder<'r, 'static> for InternalError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        log::error!("internal server error while responding to {} {}: {self} ({self:?})", request.method(), request.uri());
        Err(Status::InternalServerError)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    error: &'static str,
}

impl ErrorBody {
    fn new(status: Status) -> Json<Self> {
        Json(Self {
            status: status.code,
            error: status.reason_lossy(),
        })
    }
}

#[rocket::catch(401)]
fn unauthorized() -> Json<ErrorBody> {
    ErrorBody::new(Status::Unauthorized)
}

#[rocket::catch(404)]
fn not_found() -> Json<ErrorBody> {
    ErrorBody::new(Status::NotFound)
}

#[rocket::catch(422)]
fn unprocessable_content(request: &Request<'_>) -> Json<ErrorBody> {
    log::debug!("rejected malformed form for {} {}", request.method(), request.uri());
    ErrorBody::new(Status::UnprocessableEntity)
}

#[rocket::catch(500)]
fn internal_server_error() -> Json<ErrorBody> {
    ErrorBody::new(Status::InternalServerError)
}

#[rocket::catch(default)]
fn fallback_catcher(status: Status, request: &Request<'_>) -> Json<ErrorBody> {
    log::warn!("responding with unexpected HTTP status code {} {} to request {request:?}", status.code, status.reason_lossy());
    ErrorBody::new(status)
}

fn oauth_config(provider: &ConfigIdentityProvider, redirect_uri: String) -> OAuthConfig {
    OAuthConfig::new(
        StaticProvider {
            auth_uri: provider.auth_uri.clone().into(),
            token_uri: provider.token_uri.clone().into(),
        },
        provider.client_id.clone(),
        provider.client_secret.clone(),
        Some(redirect_uri),
    )
}

pub(crate) fn rocket(config: Config, store: Arc<dyn Store>, stats: Arc<dyn StatsProvider>, payments: Arc<dyn PaymentProvider>, http_client: reqwest::Client, port: u16) -> Result<Rocket<rocket::Build>, Error> {
    let secret_key = BASE64.decode(&config.secret_key)?;
    if secret_key.len() < 64 {
        return Err(Error::SecretKeyLength(secret_key.len()))
    }
    Ok(rocket::custom(rocket::Config::figment().merge(rocket::Config {
        secret_key: SecretKey::from(&secret_key),
        log_level: LogLevel::Critical,
        ..rocket::Config::default()
    }).merge(("port", port)))
    .mount("/", rocket::routes![
        api::index,
        api::tournaments,
        api::tournament,
        api::me,
        api::me_payouts,
        auth::register,
        auth::login,
        auth::logout,
        auth::xbox_login,
        auth::psn_login,
        auth::xbox_callback,
        auth::psn_callback,
        funding::donate_post,
        funding::earn_credit,
        funding::init_sponsors_post,
        payout::payout_post,
        settlement::sync_stats,
        tournament::add_tournament,
        tournament::status_post,
        tournament::register_post,
        user::update_profile_post,
    ])
    .register("/", rocket::catchers![
        unauthorized,
        not_found,
        unprocessable_content,
        internal_server_error,
        fallback_catcher,
    ])
    .attach(OAuth2::<auth::XboxLive>::custom(rocket_oauth2::HyperRustlsAdapter::default(), oauth_config(
        &config.xbox_oauth,
        uri!(crate::base_uri(), auth::xbox_callback).to_string(),
    )))
    .attach(OAuth2::<auth::PlayStation>::custom(rocket_oauth2::HyperRustlsAdapter::default(), oauth_config(
        &config.psn_oauth,
        uri!(crate::base_uri(), auth::psn_callback).to_string(),
    )))
    .manage(config)
    .manage(store)
    .manage(stats)
    .manage(payments)
    .manage(http_client))
}
