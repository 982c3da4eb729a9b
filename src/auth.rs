//! Local accounts and login through the console platforms' identity providers.

use {
    rocket_oauth2::{
        OAuth2,
        TokenResponse,
    },
    crate::{
        config::ConfigIdentityProvider,
        http::InternalError,
        prelude::*,
        store::{
            self,
            Transaction,
        },
        user::{
            self,
            is_valid_email,
        },
    },
};

/// Marker type for Xbox network sign-in.
pub(crate) struct XboxLive;
/// Marker type for PlayStation Network sign-in.
pub(crate) struct PlayStation;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Hash(#[from] argon2::password_hash::Error),
    #[error(transparent)] Store(#[from] store::Error),
    #[error("An account with this email already exists. Log in with your password instead.")]
    EmailTaken,
    #[error("Please enter a username.")]
    EmptyUsername,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("{0} is not a valid email address.")]
    InvalidEmail(String),
    #[error("The identity provider did not share an email address.")]
    MissingEmail,
    #[error("Passwords must be at least {MIN_PASSWORD_LENGTH} characters long.")]
    PasswordTooShort,
    #[error("That username is taken.")]
    UsernameTaken,
}

impl Error {
    /// The message to show the user, or the internal error if there's nothing they can do about it.
    fn into_flash_message(self) -> Result<String, InternalError> {
        match self {
            Self::Hash(e) => Err(e.into()),
            Self::Store(e) => Err(e.into()),
            _ => Ok(self.to_string()),
        }
    }
}

pub(crate) struct NewAccount<'a> {
    pub(crate) username: &'a str,
    pub(crate) email: &'a str,
    pub(crate) password: &'a str,
    pub(crate) platform: Shard,
}

pub(crate) async fn create_account(store: &dyn Store, account: NewAccount<'_>) -> Result<User, Error> {
    let username = account.username.trim();
    if username.is_empty() {
        return Err(Error::EmptyUsername)
    }
    let email = account.email.trim();
    if !is_valid_email(email) {
        return Err(Error::InvalidEmail(email.to_owned()))
    }
    if account.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::PasswordTooShort)
    }
    let mut transaction = store.begin().await?;
    if transaction.user_by_username(username).await?.is_some() {
        return Err(Error::UsernameTaken)
    }
    if transaction.user_by_email(email).await?.is_some() {
        return Err(Error::EmailTaken)
    }
    let mut user = User::new(username.to_owned(), email.to_owned(), account.platform);
    user.set_password(account.password)?;
    transaction.insert_user(&user).await?;
    transaction.commit().await?;
    log::info!("new local account {} ({user})", user.id);
    Ok(user)
}

/// Looks up an account by username or email and checks its password.
pub(crate) async fn check_credentials(store: &dyn Store, login: &str, password: &str) -> Result<User, Error> {
    let login = login.trim();
    let mut transaction = store.begin().await?;
    let user = match transaction.user_by_username(login).await? {
        Some(user) => Some(user),
        None => transaction.user_by_email(login).await?,
    };
    transaction.commit().await?;
    user.filter(|user| user.check_password(password)).ok_or(Error::InvalidCredentials)
}

/// The userinfo document of an identity provider.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserInfo {
    pub(crate) sub: String,
    #[serde(default)]
    pub(crate) preferred_username: Option<String>,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) email: Option<String>,
}

impl UserInfo {
    fn display_name(&self) -> Option<&str> {
        self.preferred_username.as_deref().or(self.name.as_deref()).map(str::trim).filter(|name| !name.is_empty())
    }
}

async fn unique_username(transaction: &mut (dyn Transaction + '_), base: &str) -> Result<String, store::Error> {
    let mut candidate = base.to_owned();
    let mut suffix = 1;
    while transaction.user_by_username(&candidate).await?.is_some() {
        suffix += 1;
        candidate = format!("{base}{suffix}");
    }
    Ok(candidate)
}

/// Signs in the user linked to the identity provider's subject, creating one on first login.
///
/// A new account takes the provider's display name as its username (with a numeric suffix if taken)
/// and the provider's handle for that platform as its in-game handle.
pub(crate) async fn federated_login(store: &dyn Store, shard: Shard, info: &UserInfo) -> Result<User, Error> {
    let mut transaction = store.begin().await?;
    if let Some(user) = transaction.user_by_subject(shard, &info.sub).await? {
        transaction.commit().await?;
        return Ok(user)
    }
    let email = info.email.as_deref().map(str::trim).filter(|email| !email.is_empty()).ok_or(Error::MissingEmail)?;
    if transaction.user_by_email(email).await?.is_some() {
        return Err(Error::EmailTaken)
    }
    let display_name = info.display_name();
    let username = unique_username(&mut *transaction, display_name.unwrap_or(&format!("{}_player", serde_plain::to_string(&shard).unwrap_or_default()))).await?;
    let mut user = User::new(username, email.to_owned(), shard);
    user.set_subject(shard, info.sub.clone());
    if let Some(handle) = display_name.filter(|handle| shard.is_valid_handle(handle)) {
        match shard {
            Shard::Xbox => user.xbox_gamertag = Some(handle.to_owned()),
            Shard::Psn => user.psn_id = Some(handle.to_owned()),
        }
    }
    transaction.insert_user(&user).await?;
    transaction.commit().await?;
    log::info!("provisioned user {} ({user}) from {} sign-in", user.id, shard.display_name());
    Ok(user)
}

#[derive(FromForm)]
pub(crate) struct RegisterForm {
    username: String,
    email: String,
    password: String,
    platform: Shard,
}

#[rocket::post("/register", data = "<form>")]
pub(crate) async fn register(store: &State<Arc<dyn Store>>, cookies: &CookieJar<'_>, form: Form<RegisterForm>) -> Result<Flash<Redirect>, InternalError> {
    match create_account(&***store, NewAccount {
        username: &form.username,
        email: &form.email,
        password: &form.password,
        platform: form.platform,
    }).await {
        Ok(user) => {
            user::sign_in(cookies, &user);
            Ok(Flash::success(Redirect::to(uri!(crate::api::me)), format!("Welcome, {user}!")))
        }
        Err(e) => Ok(Flash::error(Redirect::to(uri!(crate::api::index)), e.into_flash_message()?)),
    }
}

#[derive(FromForm)]
pub(crate) struct LoginForm {
    login: String,
    password: String,
}

#[rocket::post("/login", data = "<form>")]
pub(crate) async fn login(store: &State<Arc<dyn Store>>, cookies: &CookieJar<'_>, form: Form<LoginForm>) -> Result<Flash<Redirect>, InternalError> {
    match check_credentials(&***store, &form.login, &form.password).await {
        Ok(user) => {
            user::sign_in(cookies, &user);
            Ok(Flash::success(Redirect::to(uri!(crate::api::me)), format!("Welcome back, {user}!")))
        }
        Err(e) => Ok(Flash::error(Redirect::to(uri!(crate::api::index)), e.into_flash_message()?)),
    }
}

#[rocket::get("/logout")]
pub(crate) fn logout(cookies: &CookieJar<'_>) -> Redirect {
    user::sign_out(cookies);
    Redirect::to(uri!(crate::api::index))
}

const SCOPES: &[&str] = &["openid", "profile", "email"];

#[rocket::get("/login/xbox")]
pub(crate) fn xbox_login(oauth: OAuth2<XboxLive>, cookies: &CookieJar<'_>) -> Result<Redirect, InternalError> {
    Ok(oauth.get_redirect(cookies, SCOPES)?)
}

#[rocket::get("/login/psn")]
pub(crate) fn psn_login(oauth: OAuth2<PlayStation>, cookies: &CookieJar<'_>) -> Result<Redirect, InternalError> {
    Ok(oauth.get_redirect(cookies, SCOPES)?)
}

async fn fetch_user_info(http_client: &reqwest::Client, provider: &ConfigIdentityProvider, access_token: &str) -> Result<UserInfo, reqwest::Error> {
    http_client.get(&provider.userinfo_uri)
        .bearer_auth(access_token)
        .send().await?
        .error_for_status()?
        .json().await
}

async fn finish_federated_login(store: &dyn Store, http_client: &reqwest::Client, provider: &ConfigIdentityProvider, cookies: &CookieJar<'_>, shard: Shard, access_token: &str) -> Result<Flash<Redirect>, InternalError> {
    let info = match fetch_user_info(http_client, provider, access_token).await {
        Ok(info) => info,
        Err(e) => {
            log::warn!("failed to fetch {} userinfo: {e} ({e:?})", shard.display_name());
            return Ok(Flash::error(Redirect::to(uri!(crate::api::index)), format!("Could not sign in with {}. Please try again.", shard.display_name())))
        }
    };
    match federated_login(store, shard, &info).await {
        Ok(user) => {
            user::sign_in(cookies, &user);
            Ok(Flash::success(Redirect::to(uri!(crate::api::me)), format!("Signed in as {user}.")))
        }
        Err(e) => Ok(Flash::error(Redirect::to(uri!(crate::api::index)), e.into_flash_message()?)),
    }
}

#[rocket::get("/auth/xbox")]
pub(crate) async fn xbox_callback(store: &State<Arc<dyn Store>>, http_client: &State<reqwest::Client>, config: &State<Config>, cookies: &CookieJar<'_>, token: TokenResponse<XboxLive>) -> Result<Flash<Redirect>, InternalError> {
    finish_federated_login(&***store, http_client, &config.xbox_oauth, cookies, Shard::Xbox, token.access_token()).await
}

#[rocket::get("/auth/psn")]
pub(crate) async fn psn_callback(store: &State<Arc<dyn Store>>, http_client: &State<reqwest::Client>, config: &State<Config>, cookies: &CookieJar<'_>, token: TokenResponse<PlayStation>) -> Result<Flash<Redirect>, InternalError> {
    finish_federated_login(&***store, http_client, &config.psn_oauth, cookies, Shard::Psn, token.access_token()).await
}
