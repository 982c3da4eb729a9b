use {
    argon2::{
        Argon2,
        PasswordHash,
        PasswordHasher as _,
        PasswordVerifier as _,
        password_hash::SaltString,
    },
    lazy_regex::regex_is_match,
    rand::Rng as _,
    rocket::{
        http::Cookie,
        outcome::Outcome,
        request::{
            self,
            FromRequest,
        },
    },
    crate::{
        http::InternalError,
        prelude::*,
        store,
    },
};

/// Name of the private cookie holding the signed-in user's ID.
pub(crate) const SESSION_COOKIE: &str = "user_id";

#[derive(Debug, Clone)]
pub(crate) struct User {
    pub(crate) id: Id<Users>,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: Option<String>,
    pub(crate) payout_email: Option<String>,
    pub(crate) platform: Shard,
    pub(crate) xbox_gamertag: Option<String>,
    pub(crate) psn_id: Option<String>,
    pub(crate) xbox_subject: Option<String>,
    pub(crate) psn_subject: Option<String>,
    pub(crate) balance: Money,
    pub(crate) total_kills: i64,
    pub(crate) total_wins: i64,
}

impl User {
    pub(crate) fn new(username: String, email: String, platform: Shard) -> Self {
        Self {
            id: Id::new(),
            password_hash: None,
            payout_email: None,
            xbox_gamertag: None,
            psn_id: None,
            xbox_subject: None,
            psn_subject: None,
            balance: Money::ZERO,
            total_kills: 0,
            total_wins: 0,
            username, email, platform,
        }
    }

    /// The user's in-game handle on the given shard. Empty handles count as missing.
    pub(crate) fn handle(&self, shard: Shard) -> Option<&str> {
        match shard {
            Shard::Xbox => self.xbox_gamertag.as_deref(),
            Shard::Psn => self.psn_id.as_deref(),
        }.filter(|handle| !handle.trim().is_empty())
    }

    /// The subject identifier assigned to this user by the given platform's identity provider.
    pub(crate) fn subject(&self, shard: Shard) -> Option<&str> {
        match shard {
            Shard::Xbox => self.xbox_subject.as_deref(),
            Shard::Psn => self.psn_subject.as_deref(),
        }
    }

    pub(crate) fn set_subject(&mut self, shard: Shard, subject: String) {
        match shard {
            Shard::Xbox => self.xbox_subject = Some(subject),
            Shard::Psn => self.psn_subject = Some(subject),
        }
    }

    pub(crate) fn set_password(&mut self, password: &str) -> Result<(), argon2::password_hash::Error> {
        let mut salt = [0; 16];
        rand::rng().fill(&mut salt);
        let salt = SaltString::encode_b64(&salt)?;
        self.password_hash = Some(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string());
        Ok(())
    }

    /// Accounts provisioned through an identity provider have no password and never match.
    pub(crate) fn check_password(&self, password: &str) -> bool {
        let Some(ref hash) = self.password_hash else { return false };
        let Ok(hash) = PasswordHash::new(hash) else { return false };
        Argon2::default().verify_password(password.as_bytes(), &hash).is_ok()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.username.fmt(f)
    }
}

pub(crate) fn sign_in(cookies: &CookieJar<'_>, user: &User) {
    cookies.add_private(Cookie::build((SESSION_COOKIE, user.id.to_string())).same_site(rocket::http::SameSite::Lax));
}

pub(crate) fn sign_out(cookies: &CookieJar<'_>) {
    cookies.remove_private(SESSION_COOKIE);
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum GuardError {
    #[error(transparent)] Store(#[from] store::Error),
    #[error("missing store in managed state")]
    MissingStore,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = GuardError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, GuardError> {
        let Some(id) = req.cookies().get_private(SESSION_COOKIE).and_then(|cookie| cookie.value().parse::<u64>().ok()) else {
            return Outcome::Forward(Status::Unauthorized)
        };
        let Some(store) = req.rocket().state::<Arc<dyn Store>>() else {
            return Outcome::Error((Status::InternalServerError, GuardError::MissingStore))
        };
        let user = async {
            let mut transaction = store.begin().await?;
            let user = transaction.user(Id::from(id)).await?;
            transaction.commit().await?;
            Ok::<_, store::Error>(user)
        }.await;
        match user {
            Ok(Some(user)) => Outcome::Success(user),
            Ok(None) => Outcome::Forward(Status::Unauthorized),
            Err(e) => Outcome::Error((Status::InternalServerError, e.into())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{} is not a valid {}", .1, .0.handle_name())]
    InvalidHandle(Shard, String),
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Profile {
    pub(crate) xbox_gamertag: Option<String>,
    pub(crate) psn_id: Option<String>,
    pub(crate) payout_email: Option<String>,
}

impl Profile {
    fn normalize(value: &str) -> Option<String> {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_owned())
    }

    /// Builds a profile from raw form input. Empty fields clear the stored value.
    pub(crate) fn validate(xbox_gamertag: &str, psn_id: &str, payout_email: &str) -> Result<Self, Error> {
        let xbox_gamertag = Self::normalize(xbox_gamertag);
        let psn_id = Self::normalize(psn_id);
        let payout_email = Self::normalize(payout_email);
        for (shard, handle) in [(Shard::Xbox, &xbox_gamertag), (Shard::Psn, &psn_id)] {
            if let Some(handle) = handle {
                if !shard.is_valid_handle(handle) {
                    return Err(Error::InvalidHandle(shard, handle.clone()))
                }
            }
        }
        if let Some(ref email) = payout_email {
            if !is_valid_email(email) {
                return Err(Error::InvalidEmail(email.clone()))
            }
        }
        Ok(Self { xbox_gamertag, psn_id, payout_email })
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    regex_is_match!(r"^[^@\s]+@[^@\s]+\.[^@\s]+$", email)
}

pub(crate) async fn update_profile(store: &dyn Store, me: &User, profile: &Profile) -> Result<(), store::Error> {
    let mut transaction = store.begin().await?;
    transaction.update_profile(me.id, profile).await?;
    transaction.commit().await?;
    log::info!("user {} updated their profile", me.id);
    Ok(())
}

#[derive(FromForm)]
pub(crate) struct ProfileForm {
    #[field(default = String::new())]
    xbox_gamertag: String,
    #[field(default = String::new())]
    psn_id: String,
    #[field(default = String::new())]
    paypal_email: String,
}

#[rocket::post("/update-profile", data = "<form>")]
pub(crate) async fn update_profile_post(store: &State<Arc<dyn Store>>, me: User, form: Form<ProfileForm>) -> Result<Flash<Redirect>, InternalError> {
    let redirect = Redirect::to(uri!(crate::api::me));
    let profile = match Profile::validate(&form.xbox_gamertag, &form.psn_id, &form.paypal_email) {
        Ok(profile) => profile,
        Err(e) => return Ok(Flash::error(redirect, e.to_string())),
    };
    update_profile(&***store, &me, &profile).await?;
    Ok(Flash::success(redirect, "Profile updated successfully!"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_handles_are_missing() {
        let mut user = User::new(format!("jules"), format!("jules@example.com"), Shard::Xbox);
        assert_eq!(user.handle(Shard::Xbox), None);
        user.xbox_gamertag = Some(format!("  "));
        assert_eq!(user.handle(Shard::Xbox), None);
        user.xbox_gamertag = Some(format!("Jules"));
        user.psn_id = Some(format!("jules_ps"));
        assert_eq!(user.handle(Shard::Xbox), Some("Jules"));
        assert_eq!(user.handle(Shard::Psn), Some("jules_ps"));
    }

    #[test]
    fn passwords() {
        let mut user = User::new(format!("jules"), format!("jules@example.com"), Shard::Psn);
        assert!(!user.check_password("hunter2"));
        user.set_password("hunter2").unwrap();
        assert!(user.check_password("hunter2"));
        assert!(!user.check_password("hunter3"));
    }

    #[test]
    fn profile_validation() {
        let profile = Profile::validate(" Jules ", "", "jules@example.com").unwrap();
        assert_eq!(profile, Profile {
            xbox_gamertag: Some(format!("Jules")),
            psn_id: None,
            payout_email: Some(format!("jules@example.com")),
        });
        assert!(matches!(Profile::validate("", "x", ""), Err(Error::InvalidHandle(Shard::Psn, _))));
        assert!(matches!(Profile::validate("", "", "not-an-email"), Err(Error::InvalidEmail(_))));
    }
}
