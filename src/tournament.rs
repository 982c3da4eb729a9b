use {
    crate::{
        http::InternalError,
        id::{
            MatchResults,
            Registrations,
        },
        money::Overflow,
        prelude::*,
        store,
    },
};

/// Upper bound on a tournament's total prize pool. Base prize, donations and sponsor credit are all refused past it.
pub(crate) const MAX_PRIZE_POOL: Money = Money::from_cents(1_000_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromFormField, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "tournament_status", rename_all = "lowercase")]
pub(crate) enum TournamentStatus {
    Upcoming,
    Ongoing,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Tournament {
    pub(crate) id: Id<Tournaments>,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) date: DateTime<Utc>,
    pub(crate) base_prize_pool: Money,
    pub(crate) donation_total: Money,
    pub(crate) sponsor_credit_total: Money,
    pub(crate) platform: TournamentPlatform,
    pub(crate) status: TournamentStatus,
    pub(crate) max_players: i32,
}

impl Tournament {
    /// The amount currently payable to a winner. Always derived, never stored.
    pub(crate) fn total_prize_pool(&self) -> Result<Money, Overflow> {
        self.base_prize_pool.checked_add(self.donation_total)?.checked_add(self.sponsor_credit_total)
    }

    /// Whether `amount` can be added to the prize pool without passing [`MAX_PRIZE_POOL`].
    pub(crate) fn has_room_for(&self, amount: Money) -> bool {
        self.total_prize_pool().and_then(|total| total.checked_add(amount)).is_ok_and(|total| total <= MAX_PRIZE_POOL)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Registration {
    pub(crate) id: Id<Registrations>,
    pub(crate) user: Id<Users>,
    pub(crate) tournament: Id<Tournaments>,
    pub(crate) timestamp: DateTime<Utc>,
}

/// One round of a tournament, identified by the stats provider's match ID.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TournamentMatch {
    pub(crate) id: Id<Matches>,
    pub(crate) tournament: Id<Tournaments>,
    pub(crate) external_id: String,
    pub(crate) synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MatchResult {
    pub(crate) id: Id<MatchResults>,
    pub(crate) tournament_match: Id<Matches>,
    pub(crate) user: Id<Users>,
    pub(crate) kills: i32,
    pub(crate) placement: i32,
    pub(crate) win: bool,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Store(#[from] store::Error),
    #[error("you are already registered for this tournament")]
    AlreadyRegistered,
    #[error("this tournament is over")]
    Closed,
    #[error("tournament title must not be empty")]
    EmptyTitle,
    #[error("this tournament is full")]
    Full,
    #[error("a tournament needs room for at least one player")]
    InvalidCapacity,
    #[error("the base prize pool must not be negative")]
    NegativePrize,
    #[error("the base prize pool must not exceed {MAX_PRIZE_POOL}")]
    PrizeTooLarge,
    #[error("no such tournament")]
    NotFound,
}

pub(crate) struct NewTournament {
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) date: Option<DateTime<Utc>>,
    pub(crate) base_prize_pool: Money,
    pub(crate) platform: TournamentPlatform,
    pub(crate) max_players: Option<i32>,
}

pub(crate) async fn create(store: &dyn Store, new: NewTournament) -> Result<Tournament, Error> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::EmptyTitle)
    }
    if new.base_prize_pool < Money::ZERO {
        return Err(Error::NegativePrize)
    }
    if new.base_prize_pool > MAX_PRIZE_POOL {
        return Err(Error::PrizeTooLarge)
    }
    let max_players = new.max_players.unwrap_or(100);
    if max_players < 1 {
        return Err(Error::InvalidCapacity)
    }
    let tournament = Tournament {
        id: Id::new(),
        title: title.to_owned(),
        description: Some(new.description.filter(|description| !description.trim().is_empty()).unwrap_or_else(|| format!("TPP Tournament"))),
        date: new.date.unwrap_or_else(Utc::now),
        base_prize_pool: new.base_prize_pool,
        donation_total: Money::ZERO,
        sponsor_credit_total: Money::ZERO,
        platform: new.platform,
        status: TournamentStatus::Upcoming,
        max_players,
    };
    let mut transaction = store.begin().await?;
    transaction.insert_tournament(&tournament).await?;
    transaction.commit().await?;
    log::info!("created {} tournament {} ({:?}) with a base prize of {}", tournament.platform.display_name(), tournament.id, tournament.title, tournament.base_prize_pool);
    Ok(tournament)
}

pub(crate) async fn set_status(store: &dyn Store, id: Id<Tournaments>, status: TournamentStatus) -> Result<(), Error> {
    let mut transaction = store.begin().await?;
    if transaction.tournament(id).await?.is_none() {
        return Err(Error::NotFound)
    }
    transaction.set_tournament_status(id, status).await?;
    transaction.commit().await?;
    Ok(())
}

pub(crate) async fn register(store: &dyn Store, me: &User, id: Id<Tournaments>) -> Result<Registration, Error> {
    let mut transaction = store.begin().await?;
    let tournament = transaction.tournament(id).await?.ok_or(Error::NotFound)?;
    if tournament.status == TournamentStatus::Completed {
        return Err(Error::Closed)
    }
    let registrations = transaction.registrations(id).await?;
    if registrations.iter().any(|registration| registration.user == me.id) {
        return Err(Error::AlreadyRegistered)
    }
    if registrations.len() >= usize::try_from(tournament.max_players).unwrap_or_default() {
        return Err(Error::Full)
    }
    let registration = Registration {
        id: Id::new(),
        user: me.id,
        tournament: id,
        timestamp: Utc::now(),
    };
    transaction.insert_registration(&registration).await?;
    transaction.commit().await?;
    Ok(registration)
}

/// Converts a domain error into a flash message, passing store failures through as internal errors.
fn flash_or_internal(redirect: Redirect, e: Error) -> Result<Flash<Redirect>, InternalError> {
    match e {
        Error::Store(e) => Err(e.into()),
        _ => Ok(Flash::error(redirect, e.to_string())),
    }
}

#[derive(FromForm)]
pub(crate) struct AddTournamentForm {
    title: String,
    prize: Money,
    platform: TournamentPlatform,
    description: Option<String>,
    max_players: Option<i32>,
}

#[rocket::post("/admin/add-tournament", data = "<form>")]
pub(crate) async fn add_tournament(store: &State<Arc<dyn Store>>, config: &State<Config>, me: User, form: Form<AddTournamentForm>) -> Result<Flash<Redirect>, InternalError> {
    if !config.is_operator(&me) {
        return Ok(Flash::error(Redirect::to(uri!(crate::api::index)), "Unauthorized access."))
    }
    let form = form.into_inner();
    let redirect = Redirect::to(uri!(crate::api::tournaments));
    match create(&***store, NewTournament {
        title: form.title,
        description: form.description,
        date: None,
        base_prize_pool: form.prize,
        platform: form.platform,
        max_players: form.max_players,
    }).await {
        Ok(_) => Ok(Flash::success(redirect, "Tournament added successfully!")),
        Err(e) => flash_or_internal(redirect, e),
    }
}

#[derive(FromForm)]
pub(crate) struct StatusForm {
    status: TournamentStatus,
}

#[rocket::post("/tournament/<id>/status", data = "<form>")]
pub(crate) async fn status_post(store: &State<Arc<dyn Store>>, config: &State<Config>, me: User, id: Id<Tournaments>, form: Form<StatusForm>) -> Result<Flash<Redirect>, InternalError> {
    if !config.is_operator(&me) {
        return Ok(Flash::error(Redirect::to(uri!(crate::api::index)), "Unauthorized access."))
    }
    let redirect = Redirect::to(uri!(crate::api::tournament(id)));
    match set_status(&***store, id, form.status).await {
        Ok(()) => Ok(Flash::success(redirect, "Tournament status updated.")),
        Err(e) => flash_or_internal(redirect, e),
    }
}

#[rocket::post("/tournament/<id>/register")]
pub(crate) async fn register_post(store: &State<Arc<dyn Store>>, me: User, id: Id<Tournaments>) -> Result<Flash<Redirect>, InternalError> {
    let redirect = Redirect::to(uri!(crate::api::tournaments));
    match register(&***store, &me, id).await {
        Ok(_) => Ok(Flash::success(redirect, "You are registered!")),
        Err(e) => flash_or_internal(redirect, e),
    }
}
