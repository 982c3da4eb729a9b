//! Read-only JSON views. Every view includes the flash message left by the preceding redirect, if any.

use {
    enum_iterator::all,
    crate::{
        funding::{
            Donation,
            Sponsor,
        },
        http::InternalError,
        money::Overflow,
        payout::Payout,
        prelude::*,
        tournament::{
            MatchResult,
            Tournament,
            TournamentMatch,
        },
    },
};

const LEADERBOARD_SIZE: usize = 5;

#[derive(Serialize)]
pub(crate) struct FlashBody {
    kind: String,
    message: String,
}

impl From<FlashMessage<'_>> for FlashBody {
    fn from(flash: FlashMessage<'_>) -> Self {
        Self {
            kind: flash.kind().to_owned(),
            message: flash.message().to_owned(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct LeaderboardEntry {
    id: Id<Users>,
    username: String,
    total_kills: i64,
    total_wins: i64,
}

#[derive(Serialize)]
pub(crate) struct Index {
    flash: Option<FlashBody>,
    leaderboard: Vec<LeaderboardEntry>,
    sponsors: Vec<Sponsor>,
}

#[rocket::get("/")]
pub(crate) async fn index(store: &State<Arc<dyn Store>>, flash: Option<FlashMessage<'_>>) -> Result<Json<Index>, InternalError> {
    let mut transaction = store.begin().await?;
    let leaderboard = transaction.top_players(LEADERBOARD_SIZE).await?.into_iter().map(|user| LeaderboardEntry {
        id: user.id,
        username: user.username,
        total_kills: user.total_kills,
        total_wins: user.total_wins,
    }).collect();
    let sponsors = transaction.sponsors().await?;
    transaction.commit().await?;
    Ok(Json(Index {
        flash: flash.map(FlashBody::from),
        leaderboard, sponsors,
    }))
}

#[derive(Serialize)]
pub(crate) struct TournamentSummary {
    #[serde(flatten)]
    tournament: Tournament,
    total_prize_pool: Money,
    registered: usize,
}

impl TournamentSummary {
    fn new(tournament: Tournament, registered: usize) -> Result<Self, Overflow> {
        Ok(Self {
            total_prize_pool: tournament.total_prize_pool()?,
            tournament, registered,
        })
    }
}

#[derive(Serialize)]
pub(crate) struct TournamentList {
    flash: Option<FlashBody>,
    tournaments: Vec<TournamentSummary>,
}

#[rocket::get("/tournaments")]
pub(crate) async fn tournaments(store: &State<Arc<dyn Store>>, flash: Option<FlashMessage<'_>>) -> Result<Json<TournamentList>, InternalError> {
    let mut transaction = store.begin().await?;
    let mut tournaments = Vec::default();
    for tournament in transaction.tournaments().await? {
        let registered = transaction.registrations(tournament.id).await?.len();
        tournaments.push(TournamentSummary::new(tournament, registered)?);
    }
    transaction.commit().await?;
    Ok(Json(TournamentList {
        flash: flash.map(FlashBody::from),
        tournaments,
    }))
}

#[derive(Serialize)]
pub(crate) struct MatchDetails {
    #[serde(flatten)]
    tournament_match: TournamentMatch,
    results: Vec<MatchResult>,
}

#[derive(Serialize)]
pub(crate) struct TournamentDetails {
    flash: Option<FlashBody>,
    tournament: TournamentSummary,
    matches: Vec<MatchDetails>,
    donations: Vec<Donation>,
}

#[rocket::get("/tournament/<id>")]
pub(crate) async fn tournament(store: &State<Arc<dyn Store>>, flash: Option<FlashMessage<'_>>, id: Id<Tournaments>) -> Result<Json<TournamentDetails>, StatusOrError<InternalError>> {
    let mut transaction = store.begin().await?;
    let tournament = transaction.tournament(id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let registered = transaction.registrations(id).await?.len();
    let mut matches = Vec::default();
    for tournament_match in transaction.matches(id).await? {
        matches.push(MatchDetails {
            results: transaction.match_results(tournament_match.id).await?,
            tournament_match,
        });
    }
    let donations = transaction.donations(id).await?;
    transaction.commit().await?;
    Ok(Json(TournamentDetails {
        flash: flash.map(FlashBody::from),
        tournament: TournamentSummary::new(tournament, registered)?,
        matches, donations,
    }))
}

#[derive(Serialize)]
pub(crate) struct Account {
    id: Id<Users>,
    username: String,
    email: String,
    platform: Shard,
    xbox_gamertag: Option<String>,
    psn_id: Option<String>,
    payout_email: Option<String>,
    /// Platforms whose identity provider this account can sign in with.
    linked_accounts: Vec<Shard>,
    balance: Money,
    total_kills: i64,
    total_wins: i64,
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        Self {
            linked_accounts: all::<Shard>().filter(|&shard| user.subject(shard).is_some()).collect(),
            id: user.id,
            username: user.username,
            email: user.email,
            platform: user.platform,
            xbox_gamertag: user.xbox_gamertag,
            psn_id: user.psn_id,
            payout_email: user.payout_email,
            balance: user.balance,
            total_kills: user.total_kills,
            total_wins: user.total_wins,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct Me {
    flash: Option<FlashBody>,
    user: Account,
}

#[rocket::get("/me")]
pub(crate) fn me(me: User, flash: Option<FlashMessage<'_>>) -> Json<Me> {
    Json(Me {
        flash: flash.map(FlashBody::from),
        user: Account::from(me),
    })
}

#[derive(Serialize)]
pub(crate) struct PayoutHistory {
    flash: Option<FlashBody>,
    payouts: Vec<Payout>,
}

#[rocket::get("/me/payouts")]
pub(crate) async fn me_payouts(store: &State<Arc<dyn Store>>, me: User, flash: Option<FlashMessage<'_>>) -> Result<Json<PayoutHistory>, InternalError> {
    let mut transaction = store.begin().await?;
    let payouts = transaction.payouts(me.id).await?;
    transaction.commit().await?;
    Ok(Json(PayoutHistory {
        flash: flash.map(FlashBody::from),
        payouts,
    }))
}
