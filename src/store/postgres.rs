use {
    sqlx::{
        PgPool,
        Postgres,
    },
    crate::{
        funding::{
            Donation,
            Sponsor,
        },
        payout::{
            Payout,
            PayoutStatus,
        },
        prelude::*,
        tournament::{
            MatchResult,
            Registration,
            Tournament,
            TournamentMatch,
            TournamentStatus,
        },
        user::Profile,
    },
    super::{
        Error,
        Transaction,
    },
};

pub(crate) struct PgStore(PgPool);

impl PgStore {
    /// Applies any pending migrations before wrapping the pool.
    pub(crate) async fn new(pool: PgPool) -> Result<Self, Error> {
        sqlx::migrate!().run(&pool).await?;
        Ok(Self(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error> {
        Ok(Box::new(PgTransaction(self.0.begin().await?)))
    }
}

struct PgTransaction(sqlx::Transaction<'static, Postgres>);

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: Option<String>,
    payout_email: Option<String>,
    platform: Shard,
    xbox_gamertag: Option<String>,
    psn_id: Option<String>,
    xbox_subject: Option<String>,
    psn_subject: Option<String>,
    balance_cents: i64,
    total_kills: i64,
    total_wins: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: Id::from(row.id),
            balance: Money::from_cents(row.balance_cents),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            payout_email: row.payout_email,
            platform: row.platform,
            xbox_gamertag: row.xbox_gamertag,
            psn_id: row.psn_id,
            xbox_subject: row.xbox_subject,
            psn_subject: row.psn_subject,
            total_kills: row.total_kills,
            total_wins: row.total_wins,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TournamentRow {
    id: i64,
    title: String,
    description: Option<String>,
    date: DateTime<Utc>,
    base_prize_pool_cents: i64,
    donation_total_cents: i64,
    sponsor_credit_total_cents: i64,
    platform: TournamentPlatform,
    status: TournamentStatus,
    max_players: i32,
}

impl From<TournamentRow> for Tournament {
    fn from(row: TournamentRow) -> Self {
        Self {
            id: Id::from(row.id),
            title: row.title,
            description: row.description,
            date: row.date,
            base_prize_pool: Money::from_cents(row.base_prize_pool_cents),
            donation_total: Money::from_cents(row.donation_total_cents),
            sponsor_credit_total: Money::from_cents(row.sponsor_credit_total_cents),
            platform: row.platform,
            status: row.status,
            max_players: row.max_players,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: i64,
    user_id: i64,
    tournament_id: i64,
    timestamp: DateTime<Utc>,
}

impl From<RegistrationRow> for Registration {
    fn from(RegistrationRow { id, user_id, tournament_id, timestamp }: RegistrationRow) -> Self {
        Self {
            id: Id::from(id),
            user: Id::from(user_id),
            tournament: Id::from(tournament_id),
            timestamp,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: i64,
    tournament_id: i64,
    external_id: String,
    synced_at: DateTime<Utc>,
}

impl From<MatchRow> for TournamentMatch {
    fn from(MatchRow { id, tournament_id, external_id, synced_at }: MatchRow) -> Self {
        Self {
            id: Id::from(id),
            tournament: Id::from(tournament_id),
            external_id, synced_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MatchResultRow {
    id: i64,
    match_id: i64,
    user_id: i64,
    kills: i32,
    placement: i32,
    win: bool,
}

impl From<MatchResultRow> for MatchResult {
    fn from(MatchResultRow { id, match_id, user_id, kills, placement, win }: MatchResultRow) -> Self {
        Self {
            id: Id::from(id),
            tournament_match: Id::from(match_id),
            user: Id::from(user_id),
            kills, placement, win,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DonationRow {
    id: i64,
    tournament_id: i64,
    donor_name: String,
    amount_cents: i64,
    timestamp: DateTime<Utc>,
}

impl From<DonationRow> for Donation {
    fn from(DonationRow { id, tournament_id, donor_name, amount_cents, timestamp }: DonationRow) -> Self {
        Self {
            id: Id::from(id),
            tournament: Id::from(tournament_id),
            amount: Money::from_cents(amount_cents),
            donor_name, timestamp,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SponsorRow {
    id: i64,
    name: String,
    logo_url: Option<String>,
    website_url: Option<String>,
    contribution_type: Option<String>,
}

impl From<SponsorRow> for Sponsor {
    fn from(SponsorRow { id, name, logo_url, website_url, contribution_type }: SponsorRow) -> Self {
        Self { id: Id::from(id), name, logo_url, website_url, contribution_type }
    }
}

#[derive(sqlx::FromRow)]
struct PayoutRow {
    id: i64,
    user_id: i64,
    amount_cents: i64,
    status: PayoutStatus,
    transaction_id: Option<String>,
    timestamp: DateTime<Utc>,
}

impl From<PayoutRow> for Payout {
    fn from(PayoutRow { id, user_id, amount_cents, status, transaction_id, timestamp }: PayoutRow) -> Self {
        Self {
            id: Id::from(id),
            user: Id::from(user_id),
            amount: Money::from_cents(amount_cents),
            status, transaction_id, timestamp,
        }
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn user(&mut self, id: Id<Users>) -> Result<Option<User>, Error> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(i64::from(id))
            .fetch_optional(&mut *self.0).await?
            .map(User::from))
    }

    async fn user_for_update(&mut self, id: Id<Users>) -> Result<Option<User>, Error> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(i64::from(id))
            .fetch_optional(&mut *self.0).await?
            .map(User::from))
    }

    async fn user_by_username(&mut self, username: &str) -> Result<Option<User>, Error> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.0).await?
            .map(User::from))
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, Error> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&mut *self.0).await?
            .map(User::from))
    }

    async fn user_by_subject(&mut self, shard: Shard, subject: &str) -> Result<Option<User>, Error> {
        let query = match shard {
            Shard::Xbox => "SELECT * FROM users WHERE xbox_subject = $1",
            Shard::Psn => "SELECT * FROM users WHERE psn_subject = $1",
        };
        Ok(sqlx::query_as::<_, UserRow>(query)
            .bind(subject)
            .fetch_optional(&mut *self.0).await?
            .map(User::from))
    }

    async fn users(&mut self) -> Result<Vec<User>, Error> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY username")
            .fetch_all(&mut *self.0).await?
            .into_iter().map(User::from).collect())
    }

    async fn top_players(&mut self, limit: usize) -> Result<Vec<User>, Error> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY total_wins DESC LIMIT $1")
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&mut *self.0).await?
            .into_iter().map(User::from).collect())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), Error> {
        sqlx::query("INSERT INTO users (id, username, email, password_hash, payout_email, platform, xbox_gamertag, psn_id, xbox_subject, psn_subject, balance_cents, total_kills, total_wins) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)")
            .bind(i64::from(user.id))
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.payout_email)
            .bind(user.platform)
            .bind(&user.xbox_gamertag)
            .bind(&user.psn_id)
            .bind(&user.xbox_subject)
            .bind(&user.psn_subject)
            .bind(user.balance.cents())
            .bind(user.total_kills)
            .bind(user.total_wins)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn update_profile(&mut self, user: Id<Users>, profile: &Profile) -> Result<(), Error> {
        sqlx::query("UPDATE users SET xbox_gamertag = $1, psn_id = $2, payout_email = $3 WHERE id = $4")
            .bind(&profile.xbox_gamertag)
            .bind(&profile.psn_id)
            .bind(&profile.payout_email)
            .bind(i64::from(user))
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn record_match_stats(&mut self, user: Id<Users>, kills: i64, win: bool, prize: Money) -> Result<(), Error> {
        sqlx::query("UPDATE users SET total_kills = total_kills + $1, total_wins = total_wins + $2, balance_cents = balance_cents + $3 WHERE id = $4")
            .bind(kills)
            .bind(i64::from(win))
            .bind(prize.cents())
            .bind(i64::from(user))
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn reset_balance(&mut self, user: Id<Users>) -> Result<(), Error> {
        sqlx::query("UPDATE users SET balance_cents = 0 WHERE id = $1").bind(i64::from(user)).execute(&mut *self.0).await?;
        Ok(())
    }

    async fn tournament(&mut self, id: Id<Tournaments>) -> Result<Option<Tournament>, Error> {
        Ok(sqlx::query_as::<_, TournamentRow>("SELECT * FROM tournaments WHERE id = $1")
            .bind(i64::from(id))
            .fetch_optional(&mut *self.0).await?
            .map(Tournament::from))
    }

    async fn tournaments(&mut self) -> Result<Vec<Tournament>, Error> {
        Ok(sqlx::query_as::<_, TournamentRow>("SELECT * FROM tournaments ORDER BY date DESC")
            .fetch_all(&mut *self.0).await?
            .into_iter().map(Tournament::from).collect())
    }

    async fn insert_tournament(&mut self, tournament: &Tournament) -> Result<(), Error> {
        sqlx::query("INSERT INTO tournaments (id, title, description, date, base_prize_pool_cents, donation_total_cents, sponsor_credit_total_cents, platform, status, max_players) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
            .bind(i64::from(tournament.id))
            .bind(&tournament.title)
            .bind(&tournament.description)
            .bind(tournament.date)
            .bind(tournament.base_prize_pool.cents())
            .bind(tournament.donation_total.cents())
            .bind(tournament.sponsor_credit_total.cents())
            .bind(tournament.platform)
            .bind(tournament.status)
            .bind(tournament.max_players)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn set_tournament_status(&mut self, id: Id<Tournaments>, status: TournamentStatus) -> Result<(), Error> {
        sqlx::query("UPDATE tournaments SET status = $1 WHERE id = $2").bind(status).bind(i64::from(id)).execute(&mut *self.0).await?;
        Ok(())
    }

    async fn add_donation_total(&mut self, id: Id<Tournaments>, amount: Money) -> Result<(), Error> {
        sqlx::query("UPDATE tournaments SET donation_total_cents = donation_total_cents + $1 WHERE id = $2").bind(amount.cents()).bind(i64::from(id)).execute(&mut *self.0).await?;
        Ok(())
    }

    async fn add_sponsor_credit(&mut self, id: Id<Tournaments>, amount: Money) -> Result<(), Error> {
        sqlx::query("UPDATE tournaments SET sponsor_credit_total_cents = sponsor_credit_total_cents + $1 WHERE id = $2").bind(amount.cents()).bind(i64::from(id)).execute(&mut *self.0).await?;
        Ok(())
    }

    async fn registrations(&mut self, tournament: Id<Tournaments>) -> Result<Vec<Registration>, Error> {
        Ok(sqlx::query_as::<_, RegistrationRow>("SELECT * FROM registrations WHERE tournament_id = $1 ORDER BY timestamp")
            .bind(i64::from(tournament))
            .fetch_all(&mut *self.0).await?
            .into_iter().map(Registration::from).collect())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), Error> {
        sqlx::query("INSERT INTO registrations (id, user_id, tournament_id, timestamp) VALUES ($1, $2, $3, $4)")
            .bind(i64::from(registration.id))
            .bind(i64::from(registration.user))
            .bind(i64::from(registration.tournament))
            .bind(registration.timestamp)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn matches(&mut self, tournament: Id<Tournaments>) -> Result<Vec<TournamentMatch>, Error> {
        Ok(sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE tournament_id = $1 ORDER BY synced_at")
            .bind(i64::from(tournament))
            .fetch_all(&mut *self.0).await?
            .into_iter().map(TournamentMatch::from).collect())
    }

    async fn insert_match(&mut self, tournament_match: &TournamentMatch) -> Result<(), Error> {
        sqlx::query("INSERT INTO matches (id, tournament_id, external_id, synced_at) VALUES ($1, $2, $3, $4)")
            .bind(i64::from(tournament_match.id))
            .bind(i64::from(tournament_match.tournament))
            .bind(&tournament_match.external_id)
            .bind(tournament_match.synced_at)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn match_results(&mut self, tournament_match: Id<Matches>) -> Result<Vec<MatchResult>, Error> {
        Ok(sqlx::query_as::<_, MatchResultRow>("SELECT * FROM match_results WHERE match_id = $1 ORDER BY placement")
            .bind(i64::from(tournament_match))
            .fetch_all(&mut *self.0).await?
            .into_iter().map(MatchResult::from).collect())
    }

    async fn results_for_user(&mut self, user: Id<Users>) -> Result<Vec<MatchResult>, Error> {
        Ok(sqlx::query_as::<_, MatchResultRow>("SELECT * FROM match_results WHERE user_id = $1")
            .bind(i64::from(user))
            .fetch_all(&mut *self.0).await?
            .into_iter().map(MatchResult::from).collect())
    }

    async fn insert_match_result(&mut self, result: &MatchResult) -> Result<(), Error> {
        sqlx::query("INSERT INTO match_results (id, match_id, user_id, kills, placement, win) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(i64::from(result.id))
            .bind(i64::from(result.tournament_match))
            .bind(i64::from(result.user))
            .bind(result.kills)
            .bind(result.placement)
            .bind(result.win)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn donations(&mut self, tournament: Id<Tournaments>) -> Result<Vec<Donation>, Error> {
        Ok(sqlx::query_as::<_, DonationRow>("SELECT * FROM donations WHERE tournament_id = $1 ORDER BY timestamp DESC")
            .bind(i64::from(tournament))
            .fetch_all(&mut *self.0).await?
            .into_iter().map(Donation::from).collect())
    }

    async fn insert_donation(&mut self, donation: &Donation) -> Result<(), Error> {
        sqlx::query("INSERT INTO donations (id, tournament_id, donor_name, amount_cents, timestamp) VALUES ($1, $2, $3, $4, $5)")
            .bind(i64::from(donation.id))
            .bind(i64::from(donation.tournament))
            .bind(&donation.donor_name)
            .bind(donation.amount.cents())
            .bind(donation.timestamp)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn sponsors(&mut self) -> Result<Vec<Sponsor>, Error> {
        Ok(sqlx::query_as::<_, SponsorRow>("SELECT * FROM sponsors ORDER BY name")
            .fetch_all(&mut *self.0).await?
            .into_iter().map(Sponsor::from).collect())
    }

    async fn insert_sponsor(&mut self, sponsor: &Sponsor) -> Result<(), Error> {
        sqlx::query("INSERT INTO sponsors (id, name, logo_url, website_url, contribution_type) VALUES ($1, $2, $3, $4, $5)")
            .bind(i64::from(sponsor.id))
            .bind(&sponsor.name)
            .bind(&sponsor.logo_url)
            .bind(&sponsor.website_url)
            .bind(&sponsor.contribution_type)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn payouts(&mut self, user: Id<Users>) -> Result<Vec<Payout>, Error> {
        Ok(sqlx::query_as::<_, PayoutRow>("SELECT * FROM payouts WHERE user_id = $1 ORDER BY timestamp DESC")
            .bind(i64::from(user))
            .fetch_all(&mut *self.0).await?
            .into_iter().map(Payout::from).collect())
    }

    async fn insert_payout(&mut self, payout: &Payout) -> Result<(), Error> {
        sqlx::query("INSERT INTO payouts (id, user_id, amount_cents, status, transaction_id, timestamp) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(i64::from(payout.id))
            .bind(i64::from(payout.user))
            .bind(payout.amount.cents())
            .bind(payout.status)
            .bind(&payout.transaction_id)
            .bind(payout.timestamp)
            .execute(&mut *self.0).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let Self(transaction) = *self;
        transaction.commit().await?;
        Ok(())
    }
}
