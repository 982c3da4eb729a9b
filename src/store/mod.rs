//! Persistence for every entity of the arena.
//!
//! All reads and writes go through a [`Transaction`] obtained from a [`Store`].
//! Changes become visible to other transactions only on [`Transaction::commit`];
//! dropping a transaction without committing discards everything it wrote.

use crate::{
    funding::{
        Donation,
        Sponsor,
    },
    payout::Payout,
    prelude::*,
    tournament::{
        MatchResult,
        Registration,
        Tournament,
        TournamentMatch,
        TournamentStatus,
    },
    user::Profile,
};
#[cfg(test)] pub(crate) use memory::MemoryStore;
pub(crate) use postgres::PgStore;

#[cfg(test)] mod memory;
mod postgres;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)] Sql(#[from] sqlx::Error),
    #[cfg(test)]
    #[error("injected store failure")]
    Injected,
    #[cfg(test)]
    #[error(transparent)] Overflow(#[from] crate::money::Overflow),
}

#[async_trait]
pub(crate) trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error>;
}

#[async_trait]
pub(crate) trait Transaction: Send {
    async fn user(&mut self, id: Id<Users>) -> Result<Option<User>, Error>;
    /// Like [`Transaction::user`], but other transactions calling this for the same user block until this one ends.
    async fn user_for_update(&mut self, id: Id<Users>) -> Result<Option<User>, Error>;
    async fn user_by_username(&mut self, username: &str) -> Result<Option<User>, Error>;
    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, Error>;
    async fn user_by_subject(&mut self, shard: Shard, subject: &str) -> Result<Option<User>, Error>;
    async fn users(&mut self) -> Result<Vec<User>, Error>;
    /// Users ordered by total wins, most first.
    async fn top_players(&mut self, limit: usize) -> Result<Vec<User>, Error>;
    async fn insert_user(&mut self, user: &User) -> Result<(), Error>;
    async fn update_profile(&mut self, user: Id<Users>, profile: &Profile) -> Result<(), Error>;
    /// Adds to the user's denormalized kill and win counters and credits their balance.
    async fn record_match_stats(&mut self, user: Id<Users>, kills: i64, win: bool, prize: Money) -> Result<(), Error>;
    async fn reset_balance(&mut self, user: Id<Users>) -> Result<(), Error>;

    async fn tournament(&mut self, id: Id<Tournaments>) -> Result<Option<Tournament>, Error>;
    /// All tournaments, most recent date first.
    async fn tournaments(&mut self) -> Result<Vec<Tournament>, Error>;
    async fn insert_tournament(&mut self, tournament: &Tournament) -> Result<(), Error>;
    async fn set_tournament_status(&mut self, id: Id<Tournaments>, status: TournamentStatus) -> Result<(), Error>;
    async fn add_donation_total(&mut self, id: Id<Tournaments>, amount: Money) -> Result<(), Error>;
    async fn add_sponsor_credit(&mut self, id: Id<Tournaments>, amount: Money) -> Result<(), Error>;

    /// Registrations for the tournament, oldest first.
    async fn registrations(&mut self, tournament: Id<Tournaments>) -> Result<Vec<Registration>, Error>;
    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), Error>;

    /// Matches of the tournament, oldest first.
    async fn matches(&mut self, tournament: Id<Tournaments>) -> Result<Vec<TournamentMatch>, Error>;
    async fn insert_match(&mut self, tournament_match: &TournamentMatch) -> Result<(), Error>;
    async fn match_results(&mut self, tournament_match: Id<Matches>) -> Result<Vec<MatchResult>, Error>;
    async fn results_for_user(&mut self, user: Id<Users>) -> Result<Vec<MatchResult>, Error>;
    async fn insert_match_result(&mut self, result: &MatchResult) -> Result<(), Error>;

    /// Donations to the tournament, newest first.
    async fn donations(&mut self, tournament: Id<Tournaments>) -> Result<Vec<Donation>, Error>;
    async fn insert_donation(&mut self, donation: &Donation) -> Result<(), Error>;
    async fn sponsors(&mut self) -> Result<Vec<Sponsor>, Error>;
    async fn insert_sponsor(&mut self, sponsor: &Sponsor) -> Result<(), Error>;

    /// Payouts to the user, newest first.
    async fn payouts(&mut self, user: Id<Users>) -> Result<Vec<Payout>, Error>;
    async fn insert_payout(&mut self, payout: &Payout) -> Result<(), Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;
}
