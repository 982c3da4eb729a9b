//! A store that keeps everything in memory, used in tests.
//!
//! Transactions are fully serialized: each one holds the store's lock from [`Store::begin`] until it is committed or dropped,
//! and works on its own copy of the data which replaces the shared state on commit.

use {
    tokio::sync::{
        Mutex,
        OwnedMutexGuard,
    },
    crate::{
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
    },
    super::{
        Error,
        Transaction,
    },
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub(crate) users: Vec<User>,
    pub(crate) tournaments: Vec<Tournament>,
    pub(crate) registrations: Vec<Registration>,
    pub(crate) matches: Vec<TournamentMatch>,
    pub(crate) match_results: Vec<MatchResult>,
    pub(crate) donations: Vec<Donation>,
    pub(crate) sponsors: Vec<Sponsor>,
    pub(crate) payouts: Vec<Payout>,
}

impl MemoryState {
    pub(crate) fn user(&self, id: Id<Users>) -> &User {
        self.users.iter().find(|user| user.id == id).expect("no such user in memory store")
    }

    fn user_mut(&mut self, id: Id<Users>) -> Option<&mut User> {
        self.users.iter_mut().find(|user| user.id == id)
    }

    fn tournament_mut(&mut self, id: Id<Tournaments>) -> Option<&mut Tournament> {
        self.tournaments.iter_mut().find(|tournament| tournament.id == id)
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_after_results: Option<usize>,
}

impl MemoryStore {
    /// A store whose transactions fail on inserting a match result once they have inserted `n` of them.
    pub(crate) fn failing_after_results(n: usize) -> Self {
        Self {
            fail_after_results: Some(n),
            ..Self::default()
        }
    }

    pub(crate) async fn add_user(&self, user: User) -> User {
        self.state.lock().await.users.push(user.clone());
        user
    }

    pub(crate) async fn update_user(&self, id: Id<Users>, f: impl FnOnce(&mut User)) {
        f(self.state.lock().await.user_mut(id).expect("no such user in memory store"));
    }

    /// A copy of the committed state.
    pub(crate) async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            working: guard.clone(),
            fail_after_results: self.fail_after_results,
            results_inserted: 0,
            guard,
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_after_results: Option<usize>,
    results_inserted: usize,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn user(&mut self, id: Id<Users>) -> Result<Option<User>, Error> {
        Ok(self.working.users.iter().find(|user| user.id == id).cloned())
    }

    async fn user_for_update(&mut self, id: Id<Users>) -> Result<Option<User>, Error> {
        self.user(id).await
    }

    async fn user_by_username(&mut self, username: &str) -> Result<Option<User>, Error> {
        Ok(self.working.users.iter().find(|user| user.username == username).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, Error> {
        Ok(self.working.users.iter().find(|user| user.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn user_by_subject(&mut self, shard: Shard, subject: &str) -> Result<Option<User>, Error> {
        Ok(self.working.users.iter().find(|user| user.subject(shard) == Some(subject)).cloned())
    }

    async fn users(&mut self) -> Result<Vec<User>, Error> {
        Ok(self.working.users.clone())
    }

    async fn top_players(&mut self, limit: usize) -> Result<Vec<User>, Error> {
        let mut users = self.working.users.clone();
        users.sort_by_key(|user| std::cmp::Reverse(user.total_wins));
        users.truncate(limit);
        Ok(users)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), Error> {
        self.working.users.push(user.clone());
        Ok(())
    }

    async fn update_profile(&mut self, user: Id<Users>, profile: &Profile) -> Result<(), Error> {
        if let Some(user) = self.working.user_mut(user) {
            user.xbox_gamertag = profile.xbox_gamertag.clone();
            user.psn_id = profile.psn_id.clone();
            user.payout_email = profile.payout_email.clone();
        }
        Ok(())
    }

    async fn record_match_stats(&mut self, user: Id<Users>, kills: i64, win: bool, prize: Money) -> Result<(), Error> {
        if let Some(user) = self.working.user_mut(user) {
            user.total_kills += kills;
            if win {
                user.total_wins += 1;
            }
            user.balance = user.balance.checked_add(prize)?;
        }
        Ok(())
    }

    async fn reset_balance(&mut self, user: Id<Users>) -> Result<(), Error> {
        if let Some(user) = self.working.user_mut(user) {
            user.balance = Money::ZERO;
        }
        Ok(())
    }

    async fn tournament(&mut self, id: Id<Tournaments>) -> Result<Option<Tournament>, Error> {
        Ok(self.working.tournaments.iter().find(|tournament| tournament.id == id).cloned())
    }

    async fn tournaments(&mut self) -> Result<Vec<Tournament>, Error> {
        let mut tournaments = self.working.tournaments.clone();
        tournaments.sort_by_key(|tournament| std::cmp::Reverse(tournament.date));
        Ok(tournaments)
    }

    async fn insert_tournament(&mut self, tournament: &Tournament) -> Result<(), Error> {
        self.working.tournaments.push(tournament.clone());
        Ok(())
    }

    async fn set_tournament_status(&mut self, id: Id<Tournaments>, status: TournamentStatus) -> Result<(), Error> {
        if let Some(tournament) = self.working.tournament_mut(id) {
            tournament.status = status;
        }
        Ok(())
    }

    async fn add_donation_total(&mut self, id: Id<Tournaments>, amount: Money) -> Result<(), Error> {
        if let Some(tournament) = self.working.tournament_mut(id) {
            tournament.donation_total = tournament.donation_total.checked_add(amount)?;
        }
        Ok(())
    }

    async fn add_sponsor_credit(&mut self, id: Id<Tournaments>, amount: Money) -> Result<(), Error> {
        if let Some(tournament) = self.working.tournament_mut(id) {
            tournament.sponsor_credit_total = tournament.sponsor_credit_total.checked_add(amount)?;
        }
        Ok(())
    }

    async fn registrations(&mut self, tournament: Id<Tournaments>) -> Result<Vec<Registration>, Error> {
        Ok(self.working.registrations.iter().filter(|registration| registration.tournament == tournament).cloned().collect())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), Error> {
        self.working.registrations.push(registration.clone());
        Ok(())
    }

    async fn matches(&mut self, tournament: Id<Tournaments>) -> Result<Vec<TournamentMatch>, Error> {
        Ok(self.working.matches.iter().filter(|tournament_match| tournament_match.tournament == tournament).cloned().collect())
    }

    async fn insert_match(&mut self, tournament_match: &TournamentMatch) -> Result<(), Error> {
        self.working.matches.push(tournament_match.clone());
        Ok(())
    }

    async fn match_results(&mut self, tournament_match: Id<Matches>) -> Result<Vec<MatchResult>, Error> {
        Ok(self.working.match_results.iter().filter(|result| result.tournament_match == tournament_match).cloned().collect())
    }

    async fn results_for_user(&mut self, user: Id<Users>) -> Result<Vec<MatchResult>, Error> {
        Ok(self.working.match_results.iter().filter(|result| result.user == user).cloned().collect())
    }

    async fn insert_match_result(&mut self, result: &MatchResult) -> Result<(), Error> {
        if self.fail_after_results.is_some_and(|limit| self.results_inserted >= limit) {
            return Err(Error::Injected)
        }
        self.results_inserted += 1;
        self.working.match_results.push(result.clone());
        Ok(())
    }

    async fn donations(&mut self, tournament: Id<Tournaments>) -> Result<Vec<Donation>, Error> {
        Ok(self.working.donations.iter().rev().filter(|donation| donation.tournament == tournament).cloned().collect())
    }

    async fn insert_donation(&mut self, donation: &Donation) -> Result<(), Error> {
        self.working.donations.push(donation.clone());
        Ok(())
    }

    async fn sponsors(&mut self) -> Result<Vec<Sponsor>, Error> {
        Ok(self.working.sponsors.clone())
    }

    async fn insert_sponsor(&mut self, sponsor: &Sponsor) -> Result<(), Error> {
        self.working.sponsors.push(sponsor.clone());
        Ok(())
    }

    async fn payouts(&mut self, user: Id<Users>) -> Result<Vec<Payout>, Error> {
        Ok(self.working.payouts.iter().rev().filter(|payout| payout.user == user).cloned().collect())
    }

    async fn insert_payout(&mut self, payout: &Payout) -> Result<(), Error> {
        self.working.payouts.push(payout.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let Self { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_transactions_are_discarded() {
        let store = MemoryStore::default();
        let user = User::new(format!("ghost"), format!("ghost@example.com"), Shard::Xbox);
        {
            let mut transaction = store.begin().await.unwrap();
            transaction.insert_user(&user).await.unwrap();
            assert!(transaction.user(user.id).await.unwrap().is_some());
        }
        assert!(store.snapshot().await.users.is_empty());
        let mut transaction = store.begin().await.unwrap();
        transaction.insert_user(&user).await.unwrap();
        transaction.commit().await.unwrap();
        assert_eq!(store.snapshot().await.users.len(), 1);
    }
}
