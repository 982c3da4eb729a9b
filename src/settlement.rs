//! Applying a played match's results to the registered participants of a tournament.

use {
    itertools::Itertools as _,
    crate::{
        http::InternalError,
        id::MatchResults,
        money,
        prelude::*,
        pubg::{
            self,
            StatsProvider,
        },
        store,
        tournament::{
            MatchResult,
            TournamentMatch,
        },
    },
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Money(#[from] money::Overflow),
    #[error(transparent)] Store(#[from] store::Error),
    #[error("Crossplay tournaments need the platform the match was played on.")]
    CrossplayShard,
    #[error("Could not fetch match data from PUBG API.")]
    MatchUnavailable(#[source] Option<pubg::Error>),
    #[error("Match ID is required.")]
    MissingMatchId,
    #[error("no such tournament")]
    NotFound,
}

/// Why a registered participant got no result for a match.
#[derive(Debug)]
pub(crate) enum SkipReason {
    MissingUser,
    NoHandle(Shard),
    Lookup(pubg::Error),
    PlayerNotFound,
    NotInMatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingUser => write!(f, "user account no longer exists"),
            Self::NoHandle(shard) => write!(f, "no {} set", shard.handle_name()),
            Self::Lookup(e) => write!(f, "player lookup failed: {e}"),
            Self::PlayerNotFound => write!(f, "player not found on PUBG API"),
            Self::NotInMatch => write!(f, "did not play in this match"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) tournament_match: TournamentMatch,
    pub(crate) results: Vec<MatchResult>,
    /// Winners and the amount each was credited.
    pub(crate) credited: Vec<(Id<Users>, Money)>,
    pub(crate) skipped: Vec<(Id<Users>, SkipReason)>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stats synced for {} player", self.results.len())?;
        if self.results.len() != 1 {
            write!(f, "s")?;
        }
        if !self.credited.is_empty() {
            write!(f, ", {} winner", self.credited.len())?;
            if self.credited.len() != 1 {
                write!(f, "s")?;
            }
            write!(f, " awarded {}", self.credited.iter().map(|(_, prize)| prize).join(", "))?;
        }
        if !self.skipped.is_empty() {
            write!(f, " ({} skipped)", self.skipped.len())?;
        }
        Ok(())
    }
}

/// Fetches a match from the stats provider and records every registered participant's result.
///
/// Crossplay tournaments have no shard of their own, so the caller must name the one the match
/// was played on; without it this fails with [`Error::CrossplayShard`] rather than guessing.
///
/// Each winner is credited the tournament's prize pool as it stands when the results are written.
/// Participants that can't be resolved are skipped and listed in the report.
/// No transaction is held while the provider is queried. All writes happen in one transaction
/// afterwards; if the match can't be fetched, nothing is written.
///
/// Settling the same match twice records it twice, including the prize credits.
pub(crate) async fn settle(store: &dyn Store, stats: &dyn StatsProvider, tournament_id: Id<Tournaments>, match_id: &str, shard: Option<Shard>) -> Result<Report, Error> {
    let (tournament, participants) = {
        let mut transaction = store.begin().await?;
        let tournament = transaction.tournament(tournament_id).await?.ok_or(Error::NotFound)?;
        let mut participants = Vec::default();
        for registration in transaction.registrations(tournament.id).await? {
            participants.push((registration.user, transaction.user(registration.user).await?));
        }
        (tournament, participants)
    };
    let match_id = match_id.trim();
    if match_id.is_empty() {
        return Err(Error::MissingMatchId)
    }
    let shard = tournament.platform.shard().or(shard).ok_or(Error::CrossplayShard)?;
    let document = match stats.fetch_match(shard, match_id).await {
        Ok(Some(document)) => document,
        Ok(None) => return Err(Error::MatchUnavailable(None)),
        Err(e) => return Err(Error::MatchUnavailable(Some(e))),
    };
    let mut report = Report {
        tournament_match: TournamentMatch {
            id: Id::new(),
            tournament: tournament.id,
            external_id: match_id.to_owned(),
            synced_at: Utc::now(),
        },
        results: Vec::default(),
        credited: Vec::default(),
        skipped: Vec::default(),
    };
    for (user_id, user) in participants {
        let Some(user) = user else {
            report.skipped.push((user_id, SkipReason::MissingUser));
            continue
        };
        let Some(handle) = user.handle(shard) else {
            report.skipped.push((user.id, SkipReason::NoHandle(shard)));
            continue
        };
        let players = match stats.lookup_player(shard, handle).await {
            Ok(players) => players,
            Err(e) => {
                log::warn!("failed to look up {handle:?} on {} for tournament {}: {e} ({e:?})", shard.display_name(), tournament.id);
                report.skipped.push((user.id, SkipReason::Lookup(e)));
                continue
            }
        };
        let Some(account_id) = players.as_ref().and_then(|players| players.account_id()) else {
            report.skipped.push((user.id, SkipReason::PlayerNotFound));
            continue
        };
        let Some(player_result) = document.player_result(account_id) else {
            report.skipped.push((user.id, SkipReason::NotInMatch));
            continue
        };
        report.results.push(MatchResult {
            id: Id::<MatchResults>::new(),
            tournament_match: report.tournament_match.id,
            user: user.id,
            kills: i32::try_from(player_result.kills).unwrap_or(i32::MAX),
            placement: i32::try_from(player_result.placement).unwrap_or(i32::MAX),
            win: player_result.win,
        });
    }
    let mut transaction = store.begin().await?;
    let prize = transaction.tournament(tournament.id).await?.ok_or(Error::NotFound)?.total_prize_pool()?;
    transaction.insert_match(&report.tournament_match).await?;
    for result in &report.results {
        transaction.insert_match_result(result).await?;
        let credit = if result.win { prize } else { Money::ZERO };
        transaction.record_match_stats(result.user, result.kills.into(), result.win, credit).await?;
        if result.win {
            report.credited.push((result.user, credit));
        }
    }
    transaction.commit().await?;
    for (user, reason) in &report.skipped {
        log::debug!("skipped user {user} when settling match {match_id}: {reason}");
    }
    log::info!("settled match {match_id} for tournament {}: {report}", tournament.id);
    Ok(report)
}

/// A user whose stored kill or win counter disagrees with their match results.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct StatsDrift {
    pub(crate) user: Id<Users>,
    pub(crate) stored_kills: i64,
    pub(crate) stored_wins: i64,
    pub(crate) actual_kills: i64,
    pub(crate) actual_wins: i64,
}

/// Compares every user's denormalized counters against the sum of their match results.
pub(crate) async fn check_stats(store: &dyn Store) -> Result<Vec<StatsDrift>, store::Error> {
    let mut transaction = store.begin().await?;
    let mut drift = Vec::default();
    for user in transaction.users().await? {
        let results = transaction.results_for_user(user.id).await?;
        let actual_kills = results.iter().map(|result| i64::from(result.kills)).sum::<i64>();
        let actual_wins = results.iter().filter(|result| result.win).count() as i64;
        if actual_kills != user.total_kills || actual_wins != user.total_wins {
            drift.push(StatsDrift {
                user: user.id,
                stored_kills: user.total_kills,
                stored_wins: user.total_wins,
                actual_kills, actual_wins,
            });
        }
    }
    transaction.commit().await?;
    Ok(drift)
}

#[derive(FromForm)]
pub(crate) struct SyncForm {
    #[field(default = String::new())]
    match_id: String,
    shard: Option<Shard>,
}

#[rocket::post("/tournament/<id>/sync-stats", data = "<form>")]
pub(crate) async fn sync_stats(store: &State<Arc<dyn Store>>, stats: &State<Arc<dyn StatsProvider>>, config: &State<Config>, me: User, id: Id<Tournaments>, form: Form<SyncForm>) -> Result<Flash<Redirect>, InternalError> {
    let redirect = Redirect::to(uri!(crate::api::tournaments));
    if !config.is_operator(&me) {
        return Ok(Flash::error(redirect, "Unauthorized access."))
    }
    Ok(match settle(&***store, &***stats, id, &form.match_id, form.shard).await {
        Ok(report) => Flash::success(redirect, format!("{report}.")),
        Err(Error::Money(e)) => return Err(e.into()),
        Err(Error::Store(e)) => return Err(e.into()),
        Err(e) => {
            if let Error::MatchUnavailable(Some(ref source)) = e {
                log::warn!("failed to fetch match {:?} for tournament {id}: {source} ({source:?})", form.match_id);
            }
            Flash::error(redirect, e.to_string())
        }
    })
}
