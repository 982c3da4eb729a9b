//! Prize pool funding beyond the base prize: donations, sponsor credit, and the sponsor list.

use crate::{
    http::InternalError,
    id::{
        Donations,
        Sponsors,
    },
    prelude::*,
    store,
    tournament::MAX_PRIZE_POOL,
};

/// Credit added to a tournament's prize pool per sponsor interaction (e.g. one ad view).
pub(crate) const SPONSOR_CREDIT: Money = Money::from_cents(50);

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Donation {
    pub(crate) id: Id<Donations>,
    pub(crate) tournament: Id<Tournaments>,
    pub(crate) donor_name: String,
    pub(crate) amount: Money,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Sponsor {
    pub(crate) id: Id<Sponsors>,
    pub(crate) name: String,
    pub(crate) logo_url: Option<String>,
    pub(crate) website_url: Option<String>,
    pub(crate) contribution_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Store(#[from] store::Error),
    #[error("no such tournament")]
    NotFound,
    #[error("The prize pool can't grow past {MAX_PRIZE_POOL}.")]
    PrizePoolLimit,
}

/// Records a donation and adds it to the tournament's donation total.
///
/// Returns `Ok(None)` without touching the store if the amount isn't positive.
/// Donations that would take the prize pool past [`MAX_PRIZE_POOL`] are refused.
pub(crate) async fn donate(store: &dyn Store, tournament: Id<Tournaments>, donor_name: Option<&str>, amount: Money) -> Result<Option<Donation>, Error> {
    if !amount.is_positive() {
        return Ok(None)
    }
    let mut transaction = store.begin().await?;
    let data = transaction.tournament(tournament).await?.ok_or(Error::NotFound)?;
    if !data.has_room_for(amount) {
        return Err(Error::PrizePoolLimit)
    }
    let donation = Donation {
        id: Id::new(),
        donor_name: donor_name.map(str::trim).filter(|name| !name.is_empty()).unwrap_or("Anonymous").to_owned(),
        timestamp: Utc::now(),
        tournament, amount,
    };
    transaction.insert_donation(&donation).await?;
    transaction.add_donation_total(tournament, amount).await?;
    transaction.commit().await?;
    log::info!("{} donated {} to tournament {}", donation.donor_name, amount, tournament);
    Ok(Some(donation))
}

/// Adds one unit of sponsor credit to the tournament's prize pool.
pub(crate) async fn award_sponsor_credit(store: &dyn Store, tournament: Id<Tournaments>) -> Result<Money, Error> {
    let mut transaction = store.begin().await?;
    let data = transaction.tournament(tournament).await?.ok_or(Error::NotFound)?;
    if !data.has_room_for(SPONSOR_CREDIT) {
        return Err(Error::PrizePoolLimit)
    }
    transaction.add_sponsor_credit(tournament, SPONSOR_CREDIT).await?;
    transaction.commit().await?;
    Ok(SPONSOR_CREDIT)
}

fn seed_sponsors() -> [Sponsor; 3] {
    [
        ("Razer", "https://www.razer.com"),
        ("Logitech G", "https://www.logitechg.com"),
        ("Red Bull", "https://www.redbull.com"),
    ].map(|(name, website_url)| Sponsor {
        id: Id::new(),
        name: name.to_owned(),
        logo_url: None,
        website_url: Some(website_url.to_owned()),
        contribution_type: None,
    })
}

/// Inserts the default sponsor list if there are no sponsors yet. Returns whether anything was inserted.
pub(crate) async fn init_sponsors(store: &dyn Store) -> Result<bool, store::Error> {
    let mut transaction = store.begin().await?;
    if !transaction.sponsors().await?.is_empty() {
        return Ok(false)
    }
    for sponsor in seed_sponsors() {
        transaction.insert_sponsor(&sponsor).await?;
    }
    transaction.commit().await?;
    Ok(true)
}

#[derive(FromForm)]
pub(crate) struct DonationForm {
    amount: Money,
    donor_name: Option<String>,
}

#[rocket::post("/tournament/<id>/donate", data = "<form>")]
pub(crate) async fn donate_post(store: &State<Arc<dyn Store>>, id: Id<Tournaments>, form: Form<DonationForm>) -> Result<Flash<Redirect>, InternalError> {
    let redirect = Redirect::to(uri!(crate::api::tournaments));
    Ok(match donate(&***store, id, form.donor_name.as_deref(), form.amount).await {
        Ok(Some(donation)) => Flash::success(redirect, format!("Thank you for your {} donation!", donation.amount)),
        Ok(None) => Flash::error(redirect, "Donations must be a positive amount."),
        Err(Error::Store(e)) => return Err(e.into()),
        Err(e) => Flash::error(redirect, e.to_string()),
    })
}

#[rocket::post("/tournament/<id>/earn-credit")]
pub(crate) async fn earn_credit(store: &State<Arc<dyn Store>>, me: User, id: Id<Tournaments>) -> Result<Flash<Redirect>, InternalError> {
    let redirect = Redirect::to(uri!(crate::api::tournaments));
    Ok(match award_sponsor_credit(&***store, id).await {
        Ok(amount) => {
            log::debug!("user {} earned {amount} of sponsor credit for tournament {id}", me.id);
            Flash::success(redirect, format!("You earned {amount} in sponsor credit for this tournament prize pool!"))
        }
        Err(Error::Store(e)) => return Err(e.into()),
        Err(e) => Flash::error(redirect, e.to_string()),
    })
}

#[rocket::post("/admin/init-sponsors")]
pub(crate) async fn init_sponsors_post(store: &State<Arc<dyn Store>>, config: &State<Config>, me: User) -> Result<Flash<Redirect>, InternalError> {
    let redirect = Redirect::to(uri!(crate::api::index));
    if !config.is_operator(&me) {
        return Ok(Flash::error(redirect, "Unauthorized access."))
    }
    Ok(if init_sponsors(&***store).await? {
        Flash::success(redirect, "Sponsors initialized!")
    } else {
        Flash::success(redirect, "Sponsors were already initialized.")
    })
}
