use {
    clap::Parser as _,
    sqlx::{
        ConnectOptions as _,
        postgres::{
            PgConnectOptions,
            PgPoolOptions,
        },
    },
    crate::{
        payout::PayPal,
        prelude::*,
        store::PgStore,
    },
};

mod api;
mod auth;
mod config;
mod funding;
mod http;
mod id;
mod money;
mod payout;
mod platform;
mod prelude;
mod pubg;
mod settlement;
mod store;
#[cfg(test)] mod stub_server;
mod tournament;
mod user;

#[allow(unused)] // variants only constructed under conditional compilation
#[derive(Default, Clone, Copy)]
enum Environment {
    #[cfg_attr(any(feature = "production", not(any(feature = "dev", feature = "local", debug_assertions))), default)]
    Production,
    #[cfg_attr(any(feature = "dev", all(debug_assertions, not(feature = "production"), not(feature = "local"))), default)]
    Dev,
    #[cfg_attr(feature = "local", default)]
    Local,
}

impl Environment {
    fn is_dev(&self) -> bool {
        match self {
            Self::Production => false,
            Self::Dev => true,
            Self::Local => true,
        }
    }

    fn base_uri(&self) -> rocket::http::uri::Absolute<'static> {
        match self {
            Self::Production => uri!("https://pubgarena.gg"),
            Self::Dev => uri!("https://dev.pubgarena.gg"),
            Self::Local => uri!("http://localhost:24816"),
        }
    }
}

fn base_uri() -> rocket::http::uri::Absolute<'static> {
    Environment::default().base_uri()
}

fn parse_port(arg: &str) -> Result<u16, std::num::ParseIntError> {
    match arg {
        "production" => Ok(24815),
        "dev" => Ok(24816),
        _ => arg.parse(),
    }
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// Seed the default sponsor list if there are no sponsors yet
    InitSponsors,
    /// List users whose kill or win counters disagree with their match results
    CheckStats,
}

#[derive(clap::Parser)]
#[clap(version)]
struct Args {
    #[clap(long, value_parser = parse_port)]
    port: Option<u16>,
    #[clap(subcommand)]
    subcommand: Option<Subcommand>,
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)] Config(#[from] config::Error),
    #[error(transparent)] Http(#[from] http::Error),
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error(transparent)] Rocket(#[from] rocket::Error),
    #[error(transparent)] Sql(#[from] sqlx::Error),
    #[error(transparent)] Store(#[from] store::Error),
    #[error(transparent)] Url(#[from] url::ParseError),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let Args { port, subcommand } = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    let default_panic_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("Thread panic: {:?}", info);
        default_panic_hook(info)
    }));
    let config = Config::load().await?;
    let mut db_options = PgConnectOptions::default()
        .username("pubg")
        .database(if Environment::default().is_dev() { "pubg_arena_dev" } else { "pubg_arena" })
        .application_name("pubg-arena")
        .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(10));
    if let Some(ref db_config) = config.database {
        if let Some(ref host) = db_config.host {
            db_options = db_options.host(host);
        }
        if let Some(port) = db_config.port {
            db_options = db_options.port(port);
        }
        if let Some(ref username) = db_config.username {
            db_options = db_options.username(username);
        }
        if let Some(ref password) = db_config.password {
            db_options = db_options.password(password);
        }
        if let Some(ref database) = db_config.database {
            db_options = db_options.database(database);
        }
    }
    let db_pool = PgPoolOptions::default()
        .max_connections(16)
        .connect_with(db_options)
        .await?;
    let store = Arc::new(PgStore::new(db_pool).await?);
    match subcommand {
        Some(Subcommand::InitSponsors) => if funding::init_sponsors(&*store).await? {
            println!("sponsors initialized");
        } else {
            println!("sponsors were already initialized");
        },
        Some(Subcommand::CheckStats) => {
            let drift = settlement::check_stats(&*store).await?;
            for user in &drift {
                println!("user {}: stored {} kills/{} wins, match results sum to {} kills/{} wins", user.user, user.stored_kills, user.stored_wins, user.actual_kills, user.actual_wins);
            }
            println!("{} user(s) with drifted counters", drift.len());
        }
        None => {
            let http_client = reqwest::Client::builder()
                .user_agent(concat!("pubg-arena/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(30))
                .use_rustls_tls()
                .https_only(true)
                .build()?;
            let stats = Arc::new(pubg::Client::new(http_client.clone(), config.pubg_api_key.clone())?);
            let payments = Arc::new(PayPal::new(http_client.clone(), config.paypal.mode, config.paypal.client_id.clone(), config.paypal.client_secret.clone())?);
            let port = port.unwrap_or_else(|| if Environment::default().is_dev() { 24816 } else { 24815 });
            let rocket = http::rocket(config, store, stats, payments, http_client, port)?;
            log::info!("starting web server on port {port}");
            rocket.launch().await?;
        }
    }
    Ok(())
}
