#[cfg(unix)] use xdg::BaseDirectories;
use crate::{
    payout::PayPalMode,
    prelude::*,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Io(#[from] std::io::Error),
    #[error(transparent)] Json(#[from] serde_json::Error),
    #[cfg(unix)]
    #[error("missing config file")]
    Missing,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Config {
    pub(crate) secret_key: String,
    pub(crate) pubg_api_key: String,
    pub(crate) paypal: ConfigPayPal,
    #[serde(rename = "xboxOAuth")]
    pub(crate) xbox_oauth: ConfigIdentityProvider,
    #[serde(rename = "psnOAuth")]
    pub(crate) psn_oauth: ConfigIdentityProvider,
    #[serde(default)]
    pub(crate) database: Option<ConfigDatabase>,
    /// Users allowed to create tournaments, change their status, and sync match results.
    #[serde(default)]
    pub(crate) operators: Vec<Id<Users>>,
}

impl Config {
    pub(crate) async fn load() -> Result<Self, Error> {
        #[cfg(unix)] {
            if let Some(config_path) = BaseDirectories::new().find_config_file(if Environment::default().is_dev() { "pubg-arena-dev.json" } else { "pubg-arena.json" }) {
                Ok(serde_json::from_slice(&tokio::fs::read(config_path).await?)?)
            } else {
                Err(Error::Missing)
            }
        }
        #[cfg(windows)] {
            Ok(serde_json::from_slice(&tokio::fs::read("cfg/pubg-arena.json").await?)?)
        }
    }

    pub(crate) fn is_operator(&self, user: &User) -> bool {
        self.operators.contains(&user.id)
    }
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigPayPal {
    #[serde(rename = "clientID")]
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    #[serde(default)]
    pub(crate) mode: PayPalMode,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigIdentityProvider {
    #[serde(rename = "clientID")]
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) auth_uri: String,
    pub(crate) token_uri: String,
    pub(crate) userinfo_uri: String,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigDatabase {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
}
