//! Client for the PUBG developer API and extraction of per-player results from its match documents.

use {
    reqwest::StatusCode,
    url::Url,
    crate::prelude::*,
};

const BASE_URL: &str = "https://api.pubg.com/shards/";

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error(transparent)] Url(#[from] url::ParseError),
}

/// Response of the player lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Players {
    #[serde(default)]
    pub(crate) data: Vec<Player>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Player {
    /// The provider's account ID, e.g. `account.0123abcd…`.
    pub(crate) id: String,
}

impl Players {
    /// The account ID of the first player in the lookup result.
    pub(crate) fn account_id(&self) -> Option<&str> {
        self.data.first().map(|player| &*player.id)
    }
}

/// A match document as returned by the match endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MatchDocument {
    #[serde(default)]
    pub(crate) included: Vec<Included>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum Included {
    Participant {
        #[serde(default)]
        attributes: ParticipantAttributes,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ParticipantAttributes {
    #[serde(default)]
    pub(crate) stats: ParticipantStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParticipantStats {
    pub(crate) player_id: Option<String>,
    #[serde(default)]
    pub(crate) kills: u32,
    #[serde(default)]
    pub(crate) win_place: u32,
}

/// One player's normalized result in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlayerResult {
    pub(crate) kills: u32,
    pub(crate) placement: u32,
    pub(crate) win: bool,
}

impl MatchDocument {
    /// Finds the participant with the given account ID. Missing kill or placement stats count as 0.
    pub(crate) fn player_result(&self, account_id: &str) -> Option<PlayerResult> {
        self.included.iter().find_map(|item| match item {
            Included::Participant { attributes: ParticipantAttributes { stats } } if stats.player_id.as_deref() == Some(account_id) => Some(PlayerResult {
                kills: stats.kills,
                placement: stats.win_place,
                win: stats.win_place == 1,
            }),
            Included::Participant { .. } | Included::Other => None,
        })
    }
}

#[async_trait]
pub(crate) trait StatsProvider: Send + Sync {
    /// Looks up players by display name. `Ok(None)` if the provider has no data.
    async fn lookup_player(&self, shard: Shard, handle: &str) -> Result<Option<Players>, Error>;
    /// Fetches full match details. `Ok(None)` if the provider has no data.
    async fn fetch_match(&self, shard: Shard, match_id: &str) -> Result<Option<MatchDocument>, Error>;
}

pub(crate) struct Client {
    http_client: reqwest::Client,
    api_key: String,
    base_url: Url,
}

impl Client {
    pub(crate) fn new(http_client: reqwest::Client, api_key: String) -> Result<Self, url::ParseError> {
        Ok(Self::with_base_url(http_client, api_key, Url::parse(BASE_URL)?))
    }

    /// `base_url` is the URL under which each shard is a directory and must end in a slash.
    pub(crate) fn with_base_url(http_client: reqwest::Client, api_key: String, base_url: Url) -> Self {
        Self { http_client, api_key, base_url }
    }

    fn shard_url(&self, shard: Shard) -> Result<Url, url::ParseError> {
        let shard = serde_plain::to_string(&shard).expect("shard names are plain strings");
        self.base_url.join(&format!("{shard}/"))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, request: reqwest::RequestBuilder) -> Result<Option<T>, Error> {
        let response = request
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/vnd.api+json")
            .send().await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            status => {
                log::debug!("PUBG API responded with {status} to {}", response.url());
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl StatsProvider for Client {
    async fn lookup_player(&self, shard: Shard, handle: &str) -> Result<Option<Players>, Error> {
        let url = self.shard_url(shard)?.join("players")?;
        self.get(self.http_client.get(url).query(&[("filter[playerNames]", handle)])).await
    }

    async fn fetch_match(&self, shard: Shard, match_id: &str) -> Result<Option<MatchDocument>, Error> {
        let mut url = self.shard_url(shard)?.join("matches/")?;
        url.path_segments_mut().expect("base URL is hierarchical").pop_if_empty().push(match_id);
        self.get(self.http_client.get(url)).await
    }
}
