use {
    enum_iterator::Sequence,
    lazy_regex::regex_is_match,
    crate::prelude::*,
};

/// A platform partition of the stats provider's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence, Deserialize, Serialize, FromFormField, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "shard", rename_all = "lowercase")]
pub(crate) enum Shard {
    #[field(value = "xbox")]
    #[field(value = "xbox series")]
    Xbox,
    #[field(value = "psn")]
    #[field(value = "ps5")]
    #[field(value = "playstation")]
    Psn,
}

impl Shard {
    pub(crate) fn display_name(&self) -> &'static str {
        match self {
            Self::Xbox => "Xbox",
            Self::Psn => "PlayStation",
        }
    }

    /// The name of the in-game handle for this platform, for use in messages.
    pub(crate) fn handle_name(&self) -> &'static str {
        match self {
            Self::Xbox => "Xbox gamertag",
            Self::Psn => "PSN ID",
        }
    }

    /// Checks a handle against the platform's account naming rules.
    pub(crate) fn is_valid_handle(&self, handle: &str) -> bool {
        match self {
            Self::Xbox => regex_is_match!("^[A-Za-z][A-Za-z0-9 ]{0,14}$", handle),
            Self::Psn => regex_is_match!("^[A-Za-z][A-Za-z0-9_-]{2,15}$", handle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence, Deserialize, Serialize, FromFormField, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "tournament_platform", rename_all = "lowercase")]
pub(crate) enum TournamentPlatform {
    #[field(value = "xbox")]
    #[field(value = "xbox series")]
    Xbox,
    #[field(value = "psn")]
    #[field(value = "ps5")]
    #[field(value = "playstation")]
    Psn,
    #[field(value = "crossplay")]
    Crossplay,
}

impl TournamentPlatform {
    /// The shard all matches of this tournament are played on, or `None` for crossplay tournaments.
    pub(crate) fn shard(&self) -> Option<Shard> {
        match self {
            Self::Xbox => Some(Shard::Xbox),
            Self::Psn => Some(Shard::Psn),
            Self::Crossplay => None,
        }
    }

    pub(crate) fn display_name(&self) -> &'static str {
        match self {
            Self::Xbox => "Xbox",
            Self::Psn => "PlayStation",
            Self::Crossplay => "Crossplay",
        }
    }
}
