pub(crate) use {
    std::{
        fmt,
        sync::Arc,
        time::Duration,
    },
    async_trait::async_trait,
    chrono::prelude::*,
    rocket::{
        FromForm,
        FromFormField,
        Request,
        State,
        form::Form,
        http::{
            CookieJar,
            Status,
        },
        request::FlashMessage,
        response::{
            Flash,
            Redirect,
        },
        serde::json::Json,
        uri,
    },
    serde::{
        Deserialize,
        Serialize,
    },
    crate::{
        Environment,
        config::Config,
        http::StatusOrError,
        id::{
            Id,
            Matches,
            Payouts,
            Tournaments,
            Users,
        },
        money::Money,
        platform::{
            Shard,
            TournamentPlatform,
        },
        store::Store,
        user::User,
    },
};
