//! Paying out user balances through the payment provider.

use {
    url::Url,
    crate::{
        http::InternalError,
        money::CURRENCY,
        prelude::*,
        store,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "payout_status", rename_all = "lowercase")]
pub(crate) enum PayoutStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Payout {
    pub(crate) id: Id<Payouts>,
    pub(crate) user: Id<Users>,
    pub(crate) amount: Money,
    pub(crate) status: PayoutStatus,
    /// The payment provider's reference for the batch this payout was sent in.
    pub(crate) transaction_id: Option<String>,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PayoutRequest {
    pub(crate) sender_batch_id: String,
    pub(crate) sender_item_id: String,
    pub(crate) receiver: String,
    pub(crate) amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PayoutReceipt {
    pub(crate) batch_id: String,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProviderError {
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[error(transparent)] Url(#[from] url::ParseError),
    #[error("{0}")]
    Rejected(String),
}

#[async_trait]
pub(crate) trait PaymentProvider: Send + Sync {
    /// Submits a payout. `Ok` means the provider accepted it.
    async fn send_payout(&self, request: &PayoutRequest) -> Result<PayoutReceipt, ProviderError>;
}

#[derive(Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PayPalMode {
    #[default]
    Sandbox,
    Live,
}

impl PayPalMode {
    fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://api-m.sandbox.paypal.com/",
            Self::Live => "https://api-m.paypal.com/",
        }
    }
}

/// Client for the PayPal Payouts API.
pub(crate) struct PayPal {
    http_client: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
}

impl PayPal {
    pub(crate) fn new(http_client: reqwest::Client, mode: PayPalMode, client_id: String, client_secret: String) -> Result<Self, url::ParseError> {
        Ok(Self::with_base_url(http_client, Url::parse(mode.base_url())?, client_id, client_secret))
    }

    pub(crate) fn with_base_url(http_client: reqwest::Client, base_url: Url, client_id: String, client_secret: String) -> Self {
        Self { http_client, base_url, client_id, client_secret }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let TokenResponse { access_token } = self.http_client.post(self.base_url.join("v1/oauth2/token")?)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send().await?
            .error_for_status()?
            .json().await?;
        Ok(access_token)
    }
}

#[derive(Serialize)]
struct PayoutBody<'a> {
    sender_batch_header: SenderBatchHeader<'a>,
    items: [PayoutItem<'a>; 1],
}

#[derive(Serialize)]
struct SenderBatchHeader<'a> {
    sender_batch_id: &'a str,
    email_subject: &'static str,
}

#[derive(Serialize)]
struct PayoutItem<'a> {
    recipient_type: &'static str,
    amount: Amount,
    receiver: &'a str,
    note: &'static str,
    sender_item_id: &'a str,
}

#[derive(Serialize)]
struct Amount {
    value: String,
    currency: &'static str,
}

#[derive(Deserialize)]
struct PayoutResponse {
    batch_header: BatchHeader,
}

#[derive(Deserialize)]
struct BatchHeader {
    payout_batch_id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

impl<'a> From<&'a PayoutRequest> for PayoutBody<'a> {
    fn from(request: &'a PayoutRequest) -> Self {
        Self {
            sender_batch_header: SenderBatchHeader {
                sender_batch_id: &request.sender_batch_id,
                email_subject: "You have a tournament payout!",
            },
            items: [PayoutItem {
                recipient_type: "EMAIL",
                amount: Amount {
                    value: request.amount.decimal(),
                    currency: CURRENCY,
                },
                receiver: &request.receiver,
                note: "Thank you for participating in PUBG Console Arena! Your payout includes donation funds and sponsor credits.",
                sender_item_id: &request.sender_item_id,
            }],
        }
    }
}

#[async_trait]
impl PaymentProvider for PayPal {
    async fn send_payout(&self, request: &PayoutRequest) -> Result<PayoutReceipt, ProviderError> {
        let access_token = self.access_token().await?;
        let response = self.http_client.post(self.base_url.join("v1/payments/payouts")?)
            .bearer_auth(access_token)
            .json(&PayoutBody::from(request))
            .send().await?;
        if response.status().is_success() {
            let PayoutResponse { batch_header: BatchHeader { payout_batch_id } } = response.json().await?;
            Ok(PayoutReceipt { batch_id: payout_batch_id })
        } else {
            let status = response.status();
            let message = match response.json::<ErrorResponse>().await {
                Ok(ErrorResponse { message }) => message,
                Err(_) => status.to_string(),
            };
            Err(ProviderError::Rejected(message))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Store(#[from] store::Error),
    #[error("Insufficient balance.")]
    InsufficientBalance,
    #[error("Please set a PayPal email in your profile first.")]
    MissingPayoutEmail,
    #[error("no such user")]
    NotFound,
    #[error("Payout failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("Unauthorized access.")]
    Unauthorized,
}

/// Pays out the user's entire balance.
///
/// The user's row stays locked until the payout is recorded, so concurrent requests for the same user
/// are serialized and only the first one sees a positive balance.
/// If the provider rejects the payout, nothing is written.
pub(crate) async fn request_payout(store: &dyn Store, provider: &dyn PaymentProvider, me: &User, user_id: Id<Users>) -> Result<Payout, Error> {
    let mut transaction = store.begin().await?;
    let user = transaction.user_for_update(user_id).await?.ok_or(Error::NotFound)?;
    if user.id != me.id {
        return Err(Error::Unauthorized)
    }
    if !user.balance.is_positive() {
        return Err(Error::InsufficientBalance)
    }
    let receiver = user.payout_email.clone().ok_or(Error::MissingPayoutEmail)?;
    let now = Utc::now();
    let request = PayoutRequest {
        sender_batch_id: format!("payout_{}_{}", now.format("%Y%m%d%H%M%S"), user.id),
        sender_item_id: format!("item_{}", user.id),
        amount: user.balance,
        receiver,
    };
    let receipt = match provider.send_payout(&request).await {
        Ok(receipt) => receipt,
        Err(e) => {
            log::warn!("payout of {} to user {} failed: {e} ({e:?})", request.amount, user.id);
            return Err(e.into())
        }
    };
    let payout = Payout {
        id: Id::new(),
        user: user.id,
        amount: user.balance,
        status: PayoutStatus::Completed,
        transaction_id: Some(receipt.batch_id),
        timestamp: now,
    };
    transaction.insert_payout(&payout).await?;
    transaction.reset_balance(user.id).await?;
    transaction.commit().await?;
    log::info!("paid out {} to user {}", payout.amount, user.id);
    Ok(payout)
}

#[rocket::post("/payout/<user_id>")]
pub(crate) async fn payout_post(store: &State<Arc<dyn Store>>, provider: &State<Arc<dyn PaymentProvider>>, me: User, user_id: Id<Users>) -> Result<Flash<Redirect>, InternalError> {
    let redirect = Redirect::to(uri!(crate::api::index));
    Ok(match request_payout(&***store, &***provider, &me, user_id).await {
        Ok(_) => Flash::success(redirect, "Payout successful! Check your PayPal account."),
        Err(Error::Store(e)) => return Err(e.into()),
        Err(e) => Flash::error(redirect, e.to_string()),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        std::sync::Mutex,
        crate::{
            store::MemoryStore,
            stub_server::StubServer,
        },
        super::*,
    };

    /// Records every request and answers with a fixed outcome.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) reject_with: Option<String>,
        pub(crate) requests: Mutex<Vec<PayoutRequest>>,
    }

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn send_payout(&self, request: &PayoutRequest) -> Result<PayoutReceipt, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.reject_with {
                Some(ref message) => Err(ProviderError::Rejected(message.clone())),
                None => Ok(PayoutReceipt { batch_id: format!("BATCH-{}", request.sender_item_id) }),
            }
        }
    }

    async fn user_with_balance(store: &MemoryStore, name: &str, balance: Money) -> User {
        let mut user = User::new(name.to_owned(), format!("{name}@example.com"), Shard::Psn);
        user.payout_email = Some(format!("{name}@paypal.example.com"));
        user.balance = balance;
        store.add_user(user).await
    }

    #[tokio::test]
    async fn successful_payout_zeroes_balance() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let user = user_with_balance(&store, "winner", Money::from_cents(4250)).await;
        let payout = request_payout(&store, &provider, &user, user.id).await.unwrap();
        assert_eq!(payout.amount, Money::from_cents(4250));
        assert_eq!(payout.status, PayoutStatus::Completed);
        let state = store.snapshot().await;
        assert_eq!(state.user(user.id).balance, Money::ZERO);
        assert_eq!(state.payouts.len(), 1);
        assert_eq!(state.payouts[0].amount, Money::from_cents(4250));
        assert_eq!(state.payouts[0].status, PayoutStatus::Completed);
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].receiver, "winner@paypal.example.com");
        assert_eq!(requests[0].amount, Money::from_cents(4250));
        assert!(requests[0].sender_batch_id.starts_with("payout_"));
    }

    #[tokio::test]
    async fn zero_balance_never_calls_provider() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let user = user_with_balance(&store, "broke", Money::ZERO).await;
        assert!(matches!(request_payout(&store, &provider, &user, user.id).await, Err(Error::InsufficientBalance)));
        assert!(provider.requests.lock().unwrap().is_empty());
        assert!(store.snapshot().await.payouts.is_empty());
    }

    #[tokio::test]
    async fn other_users_balance_is_off_limits() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let owner = user_with_balance(&store, "owner", Money::from_cents(1000)).await;
        let thief = user_with_balance(&store, "thief", Money::ZERO).await;
        assert!(matches!(request_payout(&store, &provider, &thief, owner.id).await, Err(Error::Unauthorized)));
        assert!(provider.requests.lock().unwrap().is_empty());
        let state = store.snapshot().await;
        assert_eq!(state.user(owner.id).balance, Money::from_cents(1000));
        assert!(state.payouts.is_empty());
    }

    #[tokio::test]
    async fn rejected_payout_changes_nothing() {
        let store = MemoryStore::default();
        let provider = FakeProvider { reject_with: Some(format!("RECEIVER_UNREGISTERED")), ..FakeProvider::default() };
        let user = user_with_balance(&store, "unlucky", Money::from_cents(999)).await;
        match request_payout(&store, &provider, &user, user.id).await {
            Err(Error::Provider(ProviderError::Rejected(message))) => assert_eq!(message, "RECEIVER_UNREGISTERED"),
            other => panic!("unexpected result: {other:?}"),
        }
        let state = store.snapshot().await;
        assert_eq!(state.user(user.id).balance, Money::from_cents(999));
        assert!(state.payouts.is_empty());
    }

    #[tokio::test]
    async fn missing_payout_email() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let mut user = User::new(format!("noemail"), format!("noemail@example.com"), Shard::Xbox);
        user.balance = Money::from_cents(100);
        let user = store.add_user(user).await;
        assert!(matches!(request_payout(&store, &provider, &user, user.id).await, Err(Error::MissingPayoutEmail)));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_payouts_pay_once() {
        let store = MemoryStore::default();
        let provider = FakeProvider::default();
        let user = user_with_balance(&store, "double", Money::from_cents(500)).await;
        let (first, second) = tokio::join!(
            request_payout(&store, &provider, &user, user.id),
            request_payout(&store, &provider, &user, user.id),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|outcome| matches!(outcome, Err(Error::InsufficientBalance))));
        assert_eq!(provider.requests.lock().unwrap().len(), 1);
        assert_eq!(store.snapshot().await.payouts.len(), 1);
    }

    #[test]
    fn paypal_body_shape() {
        let request = PayoutRequest {
            sender_batch_id: format!("payout_20260101120000_1"),
            sender_item_id: format!("item_1"),
            receiver: format!("someone@example.com"),
            amount: Money::from_cents(4250),
        };
        let body = serde_json::to_value(PayoutBody::from(&request)).unwrap();
        assert_eq!(body["sender_batch_header"]["sender_batch_id"], "payout_20260101120000_1");
        assert_eq!(body["items"][0]["amount"]["value"], "42.50");
        assert_eq!(body["items"][0]["amount"]["currency"], "USD");
        assert_eq!(body["items"][0]["receiver"], "someone@example.com");
        assert_eq!(body["items"][0]["recipient_type"], "EMAIL");
    }

    fn request() -> PayoutRequest {
        PayoutRequest {
            sender_batch_id: format!("payout_20260101120000_7"),
            sender_item_id: format!("item_7"),
            receiver: format!("winner@paypal.example.com"),
            amount: Money::from_cents(1999),
        }
    }

    fn paypal(server: &StubServer) -> PayPal {
        PayPal::with_base_url(server.http_client(), server.base_url.clone(), format!("client-id"), format!("client-secret"))
    }

    #[tokio::test]
    async fn paypal_token_then_payout() {
        let server = StubServer::start(vec![
            (200, serde_json::json!({ "access_token": "A21AA-token", "token_type": "Bearer", "expires_in": 32400 })),
            (201, serde_json::json!({ "batch_header": { "payout_batch_id": "5UXD2E8A7EBQJ", "batch_status": "PENDING" } })),
        ]).await;
        let receipt = paypal(&server).send_payout(&request()).await.unwrap();
        assert_eq!(receipt, PayoutReceipt { batch_id: format!("5UXD2E8A7EBQJ") });
        let [token, payout] = <[_; 2]>::try_from(server.received()).unwrap();
        assert_eq!((&*token.method, &*token.target), ("POST", "/v1/oauth2/token"));
        // base64 of "client-id:client-secret"
        assert_eq!(token.header("authorization"), Some("Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ="));
        assert_eq!(token.body, "grant_type=client_credentials");
        assert_eq!((&*payout.method, &*payout.target), ("POST", "/v1/payments/payouts"));
        assert_eq!(payout.header("authorization"), Some("Bearer A21AA-token"));
        let body = serde_json::from_str::<serde_json::Value>(&payout.body).unwrap();
        assert_eq!(body["items"][0]["receiver"], "winner@paypal.example.com");
        assert_eq!(body["items"][0]["amount"]["value"], "19.99");
    }

    #[tokio::test]
    async fn paypal_rejection_message() {
        let server = StubServer::start(vec![
            (200, serde_json::json!({ "access_token": "A21AA-token" })),
            (422, serde_json::json!({ "name": "VALIDATION_ERROR", "message": "Invalid request - see details" })),
        ]).await;
        match paypal(&server).send_payout(&request()).await {
            Err(ProviderError::Rejected(message)) => assert_eq!(message, "Invalid request - see details"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn paypal_rejection_without_message() {
        let server = StubServer::start(vec![
            (200, serde_json::json!({ "access_token": "A21AA-token" })),
            (503, serde_json::json!("maintenance")),
        ]).await;
        match paypal(&server).send_payout(&request()).await {
            Err(ProviderError::Rejected(message)) => assert_eq!(message, "503 Service Unavailable"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn paypal_bad_credentials_send_nothing() {
        let server = StubServer::start(vec![
            (401, serde_json::json!({ "error": "invalid_client" })),
        ]).await;
        assert!(matches!(paypal(&server).send_payout(&request()).await, Err(ProviderError::Reqwest(_))));
        assert_eq!(server.received().len(), 1);
    }
}
