#![allow(dead_code)]

use std::collections::VecDeque;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::NaiveDate;
use crux_core::testing::{AppTester, Update};
use crux_core::Request;

use shared::account::{Email, UserAccount};
use shared::capabilities::{
    serve_storage, CheckoutOperation, GenerationOperation, GenerationOutput, GenerationResult,
    LocalStorage, MemoryStorage, NavigationOperation, PaymentResult,
};
use shared::config::{account_key, AppConfig, LAST_USER_KEY};
use shared::media_store::{serve_library, GeneratedMedia, MediaContent, MediaKind, MemoryMediaStore};
use shared::identity::VerifiedIdentity;
use shared::request::SourceFile;
use shared::{App, Effect, Event, Model};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
}

pub fn member(email: &str, credits: i64) -> UserAccount {
    let identity = VerifiedIdentity {
        email: Email::parse(email).unwrap(),
        name: None,
        picture: None,
    };
    UserAccount::new(&identity, credits, today())
}

pub fn credential(email: &str) -> String {
    signed(email, true)
}

pub fn signed(email: &str, verified: bool) -> String {
    let payload = serde_json::json!({
        "email": email,
        "email_verified": verified,
        "name": "Test User",
    });
    format!(
        "eyJhbGciOiJSUzI1NiJ9.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

pub fn photo(name: &str) -> SourceFile {
    SourceFile {
        name: name.to_string(),
        mime_type: "image/jpeg".to_string(),
        handle: format!("blob:{name}"),
    }
}

pub fn one_image(fallback_notice: Option<&str>) -> GenerationResult {
    Ok(GenerationOutput {
        media: vec![GeneratedMedia {
            kind: MediaKind::Image,
            content: MediaContent::DataUrl("data:image/png;base64,AAAA".into()),
        }],
        fallback_notice: fallback_notice.map(str::to_string),
    })
}

/// Drives the app the way a shell would, serving storage and library
/// requests from in-memory backends and parking generator and payment
/// requests until a test resolves them.
pub struct Harness {
    pub app: AppTester<App, Effect>,
    pub model: Model,
    pub storage: MemoryStorage,
    pub library: MemoryMediaStore,
    pub generations: VecDeque<Request<GenerationOperation>>,
    pub payments: VecDeque<Request<CheckoutOperation>>,
    pub navigations: Vec<NavigationOperation>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            app: AppTester::default(),
            model: Model::with_config(config),
            storage: MemoryStorage::new(),
            library: MemoryMediaStore::new(),
            generations: VecDeque::new(),
            payments: VecDeque::new(),
            navigations: Vec::new(),
        }
    }

    /// Seeds a persisted, last-used account so the next boot resumes it.
    pub fn with_saved_account(self, account: &UserAccount) -> Self {
        self.save_account(account);
        self.storage
            .set(LAST_USER_KEY, account.email.as_str())
            .unwrap();
        self
    }

    pub fn save_account(&self, account: &UserAccount) {
        self.storage
            .set(&account_key(account.email.as_str()), &account.to_record().unwrap())
            .unwrap();
    }

    pub fn stored_account(&self, email: &str) -> Option<serde_json::Value> {
        self.storage
            .get(&account_key(email))
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    pub async fn boot(&mut self, url: &str) {
        self.send(Event::Started {
            url: url.to_string(),
            today: today(),
            maintenance: false,
        })
        .await;
    }

    pub async fn sign_in(&mut self, email: &str) {
        self.send(Event::IdentityAsserted {
            credential: credential(email),
        })
        .await;
    }

    pub async fn send(&mut self, event: Event) {
        let update = self.app.update(event, &mut self.model);
        self.drain(update).await;
    }

    pub async fn resolve_generation(&mut self, result: GenerationResult) {
        let mut request = self
            .generations
            .pop_front()
            .expect("a generation request is pending");
        let update = self
            .app
            .resolve(&mut request, result)
            .expect("generation request resolves");
        self.drain(update).await;
    }

    pub async fn resolve_payment(&mut self, result: PaymentResult) {
        let mut request = self.payments.pop_front().expect("a payment request is pending");
        let update = self
            .app
            .resolve(&mut request, result)
            .expect("payment request resolves");
        self.drain(update).await;
    }

    /// Boots with a saved account and lands it on the upload screen.
    pub async fn signed_in_at_upload(account: &UserAccount) -> Self {
        let mut harness = Self::new().with_saved_account(account);
        harness.boot("https://app.example.com/").await;
        harness.send(Event::StartCreating).await;
        harness
    }

    pub fn credits(&self) -> i64 {
        self.model.account.credits()
    }

    async fn drain(&mut self, update: Update<Effect, Event>) {
        let mut effects: VecDeque<Effect> = update.effects.into();
        let mut events: VecDeque<Event> = update.events.into();

        loop {
            if let Some(event) = events.pop_front() {
                let update = self.app.update(event, &mut self.model);
                effects.extend(update.effects);
                events.extend(update.events);
                continue;
            }
            let Some(effect) = effects.pop_front() else {
                break;
            };
            let update = match effect {
                Effect::Render(_) => continue,
                Effect::Storage(mut request) => {
                    let output = serve_storage(&self.storage, request.operation.clone());
                    self.app
                        .resolve(&mut request, output)
                        .expect("storage request resolves")
                }
                Effect::Library(mut request) => {
                    let output = serve_library(&self.library, request.operation.clone()).await;
                    self.app
                        .resolve(&mut request, output)
                        .expect("library request resolves")
                }
                Effect::Navigation(mut request) => {
                    self.navigations.push(request.operation.clone());
                    self.app
                        .resolve(&mut request, ())
                        .expect("navigation request resolves")
                }
                Effect::Generator(request) => {
                    self.generations.push_back(request);
                    continue;
                }
                Effect::Checkout(request) => {
                    self.payments.push_back(request);
                    continue;
                }
            };
            effects.extend(update.effects);
            events.extend(update.events);
        }
    }
}
