use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::account::{
    apply_purchase, authenticate, load_active_account, record_ad_watch, ActiveAccount,
    AuthRecords, DeviceRegistry, UserAccount,
};
use crate::boot_url::{parse_boot_url, CheckoutReturn};
use crate::capabilities::{Capabilities, GenerationResult, Verification};
use crate::config::{account_key, DEVICE_ACCOUNTS_KEY, LAST_USER_KEY};
use crate::error::{AppError, GenerationError, PaymentError, RequestError, StorageError};
use crate::event::Event;
use crate::identity::decode_credential;
use crate::media_store::{MediaId, MediaItem, MediaPage};
use crate::model::{AppState, GenerationPhase, InsufficientCredits, Model};
use crate::pricing::{check_affordable, cost_of};
use crate::request::{Direction, GenerationRequest};
use crate::view::{self, ViewModel};

const VERIFY_FAILED: &str = "We could not verify your payment. Please contact support.";
const CHECKOUT_CANCELLED: &str = "Your payment was canceled. You have not been charged.";
const PORTAL_UNAVAILABLE: &str =
    "Subscription management is only available for active subscribers.";

#[derive(Default)]
pub struct App;

impl App {
    fn on_started(
        url: &str,
        today: chrono::NaiveDate,
        maintenance: bool,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.today = today;
        if maintenance {
            model.account = ActiveAccount::Guest;
            model.transition(AppState::Maintenance);
            return;
        }

        let params = parse_boot_url(url);
        if let Some(clean) = &params.clean_url {
            caps.navigation.replace_url(clean.clone());
        }
        if let Some(referral) = params.referral {
            tracing::info!("referral token captured");
            model.referral = Some(referral);
        }

        match &params.checkout {
            Some(CheckoutReturn::Success { .. }) => {
                model.loading_message = Some("Verifying your payment...".into());
                model.transition(AppState::VerifyingPayment);
            }
            Some(CheckoutReturn::Cancelled) => {
                model.status_message = Some(CHECKOUT_CANCELLED.into());
                model.transition(AppState::Cancel);
            }
            Some(CheckoutReturn::SuccessWithoutSession) | None => {
                model.transition(AppState::Landing);
            }
        }
        model.pending_checkout = params.checkout;

        caps.storage.read(
            vec![LAST_USER_KEY.to_string(), DEVICE_ACCOUNTS_KEY.to_string()],
            Event::BootRecordsLoaded,
        );
    }

    fn on_boot_records(
        result: Result<Vec<Option<String>>, StorageError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let values = match result {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "could not read session pointers, continuing as guest");
                Self::finish_boot(model, caps);
                return;
            }
        };
        let mut values = values.into_iter();
        let last_user = values.next().flatten();
        model.device = DeviceRegistry::from_record(values.next().flatten().as_deref());

        match last_user {
            Some(email) => {
                let key = account_key(&email);
                caps.storage
                    .read(vec![key], move |result| Event::ActiveRecordLoaded { email, result });
            }
            None => {
                model.account = ActiveAccount::Guest;
                Self::finish_boot(model, caps);
            }
        }
    }

    fn on_active_record(
        email: &str,
        result: Result<Vec<Option<String>>, StorageError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let record = match result {
            Ok(values) => values.into_iter().next().flatten(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read account record");
                None
            }
        };
        let loaded = load_active_account(Some(email), record.as_deref(), model.today, &model.config);
        if !loaded.discard.is_empty() {
            caps.storage.remove(loaded.discard, Event::Persisted);
        }
        model.account = loaded.account;
        Self::finish_boot(model, caps);
    }

    fn finish_boot(model: &mut Model, caps: &Capabilities) {
        if let Some(CheckoutReturn::Success { session_id }) = &model.pending_checkout {
            caps.checkout
                .verify_session(session_id, Event::CheckoutVerified);
        }
    }

    fn on_identity(credential: &str, model: &mut Model, caps: &Capabilities) {
        let identity = match decode_credential(credential) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "rejected identity assertion");
                model.set_error(e);
                return;
            }
        };

        let mut keys = vec![account_key(identity.email.as_str())];
        let referral = model
            .referral
            .clone()
            .filter(|token| token != identity.email.as_str());
        if let Some(token) = &referral {
            keys.push(account_key(token));
        }
        caps.storage.read(keys, move |result| Event::AuthRecordsLoaded {
            identity,
            referral,
            result,
        });
    }

    fn on_auth_records(
        &self,
        identity: &crate::identity::VerifiedIdentity,
        referral: Option<&str>,
        result: Result<Vec<Option<String>>, StorageError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let values = match result {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "could not read account records during sign-in");
                model.set_error(e);
                return;
            }
        };
        let records = AuthRecords {
            existing: values.first().and_then(Option::as_deref),
            referral,
            referrer: values.get(1).and_then(Option::as_deref),
        };

        let outcome = match authenticate(
            identity,
            &records,
            &model.device,
            model.today,
            &model.config,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "sign-in refused");
                model.set_error(e);
                return;
            }
        };

        let mut writes = Vec::new();
        match outcome.account.to_record() {
            Ok(record) => writes.push((outcome.account.storage_key(), record)),
            Err(e) => tracing::warn!(error = %e, "could not encode account record"),
        }
        writes.push((LAST_USER_KEY.to_string(), outcome.account.email.to_string()));
        if let Some(device) = &outcome.device {
            match device.to_record() {
                Ok(record) => writes.push((DEVICE_ACCOUNTS_KEY.to_string(), record)),
                Err(e) => tracing::warn!(error = %e, "could not encode device account list"),
            }
            model.device = device.clone();
        }
        if let Some(referrer) = &outcome.referrer {
            match referrer.to_record() {
                Ok(record) => writes.push((referrer.storage_key(), record)),
                Err(e) => tracing::warn!(error = %e, "could not encode referrer record"),
            }
            model.referral = None;
            model.notice = Some(format!(
                "Welcome! As a bonus for being referred by a friend, {} extra credits have been added to your account.",
                model.config.referral_bonus
            ));
        }
        caps.storage.write(writes, Event::Persisted);

        tracing::info!(created = outcome.created, "signed in");
        model.account = ActiveAccount::Member(outcome.account);
        model.error = None;
        model.transition(AppState::Landing);

        if let Some(action) = model.pending_action.take() {
            tracing::debug!(action = action.name(), "resuming action parked at sign-in");
            self.update_inner(*action, model, caps);
        }
    }

    fn persist_account(account: &UserAccount, caps: &Capabilities) {
        match account.to_record() {
            Ok(record) => caps
                .storage
                .write(vec![(account.storage_key(), record)], Event::Persisted),
            Err(e) => tracing::warn!(error = %e, "could not encode account record"),
        }
    }

    fn set_member(account: UserAccount, model: &mut Model, caps: &Capabilities) {
        Self::persist_account(&account, caps);
        model.account = ActiveAccount::Member(account);
    }

    /// Gate and start a fully formed request.
    fn begin_generation(request: GenerationRequest, model: &mut Model, caps: &Capabilities) {
        if model.state.is_busy() {
            tracing::debug!(state = model.state.name(), "generation ignored while busy");
            return;
        }
        let Some(account) = model.account.member() else {
            return;
        };
        if let Err(e) = request.validate(&model.config) {
            tracing::warn!(error = %e, "incomplete generation request");
            model.set_error(e);
            return;
        }
        if let Err(e) = check_affordable(account, &request, &model.config.costs) {
            tracing::warn!(error = %e, "generation refused");
            if let crate::error::PolicyError::InsufficientCredits { required, current } = e {
                model.modal = Some(InsufficientCredits { required, current });
            }
            return;
        }

        model.results.clear();
        model.fallback_notice = None;
        model.modal = None;
        model.error = None;
        model.request = Some(request);
        model.transition(AppState::Generating);
        Self::dispatch_generation(model, caps);
    }

    fn dispatch_generation(model: &mut Model, caps: &Capabilities) {
        let (Some(owner), Some(request)) = (model.owner(), model.request.clone()) else {
            return;
        };
        let ticket = Uuid::new_v4();
        model.generation = GenerationPhase::InFlight { ticket };
        caps.generator.generate(&owner, request, move |result| {
            Event::GenerationFinished { ticket, result }
        });
    }

    fn on_generation_finished(
        ticket: Uuid,
        result: GenerationResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let in_flight = matches!(model.generation, GenerationPhase::InFlight { .. });
        if !in_flight || !model.is_current(ticket) {
            tracing::debug!(%ticket, "dropping stale generation result");
            return;
        }
        let Some(owner) = model.owner() else {
            return;
        };

        let result = result.and_then(|output| {
            if output.media.is_empty() {
                Err(GenerationError::Malformed {
                    reason: "no media returned".into(),
                })
            } else {
                Ok(output)
            }
        });

        match result {
            Ok(output) => {
                caps.library
                    .append(&owner, output.media.clone(), move |result| Event::MediaSaved {
                        ticket,
                        result,
                    });
                model.generation = GenerationPhase::Saving { ticket, output };
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "generator busy");
                let message = AppError::from(e).user_facing_message();
                model.generation = GenerationPhase::Busy { message };
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                model.generation = GenerationPhase::Failed { error: e.into() };
            }
        }
    }

    fn on_media_saved(
        ticket: Uuid,
        result: Result<Vec<MediaId>, StorageError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let saving = matches!(model.generation, GenerationPhase::Saving { .. });
        if !saving || !model.is_current(ticket) {
            tracing::debug!(%ticket, "dropping stale save confirmation");
            return;
        }
        let GenerationPhase::Saving { output, .. } = std::mem::take(&mut model.generation) else {
            return;
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "generated media could not be saved, not charging");
            model.generation = GenerationPhase::Failed { error: e.into() };
            return;
        }

        match output.fallback_notice {
            Some(notice) => {
                tracing::info!("fallback result, no charge");
                model.fallback_notice = Some(notice);
            }
            None => {
                let cost = cost_of(model.request.as_ref(), &model.config.costs);
                if let Some(account) = model.account.member() {
                    let charged = account.debited(cost);
                    tracing::info!(cost, balance = charged.credits, "charged for generation");
                    Self::set_member(charged, model, caps);
                }
            }
        }
        model.results = output.media;
        model.transition(AppState::Results);
    }

    fn on_retry(model: &mut Model, caps: &Capabilities) {
        let busy = matches!(model.generation, GenerationPhase::Busy { .. });
        let failed = matches!(model.generation, GenerationPhase::Failed { .. });
        if busy && model.state == AppState::Generating {
            Self::dispatch_generation(model, caps);
        } else if failed {
            model.clear_generation();
            model.transition(AppState::Uploading);
        }
    }

    fn random_style_request(
        files: Vec<crate::request::SourceFile>,
        keep_likeness: bool,
        aspect_ratio: crate::request::AspectRatio,
        model: &Model,
    ) -> Option<GenerationRequest> {
        let style = model.config.styles.choose(&mut rand::thread_rng())?;
        Some(GenerationRequest::Image {
            files,
            direction: Some(Direction::Style {
                style_id: style.id.clone(),
            }),
            keep_likeness,
            aspect_ratio,
        })
    }

    fn open_history(model: &mut Model, caps: &Capabilities) {
        model.history = crate::model::HistoryState {
            loading: true,
            ..Default::default()
        };
        model.transition(AppState::History);
        Self::request_history_page(1, model, caps);
    }

    fn request_history_page(page: u32, model: &mut Model, caps: &Capabilities) {
        let Some(owner) = model.owner() else {
            return;
        };
        model.history.loading = true;
        let page_size = model.config.history_page_size;
        let for_owner = owner.clone();
        caps.library.page(&owner, page, page_size, move |result| {
            Event::HistoryPageLoaded {
                owner: for_owner,
                page,
                result,
            }
        });
    }

    fn on_history_page(
        owner: &str,
        page: u32,
        result: Result<MediaPage, StorageError>,
        model: &mut Model,
    ) {
        if model.state != AppState::History || model.owner().as_deref() != Some(owner) {
            tracing::debug!(page, "dropping history page for inactive view");
            return;
        }
        model.history.loading = false;
        match result {
            Ok(loaded) => {
                if page <= 1 {
                    model.history.items = loaded.items;
                } else {
                    model.history.items.extend(loaded.items);
                }
                model.history.page = page;
                model.history.has_more = loaded.has_more;
            }
            Err(e) => {
                tracing::warn!(error = %e, page, "could not load history");
                model.set_error(e);
            }
        }
    }

    fn open_history_item(id: MediaId, model: &Model, caps: &Capabilities) {
        if model.state != AppState::History {
            return;
        }
        let Some(owner) = model.owner() else {
            return;
        };
        let for_owner = owner.clone();
        caps.library.fetch_owned(&owner, id, move |result| Event::HistoryItemLoaded {
            owner: for_owner,
            result,
        });
    }

    fn on_history_item(
        owner: &str,
        result: Result<Option<MediaItem>, StorageError>,
        model: &mut Model,
    ) {
        if model.state != AppState::History || model.owner().as_deref() != Some(owner) {
            tracing::debug!("dropping history item for inactive view");
            return;
        }
        match result {
            Ok(Some(item)) => model.history.selected = Some(item),
            Ok(None) => {
                tracing::warn!("history item missing or not owned by the active account");
                model.history.selected = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load history item");
                model.set_error(e);
            }
        }
    }

    fn on_checkout_requested(price_id: &str, model: &mut Model, caps: &Capabilities) {
        if model.state.is_busy() {
            tracing::debug!(state = model.state.name(), "checkout ignored while busy");
            return;
        }
        let Some(email) = model.owner() else {
            return;
        };
        model.loading_message = Some("Connecting securely to checkout...".into());
        model.transition(AppState::VerifyingPayment);
        caps.checkout
            .create_session(price_id, &email, Event::RedirectReady);
    }

    fn on_manage_subscription(model: &mut Model, caps: &Capabilities) {
        let customer = model
            .account
            .member()
            .filter(|a| a.plan.is_subscription())
            .and_then(|a| a.stripe_customer_id.clone());
        let Some(customer) = customer else {
            model.notice = Some(PORTAL_UNAVAILABLE.into());
            return;
        };
        if model.state.is_busy() {
            return;
        }
        model.loading_message = Some("Redirecting to your billing portal...".into());
        model.transition(AppState::VerifyingPayment);
        caps.checkout.create_portal(&customer, Event::RedirectReady);
    }

    fn on_redirect_ready(
        result: Result<String, PaymentError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if model.state != AppState::VerifyingPayment {
            tracing::debug!("dropping payment redirect for inactive view");
            return;
        }
        match result {
            Ok(url) => caps.navigation.redirect(url),
            Err(e) => {
                tracing::warn!(error = %e, "payment session failed");
                model.loading_message = None;
                model.set_error(e);
                model.transition(AppState::Landing);
            }
        }
    }

    fn on_checkout_verified(
        result: Result<Verification, PaymentError>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.pending_checkout = None;
        model.loading_message = None;

        let verified = match result {
            Ok(Verification {
                success: true,
                product_id: Some(product_id),
                stripe_customer_id,
            }) => Some((product_id, stripe_customer_id)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "payment verification failed");
                None
            }
        };

        let settled = verified.and_then(|(product_id, customer)| {
            let account = model.account.member()?;
            Some(apply_purchase(
                account,
                &product_id,
                customer.as_deref(),
                &model.config,
            ))
        });

        match settled {
            Some(purchase) => {
                tracing::info!(
                    credits = purchase.account.credits,
                    plan = purchase.account.plan.display_name(),
                    "purchase settled"
                );
                Self::set_member(purchase.account, model, caps);
                model.status_message = Some(purchase.message);
                model.transition(AppState::Success);
            }
            None => {
                model.status_message = Some(VERIFY_FAILED.into());
                model.transition(AppState::Cancel);
            }
        }
    }

    fn update_inner(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if model.state == AppState::Maintenance {
            tracing::debug!(event = event.name(), "ignored during maintenance");
            return;
        }

        if event.requires_account() && model.account.is_guest() {
            tracing::debug!(event = event.name(), "parking action until sign-in");
            model.pending_action = Some(Box::new(event));
            model.transition(AppState::Auth);
            return;
        }

        match event {
            Event::Started {
                url,
                today,
                maintenance,
            } => Self::on_started(&url, today, maintenance, model, caps),
            Event::BootRecordsLoaded(result) => Self::on_boot_records(result, model, caps),
            Event::ActiveRecordLoaded { email, result } => {
                Self::on_active_record(&email, result, model, caps);
            }

            Event::SignInRequested => {
                model.pending_action = None;
                model.transition(AppState::Auth);
            }
            Event::SignOutRequested => {
                caps.storage
                    .remove(vec![LAST_USER_KEY.to_string()], Event::Persisted);
                model.account = ActiveAccount::Guest;
                model.pending_action = None;
                model.clear_generation();
                model.history = crate::model::HistoryState::default();
                model.transition(AppState::Landing);
            }
            Event::IdentityAsserted { credential } => Self::on_identity(&credential, model, caps),
            Event::AuthRecordsLoaded {
                identity,
                referral,
                result,
            } => self.on_auth_records(&identity, referral.as_deref(), result, model, caps),
            Event::AdWatched { today } => {
                model.today = today;
                let outcome = model
                    .account
                    .member()
                    .map(|account| record_ad_watch(account, today, &model.config));
                match outcome {
                    Some(Ok(rewarded)) => Self::set_member(rewarded, model, caps),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "ad reward refused");
                        model.set_error(e);
                    }
                    None => {}
                }
            }
            Event::DismissNotice => {
                model.notice = None;
                model.error = None;
            }

            Event::StartCreating => {
                model.clear_generation();
                model.transition(AppState::Uploading);
            }
            Event::OpenCustomPrompt { files } => {
                model.request = Some(GenerationRequest::staged_image(files));
                model.transition(AppState::CustomPrompt);
            }
            Event::OpenDesignStudio => model.transition(AppState::DesignStudio),
            Event::OpenHistory => Self::open_history(model, caps),
            Event::LoadMoreHistory => {
                if model.state == AppState::History
                    && !model.history.loading
                    && model.history.has_more
                {
                    let next = model.history.page + 1;
                    Self::request_history_page(next, model, caps);
                }
            }
            Event::OpenHistoryItem { id } => Self::open_history_item(id, model, caps),
            Event::CloseHistoryItem => model.history.selected = None,
            Event::NavigateHome => {
                model.clear_generation();
                model.transition(AppState::Landing);
            }
            Event::GenerateMore => {
                model.request = model
                    .request
                    .as_ref()
                    .and_then(GenerationRequest::without_direction);
                model.generation = GenerationPhase::Idle;
                model.results.clear();
                model.fallback_notice = None;
                model.transition(AppState::Uploading);
            }
            Event::BackToUpload => {
                model.fallback_notice = None;
                model.transition(AppState::Uploading);
            }
            Event::DismissModal => model.modal = None,
            Event::GoToPricing => {
                model.modal = None;
                model.transition(AppState::Landing);
            }

            Event::GenerateStyled {
                files,
                style_id,
                keep_likeness,
                aspect_ratio,
            } => Self::begin_generation(
                GenerationRequest::Image {
                    files,
                    direction: Some(Direction::Style { style_id }),
                    keep_likeness,
                    aspect_ratio,
                },
                model,
                caps,
            ),
            Event::GenerateRandom {
                files,
                keep_likeness,
                aspect_ratio,
            } => {
                if let Some(request) =
                    Self::random_style_request(files, keep_likeness, aspect_ratio, model)
                {
                    Self::begin_generation(request, model, caps);
                }
            }
            Event::GenerateCustom {
                prompt,
                negative_prompt,
                keep_likeness,
                aspect_ratio,
            } => {
                let files = match &model.request {
                    Some(GenerationRequest::Image { files, .. }) if !files.is_empty() => {
                        files.clone()
                    }
                    _ => {
                        tracing::warn!("custom prompt without staged photo");
                        model.set_error(RequestError::MissingFiles);
                        return;
                    }
                };
                Self::begin_generation(
                    GenerationRequest::Image {
                        files,
                        direction: Some(Direction::prompt(prompt, negative_prompt)),
                        keep_likeness,
                        aspect_ratio,
                    },
                    model,
                    caps,
                );
            }
            Event::GenerateGroup {
                files,
                direction,
                keep_likeness,
                aspect_ratio,
            } => Self::begin_generation(
                GenerationRequest::Group {
                    files,
                    direction: Some(direction),
                    keep_likeness,
                    aspect_ratio,
                },
                model,
                caps,
            ),
            Event::GenerateDesign {
                text_content,
                style_description,
                logo,
            } => Self::begin_generation(
                GenerationRequest::Design {
                    text_content,
                    style_description,
                    logo,
                },
                model,
                caps,
            ),
            Event::GenerateVideo {
                kind,
                files,
                prompt,
            } => Self::begin_generation(
                GenerationRequest::Video {
                    kind,
                    files,
                    prompt,
                },
                model,
                caps,
            ),
            Event::RetryGeneration => Self::on_retry(model, caps),
            Event::GenerationFinished { ticket, result } => {
                Self::on_generation_finished(ticket, result, model, caps);
            }
            Event::MediaSaved { ticket, result } => {
                Self::on_media_saved(ticket, result, model, caps);
            }

            Event::CheckoutRequested { price_id } => {
                Self::on_checkout_requested(&price_id, model, caps);
            }
            Event::ManageSubscription => Self::on_manage_subscription(model, caps),
            Event::ContinueFromSuccess | Event::RetryPricing => {
                model.status_message = None;
                model.transition(AppState::Landing);
            }
            Event::RedirectReady(result) => Self::on_redirect_ready(result, model, caps),
            Event::CheckoutVerified(result) => Self::on_checkout_verified(result, model, caps),

            Event::HistoryPageLoaded {
                owner,
                page,
                result,
            } => Self::on_history_page(&owner, page, result, model),
            Event::HistoryItemLoaded { owner, result } => {
                Self::on_history_item(&owner, result, model);
            }
            Event::Persisted(result) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "persisting session data failed");
                }
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        tracing::trace!(event = event.name(), state = model.state.name(), "update");
        let is_persist = matches!(event, Event::Persisted(_));
        self.update_inner(event, model, caps);
        if !is_persist {
            caps.render.render();
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::project(model)
    }
}
