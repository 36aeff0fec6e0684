use serde::{Deserialize, Serialize};

use crate::account::{ActiveAccount, Plan};
use crate::config::{CostTable, StyleOption};
use crate::media_store::{GeneratedMedia, MediaItem};
use crate::model::{AppState, GenerationPhase, InsufficientCredits, Model};
use crate::request::SourceFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub credits: i64,
    pub plan: Plan,
    pub plan_name: String,
    pub can_manage_subscription: bool,
    pub ads_remaining_today: u32,
    pub referral_link_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingError {
    pub code: String,
    pub message: String,
    /// Policy refusals render as a blocking dialog, the rest as a banner.
    pub blocking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStatus {
    Idle,
    Working,
    Busy { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryView {
    pub items: Vec<MediaItem>,
    pub has_more: bool,
    pub loading: bool,
    pub selected: Option<MediaItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    pub state: AppState,
    pub show_chrome: bool,
    pub account: Option<AccountView>,
    pub modal: Option<InsufficientCredits>,
    pub error: Option<UserFacingError>,
    pub notice: Option<String>,
    pub status_message: Option<String>,
    pub loading_message: Option<String>,
    pub generation: GenerationStatus,
    /// Photos carried over from the previous request, e.g. after "generate more".
    pub staged_files: Vec<SourceFile>,
    pub results: Vec<GeneratedMedia>,
    pub fallback_notice: Option<String>,
    pub history: HistoryView,
    pub costs: CostTable,
    pub styles: Vec<StyleOption>,
}

fn account_view(model: &Model) -> Option<AccountView> {
    let ActiveAccount::Member(account) = &model.account else {
        return None;
    };
    Some(AccountView {
        email: account.email.to_string(),
        name: account.name.clone(),
        picture: account.picture.clone(),
        credits: account.credits,
        plan: account.plan,
        plan_name: account.plan.display_name().to_string(),
        can_manage_subscription: account.plan.is_subscription()
            && account.stripe_customer_id.is_some(),
        ads_remaining_today: model
            .config
            .max_daily_ads
            .saturating_sub(account.ads_watched_on(model.today)),
        referral_link_token: account.email.to_string(),
    })
}

fn generation_status(phase: &GenerationPhase) -> GenerationStatus {
    match phase {
        GenerationPhase::Idle => GenerationStatus::Idle,
        GenerationPhase::InFlight { .. } | GenerationPhase::Saving { .. } => {
            GenerationStatus::Working
        }
        GenerationPhase::Busy { message } => GenerationStatus::Busy {
            message: message.clone(),
        },
        GenerationPhase::Failed { error } => GenerationStatus::Failed {
            message: error.user_facing_message(),
        },
    }
}

pub fn project(model: &Model) -> ViewModel {
    // Maintenance hides everything but the maintenance screen.
    if model.state == AppState::Maintenance {
        return ViewModel {
            state: AppState::Maintenance,
            show_chrome: false,
            account: None,
            modal: None,
            error: None,
            notice: None,
            status_message: None,
            loading_message: None,
            generation: GenerationStatus::Idle,
            staged_files: Vec::new(),
            results: Vec::new(),
            fallback_notice: None,
            history: HistoryView {
                items: Vec::new(),
                has_more: false,
                loading: false,
                selected: None,
            },
            costs: model.config.costs,
            styles: Vec::new(),
        };
    }

    ViewModel {
        state: model.state,
        show_chrome: model.state.shows_chrome(),
        account: account_view(model),
        modal: model.modal,
        error: model.error.as_ref().map(|e| UserFacingError {
            code: e.code().to_string(),
            message: e.user_facing_message(),
            blocking: e.kind.is_policy(),
        }),
        notice: model.notice.clone(),
        status_message: model.status_message.clone(),
        loading_message: model.loading_message.clone(),
        generation: generation_status(&model.generation),
        staged_files: model
            .request
            .as_ref()
            .map(|r| r.source_files().to_vec())
            .unwrap_or_default(),
        results: model.results.clone(),
        fallback_notice: model.fallback_notice.clone(),
        history: HistoryView {
            items: model.history.items.clone(),
            has_more: model.history.has_more,
            loading: model.history.loading,
            selected: model.history.selected.clone(),
        },
        costs: model.config.costs,
        styles: model.config.styles.clone(),
    }
}
