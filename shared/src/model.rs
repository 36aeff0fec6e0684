use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::{ActiveAccount, DeviceRegistry};
use crate::boot_url::CheckoutReturn;
use crate::capabilities::GenerationOutput;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::event::Event;
use crate::media_store::{GeneratedMedia, MediaItem};
use crate::request::GenerationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Auth,
    #[default]
    Landing,
    Uploading,
    CustomPrompt,
    Generating,
    Results,
    History,
    DesignStudio,
    Success,
    Cancel,
    VerifyingPayment,
    Maintenance,
}

impl AppState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Landing => "landing",
            Self::Uploading => "uploading",
            Self::CustomPrompt => "custom_prompt",
            Self::Generating => "generating",
            Self::Results => "results",
            Self::History => "history",
            Self::DesignStudio => "design_studio",
            Self::Success => "success",
            Self::Cancel => "cancel",
            Self::VerifyingPayment => "verifying_payment",
            Self::Maintenance => "maintenance",
        }
    }

    /// States in which a new generation or checkout may not start.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Generating | Self::VerifyingPayment | Self::Maintenance
        )
    }

    #[must_use]
    pub const fn shows_chrome(self) -> bool {
        !matches!(self, Self::Maintenance)
    }
}

/// Progress of the in-flight generation. The ticket identifies the call that
/// owns the phase; completions carrying any other ticket are stale.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    #[default]
    Idle,
    InFlight {
        ticket: Uuid,
    },
    Saving {
        ticket: Uuid,
        output: GenerationOutput,
    },
    /// Quota or rate limit. Retrying re-runs the same request.
    Busy {
        message: String,
    },
    /// Retrying returns to the upload screen.
    Failed {
        error: AppError,
    },
}

impl GenerationPhase {
    pub fn ticket(&self) -> Option<Uuid> {
        match self {
            Self::InFlight { ticket } | Self::Saving { ticket, .. } => Some(*ticket),
            Self::Idle | Self::Busy { .. } | Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientCredits {
    pub required: i64,
    pub current: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryState {
    /// Last page loaded, 0 before the first response.
    pub page: u32,
    pub items: Vec<MediaItem>,
    pub has_more: bool,
    pub loading: bool,
    /// Item opened from the list, re-read from the store.
    pub selected: Option<MediaItem>,
}

#[derive(Debug, Default)]
pub struct Model {
    pub state: AppState,
    pub config: AppConfig,
    pub today: NaiveDate,

    pub account: ActiveAccount,
    pub device: DeviceRegistry,
    /// Referrer email picked up from the launch URL; spent once a bonus is applied.
    pub referral: Option<String>,
    /// Gated action a guest attempted; replayed once after sign-in.
    pub pending_action: Option<Box<Event>>,
    pub pending_checkout: Option<CheckoutReturn>,

    pub request: Option<GenerationRequest>,
    pub generation: GenerationPhase,
    pub results: Vec<GeneratedMedia>,
    pub fallback_notice: Option<String>,

    pub modal: Option<InsufficientCredits>,
    pub error: Option<AppError>,
    pub notice: Option<String>,
    /// Body text of the success and cancel screens.
    pub status_message: Option<String>,
    pub loading_message: Option<String>,

    pub history: HistoryState,
}

impl Model {
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn owner(&self) -> Option<String> {
        self.account.email().map(ToString::to_string)
    }

    pub fn is_current(&self, ticket: Uuid) -> bool {
        self.generation.ticket() == Some(ticket)
    }

    pub fn set_error(&mut self, error: impl Into<AppError>) {
        self.error = Some(error.into());
    }

    /// Drops the in-flight request and everything it produced.
    pub fn clear_generation(&mut self) {
        self.request = None;
        self.generation = GenerationPhase::Idle;
        self.results.clear();
        self.fallback_notice = None;
    }

    /// Leaving `Generating` for any screen but `Results` abandons the call in
    /// flight, so its completion arrives stale.
    pub fn transition(&mut self, next: AppState) {
        if self.state == next {
            return;
        }
        tracing::info!(from = self.state.name(), to = next.name(), "state transition");
        if self.state == AppState::Generating && next != AppState::Results {
            if let Some(ticket) = self.generation.ticket() {
                tracing::debug!(%ticket, "abandoning generation");
            }
            self.generation = GenerationPhase::Idle;
        }
        self.state = next;
    }
}
