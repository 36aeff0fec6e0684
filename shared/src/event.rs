use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::{GenerationResult, Verification};
use crate::error::{PaymentError, StorageError};
use crate::identity::VerifiedIdentity;
use crate::media_store::{MediaId, MediaItem, MediaPage};
use crate::request::{AspectRatio, Direction, SourceFile, VideoKind};

type StorageRead = Result<Vec<Option<String>>, StorageError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // --- Boot ---
    Started {
        url: String,
        today: NaiveDate,
        maintenance: bool,
    },
    #[serde(skip)]
    BootRecordsLoaded(StorageRead),
    #[serde(skip)]
    ActiveRecordLoaded { email: String, result: StorageRead },

    // --- Session ---
    SignInRequested,
    SignOutRequested,
    /// Credential returned by the federated sign-in widget.
    IdentityAsserted { credential: String },
    #[serde(skip)]
    AuthRecordsLoaded {
        identity: VerifiedIdentity,
        referral: Option<String>,
        result: StorageRead,
    },
    AdWatched { today: NaiveDate },
    DismissNotice,

    // --- Navigation ---
    StartCreating,
    OpenCustomPrompt { files: Vec<SourceFile> },
    OpenDesignStudio,
    OpenHistory,
    LoadMoreHistory,
    OpenHistoryItem { id: MediaId },
    CloseHistoryItem,
    NavigateHome,
    GenerateMore,
    BackToUpload,
    DismissModal,
    GoToPricing,

    // --- Generation ---
    GenerateStyled {
        files: Vec<SourceFile>,
        style_id: String,
        keep_likeness: bool,
        aspect_ratio: AspectRatio,
    },
    GenerateRandom {
        files: Vec<SourceFile>,
        keep_likeness: bool,
        aspect_ratio: AspectRatio,
    },
    /// Completes the request staged by `OpenCustomPrompt`.
    GenerateCustom {
        prompt: String,
        negative_prompt: Option<String>,
        keep_likeness: bool,
        aspect_ratio: AspectRatio,
    },
    GenerateGroup {
        files: Vec<SourceFile>,
        direction: Direction,
        keep_likeness: bool,
        aspect_ratio: AspectRatio,
    },
    GenerateDesign {
        text_content: BTreeMap<String, String>,
        style_description: String,
        logo: Option<SourceFile>,
    },
    GenerateVideo {
        kind: VideoKind,
        files: Vec<SourceFile>,
        prompt: String,
    },
    RetryGeneration,
    #[serde(skip)]
    GenerationFinished {
        ticket: Uuid,
        result: GenerationResult,
    },
    #[serde(skip)]
    MediaSaved {
        ticket: Uuid,
        result: Result<Vec<MediaId>, StorageError>,
    },

    // --- Payments ---
    CheckoutRequested { price_id: String },
    ManageSubscription,
    ContinueFromSuccess,
    RetryPricing,
    #[serde(skip)]
    RedirectReady(Result<String, PaymentError>),
    #[serde(skip)]
    CheckoutVerified(Result<Verification, PaymentError>),

    // --- History / persistence ---
    #[serde(skip)]
    HistoryPageLoaded {
        owner: String,
        page: u32,
        result: Result<MediaPage, StorageError>,
    },
    #[serde(skip)]
    HistoryItemLoaded {
        owner: String,
        result: Result<Option<MediaItem>, StorageError>,
    },
    #[serde(skip)]
    Persisted(Result<(), StorageError>),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::BootRecordsLoaded(_) => "boot_records_loaded",
            Self::ActiveRecordLoaded { .. } => "active_record_loaded",
            Self::SignInRequested => "sign_in_requested",
            Self::SignOutRequested => "sign_out_requested",
            Self::IdentityAsserted { .. } => "identity_asserted",
            Self::AuthRecordsLoaded { .. } => "auth_records_loaded",
            Self::AdWatched { .. } => "ad_watched",
            Self::DismissNotice => "dismiss_notice",
            Self::StartCreating => "start_creating",
            Self::OpenCustomPrompt { .. } => "open_custom_prompt",
            Self::OpenDesignStudio => "open_design_studio",
            Self::OpenHistory => "open_history",
            Self::LoadMoreHistory => "load_more_history",
            Self::OpenHistoryItem { .. } => "open_history_item",
            Self::CloseHistoryItem => "close_history_item",
            Self::NavigateHome => "navigate_home",
            Self::GenerateMore => "generate_more",
            Self::BackToUpload => "back_to_upload",
            Self::DismissModal => "dismiss_modal",
            Self::GoToPricing => "go_to_pricing",
            Self::GenerateStyled { .. } => "generate_styled",
            Self::GenerateRandom { .. } => "generate_random",
            Self::GenerateCustom { .. } => "generate_custom",
            Self::GenerateGroup { .. } => "generate_group",
            Self::GenerateDesign { .. } => "generate_design",
            Self::GenerateVideo { .. } => "generate_video",
            Self::RetryGeneration => "retry_generation",
            Self::GenerationFinished { .. } => "generation_finished",
            Self::MediaSaved { .. } => "media_saved",
            Self::CheckoutRequested { .. } => "checkout_requested",
            Self::ManageSubscription => "manage_subscription",
            Self::ContinueFromSuccess => "continue_from_success",
            Self::RetryPricing => "retry_pricing",
            Self::RedirectReady(_) => "redirect_ready",
            Self::CheckoutVerified(_) => "checkout_verified",
            Self::HistoryPageLoaded { .. } => "history_page_loaded",
            Self::HistoryItemLoaded { .. } => "history_item_loaded",
            Self::Persisted(_) => "persisted",
        }
    }

    /// Actions a guest may not take. They are parked until sign-in succeeds.
    #[must_use]
    pub const fn requires_account(&self) -> bool {
        matches!(
            self,
            Self::StartCreating
                | Self::OpenCustomPrompt { .. }
                | Self::OpenDesignStudio
                | Self::OpenHistory
                | Self::AdWatched { .. }
                | Self::GenerateStyled { .. }
                | Self::GenerateRandom { .. }
                | Self::GenerateCustom { .. }
                | Self::GenerateGroup { .. }
                | Self::GenerateDesign { .. }
                | Self::GenerateVideo { .. }
                | Self::CheckoutRequested { .. }
        )
    }
}
