use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InsufficientCredits,
    DeviceAccountLimit,
    DailyAdLimit,
    Authentication,
    Validation,
    ServiceBusy,
    ContentRefused,
    Misconfigured,
    Generation,
    Payment,
    Storage,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InsufficientCredits => "INSUFFICIENT_CREDITS",
            Self::DeviceAccountLimit => "DEVICE_ACCOUNT_LIMIT",
            Self::DailyAdLimit => "DAILY_AD_LIMIT",
            Self::Authentication => "AUTH_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::ServiceBusy => "SERVICE_BUSY",
            Self::ContentRefused => "CONTENT_REFUSED",
            Self::Misconfigured => "MISCONFIGURED",
            Self::Generation => "GENERATION_ERROR",
            Self::Payment => "PAYMENT_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn is_policy(self) -> bool {
        matches!(
            self,
            Self::InsufficientCredits | Self::DeviceAccountLimit | Self::DailyAdLimit
        )
    }
}

/// What the view renders for a failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::ServiceBusy => "Our systems are experiencing high demand right now. \
                Your credits have not been used. Please try again in a few minutes."
                .into(),
            ErrorKind::ContentRefused => "The AI was unable to process this request, which can \
                sometimes happen due to content safety filters. Please try a different photo, \
                style, or a more descriptive custom prompt."
                .into(),
            ErrorKind::Misconfigured => "There appears to be a configuration issue with the \
                application. Please contact support and mention 'Invalid API Key'."
                .into(),
            ErrorKind::Storage => {
                "Unable to save data locally. Please free up some storage space.".into()
            }
            ErrorKind::Internal => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
            _ => self.message.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

/// Business rule violations. Always raised before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PolicyError {
    #[error("insufficient credits: {required} required, {current} available")]
    InsufficientCredits { required: i64, current: i64 },

    #[error("this device has reached the maximum of {max} new accounts")]
    DeviceAccountLimit { max: usize },

    #[error("daily limit of {max} ad credits reached")]
    DailyAdLimit { max: u32 },
}

impl From<PolicyError> for AppError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::InsufficientCredits { .. } => {
                AppError::new(ErrorKind::InsufficientCredits, e.to_string())
            }
            PolicyError::DeviceAccountLimit { max } => AppError::new(
                ErrorKind::DeviceAccountLimit,
                format!(
                    "This device has reached the maximum of {max} new accounts. To prevent abuse \
                     of the free credit system, you cannot create another account on this device. \
                     Please sign in using one of the existing accounts."
                ),
            ),
            PolicyError::DailyAdLimit { max } => AppError::new(
                ErrorKind::DailyAdLimit,
                format!(
                    "You have reached your daily limit of {max} ad credits. Please try again tomorrow."
                ),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GenerationError {
    #[error("generation quota exhausted: {message}")]
    Quota { message: String },

    #[error("the model refused the request")]
    Refused,

    #[error("generator misconfigured: {message}")]
    Misconfigured { message: String },

    #[error("malformed generator response: {reason}")]
    Malformed { reason: String },

    #[error("{message}")]
    Failed { message: String },
}

impl GenerationError {
    /// Maps a raw vendor failure onto the taxonomy.
    #[must_use]
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        let lower = message.to_lowercase();
        if status == Some(429)
            || lower.contains("quota")
            || lower.contains("resource_exhausted")
            || lower.contains("resource exhausted")
        {
            return Self::Quota {
                message: message.to_string(),
            };
        }
        if message.contains("API key not valid") {
            return Self::Misconfigured {
                message: message.to_string(),
            };
        }
        if message.contains("refused the request") {
            return Self::Refused;
        }
        Self::Failed {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        let kind = match &e {
            GenerationError::Quota { .. } => ErrorKind::ServiceBusy,
            GenerationError::Refused => ErrorKind::ContentRefused,
            GenerationError::Misconfigured { .. } => ErrorKind::Misconfigured,
            GenerationError::Malformed { .. } | GenerationError::Failed { .. } => {
                ErrorKind::Generation
            }
        };
        let message = match &e {
            GenerationError::Failed { message } if message.trim().is_empty() => {
                "An unknown error occurred during generation.".to_string()
            }
            _ => e.to_string(),
        };
        AppError::new(kind, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PaymentError {
    #[error("could not create checkout session: {0}")]
    Checkout(String),

    #[error("could not create portal session: {0}")]
    Portal(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("unexpected payment service response")]
    UnexpectedResponse,
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        let message = match &e {
            PaymentError::Checkout(reason) => format!("Could not initiate checkout: {reason}"),
            PaymentError::Portal(reason) => {
                format!("Could not connect to the customer portal: {reason}")
            }
            PaymentError::Verification(_) | PaymentError::UnexpectedResponse => {
                "We could not verify your payment. Please contact support.".to_string()
            }
        };
        AppError::new(ErrorKind::Payment, message)
    }
}

/// Persistence failures. Logged by the core, never shown for account writes.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record `{key}`: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("invalid page request: page {page}, size {page_size}")]
    InvalidPage { page: u32, page_size: u32 },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("unexpected storage response")]
    UnexpectedResponse,
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::new(ErrorKind::Storage, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IdentityError {
    #[error("invalid identity token: {0}")]
    Malformed(String),

    #[error("email address is not verified")]
    Unverified,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        let message = match &e {
            IdentityError::Unverified => {
                "Your Google account email is not verified. Please use a verified account."
            }
            IdentityError::Malformed(_) | IdentityError::InvalidEmail(_) => {
                "Could not sign in with Google. Please try again."
            }
        };
        AppError::new(ErrorKind::Authentication, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RequestError {
    #[error("no image file provided")]
    MissingFiles,

    #[error("group photo generation requires at least {min} images")]
    NotEnoughFiles { min: usize },

    #[error("group photo generation accepts at most {max} images")]
    TooManyFiles { max: usize },

    #[error("a style or custom prompt is required for generation")]
    MissingDirection,

    #[error("unknown style `{0}`")]
    UnknownStyle(String),

    #[error("{0} is required")]
    MissingField(String),
}

impl From<RequestError> for AppError {
    fn from(e: RequestError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("could not parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
