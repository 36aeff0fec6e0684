use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{account_key, AppConfig, GUEST_EMAIL};
use crate::error::{IdentityError, PolicyError, StorageError};
use crate::identity::VerifiedIdentity;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == GUEST_EMAIL || !trimmed.contains('@') {
            return Err(IdentityError::InvalidEmail(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Creator,
    Professional,
    Agency,
}

impl Plan {
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Creator => "Creator",
            Self::Professional => "Professional",
            Self::Agency => "Agency",
        }
    }

    #[must_use]
    pub const fn is_subscription(self) -> bool {
        !matches!(self, Self::Free)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub email: Email,
    /// Not clamped: a stale debit may take this below zero.
    pub credits: i64,
    pub plan: Plan,
    pub has_made_purchase: bool,
    pub stripe_customer_id: Option<String>,
    pub ads_watched_today: u32,
    pub last_ad_watch_date: NaiveDate,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl UserAccount {
    pub fn new(identity: &VerifiedIdentity, credits: i64, today: NaiveDate) -> Self {
        Self {
            email: identity.email.clone(),
            credits,
            plan: Plan::Free,
            has_made_purchase: false,
            stripe_customer_id: None,
            ads_watched_today: 0,
            last_ad_watch_date: today,
            name: identity.name.clone(),
            picture: identity.picture.clone(),
        }
    }

    #[must_use]
    pub fn debited(&self, cost: i64) -> Self {
        Self {
            credits: self.credits - cost,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn credited(&self, amount: i64) -> Self {
        Self {
            credits: self.credits + amount,
            ..self.clone()
        }
    }

    /// Ads already rewarded today; a counter from an earlier day counts as zero.
    pub fn ads_watched_on(&self, today: NaiveDate) -> u32 {
        if self.last_ad_watch_date == today {
            self.ads_watched_today
        } else {
            0
        }
    }

    pub fn storage_key(&self) -> String {
        account_key(self.email.as_str())
    }

    pub fn to_record(&self) -> Result<String, StorageError> {
        serde_json::to_string(&StoredAccount::from(self))
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// The account the session is acting as.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActiveAccount {
    #[default]
    Guest,
    Member(UserAccount),
}

impl ActiveAccount {
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }

    pub fn member(&self) -> Option<&UserAccount> {
        match self {
            Self::Guest => None,
            Self::Member(account) => Some(account),
        }
    }

    pub fn credits(&self) -> i64 {
        self.member().map_or(0, |a| a.credits)
    }

    pub fn email(&self) -> Option<&Email> {
        self.member().map(|a| &a.email)
    }
}

/// On-disk shape of an account record. Every field is optional so records
/// written by older builds still load; `migrate` fills the gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    #[serde(default)]
    pub schema_version: Option<u32>,
    pub email: String,
    #[serde(default)]
    pub credits: Option<i64>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub has_made_purchase: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub ads_watched_today: Option<u32>,
    #[serde(default)]
    pub last_ad_watch_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl From<&UserAccount> for StoredAccount {
    fn from(account: &UserAccount) -> Self {
        Self {
            schema_version: Some(CURRENT_SCHEMA_VERSION),
            email: account.email.to_string(),
            credits: Some(account.credits),
            plan: Some(account.plan),
            has_made_purchase: Some(account.has_made_purchase),
            stripe_customer_id: account.stripe_customer_id.clone(),
            ads_watched_today: Some(account.ads_watched_today),
            last_ad_watch_date: Some(account.last_ad_watch_date.format("%Y-%m-%d").to_string()),
            name: account.name.clone(),
            picture: account.picture.clone(),
        }
    }
}

impl StoredAccount {
    pub fn migrate(self, today: NaiveDate, config: &AppConfig) -> Result<UserAccount, StorageError> {
        let key = account_key(&self.email);
        if let Some(found) = self.schema_version {
            if found > CURRENT_SCHEMA_VERSION {
                return Err(StorageError::Corrupt {
                    key,
                    reason: format!("schema version {found} is newer than {CURRENT_SCHEMA_VERSION}"),
                });
            }
        }
        let email = Email::parse(self.email).map_err(|e| StorageError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        let last_ad_watch_date = match self.last_ad_watch_date.as_deref() {
            None => today,
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                StorageError::Corrupt {
                    key: key.clone(),
                    reason: format!("lastAdWatchDate: {e}"),
                }
            })?,
        };
        Ok(UserAccount {
            email,
            credits: self.credits.unwrap_or(config.restored_credits_default),
            plan: self.plan.unwrap_or_default(),
            has_made_purchase: self.has_made_purchase.unwrap_or(false),
            stripe_customer_id: self.stripe_customer_id,
            ads_watched_today: self.ads_watched_today.unwrap_or(0),
            last_ad_watch_date,
            name: self.name,
            picture: self.picture,
        })
    }
}

pub fn parse_record(
    key: &str,
    raw: &str,
    today: NaiveDate,
    config: &AppConfig,
) -> Result<UserAccount, StorageError> {
    let stored: StoredAccount = serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    stored.migrate(today, config)
}

/// Emails that created an account in this browser.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRegistry(Vec<String>);

impl DeviceRegistry {
    pub fn from_record(raw: Option<&str>) -> Self {
        match raw.map(serde_json::from_str::<Vec<String>>) {
            None => Self::default(),
            Some(Ok(emails)) => Self(emails),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "discarding unreadable device account list");
                Self::default()
            }
        }
    }

    pub fn contains(&self, email: &Email) -> bool {
        self.0.iter().any(|e| e == email.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// Registers a new account, refusing once `max` distinct emails exist.
    pub fn admit(&self, email: &Email, max: usize) -> Result<Self, PolicyError> {
        if self.contains(email) {
            return Ok(self.clone());
        }
        if self.0.len() >= max {
            return Err(PolicyError::DeviceAccountLimit { max });
        }
        let mut emails = self.0.clone();
        emails.push(email.to_string());
        Ok(Self(emails))
    }

    pub fn to_record(&self) -> Result<String, StorageError> {
        serde_json::to_string(&self.0).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAccount {
    pub account: ActiveAccount,
    /// Keys holding corrupt data that should be removed.
    pub discard: Vec<String>,
}

/// Resolves the account to resume from the last-used identity pointer and its record.
pub fn load_active_account(
    last_user: Option<&str>,
    record: Option<&str>,
    today: NaiveDate,
    config: &AppConfig,
) -> LoadedAccount {
    let guest = |discard| LoadedAccount {
        account: ActiveAccount::Guest,
        discard,
    };
    let Some(email) = last_user else {
        return guest(Vec::new());
    };
    let key = account_key(email);
    let Some(raw) = record else {
        return guest(Vec::new());
    };
    match parse_record(&key, raw, today, config) {
        Ok(account) => LoadedAccount {
            account: ActiveAccount::Member(account),
            discard: Vec::new(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "discarding corrupt account record");
            guest(vec![key, crate::config::LAST_USER_KEY.to_string()])
        }
    }
}

/// What the storage held for an authentication attempt.
#[derive(Debug, Clone, Default)]
pub struct AuthRecords<'a> {
    pub existing: Option<&'a str>,
    pub referral: Option<&'a str>,
    pub referrer: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub account: UserAccount,
    pub created: bool,
    /// Set when the device list changed and must be written back.
    pub device: Option<DeviceRegistry>,
    /// Referrer after the bonus was applied; the referral token is spent.
    pub referrer: Option<UserAccount>,
}

impl Authenticated {
    pub fn referral_applied(&self) -> bool {
        self.referrer.is_some()
    }
}

/// Signs a verified identity in, creating the account when it is new to this device.
pub fn authenticate(
    identity: &VerifiedIdentity,
    records: &AuthRecords<'_>,
    device: &DeviceRegistry,
    today: NaiveDate,
    config: &AppConfig,
) -> Result<Authenticated, PolicyError> {
    let key = account_key(identity.email.as_str());
    if let Some(raw) = records.existing {
        match parse_record(&key, raw, today, config) {
            Ok(account) => {
                return Ok(Authenticated {
                    account,
                    created: false,
                    device: None,
                    referrer: None,
                })
            }
            Err(e) => tracing::warn!(error = %e, "replacing corrupt account record"),
        }
    }

    let admitted = device.admit(&identity.email, config.max_device_accounts)?;
    let mut account = UserAccount::new(identity, config.starting_credits, today);

    let referrer = match (records.referral, records.referrer) {
        (Some(token), Some(raw)) if token != identity.email.as_str() => {
            match parse_record(&account_key(token), raw, today, config) {
                Ok(referrer) => {
                    account = account.credited(config.referral_bonus);
                    Some(referrer.credited(config.referral_bonus))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring referral from unreadable record");
                    None
                }
            }
        }
        _ => None,
    };

    tracing::info!(
        referred = referrer.is_some(),
        device_accounts = admitted.len(),
        "created account"
    );

    let device = (admitted != *device).then_some(admitted);
    Ok(Authenticated {
        account,
        created: true,
        device,
        referrer,
    })
}

/// Grants the ad reward, resetting the counter on a new day.
pub fn record_ad_watch(
    account: &UserAccount,
    today: NaiveDate,
    config: &AppConfig,
) -> Result<UserAccount, PolicyError> {
    let watched = account.ads_watched_on(today);
    if watched >= config.max_daily_ads {
        return Err(PolicyError::DailyAdLimit {
            max: config.max_daily_ads,
        });
    }
    Ok(UserAccount {
        credits: account.credits + config.ad_reward,
        ads_watched_today: watched + 1,
        last_ad_watch_date: today,
        ..account.clone()
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub account: UserAccount,
    pub message: String,
}

/// Applies a verified purchase. Unknown products only mark the account as a purchaser.
pub fn apply_purchase(
    account: &UserAccount,
    product_id: &str,
    stripe_customer_id: Option<&str>,
    config: &AppConfig,
) -> Purchase {
    let mut updated = UserAccount {
        has_made_purchase: true,
        ..account.clone()
    };
    if let Some(customer) = stripe_customer_id {
        updated.stripe_customer_id = Some(customer.to_string());
    }
    let message = match config.product(product_id) {
        Some(grant) => {
            updated.credits += grant.credits;
            if let Some(plan) = grant.plan {
                updated.plan = plan;
            }
            grant.message.clone()
        }
        None => {
            tracing::warn!(product_id, "verified purchase of unknown product");
            String::new()
        }
    };
    Purchase {
        account: updated,
        message,
    }
}
