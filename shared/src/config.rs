use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::account::Plan;
use crate::error::ConfigError;

pub const ACCOUNT_KEY_PREFIX: &str = "yourImageProUser_";
pub const LAST_USER_KEY: &str = "yourImageProLastUser";
pub const DEVICE_ACCOUNTS_KEY: &str = "yourImageProUsedAccounts";

pub const GUEST_EMAIL: &str = "guest";

/// Credit cost of each generation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTable {
    pub style_image: i64,
    pub custom_image: i64,
    pub group_style: i64,
    pub group_custom: i64,
    pub design: i64,
    pub video: i64,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            style_image: 2,
            custom_image: 5,
            group_style: 4,
            group_custom: 6,
            design: 8,
            video: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGrant {
    pub credits: i64,
    #[serde(default)]
    pub plan: Option<Plan>,
    pub message: String,
}

impl ProductGrant {
    fn pack(credits: i64) -> Self {
        Self {
            credits,
            plan: None,
            message: format!("Successfully purchased {credits} credits!"),
        }
    }

    fn subscription(credits: i64, plan: Plan) -> Self {
        Self {
            credits,
            plan: Some(plan),
            message: format!(
                "Welcome to the {} plan! {credits} credits have been added.",
                plan.display_name()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleCategory {
    ProfessionalHeadshots,
    BrandingMarketing,
    LifestyleEditorial,
    CreativePortraits,
    ModelPhotoshoots,
    CouplesFamilyPortraits,
    UrbanHip,
    HolidayEvents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleTier {
    Free,
    Pro,
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleOption {
    pub id: String,
    pub name: String,
    pub category: StyleCategory,
    pub required_plan: StyleTier,
}

impl StyleOption {
    fn free(id: &str, name: &str, category: StyleCategory) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            required_plan: StyleTier::Free,
        }
    }
}

fn default_styles() -> Vec<StyleOption> {
    use StyleCategory::*;
    vec![
        StyleOption::free("corporate_ceo", "Corporate CEO", ProfessionalHeadshots),
        StyleOption::free("tech_founder", "Tech Founder", ProfessionalHeadshots),
        StyleOption::free("author_portrait", "Author Portrait", ProfessionalHeadshots),
        StyleOption::free("creative_director", "Creative Director", ProfessionalHeadshots),
        StyleOption::free("social_media_influencer", "Social Media Influencer", BrandingMarketing),
        StyleOption::free("podcast_cover_art", "Podcast Cover Art", BrandingMarketing),
        StyleOption::free("conference_speaker", "Conference Speaker", BrandingMarketing),
        StyleOption::free("magazine_cover_shoot", "Magazine Cover", LifestyleEditorial),
        StyleOption::free("golden_hour_portrait", "Golden Hour Portrait", LifestyleEditorial),
        StyleOption::free("candid_cafe", "Candid Cafe", LifestyleEditorial),
        StyleOption::free("film_noir", "Film Noir", CreativePortraits),
        StyleOption::free("old_hollywood_glamour", "Old Hollywood", CreativePortraits),
        StyleOption::free("cinematic_portrait", "Cinematic Portrait", CreativePortraits),
        StyleOption::free("double_exposure", "Double Exposure", CreativePortraits),
        StyleOption::free("dramatic_studio_portrait", "Dramatic Studio Portrait", ModelPhotoshoots),
        StyleOption::free("high_fashion_street_style_full", "High-Fashion Street", ModelPhotoshoots),
    ]
}

fn default_products() -> BTreeMap<String, ProductGrant> {
    BTreeMap::from([
        ("prod_T9TD33RLHNcb15".to_string(), ProductGrant::pack(100)),
        ("prod_T9TFRxXWhEntzu".to_string(), ProductGrant::pack(500)),
        ("prod_T9TIhN8PTQHK4w".to_string(), ProductGrant::pack(1500)),
        (
            "prod_T9T0AxuPBbXbCC".to_string(),
            ProductGrant::subscription(200, Plan::Creator),
        ),
        (
            "prod_T9T6Hb6xasuL4i".to_string(),
            ProductGrant::subscription(1000, Plan::Professional),
        ),
        (
            "prod_T9T9VkAt19oEv5".to_string(),
            ProductGrant::subscription(3000, Plan::Agency),
        ),
    ])
}

/// Fixed application configuration. Every field has a production default so a
/// shell only has to override what it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub costs: CostTable,
    pub starting_credits: i64,
    /// Credits assumed for a persisted record that predates the `credits` field.
    pub restored_credits_default: i64,
    pub referral_bonus: i64,
    pub max_device_accounts: usize,
    pub max_daily_ads: u32,
    pub ad_reward: i64,
    pub history_page_size: u32,
    pub products: BTreeMap<String, ProductGrant>,
    pub styles: Vec<StyleOption>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            costs: CostTable::default(),
            starting_credits: 20,
            restored_credits_default: 10,
            referral_bonus: 2,
            max_device_accounts: 3,
            max_daily_ads: 6,
            ad_reward: 1,
            history_page_size: 15,
            products: default_products(),
            styles: default_styles(),
        }
    }
}

impl AppConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let costs = [
            ("style_image", self.costs.style_image),
            ("custom_image", self.costs.custom_image),
            ("group_style", self.costs.group_style),
            ("group_custom", self.costs.group_custom),
            ("design", self.costs.design),
            ("video", self.costs.video),
        ];
        if let Some((name, _)) = costs.iter().find(|(_, cost)| *cost < 0) {
            return Err(ConfigError::Invalid(format!("cost `{name}` is negative")));
        }
        if self.history_page_size == 0 {
            return Err(ConfigError::Invalid("history_page_size must be positive".into()));
        }
        if self.styles.is_empty() {
            return Err(ConfigError::Invalid("style catalogue is empty".into()));
        }
        Ok(())
    }

    pub fn product(&self, product_id: &str) -> Option<&ProductGrant> {
        self.products.get(product_id)
    }

    pub fn style(&self, style_id: &str) -> Option<&StyleOption> {
        self.styles.iter().find(|s| s.id == style_id)
    }
}

pub fn account_key(email: &str) -> String {
    format!("{ACCOUNT_KEY_PREFIX}{email}")
}
