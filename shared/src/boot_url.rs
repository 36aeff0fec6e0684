use serde::{Deserialize, Serialize};
use url::Url;

/// Outcome of returning from the payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutReturn {
    Success { session_id: String },
    /// `checkout=success` without a session to verify.
    SuccessWithoutSession,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BootParams {
    pub checkout: Option<CheckoutReturn>,
    pub referral: Option<String>,
    /// Address to show once the one-shot query parameters are consumed.
    pub clean_url: Option<String>,
}

/// Reads the launch address. Unparseable input yields no parameters.
pub fn parse_boot_url(raw: &str) -> BootParams {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(error = %e, "launch url did not parse");
            return BootParams::default();
        }
    };

    let mut checkout_flag = None;
    let mut session_id = None;
    let mut referral = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "checkout" => checkout_flag = Some(value.into_owned()),
            "session_id" if !value.is_empty() => session_id = Some(value.into_owned()),
            "ref" if !value.trim().is_empty() => referral = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let checkout = match (checkout_flag.as_deref(), session_id) {
        (Some("success"), Some(session_id)) => Some(CheckoutReturn::Success { session_id }),
        (Some("success"), None) => Some(CheckoutReturn::SuccessWithoutSession),
        (Some("cancel"), _) => Some(CheckoutReturn::Cancelled),
        _ => None,
    };

    let clean_url = (checkout.is_some() || referral.is_some()).then(|| {
        let mut clean = url.clone();
        clean.set_query(None);
        clean.set_fragment(None);
        clean.to_string()
    });

    BootParams {
        checkout,
        referral,
        clean_url,
    }
}
