use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::account::Email;
use crate::error::IdentityError;

/// Claims we read from the identity provider's credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct Claims {
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub email: Email,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Reads the identity out of a signed credential.
///
/// The signature is checked by the shell's identity SDK before the credential
/// reaches the core; only the payload segment is decoded here.
pub fn decode_credential(credential: &str) -> Result<VerifiedIdentity, IdentityError> {
    let mut segments = credential.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if segments.next().is_none() => payload,
        _ => {
            return Err(IdentityError::Malformed(
                "expected three dot-separated segments".into(),
            ))
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| IdentityError::Malformed(e.to_string()))?;
    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|e| IdentityError::Malformed(e.to_string()))?;

    if !claims.email_verified {
        return Err(IdentityError::Unverified);
    }

    Ok(VerifiedIdentity {
        email: Email::parse(claims.email)?,
        name: claims.name.filter(|n| !n.trim().is_empty()),
        picture: claims.picture.filter(|p| !p.trim().is_empty()),
    })
}

#[cfg(test)]
pub(crate) fn test_credential(email: &str, verified: bool) -> String {
    let payload = serde_json::json!({
        "email": email,
        "email_verified": verified,
        "name": "Ada Lovelace",
        "picture": "https://example.com/ada.png",
    });
    format!(
        "eyJhbGciOiJSUzI1NiJ9.{}.c2ln",
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}
