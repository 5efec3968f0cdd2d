/// Signed-in identity and session tokens, bridged from the identity provider
use serde::Deserialize;
use wasm_bindgen::prelude::*;

use crate::workflow::TokenSource;

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getIdentity() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getSessionToken(options: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_name = signOut)]
    async fn signOutBridge() -> Result<(), JsValue>;
}

/// Who is using the popup. Resolved once per popup session; every save
/// checks this at the top instead of probing optional fields along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Unauthenticated,
    Authenticated { user_id: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityPayload {
    signed_in: bool,
    #[serde(default)]
    user_id: Option<String>,
}

/// Ask the identity provider who is signed in.
pub async fn fetch_identity() -> Result<Identity, String> {
    let payload_js = getIdentity()
        .await
        .map_err(|e| format!("Failed to get identity: {:?}", e))?;
    let payload: IdentityPayload = serde_wasm_bindgen::from_value(payload_js)
        .map_err(|e| format!("Failed to parse identity: {:?}", e))?;

    match payload {
        IdentityPayload {
            signed_in: true,
            user_id: Some(user_id),
        } if !user_id.is_empty() => Ok(Identity::Authenticated { user_id }),
        _ => Ok(Identity::Unauthenticated),
    }
}

/// End the provider session.
pub async fn sign_out() -> Result<(), String> {
    signOutBridge()
        .await
        .map_err(|e| format!("Sign out failed: {:?}", e))
}

/// Bearer tokens from the hosted identity provider's session.
pub struct ClerkSession;

impl TokenSource for ClerkSession {
    async fn bearer_token(&self) -> Option<String> {
        // The provider accepts an options object; an empty one is fine.
        let options: JsValue = js_sys::Object::new().into();
        match getSessionToken(options).await {
            Ok(token_js) => token_js.as_string().filter(|t| !t.is_empty()),
            Err(e) => {
                log::warn!("Token fetch failed: {:?}", e);
                None
            }
        }
    }
}
