/// Localized user-facing strings, looked up by key via chrome.i18n
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    fn getLocalizedMessage(key: &str) -> String;
}

/// Look a message up, falling back to English when the locale has no entry.
fn message(key: &str, fallback: &str) -> String {
    let value = getLocalizedMessage(key);
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

pub fn save() -> String {
    message("save", "Save")
}

pub fn sign_in() -> String {
    message("signIn", "Sign in")
}

pub fn sign_up() -> String {
    message("signUp", "Sign up")
}

pub fn sign_out() -> String {
    message("signOut", "Sign out")
}

pub fn extension_name() -> String {
    message("extensionName", "LinkDrop")
}

pub fn extension_description() -> String {
    message("extensionDescription", "Save the current page into your link list")
}
