/// LinkDrop - Chrome extension popup for saving the current tab's link
/// Built with Rust + WASM + Yew

mod category;
pub mod config;
mod crawl;
mod i18n;
mod identity;
mod link;
mod page;
mod store;
mod workflow;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup. The host page passes the configuration
// object once; nothing below reads ambient globals.
#[wasm_bindgen]
pub fn start_popup(config: JsValue) -> Result<(), JsValue> {
    let config: config::AppConfig = serde_wasm_bindgen::from_value(config)
        .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))?;
    let config = config
        .validated()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    yew::Renderer::<ui::popup::App>::with_props(ui::popup::AppProps { config }).render();
    Ok(())
}
