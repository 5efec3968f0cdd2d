/// Popup UI for the LinkDrop extension

use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use patternfly_yew::prelude::*;
use web_sys::{HtmlInputElement, HtmlSelectElement};

use crate::category::{Category, CategorySelection};
use crate::config::AppConfig;
use crate::crawl::CrawlClient;
use crate::i18n;
use crate::identity::{self, ClerkSession, Identity};
use crate::page;
use crate::store::StoreClient;
use crate::workflow::{SaveError, SaveOutcome, SaveRequest, Saver, TokenSource};

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    /// chrome.tabs.create({ url })
    #[wasm_bindgen(catch)]
    async fn openExternalPage(url: &str) -> Result<(), JsValue>;
}

/// Sentinel value of the "+ new category" select entry.
const NEW_CATEGORY_VALUE: &str = "__new__";
const TITLE_LOADING_PLACEHOLDER: &str = "Loading page title...";
const TITLE_READY_PLACEHOLDER: &str = "Link title";

fn selection_from(selected_id: &str, new_name: &str) -> CategorySelection {
    if selected_id == NEW_CATEGORY_VALUE {
        CategorySelection::New(new_name.to_string())
    } else if selected_id.is_empty() {
        CategorySelection::None
    } else {
        CategorySelection::Existing(selected_id.to_string())
    }
}

async fn load_categories(store: &StoreClient) -> Result<Vec<Category>, String> {
    let Some(token) = ClerkSession.bearer_token().await else {
        return Err(SaveError::TokenUnavailable.to_string());
    };
    store
        .list_categories(&token)
        .await
        .map_err(|e| e.to_string())
}

#[derive(Properties, PartialEq)]
pub struct AppProps {
    pub config: AppConfig,
}

#[function_component(App)]
pub fn app(props: &AppProps) -> Html {
    let identity = use_state(|| None::<Identity>);
    // Captured once at load; the save rejects an empty URL later.
    let page_url = use_mut_ref(String::new);
    let title = use_state(String::new);
    let is_loading = use_state(|| true);
    let is_saving = use_state(|| false);
    let error_message = use_state(String::new);
    let categories = use_state(Vec::<Category>::new);
    let is_categories_loading = use_state(|| false);
    let selected_category = use_state(String::new);
    let new_category_name = use_state(String::new);

    // Cleared on teardown so late responses are discarded, not applied.
    let alive = use_mut_ref(|| true);

    let store = use_memo(props.config.clone(), StoreClient::new);
    let saver = use_memo(props.config.clone(), |config| {
        Saver::new(ClerkSession, StoreClient::new(config), CrawlClient::new(config))
    });

    // One-shot on mount: read the active page, resolve the identity.
    {
        let identity = identity.clone();
        let page_url = page_url.clone();
        let title = title.clone();
        let is_loading = is_loading.clone();
        let alive = alive.clone();
        use_effect_with((), move |_| {
            {
                let page_url = page_url.clone();
                let alive = alive.clone();
                spawn_local(async move {
                    let active_page = page::read_active_page().await;
                    *page_url.borrow_mut() = active_page.url;
                    if *alive.borrow() {
                        title.set(active_page.title);
                        is_loading.set(false);
                    }
                });
            }
            {
                let alive = alive.clone();
                spawn_local(async move {
                    let resolved = match identity::fetch_identity().await {
                        Ok(resolved) => resolved,
                        Err(e) => {
                            log::error!("Identity lookup failed: {}", e);
                            Identity::Unauthenticated
                        }
                    };
                    if *alive.borrow() {
                        identity.set(Some(resolved));
                    }
                });
            }
            move || {
                *alive.borrow_mut() = false;
            }
        });
    }

    // Category list: loaded once per popup session, after sign-in resolves.
    {
        let categories = categories.clone();
        let is_categories_loading = is_categories_loading.clone();
        let error_message = error_message.clone();
        let store = store.clone();
        let alive = alive.clone();
        use_effect_with((*identity).clone(), move |identity| {
            if matches!(identity, Some(Identity::Authenticated { .. })) {
                is_categories_loading.set(true);
                spawn_local(async move {
                    let result = load_categories(&store).await;
                    if !*alive.borrow() {
                        return;
                    }
                    match result {
                        Ok(list) => categories.set(list),
                        Err(message) => {
                            log::error!("Load categories failed: {}", message);
                            error_message.set(message);
                        }
                    }
                    is_categories_loading.set(false);
                });
            }
            || ()
        });
    }

    let on_title_input = {
        let title = title.clone();
        let error_message = error_message.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                if !error_message.is_empty() {
                    error_message.set(String::new());
                }
                title.set(input.value());
            }
        })
    };

    let on_category_change = {
        let selected_category = selected_category.clone();
        let error_message = error_message.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                if !error_message.is_empty() {
                    error_message.set(String::new());
                }
                selected_category.set(select.value());
            }
        })
    };

    let on_new_category_input = {
        let new_category_name = new_category_name.clone();
        let error_message = error_message.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                if !error_message.is_empty() {
                    error_message.set(String::new());
                }
                new_category_name.set(input.value());
            }
        })
    };

    let on_save = {
        let identity = identity.clone();
        let page_url = page_url.clone();
        let title = title.clone();
        let selected_category = selected_category.clone();
        let new_category_name = new_category_name.clone();
        let categories = categories.clone();
        let is_saving = is_saving.clone();
        let error_message = error_message.clone();
        let saver = saver.clone();
        let alive = alive.clone();

        Callback::from(move |_| {
            if *is_saving {
                return;
            }

            let request = SaveRequest {
                identity: (*identity).clone().unwrap_or(Identity::Unauthenticated),
                page_url: page_url.borrow().clone(),
                manual_title: (*title).clone(),
                selection: selection_from(&selected_category, &new_category_name),
                categories: (*categories).clone(),
            };

            is_saving.set(true);
            error_message.set(String::new());

            let categories = categories.clone();
            let selected_category = selected_category.clone();
            let is_saving = is_saving.clone();
            let error_message = error_message.clone();
            let saver = saver.clone();
            let alive = alive.clone();
            spawn_local(async move {
                let result = saver.save(&request).await;
                if !*alive.borrow() {
                    return;
                }
                // A category inserted during the save is appended and
                // selected even when a later step failed; dropping it would
                // let a retry insert the same name again.
                let append_created = |created: Option<Category>| {
                    if let Some(category) = created {
                        let mut list = (*categories).clone();
                        selected_category.set(category.id.clone());
                        list.push(category);
                        categories.set(list);
                    }
                };
                match result {
                    Ok(SaveOutcome::Saved {
                        created_category, ..
                    }) => append_created(created_category),
                    Ok(SaveOutcome::Busy) => {}
                    Err(failure) => {
                        append_created(failure.created_category);
                        error_message.set(failure.error.to_string());
                    }
                }
                is_saving.set(false);
            });
        })
    };

    let on_sign_in = {
        let url = props.config.sign_in_url.clone();
        Callback::from(move |_| {
            let url = url.clone();
            spawn_local(async move {
                if let Err(e) = openExternalPage(&url).await {
                    log::error!("Open sign-in page failed: {:?}", e);
                }
            });
        })
    };

    let on_sign_up = {
        let url = props.config.sign_up_url.clone();
        Callback::from(move |_| {
            let url = url.clone();
            spawn_local(async move {
                if let Err(e) = openExternalPage(&url).await {
                    log::error!("Open sign-up page failed: {:?}", e);
                }
            });
        })
    };

    let on_sign_out = {
        let identity = identity.clone();
        let categories = categories.clone();
        let alive = alive.clone();
        Callback::from(move |_| {
            let identity = identity.clone();
            let categories = categories.clone();
            let alive = alive.clone();
            spawn_local(async move {
                if let Err(e) = identity::sign_out().await {
                    log::error!("{}", e);
                }
                if *alive.borrow() {
                    identity.set(Some(Identity::Unauthenticated));
                    categories.set(Vec::new());
                }
            });
        })
    };

    let is_busy = *is_loading || *is_saving;
    let is_category_busy = *is_categories_loading || *is_saving;
    let is_new_category_selected = *selected_category == NEW_CATEGORY_VALUE;
    let signed_in = matches!(*identity, Some(Identity::Authenticated { .. }));

    html! {
        <div class="popup-shell">
            <header class="popup-header">
                <h1 class="popup-title">{ i18n::extension_name() }</h1>
                if signed_in {
                    <Button onclick={on_sign_out} variant={ButtonVariant::Link}>
                        { i18n::sign_out() }
                    </Button>
                }
            </header>

            {match &*identity {
                None => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                Some(Identity::Unauthenticated) => html! {
                    <div class="signed-out-hero">
                        <h2 class="hero-name">{ i18n::extension_name() }</h2>
                        <p class="hero-description">{ i18n::extension_description() }</p>
                        <Button onclick={on_sign_in} variant={ButtonVariant::Primary} block={true}>
                            { i18n::sign_in() }
                        </Button>
                        <Button onclick={on_sign_up} variant={ButtonVariant::Secondary} block={true}>
                            { i18n::sign_up() }
                        </Button>
                    </div>
                },
                Some(Identity::Authenticated { .. }) => html! {
                    <div class="save-form">
                        <div class="form-field">
                            <label class="form-label">{"Link title"}</label>
                            <input
                                class="form-input"
                                placeholder={if *is_loading { TITLE_LOADING_PLACEHOLDER } else { TITLE_READY_PLACEHOLDER }}
                                value={(*title).clone()}
                                oninput={on_title_input}
                                disabled={is_busy}
                            />
                        </div>

                        <div class="form-field">
                            <div class="form-label-row">
                                <label class="form-label">{"Category"}</label>
                                if *is_categories_loading {
                                    <span class="form-hint">{"Loading..."}</span>
                                }
                            </div>
                            <select
                                class="form-select"
                                onchange={on_category_change}
                                disabled={is_category_busy}
                            >
                                <option value="" selected={selected_category.is_empty()}>
                                    {"No category"}
                                </option>
                                {for categories.iter().map(|category| html! {
                                    <option
                                        value={category.id.clone()}
                                        selected={*selected_category == category.id}
                                    >
                                        {&category.name}
                                    </option>
                                })}
                                <option
                                    value={NEW_CATEGORY_VALUE}
                                    selected={is_new_category_selected}
                                >
                                    {"+ New category"}
                                </option>
                            </select>
                        </div>

                        if is_new_category_selected {
                            <div class="form-field">
                                <label class="form-label">{"New category name"}</label>
                                <input
                                    class="form-input"
                                    placeholder="New category name"
                                    value={(*new_category_name).clone()}
                                    maxlength="50"
                                    oninput={on_new_category_input}
                                    disabled={is_busy}
                                />
                            </div>
                        }

                        if !error_message.is_empty() {
                            <Alert r#type={AlertType::Danger} title={(*error_message).clone()} inline={true}>
                            </Alert>
                        }

                        <Button onclick={on_save} disabled={is_busy} variant={ButtonVariant::Primary} block={true}>
                            {if *is_saving { "Saving...".to_string() } else { i18n::save() }}
                        </Button>
                    </div>
                },
            }}
        </div>
    }
}
