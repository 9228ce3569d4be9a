//! Session hand-off from the sign-in redirect and its local storage copy.

use poi_core::Session;
use wasm_bindgen::JsValue;

const SESSION_KEY: &str = "poi-tracker.session";

/// What the auth service left in the URL fragment after a redirect.
#[derive(Debug, Clone, PartialEq)]
pub enum Redirect {
    Nothing,
    Session(Session),
    Error(String),
}

/// Read `#access_token=..&refresh_token=..` (or `#error=..`) from a URL
/// fragment. `decode` undoes the URL escaping of each value.
pub fn parse_fragment(fragment: &str, decode: impl Fn(&str) -> String) -> Redirect {
    let fragment = fragment.trim_start_matches('#');
    let field = |name: &str| {
        fragment.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| decode(&value.replace('+', " ")))
        })
    };

    if let Some(error) = field("error") {
        return Redirect::Error(field("error_description").unwrap_or(error));
    }
    let Some(access_token) = field("access_token").filter(|token| !token.is_empty()) else {
        return Redirect::Nothing;
    };

    Redirect::Session(Session {
        access_token,
        refresh_token: field("refresh_token"),
        token_type: field("token_type"),
        expires_in: field("expires_in").and_then(|value| value.parse().ok()),
        expires_at: field("expires_at").and_then(|value| value.parse().ok()),
        user: None,
    })
}

pub fn decode_component(value: &str) -> String {
    js_sys::decode_uri_component(value)
        .map_or_else(|_| value.to_string(), String::from)
}

/// Consume the redirect fragment, replacing the history entry so a reload
/// does not replay it.
pub fn take_redirect() -> Redirect {
    let Some(window) = web_sys::window() else {
        return Redirect::Nothing;
    };
    let location = window.location();
    let hash = location.hash().unwrap_or_default();
    let redirect = parse_fragment(&hash, decode_component);

    if redirect != Redirect::Nothing {
        let path = format!(
            "{}{}",
            location.pathname().unwrap_or_default(),
            location.search().unwrap_or_default()
        );
        if let Ok(history) = window.history() {
            if let Err(e) = history.replace_state_with_url(&JsValue::NULL, "", Some(path.as_str())) {
                web_sys::console::warn_1(&e);
            }
        }
    }
    redirect
}

/// Where the auth service should send the browser back to.
pub fn return_address() -> Option<String> {
    let location = web_sys::window()?.location();
    Some(format!("{}{}", location.origin().ok()?, location.pathname().ok()?))
}

pub fn redirect_to(url: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    window.location().set_href(url)
}

fn storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

pub fn load_session() -> Option<Session> {
    let text = storage()?.get_item(SESSION_KEY).ok().flatten()?;
    match serde_json::from_str(&text) {
        Ok(session) => Some(session),
        Err(e) => {
            web_sys::console::warn_1(&format!("Discarding stored session: {e}").into());
            forget_session();
            None
        }
    }
}

pub fn store_session(session: &Session) {
    let Some(storage) = storage() else {
        return;
    };
    match serde_json::to_string(session) {
        Ok(text) => {
            if let Err(e) = storage.set_item(SESSION_KEY, &text) {
                web_sys::console::error_1(&e);
            }
        }
        Err(e) => web_sys::console::error_1(&format!("Failed to store session: {e}").into()),
    }
}

pub fn forget_session() {
    if let Some(storage) = storage() {
        if let Err(e) = storage.remove_item(SESSION_KEY) {
            web_sys::console::error_1(&e);
        }
    }
}
