mod auth;
mod fetch;
mod state;
mod view;

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use poi_core::session::ObserverError;
use poi_core::{AppConfig, AuthEvent, AuthNotification, Session};
use ratzilla::ratatui::Terminal;
use ratzilla::{DomBackend, WebRenderer};
use wasm_bindgen_futures::spawn_local;

use crate::auth::Redirect;
use crate::state::{Command, WebApp, SIGN_IN_FAILED, SIGN_OUT_FAILED};

type Shared = Rc<RefCell<WebApp>>;

/// Settings are baked in at build time; there is no process environment in
/// the browser.
fn build_env(key: &str) -> Option<String> {
    let value = match key {
        "POI_SUPABASE_URL" => option_env!("POI_SUPABASE_URL"),
        "VITE_SUPABASE_URL" => option_env!("VITE_SUPABASE_URL"),
        "POI_SUPABASE_ANON_KEY" => option_env!("POI_SUPABASE_ANON_KEY"),
        "VITE_SUPABASE_ANON_KEY" => option_env!("VITE_SUPABASE_ANON_KEY"),
        "POI_TABLE" => option_env!("POI_TABLE"),
        "POI_MAP_CENTER" => option_env!("POI_MAP_CENTER"),
        "POI_MAP_ZOOM" => option_env!("POI_MAP_ZOOM"),
        "POI_TILE_URL" => option_env!("POI_TILE_URL"),
        "POI_TILE_ATTRIBUTION" => option_env!("POI_TILE_ATTRIBUTION"),
        "POI_LIST_WIDTH" => option_env!("POI_LIST_WIDTH"),
        "POI_NARROW_BREAKPOINT" => option_env!("POI_NARROW_BREAKPOINT"),
        _ => None,
    };
    value.map(str::to_string)
}

fn log_error(message: &str) {
    web_sys::console::error_1(&message.into());
}

fn load_config() -> AppConfig {
    let config = AppConfig::from_lookup(build_env);
    for error in &config.invalid {
        log_error(&format!("Invalid build configuration, using the default: {error}"));
    }
    for key in config.missing_settings() {
        log_error(&format!("Missing required configuration: {key}"));
    }
    config
}

fn main() -> io::Result<()> {
    let app: Shared = Rc::new(RefCell::new(WebApp::new(load_config())));

    spawn_local(start(Rc::clone(&app)));

    let backend = DomBackend::new()?;
    let mut terminal = Terminal::new(backend)?;

    terminal.on_key_event({
        let app = Rc::clone(&app);
        move |event| {
            let command = app.borrow_mut().handle_key(event.code);
            run_command(&app, command);
        }
    });

    terminal.draw_web(move |f| {
        view::render(&mut app.borrow_mut(), f);
    });

    Ok(())
}

/// Resolve the session, then load filter options and POIs.
async fn start(app: Shared) {
    let initial = resolve_session(&app).await;
    if let Some(session) = &initial {
        auth::store_session(session);
    }
    apply_auth(&app, AuthNotification::new(AuthEvent::InitialSession, initial));
    watch_auth(&app);

    load_facets(&app);
    load_pois(&app);
}

async fn resolve_session(app: &Shared) -> Option<Session> {
    let config = app.borrow().config.supabase.clone();
    match auth::take_redirect() {
        Redirect::Session(mut session) => {
            match fetch::fetch_user(&config, &session.access_token).await {
                Ok(user) => session.user = Some(user),
                Err(e) => log_error(&format!("Could not load the signed-in user: {e}")),
            }
            return Some(session);
        }
        Redirect::Error(detail) => {
            log_error(&format!("Sign-in failed: {detail}"));
            app.borrow_mut().alert = Some(format!("{SIGN_IN_FAILED}\n\n{detail}"));
        }
        Redirect::Nothing => {}
    }

    let stored = auth::load_session()?;
    let now = (js_sys::Date::now() / 1000.0) as i64;
    if !stored.is_expired_at(now) {
        return Some(stored);
    }
    let Some(refresh_token) = stored.refresh_token.as_deref() else {
        auth::forget_session();
        return None;
    };
    match fetch::refresh_session(&config, refresh_token).await {
        Ok(session) => Some(session),
        Err(e) => {
            log_error(&format!("Stored session could not be refreshed: {e}"));
            auth::forget_session();
            None
        }
    }
}

fn apply_auth(app: &Shared, notification: AuthNotification) {
    let errors = app.borrow_mut().apply_auth(notification);
    for error in errors {
        log_error(&format!("Auth observer failed: {error}"));
    }
}

/// Reload with the current selection whenever the signed-in user changes.
fn watch_auth(app: &Shared) {
    let weak = Rc::downgrade(app);
    app.borrow_mut()
        .session
        .on_auth_state_change(move |event, _session| {
            if event == AuthEvent::TokenRefreshed {
                return Ok(());
            }
            let app = weak
                .upgrade()
                .ok_or_else(|| ObserverError::failed("application state dropped"))?;
            // Runs after the notifying borrow is released.
            spawn_local(async move { load_pois(&app) });
            Ok(())
        });
}

fn run_command(app: &Shared, command: Command) {
    match command {
        Command::None => {}
        Command::LoadPois => load_pois(app),
        Command::SignIn => sign_in(app),
        Command::SignOut => sign_out(app),
    }
}

fn load_facets(app: &Shared) {
    let (config, token) = {
        let state = app.borrow();
        (state.config.supabase.clone(), state.access_token())
    };
    let app = Rc::clone(app);
    spawn_local(async move {
        let result = fetch::fetch_facet_rows(&config, token.as_deref())
            .await
            .map_err(|e| {
                log_error(&format!("Failed to load filter options: {e}"));
                e.to_string()
            });
        app.borrow_mut().apply_facet_rows(result);
    });
}

fn load_pois(app: &Shared) {
    let (plan, config) = {
        let mut state = app.borrow_mut();
        (state.begin_load(), state.config.supabase.clone())
    };
    let app = Rc::clone(app);
    spawn_local(async move {
        let result = fetch::fetch_pois(&config, &plan.query, plan.access_token.as_deref())
            .await
            .map_err(|e| {
                log_error(&format!("POI fetch failed ({}): {e}", plan.query));
                e.to_string()
            });
        app.borrow_mut().finish_load(plan.ticket, result);
    });
}

fn sign_in(app: &Shared) {
    let mut state = app.borrow_mut();
    if state.session.is_authenticated() {
        state.status = format!("Already signed in as {}", state.display_name());
        return;
    }
    let target = auth::return_address()
        .ok_or_else(|| "no page location".to_string())
        .and_then(|redirect| {
            fetch::authorize_url(&state.config.supabase, &redirect, fetch::encode_component)
                .map_err(|e| e.to_string())
        })
        .and_then(|url| auth::redirect_to(&url).map_err(|e| format!("{e:?}")));
    match target {
        Ok(()) => state.status = "Redirecting to Google sign-in...".to_string(),
        Err(detail) => {
            log_error(&format!("Sign-in could not start: {detail}"));
            state.alert = Some(format!("{SIGN_IN_FAILED}\n\n{detail}"));
        }
    }
}

fn sign_out(app: &Shared) {
    let (config, token) = {
        let mut state = app.borrow_mut();
        let Some(token) = state.access_token() else {
            state.status = "Not signed in".to_string();
            return;
        };
        (state.config.supabase.clone(), token)
    };
    let app = Rc::clone(app);
    spawn_local(async move {
        match fetch::sign_out(&config, &token).await {
            Ok(()) => {
                auth::forget_session();
                apply_auth(&app, AuthNotification::new(AuthEvent::SignedOut, None));
            }
            Err(e) => {
                log_error(&format!("Sign-out failed: {e}"));
                app.borrow_mut().alert = Some(format!("{SIGN_OUT_FAILED}\n\n{e}"));
            }
        }
    });
}
