use std::collections::HashSet;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use ts_rs::TS;

use crate::cache::cache_keys;
use crate::error::{AppError, AppResult};
use crate::model::{derive_display_name, Household, RemoteSession, UserProfile};
use crate::remote::{AuthApi, InsertApi, ProfileApi};
use crate::state::AppCtx;
use crate::time::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../web/src/bindings/")]
pub enum SessionPhase {
    Initializing,
    Unauthenticated,
    LoadingProfile,
    AwaitingWorkspaceSetup,
    AwaitingFirstRunTutorial,
    Ready,
    Error,
}

/// Everything the shell needs to render the session: the phase, the
/// orthogonal reconnecting flag (a background refresh is running while
/// stale content stays visible), and the current profile/workspace.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "../web/src/bindings/")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub reconnecting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<AppError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub profile: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub household: Option<Household>,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            phase: SessionPhase::Initializing,
            reconnecting: false,
            error: None,
            profile: None,
            household: None,
        }
    }
}

/// Which entry point funneled into the load routine; decides whether the
/// cache-first render may advance the phase and how failures propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPath {
    ColdStart,
    DeepLink,
    Resume,
    Silent,
}

struct ControllerState {
    snapshot: SessionSnapshot,
    session: Option<RemoteSession>,
    handled_links: HashSet<String>,
}

/// The session/resume state machine. Every wakeup source (cold start,
/// deep link, foreground resume, connectivity change) funnels through
/// one serialized gate, so no two triggers ever interleave on the state.
pub struct SessionController<R> {
    remote: R,
    ctx: AppCtx,
    state: Mutex<ControllerState>,
    gate: tokio::sync::Mutex<()>,
    observers: Mutex<Vec<mpsc::UnboundedSender<SessionSnapshot>>>,
}

fn tutorial_seen_key(user_id: &str) -> String {
    format!("local_tutorial_seen_{user_id}")
}

impl<R> SessionController<R>
where
    R: AuthApi + ProfileApi + InsertApi + Send + Sync,
{
    pub fn new(remote: R, ctx: AppCtx) -> Self {
        Self {
            remote,
            ctx,
            state: Mutex::new(ControllerState {
                snapshot: SessionSnapshot::initial(),
                session: None,
                handled_links: HashSet::new(),
            }),
            gate: tokio::sync::Mutex::new(()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Current state, cloned.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_state().snapshot.clone()
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn ctx(&self) -> &AppCtx {
        &self.ctx
    }

    pub fn session(&self) -> Option<RemoteSession> {
        self.lock_state().session.clone()
    }

    /// Register an observer; every state update is delivered in order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.snapshot());
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    /// App start: an existing remote session leads into the profile load;
    /// none means the auth screen.
    pub async fn cold_start(&self) {
        let _turn = self.gate.lock().await;
        self.cold_start_inner().await;
    }

    /// Error-screen retry re-attempts from cold start.
    pub async fn retry(&self) {
        let _turn = self.gate.lock().await;
        self.publish(|snapshot| snapshot.error = None);
        self.cold_start_inner().await;
    }

    /// An auth redirect delivered as a URL. Duplicate deliveries of the
    /// same URL are ignored; auth codes are single-use, so the ledger
    /// records the URL before the exchange is attempted.
    pub async fn handle_deep_link(&self, url: &str) {
        let _turn = self.gate.lock().await;
        {
            let mut state = self.lock_state();
            if !state.handled_links.insert(url.to_string()) {
                info!(
                    target: "hearthlist",
                    event = "deep_link_duplicate_ignored",
                    url
                );
                return;
            }
        }

        let Some(link) = parse_auth_link(url) else {
            warn!(target: "hearthlist", event = "deep_link_unrecognized", url);
            return;
        };

        let exchanged = match link {
            AuthLink::Code(code) => self.remote.exchange_code_for_session(&code).await,
            AuthLink::Tokens { access, refresh } => {
                self.remote.set_session(&access, &refresh).await
            }
        };
        match exchanged {
            Ok(session) => {
                self.lock_state().session = Some(session);
                if let Err(err) = self.load_profile(LoadPath::DeepLink).await {
                    self.fail(err);
                }
            }
            Err(err) => {
                warn!(
                    target: "hearthlist",
                    event = "deep_link_exchange_failed",
                    error = %err
                );
                self.fail(err.into());
            }
        }
    }

    /// App brought back to the foreground. Fully loaded sessions refresh
    /// silently behind the visible content; anything else behaves like a
    /// cold start, except that a known identity downgrades failure to a
    /// bounded retry loop instead of the error screen.
    pub async fn foreground_resume(&self) {
        let _turn = self.gate.lock().await;
        self.resume_inner().await;
    }

    /// Connectivity was lost; informational only.
    pub async fn connectivity_lost(&self) {
        let _turn = self.gate.lock().await;
        self.publish(|snapshot| snapshot.reconnecting = true);
    }

    /// Connectivity came back: silent reconnect, then drain the pending
    /// queue. Drain failures never surface here.
    pub async fn connectivity_regained(&self) {
        let _turn = self.gate.lock().await;
        self.resume_inner().await;
        let report = self.ctx.queue.drain(&self.remote).await;
        if report.skipped {
            info!(target: "hearthlist", event = "queue_drain_already_running");
        }
    }

    /// Destructive escape hatch: sign out remotely (best effort), forget
    /// the session, return to the auth screen.
    pub async fn sign_out(&self) {
        let _turn = self.gate.lock().await;
        if let Err(err) = self.remote.sign_out().await {
            warn!(target: "hearthlist", event = "sign_out_failed", error = %err);
        }
        self.lock_state().session = None;
        self.publish(|snapshot| {
            snapshot.phase = SessionPhase::Unauthenticated;
            snapshot.reconnecting = false;
            snapshot.error = None;
            snapshot.profile = None;
            snapshot.household = None;
        });
    }

    /// Record locally that the first-run tutorial was seen. The server
    /// may lag; the profile merge prefers this local truth for that one
    /// flag only.
    pub async fn mark_tutorial_seen(&self) {
        let _turn = self.gate.lock().await;
        let Some(session) = self.lock_state().session.clone() else {
            return;
        };
        self.ctx
            .store
            .set(&tutorial_seen_key(&session.user_id), "true");
        self.ctx.store.persist_best_effort();
        self.publish(|snapshot| {
            if let Some(profile) = snapshot.profile.as_mut() {
                profile.tutorial_seen = true;
            }
            if snapshot.phase == SessionPhase::AwaitingFirstRunTutorial {
                snapshot.phase = SessionPhase::Ready;
            }
        });
    }

    /// Liveness guard: a cold start that never completes must not leave
    /// the shell stuck on a spinner. After the window, a still-initial
    /// controller is forced to the auth screen. Hosts spawn this once.
    pub async fn enforce_init_deadline(&self) {
        tokio::time::sleep(self.ctx.options.init_timeout).await;
        let stuck = {
            let state = self.lock_state();
            state.snapshot.phase == SessionPhase::Initializing
        };
        if stuck {
            warn!(target: "hearthlist", event = "init_deadline_forced_unauthenticated");
            self.publish(|snapshot| snapshot.phase = SessionPhase::Unauthenticated);
        }
    }

    async fn cold_start_inner(&self) {
        match self.remote.get_session().await {
            Ok(Some(session)) => {
                self.lock_state().session = Some(session);
                if let Err(err) = self.load_profile(LoadPath::ColdStart).await {
                    self.fail(err);
                }
            }
            Ok(None) => {
                self.publish(|snapshot| snapshot.phase = SessionPhase::Unauthenticated);
            }
            Err(err) => {
                self.fail(err.into());
            }
        }
    }

    async fn resume_inner(&self) {
        if self.snapshot().phase == SessionPhase::Ready {
            self.silent_reconnect().await;
            return;
        }

        match self.remote.get_session().await {
            Ok(Some(session)) => {
                self.lock_state().session = Some(session);
                let attempts = self.ctx.options.resume_retry_attempts.max(1);
                for attempt in 1..=attempts {
                    match self.load_profile(LoadPath::Resume).await {
                        Ok(()) => return,
                        Err(err) => {
                            warn!(
                                target: "hearthlist",
                                event = "resume_load_failed",
                                attempt,
                                error = %err
                            );
                            if attempt < attempts {
                                tokio::time::sleep(self.ctx.options.resume_retry_delay).await;
                            }
                        }
                    }
                }
                // Identity is known; keep whatever is on screen and show
                // the offline indicator instead of the error screen.
                self.publish(|snapshot| snapshot.reconnecting = true);
            }
            Ok(None) => {
                self.publish(|snapshot| snapshot.phase = SessionPhase::Unauthenticated);
            }
            Err(err) => {
                warn!(target: "hearthlist", event = "resume_session_check_failed", error = %err);
                self.publish(|snapshot| snapshot.reconnecting = true);
            }
        }
    }

    async fn silent_reconnect(&self) {
        self.publish(|snapshot| snapshot.reconnecting = true);
        // Failures are absorbed inside the silent path.
        let _ = self.load_profile(LoadPath::Silent).await;
    }

    /// The one routine every trigger funnels into: cache-first render,
    /// then a network refresh that either overwrites the snapshots or is
    /// absorbed when cached data already carried the render.
    async fn load_profile(&self, path: LoadPath) -> AppResult<()> {
        let Some(session) = self.lock_state().session.clone() else {
            return Err(AppError::new("AUTH/NO_SESSION", "No active session"));
        };

        if path != LoadPath::Silent {
            self.publish(|snapshot| snapshot.phase = SessionPhase::LoadingProfile);
        }

        let profile_key = cache_keys::user_profile(&session.user_id);
        let household_key = cache_keys::household(&session.user_id);
        let cached_profile: Option<UserProfile> = self.ctx.cache.load_as(&profile_key);
        let cached_household: Option<Household> = self.ctx.cache.load_as(&household_key);
        let had_cache = cached_profile.is_some() && cached_household.is_some();

        if had_cache && path != LoadPath::Silent {
            let profile = cached_profile.clone();
            let household = cached_household.clone();
            self.publish(move |snapshot| {
                snapshot.profile = profile;
                snapshot.household = household;
                // A deep-link exchange still owns the phase; everyone
                // else renders the cached state as ready immediately.
                if path != LoadPath::DeepLink {
                    snapshot.phase = SessionPhase::Ready;
                }
            });
        }

        match self.fetch_remote_state(&session).await {
            Ok((profile, household)) => {
                self.ctx.cache.save(&profile_key, &profile);
                if let Some(household) = household.as_ref() {
                    self.ctx.cache.save(&household_key, household);
                }
                self.publish(move |snapshot| {
                    let already_ready = snapshot.phase == SessionPhase::Ready;
                    snapshot.reconnecting = false;
                    snapshot.error = None;
                    snapshot.profile = Some(profile.clone());
                    match household.clone() {
                        Some(hh) => snapshot.household = Some(hh),
                        // Losing workspace membership mid-session keeps
                        // the stale workspace visible; only a state that
                        // has not reached ready routes to setup.
                        None if !already_ready => snapshot.household = None,
                        None => {}
                    }
                    if !already_ready {
                        snapshot.phase = match (&snapshot.household, profile.tutorial_seen) {
                            (None, _) => SessionPhase::AwaitingWorkspaceSetup,
                            (Some(_), false) => SessionPhase::AwaitingFirstRunTutorial,
                            (Some(_), true) => SessionPhase::Ready,
                        };
                    }
                });
                Ok(())
            }
            Err(err) => {
                if had_cache {
                    // Stale-but-available beats an error screen.
                    info!(
                        target: "hearthlist",
                        event = "profile_refresh_absorbed",
                        error = %err
                    );
                    self.publish(|snapshot| snapshot.reconnecting = true);
                    Ok(())
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Network half of the load: touch last-active (best effort), ensure
    /// a profile row exists, merge server fields over the session
    /// identity, apply the local tutorial override, fetch the workspace.
    async fn fetch_remote_state(
        &self,
        session: &RemoteSession,
    ) -> Result<(UserProfile, Option<Household>), crate::remote::RemoteError> {
        let now = now_ms();
        if let Err(err) = self.remote.touch_last_active(&session.user_id, now).await {
            warn!(target: "hearthlist", event = "touch_last_active_failed", error = %err);
        }

        let mut profile = match self.remote.fetch_profile(&session.user_id).await? {
            Some(profile) => profile,
            None => {
                let fresh = UserProfile {
                    user_id: session.user_id.clone(),
                    email: session.email.clone(),
                    display_name: derive_display_name(&session.email),
                    tutorial_seen: false,
                    last_active_at: now,
                };
                self.remote.create_profile(&fresh).await?
            }
        };

        // Server fields merge over the base identity, never the reverse.
        profile.user_id = session.user_id.clone();
        profile.email = session.email.clone();
        if self
            .ctx
            .store
            .get(&tutorial_seen_key(&session.user_id))
            .as_deref()
            == Some("true")
        {
            profile.tutorial_seen = true;
        }

        let household = self.remote.fetch_household(&session.user_id).await?;
        Ok((profile, household))
    }

    fn fail(&self, err: AppError) {
        warn!(
            target: "hearthlist",
            event = "session_error",
            code = %err.code(),
            message = %err.message()
        );
        self.publish(move |snapshot| {
            snapshot.phase = SessionPhase::Error;
            snapshot.error = Some(err.clone());
        });
    }

    fn publish(&self, mutate: impl FnOnce(&mut SessionSnapshot)) {
        let snapshot = {
            let mut state = self.lock_state();
            mutate(&mut state.snapshot);
            state.snapshot.clone()
        };
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ControllerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum AuthLink {
    Code(String),
    Tokens { access: String, refresh: String },
}

/// Pull an auth code or token pair out of a redirect URL. Codes travel
/// in the query; token pairs arrive in the fragment.
fn parse_auth_link(url: &str) -> Option<AuthLink> {
    let params = |section: &str| -> Vec<(String, String)> {
        section
            .split('&')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    };

    if let Some((_, query)) = url.split_once('?') {
        let query = query.split('#').next().unwrap_or(query);
        for (key, value) in params(query) {
            if key == "code" && !value.is_empty() {
                return Some(AuthLink::Code(value));
            }
        }
    }

    if let Some((_, fragment)) = url.split_once('#') {
        let pairs = params(fragment);
        let find = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };
        if let (Some(access), Some(refresh)) = (find("access_token"), find("refresh_token")) {
            return Some(AuthLink::Tokens { access, refresh });
        }
    }

    None
}
