#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use hearthlist_lib::model::{Household, RemoteSession, UserProfile};
use hearthlist_lib::remote::{AuthApi, InsertApi, ProfileApi, RemoteError, RemoteResult};

pub fn session(user_id: &str, email: &str) -> RemoteSession {
    RemoteSession {
        user_id: user_id.to_string(),
        email: email.to_string(),
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
    }
}

pub fn profile(user_id: &str, email: &str, tutorial_seen: bool) -> UserProfile {
    UserProfile {
        user_id: user_id.to_string(),
        email: email.to_string(),
        display_name: email.split('@').next().unwrap_or("???").to_string(),
        tutorial_seen,
        last_active_at: 1_700_000_000_000,
    }
}

pub fn household(id: &str, name: &str) -> Household {
    Household {
        id: id.to_string(),
        name: name.to_string(),
        currency: None,
        created_at: 1_700_000_000_000,
    }
}

/// Scriptable stand-in for the remote backend. Session reads stay local
/// (they work offline, like a persisted session would); profile,
/// household and insert calls fail with a network error while `offline`
/// is set. Every call is recorded in order.
#[derive(Default)]
pub struct MockRemote {
    pub session: Mutex<Option<RemoteSession>>,
    pub profile: Mutex<Option<UserProfile>>,
    pub household: Mutex<Option<Household>>,
    pub exchange_session: Mutex<Option<RemoteSession>>,
    pub insert_responses: Mutex<VecDeque<RemoteResult<Value>>>,
    pub inserted: Mutex<Vec<(String, Value)>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: RemoteSession) -> Self {
        let mock = Self::default();
        *mock.session.lock().unwrap() = Some(session);
        mock
    }

    pub fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock().unwrap() = Some(profile);
    }

    pub fn set_household(&self, household: Household) {
        *self.household.lock().unwrap() = Some(household);
    }

    pub fn set_exchange_session(&self, session: RemoteSession) {
        *self.exchange_session.lock().unwrap() = Some(session);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(name))
            .count()
    }

    pub fn inserted(&self) -> Vec<(String, Value)> {
        self.inserted.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn fail_if_offline(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RemoteError::network("TypeError: Failed to fetch"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuthApi for MockRemote {
    async fn get_session(&self) -> RemoteResult<Option<RemoteSession>> {
        self.record("get_session");
        Ok(self.session.lock().unwrap().clone())
    }

    async fn exchange_code_for_session(&self, code: &str) -> RemoteResult<RemoteSession> {
        self.record(format!("exchange:{code}"));
        self.fail_if_offline()?;
        self.exchange_session
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RemoteError::unauthorized("invalid auth code"))
    }

    async fn set_session(
        &self,
        access_token: &str,
        _refresh_token: &str,
    ) -> RemoteResult<RemoteSession> {
        self.record(format!("set_session:{access_token}"));
        self.fail_if_offline()?;
        self.exchange_session
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RemoteError::unauthorized("invalid tokens"))
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        self.record("sign_out");
        *self.session.lock().unwrap() = None;
        Ok(())
    }
}

#[async_trait]
impl ProfileApi for MockRemote {
    async fn touch_last_active(&self, user_id: &str, _at_ms: i64) -> RemoteResult<()> {
        self.record(format!("touch_last_active:{user_id}"));
        self.fail_if_offline()?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str) -> RemoteResult<Option<UserProfile>> {
        self.record(format!("fetch_profile:{user_id}"));
        self.fail_if_offline()?;
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn create_profile(&self, profile: &UserProfile) -> RemoteResult<UserProfile> {
        self.record(format!("create_profile:{}", profile.user_id));
        self.fail_if_offline()?;
        *self.profile.lock().unwrap() = Some(profile.clone());
        Ok(profile.clone())
    }

    async fn fetch_household(&self, user_id: &str) -> RemoteResult<Option<Household>> {
        self.record(format!("fetch_household:{user_id}"));
        self.fail_if_offline()?;
        Ok(self.household.lock().unwrap().clone())
    }
}

#[async_trait]
impl InsertApi for MockRemote {
    async fn insert(&self, collection: &str, record: &Value) -> RemoteResult<Value> {
        self.record(format!("insert:{collection}"));
        self.fail_if_offline()?;
        self.inserted
            .lock()
            .unwrap()
            .push((collection.to_string(), record.clone()));
        self.insert_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(record.clone()))
    }
}
