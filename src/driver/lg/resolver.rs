//! App identifier resolution for webOS. Maps a logical streaming app to the
//! platform app id through a persistent per-device cache, the TV's installed
//! application list, and a fixed fallback table, in that order.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use serde_json::Value;
use tracing::{info, warn};

use crate::driver::lg::protocol::{SsapRequest, uri};
use crate::driver::lg::session::SsapClient;
use crate::error::RemoteError;
use crate::model::{PairingState, StreamingApp};
use crate::store::AppCacheStore;

/// One entry of the TV's application list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub id: String,
    pub title: String,
}

lazy_static! {
    /// Display-name variants matched case-insensitively against installed
    /// application titles.
    static ref TITLE_VARIANTS: HashMap<StreamingApp, Vec<&'static str>> = HashMap::from([
        (StreamingApp::Netflix, vec!["Netflix"]),
        (StreamingApp::Youtube, vec!["YouTube"]),
        (
            StreamingApp::PrimeVideo,
            vec!["Prime Video", "Amazon Prime Video", "Prime"],
        ),
        (StreamingApp::DisneyPlus, vec!["Disney+", "Disney Plus"]),
        (StreamingApp::AppleTv, vec!["Apple TV", "Apple TV+"]),
        (StreamingApp::Hulu, vec!["Hulu"]),
    ]);

    /// Well-known platform ids tried in order when the installed list yields
    /// nothing.
    static ref FALLBACK_IDS: HashMap<StreamingApp, Vec<&'static str>> = HashMap::from([
        (StreamingApp::Netflix, vec!["netflix"]),
        (StreamingApp::Youtube, vec!["youtube.leanback.v4"]),
        (StreamingApp::PrimeVideo, vec!["amazon", "com.webos.app.amazon"]),
        (StreamingApp::DisneyPlus, vec!["com.disney.disneyplus-prod"]),
        (StreamingApp::AppleTv, vec!["com.apple.appletv"]),
        (StreamingApp::Hulu, vec!["hulu"]),
    ]);
}

pub struct LgAppResolver<C: SsapClient> {
    session: C,
    cache: AppCacheStore,
}

impl<C: SsapClient> LgAppResolver<C> {
    pub fn new(session: C, cache: AppCacheStore) -> Self {
        Self { session, cache }
    }

    /// Fetch the TV's application list.
    pub async fn installed_apps(&self) -> Result<Vec<InstalledApp>, RemoteError> {
        self.ensure_ready()?;
        let response = self.session.request(SsapRequest::new(uri::LIST_APPS)).await?;
        let apps = parse_installed_apps(response.payload.as_ref());
        info!(
            target: "uniremote::lgwebos",
            count = apps.len(),
            "installed app list fetched"
        );
        Ok(apps)
    }

    /// Logical apps present on this TV, by title match over one enumeration.
    pub async fn available_apps(&self) -> Result<HashSet<StreamingApp>, RemoteError> {
        let installed = self.installed_apps().await?;
        Ok(StreamingApp::ALL
            .into_iter()
            .filter(|app| match_title(&installed, *app).is_some())
            .collect())
    }

    /// Resolve a logical app to a platform id without launching: cached id
    /// first, installed-list title match second. The fallback table is only
    /// consulted by [`launch`](Self::launch), which can confirm an id works.
    pub async fn resolve(&self, app: StreamingApp) -> Result<Option<String>, RemoteError> {
        let tv_id = self.session.device_identifier();
        if let Some(cached) = self.cache.get(&tv_id, app)? {
            info!(target: "uniremote::lgwebos", app = %app, "app id cache hit");
            return Ok(Some(cached));
        }

        let installed = self.installed_apps().await?;
        if let Some(matched) = match_title(&installed, app) {
            self.cache.set(&tv_id, app, &matched)?;
            return Ok(Some(matched));
        }
        Ok(None)
    }

    /// Resolve several apps in one pass, sharing a single installed-list
    /// enumeration across them.
    pub async fn resolve_many(
        &self,
        apps: &[StreamingApp],
    ) -> Result<HashMap<StreamingApp, String>, RemoteError> {
        let tv_id = self.session.device_identifier();
        let mut resolved = HashMap::new();
        let mut installed: Option<Vec<InstalledApp>> = None;

        for app in apps {
            if let Some(cached) = self.cache.get(&tv_id, *app)? {
                resolved.insert(*app, cached);
                continue;
            }
            if installed.is_none() {
                installed = Some(self.installed_apps().await?);
            }
            let list = installed.as_deref().unwrap_or(&[]);
            if let Some(matched) = match_title(list, *app) {
                self.cache.set(&tv_id, *app, &matched)?;
                resolved.insert(*app, matched);
            }
        }
        Ok(resolved)
    }

    /// Launch through the resolution chain: cached id, installed-list match,
    /// then the fallback table. A confirmed failed launch invalidates the
    /// cache entry and falls through; transport errors propagate immediately.
    pub async fn launch(&self, app: StreamingApp) -> Result<(), RemoteError> {
        self.ensure_ready()?;
        let tv_id = self.session.device_identifier();

        if let Some(cached) = self.cache.get(&tv_id, app)? {
            match self.launch_app_id(&cached).await {
                Ok(()) => return Ok(()),
                Err(RemoteError::AppNotFound) => {
                    warn!(
                        target: "uniremote::lgwebos",
                        app = %app,
                        app_id = %cached,
                        "cached app id failed to launch, invalidating"
                    );
                    self.cache.remove(&tv_id, app)?;
                }
                Err(other) => return Err(other),
            }
        }

        match self.resolve_from_installed(app).await {
            Ok(Some(resolved)) => {
                self.cache.set(&tv_id, app, &resolved)?;
                match self.launch_app_id(&resolved).await {
                    Ok(()) => return Ok(()),
                    Err(RemoteError::AppNotFound) => {
                        self.cache.remove(&tv_id, app)?;
                    }
                    Err(other) => return Err(other),
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target: "uniremote::lgwebos",
                    app = %app,
                    error = %err,
                    "installed-list resolution failed, trying fallback ids"
                );
            }
        }

        for fallback in FALLBACK_IDS.get(&app).map(Vec::as_slice).unwrap_or(&[]) {
            info!(
                target: "uniremote::lgwebos",
                app = %app,
                app_id = %fallback,
                "trying fallback app id"
            );
            match self.launch_app_id(fallback).await {
                Ok(()) => {
                    self.cache.set(&tv_id, app, fallback)?;
                    return Ok(());
                }
                Err(RemoteError::AppNotFound) => continue,
                Err(other) => return Err(other),
            }
        }

        warn!(target: "uniremote::lgwebos", app = %app, "app not found on device");
        Err(RemoteError::AppNotFound)
    }

    fn ensure_ready(&self) -> Result<(), RemoteError> {
        if self.session.state() != PairingState::Ready {
            return Err(RemoteError::PairingRequired);
        }
        Ok(())
    }

    async fn resolve_from_installed(
        &self,
        app: StreamingApp,
    ) -> Result<Option<String>, RemoteError> {
        let installed = self.installed_apps().await?;
        Ok(match_title(&installed, app))
    }

    /// A launch is successful only when the TV confirms it; a negative
    /// confirmation is a dead id, not a transport problem.
    async fn launch_app_id(&self, app_id: &str) -> Result<(), RemoteError> {
        let response = self.session.request(SsapRequest::launch_app(app_id)).await?;
        if response.return_value() {
            Ok(())
        } else {
            Err(RemoteError::AppNotFound)
        }
    }
}

fn parse_installed_apps(payload: Option<&Value>) -> Vec<InstalledApp> {
    let Some(apps) = payload
        .and_then(|payload| payload.get("applications"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    apps.iter()
        .filter_map(|app| {
            let id = app.get("id")?.as_str()?;
            let title = app.get("title")?.as_str()?;
            Some(InstalledApp {
                id: id.to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}

fn match_title(installed: &[InstalledApp], app: StreamingApp) -> Option<String> {
    let variants = TITLE_VARIANTS.get(&app)?;
    installed
        .iter()
        .find(|candidate| {
            let title = candidate.title.to_lowercase();
            variants
                .iter()
                .any(|variant| title.contains(&variant.to_lowercase()))
        })
        .map(|candidate| candidate.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::lg::protocol::SsapMessage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted SSAP endpoint: a fixed installed-app list plus a set of app
    /// ids that launch successfully.
    struct FakeSession {
        installed: Vec<(&'static str, &'static str)>,
        launchable: Mutex<HashSet<String>>,
        list_calls: AtomicUsize,
        launch_attempts: Mutex<Vec<String>>,
    }

    impl FakeSession {
        fn new(installed: Vec<(&'static str, &'static str)>, launchable: &[&str]) -> Self {
            Self {
                installed,
                launchable: Mutex::new(launchable.iter().map(|id| id.to_string()).collect()),
                list_calls: AtomicUsize::new(0),
                launch_attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SsapClient for FakeSession {
        fn state(&self) -> PairingState {
            PairingState::Ready
        }

        fn device_identifier(&self) -> String {
            "lgwebos.test-device".to_string()
        }

        async fn request(&self, request: SsapRequest) -> Result<SsapMessage, RemoteError> {
            if request.uri == uri::LIST_APPS {
                self.list_calls.fetch_add(1, Ordering::SeqCst);
                let apps: Vec<Value> = self
                    .installed
                    .iter()
                    .map(|(id, title)| json!({ "id": id, "title": title }))
                    .collect();
                let frame = json!({
                    "type": "response",
                    "id": "list-1",
                    "payload": { "returnValue": true, "applications": apps }
                });
                return SsapMessage::parse(&frame.to_string());
            }
            if request.uri == uri::LAUNCH {
                let app_id = request
                    .payload
                    .as_ref()
                    .and_then(|payload| payload.get("id"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                self.launch_attempts.lock().unwrap().push(app_id.clone());
                let ok = self.launchable.lock().unwrap().contains(&app_id);
                let frame = json!({
                    "type": "response",
                    "id": "launch-1",
                    "payload": { "returnValue": ok }
                });
                return SsapMessage::parse(&frame.to_string());
            }
            Err(RemoteError::InvalidResponse)
        }
    }

    fn resolver(
        session: FakeSession,
    ) -> (tempfile::TempDir, LgAppResolver<FakeSession>, AppCacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let cache = AppCacheStore::new(dir.path().join("cache.db"));
        let resolver = LgAppResolver::new(session, cache.clone());
        (dir, resolver, cache)
    }

    #[tokio::test]
    async fn test_cached_id_skips_enumeration() {
        let session = FakeSession::new(vec![("netflix", "Netflix")], &["netflix"]);
        let (_dir, resolver, cache) = resolver(session);
        cache
            .set("lgwebos.test-device", StreamingApp::Netflix, "netflix")
            .unwrap();

        let resolved = resolver.resolve(StreamingApp::Netflix).await.unwrap();
        assert_eq!(resolved.as_deref(), Some("netflix"));
        assert_eq!(resolver.session.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_matches_title_case_insensitively_and_caches() {
        let session = FakeSession::new(
            vec![("cdp-30", "Some App"), ("amazon.prime", "amazon PRIME video")],
            &[],
        );
        let (_dir, resolver, cache) = resolver(session);

        let resolved = resolver.resolve(StreamingApp::PrimeVideo).await.unwrap();
        assert_eq!(resolved.as_deref(), Some("amazon.prime"));
        assert_eq!(
            cache
                .get("lgwebos.test-device", StreamingApp::PrimeVideo)
                .unwrap()
                .as_deref(),
            Some("amazon.prime")
        );
    }

    #[tokio::test]
    async fn test_launch_invalidates_dead_cache_entry_and_falls_through() {
        // cached id is dead; the installed list has no YouTube entry; the
        // first fallback id works
        let session = FakeSession::new(vec![("other", "Other")], &["youtube.leanback.v4"]);
        let (_dir, resolver, cache) = resolver(session);
        cache
            .set("lgwebos.test-device", StreamingApp::Youtube, "stale.id")
            .unwrap();

        resolver.launch(StreamingApp::Youtube).await.unwrap();

        let cached = cache
            .get("lgwebos.test-device", StreamingApp::Youtube)
            .unwrap();
        assert_eq!(cached.as_deref(), Some("youtube.leanback.v4"));

        let attempts = resolver.session.launch_attempts.lock().unwrap().clone();
        assert_eq!(attempts, vec!["stale.id", "youtube.leanback.v4"]);
    }

    #[tokio::test]
    async fn test_second_launch_uses_fresh_cache_entry_directly() {
        let session = FakeSession::new(Vec::new(), &["youtube.leanback.v4"]);
        let (_dir, resolver, cache) = resolver(session);
        cache
            .set("lgwebos.test-device", StreamingApp::Youtube, "stale.id")
            .unwrap();

        resolver.launch(StreamingApp::Youtube).await.unwrap();
        resolver.launch(StreamingApp::Youtube).await.unwrap();

        let attempts = resolver.session.launch_attempts.lock().unwrap().clone();
        // second call goes straight to the re-cached id
        assert_eq!(
            attempts,
            vec!["stale.id", "youtube.leanback.v4", "youtube.leanback.v4"]
        );
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_not_found_without_stale_entry() {
        let session = FakeSession::new(Vec::new(), &[]);
        let (_dir, resolver, cache) = resolver(session);

        let outcome = resolver.launch(StreamingApp::Hulu).await;
        assert_eq!(outcome, Err(RemoteError::AppNotFound));
        assert_eq!(
            cache.get("lgwebos.test-device", StreamingApp::Hulu).unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_resolve_many_enumerates_once() {
        let session = FakeSession::new(
            vec![("netflix", "Netflix"), ("hulu", "Hulu")],
            &[],
        );
        let (_dir, resolver, _cache) = resolver(session);

        let resolved = resolver
            .resolve_many(&[StreamingApp::Netflix, StreamingApp::Hulu, StreamingApp::AppleTv])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolver.session.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_available_apps_title_matching() {
        let session = FakeSession::new(
            vec![
                ("netflix", "Netflix"),
                ("dplus", "Disney Plus"),
                ("weather", "Weather Channel"),
            ],
            &[],
        );
        let (_dir, resolver, _cache) = resolver(session);

        let available = resolver.available_apps().await.unwrap();
        assert!(available.contains(&StreamingApp::Netflix));
        assert!(available.contains(&StreamingApp::DisneyPlus));
        assert!(!available.contains(&StreamingApp::Hulu));
    }
}
