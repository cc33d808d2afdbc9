use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use locsync_core::config::{Config, DownloadConfig, PushConfig, SourceConfig, WorkspaceConfig};
use locsync_core::contract::MockRemoteClient;
use locsync_core::download::{DownloadOptions, Downloader};
use locsync_core::error::SyncError;
use locsync_core::local::Local;
use locsync_core::session::Session;
use locsync_core::template::FilePathPattern;
use locsync_core::workspace::{WorkspaceCache, WORKSPACE_CACHE_FILE};

const API: &str = "https://api.example.com";
const WS: &str = "https://api.example.com/v3/organizations/9/workspaces/333";

fn config(base: &Path, target: &str) -> Arc<Config> {
    Arc::new(Config {
        workspace: WorkspaceConfig {
            access_token: "token".into(),
            organization_id: 9,
            workspace_id: 333,
            audiences_map: HashMap::new(),
        },
        base_url: API.into(),
        push: PushConfig {
            sources: SourceConfig {
                files: vec![],
                folders: vec![base.to_path_buf()],
            },
        },
        download: DownloadConfig {
            target: target.into(),
        },
        ..Config::default()
    })
}

fn workspace_listing(targets: &[(i64, &str, &str)]) -> Vec<u8> {
    let target_personas: Vec<_> = targets
        .iter()
        .map(|(id, code, name)| json!({"id": id, "code": code, "name": name, "direction": "ltr"}))
        .collect();
    serde_json::to_vec(&json!({
        "meta": {"paging": {"totalEnabled": 1, "totalResults": 1}},
        "workspaces": [{
            "workflow": [],
            "workspace": {
                "id": 333,
                "organizationId": 9,
                "sourcePersona": {"id": 1, "code": "en-us", "name": "English - United States", "direction": "ltr"},
                "targetPersonas": target_personas,
                "contentTypeCodes": []
            }
        }]
    }))
    .unwrap()
}

fn file_list() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "files": [
            {"fileId": 10, "filename": "core.json", "filepath": "core.json", "version": "", "enabled": true, "completed": true, "errorId": 0},
            {"fileId": 11, "filename": "draft.json", "filepath": "draft.json", "version": "", "enabled": true, "completed": false, "errorId": 0},
            {"fileId": 12, "filename": "broken.json", "filepath": "broken.json", "version": "", "enabled": true, "completed": true, "errorId": 5}
        ]
    }))
    .unwrap()
}

fn cache_with(home: &Path, client: Arc<MockRemoteClient>, listing: Vec<u8>) -> WorkspaceCache<MockRemoteClient> {
    let local = Local::with_home(home);
    local.put_in_home(WORKSPACE_CACHE_FILE, &listing).unwrap();
    WorkspaceCache::new(client, local, API, 9, 333)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn target_template_download_writes_completed_files_only() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url == format!("{WS}/personas/2/files?withProgressStatus=false"))
        .times(1)
        .returning(|_| Ok(file_list()));
    client
        .expect_get_from_server()
        .withf(|url: &str| url == format!("{WS}/personas/2/files/10/download"))
        .times(1)
        .returning(|_| Ok(b"{\"hello\":\"bonjour\"}".to_vec()));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let session = Arc::new(Session::new());
    let downloader = Downloader::new(
        client,
        config(out.path(), "i18n/<language_code>/<filename>.<extension>"),
        Arc::clone(&session),
    );

    let report = downloader.download(&cache, &DownloadOptions::default()).await.unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(report.transferred, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(
        fs::read_to_string(out.path().join("i18n/fr-fr/core.json")).unwrap(),
        "{\"hello\":\"bonjour\"}"
    );
    assert!(!out.path().join("i18n/fr-fr/draft.json").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn skip_flag_keeps_existing_files() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    let existing = out.path().join("fr-fr-core.json");
    fs::write(&existing, "local edits").unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/personas/2/files?"))
        .times(1)
        .returning(|_| Ok(file_list()));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let downloader = Downloader::new(
        client,
        config(out.path(), "<language_code>-<filename>.<extension>"),
        Arc::new(Session::new()),
    );
    let options = DownloadOptions {
        skip_existing: true,
        ..DownloadOptions::default()
    };
    let report = downloader.download(&cache, &options).await.unwrap();
    assert_eq!(report.transferred, 0);
    assert_eq!(fs::read_to_string(existing).unwrap(), "local edits");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_path_pattern_rewrites_the_source_directory() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/personas/3/files?"))
        .times(1)
        .returning(|_| {
            Ok(serde_json::to_vec(&json!({"files": [
                {"fileId": 20, "filename": "core.json", "filepath": "v1/en-us/topics/core.json", "version": "1.2", "enabled": true, "completed": true}
            ]}))
            .unwrap())
        });
    client
        .expect_get_from_server()
        .withf(|url: &str| url.ends_with("/personas/3/files/20/download"))
        .times(1)
        .returning(|_| Ok(b"{}".to_vec()));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France"), (3, "de-de", "German - Germany")]),
    );
    let downloader = Downloader::new(client, config(out.path(), ""), Arc::new(Session::new()));
    let options = DownloadOptions {
        audience: vec!["de-de".into()],
        file_path_pattern: Some(FilePathPattern::LanguageCode),
        ..DownloadOptions::default()
    };
    let report = downloader.download(&cache, &options).await.unwrap();
    assert_eq!(report.transferred, 1);
    assert!(out.path().join("v1/de-de/topics/core_1.2.json").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn original_download_fetches_the_source_once() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/personas/2/files?"))
        .times(1)
        .returning(|_| Ok(file_list()));
    client
        .expect_get_from_server()
        .withf(|url: &str| url == format!("{WS}/files/10/download/source?withUpdates=false"))
        .times(1)
        .returning(|_| Ok(b"original".to_vec()));
    client
        .expect_get_from_server()
        .withf(|url: &str| url == format!("{WS}/files/11/download/source?withUpdates=false"))
        .times(1)
        .returning(|_| Ok(b"draft original".to_vec()));
    let client = Arc::new(client);

    // Two target personas, but only the first one's list is used.
    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France"), (3, "de-de", "German - Germany")]),
    );
    let downloader = Downloader::new(client, config(out.path(), ""), Arc::new(Session::new()));
    let options = DownloadOptions {
        original: true,
        ..DownloadOptions::default()
    };
    let report = downloader.download(&cache, &options).await.unwrap();
    assert_eq!(report.transferred, 2);
    assert_eq!(fs::read_to_string(out.path().join("core.json")).unwrap(), "original");
}

#[tokio::test]
async fn source_language_audience_is_rejected() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    let client = Arc::new(MockRemoteClient::new());
    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let downloader = Downloader::new(client, config(out.path(), "<filename>"), Arc::new(Session::new()));
    let options = DownloadOptions {
        audience: vec!["en-us".into()],
        ..DownloadOptions::default()
    };
    let err = downloader.download(&cache, &options).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(ref msg) if msg.contains("source language")));
}

#[tokio::test]
async fn unknown_audience_forces_one_refresh() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/workspaces?limit=500&offset=0"))
        .times(1)
        .returning(|_| Ok(workspace_listing(&[(2, "fr-fr", "French - France")])));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let downloader = Downloader::new(client, config(out.path(), "<filename>"), Arc::new(Session::new()));
    let options = DownloadOptions {
        audience: vec!["it-it".into()],
        ..DownloadOptions::default()
    };
    let err = downloader.download(&cache, &options).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn missing_naming_configuration_fails_at_startup() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    let client = Arc::new(MockRemoteClient::new());
    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let downloader = Downloader::new(client, config(out.path(), ""), Arc::new(Session::new()));
    let err = downloader
        .download(&cache, &DownloadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn colliding_target_paths_are_written_once() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/files?withProgressStatus=false"))
        .times(2)
        .returning(|_| {
            Ok(serde_json::to_vec(&json!({"files": [
                {"fileId": 30, "filename": "app.json", "filepath": "app.json", "enabled": true, "completed": true}
            ]}))
            .unwrap())
        });
    client
        .expect_get_from_server()
        .withf(|url: &str| url.ends_with("/files/30/download"))
        .times(1)
        .returning(|_| Ok(b"{}".to_vec()));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France"), (3, "fr-ca", "French - Canada")]),
    );
    // Both personas resolve `<language_lang_code>` to `fr`.
    let downloader = Downloader::new(
        client,
        config(out.path(), "<language_lang_code>/<filename>.<extension>"),
        Arc::new(Session::new()),
    );
    let report = downloader.download(&cache, &DownloadOptions::default()).await.unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.transferred, 1);
    assert_eq!(report.skipped, 1);
    assert!(out.path().join("fr/app.json").is_file());
}

fn two_completed_files() -> Vec<u8> {
    serde_json::to_vec(&json!({"files": [
        {"fileId": 10, "filename": "core.json", "filepath": "core.json", "enabled": true, "completed": true},
        {"fileId": 13, "filename": "menu.json", "filepath": "menu.json", "enabled": true, "completed": true}
    ]}))
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unauthorised_download_marks_the_session_and_fails_the_pull() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/personas/2/files?"))
        .times(1)
        .returning(|_| Ok(file_list()));
    client
        .expect_get_from_server()
        .withf(|url: &str| url.ends_with("/personas/2/files/10/download"))
        .times(1)
        .returning(|_| Err(SyncError::Unauthorized));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let session = Arc::new(Session::new());
    let downloader = Downloader::new(
        client,
        config(out.path(), "<language_code>/<filename>.<extension>"),
        Arc::clone(&session),
    );

    let err = downloader
        .download(&cache, &DownloadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized));
    assert!(session.is_unauthorized());
    assert_eq!(session.failed(), 1);
    assert!(!out.path().join("fr-fr/core.json").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_remote_file_is_skipped_and_the_rest_continue() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/personas/2/files?"))
        .times(1)
        .returning(|_| Ok(two_completed_files()));
    client
        .expect_get_from_server()
        .withf(|url: &str| url.ends_with("/files/10/download"))
        .times(1)
        .returning(|url| Err(SyncError::NotFound(url.to_string())));
    client
        .expect_get_from_server()
        .withf(|url: &str| url.ends_with("/files/13/download"))
        .times(1)
        .returning(|_| Ok(b"{\"menu\":\"carte\"}".to_vec()));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let session = Arc::new(Session::new());
    let downloader = Downloader::new(
        client,
        config(out.path(), "<language_code>/<filename>.<extension>"),
        Arc::clone(&session),
    );

    let report = downloader.download(&cache, &DownloadOptions::default()).await.unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.transferred, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(session.skipped(), 1);
    assert!(!session.is_unauthorized());
    assert!(!out.path().join("fr-fr/core.json").exists());
    assert!(out.path().join("fr-fr/menu.json").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn local_write_failure_fails_only_that_file() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    // A regular file where the `core` directory would have to be created.
    fs::write(out.path().join("core"), "not a directory").unwrap();

    let mut client = MockRemoteClient::new();
    client
        .expect_get_from_server()
        .withf(|url: &str| url.contains("/personas/2/files?"))
        .times(1)
        .returning(|_| Ok(two_completed_files()));
    client
        .expect_get_from_server()
        .withf(|url: &str| url.ends_with("/download"))
        .times(2)
        .returning(|_| Ok(b"{}".to_vec()));
    let client = Arc::new(client);

    let cache = cache_with(
        home.path(),
        Arc::clone(&client),
        workspace_listing(&[(2, "fr-fr", "French - France")]),
    );
    let session = Arc::new(Session::new());
    let downloader = Downloader::new(
        client,
        config(out.path(), "<filename>/<language_code>.<extension>"),
        Arc::clone(&session),
    );

    let report = downloader.download(&cache, &DownloadOptions::default()).await.unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.transferred, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(session.failed(), 1);
    assert!(out.path().join("menu/fr-fr.json").is_file());
    assert!(out.path().join("core").is_file());
}
