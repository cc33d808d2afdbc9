use serial_test::serial;
use std::env;
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use tempfile::{tempdir, NamedTempFile};

use locsync::load_config::{
    discover_config, load_config, load_config_file, ACCESS_TOKEN_ENV, PROJECT_CONFIG_FILE,
};

const FULL_CONFIG: &str = r#"
workspace:
  access_token: from-yaml
  organization_id: 9
  workspace_id: 333
  audiences_map:
    fr: fr-fr
    de: de-de
base_url: https://api.example.com/
push:
  sources:
    files:
      - /srv/app/i18n/en.json
    folders:
      - /srv/app/i18n
download:
  target: "i18n/<language_code>/<filename>.<extension>"
blacklist:
  sources:
    - "/drafts/"
transfer:
  download_workers: 5
"#;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// Restores the working directory when dropped.
struct CwdGuard(PathBuf);

impl CwdGuard {
    fn enter(dir: &Path) -> Self {
        let previous = env::current_dir().unwrap();
        env::set_current_dir(dir).unwrap();
        CwdGuard(previous)
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.0);
    }
}

#[test]
#[serial]
fn test_load_config_reads_every_section() {
    env::remove_var(ACCESS_TOKEN_ENV);
    let file = config_file(FULL_CONFIG);

    let config = load_config_file(file.path()).expect("Config should load");

    assert_eq!(config.workspace.access_token, "from-yaml");
    assert_eq!(config.workspace.organization_id, 9);
    assert_eq!(config.workspace.workspace_id, 333);
    assert_eq!(config.api_base(), "https://api.example.com");
    assert_eq!(
        config.audiences().into_iter().collect::<Vec<_>>(),
        vec!["de-de".to_string(), "fr-fr".to_string()]
    );
    assert_eq!(config.push.sources.folders, vec![PathBuf::from("/srv/app/i18n")]);
    assert_eq!(config.download.target, "i18n/<language_code>/<filename>.<extension>");
    assert_eq!(config.blacklist.sources, vec!["/drafts/".to_string()]);
    assert_eq!(config.transfer.download_workers, 5);
    assert_eq!(config.transfer.push_workers, 1);
}

#[test]
#[serial]
fn test_access_token_env_overrides_yaml() {
    let file = config_file(FULL_CONFIG);
    env::set_var(ACCESS_TOKEN_ENV, "from-env");
    let config = load_config_file(file.path());
    env::remove_var(ACCESS_TOKEN_ENV);

    assert_eq!(config.unwrap().workspace.access_token, "from-env");
}

#[test]
#[serial]
fn test_env_token_fills_a_config_without_one() {
    let file = config_file(
        "workspace:\n  organization_id: 9\n  workspace_id: 333\nbase_url: https://api.example.com\n",
    );
    env::remove_var(ACCESS_TOKEN_ENV);
    let err = load_config_file(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("access_token"), "{err:#}");

    env::set_var(ACCESS_TOKEN_ENV, "from-env");
    let config = load_config_file(file.path());
    env::remove_var(ACCESS_TOKEN_ENV);
    assert!(config.is_ok());
}

#[test]
#[serial]
fn test_load_config_errors_on_missing_fields() {
    env::remove_var(ACCESS_TOKEN_ENV);
    let file = config_file("workspace:\n  access_token: t\n");
    let err = load_config_file(file.path()).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("organization_id"), "{message}");
    assert!(message.contains("base_url"), "{message}");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("workspace: [not, a, mapping");
    let err = load_config_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    let err = load_config_file("definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_project_config_is_found_in_a_parent_directory() {
    let root = tempdir().unwrap();
    let nested = root.path().join("app/src/i18n");
    create_dir_all(&nested).unwrap();
    write(root.path().join(PROJECT_CONFIG_FILE), FULL_CONFIG).unwrap();

    let _cwd = CwdGuard::enter(&nested);
    let found = discover_config(None).unwrap();
    assert_eq!(
        found.canonicalize().unwrap(),
        root.path().join(PROJECT_CONFIG_FILE).canonicalize().unwrap()
    );

    env::remove_var(ACCESS_TOKEN_ENV);
    assert_eq!(load_config(None).unwrap().workspace.workspace_id, 333);
}

#[test]
#[serial]
fn test_explicit_path_wins_over_discovery() {
    let root = tempdir().unwrap();
    write(root.path().join(PROJECT_CONFIG_FILE), FULL_CONFIG).unwrap();
    let _cwd = CwdGuard::enter(root.path());

    let explicit = root.path().join("other.yaml");
    assert_eq!(discover_config(Some(&explicit)).unwrap(), explicit);
}
