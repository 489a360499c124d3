//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The password and access token are loaded from VK_PASSWORD / VK_ACCESS_TOKEN
//! or from `password_file` / `token_file`, never from the TOML body.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::Deserialize;
use vk_api::ClientConfig;
use vk_auth::AuthParams;

pub const PASSWORD_ENV: &str = "VK_PASSWORD";
pub const TOKEN_ENV: &str = "VK_ACCESS_TOKEN";
pub const CONFIG_PATH_ENV: &str = "VK_CALL_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "vk-call.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ClientConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// How `vk-call` obtains its access token
#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub application_id: u64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Log in again with the stored password when the token expires
    #[serde(default)]
    pub auto_refresh: bool,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    #[serde(skip)]
    pub token: Option<Secret<String>>,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order, for both password and token:
    /// 1. env var
    /// 2. `*_file` path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config
            .api
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;

        config.auth.password =
            resolve_secret(PASSWORD_ENV, config.auth.password_file.as_deref())?;
        config.auth.token = resolve_secret(TOKEN_ENV, config.auth.token_file.as_deref())?;

        if config.auth.token.is_none() {
            if config.auth.application_id == 0 {
                return Err(common::Error::Config(
                    "auth.application_id is required for password login".into(),
                ));
            }
            if config.auth.login.as_deref().is_none_or(|l| l.trim().is_empty()) {
                return Err(common::Error::Config(
                    "auth.login is required when no access token is configured".into(),
                ));
            }
            if config.auth.password.is_none() {
                return Err(common::Error::Config(format!(
                    "no password: set {PASSWORD_ENV} or auth.password_file"
                )));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or VK_CALL_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}

impl AuthConfig {
    /// A configured token is used first. Login and password ride along so the
    /// session can renew it with `refresh_token` or on expiry.
    pub fn to_auth_params(&self) -> AuthParams {
        AuthParams {
            access_token: self.token.clone(),
            user_id: self.user_id,
            application_id: self.application_id,
            login: self.login.clone(),
            password: self.password.clone(),
            scope: self.scope.clone(),
            auto_refresh: self.auto_refresh,
            ..AuthParams::default()
        }
    }
}

fn resolve_secret(env: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env) {
        let secret = Secret::new(value);
        return Ok((!secret.is_blank()).then_some(secret));
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", file.display()))
    })?;
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vk_api::Language;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_secrets() {
        unsafe {
            remove_env(PASSWORD_ENV);
            remove_env(TOKEN_ENV);
        }
    }

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn password_toml(password_file: &Path) -> String {
        format!(
            r#"
[api]
language = "en"
requests_per_second = 5

[auth]
application_id = 6121396
login = "user@example.com"
scope = "wall,offline"
auto_refresh = true
password_file = "{}"
"#,
            password_file.display()
        )
    }

    #[test]
    fn test_load_password_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let password = write(&dir, "password", "hunter2\n");
        let path = write(&dir, "vk-call.toml", &password_toml(&password));

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.language, Some(Language::En));
        assert_eq!(config.api.requests_per_second, 5);
        assert_eq!(config.api.url, vk_api::constants::API_URL);
        assert_eq!(config.auth.application_id, 6121396);
        assert_eq!(config.auth.password.as_ref().unwrap().expose(), "hunter2");
        assert!(config.auth.token.is_none());

        let params = config.auth.to_auth_params();
        assert!(params.has_login_credentials());
        assert!(params.auto_refresh);
        assert_eq!(params.scope.as_deref(), Some("wall,offline"));
    }

    #[test]
    fn test_password_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let password = write(&dir, "password", "from-file");
        let path = write(&dir, "vk-call.toml", &password_toml(&password));

        unsafe { set_env(PASSWORD_ENV, "from-env") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.password.as_ref().unwrap().expose(), "from-env");
        clear_secrets();
    }

    #[test]
    fn test_token_only_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let token = write(&dir, "token", "vk1.a.token\n");
        let path = write(
            &dir,
            "vk-call.toml",
            &format!(
                "[auth]\nuser_id = 42\ntoken_file = \"{}\"\n",
                token.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        let params = config.auth.to_auth_params();
        assert_eq!(params.access_token.as_ref().unwrap().expose(), "vk1.a.token");
        assert_eq!(params.user_id, Some(42));
        assert!(!params.has_login_credentials());
    }

    #[test]
    fn test_token_keeps_login_for_refresh() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let password = write(&dir, "password", "hunter2");
        let path = write(&dir, "vk-call.toml", &password_toml(&password));

        unsafe { set_env(TOKEN_ENV, "env-token") };
        let config = Config::load(&path).unwrap();
        let params = config.auth.to_auth_params();
        assert_eq!(params.access_token.as_ref().unwrap().expose(), "env-token");
        assert!(params.has_login_credentials());
        assert!(params.auto_refresh);
        assert_eq!(params.application_id, 6121396);
        clear_secrets();
    }

    #[test]
    fn test_token_from_env_without_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "vk-call.toml", "");

        unsafe { set_env(TOKEN_ENV, "env-token") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.token.as_ref().unwrap().expose(), "env-token");
        assert_eq!(config.api, ClientConfig::default());
        clear_secrets();
    }

    #[test]
    fn test_missing_password_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "vk-call.toml",
            "[auth]\napplication_id = 1\nlogin = \"user\"\n",
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains(PASSWORD_ENV), "got: {err}");
    }

    #[test]
    fn test_blank_password_file_counts_as_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let password = write(&dir, "password", "  \n  ");
        let path = write(&dir, "vk-call.toml", &password_toml(&password));

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_unreadable_password_file_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "vk-call.toml",
            &password_toml(&dir.path().join("does-not-exist")),
        );

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, common::Error::Config(_)));
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secrets();
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "vk-call.toml", "[api]\nurl = \"api.vk.com/method/\"\n");

        unsafe { set_env(TOKEN_ENV, "tok") };
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("http://"), "got: {err}");
        clear_secrets();
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/vk-call.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.toml", "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CONFIG_PATH_ENV, "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env(CONFIG_PATH_ENV) };
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CONFIG_PATH_ENV, "/env/path.toml") };
        assert_eq!(Config::resolve_path(None), PathBuf::from("/env/path.toml"));
        unsafe { remove_env(CONFIG_PATH_ENV) };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CONFIG_PATH_ENV) };
        assert_eq!(Config::resolve_path(None), PathBuf::from("vk-call.toml"));
    }
}
