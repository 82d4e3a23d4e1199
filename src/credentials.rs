use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_ENV_PATH: &str = ".env";

const CLIENT_ID: (&str, &str) = ("CLIENT_ID", "SPOTIPY_CLIENT_ID");
const CLIENT_SECRET: (&str, &str) = ("CLIENT_SECRET", "SPOTIPY_CLIENT_SECRET");
const REDIRECT_URI: (&str, &str) = ("REDIRECT_URI", "SPOTIPY_REDIRECT_URI");

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    /// Overrides `spotify.redirect_uri` from the settings file when present.
    pub redirect_uri: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

impl Credentials {
    /// Builds credentials from an already merged variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: required(vars, CLIENT_ID)?,
            client_secret: required(vars, CLIENT_SECRET)?,
            redirect_uri: lookup(vars, REDIRECT_URI),
        })
    }
}

fn lookup(vars: &HashMap<String, String>, (name, legacy): (&str, &str)) -> Option<String> {
    [name, legacy]
        .iter()
        .filter_map(|key| vars.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(
    vars: &HashMap<String, String>,
    key: (&'static str, &'static str),
) -> Result<String, ConfigError> {
    lookup(vars, key).ok_or(ConfigError::MissingVar(key.0))
}

/// Parses `path` as a dotenv file.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::EnvFileMissing(path.to_path_buf()));
    }

    let malformed = |e: dotenv::Error| ConfigError::EnvFileMalformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut vars = HashMap::new();
    for item in dotenv::from_path_iter(path).map_err(malformed)? {
        let (key, value) = item.map_err(malformed)?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Overlays variables found by `lookup` onto the file's variables.
pub fn merge_env<F>(mut vars: HashMap<String, String>, lookup: F) -> HashMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    for (name, legacy) in [CLIENT_ID, CLIENT_SECRET, REDIRECT_URI] {
        for key in [name, legacy] {
            if let Some(value) = lookup(key) {
                vars.insert(key.to_string(), value);
            }
        }
    }
    vars
}

/// Loads credentials from `path`, letting the process environment override it.
pub fn load_credentials(path: &Path) -> Result<Credentials, ConfigError> {
    let vars = merge_env(read_env_file(path)?, |key| std::env::var(key).ok());
    let credentials = Credentials::from_vars(&vars)?;
    log::debug!("loaded credentials for client {}", credentials.client_id);
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_valid_env_file_exposes_values_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# spotify app\nCLIENT_ID=abc123def456\nCLIENT_SECRET=\"s3cr3t=value\"\n",
        )
        .unwrap();

        let read = read_env_file(&path).unwrap();
        let credentials = Credentials::from_vars(&read).unwrap();
        assert_eq!(credentials.client_id, "abc123def456");
        assert_eq!(credentials.client_secret, "s3cr3t=value");
        assert_eq!(credentials.redirect_uri, None);
    }

    #[test]
    fn test_missing_env_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.env");
        match read_env_file(&path) {
            Err(ConfigError::EnvFileMissing(p)) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_env_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "CLIENT_ID=abc\nthis line is not an assignment\n").unwrap();
        assert!(matches!(
            read_env_file(&path),
            Err(ConfigError::EnvFileMalformed { .. })
        ));
    }

    #[test]
    fn test_blank_secret_is_missing_not_empty() {
        let result = Credentials::from_vars(&vars(&[("CLIENT_ID", "abc"), ("CLIENT_SECRET", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingVar("CLIENT_SECRET"))));
    }

    #[test]
    fn test_missing_client_id() {
        let result = Credentials::from_vars(&vars(&[("CLIENT_SECRET", "xyz")]));
        assert!(matches!(result, Err(ConfigError::MissingVar("CLIENT_ID"))));
    }

    #[test]
    fn test_legacy_names_are_accepted() {
        let credentials = Credentials::from_vars(&vars(&[
            ("SPOTIPY_CLIENT_ID", "legacy-id"),
            ("SPOTIPY_CLIENT_SECRET", "legacy-secret"),
            ("SPOTIPY_REDIRECT_URI", "http://127.0.0.1:9000/callback"),
        ]))
        .unwrap();
        assert_eq!(credentials.client_id, "legacy-id");
        assert_eq!(credentials.client_secret, "legacy-secret");
        assert_eq!(
            credentials.redirect_uri.as_deref(),
            Some("http://127.0.0.1:9000/callback")
        );
    }

    #[test]
    fn test_primary_name_wins_over_legacy() {
        let credentials = Credentials::from_vars(&vars(&[
            ("CLIENT_ID", "primary"),
            ("SPOTIPY_CLIENT_ID", "legacy"),
            ("CLIENT_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(credentials.client_id, "primary");
    }

    #[test]
    fn test_process_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "CLIENT_ID=file-id\nCLIENT_SECRET=file-secret\nSPOTIPY_REDIRECT_URI=http://127.0.0.1:9000/file\n",
        )
        .unwrap();

        let process = vars(&[
            ("CLIENT_SECRET", "env-secret"),
            ("SPOTIPY_CLIENT_ID", "env-legacy-id"),
        ]);
        let merged = merge_env(read_env_file(&path).unwrap(), |key| process.get(key).cloned());
        let credentials = Credentials::from_vars(&merged).unwrap();

        assert_eq!(credentials.client_secret, "env-secret");
        // The file's primary name still beats a legacy name from the environment.
        assert_eq!(credentials.client_id, "file-id");
        assert_eq!(
            credentials.redirect_uri.as_deref(),
            Some("http://127.0.0.1:9000/file")
        );
    }

    #[test]
    fn test_load_credentials_reads_env_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "CLIENT_ID=abc\nCLIENT_SECRET=xyz\n").unwrap();

        let expected = Credentials::from_vars(&merge_env(read_env_file(&path).unwrap(), |key| {
            std::env::var(key).ok()
        }))
        .unwrap();
        assert_eq!(load_credentials(&path).unwrap(), expected);

        assert!(matches!(
            load_credentials(&dir.path().join("missing.env")),
            Err(ConfigError::EnvFileMissing(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::from_vars(&vars(&[
            ("CLIENT_ID", "id"),
            ("CLIENT_SECRET", "do-not-print"),
        ]))
        .unwrap();
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("do-not-print"));
        assert!(debug.contains("<redacted>"));
    }
}
