use std::env;
use std::fmt;
use std::path::PathBuf;

use tracing::warn;

/// Which credential source the extractor is given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    /// Session cookies exported from a browser. The origin file is required.
    Cookies,
    /// Username/password login; the origin cookie file is used when present.
    Login,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Cookies => "cookies",
            AuthMode::Login => "login",
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lower bound for the pause between yt-dlp's requests in login mode.
pub const MIN_SLEEP_REQUESTS: f64 = 0.5;

#[derive(Clone, Debug)]
pub struct Settings {
    pub port: u16,
    pub cookies_path: PathBuf,
    pub temp_dir: PathBuf,
    pub auth_mode: AuthMode,
    pub credentials: Option<Credentials>,
    pub sleep_interval_requests: f64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth_mode = match lookup("AUTH_MODE").as_deref().map(str::trim) {
            None | Some("") | Some("cookies") => AuthMode::Cookies,
            Some("login") => AuthMode::Login,
            Some(other) => {
                warn!("Unknown AUTH_MODE {other:?}, falling back to cookies");
                AuthMode::Cookies
            }
        };

        let credentials = match (non_blank(&lookup, "YT_USERNAME"), non_blank(&lookup, "YT_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        Self {
            port: env_parse(&lookup, "PORT", 3021),
            cookies_path: PathBuf::from(env_str(&lookup, "COOKIES_PATH", "./cookies.txt")),
            temp_dir: lookup("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("ytstream")),
            auth_mode,
            credentials,
            sleep_interval_requests: sleep_interval(env_parse(&lookup, "YTDLP_SLEEP_REQUESTS", 1.0)),
        }
    }
}

fn sleep_interval(secs: f64) -> f64 {
    if secs.is_finite() && secs >= MIN_SLEEP_REQUESTS {
        secs
    } else {
        warn!("YTDLP_SLEEP_REQUESTS={secs} is below {MIN_SLEEP_REQUESTS}s, using the minimum");
        MIN_SLEEP_REQUESTS
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn env_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s.port, 3021);
        assert_eq!(s.cookies_path, PathBuf::from("./cookies.txt"));
        assert_eq!(s.auth_mode, AuthMode::Cookies);
        assert!(s.credentials.is_none());
        assert_eq!(s.sleep_interval_requests, 1.0);
    }

    #[test]
    fn test_login_mode_with_credentials() {
        let s = settings(&[
            ("AUTH_MODE", "login"),
            ("YT_USERNAME", "alice"),
            ("YT_PASSWORD", "hunter2"),
            ("YTDLP_SLEEP_REQUESTS", "2.5"),
            ("PORT", "8080"),
        ]);
        assert_eq!(s.auth_mode, AuthMode::Login);
        let creds = s.credentials.unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "hunter2");
        assert_eq!(s.sleep_interval_requests, 2.5);
        assert_eq!(s.port, 8080);
    }

    #[test]
    fn test_half_set_credentials_are_absent() {
        let s = settings(&[("YT_USERNAME", "alice"), ("YT_PASSWORD", "  ")]);
        assert!(s.credentials.is_none());
        let s = settings(&[("YT_PASSWORD", "hunter2")]);
        assert!(s.credentials.is_none());
    }

    #[test]
    fn test_unknown_mode_falls_back_to_cookies() {
        let s = settings(&[("AUTH_MODE", "oauth")]);
        assert_eq!(s.auth_mode, AuthMode::Cookies);
    }

    #[test]
    fn test_bad_number_uses_default() {
        let s = settings(&[("PORT", "not-a-port")]);
        assert_eq!(s.port, 3021);
    }

    #[test]
    fn test_sleep_interval_has_a_floor() {
        for raw in ["0", "-3", "0.1", "NaN"] {
            let s = settings(&[("YTDLP_SLEEP_REQUESTS", raw)]);
            assert_eq!(s.sleep_interval_requests, MIN_SLEEP_REQUESTS, "{raw}");
        }
        let s = settings(&[("YTDLP_SLEEP_REQUESTS", "3")]);
        assert_eq!(s.sleep_interval_requests, 3.0);
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let out = format!("{creds:?}");
        assert!(out.contains("alice"));
        assert!(!out.contains("hunter2"));
    }
}
