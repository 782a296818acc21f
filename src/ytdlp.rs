use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::Credentials;

pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// yt-dlp's "best single file with both audio and video" selector.
pub const BEST_FORMAT: &str = "best";

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_BASE}{video_id}")
}

#[derive(Clone, Debug, Default)]
pub struct ExtractOptions {
    pub cookie_file: Option<PathBuf>,
    pub credentials: Option<Credentials>,
    /// Seconds to sleep between yt-dlp's own requests during extraction.
    pub sleep_interval_requests: Option<f64>,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExtractError {
    /// yt-dlp reported a domain failure: auth rejected, unavailable,
    /// geo-restricted, no usable format.
    #[error("{0}")]
    Extraction(String),
    #[error("{0}")]
    Unexpected(String),
}

/// Resolves a watch URL into yt-dlp's info dictionary without downloading.
///
/// Implementations block; call them from `spawn_blocking`.
pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str, options: &ExtractOptions) -> Result<Value, ExtractError>;
}

/// yt-dlp running in the embedded Python interpreter.
pub struct YtDlp;

impl YtDlp {
    /// Installed yt-dlp version, used as a startup check.
    pub fn version() -> Result<String, String> {
        Python::with_gil(|py| {
            py.import("yt_dlp.version")
                .and_then(|m| m.getattr("__version__"))
                .and_then(|v| v.extract::<String>())
                .map_err(|e| format!("Failed to import yt_dlp: {e}"))
        })
    }
}

impl Extractor for YtDlp {
    fn extract(&self, url: &str, options: &ExtractOptions) -> Result<Value, ExtractError> {
        Python::with_gil(|py| {
            let yt_dlp = py
                .import("yt_dlp")
                .map_err(unexpected("Failed to import yt_dlp"))?;
            let utils = py
                .import("yt_dlp.utils")
                .map_err(unexpected("Failed to import yt_dlp.utils"))?;

            let opts = build_options(py, options).map_err(unexpected("Failed to build options"))?;

            // ydl = yt_dlp.YoutubeDL(opts)
            let ydl = yt_dlp
                .getattr("YoutubeDL")
                .and_then(|class| class.call1((opts,)))
                .map_err(unexpected("Failed to create YoutubeDL"))?;

            // info = ydl.extract_info(url, download=False)
            let kwargs = PyDict::new(py);
            kwargs
                .set_item("download", false)
                .map_err(unexpected("Failed to build kwargs"))?;
            let result = ydl
                .call_method("extract_info", (url,), Some(&kwargs))
                .and_then(|info| ydl.call_method1("sanitize_info", (info,)));

            // Close ydl to release file descriptors and flush the cookie jar
            if let Err(e) = ydl.call_method0("close") {
                warn!("Failed to close YoutubeDL: {e}");
            }

            let info = result.map_err(|e| classify(py, &utils, e))?;

            let json_str = py
                .import("json")
                .and_then(|json| json.call_method1("dumps", (info,)))
                .and_then(|s| s.extract::<String>())
                .map_err(unexpected("Failed to serialize"))?;

            serde_json::from_str(&json_str)
                .map_err(|e| ExtractError::Unexpected(format!("Failed to parse extraction result: {e}")))
        })
    }
}

fn build_options<'py>(py: Python<'py>, options: &ExtractOptions) -> PyResult<Bound<'py, PyDict>> {
    let opts = PyDict::new(py);
    opts.set_item("quiet", true)?;
    opts.set_item("no_warnings", true)?;
    opts.set_item("simulate", true)?;
    opts.set_item("format", BEST_FORMAT)?;

    if let Some(ref path) = options.cookie_file {
        opts.set_item("cookiefile", path.to_string_lossy().to_string())?;
    }
    if let Some(ref creds) = options.credentials {
        opts.set_item("username", creds.username.as_str())?;
        opts.set_item("password", creds.password.as_str())?;
    }
    if let Some(secs) = options.sleep_interval_requests {
        opts.set_item("sleep_interval_requests", secs)?;
    }

    Ok(opts)
}

/// DownloadError and ExtractorError are yt-dlp's domain failures; anything
/// else raised from extract_info is unexpected.
fn classify(py: Python<'_>, utils: &Bound<'_, PyModule>, err: PyErr) -> ExtractError {
    let message = err.value(py).to_string();
    let known = ["DownloadError", "ExtractorError"].iter().any(|name| {
        utils
            .getattr(*name)
            .map(|class| err.is_instance(py, &class))
            .unwrap_or(false)
    });

    if known {
        ExtractError::Extraction(message)
    } else {
        ExtractError::Unexpected(err.to_string())
    }
}

fn unexpected(context: &'static str) -> impl FnOnce(PyErr) -> ExtractError {
    move |e| ExtractError::Unexpected(format!("{context}: {e}"))
}

/// Pick the streaming URL out of an info dictionary.
///
/// A top-level `url` wins. Otherwise the format tagged `best` is used, which
/// is only a literal tag match and not a quality search. A result without a
/// `formats` array is not something yt-dlp produces for a video page.
pub fn select_stream_url(info: &Value) -> Result<String, ExtractError> {
    if let Some(url) = info["url"].as_str() {
        return Ok(url.to_string());
    }

    let formats = info["formats"].as_array().ok_or_else(|| {
        ExtractError::Unexpected("Extraction result has no url and no formats list".to_string())
    })?;

    formats
        .iter()
        .filter(|f| f["format_id"].as_str() == Some(BEST_FORMAT))
        .find_map(|f| f["url"].as_str())
        .map(|u| u.to_string())
        .ok_or_else(|| {
            ExtractError::Extraction("Could not find best combined streaming URL.".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_watch_url() {
        assert_eq!(
            watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_direct_url_wins() {
        let info = json!({
            "url": "https://rr1.googlevideo.com/direct",
            "formats": [{"format_id": "best", "url": "https://rr1.googlevideo.com/other"}]
        });
        assert_eq!(
            select_stream_url(&info).as_deref(),
            Ok("https://rr1.googlevideo.com/direct")
        );
    }

    #[test]
    fn test_best_tagged_format() {
        let info = json!({
            "formats": [
                {"format_id": "18", "url": "https://example.com/18"},
                {"format_id": "best", "url": "https://example.com/best"},
                {"format_id": "22", "url": "https://example.com/22"}
            ]
        });
        assert_eq!(
            select_stream_url(&info).as_deref(),
            Ok("https://example.com/best")
        );
    }

    #[test]
    fn test_best_without_url_is_skipped() {
        let info = json!({
            "formats": [
                {"format_id": "best"},
                {"format_id": "22", "url": "https://example.com/22"}
            ]
        });
        assert_eq!(
            select_stream_url(&info),
            Err(ExtractError::Extraction(
                "Could not find best combined streaming URL.".into()
            ))
        );
    }

    #[test]
    fn test_missing_or_malformed_formats_is_unexpected() {
        for info in [json!({"id": "abc"}), json!({"formats": "nope"})] {
            assert!(matches!(
                select_stream_url(&info),
                Err(ExtractError::Unexpected(_))
            ));
        }
    }

    fn option<'py>(opts: &Bound<'py, PyDict>, key: &str) -> Option<Bound<'py, PyAny>> {
        opts.get_item(key).unwrap()
    }

    #[test]
    fn test_cookie_options() {
        let options = ExtractOptions {
            cookie_file: Some(PathBuf::from("/tmp/work/cookies-1.txt")),
            ..Default::default()
        };
        Python::with_gil(|py| {
            let opts = build_options(py, &options).unwrap();
            for key in ["quiet", "no_warnings", "simulate"] {
                assert!(option(&opts, key).unwrap().extract::<bool>().unwrap(), "{key}");
            }
            assert_eq!(
                option(&opts, "format").unwrap().extract::<String>().unwrap(),
                "best"
            );
            assert_eq!(
                option(&opts, "cookiefile").unwrap().extract::<String>().unwrap(),
                "/tmp/work/cookies-1.txt"
            );
            assert!(option(&opts, "username").is_none());
            assert!(option(&opts, "password").is_none());
            assert!(option(&opts, "sleep_interval_requests").is_none());
        });
    }

    #[test]
    fn test_login_options() {
        let options = ExtractOptions {
            cookie_file: None,
            credentials: Some(Credentials {
                username: "alice".into(),
                password: "hunter2".into(),
            }),
            sleep_interval_requests: Some(1.5),
        };
        Python::with_gil(|py| {
            let opts = build_options(py, &options).unwrap();
            assert!(option(&opts, "simulate").unwrap().extract::<bool>().unwrap());
            assert!(option(&opts, "cookiefile").is_none());
            assert_eq!(
                option(&opts, "username").unwrap().extract::<String>().unwrap(),
                "alice"
            );
            assert_eq!(
                option(&opts, "password").unwrap().extract::<String>().unwrap(),
                "hunter2"
            );
            assert_eq!(
                option(&opts, "sleep_interval_requests")
                    .unwrap()
                    .extract::<f64>()
                    .unwrap(),
                1.5
            );
        });
    }
}
