//! Device identity for pushed playback sessions
//!
//! The id is an opaque UUID generated once and persisted in the settings
//! table. The name is sniffed from a user-agent string and is only a hint
//! for humans choosing which device to resume from.

use encore_core::Result;
use encore_storage::settings::{self, SETTING_DEVICE_ID};
use sqlx::SqlitePool;
use uuid::Uuid;

/// How this device identifies itself to the remote session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
}

impl DeviceIdentity {
    /// Load (or create) the persisted id and derive the name from `user_agent`
    pub async fn load(pool: &SqlitePool, user_agent: &str) -> Result<Self> {
        Ok(Self {
            id: device_id(pool).await?,
            name: device_name_from_user_agent(user_agent),
        })
    }
}

/// Persisted device id, generated on first use
pub async fn device_id(pool: &SqlitePool) -> Result<String> {
    let value = settings::get_or_insert_with(pool, SETTING_DEVICE_ID, || {
        serde_json::Value::String(Uuid::new_v4().to_string())
    })
    .await?;

    if let Some(id) = value.as_str().filter(|id| !id.is_empty()) {
        return Ok(id.to_string());
    }

    tracing::warn!(stored = %value, "Stored device id is not a string, regenerating");
    let id = Uuid::new_v4().to_string();
    settings::set(pool, SETTING_DEVICE_ID, &serde_json::Value::String(id.clone())).await?;
    Ok(id)
}

/// Best-effort "<app> on <os>" name from a user-agent string
pub fn device_name_from_user_agent(user_agent: &str) -> String {
    let ua = user_agent.to_ascii_lowercase();

    // Order matters: Edge and Opera also advertise Chrome, Chrome advertises Safari
    let app = if ua.contains("encore") {
        Some("Encore")
    } else if ua.contains("edg/") {
        Some("Edge")
    } else if ua.contains("opr/") || ua.contains("opera") {
        Some("Opera")
    } else if ua.contains("firefox/") {
        Some("Firefox")
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        Some("Chrome")
    } else if ua.contains("safari/") {
        Some("Safari")
    } else {
        None
    };

    // Android and ChromeOS also advertise Linux
    let os = if ua.contains("android") {
        Some("Android")
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ios") {
        Some("iOS")
    } else if ua.contains("windows") {
        Some("Windows")
    } else if ua.contains("mac os") || ua.contains("macintosh") || ua.contains("macos") {
        Some("macOS")
    } else if ua.contains("cros") {
        Some("ChromeOS")
    } else if ua.contains("linux") {
        Some("Linux")
    } else {
        None
    };

    match (app, os) {
        (Some(app), Some(os)) => format!("{app} on {os}"),
        (Some(app), None) => app.to_string(),
        (None, Some(os)) => format!("Unknown app on {os}"),
        (None, None) => "Unknown device".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_browsers() {
        let cases = [
            (
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Chrome on Windows",
            ),
            (
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
                "Edge on Windows",
            ),
            (
                "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
                "Firefox on Linux",
            ),
            (
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
                "Safari on macOS",
            ),
            (
                "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
                "Chrome on Android",
            ),
            (
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
                "Safari on iOS",
            ),
        ];

        for (ua, expected) in cases {
            assert_eq!(device_name_from_user_agent(ua), expected, "{ua}");
        }
    }

    #[test]
    fn names_the_daemon() {
        assert_eq!(
            device_name_from_user_agent("Encore/0.1.0 (linux)"),
            "Encore on Linux"
        );
    }

    #[test]
    fn unknown_agents_degrade_gracefully() {
        assert_eq!(device_name_from_user_agent(""), "Unknown device");
        assert_eq!(device_name_from_user_agent("curl/8.5.0"), "Unknown device");
    }
}
