use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// W3C identifier key for web element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a07c-4f9c3ec35a5f";

/// Browser user agent sent by sessions created with [`chrome_capabilities`].
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Opaque reference to a DOM element inside one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    /// JSON form used when passing the element as a script argument or frame id.
    pub fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    pub(crate) fn from_json(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
    }
}

/// One entry from a legacy log buffer (`performance`, `browser`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogEntry {
    pub level: String,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub value: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewSessionValue {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorValue {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Chrome capabilities for stream discovery: muted autoplay, popups allowed,
/// images off, and the `performance`/`browser` logs enabled so network events
/// and console output can be read back.
pub fn chrome_capabilities(headless: bool) -> Value {
    let mut args: Vec<String> = vec![
        "--disable-gpu",
        "--disable-software-rasterizer",
        "--disable-extensions",
        "--disable-dev-shm-usage",
        "--no-sandbox",
        "--window-size=1024,768",
        "--disable-site-isolation-trials",
        "--renderer-process-limit=1",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-breakpad",
        "--disable-component-update",
        "--disable-domain-reliability",
        "--disable-sync",
        "--mute-audio",
        "--disable-notifications",
        "--disable-popup-blocking",
        "--allow-running-insecure-content",
        "--disable-web-security",
        "--ignore-certificate-errors",
        "--disable-blink-features=AutomationControlled",
        "--autoplay-policy=no-user-gesture-required",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    args.push(format!("user-agent={DESKTOP_USER_AGENT}"));
    if headless {
        args.insert(0, "--headless=new".to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": "eager",
                "acceptInsecureCerts": true,
                "goog:loggingPrefs": { "performance": "ALL", "browser": "ALL" },
                "goog:chromeOptions": {
                    "args": args,
                    "excludeSwitches": ["enable-automation"],
                    "useAutomationExtension": false,
                    "prefs": {
                        "profile.default_content_setting_values.notifications": 2,
                        "profile.default_content_setting_values.geolocation": 2,
                        "profile.default_content_setting_values.popups": 2,
                        "profile.default_content_setting_values.images": 2,
                        "profile.content_settings.exceptions.mixed_script": { "*": { "setting": 1 } },
                        "safebrowsing.enabled": false
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_ref_round_trips_through_w3c_key() {
        let el = ElementRef("abc".to_string());
        assert_eq!(ElementRef::from_json(&el.to_json()), Some(el));
        assert_eq!(ElementRef::from_json(&json!({"ELEMENT": "abc"})), None);
    }

    #[test]
    fn headless_flag_controls_first_arg() {
        let caps = chrome_capabilities(true);
        let args = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
        assert_eq!(args[0], "--headless=new");

        let caps = chrome_capabilities(false);
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(args.iter().all(|a| a != "--headless=new"));
    }
}
