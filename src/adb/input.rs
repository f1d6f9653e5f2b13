//! Input method (keyboard) management.

use std::time::Duration;
use tracing::{error, info, warn};

use super::connection::{ensure_success, AdbBridge};

/// Timeout for IME queries and switches.
pub const KEYBOARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Gboard, used when no original keyboard was captured.
pub const DEFAULT_IME: &str =
    "com.google.android.inputmethod.latin/com.android.inputmethod.latin.LatinIME";

impl AdbBridge {
    /// Query the active input method.
    ///
    /// Returns `None` when the setting is empty, reads as `null`, or the
    /// command fails for any reason.
    pub async fn current_keyboard(&self) -> Option<String> {
        match self
            .shell(
                &["settings", "get", "secure", "default_input_method"],
                KEYBOARD_TIMEOUT,
            )
            .await
            .and_then(ensure_success)
        {
            Ok(output) => parse_keyboard(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                warn!("Keyboard detection failed: {}", e);
                None
            }
        }
    }

    /// Switch the active input method. Empty IDs are ignored and failures
    /// are only logged.
    pub async fn set_keyboard(&self, ime_id: &str) {
        if ime_id.is_empty() {
            return;
        }

        match self
            .shell(&["ime", "set", ime_id], KEYBOARD_TIMEOUT)
            .await
            .and_then(ensure_success)
        {
            Ok(_) => info!("⌨️ Keyboard set to {}", ime_id),
            Err(e) => error!("Keyboard reset failed: {}", e),
        }
    }
}

/// Interpret the output of `settings get secure default_input_method`.
pub(crate) fn parse_keyboard(stdout: &str) -> Option<String> {
    let ime = stdout.trim();
    if ime.is_empty() || ime.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(ime.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keyboard() {
        assert_eq!(
            parse_keyboard("com.android.adbkeyboard/.AdbIME\n"),
            Some("com.android.adbkeyboard/.AdbIME".to_string())
        );
        assert_eq!(parse_keyboard("null\n"), None);
        assert_eq!(parse_keyboard("   "), None);
    }

    #[tokio::test]
    async fn test_keyboard_calls_swallow_failures() {
        let adb = AdbBridge::with_path("/nonexistent/adb-binary");
        assert_eq!(adb.current_keyboard().await, None);
        adb.set_keyboard(DEFAULT_IME).await;
        adb.set_keyboard("").await;
    }
}
