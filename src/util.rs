use std::path::PathBuf;

const SOCKET_PATH: &str = "SYSMON_SOCKET";

const DEFAULT_SOCKET_PATH: &str = "/tmp/monitor.sock";

pub fn get_default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

/// Socket path from the environment, if set.
pub fn get_socket_path() -> Option<PathBuf> {
    std::env::var(SOCKET_PATH).ok().map(PathBuf::from)
}

const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

pub fn get_bot_token() -> Option<String> {
    std::env::var(TELEGRAM_BOT_TOKEN).ok()
}

const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

pub fn get_chat_id() -> Option<String> {
    std::env::var(TELEGRAM_CHAT_ID).ok()
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clamp a percentage into `[0, 100]` and round it to one decimal place.
pub fn percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    round1(value.clamp(0.0, 100.0))
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round1(bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    round1(bytes as f64 / (1024.0 * 1024.0))
}

/// Human-readable process memory: whole MiB below 1 GiB, otherwise GiB with one decimal.
pub fn format_memory_mb(memory_mb: f64) -> String {
    if memory_mb < 1024.0 {
        format!("{memory_mb:.0}M")
    } else {
        format!("{:.1}G", memory_mb / 1024.0)
    }
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
