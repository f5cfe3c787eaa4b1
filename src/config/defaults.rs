//! Default value functions referenced by the serde `default` attributes.

pub fn default_port() -> u16 {
    8080
}

pub fn default_lobby_capacity() -> usize {
    2
}

pub fn default_session_ttl_hours() -> u64 {
    24
}

pub fn default_reconnect_token_ttl_secs() -> u64 {
    300
}

pub fn default_ping_interval_secs() -> u64 {
    54
}

pub fn default_read_timeout_secs() -> u64 {
    60
}

pub fn default_write_timeout_secs() -> u64 {
    10
}

pub fn default_max_message_size() -> usize {
    8192
}

pub fn default_send_buffer_size() -> usize {
    256
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "duelgate.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub fn default_enable_file_logging() -> bool {
    false
}

pub fn default_log_format() -> super::logging::LogFormat {
    super::logging::LogFormat::Text
}
