use chrono::{DateTime, Utc};

pub fn current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// UNIX v6 的时间字段：32 位秒数拆成高、低两个 16 位字
pub fn to_v6_time(seconds: u64) -> [u16; 2] {
    let seconds = seconds as u32;
    [(seconds >> 16) as u16, seconds as u16]
}

pub fn from_v6_time(time: [u16; 2]) -> u64 {
    (u64::from(time[0]) << 16) | u64::from(time[1])
}

pub fn v6_now() -> [u16; 2] {
    to_v6_time(current_timestamp())
}

pub fn format_timestamp(seconds: u64) -> String {
    DateTime::<Utc>::from_timestamp(seconds as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "invalid time".to_string())
}
