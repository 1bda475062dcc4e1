pub mod time;

pub use self::time::{epoch_millis_to_rfc3339, now_millis, now_timestamp};
