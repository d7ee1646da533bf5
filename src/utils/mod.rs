pub mod db_utils;
pub mod device_cache;
pub mod time;
