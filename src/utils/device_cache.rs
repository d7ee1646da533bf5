use moka::future::Cache;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// SHA-256 of a verified device API key => device id.
/// Argon2 verification is deliberately slow, so a kiosk scanning every few
/// seconds only pays for it once per TTL. The raw key is never stored.
static DEVICE_CACHE: OnceCell<Cache<String, i64>> = OnceCell::new();

fn build(ttl: Duration) -> Cache<String, i64> {
    Cache::builder()
        .max_capacity(1_000) // one entry per registered device
        .time_to_live(ttl)
        .build()
}

fn cache() -> &'static Cache<String, i64> {
    DEVICE_CACHE.get_or_init(|| build(DEFAULT_TTL))
}

fn key_digest(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Set the TTL before the first lookup. Later calls are ignored.
pub fn init(ttl: Duration) {
    if DEVICE_CACHE.set(build(ttl)).is_err() {
        tracing::warn!("Device cache already initialised; keeping existing TTL");
    }
}

/// Device id for a key verified within the TTL
pub async fn cached_device(api_key: &str) -> Option<i64> {
    cache().get(&key_digest(api_key)).await
}

/// Remember a successfully verified key
pub async fn remember(api_key: &str, device_id: i64) {
    cache().insert(key_digest(api_key), device_id).await;
}

/// Drop a key whose device is no longer allowed in.
pub async fn forget(api_key: &str) {
    cache().invalidate(&key_digest(api_key)).await;
}
