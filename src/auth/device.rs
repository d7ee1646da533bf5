//! Credentials presented by RFID terminals.
//!
//! A terminal request carries three headers: the device API key, the id of
//! the staff member operating it, and that member's PIN. All three must check
//! out before a handler runs.

use crate::error::AppError;
use crate::identity::{self, StaffIdentity};
use actix_web::{FromRequest, HttpRequest, dev::Payload, web::Data};
use futures::future::LocalBoxFuture;
use sqlx::SqlitePool;

pub const DEVICE_KEY_HEADER: &str = "X-Device-Key";
pub const STAFF_ID_HEADER: &str = "X-Staff-Id";
pub const STAFF_PIN_HEADER: &str = "X-Staff-Pin";

#[derive(Debug, Clone)]
pub struct DeviceUser {
    pub device_id: i64,
    pub staff: StaffIdentity,
}

fn header(req: &HttpRequest, name: &str) -> Result<String, AppError> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {name} header")))
}

impl FromRequest for DeviceUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let pool = req.app_data::<Data<SqlitePool>>().cloned();
        let credentials = header(req, DEVICE_KEY_HEADER).and_then(|key| {
            let staff_id = header(req, STAFF_ID_HEADER)?
                .parse::<i64>()
                .map_err(|_| AppError::Unauthorized("Invalid staff id".to_string()))?;
            let pin = header(req, STAFF_PIN_HEADER)?;
            Ok((key, staff_id, pin))
        });

        Box::pin(async move {
            let pool = pool.ok_or_else(|| AppError::Internal("Database pool missing".to_string()))?;
            let (key, staff_id, pin) = credentials?;

            let device_id = identity::authenticate_device(&pool, &key).await?;
            let staff = identity::authenticate_staff_pin(&pool, staff_id, &pin).await?;

            tracing::debug!(device_id, staff_id, "Device request authenticated");
            Ok(DeviceUser { device_id, staff })
        })
    }
}
