use crate::{
    api::{absence, admin, attendance, substitution, time_tracking},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let per_ms = 60_000 / u64::from(requests_per_min.max(1));
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        // only fails on a zero period or burst, both ruled out above
        .expect("valid governor config");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let device_limiter = Arc::new(build_limiter(config.rate_device_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    let prefix = config.api_prefix.as_str();

    // RFID terminals: device key + staff PIN, checked by the DeviceUser extractor.
    // Plain resources so unmatched /attendance paths fall through to the bearer scope.
    cfg.service(
        web::resource(format!("{prefix}/attendance/status/{{rfid}}"))
            .wrap(device_limiter.clone())
            .route(web::get().to(attendance::status)),
    )
    .service(
        web::resource(format!("{prefix}/attendance/toggle"))
            .wrap(device_limiter)
            .route(web::post().to(attendance::toggle)),
    );

    // Bearer-protected routes
    cfg.service(
        web::scope(prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    .service(web::resource("/daily").route(web::get().to(attendance::daily))),
            )
            .service(
                web::scope("/time-tracking")
                    .service(
                        web::resource("/check-in").route(web::post().to(time_tracking::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(time_tracking::check_out)),
                    )
                    .service(
                        web::resource("/break/start")
                            .route(web::post().to(time_tracking::start_break)),
                    )
                    .service(
                        web::resource("/break/end").route(web::post().to(time_tracking::end_break)),
                    )
                    .service(
                        web::resource("/history").route(web::get().to(time_tracking::history)),
                    )
                    .service(
                        web::resource("/current").route(web::get().to(time_tracking::current)),
                    )
                    .service(
                        web::resource("/presence-map")
                            .route(web::get().to(time_tracking::presence_map)),
                    )
                    // /time-tracking/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(time_tracking::update_session)),
                    )
                    // /time-tracking/{id}/edits
                    .service(
                        web::resource("/{id}/edits").route(web::get().to(time_tracking::edit_log)),
                    ),
            )
            .service(
                web::scope("/substitutions")
                    // /substitutions
                    .service(
                        web::resource("")
                            .route(web::get().to(substitution::list_substitutions))
                            .route(web::post().to(substitution::create_substitution)),
                    )
                    // before /{id} so "active" is not read as an id
                    .service(
                        web::resource("/active")
                            .route(web::get().to(substitution::active_substitutions)),
                    )
                    // /substitutions/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(substitution::get_substitution))
                            .route(web::put().to(substitution::update_substitution))
                            .route(web::delete().to(substitution::delete_substitution)),
                    ),
            )
            .service(
                web::scope("/absences")
                    // /absences
                    .service(
                        web::resource("")
                            .route(web::get().to(absence::list_absences))
                            .route(web::post().to(absence::create_absence)),
                    )
                    // /absences/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(absence::update_absence))
                            .route(web::delete().to(absence::delete_absence)),
                    )
                    // /absences/{id}/approve
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(absence::approve_absence)),
                    )
                    // /absences/{id}/reject
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(absence::reject_absence)),
                    ),
            )
            .service(
                web::scope("/admin")
                    .service(web::resource("/reconcile").route(web::post().to(admin::reconcile))),
            ),
    );
}
