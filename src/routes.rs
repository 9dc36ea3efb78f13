use crate::{
    api::{attendance, work_location},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};

pub type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-route governor quotas, built once at start-up.
#[derive(Clone)]
pub struct RateLimits {
    pub login: LimiterConfig,
    pub protected: LimiterConfig,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    let per_ms = (60_000 / requests_per_min.max(1) as u64).max(1);
    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} per minute"))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    // Public routes
    cfg.service(
        web::scope("/auth").service(
            web::resource("/login")
                .wrap(Governor::new(&limits.login))
                .route(web::post().to(handlers::login)),
        ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&limits.protected)) // rate limiting
            .service(web::resource("/users").route(web::post().to(handlers::create_user)))
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    ),
            )
            .service(
                web::scope("/work-locations")
                    // /work-locations
                    .service(
                        web::resource("")
                            .route(web::get().to(work_location::list_locations))
                            .route(web::post().to(work_location::create_location)),
                    )
                    // /work-locations/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(work_location::get_location))
                            .route(web::put().to(work_location::update_location)),
                    )
                    .service(
                        web::resource("/{id}/deactivate")
                            .route(web::put().to(work_location::deactivate_location)),
                    )
                    .service(
                        web::resource("/{id}/activate")
                            .route(web::put().to(work_location::activate_location)),
                    ),
            ),
    );
}
