use crate::{
    api::{accrual, leave_balance, leave_request, leave_type, statistics},
    auth::middleware::auth_middleware,
    config::Config,
    store::LeaveStore,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use tracing::warn;

// Helper to build the per-IP limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            warn!(requests_per_min, "Invalid rate limit, using governor defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

/// Protected routes: authentication + rate limiting around the leave API.
pub fn configure<S: LeaveStore + 'static>(cfg: &mut web::ServiceConfig, config: &Config) {
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .configure(configure_api::<S>),
    );
}

/// Leave endpoints without the outer middleware, so tests can mount them directly.
pub fn configure_api<S: LeaveStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/leave-types")
            // /leave-types
            .service(
                web::resource("")
                    .route(web::get().to(leave_type::list_leave_types::<S>))
                    .route(web::post().to(leave_type::create_leave_type::<S>)),
            )
            // /leave-types/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(leave_type::get_leave_type::<S>))
                    .route(web::put().to(leave_type::update_leave_type::<S>))
                    .route(web::delete().to(leave_type::delete_leave_type::<S>)),
            )
            // /leave-types/{id}/active
            .service(
                web::resource("/{id}/active")
                    .route(web::put().to(leave_type::set_leave_type_active::<S>)),
            ),
    )
    .service(
        web::scope("/leave-balances")
            // /leave-balances
            .service(
                web::resource("")
                    .route(web::get().to(leave_balance::list_balances::<S>))
                    .route(web::post().to(leave_balance::open_balance::<S>)),
            )
            // /leave-balances/{employee_id}/{leave_id}
            .service(
                web::resource("/{employee_id}/{leave_id}")
                    .route(web::get().to(leave_balance::get_balance::<S>)),
            )
            .service(
                web::resource("/{employee_id}/{leave_id}/journal")
                    .route(web::get().to(leave_balance::balance_journal::<S>)),
            )
            .service(
                web::resource("/{employee_id}/{leave_id}/encash")
                    .route(web::post().to(leave_balance::encash_balance::<S>)),
            ),
    )
    .service(
        web::scope("/leave")
            // /leave
            .service(
                web::resource("")
                    .route(web::get().to(leave_request::leave_list::<S>))
                    .route(web::post().to(leave_request::create_leave::<S>)),
            )
            // Static segments must be registered before /leave/{id}.
            .service(
                web::resource("/statistics")
                    .route(web::get().to(statistics::leave_statistics::<S>)),
            )
            .service(
                web::resource("/bulk-approve")
                    .route(web::post().to(leave_request::bulk_approve::<S>)),
            )
            .service(
                web::resource("/bulk-reject")
                    .route(web::post().to(leave_request::bulk_reject::<S>)),
            )
            // /leave/{id}
            .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave::<S>)))
            // /leave/{id}/approve
            .service(
                web::resource("/{id}/approve")
                    .route(web::put().to(leave_request::approve_leave::<S>)),
            )
            // /leave/{id}/reject
            .service(
                web::resource("/{id}/reject")
                    .route(web::put().to(leave_request::reject_leave::<S>)),
            )
            // /leave/{id}/cancel
            .service(
                web::resource("/{id}/cancel")
                    .route(web::put().to(leave_request::cancel_leave::<S>)),
            ),
    )
    .service(
        web::resource("/leave-accruals/run").route(web::post().to(accrual::run_accruals::<S>)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_any_rate() {
        for rate in [0, 1, 60, 1000, 120_000] {
            let _ = build_limiter(rate);
        }
    }
}
