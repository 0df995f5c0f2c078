use std::any::Any;
use std::backtrace::Backtrace;

use axum::response::Response;
use keel_core::HttpError;

use crate::formatter::error_response;

/// Turn a caught panic into a generic 500
///
/// Used with `CatchPanicLayer::custom`; the payload is only logged.
#[allow(clippy::needless_pass_by_value)]
pub fn recover(payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(panic = %panic_message(payload.as_ref()), "request panicked");
    error_response(HttpError::internal())
}

/// Route panic reports through `tracing`, including a captured backtrace
///
/// The hook runs at the panic site inside the current request span, so the
/// entry carries the request id.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        let location = info.location().map(ToString::to_string).unwrap_or_default();

        tracing::error!(
            panic = %panic_message(info.payload()),
            location = %location,
            backtrace = %backtrace,
            "panic"
        );
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
