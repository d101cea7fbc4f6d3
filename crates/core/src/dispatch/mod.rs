//! Request dispatch: retries, rate-limit pacing and error classification

pub mod classifier;
pub mod dispatcher;
pub mod ports;
pub mod rate_limit;

pub use classifier::{classify, classify_response, classify_transport, Outcome};
pub use dispatcher::{DispatcherBuilder, RequestDispatcher, REQUEST_ID_HEADER};
pub use ports::{Transport, TransportFailure, TransportRequest};
pub use rate_limit::{RateLimitState, RateLimitTracker};
