//! Data types shared by the request pipeline and the domain clients

pub mod credentials;
pub mod request;
pub mod response;
pub mod session;

pub use credentials::{AuthMode, Credentials};
pub use request::{HttpMethod, RequestSpec, RequestSpecBuilder};
pub use response::{ApiResponse, Headers};
pub use session::{BearerGrant, Session, SessionState};
