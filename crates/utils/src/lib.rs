pub mod dates;
pub mod response;
pub mod sentry;
