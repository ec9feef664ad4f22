pub mod access;
pub mod accounts;
pub mod ad_pricing;
pub mod bulk_import;
pub mod config;
pub mod decorator;
pub mod detail;
pub mod email;
pub mod field_editor;
pub mod identity;
pub mod list_aggregator;
pub mod load_scope;
pub mod reference_resolver;
pub mod registry;
pub mod rest_store;
pub mod schedule;
pub mod timezone;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
