//! Route resolution against the gateway's default table and hand-built ones.
//!
//! Test organization:
//! - default_table.rs: every service family in the shipped route table
//! - rules.rs: specificity, method filters, rewrites and errors

mod rules;

use bento_gateway::GatewayConfig;
use bento_router::Router;
use std::collections::HashMap;

pub fn default_router() -> (Router, HashMap<String, String>) {
    let config = GatewayConfig::default();
    let router = config.router().expect("default routes compile");
    (router, config.service_urls())
}
