//! Recruiting pipeline service: the candidate stage/status state machine,
//! its optimistic stage cache, and the HTTP surface the CRM view layer calls.

pub mod backend;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod routes;
pub mod state;
#[cfg(test)]
mod test_utils;
