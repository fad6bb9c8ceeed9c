//! Company background lookup through the Exa search API.

pub mod enricher;
pub mod handlers;
pub mod search;

pub use search::{CompanySearch, ExaClient};
