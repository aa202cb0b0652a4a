//! HTTP implementation of the gateway traits against the hosted
//! PostgREST-style service (`/rest/v1/<table>` and `/rest/v1/rpc/<fn>`).

pub mod config;
pub mod http;
pub mod query;

pub use config::*;
pub use http::*;
