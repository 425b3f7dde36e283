//! Vendor client adapter
//!
//! - `traits`: capability contract consumed by sessions and pairing
//! - `soap`: plain SOAP implementation for unencrypted TVs

mod soap;
mod traits;

#[cfg(test)]
pub mod fake;

pub use soap::{SoapClient, SoapClientFactory};
pub use traits::{AppInfo, ClientError, ClientFactory, Credentials, FailureClass, VieraClient};
