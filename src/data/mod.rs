//! Quote sources.
//!
//! - `source`: the `QuoteSource` trait the pipeline pulls from
//! - `anbima`: ANBIMA ETTJ feed client and payload adapter
//! - `credentials`: anonymous / OAuth client-credentials access to the feed
//! - `sample`: deterministic synthetic quotes
//!
//! The CSV quote file lives in `io::quotes`.

pub mod anbima;
pub mod credentials;
pub mod sample;
pub mod source;

pub use anbima::{AnbimaClient, adapt_curves};
pub use credentials::{AccessToken, Anonymous, ClientCredentials, CredentialProvider};
pub use sample::SampleSource;
pub use source::QuoteSource;
