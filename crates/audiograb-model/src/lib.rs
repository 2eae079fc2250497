pub mod book;
pub mod credits;
pub mod sanitize;
pub mod site;
pub mod stream;
pub mod tags;

pub use book::*;
pub use credits::*;
pub use sanitize::*;
pub use site::*;
pub use stream::*;
pub use tags::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no chapters found for {0}")]
    NoChapters(Site),

    #[error("site headers are missing `{0}`")]
    MissingStreamCredential(&'static str),
}
