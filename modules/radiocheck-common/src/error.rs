use thiserror::Error;

pub type Result<T> = std::result::Result<T, RadioCheckError>;

#[derive(Error, Debug)]
pub enum RadioCheckError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
