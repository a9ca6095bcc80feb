use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaSourceError {
    #[error("invalid schema source configuration: {0}")]
    InvalidConfig(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("schema source returned {status} for {table}: {body}")]
    QueryFailed {
        table: String,
        status: u16,
        body: String,
    },
    #[error("schema source response for {table} could not be parsed: {detail}")]
    InvalidResponse { table: String, detail: String },
}
