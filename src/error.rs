use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("config: {message}")]
    Config { message: String },

    #[error("connection: {message}")]
    Connection { message: String },

    #[error("query: {message}")]
    Query { message: String },

    #[error("conversion: column '{column}': {message}")]
    Conversion { column: String, message: String },

    #[error("parameters: {message}")]
    ParameterShape { message: String },

    #[error("render: {message}")]
    Render { message: String },

    #[error("timeout: query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("cancelled: query execution was interrupted")]
    Cancelled,

    #[error("storage: {message}")]
    Storage { message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    pub fn config(message: impl Into<String>) -> Self {
        QueryError::Config {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        QueryError::Query {
            message: message.into(),
        }
    }
}
