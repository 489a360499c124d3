//! Service-specific error types

use thiserror::Error;

/// `vk-call` startup errors. Failures of the call itself stay `vk_api::Error`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing value for {0}")]
    MissingValue(&'static str),

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    #[error("Parameter must look like key=value, got: {0}")]
    MalformedParam(String),

    #[error("No method given; pass --method <name>")]
    MissingMethod,

    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        assert_eq!(
            Error::MissingValue("--method").to_string(),
            "Missing value for --method"
        );
        assert!(
            Error::MalformedParam("owner_id".into())
                .to_string()
                .contains("owner_id")
        );
        assert!(
            Error::UnknownArgument("--verbose".into())
                .to_string()
                .contains("--verbose")
        );
    }

    #[test]
    fn error_debug_includes_variant_name() {
        let debug = format!("{:?}", Error::MissingMethod);
        assert!(debug.contains("MissingMethod"), "got: {debug}");
    }
}
