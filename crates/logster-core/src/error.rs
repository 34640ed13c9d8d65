/// Logster error types
#[derive(Debug, thiserror::Error)]
pub enum LogsterError {
    #[error("invalid rule '{rule}': {reason}")]
    Configuration { rule: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LogsterError {
    pub fn configuration(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}
