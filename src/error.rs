pub type CardpressResult<T> = Result<T, CardpressError>;

#[derive(thiserror::Error, Debug)]
pub enum CardpressError {
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("precondition violation: {0}")]
    Precondition(String),

    #[error("dimension resolution error: {0}")]
    Dimension(String),

    #[error("composite error: {0}")]
    Composite(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CardpressError {
    pub fn invalid_location(msg: impl Into<String>) -> Self {
        Self::InvalidLocation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn dimension(msg: impl Into<String>) -> Self {
        Self::Dimension(msg.into())
    }

    pub fn composite(msg: impl Into<String>) -> Self {
        Self::Composite(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CardpressError::invalid_location("x")
                .to_string()
                .contains("invalid location:")
        );
        assert!(
            CardpressError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            CardpressError::precondition("x")
                .to_string()
                .contains("precondition violation:")
        );
        assert!(
            CardpressError::dimension("x")
                .to_string()
                .contains("dimension resolution error:")
        );
        assert!(
            CardpressError::composite("x")
                .to_string()
                .contains("composite error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CardpressError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
