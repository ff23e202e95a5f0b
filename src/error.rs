/// Convenience result type used across Bitmill.
pub type BitmillResult<T> = Result<T, BitmillError>;

/// Top-level error taxonomy used by the compositing core.
#[derive(thiserror::Error, Debug)]
pub enum BitmillError {
    /// Invalid user-provided or document data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while compositing or rasterizing a frame.
    #[error("render error: {0}")]
    Render(String),

    /// Errors reported by the offloaded pixel-filter worker.
    #[error("filter error: {0}")]
    Filter(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BitmillError {
    /// Build a [`BitmillError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`BitmillError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`BitmillError::Filter`] value.
    pub fn filter(msg: impl Into<String>) -> Self {
        Self::Filter(msg.into())
    }
}
