/// Errors raised by the numerical core (stepper, simulator, estimator).
///
/// These never carry presentation concerns; front-ends convert them into
/// [`AppError`] and decide whether to abort or skip the dataset.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// Measured matrix is malformed: ragged rows, too few timestamps, bad `dx`.
    #[error("input shape error: {message}")]
    InputShape { message: String },

    /// The least-squares search stopped without meeting a convergence criterion.
    #[error(
        "least-squares search did not converge after {iterations} iterations \
         (last D = {last_coefficient:e}, last SSE = {last_sse:e}): {message}"
    )]
    NonConvergence {
        message: String,
        last_coefficient: f64,
        last_sse: f64,
        iterations: usize,
    },

    /// The implicit step could not be solved (negative D, degenerate grid, zero pivot).
    #[error("singular system: {message}")]
    SingularSystem { message: String },
}

impl CoreError {
    pub fn input_shape(message: impl Into<String>) -> Self {
        Self::InputShape {
            message: message.into(),
        }
    }

    pub fn singular(message: impl Into<String>) -> Self {
        Self::SingularSystem {
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let exit_code = match err {
            CoreError::InputShape { .. } => 3,
            CoreError::NonConvergence { .. } | CoreError::SingularSystem { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let shape: AppError = CoreError::input_shape("ragged rows").into();
        assert_eq!(shape.exit_code(), 3);
        assert!(shape.message().contains("ragged rows"));

        let singular: AppError = CoreError::singular("zero pivot").into();
        assert_eq!(singular.exit_code(), 4);

        let stalled: AppError = CoreError::NonConvergence {
            message: "no decrease".to_string(),
            last_coefficient: 1e-13,
            last_sse: 0.5,
            iterations: 7,
        }
        .into();
        assert_eq!(stalled.exit_code(), 4);
        assert!(stalled.message().contains("7 iterations"));
    }
}
