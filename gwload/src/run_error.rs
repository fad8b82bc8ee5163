use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => e,
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(e) => write!(f, "configuration error: {e:#}"),
            Self::RuntimeError(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

/// Core errors raised before any request goes out are input problems; the rest are runtime.
pub(crate) fn classify_core_error(err: gwload_core::Error) -> RunError {
    use gwload_core::Error as CoreError;

    match err {
        CoreError::InvalidGatewayUrl { .. }
        | CoreError::UnsupportedGatewayScheme(_)
        | CoreError::InvalidConcurrency => RunError::InvalidInput(anyhow::Error::new(err)),
        CoreError::Payload(_)
        | CoreError::LogFile { .. }
        | CoreError::LogWrite { .. }
        | CoreError::Join(_) => {
            RunError::RuntimeError(anyhow::Error::new(err).context("load run failed"))
        }
    }
}
