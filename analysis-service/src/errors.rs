use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response}
};
use errors::{AgentError, FailureMarker, GatewayError, PipelineError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String)
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Pipeline(PipelineError::Extraction(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Pipeline(PipelineError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServiceError::Agent(AgentError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServiceError::Agent(AgentError::Gateway(err)) => match err {
                GatewayError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
                GatewayError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
                GatewayError::TransientUpstream { .. } | GatewayError::FatalUpstream { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            },
            ServiceError::Agent(AgentError::Session(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Agent(AgentError::Voice(_)) => StatusCode::BAD_GATEWAY,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST
        }
    }

    pub fn error_code(&self) -> String {
        match self {
            ServiceError::Pipeline(PipelineError::Extraction(_)) => "EXTRACTION_FAILED".to_string(),
            ServiceError::Pipeline(PipelineError::Validation(_)) => "VALIDATION_ERROR".to_string(),
            ServiceError::Agent(err) => FailureMarker::from(err).code,
            ServiceError::InvalidRequest(_) => "INVALID_REQUEST".to_string()
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::warn!(code = %error_code, message = %message, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use errors::{ExtractionError, ValidationError};

    #[test]
    fn test_status_codes() {
        let extraction = ServiceError::from(PipelineError::from(ExtractionError::NoClauses));
        assert_eq!(extraction.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(extraction.error_code(), "EXTRACTION_FAILED");

        let quota = ServiceError::from(AgentError::from(GatewayError::QuotaExceeded {
            retry_after_ms: 1000
        }));
        assert_eq!(quota.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(quota.error_code(), "QUOTA_EXCEEDED");

        let invalid = ServiceError::from(AgentError::from(ValidationError::new("message", "empty")));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.error_code(), "VALIDATION_ERROR");
    }
}
