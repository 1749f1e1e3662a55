//! Handler responses.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{WorkerError, WorkerResult};

/// `{ status_code, body }` envelope returned by every entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: Value,
}

impl HandlerResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    pub fn from_error(error: &WorkerError) -> Self {
        Self {
            status_code: error.status_code(),
            body: json!({
                "error": error.kind(),
                "message": error.to_string(),
            }),
        }
    }

    /// Serialize a successful output, or describe the error.
    pub fn from_result<T: Serialize>(result: WorkerResult<T>) -> Self {
        match result {
            Ok(output) => match serde_json::to_value(&output) {
                Ok(body) => Self::ok(body),
                Err(e) => Self::from_error(&WorkerError::TaskFailed(format!(
                    "Failed to encode response: {}",
                    e
                ))),
            },
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_400() {
        let response =
            HandlerResponse::from_result::<()>(Err(WorkerError::validation("missing source_key")));
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body["error"], "validation");
        assert!(response.body["message"]
            .as_str()
            .unwrap()
            .contains("missing source_key"));
        assert!(!response.is_success());
    }

    #[test]
    fn test_other_errors_are_500() {
        let response = HandlerResponse::from_result::<()>(Err(WorkerError::Timeout(900)));
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body["error"], "timeout");
    }

    #[test]
    fn test_ok_wraps_body() {
        let response = HandlerResponse::from_result(Ok(json!({"frames": 3})));
        assert!(response.is_success());
        assert_eq!(response.body["frames"], 3);

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["status_code"], 200);
    }
}
