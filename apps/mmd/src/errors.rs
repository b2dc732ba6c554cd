use serde::Deserialize;
use thiserror::Error;

/// Every failure the API client can produce, tagged once at the HTTP boundary.
///
/// `Clone` so a single renewal-probe failure can be handed to every queued request.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid API base URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 are the only statuses the session coordinator recovers from.
    pub fn is_session_expired(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Http { status: 422, .. } => ErrorClass::Validation,
            ApiError::Http {
                status: 401 | 403, ..
            } => ErrorClass::Session,
            ApiError::Session(_) => ErrorClass::Session,
            ApiError::Http { status: 429, .. } => ErrorClass::RateLimited,
            ApiError::Http { status, .. } if *status >= 500 => ErrorClass::Server,
            ApiError::Timeout(_) => ErrorClass::Timeout,
            ApiError::Network(_) => ErrorClass::Network,
            _ => ErrorClass::Other,
        }
    }

    /// Field-level detail from a 422 body (`{"detail": [{loc, msg, input}, ...]}`).
    /// Returns an empty list for any other error or an unparseable body.
    pub fn validation_errors(&self) -> Vec<FieldError> {
        match self {
            ApiError::Http { status: 422, body } => serde_json::from_str::<ValidationBody>(body)
                .map(|parsed| parsed.detail)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

/// How the UI layer should present an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Session,
    RateLimited,
    Server,
    Timeout,
    Network,
    Other,
}

impl ErrorClass {
    /// Chat-bubble text shown in place of an assistant answer.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorClass::Validation => "입력하신 정보를 확인해주세요. 일부 항목이 올바르지 않습니다.",
            ErrorClass::Session => "⏰ 세션이 만료되었습니다. 잠시 후 다시 시도해주세요.",
            ErrorClass::RateLimited => "🚀 요청이 너무 많습니다. 잠시 후 다시 시도해주세요.",
            ErrorClass::Server => "😱 서버 내부 오류가 발생했습니다. 잠시 후 다시 시도해주세요.",
            ErrorClass::Timeout => "⏱️ 요청 시간이 초과되었습니다. 네트워크 연결을 확인해주세요.",
            ErrorClass::Network => "🌐 네트워크 연결을 확인해주세요.",
            ErrorClass::Other => "죄송합니다. 답변을 처리하는 중 오류가 발생했습니다.",
        }
    }

    /// Short one-line notice, the CLI counterpart of a toast.
    pub fn notice(self) -> &'static str {
        match self {
            ErrorClass::Validation => "입력값 검증 오류",
            ErrorClass::Session => "세션 만료로 인해 요청에 실패했습니다",
            ErrorClass::RateLimited => "요청 제한에 도달했습니다",
            ErrorClass::Server => "서버 오류가 발생했습니다",
            ErrorClass::Timeout => "요청 시간 초과",
            ErrorClass::Network => "네트워크 연결 오류",
            ErrorClass::Other => "메시지 전송 중 오류 발생",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValidationBody {
    #[serde(default)]
    detail: Vec<FieldError>,
}

/// One entry of a 422 `detail` array.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

impl FieldError {
    /// `body.user_profile.candidate_major` style path.
    pub fn field_path(&self) -> String {
        self.loc
            .iter()
            .map(|segment| match segment {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ApiError {
        ApiError::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_only_401_and_403_are_session_errors() {
        assert!(http(401).is_session_expired());
        assert!(http(403).is_session_expired());
        assert!(!http(429).is_session_expired());
        assert!(!http(500).is_session_expired());
        assert!(!ApiError::Network("refused".into()).is_session_expired());
        assert!(!ApiError::Timeout("180s".into()).is_session_expired());
    }

    #[test]
    fn test_classification() {
        assert_eq!(http(422).class(), ErrorClass::Validation);
        assert_eq!(http(403).class(), ErrorClass::Session);
        assert_eq!(http(429).class(), ErrorClass::RateLimited);
        assert_eq!(http(500).class(), ErrorClass::Server);
        assert_eq!(http(503).class(), ErrorClass::Server);
        assert_eq!(http(404).class(), ErrorClass::Other);
        assert_eq!(
            ApiError::Timeout("elapsed".into()).class(),
            ErrorClass::Timeout
        );
        assert_eq!(
            ApiError::Network("refused".into()).class(),
            ErrorClass::Network
        );
    }

    #[test]
    fn test_validation_errors_parse_fastapi_detail() {
        let err = ApiError::Http {
            status: 422,
            body: r#"{"detail":[{"loc":["body","user_profile","candidate_major"],"msg":"field required","input":null},{"loc":["body",0],"msg":"bad"}]}"#.to_string(),
        };
        let errors = err.validation_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field_path(), "body.user_profile.candidate_major");
        assert_eq!(errors[0].msg, "field required");
        assert_eq!(errors[1].field_path(), "body.0");
    }

    #[test]
    fn test_validation_errors_empty_for_other_statuses() {
        let err = ApiError::Http {
            status: 500,
            body: r#"{"detail":[{"loc":["x"],"msg":"y"}]}"#.to_string(),
        };
        assert!(err.validation_errors().is_empty());
    }
}
