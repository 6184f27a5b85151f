use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Notification,
    Internal,
}

const ENV_VAR: i32 = 1;
const DATABASE: i32 = 2;
const REQWEST: i32 = 3;
const UPSTREAM: i32 = 4;
const UNEXPECTED: i32 = 5;
const PERSISTENCE_CONFLICT: i32 = 6;
const NOTIFICATION: i32 = 7;
const CONFIG: i32 = 8;

const INVALID_INVOCATION: i32 = 100;
const INVALID_AMOUNT: i32 = 101;
const INVALID_DISTANCE: i32 = 102;
const NOT_FOUND: i32 = 103;
const NOT_SETTLEABLE: i32 = 104;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            PERSISTENCE_CONFLICT => ErrorKind::Conflict,
            REQWEST | UPSTREAM | NOTIFICATION => ErrorKind::Notification,
            NOT_FOUND | NOT_SETTLEABLE => ErrorKind::NotFound,
            1..=99 => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }

    pub fn is_not_found_error(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict_error(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let is_conflict = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code == "40001" || code == "40P01")
            .unwrap_or(false);

        if is_conflict {
            return persistence_conflict_error();
        }

        database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, self.message.as_str()),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.message.as_str()),
            ErrorKind::Conflict => (StatusCode::CONFLICT, self.message.as_str()),
            ErrorKind::Notification | ErrorKind::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn invalid_invocation_error() -> Error {
    Error {
        code: INVALID_INVOCATION,
        message: "invalid invocation".into(),
    }
}

pub fn invalid_amount_error() -> Error {
    Error {
        code: INVALID_AMOUNT,
        message: "amount must be a positive number of whole cents".into(),
    }
}

pub fn invalid_distance_error() -> Error {
    Error {
        code: INVALID_DISTANCE,
        message: "distance must be a positive finite number".into(),
    }
}

pub fn not_found_error() -> Error {
    Error {
        code: NOT_FOUND,
        message: "not found".into(),
    }
}

pub fn not_settleable_error() -> Error {
    Error {
        code: NOT_SETTLEABLE,
        message: "ride not found in settleable state".into(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: ENV_VAR,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::error!(error = ?err, "database error");

    Error {
        code: DATABASE,
        message: "database error".into(),
    }
}

pub fn reqwest_error(_: reqwest::Error) -> Error {
    Error {
        code: REQWEST,
        message: "reqwest error".into(),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: UPSTREAM,
        message: "upstream error".into(),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: UNEXPECTED,
        message: "unexpected error".into(),
    }
}

pub fn persistence_conflict_error() -> Error {
    Error {
        code: PERSISTENCE_CONFLICT,
        message: "settlement could not be committed".into(),
    }
}

pub fn config_error(key: &str) -> Error {
    Error {
        code: CONFIG,
        message: format!("invalid configuration value for {}", key),
    }
}

pub fn notification_error() -> Error {
    Error {
        code: NOTIFICATION,
        message: "notification failed".into(),
    }
}

#[test]
fn error_kinds_follow_code_ranges() {
    assert_eq!(invalid_amount_error().kind(), ErrorKind::Validation);
    assert_eq!(invalid_distance_error().kind(), ErrorKind::Validation);
    assert_eq!(invalid_invocation_error().kind(), ErrorKind::Validation);
    assert_eq!(not_found_error().kind(), ErrorKind::NotFound);
    assert_eq!(not_settleable_error().kind(), ErrorKind::NotFound);
    assert_eq!(persistence_conflict_error().kind(), ErrorKind::Conflict);
    assert_eq!(notification_error().kind(), ErrorKind::Notification);
    assert_eq!(upstream_error().kind(), ErrorKind::Notification);
    assert_eq!(database_error("boom").kind(), ErrorKind::Internal);
    assert_eq!(unexpected_error().kind(), ErrorKind::Internal);
}

#[test]
fn error_responses_map_to_status_codes() {
    assert_eq!(
        invalid_amount_error().into_response().status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        not_settleable_error().into_response().status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        persistence_conflict_error().into_response().status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        database_error("boom").into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
