use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use santa_core::{DecodeError, SessionError, ValidationError};

use crate::notify::DeliveryError;
use crate::rooms::RoomError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session not found")]
    SessionNotFound,
    #[error("nothing has been drawn yet")]
    NotDrawn,
    #[error("choosing a seed is disabled on this server")]
    SeedNotAllowed,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::NotDrawn => StatusCode::CONFLICT,
            ApiError::SeedNotAllowed => StatusCode::BAD_REQUEST,
            ApiError::Session(err) => match err {
                SessionError::Validation(ValidationError::DuplicateName(_)) => StatusCode::CONFLICT,
                SessionError::Validation(_) => StatusCode::BAD_REQUEST,
                SessionError::DrawInProgress | SessionError::IllegalTransition { .. } => {
                    StatusCode::CONFLICT
                }
                SessionError::UnknownGiver(_) => StatusCode::NOT_FOUND,
                SessionError::StaleTicket(_) | SessionError::RoundMismatch => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Room(RoomError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Delivery(DeliveryError::InvalidAddress(_)) => StatusCode::BAD_REQUEST,
            ApiError::Delivery(DeliveryError::Failed(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Session(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
