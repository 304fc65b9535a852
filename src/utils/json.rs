use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections (missing fields, wrong types, bad syntax)
/// become `AppError::BadRequest` instead of axum's default 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
