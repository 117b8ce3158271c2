//! Success half of the response envelope.
//!
//! Every successful handler answers with
//! `{ "status": true, "message": "...", "data": ... }`. The error half lives in
//! [`crate::error::AppError`].

use actix_web::HttpResponse;
use serde::Serialize;

/// Body of a successful response.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub status: bool,
    pub message: &'a str,
    pub data: T,
}

/// Builds a `200 OK` success envelope.
pub fn success<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        status: true,
        message,
        data,
    })
}
