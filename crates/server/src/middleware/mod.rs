//! HTTP middleware for the accelerator server.

pub mod correlation_id;

pub use correlation_id::{
    create_request_id_layers, CorrelationId, UuidRequestIdGenerator, X_REQUEST_ID,
};
