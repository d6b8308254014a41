//! Error types for the tracking subsystem.
//!
//! A failed progress step is not an error here; it is ordinary data in the
//! step log. These variants cover caller-level rejections and transport
//! failures, and every failure path restores tracked state before returning.

use thiserror::Error;

use crate::api::models::OperationKind;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// An operation of this kind is already being tracked for the target.
    /// Stop the existing one explicitly before starting another.
    #[error("{kind} operation already in progress for '{target}'")]
    AlreadyActive { target: String, kind: OperationKind },

    /// A deployment for this app and version is already pending or running.
    /// Raised client-side, before any network call is made.
    #[error("deployment for app '{app_id}' version '{version_id}' is already pending")]
    AlreadyPending { app_id: String, version_id: String },

    /// Tracking for the target was removed while its start call was still in
    /// flight (view disposal raced the start).
    #[error("{kind} tracking for '{target}' was torn down before the operation started")]
    TornDown { target: String, kind: OperationKind },

    /// The transport rejected a request.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
