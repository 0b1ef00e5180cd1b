use thiserror::Error;

use crate::model::CommissionStatus;

#[derive(Error, Debug)]
pub enum CommissionError {
    #[error("cannot compute commission: payee {payee_id} has no organization")]
    NoMembership { payee_id: String },

    #[error("cannot compute commission: payee {payee_id} is not an active member of {organization_id}")]
    NotAMember {
        payee_id:        String,
        organization_id: String,
    },

    #[error("Invalid commission event: {reason}")]
    InvalidEvent { reason: String },

    #[error("Invalid split config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Commission record '{record_id}' not found")]
    RecordNotFound { record_id: String },

    #[error("Commission record '{record_id}' cannot move from {from} to {to}")]
    InvalidStatusTransition {
        record_id: String,
        from:      CommissionStatus,
        to:        CommissionStatus,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CommissionResult<T> = Result<T, CommissionError>;
