use serde::{Deserialize, Serialize};

// -- Register --

pub const REGISTERED_MESSAGE: &str = "User registered successfully!";

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
}

impl RegisterResponse {
    pub fn registered() -> Self {
        Self {
            message: REGISTERED_MESSAGE.to_string(),
        }
    }
}

// -- Errors --

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
