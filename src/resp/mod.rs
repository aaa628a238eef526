use utoipa::ToSchema;

pub mod jwt;
pub mod problem;
pub mod util;

/// Plain acknowledgement body, `{"message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl ToString) -> MessageResponse {
        MessageResponse {
            message: message.to_string(),
        }
    }
}
