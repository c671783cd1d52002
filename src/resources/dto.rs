use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UpdateResourceRequest {
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddTagsRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}
