use serde::Deserialize;

/// Response wrapper shared by every Pages API endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

impl<T> ApiEnvelope<T> {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ApiMessage::describe).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

impl ApiMessage {
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("{} (code {})", self.message, code),
            None => self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub name: String,
}

pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
