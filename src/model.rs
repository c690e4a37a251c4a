use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Active,
    Ended,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VotingStatus {
    pub phase: Phase,
    #[serde(default, deserialize_with = "floor_seconds")]
    pub time_until_start: i64,
    #[serde(default, deserialize_with = "floor_seconds")]
    pub time_remaining: i64,
    #[serde(default)]
    pub total_votes: u64,
    #[serde(default)]
    pub is_voting_open: bool,
}

// the server may send fractional seconds (timedelta.total_seconds())
fn floor_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where D: Deserializer<'de> {
    let seconds = f64::deserialize(deserializer)?;
    Ok(seconds.floor() as i64)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VotingResults {
    pub options: Vec<OptionResult>,
    pub total_votes: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptionResult {
    pub id: u64,
    pub vote_count: u64,
    pub percentage: f64,
    #[serde(default)]
    pub is_winner: bool,
}

/// Envelope every voting endpoint wraps its payload in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// The payload, only when the server flagged the response as successful.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub event_id: u64,
    pub results_url: Option<String>,
}
