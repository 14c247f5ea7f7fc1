use serde::{Deserialize, Serialize};

/// Team name used when a detail page has no matching stub
pub const UNKNOWN_TEAM: &str = "Unknown";

/// Partial team record captured from a rankings table row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamStub {
    pub team_name: String,
    pub team_url: String,
    pub rating: Option<String>,
    pub rank: Option<String>,
}

/// Fields resolved from a team's profile page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamDetail {
    pub city: Option<String>,
    pub state: Option<String>,
    pub full_location: Option<String>,
    pub logo_url: Option<String>,
}

/// Output record, one per visited team detail page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub team_name: String,
    pub rank: Option<String>,
    pub rating: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub location: Option<String>,
    pub logo_url: Option<String>,
    pub team_url: String,
}

impl TeamRecord {
    /// Join a detail page result with its stub (if any).
    ///
    /// A missing stub, or one with an empty name, yields `"Unknown"` as the
    /// team name and no rank or rating.
    pub fn merge(team_url: &str, stub: Option<&TeamStub>, detail: TeamDetail) -> Self {
        let team_name = stub
            .map(|s| s.team_name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_TEAM)
            .to_string();

        Self {
            team_name,
            rank: stub.and_then(|s| s.rank.clone()),
            rating: stub.and_then(|s| s.rating.clone()),
            city: detail.city,
            state: detail.state,
            location: detail.full_location,
            logo_url: detail.logo_url,
            team_url: team_url.to_string(),
        }
    }
}
