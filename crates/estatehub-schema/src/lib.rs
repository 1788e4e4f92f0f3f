use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Top-level branch of a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Sell,
    Buy,
    Question,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sell => "sell",
            Self::Buy => "buy",
            Self::Question => "question",
        }
    }

    /// Parse a raw action value. Anything that is not one of the three
    /// intents (the widget also carries a `call` action) yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "sell" => Some(Self::Sell),
            "buy" => Some(Self::Buy),
            "question" => Some(Self::Question),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    House,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "apartment" => Some(Self::Apartment),
            "house" => Some(Self::House),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoomCount {
    #[serde(rename = "studio")]
    Studio,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4+")]
    FourPlus,
}

impl RoomCount {
    pub const ALL: [RoomCount; 5] = [
        RoomCount::Studio,
        RoomCount::One,
        RoomCount::Two,
        RoomCount::Three,
        RoomCount::FourPlus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Studio => "studio",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::FourPlus => "4+",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == raw.trim())
    }
}

/// Body of `POST /api/chat-request/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadRequest {
    #[serde(rename = "type")]
    pub intent: Intent,
    #[serde(
        rename = "propertyType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub property_type: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<RoomCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LeadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One of the three external providers whose records get deduplicated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Domrf,
    Avito,
    Domclick,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Domrf, Source::Avito, Source::Domclick];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domrf => "domrf",
            Self::Avito => "avito",
            Self::Domclick => "domclick",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Domrf => "DomRF",
            Self::Avito => "Avito",
            Self::Domclick => "DomClick",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "domrf" | "d" => Some(Self::Domrf),
            "avito" | "a" => Some(Self::Avito),
            "domclick" | "c" => Some(Self::Domclick),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Backend sends `""` for missing values
    #[serde(default, deserialize_with = "non_empty")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UnmatchedData {
    #[serde(default)]
    pub domrf: Vec<SourceRecord>,
    #[serde(default)]
    pub avito: Vec<SourceRecord>,
    #[serde(default)]
    pub domclick: Vec<SourceRecord>,
}

impl UnmatchedData {
    pub fn records(&self, source: Source) -> &[SourceRecord] {
        match source {
            Source::Domrf => &self.domrf,
            Source::Avito => &self.avito,
            Source::Domclick => &self.domclick,
        }
    }

    pub fn find(&self, source: Source, id: &str) -> Option<&SourceRecord> {
        self.records(source).iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UnmatchedTotals {
    #[serde(default)]
    pub domrf: u64,
    #[serde(default)]
    pub avito: u64,
    #[serde(default)]
    pub domclick: u64,
    /// Collection-wide unmatched counts; computed by subtraction server-side,
    /// so they may go negative on inconsistent data.
    #[serde(default)]
    pub total_domrf: i64,
    #[serde(default)]
    pub total_avito: i64,
    #[serde(default)]
    pub total_domclick: i64,
}

impl UnmatchedTotals {
    pub fn shown(&self, source: Source) -> u64 {
        match source {
            Source::Domrf => self.domrf,
            Source::Avito => self.avito,
            Source::Domclick => self.domclick,
        }
    }

    pub fn total(&self, source: Source) -> i64 {
        match source {
            Source::Domrf => self.total_domrf,
            Source::Avito => self.total_avito,
            Source::Domclick => self.total_domclick,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UnmatchedResponse {
    pub success: bool,
    #[serde(default)]
    pub data: UnmatchedData,
    #[serde(default)]
    pub totals: UnmatchedTotals,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /api/manual-matching/save/`. Empty slots are sent as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveMatchRequest {
    pub domrf_id: Option<String>,
    pub avito_id: Option<String>,
    pub domclick_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SaveMatchResponse {
    pub success: bool,
    #[serde(default)]
    pub unified_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchOrigin {
    Manual,
    Auto,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnifiedRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "not_available")]
    pub domrf_name: String,
    #[serde(default = "not_available")]
    pub avito_name: String,
    #[serde(default = "not_available")]
    pub domclick_name: String,
    #[serde(default)]
    pub source: MatchOrigin,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub per_page: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UnifiedListResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<UnifiedRecord>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /api/manual-matching/unified/<id>/update/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingUpdate {
    pub rating: u8,
    pub rating_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Common `{success, error}` envelope every backend response carries.
pub trait Envelope {
    fn success(&self) -> bool;
    fn error(&self) -> Option<&str>;
}

macro_rules! impl_envelope {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Envelope for $ty {
                fn success(&self) -> bool {
                    self.success
                }

                fn error(&self) -> Option<&str> {
                    self.error.as_deref()
                }
            }
        )*
    };
}

impl_envelope!(
    LeadResponse,
    UnmatchedResponse,
    SaveMatchResponse,
    UnifiedListResponse,
    AckResponse,
);

fn not_available() -> String {
    "N/A".to_string()
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_request_omits_absent_fields() {
        let lead = LeadRequest {
            intent: Intent::Question,
            property_type: None,
            rooms: None,
            question: Some("Сколько стоит обслуживание?".to_string()),
            phone: "+79991234567".to_string(),
        };
        let value = serde_json::to_value(&lead).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "question",
                "question": "Сколько стоит обслуживание?",
                "phone": "+79991234567"
            })
        );
    }

    #[test]
    fn lead_request_uses_wire_names_for_apartment() {
        let lead = LeadRequest {
            intent: Intent::Buy,
            property_type: Some(PropertyType::Apartment),
            rooms: Some(RoomCount::FourPlus),
            question: None,
            phone: "+79990000000".to_string(),
        };
        let value = serde_json::to_value(&lead).unwrap();
        assert_eq!(value["type"], "buy");
        assert_eq!(value["propertyType"], "apartment");
        assert_eq!(value["rooms"], "4+");
    }

    #[test]
    fn save_request_keeps_empty_slots_as_null() {
        let req = SaveMatchRequest {
            domrf_id: Some("r1".to_string()),
            avito_id: Some("a1".to_string()),
            domclick_id: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["domrf_id"], "r1");
        assert_eq!(value["avito_id"], "a1");
        assert!(value["domclick_id"].is_null());
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn source_record_treats_blank_strings_as_missing() {
        let record: SourceRecord = serde_json::from_value(serde_json::json!({
            "_id": "r1",
            "name": "ЖК Гринвич",
            "address": "",
            "url": "https://наш.дом.рф/r1"
        }))
        .unwrap();
        assert_eq!(record.id, "r1");
        assert!(record.address.is_none());
        assert_eq!(record.url.as_deref(), Some("https://наш.дом.рф/r1"));
    }

    #[test]
    fn unified_record_tolerates_unknown_origin() {
        let record: UnifiedRecord = serde_json::from_value(serde_json::json!({
            "domrf_name": "A",
            "avito_name": "B",
            "source": "unknown"
        }))
        .unwrap();
        assert_eq!(record.source, MatchOrigin::Unknown);
        assert_eq!(record.domclick_name, "N/A");
    }

    #[test]
    fn unmatched_response_parses_totals() {
        let resp: UnmatchedResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": {"domrf": [{"_id": "r1", "name": "A"}], "avito": [], "domclick": []},
            "totals": {"domrf": 1, "avito": 0, "domclick": 0,
                       "total_domrf": 12, "total_avito": 3, "total_domclick": -1}
        }))
        .unwrap();
        assert_eq!(resp.data.records(Source::Domrf).len(), 1);
        assert_eq!(resp.totals.shown(Source::Domrf), 1);
        assert_eq!(resp.totals.total(Source::Domclick), -1);
        assert!(resp.data.find(Source::Domrf, "r1").is_some());
    }

    #[test]
    fn parse_helpers_reject_unknown_values() {
        assert_eq!(Intent::parse("sell"), Some(Intent::Sell));
        assert_eq!(Intent::parse("call"), None);
        assert_eq!(PropertyType::parse("garage"), None);
        assert_eq!(RoomCount::parse("4+"), Some(RoomCount::FourPlus));
        assert_eq!(Source::parse("A"), Some(Source::Avito));
    }
}
