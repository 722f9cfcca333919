use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpinError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenderId {
    Male,
    Female,
    Nonbinary,
}

impl GenderId {
    pub const ALL: [GenderId; 3] = [GenderId::Male, GenderId::Female, GenderId::Nonbinary];

    pub fn description(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Nonbinary => "Non-binary",
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
            Self::Nonbinary => "NONBINARY",
        }
    }
}

/// Accepts the wire name (`NONBINARY`) or the description (`Non-binary`), any case.
impl FromStr for GenderId {
    type Err = SpinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        GenderId::ALL
            .into_iter()
            .find(|g| {
                g.wire_name().eq_ignore_ascii_case(wanted)
                    || g.description().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| SpinError::Validation(format!("unknown gender '{wanted}'")))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Gender {
    pub id: GenderId,
    #[serde(default)]
    pub description: String,
}

impl From<GenderId> for Gender {
    fn from(id: GenderId) -> Self {
        Self {
            id,
            description: id.description().to_string(),
        }
    }
}

/// The three reels of the wheel: where, when and who.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpinArguments {
    pub city: String,
    pub year: i32,
    pub gender: Gender,
}

/// Generated text plus the source URLs it was seeded from.
///
/// This is both the wire shape of the non-streaming endpoints and the
/// snapshot published by a [`crate::session::Session`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTextSources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompareScenariosRequest {
    pub spin_arguments_first_story: SpinArguments,
    pub spin_arguments_second_story: SpinArguments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text_sources_first_story: Option<GeneratedTextSources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text_sources_second_story: Option<GeneratedTextSources>,
}

/// A non-streaming binary response (the generated image).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPayload {
    pub content_type: Option<String>,
    pub data: bytes::Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stockholm() -> SpinArguments {
        SpinArguments {
            city: "Stockholm".into(),
            year: 1850,
            gender: GenderId::Female.into(),
        }
    }

    #[test]
    fn spin_arguments_use_backend_field_names() {
        let v = serde_json::to_value(stockholm()).unwrap();
        assert_eq!(
            v,
            json!({
                "city": "Stockholm",
                "year": 1850,
                "gender": {"id": "FEMALE", "description": "Female"}
            })
        );
    }

    #[test]
    fn compare_request_omits_absent_texts() {
        let req = CompareScenariosRequest {
            spin_arguments_first_story: stockholm(),
            spin_arguments_second_story: stockholm(),
            generated_text_sources_first_story: Some(GeneratedTextSources {
                generated_text: Some("once".into()),
                sources: vec!["https://skbl.se/x".into()],
            }),
            generated_text_sources_second_story: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("spinArgumentsFirstStory").is_some());
        assert_eq!(
            v["generatedTextSourcesFirstStory"]["generatedText"],
            json!("once")
        );
        assert!(v.get("generatedTextSourcesSecondStory").is_none());
    }

    #[test]
    fn generated_text_sources_tolerates_missing_fields() {
        let g: GeneratedTextSources = serde_json::from_str(r#"{"generatedText":"hi"}"#).unwrap();
        assert_eq!(g.generated_text.as_deref(), Some("hi"));
        assert!(g.sources.is_empty());
    }

    #[test]
    fn gender_parses_wire_name_and_description() {
        assert_eq!("nonbinary".parse::<GenderId>().unwrap(), GenderId::Nonbinary);
        assert_eq!("Non-binary".parse::<GenderId>().unwrap(), GenderId::Nonbinary);
        assert_eq!(" MALE ".parse::<GenderId>().unwrap(), GenderId::Male);
        assert!(matches!(
            "robot".parse::<GenderId>(),
            Err(SpinError::Validation(_))
        ));
    }

    #[test]
    fn genders_endpoint_payload_decodes() {
        let list: Vec<Gender> = serde_json::from_value(json!([
            {"id": "MALE", "description": "Male"},
            {"id": "NONBINARY", "description": "Non-binary"}
        ]))
        .unwrap();
        assert_eq!(list[1], Gender::from(GenderId::Nonbinary));
    }
}
