use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use store::Profile;

use super::{ScoringApiKind, ScoringConfig, ScoringError, ScoringProvider};
use crate::ScoreResult;

const SYSTEM_PROMPT: &str = "You are a recruiting assistant. Compare the job and the candidate \
and answer with a single JSON object with the numeric fields aiScore, skillsMatch, \
experienceMatch, locationMatch and salaryMatch (each 0-100) and a short string field reasoning.";

/// Remote scorer.
///
/// `custom` endpoints receive `{"query", "candidate", "language"}` and answer
/// the score document directly. `openai` endpoints receive a chat completion
/// request and return the score document as the first choice's content.
#[derive(Debug, Clone)]
pub struct ApiScoringProvider {
    client: reqwest::Client,
    url: String,
    cfg: ScoringConfig,
}

impl ApiScoringProvider {
    pub fn new(cfg: ScoringConfig) -> Result<Self, ScoringError> {
        let url = cfg
            .api_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ScoringError::InvalidConfig("api_url is required for api mode".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ScoringError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url, cfg })
    }

    fn build_payload(&self, query: &Profile, candidate: &Profile, language: &str) -> Value {
        match self.cfg.api_provider {
            ScoringApiKind::Custom => json!({
                "query": query,
                "candidate": candidate,
                "language": language,
            }),
            ScoringApiKind::OpenAi => {
                let user = json!({ "query": query, "candidate": candidate });
                let system =
                    format!("{SYSTEM_PROMPT} Write the reasoning in language '{language}'.");
                json!({
                    "model": self.cfg.model_name,
                    "temperature": 0,
                    "response_format": { "type": "json_object" },
                    "messages": [
                        { "role": "system", "content": system },
                        { "role": "user", "content": user.to_string() },
                    ],
                })
            }
        }
    }
}

fn parse_score(kind: ScoringApiKind, body: Value) -> Result<ScoreResult, ScoringError> {
    let document = match kind {
        ScoringApiKind::Custom => body,
        ScoringApiKind::OpenAi => {
            let content = body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ScoringError::Malformed("missing choices[0].message.content".into())
                })?;
            serde_json::from_str(content)
                .map_err(|e| ScoringError::Malformed(format!("content is not JSON: {e}")))?
        }
    };
    serde_json::from_value(document).map_err(|e| ScoringError::Malformed(e.to_string()))
}

#[async_trait]
impl ScoringProvider for ApiScoringProvider {
    async fn evaluate(
        &self,
        query: &Profile,
        candidate: &Profile,
        language: &str,
    ) -> Result<ScoreResult, ScoringError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(header) = self.cfg.api_auth_header.as_deref() {
            request = request.header("Authorization", header);
        }

        let response = request
            .json(&self.build_payload(query, candidate, language))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Provider(format!("HTTP {status}: {body}")));
        }
        let body = response.json::<Value>().await?;
        parse_score(self.cfg.api_provider, body)
    }

    fn name(&self) -> &str {
        match self.cfg.api_provider {
            ScoringApiKind::OpenAi => "openai",
            ScoringApiKind::Custom => "custom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringMode;
    use store::OwnerType;

    fn provider(kind: ScoringApiKind) -> ApiScoringProvider {
        ApiScoringProvider::new(ScoringConfig {
            mode: ScoringMode::Api,
            api_url: Some("http://localhost:9/score".into()),
            api_provider: kind,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn parses_custom_document() {
        let body = json!({
            "aiScore": 81.5,
            "skillsMatch": 90,
            "experienceMatch": 70,
            "locationMatch": 100,
            "salaryMatch": 60,
            "reasoning": "Strong Rust background."
        });
        let score = parse_score(ScoringApiKind::Custom, body).unwrap();
        assert_eq!(score.ai_score, 81.5);
        assert_eq!(score.reasoning, "Strong Rust background.");
    }

    #[test]
    fn parses_openai_chat_content() {
        let content = json!({
            "aiScore": 64,
            "skillsMatch": 50,
            "experienceMatch": 80,
            "locationMatch": 40,
            "salaryMatch": 90,
            "reasoning": "ok"
        })
        .to_string();
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        });
        let score = parse_score(ScoringApiKind::OpenAi, body).unwrap();
        assert_eq!(score.ai_score, 64.0);
        assert_eq!(score.location_match, 40.0);
    }

    #[test]
    fn malformed_bodies_are_reported() {
        assert!(matches!(
            parse_score(ScoringApiKind::OpenAi, json!({ "choices": [] })),
            Err(ScoringError::Malformed(_))
        ));
        assert!(matches!(
            parse_score(
                ScoringApiKind::OpenAi,
                json!({ "choices": [{ "message": { "content": "not json" } }] })
            ),
            Err(ScoringError::Malformed(_))
        ));
        assert!(matches!(
            parse_score(ScoringApiKind::Custom, json!({ "aiScore": "high" })),
            Err(ScoringError::Malformed(_))
        ));
    }

    #[test]
    fn openai_payload_carries_language_and_model() {
        let p = provider(ScoringApiKind::OpenAi);
        let job = Profile::new("j", OwnerType::Job, "Chef");
        let cand = Profile::new("c", OwnerType::Candidate, "Cook");
        let payload = p.build_payload(&job, &cand, "de");
        assert_eq!(payload["model"], "gpt-4o-mini");
        let system = payload["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("'de'"));
        let user = payload["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("\"Chef\""));
    }

    #[test]
    fn custom_payload_shape() {
        let p = provider(ScoringApiKind::Custom);
        let job = Profile::new("j", OwnerType::Job, "Chef");
        let cand = Profile::new("c", OwnerType::Candidate, "Cook");
        let payload = p.build_payload(&job, &cand, "en");
        assert_eq!(payload["language"], "en");
        assert_eq!(payload["query"]["id"], "j");
        assert_eq!(payload["candidate"]["ownerType"], "candidate");
        assert_eq!(p.name(), "custom");
    }
}
