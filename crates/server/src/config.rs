use std::fs;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CandidateSeed {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_bind: String,
    pub candidates: Vec<CandidateSeed>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8090".into(),
            candidates: vec![
                CandidateSeed {
                    id: "lambda".into(),
                    name: "AWS Lambda".into(),
                },
                CandidateSeed {
                    id: "dynamodb".into(),
                    name: "Amazon DynamoDB".into(),
                },
                CandidateSeed {
                    id: "api-gateway".into(),
                    name: "Amazon API Gateway".into(),
                },
                CandidateSeed {
                    id: "appsync".into(),
                    name: "AWS AppSync".into(),
                },
            ],
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("vote_service.toml") {
        match toml::from_str::<Settings>(&raw) {
            Ok(file_cfg) => settings = file_cfg,
            Err(err) => warn!(%err, "ignoring unparseable vote_service.toml"),
        }
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__CANDIDATES") {
        match parse_candidate_list(&v) {
            Some(candidates) => settings.candidates = candidates,
            None => warn!("ignoring malformed APP__CANDIDATES override"),
        }
    }

    settings
}

/// `id:name` pairs separated by commas, e.g.
/// `lambda:AWS Lambda,sqs:Amazon SQS`.
fn parse_candidate_list(raw: &str) -> Option<Vec<CandidateSeed>> {
    let mut seeds = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (id, name) = entry.split_once(':')?;
        let id = id.trim();
        let name = name.trim();
        if id.is_empty() || name.is_empty() {
            return None;
        }
        seeds.push(CandidateSeed {
            id: id.into(),
            name: name.into(),
        });
    }
    if seeds.is_empty() {
        None
    } else {
        Some(seeds)
    }
}
