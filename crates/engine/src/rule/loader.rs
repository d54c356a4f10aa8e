//! 규칙 파일 로더 -- YAML/JSON 규칙 목록을 디스크에서 로드합니다.
//!
//! 파일은 규칙 목록이거나 `rules` 키 아래에 목록을 가진 매핑입니다.
//!
//! ```yaml
//! - username: bob
//! - username: eve
//!   keywords: [spam, "buy now"]
//! ```
//!
//! 잘못된 항목과 중복 username은 경고 로그를 남기고 건너뜁니다.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use downvoter_core::types::Rule;

use crate::error::EngineError;

use super::store::sanitize;

/// 규칙 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 최대 규칙 수
const MAX_RULES_COUNT: usize = 10_000;

/// 규칙 파일 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    /// YAML (`.yml`, `.yaml`, 기타)
    Yaml,
    /// JSON (`.json`)
    Json,
}

impl RuleFormat {
    /// 확장자로 형식을 결정합니다.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// 두 가지 문서 형태
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleDocument<V> {
    List(Vec<V>),
    Wrapped { rules: Vec<V> },
}

impl<V> RuleDocument<V> {
    fn into_entries(self) -> Vec<V> {
        match self {
            Self::List(entries) | Self::Wrapped { rules: entries } => entries,
        }
    }
}

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 파일에서 규칙을 로드합니다.
    ///
    /// # Errors
    /// - 파일을 읽을 수 없거나 크기 제한을 넘는 경우
    /// - 문서 자체를 파싱할 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<Rule>, EngineError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(EngineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| EngineError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let rules = Self::parse(
            &content,
            RuleFormat::from_path(path),
            &path.display().to_string(),
        )?;

        tracing::info!(
            path = %path.display(),
            count = rules.len(),
            "loaded rules from file"
        );
        Ok(rules)
    }

    /// 문자열을 파싱하여 규칙 목록을 생성합니다.
    pub fn parse(content: &str, format: RuleFormat, source: &str) -> Result<Vec<Rule>, EngineError> {
        let entries: Vec<Result<Rule, String>> = match format {
            RuleFormat::Yaml => {
                let doc: RuleDocument<serde_yaml::Value> =
                    serde_yaml::from_str(content).map_err(|e| EngineError::RuleLoad {
                        path: source.to_owned(),
                        reason: format!("YAML parse error: {e}"),
                    })?;
                doc.into_entries()
                    .into_iter()
                    .map(|v| serde_yaml::from_value::<Rule>(v).map_err(|e| e.to_string()))
                    .collect()
            }
            RuleFormat::Json => {
                let doc: RuleDocument<serde_json::Value> =
                    serde_json::from_str(content).map_err(|e| EngineError::RuleLoad {
                        path: source.to_owned(),
                        reason: format!("JSON parse error: {e}"),
                    })?;
                doc.into_entries()
                    .into_iter()
                    .map(|v| serde_json::from_value::<Rule>(v).map_err(|e| e.to_string()))
                    .collect()
            }
        };

        if entries.len() > MAX_RULES_COUNT {
            return Err(EngineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("too many rules: max {MAX_RULES_COUNT}"),
            });
        }

        let mut rules = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let rule = match entry.map_err(EngineError::MalformedRule).and_then(sanitize) {
                Ok(rule) => rule,
                Err(e) => {
                    tracing::warn!(source, index, error = %e, "invalid rule entry, skipping");
                    continue;
                }
            };

            if !seen.insert(rule.username.clone()) {
                tracing::warn!(
                    source,
                    index,
                    username = %rule.username,
                    "duplicate rule username, skipping"
                );
                continue;
            }
            rules.push(rule);
        }

        Ok(rules)
    }
}
