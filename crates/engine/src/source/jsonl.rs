//! JSON 줄 발견 소스
//!
//! 비동기 줄 스트림을 읽어 배치로 변환합니다.
//!
//! - JSON 객체 한 줄은 크기 1의 배치
//! - JSON 배열 한 줄은 하나의 배치
//! - 빈 줄은 무시, 해석할 수 없는 줄은 경고 후 건너뜀
//! - 최대 길이를 넘는 줄은 읽는 동안 버리고 건너뜀
//!
//! 요소 ID는 읽은 순서대로 1부터 부여합니다.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use downvoter_core::types::ElementId;

use super::{DiscoveredComment, DiscoverySource, RawComment};

/// 한 줄 기본 최대 길이
const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024; // 1MB

/// 읽은 줄
#[derive(Debug, PartialEq, Eq)]
enum ReadLine {
    /// 줄 내용 (개행 제외)
    Text(String),
    /// 최대 길이 초과, 실제 길이(바이트)
    TooLong(usize),
    /// UTF-8이 아님
    NotUtf8,
}

/// JSON 줄 소스
#[derive(Debug)]
pub struct JsonLinesSource<R> {
    reader: R,
    buffer: Vec<u8>,
    max_line_length: usize,
    next_element: u64,
    line_number: u64,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    /// 버퍼 리더로 소스를 생성합니다.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            next_element: 1,
            line_number: 0,
            skipped: 0,
        }
    }

    /// 한 줄 최대 길이를 설정합니다.
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// 건너뛴 줄 수
    pub fn skipped_lines(&self) -> u64 {
        self.skipped
    }

    /// 다음 줄을 읽습니다. 입력이 끝나면 `None`입니다.
    ///
    /// 최대 길이까지만 버퍼에 담고, 넘는 부분은 개행까지 읽어서 버립니다.
    async fn read_line(&mut self) -> std::io::Result<Option<ReadLine>> {
        self.buffer.clear();
        let mut length = 0usize;
        let mut read_any = false;

        loop {
            let (used, done) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    break;
                }
                read_any = true;
                let (chunk, done) = match available.iter().position(|b| *b == b'\n') {
                    Some(end) => (&available[..end], true),
                    None => (available, false),
                };
                length += chunk.len();
                if length <= self.max_line_length {
                    self.buffer.extend_from_slice(chunk);
                }
                (chunk.len() + usize::from(done), done)
            };
            self.reader.consume(used);
            if done {
                break;
            }
        }

        if !read_any {
            return Ok(None);
        }
        if length > self.max_line_length {
            return Ok(Some(ReadLine::TooLong(length)));
        }
        let bytes = std::mem::take(&mut self.buffer);
        Ok(Some(match String::from_utf8(bytes) {
            Ok(line) => ReadLine::Text(line),
            Err(_) => ReadLine::NotUtf8,
        }))
    }

    fn skip(&mut self, reason: &str) {
        self.skipped += 1;
        tracing::warn!(
            line = self.line_number,
            reason = %reason,
            "unparsable discovery line, skipping"
        );
    }

    fn to_batch(&mut self, comments: Vec<RawComment>) -> Vec<DiscoveredComment> {
        comments
            .into_iter()
            .map(|comment| {
                let element = ElementId(self.next_element);
                self.next_element += 1;
                DiscoveredComment::new(element, comment)
            })
            .collect()
    }

    fn parse_line(line: &str) -> Result<Vec<RawComment>, String> {
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
        match value {
            serde_json::Value::Array(_) => {
                serde_json::from_value::<Vec<RawComment>>(value).map_err(|e| e.to_string())
            }
            serde_json::Value::Object(_) => serde_json::from_value::<RawComment>(value)
                .map(|c| vec![c])
                .map_err(|e| e.to_string()),
            other => Err(format!("expected object or array, got {other}")),
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> DiscoverySource for JsonLinesSource<R> {
    async fn next_batch(&mut self) -> Option<Vec<DiscoveredComment>> {
        loop {
            let line = match self.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read discovery input, stopping");
                    return None;
                }
            };
            self.line_number += 1;

            let line = match line {
                ReadLine::Text(line) => line,
                ReadLine::TooLong(length) => {
                    let reason = format!(
                        "line too long: {length} bytes (max: {})",
                        self.max_line_length
                    );
                    self.skip(&reason);
                    continue;
                }
                ReadLine::NotUtf8 => {
                    self.skip("invalid UTF-8");
                    continue;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match Self::parse_line(trimmed) {
                Ok(comments) => return Some(self.to_batch(comments)),
                Err(reason) => self.skip(&reason),
            }
        }
    }
}
