//! 대화 세션 - 터미널 REPL용 대화 기록
//!
//! 기록은 세션 동안 추가만 됩니다. 답변 생성에는 이전 턴을 넘기지 않습니다.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TravelAssistant;

/// 발화자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// 대화 한 턴
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// 대화 세션
pub struct ChatSession<'a> {
    assistant: &'a TravelAssistant,
    transcript: Vec<ChatTurn>,
}

impl<'a> ChatSession<'a> {
    pub fn new(assistant: &'a TravelAssistant) -> Self {
        Self {
            assistant,
            transcript: Vec::new(),
        }
    }

    /// 질문 전송
    ///
    /// 실패하면 사용자 턴만 남기고 읽을 수 있는 에러 문장을 돌려줍니다.
    /// 세션은 계속 사용할 수 있습니다.
    pub async fn send(&mut self, message: &str) -> std::result::Result<&str, String> {
        self.push(Role::User, message);

        match self.assistant.answer(message).await {
            Ok(reply) => {
                self.push(Role::Assistant, &reply);
                Ok(self.transcript.last().map(|t| t.content.as_str()).unwrap_or_default())
            }
            Err(e) => {
                tracing::error!("Failed to answer: {}", e);
                Err(format!("Sorry, I couldn't answer that: {}", e))
            }
        }
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    fn push(&mut self, role: Role, content: &str) {
        self.transcript.push(ChatTurn {
            role,
            content: content.to_string(),
            at: Utc::now(),
        });
    }
}
