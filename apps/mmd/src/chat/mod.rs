//! In-memory conversation: the ordered list of chat bubbles for one submitted profile.

use tracing::{error, info};

use crate::api_client::ApiClient;
use crate::errors::{ApiError, ErrorClass};
use crate::models::chat::ChatMessage;
use crate::models::profile::UserInfo;

pub const RESET_NOTICE: &str = "🔄 대화를 새로 시작합니다. 이전 대화 내용은 초기화되었습니다.";
const INITIAL_FAILURE: &str =
    "죄송합니다. 분석 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";
const INITIAL_TIMEOUT: &str =
    "⏱️ 분석 시간이 너무 오래 걸리고 있습니다. 잠시 후 다시 시도해주세요.";

/// Outcome of one chat turn, for the caller's one-line notice.
#[derive(Debug)]
pub enum TurnOutcome {
    Answered,
    Failed(ApiError),
}

pub struct ChatSession {
    client: ApiClient,
    info: UserInfo,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(client: ApiClient, info: UserInfo) -> Self {
        Self {
            client,
            info,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn info(&self) -> &UserInfo {
        &self.info
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Sends the question the profile was submitted with.
    pub async fn start(&mut self) -> TurnOutcome {
        let question = self.info.candidate_question.clone();
        if question.trim().is_empty() {
            return TurnOutcome::Answered;
        }
        self.messages.push(ChatMessage::user(question));

        match self.client.run_workflow(&self.info).await {
            Ok(result) => {
                info!("Initial analysis complete");
                self.messages.push(ChatMessage::assistant(result.final_answer));
                TurnOutcome::Answered
            }
            Err(err) => {
                error!("Failed to get initial response: {err}");
                let text = match err.class() {
                    ErrorClass::RateLimited => ErrorClass::RateLimited.user_message(),
                    ErrorClass::Timeout => INITIAL_TIMEOUT,
                    _ => INITIAL_FAILURE,
                };
                self.messages.push(ChatMessage::assistant_error(text));
                TurnOutcome::Failed(err)
            }
        }
    }

    /// Appends the user's message and exactly one assistant reply (answer or error text).
    /// Blank input is ignored and returns `None`.
    pub async fn send(&mut self, text: &str) -> Option<TurnOutcome> {
        if text.trim().is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(text));

        let turn = self.info.with_question(text);
        let outcome = match self.client.run_workflow(&turn).await {
            Ok(result) => {
                self.messages.push(ChatMessage::assistant(result.final_answer));
                TurnOutcome::Answered
            }
            Err(err) => {
                error!("Failed to send message: {err}");
                self.messages
                    .push(ChatMessage::assistant_error(err.class().user_message()));
                TurnOutcome::Failed(err)
            }
        };
        Some(outcome)
    }

    /// Clears the backend's conversation state; the local transcript is kept and a notice
    /// is appended.
    pub async fn reset(&mut self) -> Result<(), ApiError> {
        self.client.reset_conversation().await?;
        self.messages.push(ChatMessage::assistant(RESET_NOTICE));
        Ok(())
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}
