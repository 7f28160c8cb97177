//! 聊天
//!
//! 后端既可能返回一次性的 JSON，也可能返回 `text/event-stream`。
//! 事件流由空行分隔，每块中以 `data: ` 开头的行组成一个 JSON 帧。

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use surgence_core::{Result, SurgenceError};
use tracing::{debug, warn};

use crate::client::BackendClient;

/// 流中断或帧损坏时追加的唯一一条错误消息
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong.";

/// 帧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatFrameStatus {
    Waiting,
    #[serde(alias = "successful")]
    Success,
    Error,
}

/// 一个聊天帧 `{status, message}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub status: ChatFrameStatus,
    #[serde(default)]
    pub message: String,
}

/// 增量事件流解码器
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一段字节，返回其中已完整的帧
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<ChatFrame>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((end, separator)) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + separator).take(end).collect();
            if let Some(frame) = decode_block(&block)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// 流结束时处理缓冲区中没有以空行结尾的最后一块
    pub fn finish(&mut self) -> Result<Option<ChatFrame>> {
        let block = std::mem::take(&mut self.buffer);
        decode_block(&block)
    }
}

/// 找到第一个空行分隔符，返回 (块长度, 分隔符长度)
fn find_block_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn decode_block(block: &[u8]) -> Result<Option<ChatFrame>> {
    let text = std::str::from_utf8(block)
        .map_err(|e| SurgenceError::Stream(format!("Invalid UTF-8 in event: {}", e)))?;

    let data: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| payload.strip_prefix(' ').unwrap_or(payload))
        .collect();

    if data.is_empty() {
        return Ok(None);
    }

    let payload = data.join("\n");
    serde_json::from_str(&payload)
        .map(Some)
        .map_err(|e| SurgenceError::Stream(format!("Malformed chat frame: {}", e)))
}

/// 消息发送方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
    pub is_error: bool,
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Idle,
    Waiting,
    Success,
    Error,
}

/// 聊天记录与输入状态
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    status: ChatStatus,
    input_enabled: bool,
    /// 最近一条 waiting 帧的提示
    progress: Option<String>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            status: ChatStatus::Idle,
            input_enabled: true,
            progress: None,
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn progress(&self) -> Option<&str> {
        self.progress.as_deref()
    }

    /// 开始一轮对话：空白输入或正在等待回复时返回 `None`
    pub fn begin(&mut self, input: &str) -> Option<String> {
        let text = input.trim();
        if text.is_empty() || !self.input_enabled {
            return None;
        }

        self.messages.push(ChatMessage {
            text: text.to_string(),
            sender: Sender::User,
            is_error: false,
        });
        self.status = ChatStatus::Waiting;
        self.input_enabled = false;
        self.progress = None;
        Some(text.to_string())
    }

    /// 应用一个帧，返回该轮对话是否已结束
    pub fn apply(&mut self, frame: ChatFrame) -> bool {
        if self.input_enabled {
            debug!("Ignoring chat frame outside of an exchange");
            return true;
        }

        match frame.status {
            ChatFrameStatus::Waiting => {
                self.progress = Some(frame.message).filter(|m| !m.is_empty());
                false
            }
            ChatFrameStatus::Success => {
                self.finish(frame.message, false, ChatStatus::Success);
                true
            }
            ChatFrameStatus::Error => {
                self.finish(frame.message, true, ChatStatus::Error);
                true
            }
        }
    }

    /// 流中断或帧损坏：只追加一条错误消息并恢复输入
    pub fn fail(&mut self) {
        if self.input_enabled {
            return;
        }
        self.finish(FALLBACK_ERROR_MESSAGE.to_string(), true, ChatStatus::Error);
    }

    fn finish(&mut self, text: String, is_error: bool, status: ChatStatus) {
        self.messages.push(ChatMessage {
            text,
            sender: Sender::Bot,
            is_error,
        });
        self.status = status;
        self.input_enabled = true;
        self.progress = None;
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// 聊天客户端
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: BackendClient,
}

impl ChatClient {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// 发送一条消息，每次会话变化都会回调 `on_update`
    ///
    /// 所有错误都折叠进会话，不向调用方返回错误。
    pub async fn send<F>(&self, conversation: &mut Conversation, input: &str, mut on_update: F) -> ChatStatus
    where
        F: FnMut(&Conversation),
    {
        let Some(message) = conversation.begin(input) else {
            return conversation.status();
        };
        on_update(conversation);

        if let Err(e) = self.exchange(conversation, &message, &mut on_update).await {
            warn!("Chat exchange failed: {}", e);
        }

        // 没有收到终止帧也视为中断
        if !conversation.input_enabled() {
            conversation.fail();
            on_update(conversation);
        }
        conversation.status()
    }

    async fn exchange<F>(&self, conversation: &mut Conversation, message: &str, on_update: &mut F) -> Result<()>
    where
        F: FnMut(&Conversation),
    {
        let request = self
            .client
            .request(Method::POST, "chat/")
            .json(&ChatRequest { message });
        let mut response = self.client.send(request).await?;

        let streaming = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("text/event-stream"));

        if !streaming {
            let body = response
                .bytes()
                .await
                .map_err(|e| SurgenceError::Http(e.to_string()))?;
            let frame: ChatFrame =
                serde_json::from_slice(&body).map_err(|e| SurgenceError::Decode(e.to_string()))?;
            conversation.apply(frame);
            on_update(conversation);
            return Ok(());
        }

        let mut decoder = SseDecoder::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SurgenceError::Stream(e.to_string()))?
        {
            for frame in decoder.push(&chunk)? {
                let done = conversation.apply(frame);
                on_update(conversation);
                if done {
                    return Ok(());
                }
            }
        }

        if let Some(frame) = decoder.finish()? {
            conversation.apply(frame);
            on_update(conversation);
        }
        Ok(())
    }
}
