//! 共享数据模型

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 服务器/期望参数表
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// 归一化后的命令描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// 可执行文件名
    pub name: String,

    /// 参数列表
    #[serde(default)]
    pub args: Vec<String>,
}

impl Command {
    /// 创建命令
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// shell 形式：整行命令交给 `sh -c` 执行
    pub fn shell(line: &str) -> Self {
        Self {
            name: "sh".to_string(),
            args: vec!["-c".to_string(), line.to_string()],
        }
    }
}

/// 输出流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    #[default]
    Stdout,
    Stderr,
}

/// 命令输出快照（由命令动作写入 `command/<id>`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    #[serde(default)]
    pub stdout: String,

    #[serde(default)]
    pub stderr: String,
}

/// HTTP 响应快照（由请求动作写入 `response/<id>`）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseData {
    /// 状态行文本，如 "200 OK"
    pub status: String,

    /// 状态码
    pub status_code: u16,

    /// 协议版本，如 "HTTP/1.1"
    pub proto: String,

    /// 响应体（UTF-8 有损解码）
    pub body: String,

    /// 响应头（同名头合并为多值）
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_shell_form() {
        let command = Command::shell("echo hello && echo world");
        assert_eq!(command.name, "sh");
        assert_eq!(command.args, vec!["-c", "echo hello && echo world"]);
    }

    #[test]
    fn test_stream_kind_serde() {
        assert_eq!(
            serde_json::to_string(&StreamKind::Stderr).unwrap(),
            "\"stderr\""
        );
        let kind: StreamKind = serde_json::from_str("\"stdout\"").unwrap();
        assert_eq!(kind, StreamKind::Stdout);
    }

    #[test]
    fn test_response_data_roundtrip() {
        let response = ResponseData {
            status: "200 OK".to_string(),
            status_code: 200,
            proto: "HTTP/1.1".to_string(),
            body: "hello".to_string(),
            headers: HashMap::from([(
                "content-type".to_string(),
                vec!["text/plain".to_string()],
            )]),
        };
        let value = serde_json::to_value(&response).unwrap();
        let decoded: ResponseData = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.status_code, 200);
        assert_eq!(decoded.body, "hello");
    }
}
