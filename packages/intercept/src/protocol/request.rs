// packages/intercept/src/protocol/request.rs
//! Request encoding and decoding

use crate::object::{Args, Value};
use crate::protocol::literal;
use crate::protocol::response::Response;
use crate::utils::config::{WireConfig, DEFAULT_SEPARATOR};
use crate::utils::errors::{InterceptError, Result};

/// Request command tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Import,
    GetAttr,
    SetAttr,
    Call,
}

impl RequestKind {
    pub fn tag(&self) -> &'static str {
        match self {
            RequestKind::Import => "IMPORT",
            RequestKind::GetAttr => "GETATTR",
            RequestKind::SetAttr => "SETATTR",
            RequestKind::Call => "CALL",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "IMPORT" => Some(RequestKind::Import),
            "GETATTR" => Some(RequestKind::GetAttr),
            "SETATTR" => Some(RequestKind::SetAttr),
            "CALL" => Some(RequestKind::Call),
            _ => None,
        }
    }
}

/// A request with its literal fields already encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Import {
        module: String,
    },
    GetAttr {
        owner: String,
        attr: String,
    },
    SetAttr {
        owner: String,
        attr: String,
        value: String,
    },
    Call {
        owner: String,
        attr: String,
        args: String,
        kwargs: String,
    },
}

impl Request {
    pub fn import(module: impl Into<String>) -> Self {
        Request::Import {
            module: module.into(),
        }
    }

    pub fn get_attr(owner: impl Into<String>, attr: impl Into<String>) -> Self {
        Request::GetAttr {
            owner: owner.into(),
            attr: attr.into(),
        }
    }

    pub fn set_attr(owner: impl Into<String>, attr: impl Into<String>, value: &Value) -> Self {
        Request::SetAttr {
            owner: owner.into(),
            attr: attr.into(),
            value: literal::encode_value(value),
        }
    }

    pub fn call(owner: impl Into<String>, attr: impl Into<String>, args: &Args) -> Self {
        let (args, kwargs) = literal::encode_call_args(args);
        Request::Call {
            owner: owner.into(),
            attr: attr.into(),
            args,
            kwargs,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Import { .. } => RequestKind::Import,
            Request::GetAttr { .. } => RequestKind::GetAttr,
            Request::SetAttr { .. } => RequestKind::SetAttr,
            Request::Call { .. } => RequestKind::Call,
        }
    }

    /// `SETATTR` is fire-and-forget
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Request::SetAttr { .. })
    }
}

/// Frames requests and parses responses
#[derive(Debug, Clone)]
pub struct WireCodec {
    separator: String,
}

impl WireCodec {
    pub fn new(separator: impl Into<String>) -> Result<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(InterceptError::Config(
                "separator must not be empty".to_string(),
            ));
        }
        Ok(Self { separator })
    }

    pub fn from_config(config: &WireConfig) -> Result<Self> {
        Self::new(config.separator.clone())
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Frame a request; separator text inside string literals is escaped
    pub fn encode(&self, request: &Request) -> String {
        let sep = &self.separator;
        let tag = request.kind().tag();
        let guard = |text: &str| literal::guard_separator(text, sep);
        match request {
            Request::Import { module } => format!("{}:{}", tag, module),
            Request::GetAttr { owner, attr } => format!("{}:{}{}{}", tag, owner, sep, attr),
            Request::SetAttr { owner, attr, value } => {
                format!("{}:{}{}{}{}{}", tag, owner, sep, attr, sep, guard(value.as_str()))
            }
            Request::Call {
                owner,
                attr,
                args,
                kwargs,
            } => format!(
                "{}:{}{}{}{}{}{}{}",
                tag,
                owner,
                sep,
                attr,
                sep,
                guard(args.as_str()),
                sep,
                guard(kwargs.as_str())
            ),
        }
    }

    /// Parse a framed request, as the remote side sees it
    pub fn decode_request(&self, text: &str) -> Result<Request> {
        let (tag, body) = text
            .split_once(':')
            .ok_or_else(|| InterceptError::Protocol(format!("missing command tag in '{}'", text)))?;
        let kind = RequestKind::from_tag(tag)
            .ok_or_else(|| InterceptError::Protocol(format!("unknown command tag '{}'", tag)))?;

        let field_count = match kind {
            RequestKind::Import => 1,
            RequestKind::GetAttr => 2,
            RequestKind::SetAttr => 3,
            RequestKind::Call => 4,
        };
        let fields: Vec<&str> = body.split(self.separator.as_str()).collect();
        if fields.len() > field_count {
            return Err(InterceptError::Protocol(format!(
                "{} request has separator text inside a field",
                tag
            )));
        }
        if fields.len() != field_count {
            return Err(InterceptError::Protocol(format!(
                "{} request needs {} fields, got {}",
                tag,
                field_count,
                fields.len()
            )));
        }

        let owned = |i: usize| fields[i].to_string();
        Ok(match kind {
            RequestKind::Import => Request::Import { module: owned(0) },
            RequestKind::GetAttr => Request::GetAttr {
                owner: owned(0),
                attr: owned(1),
            },
            RequestKind::SetAttr => Request::SetAttr {
                owner: owned(0),
                attr: owned(1),
                value: owned(2),
            },
            RequestKind::Call => Request::Call {
                owner: owned(0),
                attr: owned(1),
                args: owned(2),
                kwargs: owned(3),
            },
        })
    }

    pub fn decode_response(&self, text: &str) -> Result<Response> {
        Response::parse(text)
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}
