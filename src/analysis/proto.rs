//! A light scanner for zipped `.proto` sources.
//!
//! It recognises the declarations the summaries need: messages (nested
//! ones included), their fields, service RPCs and the first HTTP verb bound
//! through `google.api.http`. It is not a full protobuf parser; unknown
//! constructs are skipped by brace matching.

use anyhow::{Context, Result};
use std::io::{Cursor, Read};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoMessage {
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoRpc {
    pub name: String,
    /// Lowercase verb from the first HTTP binding, if any.
    pub http_verb: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoDescription {
    pub messages: Vec<ProtoMessage>,
    pub rpcs: Vec<ProtoRpc>,
}

const HTTP_VERBS: [&str; 5] = ["get", "post", "put", "delete", "patch"];

#[derive(Debug, Clone, Copy)]
enum Scope {
    Message(usize),
    Oneof(usize),
    Service,
    Rpc(usize),
    Other,
}

impl ProtoDescription {
    /// Scans every `.proto` entry of a zip archive, in entry-name order.
    pub fn from_zip(data: &[u8]) -> Result<Self> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(data)).context("spec is not a zip archive")?;
        let mut sources = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if !entry.is_file() || !entry.name().ends_with(".proto") {
                continue;
            }
            let name = entry.name().to_string();
            let mut source = String::new();
            entry
                .read_to_string(&mut source)
                .with_context(|| format!("failed to read {name}"))?;
            sources.push((name, source));
        }
        sources.sort_by(|a, b| a.0.cmp(&b.0));

        let mut description = ProtoDescription::default();
        for (_, source) in &sources {
            description.scan(source);
        }
        Ok(description)
    }

    /// Adds the declarations found in one `.proto` source.
    pub fn scan(&mut self, source: &str) {
        let tokens = tokenize(source);
        let mut stack: Vec<Scope> = Vec::new();
        let mut rpc: Option<usize> = None;
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i].as_str();
            let next = tokens.get(i + 1).map(String::as_str).unwrap_or("");
            let opens = tokens.get(i + 2).map(String::as_str) == Some("{");
            let scope = stack.last().copied();
            match token {
                "message" if is_ident(next) && opens => {
                    self.messages.push(ProtoMessage {
                        name: next.to_string(),
                        fields: Vec::new(),
                    });
                    stack.push(Scope::Message(self.messages.len() - 1));
                    i += 3;
                    continue;
                }
                "service" if is_ident(next) && opens => {
                    stack.push(Scope::Service);
                    i += 3;
                    continue;
                }
                "oneof" if is_ident(next) && opens => {
                    let parent = match scope {
                        Some(Scope::Message(m)) | Some(Scope::Oneof(m)) => Some(m),
                        _ => None,
                    };
                    stack.push(parent.map_or(Scope::Other, Scope::Oneof));
                    i += 3;
                    continue;
                }
                "rpc" if matches!(scope, Some(Scope::Service)) && is_ident(next) => {
                    self.rpcs.push(ProtoRpc {
                        name: next.to_string(),
                        http_verb: None,
                    });
                    // Skip the request and response types up to the body or `;`.
                    let mut j = i + 2;
                    while j < tokens.len() && tokens[j] != "{" && tokens[j] != ";" {
                        j += 1;
                    }
                    if tokens.get(j).map(String::as_str) == Some("{") {
                        let index = self.rpcs.len() - 1;
                        stack.push(Scope::Rpc(index));
                        rpc = Some(index);
                    }
                    i = j + 1;
                    continue;
                }
                "{" => stack.push(Scope::Other),
                "}" => {
                    if let Some(Scope::Rpc(_)) = stack.pop() {
                        rpc = None;
                    }
                }
                "[" => {
                    // Field options never declare anything.
                    let mut depth = 0;
                    while i < tokens.len() {
                        match tokens[i].as_str() {
                            "[" => depth += 1,
                            "]" => depth -= 1,
                            _ => {}
                        }
                        if depth == 0 {
                            break;
                        }
                        i += 1;
                    }
                }
                "=" => {
                    if let Some(Scope::Message(m)) | Some(Scope::Oneof(m)) = scope {
                        let name = if i > 0 { tokens[i - 1].as_str() } else { "" };
                        let before = if i > 1 { tokens[i - 2].as_str() } else { "" };
                        if is_ident(name) && before != "option" && is_number(next) {
                            self.messages[m].fields.push(name.to_string());
                        }
                    }
                }
                verb if next == ":" && HTTP_VERBS.contains(&verb) => {
                    if let Some(index) = rpc {
                        let binding = &mut self.rpcs[index].http_verb;
                        if binding.is_none() {
                            *binding = Some(verb.to_string());
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }
}

fn is_ident(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

fn is_number(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Splits source into words and single-character symbols, dropping comments.
fn tokenize(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
        } else if c == '"' || c == '\'' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
            tokens.push(chars[start..i.min(chars.len())].iter().collect());
        } else if c.is_alphanumeric() || c == '_' || c == '.' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
            {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        } else {
            tokens.push(c.to_string());
            i += 1;
        }
    }
    tokens
}
