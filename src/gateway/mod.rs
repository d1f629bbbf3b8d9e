// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway
//!
//! Every protected client request goes through a single endpoint and names
//! what it wants with an opaque target code. Codes are parsed into the closed
//! [`Target`] enum; [`Dispatcher::dispatch`] produces the plaintext
//! [`Payload`], which the HTTP layer then seals into an envelope.
//!
//! | code | parameter                   | payload                       |
//! |------|-----------------------------|-------------------------------|
//! | `a1` |                             | main menu                     |
//! | `b2` | `p`: module (`d8a7f1`)      | module action menu            |
//! | `c3` |                             | feed URLs                     |
//! | `d4` | `p`: `u1` / `w1`            | valid rounds                  |
//! | `e5` |                             | client secret `{key, value}`  |
//! | `f6` |                             | auxiliary secret              |
//! | `g7` | `params`                    | sorted keys plus `"secret"`   |

pub mod rounds;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{ClientSecrets, FeedUrls};
use crate::models::GatewayRequest;

pub use rounds::{RoundError, RoundKind, RoundSource, ShopFeedClient, ValidRound};

pub const MAIN_MENU: [&str; 4] = ["转盘", "转盘v2", "玉米农场", "退出"];

pub const TURNTABLE_MENU: [&str; 7] = [
    "获取并添加所有转盘信息",
    "添加单个转盘",
    "删除单个转盘",
    "领取所有转盘次数",
    "现在抽",
    "零点抽",
    "返回上一级",
];

/// Always present in a `g7` answer.
pub const PARAM_KEYS_SENTINEL: &str = "secret";

/// Client modules with an action menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Turntable,
}

impl Module {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "d8a7f1" => Some(Module::Turntable),
            _ => None,
        }
    }

    pub fn menu(&self) -> &'static [&'static str] {
        match self {
            Module::Turntable => &TURNTABLE_MENU,
        }
    }
}

/// A parsed gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    MainMenu,
    ModuleMenu(Module),
    FeedUrls,
    Rounds(RoundKind),
    ClientSecret,
    AuxiliarySecret,
    SortedParamKeys(HashMap<String, String>),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    #[error("missing '{field}' for target '{target}'")]
    MissingParam { target: &'static str, field: &'static str },

    #[error("unknown {kind} parameter '{value}'")]
    UnknownParam { kind: &'static str, value: String },

    #[error(transparent)]
    Rounds(#[from] RoundError),
}

fn required_param(request: &mut GatewayRequest, target: &'static str) -> Result<String, GatewayError> {
    request
        .param
        .take()
        .filter(|p| !p.is_empty())
        .ok_or(GatewayError::MissingParam { target, field: "p" })
}

impl TryFrom<GatewayRequest> for Target {
    type Error = GatewayError;

    fn try_from(mut request: GatewayRequest) -> Result<Self, Self::Error> {
        match request.target.as_str() {
            "a1" => Ok(Target::MainMenu),
            "b2" => {
                let code = required_param(&mut request, "b2")?;
                Module::from_code(&code)
                    .map(Target::ModuleMenu)
                    .ok_or(GatewayError::UnknownParam {
                        kind: "module",
                        value: code,
                    })
            }
            "c3" => Ok(Target::FeedUrls),
            "d4" => {
                let code = required_param(&mut request, "d4")?;
                RoundKind::from_code(&code)
                    .map(Target::Rounds)
                    .ok_or(GatewayError::UnknownParam {
                        kind: "round",
                        value: code,
                    })
            }
            "e5" => Ok(Target::ClientSecret),
            "f6" => Ok(Target::AuxiliarySecret),
            "g7" => request
                .params
                .take()
                .map(Target::SortedParamKeys)
                .ok_or(GatewayError::MissingParam {
                    target: "g7",
                    field: "params",
                }),
            _ => Err(GatewayError::UnknownTarget(request.target)),
        }
    }
}

/// Plaintext answer for a target, serialized as bare JSON.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Payload {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Text(String),
    Rounds(Vec<ValidRound>),
}

impl Payload {
    fn list(items: &[&str]) -> Self {
        Payload::List(items.iter().map(|s| s.to_string()).collect())
    }
}

/// Keys of `params` plus the sentinel, sorted.
pub fn sorted_param_keys(params: HashMap<String, String>) -> Vec<String> {
    let mut keys: Vec<String> = params.into_keys().collect();
    keys.push(PARAM_KEYS_SENTINEL.to_string());
    keys.sort();
    keys
}

/// Answers gateway targets.
pub struct Dispatcher {
    feeds: FeedUrls,
    secrets: ClientSecrets,
    rounds: Arc<dyn RoundSource>,
}

impl Dispatcher {
    pub fn new(feeds: FeedUrls, secrets: ClientSecrets, rounds: Arc<dyn RoundSource>) -> Self {
        Self {
            feeds,
            secrets,
            rounds,
        }
    }

    pub async fn dispatch(&self, target: Target) -> Result<Payload, GatewayError> {
        let payload = match target {
            Target::MainMenu => Payload::list(&MAIN_MENU),
            Target::ModuleMenu(module) => Payload::list(module.menu()),
            Target::FeedUrls => Payload::Map(BTreeMap::from([
                ("products".to_string(), self.feeds.products.to_string()),
                ("round".to_string(), self.feeds.round.to_string()),
                ("universal".to_string(), self.feeds.universal.to_string()),
                ("wanneng".to_string(), self.feeds.wanneng.to_string()),
            ])),
            Target::Rounds(kind) => Payload::Rounds(self.rounds.valid_rounds(kind).await?),
            Target::ClientSecret => Payload::Map(BTreeMap::from([
                ("key".to_string(), self.secrets.key.clone()),
                ("value".to_string(), self.secrets.value.clone()),
            ])),
            Target::AuxiliarySecret => Payload::Text(self.secrets.auxiliary.clone()),
            Target::SortedParamKeys(params) => Payload::List(sorted_param_keys(params)),
        };
        Ok(payload)
    }
}
