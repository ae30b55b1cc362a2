//! Run configuration, read once from environment-style key/value pairs.

use std::{fmt, num::NonZeroU32, str::FromStr};

use crate::{
    chunk::{NORMAL_READ_CHUNK_SIZE, VECSUM_CHUNK_SIZE, ZCR_READ_CHUNK_SIZE},
    Error,
};

pub const PATH_KEY: &str = "VECSUM_PATH";
pub const PASSES_KEY: &str = "VECSUM_PASSES";
pub const TYPE_KEY: &str = "VECSUM_TYPE";
pub const RPC_ADDRESS_KEY: &str = "VECSUM_RPC_ADDRESS";

pub const DEFAULT_RPC_ADDRESS: &str = "default";

/// Which read strategy a run uses.
/// Serialized under the same names `Display` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BackendKind {
    #[serde(rename = "standard")]
    StandardRead,
    #[serde(rename = "zerocopy")]
    ZeroCopy,
    #[serde(rename = "local")]
    LocalMap,
}

impl BackendKind {
    pub const VALID_VALUES: &'static str = "standard, zerocopy, or local";

    /// The chunk size the file length has to be a multiple of.
    pub fn chunk_size(self) -> usize {
        match self {
            BackendKind::StandardRead => NORMAL_READ_CHUNK_SIZE,
            BackendKind::ZeroCopy => ZCR_READ_CHUNK_SIZE,
            BackendKind::LocalMap => VECSUM_CHUNK_SIZE,
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "libhdfs" => Ok(BackendKind::StandardRead),
            "zerocopy" | "zcr" => Ok(BackendKind::ZeroCopy),
            "local" => Ok(BackendKind::LocalMap),
            _ => Err(Error::Config(format!(
                "invalid {TYPE_KEY} {s:?}, valid values are {}",
                Self::VALID_VALUES
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::StandardRead => "standard",
            BackendKind::ZeroCopy => "zerocopy",
            BackendKind::LocalMap => "local",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Config {
    /// The file to read.
    pub path: String,
    /// How many times to read it.
    pub passes: NonZeroU32,
    pub backend: BackendKind,
    /// Remote endpoint; ignored by [`BackendKind::LocalMap`].
    pub rpc_address: String,
}

impl Config {
    /// Build from any key/value source. Keys are the `*_KEY` constants of this module.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup(PATH_KEY).ok_or_else(|| {
            Error::Config(format!(
                "you must set {PATH_KEY} to the path of the file to read"
            ))
        })?;
        let passes = lookup(PASSES_KEY).ok_or_else(|| {
            Error::Config(format!(
                "you must set {PASSES_KEY} to the number of passes to make"
            ))
        })?;
        let passes = passes.trim().parse::<NonZeroU32>().map_err(|e| {
            Error::Config(format!(
                "invalid {PASSES_KEY} {passes:?}, must be a number greater than 0: {e}"
            ))
        })?;
        let backend = lookup(TYPE_KEY)
            .ok_or_else(|| {
                Error::Config(format!(
                    "you must set {TYPE_KEY} to {}",
                    BackendKind::VALID_VALUES
                ))
            })?
            .parse()?;
        let rpc_address =
            lookup(RPC_ADDRESS_KEY).unwrap_or_else(|| DEFAULT_RPC_ADDRESS.to_owned());
        Ok(Config {
            path,
            passes,
            backend,
            rpc_address,
        })
    }
}

/// Look up `key` in the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
}
