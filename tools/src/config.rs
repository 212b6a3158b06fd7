use std::path::{Path, PathBuf};

use instance_sampler::SamplerConfig;
use log::warn;
use serde::Deserialize;

const DEFAULT_CONFIG_NAME: &str = "instance-sampler.toml";
const CONFIG_ENV: &str = "INSTANCE_SAMPLER_CONFIG";

#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub manifest: PathBuf,
    pub output: Option<PathBuf>,
    pub test_candidates: usize,
    pub sampler: SamplerConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("data/manifest.json"),
            output: None,
            test_candidates: instance_sampler::DEFAULT_TEST_CANDIDATES,
            sampler: SamplerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ToolConfigFile {
    manifest: Option<String>,
    output: Option<String>,
    test_candidates: Option<usize>,
    sampler: Option<SamplerConfig>,
}

impl ToolConfig {
    /// Config from `$INSTANCE_SAMPLER_CONFIG`, else `./instance-sampler.toml`,
    /// else defaults. `INSTANCE_SAMPLER_*` variables are applied last.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV)
            .map(|p| expand_path(&p))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        let mut cfg = Self::from_path(&path).unwrap_or_default();
        cfg.sampler = cfg.sampler.with_env_overrides();
        cfg.warn_if_invalid();
        cfg
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("tools config: cannot read {}: {err}", path.display());
                return None;
            }
        };
        Self::from_toml(&raw)
            .map_err(|err| warn!("tools config: cannot parse {}: {err}", path.display()))
            .ok()
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        let file: ToolConfigFile = toml::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: ToolConfigFile) -> Self {
        let defaults = Self::default();
        ToolConfig {
            manifest: file
                .manifest
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.manifest),
            output: file.output.map(|v| expand_path(&v)),
            test_candidates: file
                .test_candidates
                .filter(|n| *n > 0)
                .unwrap_or(defaults.test_candidates),
            sampler: file.sampler.unwrap_or_default(),
        }
    }

    fn warn_if_invalid(&self) {
        if self.manifest.as_os_str().is_empty() {
            warn!("tools config: manifest is empty; pass --manifest");
        }
        if let Err(err) = self.sampler.validate() {
            warn!("tools config: {err}");
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

/// Replace `${VAR}` with its value; unknown variables are left as written.
fn expand_env(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

