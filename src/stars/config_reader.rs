use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use sprint_stars::PollRules;

use crate::stars::*;

pub const DEFAULT_SNAPSHOT_PATH: &str = "sprintstars-data.json";

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StarsConfig {
    #[serde(rename = "snapshotPath")]
    pub snapshot_path: Option<String>,
    #[serde(rename = "maxNominations")]
    pub max_nominations: Option<usize>,
    #[serde(rename = "autoClose")]
    pub auto_close: Option<bool>,
}

impl StarsConfig {
    pub fn rules(&self) -> StarsResult<PollRules> {
        let max_nominations = self
            .max_nominations
            .unwrap_or(PollRules::DEFAULT_RULES.max_nominations);
        ensure!(
            max_nominations >= 1,
            InvalidConfigSnafu {
                reason: "maxNominations must be at least 1"
            }
        );
        Ok(PollRules {
            max_nominations,
            auto_close: self
                .auto_close
                .unwrap_or(PollRules::DEFAULT_RULES.auto_close),
        })
    }
}

pub fn read_config(path: &str) -> StarsResult<StarsConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: StarsConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    info!("config: {:?}", config);
    Ok(config)
}

/// Where the snapshot lives.
///
/// The command line wins over the configuration file. A relative path in the configuration
/// file is relative to the directory of that file.
pub fn snapshot_path(
    data_arg: Option<&str>,
    config: &StarsConfig,
    config_path: Option<&str>,
) -> PathBuf {
    let res = match (data_arg, config.snapshot_path.as_deref()) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(p)) => {
            let root = config_path
                .and_then(|cp| Path::new(cp).parent())
                .map(|parent| parent.to_path_buf())
                .unwrap_or_default();
            root.join(p)
        }
        (None, None) => PathBuf::from(DEFAULT_SNAPSHOT_PATH),
    };
    debug!("snapshot_path: {:?}", res);
    res
}
