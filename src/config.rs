use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::DEFAULT_LOG_TAIL_LINES;
use crate::cli::CliArgs;
use crate::model::{SortKey, ViewKind};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct DashboardConfigFile {
    view: Option<String>,
    namespace: Option<String>,
    context: Option<String>,
    log_tail_lines: Option<i64>,
    exit_on_error: bool,
    sort: SortConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct SortConfig {
    nodes: Option<String>,
    pods: Option<String>,
    events: Option<String>,
}

/// Sort used whenever a list view is built fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDefaults {
    pub nodes: SortKey,
    pub pods: SortKey,
    pub events: SortKey,
}

impl Default for SortDefaults {
    fn default() -> Self {
        Self {
            nodes: ViewKind::Nodes.default_sort(),
            pods: ViewKind::Pods.default_sort(),
            events: ViewKind::Events.default_sort(),
        }
    }
}

impl SortDefaults {
    pub fn for_view(&self, kind: ViewKind) -> SortKey {
        match kind {
            ViewKind::Nodes => self.nodes,
            ViewKind::Pods | ViewKind::PodDetails => self.pods,
            ViewKind::Events | ViewKind::EventDetails => self.events,
        }
    }
}

/// Startup settings after merging the config file with the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source: Option<PathBuf>,
    pub view: ViewKind,
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub log_tail_lines: i64,
    pub exit_on_error: bool,
    pub sorts: SortDefaults,
}

impl Settings {
    pub fn load(args: &CliArgs) -> Result<Self> {
        let path = args.config.clone().or_else(discover_config_path);
        let file = match &path {
            Some(path) => read_config(path)?,
            None => DashboardConfigFile::default(),
        };
        Self::merge(args, file, path)
    }

    fn merge(args: &CliArgs, file: DashboardConfigFile, source: Option<PathBuf>) -> Result<Self> {
        let view = match args.view.as_deref().or(file.view.as_deref()) {
            Some(token) => ViewKind::from_token(token)
                .ok_or_else(|| anyhow!("unknown view {token:?}, expected nodes, pods or events"))?,
            None => ViewKind::Pods,
        };

        let log_tail_lines = file.log_tail_lines.unwrap_or(DEFAULT_LOG_TAIL_LINES);
        if log_tail_lines <= 0 {
            bail!("log_tail_lines must be positive, got {log_tail_lines}");
        }

        Ok(Self {
            source,
            view,
            namespace: args.namespace.clone().or(file.namespace),
            context: args.context.clone().or(file.context),
            kubeconfig: args.kubeconfig.clone(),
            log_tail_lines,
            exit_on_error: args.exit_on_error || file.exit_on_error,
            sorts: SortDefaults {
                nodes: parse_sort(ViewKind::Nodes, file.sort.nodes.as_deref())?,
                pods: parse_sort(ViewKind::Pods, file.sort.pods.as_deref())?,
                events: parse_sort(ViewKind::Events, file.sort.events.as_deref())?,
            },
        })
    }
}

fn parse_sort(kind: ViewKind, label: Option<&str>) -> Result<SortKey> {
    let Some(label) = label else {
        return Ok(kind.default_sort());
    };
    SortKey::from_label(label)
        .filter(|key| kind.sort_keys().contains(key))
        .ok_or_else(|| anyhow!("sort {label:?} is not available for the {kind} view"))
}

fn read_config(path: &Path) -> Result<DashboardConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dashboard config {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse dashboard config {}", path.display()))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBETOP_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kubetop.yaml"),
        PathBuf::from("kubetop.yml"),
        PathBuf::from(".kubetop.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let candidate = PathBuf::from(home).join(".config/kubetop/config.yaml");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}
