use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracksync_domain::{normalize_status, ResolverTier, TenantId};
use tracksync_engine::{
    default_state_map, ReconcileOptions, ResolverConfig, SyncPlanOptions,
    DEFAULT_DISPLAY_ONLY_BUCKETS, DEFAULT_REFERENCE_LABELS, DEFAULT_SELECTED_BUCKETS,
    DEFAULT_SYNCABLE_BUCKETS,
};

pub const ENV_TRACKSYNC_CONFIG: &str = "TRACKSYNC_CONFIG";

const DEFAULT_TRACKER_A_PROVIDER: &str = "tracker_a.snapshot";
const DEFAULT_TRACKER_B_PROVIDER: &str = "tracker_b.snapshot";
const DEFAULT_TENANT: &str = "default";
const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 300;
const MIN_SCHEDULER_INTERVAL_SECS: u64 = 10;
const MAX_SCHEDULER_INTERVAL_SECS: u64 = 86_400;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const MAX_FETCH_TIMEOUT_SECS: u64 = 600;
const DEFAULT_APPLY_CHANGES: bool = false;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TracksyncConfig {
    #[serde(default = "default_tracker_a_provider")]
    pub tracker_a_provider: String,
    #[serde(default = "default_tracker_b_provider")]
    pub tracker_b_provider: String,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    /// Log destination; stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    #[serde(default = "default_tenants")]
    pub tenants: Vec<String>,
    #[serde(default)]
    pub reconcile: ReconcileConfigToml,
    #[serde(default)]
    pub scheduler: SchedulerConfigToml,
    #[serde(default)]
    pub tracker_b: TrackerBConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileConfigToml {
    #[serde(default = "default_selected_buckets")]
    pub selected_buckets: Vec<String>,
    #[serde(default = "default_syncable_buckets")]
    pub syncable_buckets: Vec<String>,
    #[serde(default = "default_display_only_buckets")]
    pub display_only_buckets: Vec<String>,
    /// Enabled resolver tiers; order is ignored, priority is fixed.
    #[serde(default = "default_resolver_tiers")]
    pub resolver_tiers: Vec<String>,
    #[serde(default = "default_reference_labels")]
    pub reference_labels: Vec<String>,
}

impl Default for ReconcileConfigToml {
    fn default() -> Self {
        Self {
            selected_buckets: default_selected_buckets(),
            syncable_buckets: default_syncable_buckets(),
            display_only_buckets: default_display_only_buckets(),
            resolver_tiers: default_resolver_tiers(),
            reference_labels: default_reference_labels(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfigToml {
    #[serde(default = "default_scheduler_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_apply_changes")]
    pub apply_changes: bool,
}

impl Default for SchedulerConfigToml {
    fn default() -> Self {
        Self {
            interval_secs: default_scheduler_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            apply_changes: default_apply_changes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageStateMapEntry {
    pub stage: String,
    pub state: String,
}

impl StageStateMapEntry {
    pub fn new(stage: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            state: state.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerBConfigToml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_subsystem: Option<String>,
    #[serde(default = "default_stage_state_map")]
    pub state_map: Vec<StageStateMapEntry>,
    #[serde(default)]
    pub tag_map: BTreeMap<String, String>,
}

impl Default for TrackerBConfigToml {
    fn default() -> Self {
        Self {
            default_subsystem: None,
            state_map: default_stage_state_map(),
            tag_map: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelectionConfig {
    pub tracker_a_provider: String,
    pub tracker_b_provider: String,
    pub snapshot_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerRuntimeConfig {
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub apply_changes: bool,
}

impl TracksyncConfig {
    pub fn providers(&self) -> ProviderSelectionConfig {
        ProviderSelectionConfig {
            tracker_a_provider: self.tracker_a_provider.clone(),
            tracker_b_provider: self.tracker_b_provider.clone(),
            snapshot_dir: PathBuf::from(&self.snapshot_dir),
        }
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.iter().map(TenantId::new).collect()
    }

    pub fn scheduler_runtime(&self) -> SchedulerRuntimeConfig {
        SchedulerRuntimeConfig {
            interval: Duration::from_secs(self.scheduler.interval_secs),
            fetch_timeout: Duration::from_secs(self.scheduler.fetch_timeout_secs),
            apply_changes: self.scheduler.apply_changes,
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            selected_buckets: self.reconcile.selected_buckets.clone(),
            syncable_buckets: self.reconcile.syncable_buckets.clone(),
            display_only_buckets: self.reconcile.display_only_buckets.clone(),
            resolver: ResolverConfig {
                tiers: self
                    .reconcile
                    .resolver_tiers
                    .iter()
                    .filter_map(|key| ResolverTier::from_key(key))
                    .collect(),
                reference_labels: self.reconcile.reference_labels.clone(),
            },
        }
    }

    pub fn sync_plan_options(&self) -> SyncPlanOptions {
        let reference_label = self
            .reconcile_options()
            .resolver
            .primary_reference_label()
            .to_owned();
        SyncPlanOptions {
            state_map: self
                .tracker_b
                .state_map
                .iter()
                .map(|entry| (normalize_status(&entry.stage), entry.state.clone()))
                .collect(),
            tag_map: self.tracker_b.tag_map.clone(),
            reference_label,
            default_subsystem: self.tracker_b.default_subsystem.clone(),
        }
    }
}

pub fn load_from_env() -> Result<TracksyncConfig, ConfigError> {
    let path = config_path_from_env()?;
    load_from_path(path)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<TracksyncConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = home_dir()
        .ok_or_else(|| ConfigError::configuration("Unable to resolve home directory from HOME"))?;
    Ok(home.join(".config").join("tracksync").join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_TRACKSYNC_CONFIG) {
        Ok(raw) if !raw.trim().is_empty() => Ok(PathBuf::from(raw.trim())),
        Ok(_) | Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::configuration(format!(
            "{ENV_TRACKSYNC_CONFIG} contained invalid UTF-8"
        ))),
    }
}

fn home_dir() -> Option<PathBuf> {
    non_blank_env_path("HOME")
}

fn non_blank_env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn default_tracker_a_provider() -> String {
    DEFAULT_TRACKER_A_PROVIDER.to_owned()
}

fn default_tracker_b_provider() -> String {
    DEFAULT_TRACKER_B_PROVIDER.to_owned()
}

/// `$XDG_DATA_HOME/tracksync/snapshots`, else under `~/.local/share`.
/// Relative data dirs are ignored.
fn default_snapshot_dir() -> String {
    let data_dir = non_blank_env_path("XDG_DATA_HOME")
        .filter(|path| path.is_absolute())
        .or_else(|| home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir);
    data_dir
        .join("tracksync")
        .join("snapshots")
        .to_string_lossy()
        .to_string()
}

fn default_tenants() -> Vec<String> {
    vec![DEFAULT_TENANT.to_owned()]
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

fn default_selected_buckets() -> Vec<String> {
    owned(DEFAULT_SELECTED_BUCKETS)
}

fn default_syncable_buckets() -> Vec<String> {
    owned(DEFAULT_SYNCABLE_BUCKETS)
}

fn default_display_only_buckets() -> Vec<String> {
    owned(DEFAULT_DISPLAY_ONLY_BUCKETS)
}

fn default_resolver_tiers() -> Vec<String> {
    ResolverTier::ALL
        .iter()
        .map(|tier| tier.as_key().to_owned())
        .collect()
}

fn default_reference_labels() -> Vec<String> {
    owned(DEFAULT_REFERENCE_LABELS)
}

fn default_scheduler_interval_secs() -> u64 {
    DEFAULT_SCHEDULER_INTERVAL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_apply_changes() -> bool {
    DEFAULT_APPLY_CHANGES
}

fn default_stage_state_map() -> Vec<StageStateMapEntry> {
    default_state_map()
        .into_iter()
        .map(|(stage, state)| StageStateMapEntry::new(stage.label(), state))
        .collect()
}

impl Default for TracksyncConfig {
    fn default() -> Self {
        Self {
            tracker_a_provider: default_tracker_a_provider(),
            tracker_b_provider: default_tracker_b_provider(),
            snapshot_dir: default_snapshot_dir(),
            log_file: None,
            tenants: default_tenants(),
            reconcile: ReconcileConfigToml::default(),
            scheduler: SchedulerConfigToml::default(),
            tracker_b: TrackerBConfigToml::default(),
        }
    }
}

/// Writes `config` as TOML, creating the parent directory when needed.
pub fn persist_config(path: &Path, config: &TracksyncConfig) -> Result<(), ConfigError> {
    let io_error = |action: &str, err: std::io::Error| {
        ConfigError::configuration(format!(
            "Failed to {action} tracksync config at {}: {err}",
            path.display()
        ))
    };

    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!("Failed to serialize tracksync config: {err}"))
    })?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| io_error("create the directory of", err))?;
    }
    std::fs::write(path, rendered).map_err(|err| io_error("write", err))
}

/// A missing file is created with defaults; an existing one is normalized
/// and rewritten only when normalization changed something.
fn load_or_create_config(path: &Path) -> Result<TracksyncConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let config = TracksyncConfig::default();
            persist_config(path, &config)?;
            return Ok(config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read tracksync config at {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: TracksyncConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse tracksync config at {}: {err}",
            path.display()
        ))
    })?;
    if normalize_config(&mut config)? {
        persist_config(path, &config)?;
    }
    Ok(config)
}

/// Returns whether anything was rewritten, so the caller can persist the
/// canonical form.
pub fn normalize_config(config: &mut TracksyncConfig) -> Result<bool, ConfigError> {
    let mut changed = false;

    changed |= normalize_provider_selection(
        &mut config.tracker_a_provider,
        DEFAULT_TRACKER_A_PROVIDER,
        "tracker_a_provider",
        "tracker_a",
    )?;
    changed |= normalize_provider_selection(
        &mut config.tracker_b_provider,
        DEFAULT_TRACKER_B_PROVIDER,
        "tracker_b_provider",
        "tracker_b",
    )?;
    changed |= trim_or_default(&mut config.snapshot_dir, default_snapshot_dir);

    if let Some(log_file) = config.log_file.as_mut() {
        changed |= trim_or_default(log_file, String::new);
        if log_file.is_empty() {
            config.log_file = None;
            changed = true;
        }
    }

    changed |= normalize_string_vec(&mut config.tenants);
    let mut seen = std::collections::BTreeSet::new();
    let before = config.tenants.len();
    config.tenants.retain(|tenant| seen.insert(tenant.clone()));
    changed |= before != config.tenants.len();
    if config.tenants.is_empty() {
        config.tenants = default_tenants();
        changed = true;
    }

    changed |= normalize_reconcile_config(&mut config.reconcile)?;
    changed |= normalize_scheduler_config(&mut config.scheduler);
    changed |= normalize_tracker_b_config(&mut config.tracker_b);

    Ok(changed)
}

pub fn normalize_reconcile_config(config: &mut ReconcileConfigToml) -> Result<bool, ConfigError> {
    let mut changed = false;

    changed |= normalize_bucket_list(&mut config.selected_buckets, default_selected_buckets);
    changed |= normalize_bucket_list(&mut config.syncable_buckets, default_syncable_buckets);
    // An empty display-only list is a valid choice.
    changed |= normalize_string_vec(&mut config.display_only_buckets);
    changed |= normalize_bucket_list(&mut config.reference_labels, default_reference_labels);

    let mut tiers = Vec::with_capacity(config.resolver_tiers.len());
    for raw in &config.resolver_tiers {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tier = ResolverTier::from_key(trimmed).ok_or_else(|| {
            let known = ResolverTier::ALL
                .iter()
                .map(|tier| format!("`{}`", tier.as_key()))
                .collect::<Vec<_>>()
                .join(", ");
            ConfigError::configuration(format!(
                "Invalid `reconcile.resolver_tiers` entry '{trimmed}' in TRACKSYNC_CONFIG: expected one of {known}."
            ))
        })?;
        if !tiers.contains(&tier) {
            tiers.push(tier);
        }
    }
    tiers.sort();
    let canonical = tiers
        .iter()
        .map(|tier| tier.as_key().to_owned())
        .collect::<Vec<_>>();
    if config.resolver_tiers != canonical {
        config.resolver_tiers = canonical;
        changed = true;
    }

    Ok(changed)
}

pub fn normalize_scheduler_config(config: &mut SchedulerConfigToml) -> bool {
    let mut changed = false;

    let interval = config
        .interval_secs
        .clamp(MIN_SCHEDULER_INTERVAL_SECS, MAX_SCHEDULER_INTERVAL_SECS);
    if interval != config.interval_secs {
        config.interval_secs = interval;
        changed = true;
    }
    if config.fetch_timeout_secs == 0 {
        config.fetch_timeout_secs = default_fetch_timeout_secs();
        changed = true;
    }
    let timeout = config.fetch_timeout_secs.min(MAX_FETCH_TIMEOUT_SECS);
    if timeout != config.fetch_timeout_secs {
        config.fetch_timeout_secs = timeout;
        changed = true;
    }

    changed
}

pub fn normalize_tracker_b_config(config: &mut TrackerBConfigToml) -> bool {
    let mut changed = false;

    if let Some(subsystem) = config.default_subsystem.as_mut() {
        changed |= trim_or_default(subsystem, String::new);
        if subsystem.is_empty() {
            config.default_subsystem = None;
            changed = true;
        }
    }

    for entry in &mut config.state_map {
        changed |= trim_or_default(&mut entry.stage, String::new);
        changed |= trim_or_default(&mut entry.state, String::new);
    }
    let before = config.state_map.len();
    config
        .state_map
        .retain(|entry| !entry.stage.is_empty() && !entry.state.is_empty());
    changed |= before != config.state_map.len();
    if config.state_map.is_empty() {
        config.state_map = default_stage_state_map();
        changed = true;
    }

    let normalized = config
        .tag_map
        .iter()
        .map(|(tag, subsystem)| (tag.trim().to_owned(), subsystem.trim().to_owned()))
        .filter(|(tag, subsystem)| !tag.is_empty() && !subsystem.is_empty())
        .collect::<BTreeMap<_, _>>();
    if normalized != config.tag_map {
        config.tag_map = normalized;
        changed = true;
    }

    changed
}

fn normalize_provider_selection(
    value: &mut String,
    default: &str,
    field_name: &str,
    provider_namespace: &str,
) -> Result<bool, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase();
    let canonical = if normalized.is_empty() {
        default.to_owned()
    } else {
        normalized
    };
    let expected_prefix = format!("{provider_namespace}.");

    if !canonical.starts_with(expected_prefix.as_str()) {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in TRACKSYNC_CONFIG: provider keys must be namespaced under `{expected_prefix}*` (for example `{default}`)."
        )));
    }
    let suffix = canonical[expected_prefix.len()..].trim();
    if suffix.is_empty()
        || suffix.split('.').any(|segment| {
            segment.is_empty()
                || !segment.chars().all(|ch| {
                    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-'
                })
        })
    {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in TRACKSYNC_CONFIG: expected format `{provider_namespace}.<provider_key>` where each key segment contains only lowercase letters, digits, `_`, or `-`."
        )));
    }

    if *value != canonical {
        *value = canonical;
        return Ok(true);
    }

    Ok(false)
}

/// Trims `value`, falling back to `default()` when nothing is left.
fn trim_or_default(value: &mut String, default: impl FnOnce() -> String) -> bool {
    let trimmed = value.trim();
    let next = if trimmed.is_empty() {
        default()
    } else {
        trimmed.to_owned()
    };
    if next == *value {
        return false;
    }
    *value = next;
    true
}

fn normalize_string_vec(values: &mut Vec<String>) -> bool {
    let normalized = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect::<Vec<_>>();
    if *values != normalized {
        *values = normalized;
        return true;
    }
    false
}

/// Trims entries and falls back to `default` when nothing usable is left.
fn normalize_bucket_list(values: &mut Vec<String>, default: fn() -> Vec<String>) -> bool {
    let mut changed = normalize_string_vec(values);
    if values.is_empty() {
        *values = default();
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tracksync_domain::CanonicalStage;
    use std::sync::{Mutex, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env_vars<F>(vars: &[(&str, Option<&str>)], test: F)
    where
        F: FnOnce(),
    {
        let _guard = env_lock().lock().expect("env lock");
        let backup = vars
            .iter()
            .map(|(name, _)| ((*name).to_owned(), std::env::var(name).ok()))
            .collect::<Vec<_>>();

        for (name, value) in vars {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }

        test();

        for (name, value) in backup {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "tracksync-config-{prefix}-{nanos}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("create temp dir");
        path
    }

    fn remove_temp_path(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    fn write_config_file(path: &Path, raw: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture config parent");
        }
        std::fs::write(path, raw.as_bytes()).expect("write fixture config");
    }

    #[test]
    fn load_from_env_creates_default_config_when_missing() {
        let home = unique_temp_dir("home-defaults");
        let expected = home.join(".config").join("tracksync").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                (ENV_TRACKSYNC_CONFIG, None),
                ("XDG_DATA_HOME", None),
            ],
            || {
                let config = load_from_env().expect("load defaults");
                assert_eq!(
                    PathBuf::from(&config.snapshot_dir),
                    home.join(".local")
                        .join("share")
                        .join("tracksync")
                        .join("snapshots")
                );
                assert_eq!(config.tracker_a_provider, "tracker_a.snapshot");
                assert_eq!(config.tracker_b_provider, "tracker_b.snapshot");
                assert_eq!(config.tenants, vec!["default".to_owned()]);
                assert_eq!(config.scheduler.interval_secs, 300);
                assert!(!config.scheduler.apply_changes);
                assert!(expected.exists());
            },
        );

        remove_temp_path(&home);
    }

    #[test]
    fn load_from_env_honors_explicit_config_path() {
        let home = unique_temp_dir("home-explicit-path");
        let root = unique_temp_dir("explicit-path");
        let explicit = root.join("nested").join("custom.toml");
        let default = home.join(".config").join("tracksync").join("config.toml");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                (
                    ENV_TRACKSYNC_CONFIG,
                    Some(explicit.to_str().expect("config path")),
                ),
                ("XDG_DATA_HOME", None),
            ],
            || {
                load_from_env().expect("load explicit path config");
                assert!(explicit.exists());
                assert!(!default.exists());
            },
        );

        remove_temp_path(&home);
        remove_temp_path(&root);
    }

    #[test]
    fn default_snapshot_dir_uses_absolute_xdg_data_home_only() {
        let data = unique_temp_dir("xdg-data");
        let home = unique_temp_dir("xdg-home");

        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("XDG_DATA_HOME", Some(data.to_str().expect("data path"))),
            ],
            || {
                assert_eq!(
                    PathBuf::from(default_snapshot_dir()),
                    data.join("tracksync").join("snapshots")
                );
            },
        );
        with_env_vars(
            &[
                ("HOME", Some(home.to_str().expect("home path"))),
                ("XDG_DATA_HOME", Some("relative/data")),
            ],
            || {
                assert!(PathBuf::from(default_snapshot_dir()).starts_with(&home));
            },
        );

        remove_temp_path(&data);
        remove_temp_path(&home);
    }

    #[test]
    fn load_from_path_rejects_provider_keys_outside_their_namespace() {
        let root = unique_temp_dir("wrong-namespace");
        let path = root.join("config.toml");
        write_config_file(&path, "tracker_a_provider = 'tracker_b.snapshot'\n");

        let error = load_from_path(&path).expect_err("wrong namespace should be rejected");
        let detail = error.to_string();
        assert!(detail.contains("tracker_a_provider"));
        assert!(detail.contains("tracker_a.*"));

        remove_temp_path(&root);
    }

    #[test]
    fn load_from_path_rejects_malformed_namespaced_provider_key() {
        let root = unique_temp_dir("malformed-provider-key");
        let path = root.join("config.toml");
        write_config_file(&path, "tracker_b_provider = 'tracker_b.'\n");

        let error = load_from_path(&path).expect_err("malformed provider key should be rejected");
        assert!(error
            .to_string()
            .contains("expected format `tracker_b.<provider_key>`"));

        remove_temp_path(&root);
    }

    #[test]
    fn load_from_path_rejects_unknown_resolver_tier() {
        let root = unique_temp_dir("unknown-tier");
        let path = root.join("config.toml");
        write_config_file(
            &path,
            "[reconcile]\nresolver_tiers = ['explicit_mapping', 'fuzzy_title']\n",
        );

        let error = load_from_path(&path).expect_err("unknown tier should be rejected");
        assert!(error.to_string().contains("fuzzy_title"));

        remove_temp_path(&root);
    }

    #[test]
    fn load_from_path_returns_parse_error_for_invalid_toml() {
        let root = unique_temp_dir("invalid");
        let path = root.join("config.toml");
        write_config_file(&path, "snapshot_dir = [\n");

        let error = load_from_path(&path).expect_err("expected parse failure");
        assert!(error
            .to_string()
            .contains("Failed to parse TRACKSYNC_CONFIG"));

        remove_temp_path(&root);
    }

    #[test]
    fn normalization_is_persisted_back_to_disk() {
        let root = unique_temp_dir("normalization");
        let path = root.join("config.toml");
        write_config_file(
            &path,
            r#"
tracker_a_provider = "  TRACKER_A.Memory "
snapshot_dir = "  /srv/snapshots  "
log_file = "   "
tenants = [" acme ", "", "acme"]

[reconcile]
selected_buckets = ["  ", " Dev "]
resolver_tiers = ["normalized_title", "explicit_mapping", "normalized_title"]

[scheduler]
interval_secs = 1
fetch_timeout_secs = 0

[[tracker_b.state_map]]
stage = " Dev "
state = "In Development"

[[tracker_b.state_map]]
stage = "Stage"
state = "  "

[tracker_b.tag_map]
" Payments " = " billing "
"#,
        );

        let config = load_from_path(&path).expect("load and normalize");
        assert_eq!(config.tracker_a_provider, "tracker_a.memory");
        assert_eq!(config.snapshot_dir, "/srv/snapshots");
        assert_eq!(config.log_file, None);
        assert_eq!(config.tenants, vec!["acme".to_owned()]);
        assert_eq!(config.reconcile.selected_buckets, vec!["Dev".to_owned()]);
        assert_eq!(
            config.reconcile.resolver_tiers,
            vec!["explicit_mapping".to_owned(), "normalized_title".to_owned()]
        );
        assert_eq!(config.scheduler.interval_secs, 10);
        assert_eq!(config.scheduler.fetch_timeout_secs, 30);
        assert_eq!(
            config.tracker_b.state_map,
            vec![StageStateMapEntry::new("Dev", "In Development")]
        );
        assert_eq!(
            config.tracker_b.tag_map.get("Payments").map(String::as_str),
            Some("billing")
        );

        let reloaded: TracksyncConfig =
            toml::from_str(&std::fs::read_to_string(&path).expect("read persisted config"))
                .expect("parse persisted config");
        assert_eq!(reloaded, config);

        remove_temp_path(&root);
    }

    #[test]
    fn runtime_views_feed_engine_options() {
        let mut config = TracksyncConfig::default();
        config.reconcile.resolver_tiers = vec!["explicit_mapping".to_owned()];
        config.reconcile.reference_labels = vec!["Board Ref".to_owned()];
        config.tracker_b.state_map = vec![StageStateMapEntry::new("in dev", "Development")];

        let options = config.reconcile_options();
        assert_eq!(options.resolver.enabled_tiers(), vec![ResolverTier::ExplicitMapping]);
        assert_eq!(options.selected_buckets, config.reconcile.selected_buckets);

        let plan = config.sync_plan_options();
        assert_eq!(plan.reference_label, "Board Ref");
        assert_eq!(plan.state_for(&CanonicalStage::Dev), Some("Development"));

        let scheduler = config.scheduler_runtime();
        assert_eq!(scheduler.interval, Duration::from_secs(300));
        assert_eq!(scheduler.fetch_timeout, Duration::from_secs(30));
    }
}
