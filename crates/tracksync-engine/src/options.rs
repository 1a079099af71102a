use tracksync_domain::{fold_label, ResolverTier, SectionBucket};

pub const DEFAULT_SELECTED_BUCKETS: &[&str] = &[
    "Backlog",
    "In Progress",
    "Dev",
    "Stage",
    "Blocked",
    "Ready for Stage",
    "Findings",
];
pub const DEFAULT_SYNCABLE_BUCKETS: &[&str] = &[
    "Backlog",
    "In Progress",
    "Dev",
    "Stage",
    "Blocked",
    "Ready for Stage",
];
pub const DEFAULT_DISPLAY_ONLY_BUCKETS: &[&str] = &["Findings", "Done"];
pub const DEFAULT_REFERENCE_LABELS: &[&str] = &["Asana Task ID", "Asana ID", "Task ID"];

/// Which resolver tiers run, and how back-references are spotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub tiers: Vec<ResolverTier>,
    pub reference_labels: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            tiers: ResolverTier::ALL.to_vec(),
            reference_labels: owned(DEFAULT_REFERENCE_LABELS),
        }
    }
}

impl ResolverConfig {
    pub fn is_enabled(&self, tier: ResolverTier) -> bool {
        self.tiers.contains(&tier)
    }

    pub fn without_tier(mut self, tier: ResolverTier) -> Self {
        self.tiers.retain(|enabled| *enabled != tier);
        self
    }

    /// Enabled tiers in priority order, regardless of configured order.
    pub fn enabled_tiers(&self) -> Vec<ResolverTier> {
        ResolverTier::ALL
            .into_iter()
            .filter(|tier| self.is_enabled(*tier))
            .collect()
    }

    /// Label written into created issues so the next run can pair them.
    pub fn primary_reference_label(&self) -> &str {
        self.reference_labels
            .iter()
            .map(|label| label.trim())
            .find(|label| !label.is_empty())
            .unwrap_or(DEFAULT_REFERENCE_LABELS[0])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Buckets requested for this run; board records outside them are
    /// excluded before resolution.
    pub selected_buckets: Vec<String>,
    /// Buckets whose records are expected to exist on the issue tracker.
    pub syncable_buckets: Vec<String>,
    /// Buckets shown for information only.
    pub display_only_buckets: Vec<String>,
    pub resolver: ResolverConfig,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            selected_buckets: owned(DEFAULT_SELECTED_BUCKETS),
            syncable_buckets: owned(DEFAULT_SYNCABLE_BUCKETS),
            display_only_buckets: owned(DEFAULT_DISPLAY_ONLY_BUCKETS),
            resolver: ResolverConfig::default(),
        }
    }
}

impl ReconcileOptions {
    pub fn with_selected_buckets<S: AsRef<str>>(mut self, buckets: &[S]) -> Self {
        self.selected_buckets = buckets
            .iter()
            .map(|bucket| bucket.as_ref().trim().to_owned())
            .filter(|bucket| !bucket.is_empty())
            .collect();
        self
    }

    pub fn is_syncable(&self, bucket: &SectionBucket) -> bool {
        self.syncable_buckets
            .iter()
            .any(|name| bucket.is_named(name))
    }

    /// Every bucket the configuration knows about, first mention wins.
    pub fn known_buckets(&self) -> Vec<String> {
        let mut seen = Vec::<String>::new();
        let mut known = Vec::new();
        for bucket in self
            .selected_buckets
            .iter()
            .chain(&self.syncable_buckets)
            .chain(&self.display_only_buckets)
        {
            let folded = fold_label(bucket);
            if folded.is_empty() || seen.contains(&folded) {
                continue;
            }
            seen.push(folded);
            known.push(bucket.trim().to_owned());
        }
        known
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}
