//! Action options for install, upgrade and rollback operations

use std::path::PathBuf;

/// Options for install operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Canonical chart reference (`repo/chart`)
    pub chart: String,

    /// Chart version constraint
    pub version: String,

    /// Merged override values file
    pub values_file: Option<PathBuf>,

    /// Dry run mode (don't actually apply)
    pub dry_run: bool,
}

impl InstallOptions {
    /// Create install options with name and namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the chart and version constraint
    pub fn with_chart(mut self, chart: impl Into<String>, version: impl Into<String>) -> Self {
        self.chart = chart.into();
        self.version = version.into();
        self
    }

    /// Use a values file
    pub fn with_values(mut self, path: Option<PathBuf>) -> Self {
        self.values_file = path;
        self
    }

    /// Enable dry run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Options for upgrade operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Canonical chart reference (`repo/chart`)
    pub chart: String,

    /// Chart version constraint
    pub version: String,

    /// Merged override values file
    pub values_file: Option<PathBuf>,

    /// Replace resources that cannot be patched
    pub force: bool,

    /// Skip pre/post upgrade hooks
    pub no_hooks: bool,

    /// Block until resources are ready
    pub wait: bool,

    /// Dry run mode
    pub dry_run: bool,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: String::new(),
            chart: String::new(),
            version: String::new(),
            values_file: None,
            force: true,
            no_hooks: false,
            wait: false,
            dry_run: false,
        }
    }
}

impl UpgradeOptions {
    /// Create upgrade options; force replacement on, hooks on
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the chart and version constraint
    pub fn with_chart(mut self, chart: impl Into<String>, version: impl Into<String>) -> Self {
        self.chart = chart.into();
        self.version = version.into();
        self
    }

    /// Use a values file
    pub fn with_values(mut self, path: Option<PathBuf>) -> Self {
        self.values_file = path;
        self
    }

    /// Wait for resources to become ready
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Enable dry run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Options for rollback operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackOptions {
    /// Release name
    pub name: String,

    /// Namespace
    pub namespace: String,

    /// Target revision
    pub revision: u32,

    /// Force resource updates
    pub force: bool,

    /// Block until resources are ready
    pub wait: bool,

    /// Dry run mode
    pub dry_run: bool,
}

impl RollbackOptions {
    /// Create rollback options
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set target revision
    pub fn to_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// Enable force
    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Wait for resources to become ready
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Enable dry run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_options_builder() {
        let opts = InstallOptions::new("web", "apps")
            .with_chart("bitnami/nginx", ">0.0.0-0")
            .with_values(Some(PathBuf::from("/tmp/values.json")))
            .dry_run(true);

        assert_eq!(opts.name, "web");
        assert_eq!(opts.namespace, "apps");
        assert_eq!(opts.chart, "bitnami/nginx");
        assert!(opts.dry_run);
        assert!(opts.values_file.is_some());
    }

    #[test]
    fn test_upgrade_defaults_force_with_hooks() {
        let opts = UpgradeOptions::new("web", "apps");
        assert!(opts.force);
        assert!(!opts.no_hooks);
        assert!(!opts.dry_run);
    }

    #[test]
    fn test_rollback_options() {
        let opts = RollbackOptions::new("web", "apps").to_revision(3).with_force();
        assert_eq!(opts.revision, 3);
        assert!(opts.force);
    }
}
