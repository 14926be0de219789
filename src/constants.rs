//! Shared defaults for the apg CLI.

/// Worker count used by bulk commands when `--jobs` is not given.
pub const DEFAULT_JOBS: usize = 10;

/// Number of tasks that may wait in a pool queue before `submit` blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Page size requested from list calls; 0 lets the server decide.
pub const DEFAULT_PAGE_SIZE: i32 = 0;

/// Location used when a name omits the `locations/<id>` segment.
pub const DEFAULT_LOCATION: &str = "global";

/// Name of the pointer file holding the active profile name.
pub const ACTIVE_CONFIG_FILE: &str = "active_config";

/// Overrides the profile directory (`~/.config/registry`).
pub const CONFIG_DIR_ENV: &str = "APG_CONFIG_DIR";

/// Prefix of external lint plugin executables.
pub const LINTER_PREFIX: &str = "registry-lint-";

/// Artifact relation for complexity summaries.
pub const COMPLEXITY_RELATION: &str = "complexity";

/// Artifact relation for vocabulary summaries.
pub const VOCABULARY_RELATION: &str = "vocabulary";

/// Fully qualified message names stored in artifact MIME types.
pub const COMPLEXITY_MESSAGE: &str = "gnostic.metrics.Complexity";
pub const VOCABULARY_MESSAGE: &str = "gnostic.metrics.Vocabulary";
pub const LINT_MESSAGE: &str = "google.cloud.apigeeregistry.v1.style.Lint";
