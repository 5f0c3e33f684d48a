pub const APP_NAME: &str = "nimbus";

/// Default upper bound for provider-facing resource names.
pub const DEFAULT_MAX_LENGTH: usize = 55;

/// Number of hex characters appended to names that had to be truncated.
pub const HASH_SUFFIX_LEN: usize = 4;

/// Separator used for physical resource names.
pub const NAME_SEPARATOR: char = '-';

/// Separator used for environment variable keys.
pub const ENV_SEPARATOR: char = '_';

/// Stage used when neither `NIMBUS_STAGE` nor a user name is available.
pub const DEFAULT_STAGE: &str = "dev";

/// Project name used when `NIMBUS_PROJECT` is not set.
pub const DEFAULT_PROJECT: &str = "app";

/// Directory (relative to the working directory) that receives synthesized output.
pub const DEFAULT_OUT_DIR: &str = ".nimbus";

/// Policy language version written into every permission document.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Property that receives a principal's policy document unless configured otherwise.
pub const DEFAULT_POLICY_PROPERTY: &str = "policy";
