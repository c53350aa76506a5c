//! Configuration loading
//!
//! Everything the pipeline reads from outside the package directory is
//! gathered here in one step: the `pkg-release.toml` release config, the
//! makepkg configuration files and the process environment. The result is a
//! [`Settings`] value that is passed explicitly to every phase.

use crate::core::error::{ConfigError, ReleaseError, ReleaseResult};
use crate::core::tools::{get_tool_path, tool_env_var};
use crate::pkgbuild::parser::{self, Mode, Value, Variables};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default package archive extension
pub const DEFAULT_PKGEXT: &str = ".pkg.tar.zst";

/// Variables git subprocesses inherit; everything else is cleared
const GIT_ENV_PASSTHROUGH: &[&str] = &[
  "PATH",
  "HOME",
  "XDG_CONFIG_HOME",
  // transport
  "SSH_AUTH_SOCK",
  "GIT_SSH",
  "GIT_SSH_COMMAND",
  "http_proxy",
  "https_proxy",
  "all_proxy",
  "no_proxy",
  "HTTP_PROXY",
  "HTTPS_PROXY",
  "ALL_PROXY",
  "NO_PROXY",
  // identity and commit signing
  "GIT_AUTHOR_NAME",
  "GIT_AUTHOR_EMAIL",
  "GIT_AUTHOR_DATE",
  "GIT_COMMITTER_NAME",
  "GIT_COMMITTER_EMAIL",
  "GIT_COMMITTER_DATE",
  "EMAIL",
  "GNUPGHOME",
  "GPG_TTY",
];

/// makepkg's configuration when `MAKEPKG_CONF` is unset
pub const SYSTEM_MAKEPKG_CONF: &str = "/etc/makepkg.conf";

/// Snapshot of the process environment, taken once in `main`
#[derive(Debug, Clone, Default)]
pub struct Environment {
  vars: BTreeMap<String, String>,
}

impl Environment {
  pub fn capture() -> Self {
    Self {
      vars: std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect(),
    }
  }

  #[cfg(test)]
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }

  /// Value of a variable; empty values count as unset
  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
  }

  /// The environment as shell variables, for sourcing makepkg.conf
  fn shell_variables(&self) -> Variables {
    let mut vars = Variables::default();
    for (key, value) in &self.vars {
      vars.insert(key.as_str(), Value::Scalar(value.clone()));
    }
    vars
  }

  fn home(&self) -> Option<PathBuf> {
    self.get("HOME").map(PathBuf::from)
  }

  /// `$XDG_CONFIG_HOME`, or `~/.config`
  fn config_home(&self) -> Option<PathBuf> {
    self
      .get("XDG_CONFIG_HOME")
      .map(PathBuf::from)
      .or_else(|| self.home().map(|h| h.join(".config")))
  }
}

/// `[release]` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseSection {
  /// The only branch releases may be made from
  pub branch: String,
  pub commit_prefix: String,
  /// Paths never included in the release commit
  pub exclude: Vec<String>,
  /// Directory for exported public keys, relative to the package
  pub key_dir: String,
  /// Warn about validpgpkeys entries missing from the keyring
  pub check_keys: bool,
}

impl Default for ReleaseSection {
  fn default() -> Self {
    Self {
      branch: "master".to_string(),
      commit_prefix: "upgpkg".to_string(),
      exclude: Vec::new(),
      key_dir: "keys/pgp".to_string(),
      check_keys: true,
    }
  }
}

/// `[upload]` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSection {
  pub host: Option<String>,
  pub path: Option<String>,
  /// Database file name inside `path`
  pub database: Option<String>,
  pub chmod: String,
  pub rsync_options: Vec<String>,
  pub repo_add_flags: Vec<String>,
  /// Run on the host after `repo-add`
  pub update_command: String,
}

impl Default for UploadSection {
  fn default() -> Self {
    Self {
      host: None,
      path: None,
      database: None,
      chmod: "D755,F644".to_string(),
      rsync_options: Vec::new(),
      repo_add_flags: vec!["--remove".to_string()],
      update_command: "sudo pacman -Sy".to_string(),
    }
  }
}

/// Fully specified upload destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
  pub host: String,
  pub path: String,
  pub database: String,
}

impl UploadSection {
  /// Destination fields, failing on the first one that is unset
  pub fn target(&self) -> ReleaseResult<UploadTarget> {
    let field = |value: &Option<String>, name: &str| {
      value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
          ReleaseError::Config(ConfigError::MissingField {
            field: format!("upload.{}", name),
          })
        })
    };
    Ok(UploadTarget {
      host: field(&self.host, "host")?,
      path: field(&self.path, "path")?,
      database: field(&self.database, "database")?,
    })
  }
}

/// Contents of `pkg-release.toml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
  pub release: ReleaseSection,
  pub upload: UploadSection,
}

impl ReleaseConfig {
  /// Find the config file (searches multiple locations)
  pub fn find_config_path(root: &Path, env: &Environment) -> Option<PathBuf> {
    let mut candidates = vec![
      root.join("pkg-release.toml"),
      root.join(".pkg-release.toml"),
      root.join(".config").join("pkg-release.toml"),
    ];
    if let Some(config_home) = env.config_home() {
      candidates.push(config_home.join("pkg-release").join("config.toml"));
    }

    candidates.into_iter().find(|p| p.is_file())
  }

  /// Parse a config file
  pub fn from_file(path: &Path) -> ReleaseResult<Self> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;
    toml_edit::de::from_str(&content).map_err(|e| {
      ReleaseError::Config(ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
      })
    })
  }
}

/// Values read from makepkg.conf files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MakepkgConf {
  pub gpgkey: Option<String>,
  pub pkgdest: Option<String>,
  pub pkgext: Option<String>,
}

impl MakepkgConf {
  /// Files in the order makepkg sources them: the main config, its
  /// `.d/*.conf` drop-ins, then one user config unless `MAKEPKG_CONF`
  /// points somewhere other than the system default
  pub fn candidate_paths(default_conf: &Path, env: &Environment) -> Vec<PathBuf> {
    let conf = env
      .get("MAKEPKG_CONF")
      .map(PathBuf::from)
      .unwrap_or_else(|| default_conf.to_path_buf());

    let mut paths = vec![conf.clone()];
    paths.extend(drop_in_files(&conf));

    if conf.as_path() == default_conf {
      let xdg = env.config_home().map(|c| c.join("pacman").join("makepkg.conf"));
      let legacy = env.home().map(|h| h.join(".makepkg.conf"));
      paths.extend(xdg.into_iter().chain(legacy).find(|p| p.is_file()));
    }
    paths
  }

  pub fn load(env: &Environment) -> Self {
    Self::load_from(Path::new(SYSTEM_MAKEPKG_CONF), env)
  }

  /// Source every candidate in turn; each file sees the environment and
  /// whatever earlier files assigned
  pub fn load_from(default_conf: &Path, env: &Environment) -> Self {
    let mut vars = env.shell_variables();
    for path in Self::candidate_paths(default_conf, env) {
      let Ok(text) = fs::read_to_string(&path) else {
        continue;
      };
      debug!(path = %path.display(), "Reading makepkg configuration");
      match parser::parse_with(&text, Mode::Lenient, vars.clone()) {
        Ok(sourced) => vars = sourced,
        Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable makepkg configuration"),
      }
    }

    Self {
      gpgkey: vars.scalar("GPGKEY").map(str::to_string),
      pkgdest: vars.scalar("PKGDEST").map(str::to_string),
      pkgext: vars.scalar("PKGEXT").map(str::to_string),
    }
  }
}

/// `<conf>.d/*.conf`, sorted by name
fn drop_in_files(conf: &Path) -> Vec<PathBuf> {
  let mut dir = conf.as_os_str().to_owned();
  dir.push(".d");
  let Ok(entries) = fs::read_dir(PathBuf::from(dir)) else {
    return Vec::new();
  };
  let mut files: Vec<PathBuf> = entries
    .filter_map(|e| e.ok())
    .map(|e| e.path())
    .filter(|p| p.extension().is_some_and(|ext| ext == "conf"))
    .collect();
  files.sort();
  files
}

/// Resolved paths to external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
  pub gpg: String,
  pub rsync: String,
  pub ssh: String,
  pub bsdtar: String,
}

impl Tools {
  pub fn from_env(env: &Environment) -> Self {
    let resolve = |tool: &str| get_tool_path(tool, env.get(&tool_env_var(tool)));
    Self {
      gpg: resolve("gpg"),
      rsync: resolve("rsync"),
      ssh: resolve("ssh"),
      bsdtar: resolve("bsdtar"),
    }
  }
}

/// Editor-related environment values, in resolution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSettings {
  /// `PKG_RELEASE_EDITOR`
  pub release_override: Option<String>,
  pub visual: Option<String>,
  pub editor: Option<String>,
}

/// Everything the pipeline needs from configuration and environment
#[derive(Debug, Clone)]
pub struct Settings {
  pub config_path: Option<PathBuf>,
  pub release: ReleaseSection,
  pub upload: UploadSection,
  /// `GPGKEY`; signing uses gpg's default key when unset
  pub signing_key: Option<String>,
  /// Where built packages are looked up
  pub pkgdest: PathBuf,
  pub pkgext: String,
  pub editor: EditorSettings,
  pub tools: Tools,
  /// Variables passed through to git subprocesses
  pub git_env: Vec<(String, String)>,
}

impl Settings {
  /// Load config files and apply environment overrides
  pub fn load(root: &Path, env: &Environment) -> ReleaseResult<Self> {
    let config_path = ReleaseConfig::find_config_path(root, env);
    let config = match &config_path {
      Some(path) => {
        debug!(path = %path.display(), "Loading release config");
        ReleaseConfig::from_file(path)?
      }
      None => ReleaseConfig::default(),
    };

    let makepkg = MakepkgConf::load(env);
    Ok(Self::resolve(root, config_path, config, makepkg, env))
  }

  fn resolve(
    root: &Path,
    config_path: Option<PathBuf>,
    config: ReleaseConfig,
    makepkg: MakepkgConf,
    env: &Environment,
  ) -> Self {
    let signing_key = env.get("GPGKEY").map(str::to_string).or(makepkg.gpgkey);

    let pkgdest = env
      .get("PKGDEST")
      .map(str::to_string)
      .or(makepkg.pkgdest)
      .map(|dest| root.join(dest))
      .unwrap_or_else(|| root.to_path_buf());

    let pkgext = env
      .get("PKGEXT")
      .map(str::to_string)
      .or(makepkg.pkgext)
      .unwrap_or_else(|| DEFAULT_PKGEXT.to_string());

    let mut upload = config.upload;
    if let Some(opts) = env.get("PKG_RELEASE_RSYNC_OPTS") {
      upload.rsync_options = opts.split_whitespace().map(str::to_string).collect();
    }

    let git_env = GIT_ENV_PASSTHROUGH
      .iter()
      .filter_map(|key| env.get(key).map(|v| (key.to_string(), v.to_string())))
      .collect();

    Self {
      config_path,
      release: config.release,
      upload,
      signing_key,
      pkgdest,
      pkgext,
      editor: EditorSettings {
        release_override: env.get("PKG_RELEASE_EDITOR").map(str::to_string),
        visual: env.get("VISUAL").map(str::to_string),
        editor: env.get("EDITOR").map(str::to_string),
      },
      tools: Tools::from_env(env),
      git_env,
    }
  }
}
