use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::backend::{
  BackendKind,
  RemoteConfig
};
use crate::backend::local::DEFAULT_STORAGE_KEY;
use crate::backend::remote::DEFAULT_BASE_URL;
use crate::filter::FilterMode;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (k, v) in [
      ("data.location", "~/.checkmark"),
      ("storage.key", DEFAULT_STORAGE_KEY),
      ("backend", "local"),
      ("filter", "all"),
      ("remote.url", DEFAULT_BASE_URL),
      ("remote.resource", "todos"),
      ("remote.limit", "10"),
      ("remote.user", "1"),
      ("confirmation", "on"),
      ("color", "on"),
      ("default.command", "list")
    ] {
      map.insert(
        k.to_string(),
        v.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    self.map.insert(
      key.to_string(),
      value.to_string()
    );
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// Reads an on/off flag; an absent or blank key is `Ok(None)`.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    if raw.trim().is_empty() {
      return Ok(None);
    }
    parse_bool(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid value for {key}: \
           {} (expected on or off)",
          raw.trim()
        )
      })
  }

  /// Parses `key` with `FromStr`; an absent key is `Ok(None)`.
  pub fn get_parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<Option<T>>
  where
    T: FromStr,
    T::Err: std::fmt::Display
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Ok(None);
    }
    trimmed
      .parse::<T>()
      .map(Some)
      .map_err(|err| {
        anyhow!(
          "invalid value for {key}: \
           {trimmed} ({err})"
        )
      })
  }

  pub fn storage_key(&self) -> String {
    self
      .get("storage.key")
      .filter(|k| !k.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_STORAGE_KEY.to_string()
      })
  }

  pub fn initial_backend(
    &self
  ) -> anyhow::Result<BackendKind> {
    Ok(
      self
        .get_parsed("backend")?
        .unwrap_or(BackendKind::Local)
    )
  }

  pub fn initial_filter(
    &self
  ) -> anyhow::Result<FilterMode> {
    Ok(
      self
        .get_parsed("filter")?
        .unwrap_or_default()
    )
  }

  pub fn confirmation(
    &self
  ) -> anyhow::Result<bool> {
    Ok(
      self
        .get_bool("confirmation")?
        .unwrap_or(true)
    )
  }

  pub fn color(
    &self
  ) -> anyhow::Result<bool> {
    Ok(
      self
        .get_bool("color")?
        .unwrap_or(true)
    )
  }

  #[tracing::instrument(skip(self))]
  pub fn remote_config(
    &self
  ) -> anyhow::Result<RemoteConfig> {
    let defaults = RemoteConfig::default();
    let timeout = self
      .get_parsed::<u64>(
        "remote.timeout"
      )?
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs);

    Ok(RemoteConfig {
      base_url: self
        .get("remote.url")
        .unwrap_or(defaults.base_url),
      resource: self
        .get("remote.resource")
        .unwrap_or(defaults.resource),
      limit: self
        .get_parsed("remote.limit")?
        .unwrap_or(defaults.limit),
      user_id: self
        .get_parsed("remote.user")?
        .unwrap_or(defaults.user_id),
      timeout
    })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once(" #")
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include cycle; skipping");
        } else if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("CHECKMARKRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc file"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".checkmarkrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".checkmark"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(
  s: &str
) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::Config;
  use crate::backend::BackendKind;
  use crate::filter::FilterMode;

  #[test]
  fn defaults_describe_the_mock_api()
  {
    let cfg = Config::default();
    let remote =
      cfg.remote_config().unwrap();
    assert_eq!(
      remote.base_url,
      "https://jsonplaceholder.typicode.com"
    );
    assert_eq!(remote.resource, "todos");
    assert_eq!(remote.limit, 10);
    assert_eq!(remote.user_id, 1);
    assert_eq!(remote.timeout, None);
    assert_eq!(cfg.storage_key(), "tasks");
    assert!(cfg.confirmation().unwrap());
    assert!(cfg.color().unwrap());
  }

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let temp = tempdir().unwrap();
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "remote.limit=25\nremote.timeout=5\n"
    )
    .unwrap();
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# comment\nbackend = remote \
       # trailing\nfilter=active\n\
       include extra.rc\n"
    )
    .unwrap();

    let mut cfg =
      Config::load(Some(rc.as_path())).unwrap();
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.initial_backend().unwrap(),
      BackendKind::Remote
    );
    assert_eq!(
      cfg.initial_filter().unwrap(),
      FilterMode::Active
    );

    cfg.apply_overrides([(
      "rc.confirmation".to_string(),
      "off".to_string()
    )]);
    assert!(!cfg.confirmation().unwrap());

    let remote =
      cfg.remote_config().unwrap();
    assert_eq!(remote.limit, 25);
    assert_eq!(
      remote.timeout,
      Some(Duration::from_secs(5))
    );
  }

  #[test]
  fn invalid_values_are_reported() {
    let mut cfg = Config::default();
    cfg.set("remote.limit", "ten");
    assert!(cfg.remote_config().is_err());

    cfg.set("backend", "cloud");
    assert!(
      cfg.initial_backend().is_err()
    );

    cfg.set("color", "sometimes");
    assert!(cfg.color().is_err());
    cfg.set("confirmation", "maybe");
    assert!(
      cfg.confirmation().is_err()
    );
  }

  #[test]
  fn malformed_line_is_an_error() {
    let temp = tempdir().unwrap();
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "no equals sign\n")
      .unwrap();
    assert!(Config::load(Some(rc.as_path())).is_err());
  }
}
