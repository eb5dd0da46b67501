use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

const VINEFLOWER_URL: &str =
    "https://github.com/Vineflower/vineflower/releases/download/1.10.1/vineflower-1.10.1.jar";

/// Directory that receives `decompiled/` and `class-index.json`.
///
/// Root resolution is explicit: `--root` when given, otherwise the current
/// working directory. The archive's own location is never inspected.
pub fn resolve_project_root(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.root.clone() {
        return Ok(p);
    }
    env::current_dir().context("Failed to resolve current working directory")
}

pub fn resolve_vineflower_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.vineflower.clone() {
        return Ok(p);
    }

    if let Ok(p) = env::var("VINEFLOWER_JAR") {
        return Ok(PathBuf::from(p));
    }

    let default_path = indexer_home()?.join("tools").join("vineflower.jar");
    if default_path.exists() {
        return Ok(default_path);
    }

    install_vineflower_if_missing(&default_path)?;
    Ok(default_path)
}

fn indexer_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("jar-indexer"))
}

fn install_vineflower_if_missing(target_path: &Path) -> Result<()> {
    if target_path.exists() {
        return Ok(());
    }

    if let Some(parent) = target_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    eprintln!(
        "[jar-indexer] Vineflower not found, downloading to {}",
        target_path.display()
    );
    let status = std::process::Command::new("curl")
        .args([
            "-L",
            "--fail",
            "--silent",
            "--show-error",
            "-o",
            target_path
                .to_str()
                .context("vineflower.jar target path is not valid UTF-8")?,
            VINEFLOWER_URL,
        ])
        .status()
        .context(
            "Failed to execute curl (ensure curl is installed, or use --vineflower to specify the engine jar)",
        )?;

    if !status.success() {
        if cfg!(windows) {
            let ps_status = std::process::Command::new("powershell")
                .args([
                    "-NoProfile",
                    "-ExecutionPolicy",
                    "Bypass",
                    "-Command",
                    &format!(
                        "Invoke-WebRequest -Uri '{VINEFLOWER_URL}' -OutFile '{}'",
                        target_path.display()
                    ),
                ])
                .status();

            if let Ok(s) = ps_status
                && s.success()
            {
                return Ok(());
            }
        }

        anyhow::bail!(
            "Failed to download Vineflower. You can use --vineflower to specify a local engine jar"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn cli_with(root: Option<PathBuf>, vineflower: Option<PathBuf>) -> Cli {
        Cli {
            jar: PathBuf::from("app.jar"),
            root,
            include: Vec::new(),
            vineflower,
        }
    }

    #[test]
    fn explicit_root_wins() -> Result<()> {
        let cli = cli_with(Some(PathBuf::from("/tmp/project")), None);
        assert_eq!(resolve_project_root(&cli)?, PathBuf::from("/tmp/project"));
        Ok(())
    }

    #[test]
    fn root_defaults_to_current_directory() -> Result<()> {
        let cli = cli_with(None, None);
        assert_eq!(resolve_project_root(&cli)?, env::current_dir()?);
        Ok(())
    }

    #[test]
    fn vineflower_flag_wins_over_env() -> Result<()> {
        let _guard = env_lock().lock().expect("env test lock poisoned");
        // SAFETY: Guarded by env_lock and removed before returning.
        unsafe { env::set_var("VINEFLOWER_JAR", "/tmp/from-env.jar") };
        let cli = cli_with(None, Some(PathBuf::from("/tmp/from-flag.jar")));
        let resolved = resolve_vineflower_path(&cli);
        // SAFETY: Guarded by env_lock.
        unsafe { env::remove_var("VINEFLOWER_JAR") };
        assert_eq!(resolved?, PathBuf::from("/tmp/from-flag.jar"));
        Ok(())
    }

    #[test]
    fn vineflower_env_used_when_flag_absent() -> Result<()> {
        let _guard = env_lock().lock().expect("env test lock poisoned");
        // SAFETY: Guarded by env_lock and removed before returning.
        unsafe { env::set_var("VINEFLOWER_JAR", "/tmp/from-env.jar") };
        let cli = cli_with(None, None);
        let resolved = resolve_vineflower_path(&cli);
        // SAFETY: Guarded by env_lock.
        unsafe { env::remove_var("VINEFLOWER_JAR") };
        assert_eq!(resolved?, PathBuf::from("/tmp/from-env.jar"));
        Ok(())
    }
}
