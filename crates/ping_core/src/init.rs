use cap_directories::ProjectDirs;
use cap_std::{
    ambient_authority,
    fs_utf8::{camino::Utf8PathBuf, Dir},
};
use miette::{Context, IntoDiagnostic, Result};

/// Env var that overrides the data directory.
pub const PING_DATA_DIR_ENV: &str = "PING_DATA_DIR";

/// Opens the directory that holds `ping_config.json` and `ping.log`.
///
/// `PING_DATA_DIR` wins if it is set, and is created when missing.
/// Otherwise the platform's local data dir for `ping` is used.
pub fn get_ping_dir() -> Result<Dir> {
    match std::env::var(PING_DATA_DIR_ENV) {
        Ok(path) => open_override_dir(Utf8PathBuf::from(path)),
        Err(_) => {
            let project = ProjectDirs::from("com", "", "ping", ambient_authority())
                .ok_or_else(|| miette::miette!("no home directory to keep ping data in"))?;
            let data_dir = project
                .data_local_dir()
                .into_diagnostic()
                .wrap_err("failed to open the local data dir of ping")?;
            Ok(Dir::from_cap_std(data_dir))
        }
    }
}

fn open_override_dir(path: Utf8PathBuf) -> Result<Dir> {
    Dir::create_ambient_dir_all(&path, ambient_authority())
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to create {PING_DATA_DIR_ENV} directory {path}"))?;
    Dir::open_ambient_dir(&path, ambient_authority())
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to open {PING_DATA_DIR_ENV} directory {path}"))
}
