//! Test fixtures and sample data

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// World names used by the three-save scenario
pub fn sample_worlds() -> [&'static str; 3] {
    ["Alpha", "Beta", "Gamma"]
}

/// Create `<saves>/<name>` with a level file and one region file
pub fn populate_world(saves: &Path, name: &str) -> PathBuf {
    let world = saves.join(name);
    fs::create_dir_all(world.join("region")).expect("Failed to create world");
    fs::write(world.join("level.dat"), format!("level data for {}", name))
        .expect("Failed to write level.dat");
    fs::write(world.join("region").join("r.0.0.mca"), vec![7u8; 4096])
        .expect("Failed to write region file");
    world
}

/// Authorized-user token whose access token is valid for years
pub fn token_json() -> &'static str {
    r#"{
  "token": "ya29.test-access-token",
  "refresh_token": "1//test-refresh-token",
  "token_uri": "https://oauth2.googleapis.com/token",
  "client_id": "test-client.apps.googleusercontent.com",
  "client_secret": "test-secret",
  "scopes": ["https://www.googleapis.com/auth/drive"],
  "expiry": "2099-01-01T00:00:00Z"
}"#
}

/// Installed-app client secrets as downloaded from the Cloud console
pub fn credentials_json() -> &'static str {
    r#"{
  "installed": {
    "client_id": "test-client.apps.googleusercontent.com",
    "client_secret": "test-secret",
    "auth_uri": "https://accounts.google.com/o/oauth2/auth",
    "token_uri": "https://oauth2.googleapis.com/token",
    "redirect_uris": ["http://localhost"]
  }
}"#
}

/// Write a log file whose modification time is `age_secs` in the past
pub fn write_log(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("INFO {}\n", name)).expect("Failed to write log");
    let mtime = SystemTime::now() - Duration::from_secs(age_secs);
    File::options()
        .write(true)
        .open(&path)
        .and_then(|f| f.set_modified(mtime))
        .expect("Failed to set log mtime");
    path
}

/// Files in `dir` with the given extension
pub fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |e| e.to_string_lossy() == ext))
            .collect(),
        Err(_) => Vec::new(),
    }
}
