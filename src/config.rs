use crate::error::AppError;
use crate::history::DEFAULT_PAGE_SIZE;
use config::{Config, Environment, File, FileFormat, Map};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "drive-meter";
pub const PRICE_PROVIDER: &str = "eia";

pub fn normalize_region_code(region: &str) -> String {
    region.trim().to_ascii_uppercase()
}

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("DRIVE_METER_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", "drivemeter", SERVICE_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".drive-meter"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_region: String,
    pub price_cache_hours: u64,
    pub history_page_size: usize,
    pub eia: EiaSettings,
    pub price_overrides: HashMap<String, f64>,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EiaSettings {
    pub base_url: Option<String>,
    pub series: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub name: String,
    pub city_mpg: f64,
    pub highway_mpg: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_region: "NC".into(),
            price_cache_hours: 24,
            history_page_size: DEFAULT_PAGE_SIZE,
            eia: EiaSettings {
                base_url: None,
                series: HashMap::from([("NC".to_string(), "EMM_EPMR_PTE_R10_DPG".to_string())]),
            },
            price_overrides: HashMap::new(),
            vehicles: vec![Vehicle {
                name: "Ford Focus".into(),
                city_mpg: 26.0,
                highway_mpg: 38.0,
            }],
        }
    }
}

impl AppConfig {
    pub fn find_vehicle(&self, name: &str) -> Option<&Vehicle> {
        self.vehicles
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name.trim()))
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn data_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("data"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn db_path() -> Result<PathBuf, AppError> {
    Ok(data_dir()?.join("trips.sqlite"))
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(data_dir()?)?;
    Ok(())
}

fn normalize_config(config: &mut AppConfig) -> bool {
    let mut changed = false;

    let region = normalize_region_code(&config.default_region);
    if region != config.default_region {
        config.default_region = region;
        changed = true;
    }

    let mut series = HashMap::new();
    for (region, id) in std::mem::take(&mut config.eia.series) {
        let normalized = normalize_region_code(&region);
        if normalized != region {
            changed = true;
        }
        series.insert(normalized, id.trim().to_string());
    }
    config.eia.series = series;

    let mut overrides = HashMap::new();
    for (region, price) in std::mem::take(&mut config.price_overrides) {
        let normalized = normalize_region_code(&region);
        if normalized != region {
            changed = true;
        }
        overrides.insert(normalized, price);
    }
    config.price_overrides = overrides;

    let mut vehicles: Vec<Vehicle> = Vec::new();
    for vehicle in std::mem::take(&mut config.vehicles) {
        if vehicles
            .iter()
            .any(|v| v.name.eq_ignore_ascii_case(&vehicle.name))
        {
            changed = true;
            continue;
        }
        vehicles.push(vehicle);
    }
    config.vehicles = vehicles;

    changed
}

fn validate_config(config: &AppConfig) -> Result<(), AppError> {
    if let Some((region, price)) = config
        .price_overrides
        .iter()
        .find(|(_, p)| !p.is_finite() || **p <= 0.0)
    {
        return Err(AppError::Config(format!(
            "price override for '{region}' must be positive, got {price}"
        )));
    }
    if let Some(v) = config
        .vehicles
        .iter()
        .find(|v| !(v.city_mpg > 0.0 && v.highway_mpg > 0.0))
    {
        return Err(AppError::Config(format!(
            "vehicle '{}' needs positive city and highway mpg",
            v.name
        )));
    }
    Ok(())
}

/// Loads `path` (if present) with `DRIVE_METER__*` environment variables layered on top.
pub fn load_config_from(path: &Path) -> Result<AppConfig, AppError> {
    load_layered(path, None)
}

/// `env` replaces the process environment when given.
fn load_layered(path: &Path, env: Option<Map<String, String>>) -> Result<AppConfig, AppError> {
    let mut parsed: AppConfig = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix("DRIVE_METER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()?
        .try_deserialize()?;

    if normalize_config(&mut parsed) {
        tracing::debug!(path = %path.display(), "normalized region codes in config");
    }
    validate_config(&parsed)?;
    Ok(parsed)
}

pub fn load_config() -> Result<AppConfig, AppError> {
    load_config_from(&config_path()?)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

fn key_entry(provider: &str) -> Result<keyring::Entry, AppError> {
    let normalized = provider.trim().to_ascii_lowercase();
    Ok(keyring::Entry::new(
        SERVICE_NAME,
        &format!("provider:{normalized}"),
    )?)
}

pub fn set_api_key(provider: &str, key: &str) -> Result<(), AppError> {
    key_entry(provider)?.set_password(key)?;
    Ok(())
}

/// Keyring first, then `<PROVIDER>_API_KEY` from the environment.
pub fn find_api_key(provider: &str) -> Option<String> {
    if let Ok(value) = key_entry(provider).and_then(|e| e.get_password().map_err(AppError::from)) {
        if !value.is_empty() {
            return Some(value);
        }
    }

    let env_name = format!(
        "{}_API_KEY",
        provider.trim().to_ascii_uppercase().replace('-', "_")
    );
    std::env::var(env_name).ok().filter(|v| !v.is_empty())
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !cfg_path.exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_region_code_trims_and_uppercases() {
        assert_eq!(normalize_region_code(" nc "), "NC");
        assert_eq!(normalize_region_code("Va"), "VA");
    }

    #[test]
    fn normalize_config_uppercases_regions_and_dedupes_vehicles() {
        let mut cfg = AppConfig {
            default_region: "va".into(),
            price_overrides: HashMap::from([("sc".into(), 3.05)]),
            vehicles: vec![
                Vehicle {
                    name: "Ford Focus".into(),
                    city_mpg: 26.0,
                    highway_mpg: 38.0,
                },
                Vehicle {
                    name: "ford focus".into(),
                    city_mpg: 1.0,
                    highway_mpg: 1.0,
                },
            ],
            ..AppConfig::default()
        };
        cfg.eia.series.insert("ga".into(), " EMM_EPMR_PTE_R1Z_DPG ".into());

        let changed = normalize_config(&mut cfg);
        assert!(changed);
        assert_eq!(cfg.default_region, "VA");
        assert_eq!(cfg.price_overrides.get("SC"), Some(&3.05));
        assert_eq!(
            cfg.eia.series.get("GA").map(String::as_str),
            Some("EMM_EPMR_PTE_R1Z_DPG")
        );
        assert_eq!(cfg.vehicles.len(), 1);
        assert_eq!(cfg.vehicles[0].city_mpg, 26.0);
    }

    #[test]
    fn normalize_config_leaves_defaults_alone() {
        let mut cfg = AppConfig::default();
        assert!(!normalize_config(&mut cfg));
    }

    #[test]
    fn load_config_reads_toml_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
default_region = "va"
history_page_size = 5

[price_overrides]
va = 3.25

[[vehicles]]
name = "Civic"
city_mpg = 31.0
highway_mpg = 40.0
"#,
        )
        .expect("write config");

        let cfg = load_config_from(&path).expect("load config");
        assert_eq!(cfg.default_region, "VA");
        assert_eq!(cfg.history_page_size, 5);
        assert_eq!(cfg.price_cache_hours, 24);
        assert_eq!(cfg.price_overrides.get("VA"), Some(&3.25));
        assert_eq!(cfg.find_vehicle("civic").map(|v| v.highway_mpg), Some(40.0));
    }

    #[test]
    fn load_config_without_file_uses_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let cfg = load_config_from(&tmp.path().join("missing.toml")).expect("load config");
        assert_eq!(cfg.default_region, "NC");
        assert_eq!(cfg.vehicles[0].name, "Ford Focus");
        assert!(cfg.eia.series.contains_key("NC"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "default_region = \"ga\"\nhistory_page_size = 5\n\n[price_overrides]\nsc = 3.0\n",
        )
        .expect("write config");
        let env = [
            ("DRIVE_METER__DEFAULT_REGION", "va"),
            ("DRIVE_METER__PRICE_OVERRIDES__NC", "3.4"),
            ("UNRELATED__DEFAULT_REGION", "tx"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg = load_layered(&path, Some(env)).expect("load config");
        assert_eq!(cfg.default_region, "VA");
        assert_eq!(cfg.history_page_size, 5);
        assert_eq!(cfg.price_overrides.get("NC"), Some(&3.4));
        assert_eq!(cfg.price_overrides.get("SC"), Some(&3.0));
    }

    #[test]
    fn load_config_rejects_non_positive_overrides() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[price_overrides]\nNC = 0.0\n").expect("write config");
        let err = load_config_from(&path).expect_err("zero price");
        assert!(err.to_string().contains("must be positive"));
    }
}
