use {
    config::{Config, ConfigError, Environment, File, FileFormat},
    std::path::PathBuf,
};

#[derive(Clone, Debug, serde::Deserialize)]
pub struct BanklyConfig {
    pub http: HttpConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl BanklyConfig {
    /// Loads the TOML file at `config_path`; `BANKLY__SECTION__KEY` variables
    /// override its values.
    pub fn from_file(config_path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::new(config_path, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("BANKLY")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: BanklyConfig = builder.build()?.try_deserialize()?;

        Ok(config)
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct PersistenceConfig {
    pub data_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl PersistenceConfig {
    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    pub fn transactions_file(&self) -> PathBuf {
        self.data_dir.join("transactions.json")
    }
}
