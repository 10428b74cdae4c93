use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::dhis2::{Dhis2Auth, Dhis2Client};
use crate::error::Result;
use crate::toolbox::CommandToolbox;
use crate::utils::constants::{DEFAULT_FILES_ROOT, DEFAULT_TOOLBOX_PROGRAM};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkspaceSettings {
    /// Root that relative pipeline directories resolve against.
    pub files_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ToolboxSettings {
    #[validate(length(min = 1))]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdsSettings {
    pub key: Option<String>,
    pub url: Option<String>,
}

/// Target DHIS2 instance. A token takes precedence over a username.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dhis2Settings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl Dhis2Settings {
    pub fn auth(&self) -> Dhis2Auth {
        match (&self.token, &self.username) {
            (Some(token), _) => Dhis2Auth::Token(token.clone()),
            (None, Some(username)) => Dhis2Auth::Basic {
                username: username.clone(),
                password: self.password.clone().unwrap_or_default(),
            },
            (None, None) => Dhis2Auth::None,
        }
    }
}

/// Process-wide settings: defaults, then an optional TOML file, then
/// `ERA5_`-prefixed environment variables (`ERA5_TOOLBOX__PROGRAM`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub workspace: WorkspaceSettings,

    #[validate(nested)]
    pub toolbox: ToolboxSettings,

    #[serde(default)]
    pub cds: CdsSettings,

    #[serde(default)]
    pub dhis2: Dhis2Settings,
}

impl Settings {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("workspace.files_root", DEFAULT_FILES_ROOT)?
            .set_default("toolbox.program", DEFAULT_TOOLBOX_PROGRAM)?
            .set_default("toolbox.args", Vec::<String>::new())?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("ERA5")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn toolbox(&self) -> CommandToolbox {
        CommandToolbox::new(&self.toolbox.program)
            .with_base_args(self.toolbox.args.clone())
            .with_cds_credentials(self.cds.key.clone(), self.cds.url.clone())
    }

    /// Client for the configured DHIS2 instance, `None` without a URL.
    pub fn dhis2_client(&self) -> Option<Dhis2Client> {
        self.dhis2
            .url
            .as_ref()
            .map(|url| Dhis2Client::new(url.as_str()).with_auth(self.dhis2.auth()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.toolbox.program, DEFAULT_TOOLBOX_PROGRAM);
        assert!(settings.toolbox.args.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            "[workspace]\nfiles_root = \"/srv/workspace\"\n\n[toolbox]\nprogram = \"python3\"\nargs = [\"-m\", \"era5_toolbox\"]\n\n[cds]\nkey = \"abc\""
        )?;

        let settings = Settings::load(Some(file.path()))?;
        assert_eq!(settings.workspace.files_root, PathBuf::from("/srv/workspace"));
        assert_eq!(settings.toolbox.program, "python3");
        assert_eq!(settings.toolbox.args, vec!["-m", "era5_toolbox"]);
        assert_eq!(settings.cds.key.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn test_empty_program_rejected() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "[toolbox]\nprogram = \"\"")?;
        assert!(Settings::load(Some(file.path())).is_err());
        Ok(())
    }

    #[test]
    fn test_dhis2_section() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            "[dhis2]\nurl = \"https://dhis2.example.org\"\nusername = \"admin\"\npassword = \"district\""
        )?;

        let settings = Settings::load(Some(file.path()))?;
        assert_eq!(
            settings.dhis2.auth(),
            Dhis2Auth::Basic {
                username: "admin".to_string(),
                password: "district".to_string()
            }
        );
        assert!(settings.dhis2_client().is_some());

        let token = Dhis2Settings {
            token: Some("d2pat_abc".to_string()),
            username: Some("admin".to_string()),
            ..Default::default()
        };
        assert_eq!(token.auth(), Dhis2Auth::Token("d2pat_abc".to_string()));
        assert!(Settings::load(None)?.dhis2_client().is_none());
        Ok(())
    }
}
