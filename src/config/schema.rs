//! Configuration schema types for `plugpack.toml`
//!
//! Defines the structure and validation rules for plugin bundle configuration.

use crate::build::glob_base;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Plugin metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name (required)
    pub name: String,
    /// Configuration file copied verbatim into the output tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    /// Build output directory
    #[serde(default = "default_out")]
    pub out: PathBuf,
    /// Bundle file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

/// Template compilation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Glob patterns for template sources
    #[serde(default = "default_template_sources")]
    pub sources: Vec<String>,
    /// Prefix prepended to a template's relative path to form its cache key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_prefix: Option<String>,
    /// Client-side module the template cache registers into
    #[serde(default = "default_module")]
    pub module: String,
    /// Replace the template file extension in the cache key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_extension: Option<String>,
    /// Pretty-print compiled HTML
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            sources: default_template_sources(),
            url_prefix: None,
            module: default_module(),
            url_extension: None,
            pretty: true,
        }
    }
}

fn default_template_sources() -> Vec<String> {
    vec!["partials/*.template".to_string()]
}

fn default_module() -> String {
    "templates".to_string()
}

fn default_true() -> bool {
    true
}

/// Script compilation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Glob patterns for script sources
    #[serde(default = "default_script_sources")]
    pub sources: Vec<String>,
    /// Skip the top-level closure wrapper
    #[serde(default)]
    pub bare: bool,
    /// External compiler command; source on stdin, output on stdout
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self { sources: default_script_sources(), bare: false, command: Vec::new() }
    }
}

fn default_script_sources() -> Vec<String> {
    vec!["coffee-like-script/*.script".to_string()]
}

/// Image copy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Glob patterns for image assets
    #[serde(default = "default_image_sources")]
    pub sources: Vec<String>,
    /// Destination directory inside the output tree
    #[serde(default = "default_image_dest")]
    pub dest: PathBuf,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { sources: default_image_sources(), dest: default_image_dest() }
    }
}

fn default_image_sources() -> Vec<String> {
    vec!["images/**/*".to_string()]
}

fn default_image_dest() -> PathBuf {
    PathBuf::from("images")
}

/// Bundle minification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinifyConfig {
    /// Strip comments and redundant whitespace from the bundle
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: false }
    }
}

/// Complete plugpack.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlugpackConfig {
    /// Plugin metadata (required)
    pub plugin: PluginConfig,
    /// Template settings
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Script settings
    #[serde(default)]
    pub scripts: ScriptsConfig,
    /// Image settings
    #[serde(default)]
    pub images: ImagesConfig,
    /// Minification settings
    #[serde(default)]
    pub minify: MinifyConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "templates.sources")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plugpack.toml: '{}' {}", self.field, self.message)
    }
}

impl PlugpackConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.plugin.name.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "plugin.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if let Some(bundle) = &self.plugin.bundle {
            if bundle.is_empty() || bundle.contains('/') || bundle.contains('\\') {
                errors.push(ConfigValidationError {
                    field: "plugin.bundle".to_string(),
                    message: "must be a plain file name".to_string(),
                });
            }
        }

        for (field, sources) in [
            ("templates.sources", &self.templates.sources),
            ("scripts.sources", &self.scripts.sources),
            ("images.sources", &self.images.sources),
        ] {
            for pattern in sources {
                if let Err(e) = glob::Pattern::new(pattern) {
                    errors.push(ConfigValidationError {
                        field: field.to_string(),
                        message: format!("contains invalid glob '{}': {}", pattern, e),
                    });
                }
            }
        }

        if self.templates.module.is_empty() {
            errors.push(ConfigValidationError {
                field: "templates.module".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if let Some(ext) = &self.templates.url_extension {
            if ext.is_empty() || ext.starts_with('.') {
                errors.push(ConfigValidationError {
                    field: "templates.url_extension".to_string(),
                    message: "must be an extension without a leading dot".to_string(),
                });
            }
        }

        if self.images.dest.is_absolute() {
            errors.push(ConfigValidationError {
                field: "images.dest".to_string(),
                message: "must be relative to the output directory".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Validate, including the checks that need the project root.
    ///
    /// The output directory must not be the project root or one of its
    /// parents, and must not hold any source or the plugin config file.
    pub fn validate_for_root(&self, project_root: &Path) -> Vec<ConfigValidationError> {
        let mut errors = self.validate();
        if let Some(message) = self.out_dir_conflict(project_root) {
            errors.push(ConfigValidationError { field: "plugin.out".to_string(), message });
        }
        errors
    }

    fn out_dir_conflict(&self, project_root: &Path) -> Option<String> {
        let root = normalize(project_root);
        let out = normalize(&root.join(&self.plugin.out));
        if root.starts_with(&out) {
            return Some("must not be the project root or one of its parents".to_string());
        }

        let patterns =
            self.templates.sources.iter().chain(&self.scripts.sources).chain(&self.images.sources);
        for pattern in patterns {
            if normalize(&root.join(glob_base(pattern))).starts_with(&out) {
                return Some(format!("must not contain the sources of '{}'", pattern));
            }
        }

        if normalize(&root.join(self.config_file())).starts_with(&out) {
            return Some("must not contain the plugin config file".to_string());
        }
        None
    }

    /// Configuration file to copy, `<name>.json` unless set
    pub fn config_file(&self) -> PathBuf {
        self.plugin
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.json", self.plugin.name)))
    }

    /// Bundle file name, `<name>.js` unless set
    pub fn bundle_name(&self) -> String {
        self.plugin.bundle.clone().unwrap_or_else(|| format!("{}.js", self.plugin.name))
    }

    /// Template cache key prefix, `/plugins/<name>/` unless set
    pub fn url_prefix(&self) -> String {
        self.templates
            .url_prefix
            .clone()
            .unwrap_or_else(|| format!("/plugins/{}/", self.plugin.name))
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> PlugpackConfig {
        toml::from_str(&format!("[plugin]\nname = \"{}\"\n", name)).unwrap()
    }

    #[test]
    fn test_out_dir_default_is_accepted() {
        assert!(named("x").validate_for_root(Path::new("/project/x")).is_empty());
    }

    #[test]
    fn test_out_dir_equal_to_project_root_rejected() {
        for out in [".", "", "./", "partials/.."] {
            let mut config = named("x");
            config.plugin.out = PathBuf::from(out);
            let errors = config.validate_for_root(Path::new("/project/x"));
            assert!(errors.iter().any(|e| e.field == "plugin.out"), "{out:?}");
        }
    }

    #[test]
    fn test_out_dir_parent_of_project_root_rejected() {
        let mut config = named("x");
        config.plugin.out = PathBuf::from("/project");
        let errors = config.validate_for_root(Path::new("/project/x"));
        assert!(errors[0].message.contains("project root"));
    }

    #[test]
    fn test_out_dir_holding_sources_rejected() {
        let mut config = named("x");
        config.plugin.out = PathBuf::from("images");
        let errors = config.validate_for_root(Path::new("/project/x"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "must not contain the sources of 'images/**/*'");
    }

    #[test]
    fn test_out_dir_holding_config_file_rejected() {
        let mut config = named("x");
        config.plugin.config = Some(PathBuf::from("build/x.json"));
        config.plugin.out = PathBuf::from("build");
        let errors = config.validate_for_root(Path::new("/project/x"));
        assert!(errors.iter().any(|e| e.message.contains("plugin config file")));
    }

    #[test]
    fn test_out_dir_outside_project_accepted() {
        let mut config = named("x");
        config.plugin.out = PathBuf::from("../public/x");
        assert!(config.validate_for_root(Path::new("/project/x")).is_empty());
    }

    #[test]
    fn test_minimal_config_parse() {
        let toml = r#"
[plugin]
name = "threefold-auth"
"#;
        let config: PlugpackConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.plugin.name, "threefold-auth");
        assert_eq!(config.plugin.out, PathBuf::from("dist"));
        assert_eq!(config.templates.sources, vec!["partials/*.template"]);
        assert_eq!(config.scripts.sources, vec!["coffee-like-script/*.script"]);
        assert_eq!(config.images.sources, vec!["images/**/*"]);
        assert!(config.minify.enabled);
        assert!(config.templates.pretty);
        assert!(config.is_valid());
    }

    #[test]
    fn test_derived_names() {
        let toml = r#"
[plugin]
name = "threefold-auth"
"#;
        let config: PlugpackConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.config_file(), PathBuf::from("threefold-auth.json"));
        assert_eq!(config.bundle_name(), "threefold-auth.js");
        assert_eq!(config.url_prefix(), "/plugins/threefold-auth/");
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[plugin]
name = "gallery"
config = "conf/gallery.json"
out = "public"
bundle = "gallery.bundle.js"

[templates]
sources = ["views/**/*.jade"]
url_prefix = "/static/gallery/"
module = "galleryTemplates"
url_extension = "html"
pretty = false

[scripts]
sources = ["src/*.coffee"]
bare = true
command = ["coffee", "--stdio", "--print"]

[images]
sources = ["img/**/*.png"]
dest = "assets/img"

[minify]
enabled = false

[watch]
debounce_ms = 250
clear_screen = true
"#;
        let config: PlugpackConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.config_file(), PathBuf::from("conf/gallery.json"));
        assert_eq!(config.plugin.out, PathBuf::from("public"));
        assert_eq!(config.bundle_name(), "gallery.bundle.js");
        assert_eq!(config.url_prefix(), "/static/gallery/");
        assert_eq!(config.templates.module, "galleryTemplates");
        assert_eq!(config.templates.url_extension.as_deref(), Some("html"));
        assert!(!config.templates.pretty);
        assert!(config.scripts.bare);
        assert_eq!(config.scripts.command, vec!["coffee", "--stdio", "--print"]);
        assert_eq!(config.images.dest, PathBuf::from("assets/img"));
        assert!(!config.minify.enabled);
        assert_eq!(config.watch.debounce_ms, 250);
        assert!(config.watch.clear_screen);
        assert!(config.is_valid());
    }

    #[test]
    fn test_validation_empty_name() {
        let toml = r#"
[plugin]
name = ""
"#;
        let config: PlugpackConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "plugin.name"));
    }

    #[test]
    fn test_validation_bundle_with_directory() {
        let toml = r#"
[plugin]
name = "x"
bundle = "js/x.js"
"#;
        let config: PlugpackConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "plugin.bundle"));
    }

    #[test]
    fn test_validation_invalid_glob() {
        let toml = r#"
[plugin]
name = "x"

[scripts]
sources = ["src/[*.script"]
"#;
        let config: PlugpackConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "scripts.sources"));
    }

    #[test]
    fn test_validation_url_extension_with_dot() {
        let toml = r#"
[plugin]
name = "x"

[templates]
url_extension = ".html"
"#;
        let config: PlugpackConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "templates.url_extension"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ConfigValidationError {
            field: "plugin.name".to_string(),
            message: "must be a non-empty string".to_string(),
        };
        assert_eq!(error.to_string(), "plugpack.toml: 'plugin.name' must be a non-empty string");
    }
}
