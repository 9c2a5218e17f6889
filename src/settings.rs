use std::path::{Path, PathBuf};

/// Sampling parameters and model ids shared by the three pipelines.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationSettings {
    pub text_to_image_model: String,
    pub inpaint_model: String,
    pub structural_model: String,
    /// Appended to every prompt, e.g. ", super detailed, realistic, 8k".
    pub prompt_suffix: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub num_samples: u32,
    pub scheduler: String,
    /// Inpainting strength; close to 1.0 so the masked area is fully redrawn.
    pub inpaint_strength: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            text_to_image_model: "black-forest-labs/flux-1.1-pro".to_string(),
            inpaint_model: "black-forest-labs/flux-fill-pro".to_string(),
            structural_model: "black-forest-labs/flux-depth-pro".to_string(),
            prompt_suffix: ", super detailed, realistic, 8k".to_string(),
            num_inference_steps: 30,
            guidance_scale: 7.5,
            num_samples: 1,
            scheduler: "DPM++ 2M Karras".to_string(),
            inpaint_strength: 0.99,
        }
    }
}

/// Application settings that persist across runs
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub generation: GenerationSettings,
    /// Directory the local asset host writes uploads to. Empty = OS data dir.
    pub asset_dir: String,
    /// Command line of the generation pipeline bridge. Empty = none configured.
    pub pipeline_command: String,
    /// Generations left before the caller must ask the user to sign in.
    pub free_generations: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            asset_dir: String::new(),
            pipeline_command: String::new(),
            free_generations: 3,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/aichitect/aichitect_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Aichitect\aichitect_settings.cfg
    /// On macOS:   ~/Library/Application Support/Aichitect/aichitect_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        let config_dir = Self::config_dir()?;
        let _ = std::fs::create_dir_all(&config_dir);
        Some(config_dir.join("aichitect_settings.cfg"))
    }

    fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("Aichitect"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Aichitect"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let base = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(base.join("aichitect"))
        }
    }

    /// Directory used by the local asset host when `asset_dir` is empty.
    pub fn resolved_asset_dir(&self) -> PathBuf {
        if !self.asset_dir.is_empty() {
            return PathBuf::from(&self.asset_dir);
        }
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("assets")
    }

    /// Serialize all keys as `key=value` lines.
    pub fn to_config_string(&self) -> String {
        let g = &self.generation;
        format!(
            "text_to_image_model={}\n\
             inpaint_model={}\n\
             structural_model={}\n\
             prompt_suffix={}\n\
             num_inference_steps={}\n\
             guidance_scale={}\n\
             num_samples={}\n\
             scheduler={}\n\
             inpaint_strength={}\n\
             asset_dir={}\n\
             pipeline_command={}\n\
             free_generations={}\n",
            g.text_to_image_model,
            g.inpaint_model,
            g.structural_model,
            g.prompt_suffix,
            g.num_inference_steps,
            g.guidance_scale,
            g.num_samples,
            g.scheduler,
            g.inpaint_strength,
            self.asset_dir,
            self.pipeline_command,
            self.free_generations,
        )
    }

    /// Parse `key=value` lines; unknown keys and bad values keep the default.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        let defaults = Self::default();
        for line in content.lines() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            // The suffix keeps its leading ", " so only strip the line ending.
            let raw = val.trim_end_matches(['\r', '\n']);
            let val = val.trim();
            let g = &mut s.generation;
            match key {
                "text_to_image_model" if !val.is_empty() => g.text_to_image_model = val.to_string(),
                "inpaint_model" if !val.is_empty() => g.inpaint_model = val.to_string(),
                "structural_model" if !val.is_empty() => g.structural_model = val.to_string(),
                "prompt_suffix" => g.prompt_suffix = raw.to_string(),
                "num_inference_steps" => {
                    g.num_inference_steps = val.parse().unwrap_or(defaults.generation.num_inference_steps);
                }
                "guidance_scale" => {
                    g.guidance_scale = val.parse().unwrap_or(defaults.generation.guidance_scale);
                }
                "num_samples" => {
                    g.num_samples = val.parse().unwrap_or(defaults.generation.num_samples);
                }
                "scheduler" if !val.is_empty() => g.scheduler = val.to_string(),
                "inpaint_strength" => {
                    g.inpaint_strength = val
                        .parse::<f32>()
                        .ok()
                        .filter(|v| (0.0..=1.0).contains(v))
                        .unwrap_or(defaults.generation.inpaint_strength);
                }
                "asset_dir" => s.asset_dir = val.to_string(),
                "pipeline_command" => s.pipeline_command = val.to_string(),
                "free_generations" => {
                    s.free_generations = val.parse().unwrap_or(defaults.free_generations);
                }
                _ => {}
            }
        }
        s
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_string_round_trip() {
        let mut s = AppSettings::default();
        s.generation.num_inference_steps = 42;
        s.generation.prompt_suffix = ", photoreal".to_string();
        s.pipeline_command = "python bridge.py --model x".to_string();
        s.free_generations = 0;

        assert_eq!(AppSettings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn test_bad_values_fall_back_to_defaults() {
        let parsed = AppSettings::from_config_str(
            "num_inference_steps=lots\ninpaint_strength=4.0\nscheduler=\n# comment=1\ngarbage line\n",
        );
        assert_eq!(parsed, AppSettings::default());
    }

    #[test]
    fn test_resolved_asset_dir_prefers_explicit() {
        let s = AppSettings {
            asset_dir: "/tmp/uploads".to_string(),
            ..AppSettings::default()
        };
        assert_eq!(s.resolved_asset_dir(), PathBuf::from("/tmp/uploads"));
    }
}
