use chromdyn::core::io::StructureFormat;
use chromdyn::engine::config::{InitMode, ReporterConfig};
use std::path::PathBuf;

pub struct DefaultsConfig {
    pub name: String,
    pub output_dir: PathBuf,
    pub init_mode: InitMode,
    pub ring: bool,
    pub center: bool,
    pub steps: u64,
    pub block: u64,
    pub verbose_blocks: bool,
    pub reporters: ReporterConfig,
    pub save_formats: Vec<StructureFormat>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            name: "chromdyn".to_string(),
            output_dir: PathBuf::from("output"),
            init_mode: InitMode::Spring,
            ring: false,
            center: true,
            steps: 10_000,
            block: 1_000,
            verbose_blocks: false,
            reporters: ReporterConfig::default(),
            save_formats: vec![StructureFormat::Ndb],
        }
    }
}
