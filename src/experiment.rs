//! The generation pipeline: from a specification to the complete experiment tree.

use std::fs;
use std::path::{Path, PathBuf};

use failure::ResultExt;

use crate::{
    artifact::{ArtifactDescriptor, BootParameter},
    error::ConfigError,
    evaluation::{self, Copier},
    loadgen,
    program::{self, ProgramGenerator},
    render::{Renderer, RendererConfig},
    spec::{NodeConfig, Specification, Target, Testbed},
    t4p4s, testbed,
};

/// Where the generator finds its inputs. Everything defaults to a location below `base_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub base_path: PathBuf,
    pub templates: PathBuf,
    /// The `p4gen16` entry point.
    pub p4gen: PathBuf,
    /// The plot scripts and notebooks copied into each experiment.
    pub evaluation_tooling: PathBuf,
    pub node_configs: PathBuf,
    /// Fail on template variables that are not bound.
    pub strict_templates: bool,
}

impl GeneratorConfig {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        let base_path = base_path.as_ref().to_path_buf();

        GeneratorConfig {
            templates: base_path.join("templates"),
            p4gen: base_path.join("deps").join("p4gen16").join("generate.py"),
            evaluation_tooling: base_path.join("deps").join("plot_scripts"),
            node_configs: base_path.join("node_config"),
            strict_templates: false,
            base_path,
        }
    }

    /// Read `<node_configs>/<name>.json`.
    pub fn node_config(&self, name: &str) -> Result<NodeConfig, failure::Error> {
        let path = self.node_configs.join(format!("{}.json", name));
        let contents = fs::read_to_string(&path)
            .with_context(|_| format!("reading node configuration {}", path.display()))?;
        Ok(serde_json::from_str(&contents)
            .with_context(|_| format!("parsing node configuration {}", path.display()))?)
    }

    pub fn renderer(&self) -> Renderer {
        Renderer::new(&RendererConfig {
            templates_dir: self.templates.clone(),
            strict: self.strict_templates,
        })
    }
}

/// Output subdirectories, relative to the experiment root.
pub const DIRECTORIES: &[&str] = &[
    crate::paths::EXPERIMENT,
    crate::paths::EVALUATION,
    crate::paths::DATA,
    crate::paths::DUT,
    crate::paths::DUT_CONFIG,
    crate::paths::LG,
    crate::paths::LG_SCRIPT,
    crate::paths::LG_UTIL,
];

fn create_directories(outdir: &Path) -> Result<(), failure::Error> {
    log::info!("Creating output directory");

    for dir in DIRECTORIES {
        let path = outdir.join(dir);
        fs::create_dir_all(&path)
            .with_context(|_| format!("creating directory {}", path.display()))?;
    }

    Ok(())
}

/// Persist the specification as the first artifact of the run.
pub fn dump_specification(spec: &Specification) -> Result<(), failure::Error> {
    log::info!("Dumping specification");

    let path = spec.meta.outdir.join("specification.json");
    let dumped = serde_json::to_string_pretty(spec)?;
    fs::write(&path, dumped).with_context(|_| format!("writing {}", path.display()))?;

    Ok(())
}

/// The DUT setup of the target.
fn dut_setup(
    spec: &Specification,
) -> Result<(Vec<ArtifactDescriptor>, Vec<BootParameter>), ConfigError> {
    match spec.meta.target {
        Target::P4T4p4s => Ok(t4p4s::artifacts(spec)),
        target => Err(ConfigError::UnsupportedTarget {
            target,
            testbed: spec.meta.testbed,
        }),
    }
}

/// Generate the experiment tree of `spec`.
pub fn generate(
    spec: &Specification,
    config: &GeneratorConfig,
    generator: &dyn ProgramGenerator,
    copier: &dyn Copier,
) -> Result<(), failure::Error> {
    let outdir = &spec.meta.outdir;
    let renderer = config.renderer();

    create_directories(outdir)?;
    dump_specification(spec)?;

    let mut files = loadgen::artifacts(spec);
    renderer.render_all(&files, outdir)?;

    files.extend(program::expand(spec, generator)?);

    let (dut_files, boot_parameters) = dut_setup(spec)?;
    renderer.render_all(&dut_files, outdir)?;
    files.extend(dut_files);

    if spec.meta.testbed == Testbed::Pos {
        let pos = testbed::assemble(spec, &files, &boot_parameters);
        renderer.render_all(&pos, outdir)?;
    }

    testbed::write_loop_variables(spec)?;

    let evaluation = evaluation::wire(spec, &config.evaluation_tooling, copier)?;
    renderer.render_all(&evaluation, outdir)?;

    log::info!("Experiment written to {}", outdir.display());

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::spec;
    use crate::{features::Feature, spec::Testbed};

    #[test]
    fn defaults_are_below_base_path() {
        let config = GeneratorConfig::new("/opt/benchgen");
        assert_eq!(config.templates, PathBuf::from("/opt/benchgen/templates"));
        assert_eq!(
            config.p4gen,
            PathBuf::from("/opt/benchgen/deps/p4gen16/generate.py")
        );
        assert_eq!(
            config.evaluation_tooling,
            PathBuf::from("/opt/benchgen/deps/plot_scripts")
        );
        assert_eq!(config.node_configs, PathBuf::from("/opt/benchgen/node_config"));
    }

    #[test]
    fn only_t4p4s_has_a_dut_setup() {
        assert!(dut_setup(&spec(Target::P4T4p4s, Feature::Load)).is_ok());

        let mut nfp = spec(Target::P4Nfp, Feature::Load);
        nfp.meta.testbed = Testbed::Manual;
        let err = dut_setup(&nfp).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err,
            ConfigError::UnsupportedTarget {
                target: Target::P4Nfp,
                testbed: Testbed::Manual,
            }
        );
    }

    #[test]
    fn missing_node_config() {
        let config = GeneratorConfig::new("/nonexistent");
        assert!(config.node_config("lg_dut").is_err());
    }
}
