//! Shared fixtures: scratch directories, a fake program generator and evaluation tooling.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use benchgen::{
    artifact::ArtifactDescriptor,
    evaluation::Copier,
    experiment::GeneratorConfig,
    features::Feature,
    program::{ProgramGenerator, ProgramRequest},
    spec::{NodeConfig, Specification, Target, Testbed},
    synthesize::{synthesize, Selection},
};

/// A fresh, empty directory below the system temp directory.
pub fn scratch_dir(name: &str) -> PathBuf {
    let mut rng = SmallRng::from_entropy();
    let dir = std::env::temp_dir().join(format!("benchgen-it-{}-{:016x}", name, rng.gen::<u64>()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// All files below `root`, by path relative to `root`.
pub fn read_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files);
    files
}

/// The topology shipped in `node_config/`.
pub fn nodes() -> NodeConfig {
    GeneratorConfig::new(env!("CARGO_MANIFEST_DIR"))
        .node_config("lg_dut")
        .unwrap()
}

pub fn spec(target: Target, testbed: Testbed, feature: Feature, outdir: &Path) -> Specification {
    synthesize(
        &Selection {
            target,
            testbed,
            outdir: outdir.to_path_buf(),
            max_load_repetitions: 3,
            feature,
        },
        &nodes(),
    )
    .unwrap()
}

/// Writes placeholder programs instead of running p4gen16, and records every request.
#[derive(Default)]
pub struct FakeGenerator {
    pub requests: RefCell<Vec<ProgramRequest>>,
}

impl ProgramGenerator for FakeGenerator {
    fn generate(&self, request: &ProgramRequest) -> Result<Vec<ArtifactDescriptor>, failure::Error> {
        let outdir = request.outdir.join(&request.config_path);
        fs::create_dir_all(&outdir)?;
        fs::write(
            outdir.join("program.p4"),
            format!("// {:?}\n", request.args),
        )?;
        fs::write(outdir.join("controller"), "")?;
        if request.args.skip_filling_tables {
            fs::write(outdir.join("controlplane.c.py"), "")?;
        }

        self.requests.borrow_mut().push(request.clone());
        Ok(request.artifacts())
    }
}

/// Copies with `std::fs`, overwriting existing files.
pub struct FsCopier;

impl Copier for FsCopier {
    fn copy(&self, from: &Path, to: &Path) -> Result<(), failure::Error> {
        let dest = to.join(from.file_name().unwrap());
        if from.is_dir() {
            fs::create_dir_all(&dest)?;
            for entry in fs::read_dir(from)? {
                self.copy(&entry?.path(), &dest)?;
            }
        } else {
            fs::copy(from, &dest)?;
        }
        Ok(())
    }
}

pub const PLOT_FILES: &[&str] = &[
    "plot_throughput.ipynb",
    "plot_throughput.py",
    "plot_latency.ipynb",
    "plot_latency.py",
    "plot_perf_stat.ipynb",
    "plot_perf_stat.py",
];

/// A minimal evaluation tooling tree below `root`.
pub fn tooling(root: &Path) -> PathBuf {
    let tooling = root.join("plot_scripts");
    fs::create_dir_all(tooling.join("util").join("__pycache__")).unwrap();
    fs::create_dir_all(tooling.join("sample_data")).unwrap();
    fs::write(tooling.join("util").join("helpers.py"), "").unwrap();
    fs::write(tooling.join("util").join("__pycache__").join("helpers.pyc"), "").unwrap();
    fs::write(tooling.join("sample_data").join("run.csv"), "").unwrap();
    fs::write(tooling.join("requirements.txt"), "matplotlib\n").unwrap();
    for file in PLOT_FILES {
        fs::write(tooling.join(file), "import util\n#$configuration\n").unwrap();
    }
    tooling
}

/// The generator configuration of the crate checkout, with the tooling below `root`.
pub fn config(root: &Path) -> GeneratorConfig {
    let mut config = GeneratorConfig::new(env!("CARGO_MANIFEST_DIR"));
    config.evaluation_tooling = tooling(root);
    config.strict_templates = false;
    config
}
