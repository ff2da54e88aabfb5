//! Planned output files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Variables bound into a template.
pub type Variables = BTreeMap<String, serde_json::Value>;

/// The two nodes of the testbed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The load generator.
    Loadgen,
    /// The device under test.
    Dut,
}

impl Role {
    /// The orchestrator variable that holds the node name of this role.
    pub fn node_variable(&self) -> &'static str {
        match self {
            Role::Loadgen => "${LG}",
            Role::Dut => "${DUT}",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Loadgen => "lg",
            Role::Dut => "dut",
        })
    }
}

/// The delimiter convention a template is written in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// `{{ var }}` and `{{#if ...}}`.
    Default,
    /// `@= var =@` and `@@#if ...@@`, for artifacts that use `{{` themselves.
    Code,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Default
    }
}

/// One planned output file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDescriptor {
    /// The template to render, relative to the templates directory. `None` if the file is
    /// produced by an external tool and only needs to be deployed.
    pub template: Option<String>,
    /// Destination, relative to the output root.
    pub to: PathBuf,
    /// The node the file is deployed to, if any.
    pub device: Option<Role>,
    /// Remote destination on `device`.
    pub copy: Option<String>,
    /// Deploy once when the node is set up, rather than before every run.
    pub for_setup: bool,
    pub dialect: Dialect,
    pub variables: Variables,
}

impl ArtifactDescriptor {
    /// A file rendered from `template` to `to`.
    pub fn template(template: &str, to: impl AsRef<Path>) -> Self {
        ArtifactDescriptor {
            template: Some(template.into()),
            to: to.as_ref().to_path_buf(),
            device: None,
            copy: None,
            for_setup: false,
            dialect: Dialect::Default,
            variables: Variables::new(),
        }
    }

    /// A file produced by an external tool at `to`.
    pub fn generated(to: impl AsRef<Path>) -> Self {
        ArtifactDescriptor {
            template: None,
            ..Self::template("", to)
        }
    }

    /// Deploy to `dest` on the node with the given role.
    pub fn deploy(mut self, device: Role, dest: impl Into<String>) -> Self {
        self.device = Some(device);
        self.copy = Some(dest.into());
        self
    }

    /// Deploy only once, during setup.
    pub fn setup_only(mut self) -> Self {
        self.for_setup = true;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Bind a template variable. `value` must be plain data: maps need string keys.
    pub fn var(mut self, name: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value)
            .expect("template variables are plain data with string keys");
        self.variables.insert(name.into(), value);
        self
    }
}

/// A kernel command line for one of the nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootParameter {
    pub device: Role,
    pub parameters: String,
}
