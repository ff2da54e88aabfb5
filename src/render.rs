//! Rendering of templated artifacts into the output tree.

use std::fs;
use std::path::{Path, PathBuf};

use failure::ResultExt;

use handlebars::Handlebars;

use crate::artifact::{ArtifactDescriptor, Dialect, Variables};

/// Block delimiter of the code dialect (opens and closes a block tag).
const CODE_BLOCK: &str = "@@";
/// Variable delimiters of the code dialect.
const CODE_VAR_START: &str = "@=";
const CODE_VAR_END: &str = "=@";

/// Renders a template by name.
pub trait TemplateEngine {
    fn render(&self, template_id: &str, variables: &Variables) -> Result<String, failure::Error>;
}

/// Settings of the template engines for one generation run.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Directory template ids are resolved against.
    pub templates_dir: PathBuf,
    /// Fail on variables that are not bound, instead of rendering them empty.
    pub strict: bool,
}

/// The default dialect: plain handlebars.
pub struct HandlebarsEngine {
    registry: Handlebars<'static>,
    templates_dir: PathBuf,
}

impl HandlebarsEngine {
    pub fn new(config: &RendererConfig) -> Self {
        let mut registry = Handlebars::new();
        // Artifacts are scripts and configuration files, not HTML.
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(config.strict);

        HandlebarsEngine {
            registry,
            templates_dir: config.templates_dir.clone(),
        }
    }

    fn load(&self, template_id: &str) -> Result<String, failure::Error> {
        let path = self.templates_dir.join(template_id);
        Ok(fs::read_to_string(&path)
            .with_context(|_| format!("reading template {}", path.display()))?)
    }

    fn render_source(
        &self,
        template_id: &str,
        source: &str,
        variables: &Variables,
    ) -> Result<String, failure::Error> {
        Ok(self
            .registry
            .render_template(source, variables)
            .with_context(|_| format!("rendering template {}", template_id))?)
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn render(&self, template_id: &str, variables: &Variables) -> Result<String, failure::Error> {
        let source = self.load(template_id)?;
        self.render_source(template_id, &source, variables)
    }
}

/// The code dialect: `@= var =@` and `@@#if cond@@ ... @@/if@@`. Literal `{{` in the template is
/// passed through untouched.
pub struct CodeEngine {
    inner: HandlebarsEngine,
}

impl CodeEngine {
    pub fn new(config: &RendererConfig) -> Self {
        CodeEngine {
            inner: HandlebarsEngine::new(config),
        }
    }
}

impl TemplateEngine for CodeEngine {
    fn render(&self, template_id: &str, variables: &Variables) -> Result<String, failure::Error> {
        let source = self.inner.load(template_id)?;
        let source = code_to_handlebars(&source)
            .with_context(|_| format!("translating template {}", template_id))?;
        self.inner.render_source(template_id, &source, variables)
    }
}

/// Translate the code dialect into handlebars syntax.
fn code_to_handlebars(source: &str) -> Result<String, failure::Error> {
    let escaped = source.replace("{{", "\\{{");

    let parts: Vec<&str> = escaped.split(CODE_BLOCK).collect();
    if parts.len() % 2 == 0 {
        failure::bail!("unbalanced `{}` block delimiter", CODE_BLOCK);
    }

    let mut out = String::with_capacity(escaped.len());
    for (i, part) in parts.iter().enumerate() {
        if i % 2 == 1 {
            out.push_str("{{");
            out.push_str(part.trim());
            out.push_str("}}");
        } else {
            out.push_str(
                &part
                    .replace(CODE_VAR_START, "{{")
                    .replace(CODE_VAR_END, "}}"),
            );
        }
    }

    Ok(out)
}

/// Renders artifact descriptors into an output tree.
pub struct Renderer {
    default: Box<dyn TemplateEngine>,
    code: Box<dyn TemplateEngine>,
}

impl Renderer {
    pub fn new(config: &RendererConfig) -> Self {
        Renderer {
            default: Box::new(HandlebarsEngine::new(config)),
            code: Box::new(CodeEngine::new(config)),
        }
    }

    /// Use the given engines instead of the handlebars ones.
    pub fn with_engines(default: Box<dyn TemplateEngine>, code: Box<dyn TemplateEngine>) -> Self {
        Renderer { default, code }
    }

    fn engine(&self, dialect: Dialect) -> &dyn TemplateEngine {
        match dialect {
            Dialect::Default => self.default.as_ref(),
            Dialect::Code => self.code.as_ref(),
        }
    }

    /// Render a single descriptor. Files produced by external tools are skipped. Nothing is
    /// written if rendering fails.
    pub fn render(
        &self,
        desc: &ArtifactDescriptor,
        output_root: &Path,
    ) -> Result<(), failure::Error> {
        let template = match &desc.template {
            Some(template) => template,
            None => return Ok(()),
        };

        log::debug!("rendering {} -> {}", template, desc.to.display());

        let rendered = self.engine(desc.dialect).render(template, &desc.variables)?;

        let dst = output_root.join(&desc.to);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|_| format!("creating directory {}", parent.display()))?;
        }
        fs::write(&dst, rendered).with_context(|_| format!("writing {}", dst.display()))?;

        Ok(())
    }

    /// Render all descriptors, in order.
    pub fn render_all(
        &self,
        descriptors: &[ArtifactDescriptor],
        output_root: &Path,
    ) -> Result<(), failure::Error> {
        for desc in descriptors {
            self.render(desc, output_root)?;
        }
        Ok(())
    }
}
