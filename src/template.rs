//! Template host: runs a template script and extracts its scene.
//!
//! Before execution the host injects the scene constructors (`Vec`, `Blend`, `Brush`, `Pen`,
//! `Font`, `Image`, `Label`, `Scene`/`Main`), the `input` helper, the `TEMPLATEPATH` and
//! `TEMPLATE` constants, and the `args` table.

use std::path::{Path, PathBuf};

use crate::assets::paths::AssetResolver;
use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::scene::model::{Blend, Brush, Drawable, Font, Pen, Scene, Vector};
use crate::script::interp::Interpreter;
use crate::script::stdlib;
use crate::script::value::{UserData, Value};

fn constructor<T>(
    name: &'static str,
    build: fn(&[Value]) -> ImagegenResult<T>,
) -> Value
where
    T: UserData + 'static,
{
    Value::native(name, move |args| Ok(vec![Value::user_data(build(&args)?)]))
}

/// One template execution.
pub struct TemplateContext {
    interp: Interpreter,
    template_path: PathBuf,
    executed: bool,
}

impl TemplateContext {
    /// Prepare an interpreter for the template at `template_path` (which need not exist yet when
    /// running from a string via [`TemplateContext::execute_source`]).
    pub fn new(template_path: &Path, resolver: AssetResolver) -> Self {
        let full_path = crate::assets::paths::absolutize(template_path, resolver.working_dir());
        let stem = full_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_owned());

        let interp = Interpreter::new(stem.clone());
        stdlib::install(&interp);

        interp.set_global("Vec", constructor("Vec", Vector::from_args));
        interp.set_global("Blend", constructor("Blend", Blend::from_args));
        interp.set_global("Brush", constructor("Brush", Brush::from_args));
        interp.set_global("Pen", constructor("Pen", Pen::from_args));
        interp.set_global("Font", constructor("Font", Font::from_args));
        interp.set_global("Image", constructor("Image", Drawable::image_from_args));
        interp.set_global("Label", constructor("Label", Drawable::label_from_args));
        interp.set_global("Scene", constructor("Scene", Scene::from_args));
        interp.set_global("Main", constructor("Main", Scene::from_args));

        interp.set_global(
            "input",
            Value::native("input", move |args| {
                let Some(path) = args.first().and_then(Value::as_str) else {
                    return Err(ImagegenError::script(
                        "bad argument #1 to 'input' (string expected)",
                    ));
                };
                let resolved = resolver.resolve(path);
                let text = std::fs::read_to_string(&resolved).map_err(|e| {
                    ImagegenError::io(format!("input '{}'", resolved.display()), e)
                })?;
                Ok(vec![Value::from(text)])
            }),
        );

        interp.set_global(
            "TEMPLATEPATH",
            Value::from(full_path.to_string_lossy().into_owned()),
        );
        interp.set_global("TEMPLATE", Value::from(stem));
        interp.set_global("args", Value::string_array(Vec::<String>::new()));

        Self {
            interp,
            template_path: full_path,
            executed: false,
        }
    }

    /// Expose extra command-line arguments as the `args` array.
    pub fn set_args<S: AsRef<str>>(&mut self, args: &[S]) {
        self.interp.set_global("args", Value::string_array(args));
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    /// Read the template file and run it.
    pub fn execute(&mut self) -> ImagegenResult<Vec<Value>> {
        let src = std::fs::read_to_string(&self.template_path).map_err(|e| {
            ImagegenError::io(format!("read template '{}'", self.template_path.display()), e)
        })?;
        self.execute_source(&src)
    }

    /// Run template source. A context runs at most once.
    pub fn execute_source(&mut self, src: &str) -> ImagegenResult<Vec<Value>> {
        if self.executed {
            return Err(ImagegenError::script("template has already been executed"));
        }
        self.executed = true;
        self.interp.exec_source(src)
    }

    /// Marshal the scene from a finished execution.
    ///
    /// A returned table or `Scene` object wins; otherwise the global table is the scene
    /// (`background = "..."` at top level).
    pub fn scene(&self, returned: &[Value]) -> ImagegenResult<Scene> {
        if !self.executed {
            return Err(ImagegenError::script(
                "template must be executed before extracting its scene",
            ));
        }
        match returned.first() {
            Some(v @ (Value::Table(_) | Value::UserData(_))) => Scene::from_value(v),
            _ => Scene::from_value(&Value::Table(self.interp.globals().clone())),
        }
    }

    /// Execute the template file and marshal its scene.
    #[tracing::instrument(skip(self), fields(template = %self.template_path.display()))]
    pub fn run(&mut self) -> ImagegenResult<Scene> {
        let returned = self.execute()?;
        self.scene(&returned)
    }
}

#[cfg(test)]
#[path = "../tests/unit/template.rs"]
mod tests;
