use std::path::PathBuf;

use crate::assets::paths::AssetResolver;
use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::render::processor::{Processor, RenderStats};
use crate::scene::model::Scene;
use crate::template::TemplateContext;

/// One render job: template in, PNG out.
#[derive(Clone, Debug, Default)]
pub struct JobOpts {
    pub template: PathBuf,
    pub output: PathBuf,
    /// Exposed to the template as `args`.
    pub args: Vec<String>,
    /// Base directory for non-sentinel paths. `None` uses the process working directory.
    pub working_dir: Option<PathBuf>,
}

/// Outcome of a successful job.
#[derive(Clone, Debug)]
pub struct JobReport {
    pub scene: Scene,
    pub stats: RenderStats,
}

/// Native stack for template execution. Unoptimised builds spend several KiB per script call,
/// so the interpreter's call-depth limit needs more than a default 2 MiB spawned thread.
const SCRIPT_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Run the template and marshal its scene without rendering.
///
/// The script runs on a dedicated thread with a large stack, so runaway
/// recursion surfaces as a script error whichever thread calls this.
pub fn load_scene(opts: &JobOpts) -> ImagegenResult<Scene> {
    let resolver = AssetResolver::for_template(&opts.template, opts.working_dir.clone())?;
    let span = tracing::Span::current();
    std::thread::scope(|s| {
        let handle = std::thread::Builder::new()
            .name("imagegen-template".to_owned())
            .stack_size(SCRIPT_STACK_SIZE)
            .spawn_scoped(s, move || {
                let _entered = span.enter();
                let mut ctx = TemplateContext::new(&opts.template, resolver);
                ctx.set_args(opts.args.as_slice());
                ctx.run()
            })
            .map_err(|e| ImagegenError::io("spawn template thread", e))?;
        handle
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

/// Execute the template, render its scene and save the PNG.
///
/// Nothing is written when any step fails.
#[tracing::instrument(skip(opts), fields(template = %opts.template.display()))]
pub fn run(opts: &JobOpts) -> ImagegenResult<JobReport> {
    let scene = load_scene(opts)?;
    tracing::debug!(
        objects = scene.objects.len(),
        fonts = scene.fonts.len(),
        "scene marshalled"
    );

    let resolver = AssetResolver::for_template(&opts.template, opts.working_dir.clone())?;
    let mut processor = Processor::with_resolver(resolver);
    let stats = processor.process(&scene)?;
    processor.save_png(&opts.output)?;
    tracing::info!(output = %opts.output.display(), "image saved");

    Ok(JobReport { scene, stats })
}
