//! 程序运行函数.

use crate::cli::{Cli, CohortArgs, Command, RootArgs};
use crate::result::StepResult;
use anyhow::Context;
use patho_berry::aggregate::Aggregator;
use patho_berry::batch::{self, BatchReport, RoiTask};
use patho_berry::batch::{CellMaskStep, ConvertStep, EmbedStep, ExtractStep, LesionStep, TextureStep};
use patho_berry::classify::{GbtModel, ModelHandle};
use patho_berry::dataset::{self, combine, table, DatasetLayout, LesionStages, RoiLoader};
use patho_berry::error::RoiResult;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

/// 实际运行.
pub fn run(cli: Cli) -> anyhow::Result<StepResult> {
    match cli.command {
        Command::Extract {
            cohort,
            min_cell_num,
            unit_area_scale,
            model,
        } => extract(&cohort, min_cell_num, unit_area_scale, model),
        Command::Lesion {
            cohort,
            unit_area_scale,
        } => lesion(&cohort, unit_area_scale),
        Command::Embed {
            cohort,
            reduction_size,
        } => embed(&cohort, reduction_size),
        Command::Texture { cohort } => texture(&cohort),
        Command::CellMask { cohort } => cell_mask(&cohort),
        Command::ConvertSegs { cohort } => convert_segs(&cohort),
        Command::Combine { root } => combine_cohorts(&root),
        Command::ImportModel {
            root,
            input,
            output,
        } => import_model(&root, input, output),
    }
}

/// 按 `--workers` 选择顺序或并行执行.
fn dispatch<T: RoiTask>(
    cohort: &CohortArgs,
    loader: RoiLoader<T::Input>,
    task: &T,
) -> RoiResult<BatchReport<T::Output>> {
    log::info!(
        "{}: {} ROI(s) found under {}",
        cohort.dataset,
        loader.len(),
        loader.layout().root().display()
    );
    if cohort.workers == 1 {
        batch::run(loader, task)
    } else {
        batch::init_workers(utils::workers_or_cpus(cohort.workers));
        batch::run_par(loader, task)
    }
}

fn stages_of(layout: &DatasetLayout) -> anyhow::Result<LesionStages> {
    let stages = LesionStages::open_or_empty(layout.lesion_stages())?;
    log::debug!("{} stage(s) loaded", stages.len());
    Ok(stages)
}

fn extract(
    cohort: &CohortArgs,
    min_cell_num: usize,
    unit_area_scale: f64,
    model: Option<PathBuf>,
) -> anyhow::Result<StepResult> {
    let layout = cohort.layout()?;
    let data_root = cohort.root.resolve()?;
    let model_path = utils::loader::model_path_or_default(model, &data_root);
    let model = ModelHandle::open(&model_path)
        .with_context(|| format!("loading cell classifier `{}`", model_path.display()))?;
    let stages = stages_of(&layout)?;

    layout.reset_dir(DatasetLayout::CELL_FEA_DIR)?;
    let aggregator = Aggregator::new()
        .with_min_cell_count(min_cell_num)
        .with_unit_area_scale(unit_area_scale);
    let step = ExtractStep::new(layout.clone(), aggregator, model, stages);
    let report = dispatch(cohort, dataset::roi_loader(layout.clone())?, &step)?;

    let res = StepResult::from_report("extract", &report)
        .with_output(layout.dir(DatasetLayout::CELL_FEA_DIR))
        .with_output(layout.lesion_features());
    table::save_lesions(layout.lesion_features(), &report.into_outputs())?;
    Ok(res)
}

fn lesion(cohort: &CohortArgs, unit_area_scale: f64) -> anyhow::Result<StepResult> {
    let layout = cohort.layout()?;
    let stages = stages_of(&layout)?;
    let step = LesionStep::new(
        Aggregator::new().with_unit_area_scale(unit_area_scale),
        stages,
    );
    let report = dispatch(cohort, dataset::cell_table_loader(layout.clone())?, &step)?;

    let res = StepResult::from_report("lesion", &report).with_output(layout.lesion_features());
    table::save_lesions(layout.lesion_features(), &report.into_outputs())?;
    Ok(res)
}

fn embed(cohort: &CohortArgs, reduction_size: u32) -> anyhow::Result<StepResult> {
    anyhow::ensure!(reduction_size > 0, "--reduction-size must be positive");
    let layout = cohort.layout()?;
    let loader = dataset::cell_table_loader(layout.clone())?;
    let out = layout.reset_dir(DatasetLayout::EMBED_DIR)?;
    let step = EmbedStep::with_reduction(layout, reduction_size);
    let report = dispatch(cohort, loader, &step)?;
    Ok(StepResult::from_report("embed", &report).with_output(out))
}

fn texture(cohort: &CohortArgs) -> anyhow::Result<StepResult> {
    let layout = cohort.layout()?;
    let step = TextureStep::new(stages_of(&layout)?);
    let report = dispatch(cohort, dataset::embed_loader(layout.clone())?, &step)?;

    let res = StepResult::from_report("texture", &report).with_output(layout.texture_features());
    table::save_textures(layout.texture_features(), &report.into_outputs())?;
    Ok(res)
}

fn cell_mask(cohort: &CohortArgs) -> anyhow::Result<StepResult> {
    let layout = cohort.layout()?;
    let loader = dataset::roi_loader(layout.clone())?;
    let out = layout.reset_dir(DatasetLayout::CELL_MASK_DIR)?;
    let report = dispatch(cohort, loader, &CellMaskStep::new(layout))?;
    Ok(StepResult::from_report("cell-mask", &report).with_output(out))
}

fn convert_segs(cohort: &CohortArgs) -> anyhow::Result<StepResult> {
    let layout = cohort.layout()?;
    let loader = dataset::raw_seg_loader(layout.clone())?;
    let out = layout.ensure_dir(DatasetLayout::ROI_SEG_DIR)?;
    let report = dispatch(cohort, loader, &ConvertStep::new(layout))?;
    let cells: usize = report.outputs.iter().map(|(_, n)| n).sum();
    log::info!("{cells} cell(s) converted");
    Ok(StepResult::from_report("convert-segs", &report).with_output(out))
}

fn combine_cohorts(root: &RootArgs) -> anyhow::Result<StepResult> {
    let data_root = root.resolve()?;
    let (out, rows) = combine::combine_cohorts(&data_root)?;
    log::info!("{rows} lesion(s) in the combined table");
    Ok(StepResult::single("combine").with_output(out))
}

fn import_model(
    root: &RootArgs,
    input: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<StepResult> {
    let output = match output {
        Some(p) => p,
        None => dataset::model_path(root.resolve()?),
    };
    let file =
        File::open(&input).with_context(|| format!("opening `{}`", input.display()))?;
    let model = GbtModel::from_xgboost_json(BufReader::new(file))
        .with_context(|| format!("importing `{}`", input.display()))?;
    log::info!("{} tree(s) imported", model.tree_len());

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating `{}`", dir.display()))?;
    }
    model.save(&output)?;
    Ok(StepResult::single("import-model").with_output(output))
}
