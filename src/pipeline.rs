use crate::{
    data::DigitDataset,
    evaluate::{evaluate, predict, Evaluation},
    model::DigitModel,
    persist::save_model,
    show::save_grid,
    training::{train, TrainingConfig},
    Error,
};
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use std::path::{Path, PathBuf};

/// Number of digits shown in the sample and prediction grids.
const GRID_SIZE: usize = 9;
const GRID_COLUMNS: usize = 3;

/// What a pipeline run produced.
#[derive(Clone, Debug)]
pub struct Report {
    pub evaluation: Evaluation,
    pub model_path: PathBuf,
    pub samples_image: PathBuf,
    pub predictions_image: PathBuf,
}

/// Downloads MNIST and runs the whole pipeline on it.
pub fn run<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    device: B::Device,
) -> Result<Report, Error> {
    let dataset_train = DigitDataset::train(config.train_samples);
    let dataset_test = DigitDataset::test(config.test_samples);

    run_on::<B>(artifact_dir, config, dataset_train, dataset_test, device)
}

/// Shows a few training digits, trains the configured architecture, saves it,
/// reloads it and evaluates the reloaded model on `dataset_test`.
///
/// The test split doubles as the validation set watched by early stopping.
pub fn run_on<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    dataset_train: DigitDataset,
    dataset_test: DigitDataset,
    device: B::Device,
) -> Result<Report, Error> {
    let dir = Path::new(artifact_dir);

    let samples_image = dir.join("samples.png");
    let samples = &dataset_train.items()[..GRID_SIZE.min(dataset_train.items().len())];
    save_grid(samples, None, GRID_COLUMNS, &samples_image)?;

    let model = config.model.init::<B>(&device);
    log::info!(
        "Training {} with {} parameters on {} digits",
        model.architecture(),
        model.num_params(),
        dataset_train.items().len()
    );

    let model_path = match model {
        DigitModel::ConvNet(model) => {
            let model = train::<B, _>(
                artifact_dir,
                &config,
                model,
                dataset_train,
                dataset_test.clone(),
                device.clone(),
            )?;
            save_model(model.valid(), dir)?
        }
        DigitModel::DeepConvNet(model) => {
            let model = train::<B, _>(
                artifact_dir,
                &config,
                model,
                dataset_train,
                dataset_test.clone(),
                device.clone(),
            )?;
            save_model(model.valid(), dir)?
        }
    };

    let model = DigitModel::<B::InnerBackend>::load(dir, &device)?;

    let evaluation = evaluate::<B::InnerBackend, _>(
        &model,
        dataset_test.clone(),
        config.batch_size,
        &device,
    )?;
    log::info!("Test {evaluation}");

    let samples = &dataset_test.items()[..GRID_SIZE.min(dataset_test.items().len())];
    let predictions = predict::<B::InnerBackend, _>(&model, samples, &device);
    let predictions_image = dir.join("predictions.png");
    save_grid(samples, Some(&predictions), GRID_COLUMNS, &predictions_image)?;

    Ok(Report {
        evaluation,
        model_path,
        samples_image,
        predictions_image,
    })
}
