use crate::{
    data::{DigitBatch, DigitBatcher, DigitDataset},
    model::ModelConfig,
    renderer::LogRenderer,
    Error,
};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::AdamConfig,
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{
        checkpoint::KeepLastNCheckpoints,
        metric::{
            store::{Aggregate, Direction, Split},
            AccuracyMetric, LossMetric,
        },
        ClassificationOutput, LearnerBuilder, MetricEarlyStoppingStrategy, StoppingCondition,
        TrainStep, ValidStep,
    },
};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

#[derive(Config)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
    /// Stop once the validation loss has not improved for this many epochs.
    #[config(default = 2)]
    pub early_stopping_patience: usize,
    /// Keep only the first samples of the training split.
    #[config(default = "None")]
    pub train_samples: Option<usize>,
    /// Keep only the first samples of the test split.
    #[config(default = "None")]
    pub test_samples: Option<usize>,
    /// Resume training from the checkpoint saved at this epoch.
    #[config(default = "None")]
    pub resume_from: Option<usize>,
    /// Show burn's terminal dashboard instead of logging progress.
    #[config(default = false)]
    pub dashboard: bool,
    #[config(default = 100)]
    pub log_interval: usize,
}

impl TrainingConfig {
    pub fn path(artifact_dir: impl AsRef<Path>) -> PathBuf {
        artifact_dir.as_ref().join("config.json")
    }

    /// Reads the config saved next to a trained model.
    pub fn load_from(artifact_dir: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::load(Self::path(artifact_dir))?)
    }
}

/// Fits `model` on `dataset_train`, validating every epoch on `dataset_valid`.
///
/// A checkpoint is written under `{artifact_dir}/checkpoint` after each epoch and
/// the config is saved as `{artifact_dir}/config.json`. Training ends after
/// `num_epochs` or as soon as the validation loss stops improving for
/// `early_stopping_patience` epochs.
pub fn train<B, M>(
    artifact_dir: &str,
    config: &TrainingConfig,
    model: M,
    dataset_train: DigitDataset,
    dataset_valid: DigitDataset,
    device: B::Device,
) -> Result<M, Error>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>
        + TrainStep<DigitBatch<B>, ClassificationOutput<B>>
        + core::fmt::Display
        + 'static,
    M::InnerModule: ValidStep<DigitBatch<B::InnerBackend>, ClassificationOutput<B::InnerBackend>>,
{
    std::fs::create_dir_all(artifact_dir)?;
    config.save(TrainingConfig::path(artifact_dir))?;

    B::seed(config.seed);

    let batcher_train = DigitBatcher::<B>::new(device.clone());
    let batcher_valid = DigitBatcher::<B::InnerBackend>::new(device.clone());

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset_valid);

    let mut builder = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .with_checkpointing_strategy(KeepLastNCheckpoints::new(config.num_epochs))
        .early_stopping(MetricEarlyStoppingStrategy::new::<LossMetric<B>>(
            Aggregate::Mean,
            Direction::Lowest,
            Split::Valid,
            StoppingCondition::NoImprovementSince {
                n_epochs: config.early_stopping_patience,
            },
        ))
        .devices(vec![device])
        .num_epochs(config.num_epochs)
        .summary();

    if let Some(epoch) = config.resume_from {
        log::info!("Resuming from the checkpoint of epoch {epoch}");
        builder = builder.checkpoint(epoch);
    }
    if !config.dashboard {
        builder = builder.renderer(LogRenderer::new(config.log_interval));
    }

    let learner = builder.build(model, config.optimizer.init(), config.learning_rate);

    let now = Instant::now();
    let model_trained = learner.fit(dataloader_train, dataloader_valid);
    let elapsed = now.elapsed().as_secs();
    log::info!("Training completed in {}m{}s", elapsed / 60, elapsed % 60);

    Ok(model_trained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Architecture;

    #[test]
    fn config_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig::new(
            ModelConfig::new().with_architecture(Architecture::DeepConvNet),
            AdamConfig::new(),
        )
        .with_num_epochs(3)
        .with_train_samples(Some(1000));

        config.save(TrainingConfig::path(dir.path())).unwrap();
        let loaded = TrainingConfig::load_from(dir.path()).unwrap();

        assert_eq!(loaded.model.architecture, Architecture::DeepConvNet);
        assert_eq!(loaded.num_epochs, 3);
        assert_eq!(loaded.train_samples, Some(1000));
        assert_eq!(loaded.test_samples, None);
        assert_eq!(loaded.early_stopping_patience, 2);
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            TrainingConfig::load_from(dir.path()),
            Err(Error::Config(_))
        ));
    }
}
