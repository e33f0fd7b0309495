//! Saving and reloading trained models.
//!
//! The final model is stored at full precision as `{artifact_dir}/model.mpk`,
//! while the learner's per-epoch checkpoints live in
//! `{artifact_dir}/checkpoint/model-{epoch}.mpk` at half precision.

use crate::{
    model::{DigitModel, ModelConfig},
    training::TrainingConfig,
    Error,
};
use burn::{
    prelude::*,
    record::{CompactRecorder, FullPrecisionSettings, NamedMpkFileRecorder},
};
use std::path::{Path, PathBuf};

/// Recorder used for the final model.
pub type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Path of the saved model, without the extension added by the recorder.
pub fn model_path(artifact_dir: impl AsRef<Path>) -> PathBuf {
    artifact_dir.as_ref().join("model")
}

/// Path of the checkpoint saved after `epoch`, without extension.
pub fn checkpoint_path(artifact_dir: impl AsRef<Path>, epoch: usize) -> PathBuf {
    artifact_dir
        .as_ref()
        .join("checkpoint")
        .join(format!("model-{epoch}"))
}

/// Writes `model` into `artifact_dir` and returns the file it was written to.
pub fn save_model<B: Backend, M: Module<B>>(
    model: M,
    artifact_dir: impl AsRef<Path>,
) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(artifact_dir.as_ref())?;
    let path = model_path(artifact_dir);
    model.save_file(path.clone(), &ModelRecorder::new())?;

    let path = path.with_extension("mpk");
    log::info!("Model saved to {}", path.display());
    Ok(path)
}

/// Loads the model saved in `artifact_dir` into `model`.
pub fn load_model<B: Backend, M: Module<B>>(
    model: M,
    artifact_dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<M, Error> {
    Ok(model.load_file(model_path(artifact_dir), &ModelRecorder::new(), device)?)
}

/// Loads the checkpoint saved after `epoch` into `model`.
pub fn load_checkpoint<B: Backend, M: Module<B>>(
    model: M,
    artifact_dir: impl AsRef<Path>,
    epoch: usize,
    device: &B::Device,
) -> Result<M, Error> {
    Ok(model.load_file(
        checkpoint_path(artifact_dir, epoch),
        &CompactRecorder::new(),
        device,
    )?)
}

enum Source {
    Model,
    Checkpoint(usize),
}

impl<B: Backend> DigitModel<B> {
    /// Rebuilds the architecture named in `config.json` and loads the trained
    /// parameters saved in `artifact_dir`.
    pub fn load(artifact_dir: impl AsRef<Path>, device: &B::Device) -> Result<Self, Error> {
        let config = TrainingConfig::load_from(artifact_dir.as_ref())?;
        Self::load_with(&config.model, artifact_dir, Source::Model, device)
    }

    /// Same as [load](Self::load), from the checkpoint written after `epoch`.
    pub fn from_checkpoint(
        artifact_dir: impl AsRef<Path>,
        epoch: usize,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let config = TrainingConfig::load_from(artifact_dir.as_ref())?;
        Self::load_with(&config.model, artifact_dir, Source::Checkpoint(epoch), device)
    }

    fn load_with(
        config: &ModelConfig,
        artifact_dir: impl AsRef<Path>,
        source: Source,
        device: &B::Device,
    ) -> Result<Self, Error> {
        fn load<B: Backend, M: Module<B>>(
            model: M,
            artifact_dir: &Path,
            source: &Source,
            device: &B::Device,
        ) -> Result<M, Error> {
            match source {
                Source::Model => load_model(model, artifact_dir, device),
                Source::Checkpoint(epoch) => load_checkpoint(model, artifact_dir, *epoch, device),
            }
        }

        let dir = artifact_dir.as_ref();
        let model = match config.init::<B>(device) {
            Self::ConvNet(model) => Self::ConvNet(load(model, dir, &source, device)?),
            Self::DeepConvNet(model) => Self::DeepConvNet(load(model, dir, &source, device)?),
        };

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Architecture, DigitClassifier};
    use burn::{backend::NdArray, optim::AdamConfig, tensor::Distribution};

    type TestBackend = NdArray<f32>;

    fn images(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        Tensor::random([4, 28, 28, 1], Distribution::Uniform(0.0, 1.0), device)
    }

    #[test]
    fn reloaded_model_predicts_like_the_saved_one() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = ModelConfig::new();
        let model = config.init_conv_net::<TestBackend>(&device);
        let images = images(&device);
        let expected = model.forward(images.clone()).into_data();

        let path = save_model(model, dir.path()).unwrap();
        let reloaded = load_model(config.init_conv_net::<TestBackend>(&device), dir.path(), &device)
            .unwrap();

        assert!(path.exists());
        reloaded
            .forward(images)
            .into_data()
            .assert_approx_eq(&expected, 5);
    }

    #[test]
    fn digit_model_reloads_the_configured_architecture() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model_config = ModelConfig::new().with_architecture(Architecture::DeepConvNet);
        TrainingConfig::new(model_config.clone(), AdamConfig::new())
            .save(TrainingConfig::path(dir.path()))
            .unwrap();
        let model = model_config.init_deep_conv_net::<TestBackend>(&device);
        let images = images(&device);
        let expected = model.forward(images.clone()).into_data();
        save_model(model, dir.path()).unwrap();

        let reloaded = DigitModel::<TestBackend>::load(dir.path(), &device).unwrap();

        assert_eq!(reloaded.architecture(), Architecture::DeepConvNet);
        reloaded
            .forward(images)
            .into_data()
            .assert_approx_eq(&expected, 5);
    }

    #[test]
    fn checkpoints_are_read_from_the_checkpoint_directory() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = ModelConfig::new();
        let model = config.init_conv_net::<TestBackend>(&device);
        std::fs::create_dir_all(dir.path().join("checkpoint")).unwrap();
        model
            .clone()
            .save_file(checkpoint_path(dir.path(), 3), &CompactRecorder::new())
            .unwrap();

        let reloaded =
            load_checkpoint(config.init_conv_net::<TestBackend>(&device), dir.path(), 3, &device);

        assert!(reloaded.is_ok());
        assert!(dir.path().join("checkpoint/model-3.mpk").exists());
    }

    #[test]
    fn loading_a_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = ModelConfig::new().init_conv_net::<TestBackend>(&device);

        assert!(matches!(
            load_model(model, dir.path(), &device),
            Err(Error::Recorder(_))
        ));
    }
}
