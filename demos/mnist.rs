#![recursion_limit = "256"]

use burn::{optim::AdamConfig, tensor::backend::AutodiffBackend};
use mnist_classifier::{
    model::{Architecture, ModelConfig},
    pipeline,
    training::TrainingConfig,
};

const ARTIFACT_DIR: &str = "/tmp/mnist-classifier";

pub fn launch<B: AutodiffBackend>(device: B::Device) {
    let architecture = match std::env::args().nth(1) {
        Some(name) => match name.parse::<Architecture>() {
            Ok(architecture) => architecture,
            Err(err) => {
                log::error!("{err}");
                std::process::exit(2);
            }
        },
        None => Architecture::ConvNet,
    };

    let config = TrainingConfig::new(
        ModelConfig::new().with_architecture(architecture),
        AdamConfig::new(),
    );

    match pipeline::run::<B>(ARTIFACT_DIR, config, device) {
        Ok(report) => {
            println!("Test {}", report.evaluation);
            println!("Model saved to {}", report.model_path.display());
            println!("Predictions drawn in {}", report.predictions_image.display());
        }
        Err(err) => {
            log::error!("Training failed: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(any(
    feature = "ndarray",
    feature = "ndarray-blas-netlib",
    feature = "ndarray-blas-openblas",
    feature = "ndarray-blas-accelerate",
))]
mod ndarray {
    use burn::backend::{
        ndarray::{NdArray, NdArrayDevice},
        Autodiff,
    };

    use crate::launch;

    pub fn run() {
        launch::<Autodiff<NdArray>>(NdArrayDevice::Cpu);
    }
}

#[cfg(feature = "tch-gpu")]
mod tch_gpu {
    use burn::backend::{
        libtorch::{LibTorch, LibTorchDevice},
        Autodiff,
    };

    use crate::launch;

    pub fn run() {
        #[cfg(not(target_os = "macos"))]
        let device = LibTorchDevice::Cuda(0);
        #[cfg(target_os = "macos")]
        let device = LibTorchDevice::Mps;

        launch::<Autodiff<LibTorch>>(device);
    }
}

#[cfg(feature = "tch-cpu")]
mod tch_cpu {
    use burn::backend::{
        libtorch::{LibTorch, LibTorchDevice},
        Autodiff,
    };

    use crate::launch;

    pub fn run() {
        launch::<Autodiff<LibTorch>>(LibTorchDevice::Cpu);
    }
}

#[cfg(feature = "wgpu")]
mod wgpu {
    use burn::backend::{
        wgpu::{Wgpu, WgpuDevice},
        Autodiff,
    };

    use crate::launch;

    pub fn run() {
        launch::<Autodiff<Wgpu>>(WgpuDevice::default());
    }
}

fn main() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    #[cfg(any(
        feature = "ndarray",
        feature = "ndarray-blas-netlib",
        feature = "ndarray-blas-openblas",
        feature = "ndarray-blas-accelerate",
    ))]
    ndarray::run();
    #[cfg(feature = "tch-gpu")]
    tch_gpu::run();
    #[cfg(feature = "tch-cpu")]
    tch_cpu::run();
    #[cfg(feature = "wgpu")]
    wgpu::run();
}
