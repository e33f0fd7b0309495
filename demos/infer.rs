use burn::tensor::backend::Backend;
use mnist_classifier::{
    data::{load_split, DigitDataset, DigitSplit},
    evaluate::predict,
    model::DigitModel,
    show::ascii,
};

const ARTIFACT_DIR: &str = "/tmp/mnist-classifier";
const NUM_DIGITS: usize = 5;

pub fn launch<B: Backend>(device: B::Device) {
    let model = match DigitModel::<B>::load(ARTIFACT_DIR, &device) {
        Ok(model) => model,
        Err(err) => {
            log::error!("No trained model in {ARTIFACT_DIR}: {err}");
            std::process::exit(1);
        }
    };

    let digits = DigitDataset::from_raw(&load_split(DigitSplit::Test, Some(NUM_DIGITS)));
    let predictions = predict::<B, _>(&model, digits.items(), &device);

    for (item, prediction) in digits.items().iter().zip(predictions) {
        println!("{}", ascii(item));
        println!(
            "Predicted {} ({:.1}%) Expected {}\n",
            prediction.label,
            prediction.confidence * 100.0,
            item.label
        );
    }
}

#[cfg(any(
    feature = "ndarray",
    feature = "ndarray-blas-netlib",
    feature = "ndarray-blas-openblas",
    feature = "ndarray-blas-accelerate",
))]
mod ndarray {
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    use crate::launch;

    pub fn run() {
        launch::<NdArray>(NdArrayDevice::Cpu);
    }
}

#[cfg(feature = "tch-gpu")]
mod tch_gpu {
    use burn::backend::libtorch::{LibTorch, LibTorchDevice};

    use crate::launch;

    pub fn run() {
        #[cfg(not(target_os = "macos"))]
        let device = LibTorchDevice::Cuda(0);
        #[cfg(target_os = "macos")]
        let device = LibTorchDevice::Mps;

        launch::<LibTorch>(device);
    }
}

#[cfg(feature = "tch-cpu")]
mod tch_cpu {
    use burn::backend::libtorch::{LibTorch, LibTorchDevice};

    use crate::launch;

    pub fn run() {
        launch::<LibTorch>(LibTorchDevice::Cpu);
    }
}

#[cfg(feature = "wgpu")]
mod wgpu {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};

    use crate::launch;

    pub fn run() {
        launch::<Wgpu>(WgpuDevice::default());
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
