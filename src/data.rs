use burn::{
    data::{
        dataloader::batcher::Batcher,
        dataset::{
            transform::Mapper,
            vision::{MnistDataset, MnistItem},
            Dataset,
        },
    },
    prelude::*,
};
use std::{fmt, sync::Arc};

/// Largest intensity a raw pixel can take.
pub const MAX_INTENSITY: f32 = 255.0;

/// Side length of an MNIST digit.
pub const MNIST_SIZE: usize = 28;

/// The fixed splits the dataset is distributed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigitSplit {
    Train,
    Test,
}

impl fmt::Display for DigitSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Test => f.write_str("test"),
        }
    }
}

/// A digit as delivered by the dataset source.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDigit {
    /// Row-major intensities in `0..=255`.
    pub pixels: Vec<f32>,
    pub height: usize,
    pub width: usize,
    pub label: u8,
}

impl From<MnistItem> for RawDigit {
    fn from(item: MnistItem) -> Self {
        Self {
            pixels: item.image.iter().flatten().copied().collect(),
            height: MNIST_SIZE,
            width: MNIST_SIZE,
            label: item.label,
        }
    }
}

/// A preprocessed digit, ready to be batched.
#[derive(Clone, Debug, PartialEq)]
pub struct DigitItem {
    /// Intensities in `[0, 1]`, laid out as `shape`.
    pub pixels: Vec<f32>,
    /// `[height, width, channels]`, with a single channel.
    pub shape: [usize; 3],
    pub label: u8,
}

impl DigitItem {
    pub fn height(&self) -> usize {
        self.shape[0]
    }

    pub fn width(&self) -> usize {
        self.shape[1]
    }

    /// Intensity of the pixel at `row`, `col`.
    pub fn intensity(&self, row: usize, col: usize) -> f32 {
        self.pixels[row * self.width() + col]
    }
}

/// Fetch a split of MNIST, keeping at most `limit` samples.
///
/// The files are downloaded and cached by burn on first use.
pub fn load_split(split: DigitSplit, limit: Option<usize>) -> Vec<RawDigit> {
    let dataset = match split {
        DigitSplit::Train => MnistDataset::train(),
        DigitSplit::Test => MnistDataset::test(),
    };
    let limit = limit.unwrap_or(usize::MAX);

    let digits: Vec<RawDigit> = dataset.iter().take(limit).map(RawDigit::from).collect();
    log::info!("Loaded {} {split} digits", digits.len());

    digits
}

/// Rescales intensities to `[0, 1]` and adds the channel axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct Preprocessor;

impl Mapper<RawDigit, DigitItem> for Preprocessor {
    fn map(&self, raw: &RawDigit) -> DigitItem {
        DigitItem {
            pixels: raw.pixels.iter().map(|v| v / MAX_INTENSITY).collect(),
            shape: [raw.height, raw.width, 1],
            label: raw.label,
        }
    }
}

/// Read-only collection of preprocessed digits.
///
/// Clones share the same items.
#[derive(Clone, Debug, Default)]
pub struct DigitDataset {
    items: Arc<Vec<DigitItem>>,
}

impl DigitDataset {
    pub fn new(items: Vec<DigitItem>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }

    pub fn from_raw(raw: &[RawDigit]) -> Self {
        Self::new(raw.iter().map(|digit| Preprocessor.map(digit)).collect())
    }

    pub fn train(limit: Option<usize>) -> Self {
        Self::from_raw(&load_split(DigitSplit::Train, limit))
    }

    pub fn test(limit: Option<usize>) -> Self {
        Self::from_raw(&load_split(DigitSplit::Test, limit))
    }

    pub fn items(&self) -> &[DigitItem] {
        &self.items
    }
}

impl Dataset<DigitItem> for DigitDataset {
    fn get(&self, index: usize) -> Option<DigitItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Clone, Debug)]
pub struct DigitBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct DigitBatch<B: Backend> {
    /// `[batch, height, width, 1]`
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> DigitBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<DigitItem, DigitBatch<B>> for DigitBatcher<B> {
    fn batch(&self, items: Vec<DigitItem>) -> DigitBatch<B> {
        let [height, width, channels] = items
            .first()
            .map(|item| item.shape)
            .unwrap_or([MNIST_SIZE, MNIST_SIZE, 1]);

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();
        let labels: Vec<i64> = items.iter().map(|item| item.label as i64).collect();

        let images = TensorData::new(pixels, [items.len(), height, width, channels]);
        let targets = TensorData::new(labels, [items.len()]);

        DigitBatch {
            images: Tensor::from_data(images.convert::<B::FloatElem>(), &self.device),
            targets: Tensor::from_data(targets.convert::<B::IntElem>(), &self.device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn raw_digit(label: u8) -> RawDigit {
        RawDigit {
            pixels: (0..16).map(|i| (i * 17) as f32).collect(),
            height: 4,
            width: 4,
            label,
        }
    }

    #[test]
    fn preprocessing_divides_every_intensity_by_255() {
        let raw = raw_digit(3);
        let item = Preprocessor.map(&raw);

        for (normalized, original) in item.pixels.iter().zip(raw.pixels.iter()) {
            assert_eq!(*normalized, original / 255.0);
            assert!((0.0..=1.0).contains(normalized));
        }
        assert_eq!(item.pixels[15], 1.0);
        assert_eq!(item.label, 3);
    }

    #[test]
    fn preprocessing_adds_a_channel_axis() {
        let raw = RawDigit {
            pixels: vec![0.0; 6 * 5],
            height: 6,
            width: 5,
            label: 0,
        };

        let item = Preprocessor.map(&raw);

        assert_eq!(item.shape, [6, 5, 1]);
        assert_eq!(item.pixels.len(), 6 * 5);
    }

    #[test]
    fn mnist_items_are_flattened_row_major() {
        let mut image = [[0.0; MNIST_SIZE]; MNIST_SIZE];
        image[1][2] = 255.0;
        let raw = RawDigit::from(MnistItem { image, label: 7 });

        assert_eq!(raw.pixels.len(), MNIST_SIZE * MNIST_SIZE);
        assert_eq!(raw.pixels[MNIST_SIZE + 2], 255.0);
        assert_eq!(Preprocessor.map(&raw).intensity(1, 2), 1.0);
    }

    #[test]
    fn dataset_clones_share_items() {
        let dataset = DigitDataset::from_raw(&[raw_digit(1), raw_digit(2)]);
        let clone = dataset.clone();

        assert_eq!(clone.len(), 2);
        assert_eq!(clone.get(1).map(|item| item.label), Some(2));
        assert!(clone.get(2).is_none());
        assert!(Arc::ptr_eq(&dataset.items, &clone.items));
    }

    #[test]
    fn batcher_stacks_images_channels_last() {
        let device = Default::default();
        let batcher = DigitBatcher::<TestBackend>::new(device);
        let items = vec![Preprocessor.map(&raw_digit(4)), Preprocessor.map(&raw_digit(9))];

        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [2, 4, 4, 1]);
        assert_eq!(batch.targets.dims(), [2]);
        batch
            .targets
            .into_data()
            .assert_eq(&TensorData::from([4i64, 9]), false);
    }
}
